//! # hyperfiled server
//!
//! The hyperfiled server binary: parses its configuration, sets up
//! structured logging, opens the keyed store, and runs the
//! Acceptor/Monitor/Worker dispatch core until it receives a shutdown
//! signal.

use std::sync::{atomic::AtomicUsize, Arc};

use hyperfiled::{
	config::Config,
	handler::{DefaultHandler, HandlerManager},
	server,
	store::Store,
	util::{SERVER_HELP, SERVER_NAME},
};
use pico_args::Arguments;
use tokio::runtime::Builder;
use tracing::{debug, error, info, Level};
use tracing_subscriber::{filter::FilterFn, prelude::*, FmtSubscriber};

fn main() -> Result<(), anyhow::Error> {
	// Create a temporary tracing subscriber to collect and show logs on
	// startup, before the configured log level is known.
	let tracing_subscriber = FmtSubscriber::builder()
		.with_level(true)
		.with_max_level(if cfg!(debug_assertions) {
			Level::DEBUG
		} else {
			Level::INFO
		})
		.finish();

	let subscriber_guard = tracing::subscriber::set_default(tracing_subscriber);

	info!(server = SERVER_NAME, "starting hyperfiled");

	let mut args = Arguments::from_env();
	if args.contains(["-h", "--help"]) {
		println!("{SERVER_HELP}");
		return Ok(());
	}

	let config = match Config::new_static(args) {
		Ok(config) => config,
		Err(err) => {
			eprintln!("{SERVER_HELP}");
			error!(%err, "configuration error");
			std::process::exit(1);
		}
	};

	debug!(?config, "server configuration parsed");

	// Set a tracing filter which can change the minimum log level on the
	// fly by reading it from the now-available configuration.
	let tracing_filter = FilterFn::new(move |metadata| metadata.level() <= &config.log_level());

	let tracing_subscriber = FmtSubscriber::builder()
		.with_level(true)
		.with_max_level(Level::TRACE)
		.finish()
		.with(tracing_filter);

	drop(subscriber_guard);
	tracing::subscriber::set_global_default(tracing_subscriber)
		.expect("setting tracing default subscriber failed");

	let store = Store::open(config.store_path())?;
	let handler_manager = Arc::new(HandlerManager::new(
		config.handler_path().to_owned(),
		Arc::new(DefaultHandler),
	));

	let rt = Builder::new_multi_thread()
		.enable_all()
		.thread_name_fn(|| {
			static ATOMIC_ID: AtomicUsize = AtomicUsize::new(0);
			let id = ATOMIC_ID.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
			format!("hyperfiled-worker-{id:#04x}")
		})
		.build()
		.expect("async runtime initialization");

	info!(%config, "hyperfiled server started");

	rt.block_on(server::run(config, handler_manager, store))
}
