//! Shared helpers for hyperfiled's integration tests.

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use hyperfiled::{
	config::Config,
	handler::{DefaultHandler, HandlerManager},
	server,
	store::{MemoryStore, Store},
};
use tokio::sync::{mpsc, watch};

/// Start the full Acceptor/Monitor/Worker dispatch core on an ephemeral
/// loopback port, serving `root` as the document root, with an in-memory
/// store. Returns the bound address, the shutdown sender, and a handle to
/// the store so tests can inspect persisted POST bodies directly.
pub async fn start_server(root: PathBuf) -> (SocketAddr, watch::Sender<bool>, Store) {
	let listener = server::bind_listener(SocketAddr::from(([127, 0, 0, 1], 0))).unwrap();
	let addr = listener.local_addr().unwrap();

	let (exit_tx, exit_rx) = watch::channel(false);
	let (to_monitor_tx, to_monitor_rx) = mpsc::channel(8);
	let (to_acceptor_tx, to_acceptor_rx) = mpsc::channel(8);

	tokio::spawn(server::acceptor_loop(
		listener,
		to_monitor_tx,
		to_acceptor_rx,
		exit_rx.clone(),
	));

	let config = Box::leak(Box::new(
		Config::from_args(pico_args::Arguments::from_vec(vec![
			"-c".into(),
			"2".into(),
			"--root".into(),
			root.into_os_string(),
		]))
		.unwrap(),
	));

	let handler_manager = Arc::new(HandlerManager::new(
		config.handler_path().to_owned(),
		Arc::new(DefaultHandler),
	));
	let store = Store::with_backend(Arc::new(MemoryStore::new()));

	tokio::spawn(server::monitor_loop(
		to_monitor_rx,
		to_acceptor_tx,
		config,
		handler_manager,
		store.clone(),
		exit_rx,
	));

	(addr, exit_tx, store)
}
