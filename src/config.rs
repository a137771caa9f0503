//! Server configuration, layered from defaults, an optional TOML file, and
//! command-line arguments, each overwriting the previous (see
//! [`util::SERVER_HELP`](crate::util::SERVER_HELP)).

use std::{fmt, path::PathBuf};

use pico_args::Arguments;
use serde::Deserialize;
use thiserror::Error;
use tracing::Level;

/// Errors that can occur while assembling a [`Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
	/// `-c`/`--workers` was missing or not a positive integer.
	#[error("worker count (-c/--workers) is required and must be >= 1")]
	MissingWorkers,
	/// The configuration file couldn't be read.
	#[error("failed to read configuration file {path}: {source}")]
	ReadFile {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
	/// The configuration file couldn't be parsed as TOML.
	#[error("failed to parse configuration file {path}: {source}")]
	ParseFile {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},
	/// An argument couldn't be parsed.
	#[error(transparent)]
	Args(#[from] pico_args::Error),
}

/// A partially-specified configuration, as loaded from a TOML file. Every
/// field is optional; an absent field falls back to the default or to
/// whatever was set by a layer applied earlier.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct Partial {
	workers: Option<usize>,
	port: Option<u16>,
	root: Option<PathBuf>,
	handler: Option<PathBuf>,
	store: Option<PathBuf>,
	log_level: Option<String>,
	send_server: Option<bool>,
}

impl Partial {
	fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
		let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
			path: path.to_owned(),
			source,
		})?;

		toml::from_str(&contents).map_err(|source| ConfigError::ParseFile {
			path: path.to_owned(),
			source,
		})
	}

	fn merge_into(self, into: &mut ConfigInner) {
		if let Some(workers) = self.workers {
			into.workers = workers;
		}
		if let Some(port) = self.port {
			into.port = port;
		}
		if let Some(root) = self.root {
			into.root = root;
		}
		if let Some(handler) = self.handler {
			into.handler = handler;
		}
		if let Some(store) = self.store {
			into.store = store;
		}
		if let Some(log_level) = self.log_level {
			if let Some(level) = parse_log_level(&log_level) {
				into.log_level = level;
			}
		}
		if let Some(send_server) = self.send_server {
			into.send_server = send_server;
		}
	}
}

fn parse_log_level(s: &str) -> Option<Level> {
	match s.to_ascii_lowercase().as_str() {
		"trace" => Some(Level::TRACE),
		"debug" => Some(Level::DEBUG),
		"info" => Some(Level::INFO),
		"warn" => Some(Level::WARN),
		"error" => Some(Level::ERROR),
		_ => None,
	}
}

#[derive(Debug, Clone)]
struct ConfigInner {
	workers: usize,
	port: u16,
	root: PathBuf,
	handler: PathBuf,
	store: PathBuf,
	log_level: Level,
	send_server: bool,
}

impl Default for ConfigInner {
	fn default() -> Self {
		Self {
			workers: 0,
			port: 8080,
			root: PathBuf::from("./resources"),
			handler: PathBuf::from("./http.so"),
			store: PathBuf::from("./requests_db"),
			log_level: Level::INFO,
			send_server: true,
		}
	}
}

/// The assembled server configuration. Cheap to pass around as `&'static
/// Config` once built with [`Config::new_static`], following the
/// leaked-static idiom used for other long-lived singletons in this crate.
pub struct Config {
	inner: ConfigInner,
}

impl Config {
	/// Build a [`Config`] from the process's command-line arguments,
	/// layering defaults, an optional `--config` TOML file, and the
	/// remaining CLI flags in that order.
	pub fn from_env_args() -> Result<Self, ConfigError> {
		Self::from_args(Arguments::from_env())
	}

	/// Build a [`Config`] from a provided [`Arguments`], for testing without
	/// touching the real process argv.
	pub fn from_args(mut args: Arguments) -> Result<Self, ConfigError> {
		let mut inner = ConfigInner::default();

		if let Some(config_path) = args.opt_value_from_str::<_, PathBuf>("--config")? {
			Partial::from_file(&config_path)?.merge_into(&mut inner);
		}

		if let Some(workers) = args.opt_value_from_str::<_, usize>(["-c", "--workers"])? {
			inner.workers = workers;
		}
		if let Some(port) = args.opt_value_from_str("--port")? {
			inner.port = port;
		}
		if let Some(root) = args.opt_value_from_str::<_, PathBuf>("--root")? {
			inner.root = root;
		}
		if let Some(handler) = args.opt_value_from_str::<_, PathBuf>("--handler")? {
			inner.handler = handler;
		}
		if let Some(store) = args.opt_value_from_str::<_, PathBuf>("--store")? {
			inner.store = store;
		}
		if let Some(log_level) = args.opt_value_from_str::<_, String>("--log-level")? {
			inner.log_level = parse_log_level(&log_level).unwrap_or(Level::INFO);
		}
		if let Some(send_server) = args.opt_value_from_str::<_, bool>("--send-server")? {
			inner.send_server = send_server;
		}

		if inner.workers < 1 {
			return Err(ConfigError::MissingWorkers);
		}

		Ok(Self { inner })
	}

	/// Build a [`Config`] and leak it to get a `&'static` reference, so it
	/// can be shared across every acceptor/monitor/worker task without
	/// runtime refcounting.
	pub fn new_static(args: Arguments) -> Result<&'static Self, ConfigError> {
		Ok(Box::leak(Box::new(Self::from_args(args)?)))
	}

	/// Number of worker tasks to run.
	pub fn workers(&self) -> usize {
		self.inner.workers
	}

	/// TCP listen port.
	pub fn port(&self) -> u16 {
		self.inner.port
	}

	/// Document root served for GET/HEAD requests.
	pub fn root(&self) -> &std::path::Path {
		&self.inner.root
	}

	/// Path to the hot-reloadable handler module artifact.
	pub fn handler_path(&self) -> &std::path::Path {
		&self.inner.handler
	}

	/// Path to the keyed POST-persistence store.
	pub fn store_path(&self) -> &std::path::Path {
		&self.inner.store
	}

	/// Current minimum log level.
	pub fn log_level(&self) -> Level {
		self.inner.log_level
	}

	/// Whether to send the `Server` response header. Default `true`.
	pub fn send_server(&self) -> bool {
		self.inner.send_server
	}
}

impl fmt::Debug for Config {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Config")
			.field("workers", &self.inner.workers)
			.field("port", &self.inner.port)
			.field("root", &self.inner.root)
			.field("handler", &self.inner.handler)
			.field("store", &self.inner.store)
			.field("log_level", &self.inner.log_level)
			.finish()
	}
}

impl fmt::Display for Config {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{} workers on port {}, root {}",
			self.inner.workers,
			self.inner.port,
			self.inner.root.display()
		)
	}
}
