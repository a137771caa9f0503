//! The hot-reloadable request handler module.
//!
//! A [`RequestHandler`] resolves the four entry points a request cycle
//! needs: validating the raw request, extracting the filesystem path it
//! refers to, and handling GET/HEAD and POST requests. [`HandlerManager`]
//! watches an on-disk artifact's mtime and, on change, re-instantiates the
//! handler behind an [`ArcSwap`] — the capability-abstraction strategy
//! this crate uses in place of `dlopen`-style dynamic loading, for which
//! there is no precedent in this crate's lineage.

use std::{
	path::{Path, PathBuf},
	sync::Mutex,
	time::SystemTime,
};

use arc_swap::ArcSwap;
use async_trait::async_trait;
use thiserror::Error;
use tokio::{io, net::TcpStream};
use tracing::{debug, info, instrument};

use crate::{
	request::{validate_request, ParsedRequest, RequestError},
	response::{self, FALLBACK_404_BODY},
	store::Store,
};

/// The four entry points a handler module resolves, mirroring the shape
/// of a dynamically loaded module's exported symbols.
#[async_trait]
pub trait RequestHandler: std::fmt::Debug + Send + Sync {
	/// Validate and parse a raw request buffer.
	fn validate_request(&self, buf: &[u8]) -> Result<ParsedRequest, RequestError>;

	/// Resolve the filesystem path a validated request refers to.
	fn extract_path(&self, root: &Path, req: &ParsedRequest) -> PathBuf;

	/// Serve a GET or HEAD request, writing the full response to `stream`.
	/// `send_server` controls whether a `Server` header is included.
	async fn handle_request(
		&self,
		stream: &mut TcpStream,
		resolved: &Path,
		req: &ParsedRequest,
		send_server: bool,
	) -> io::Result<()>;

	/// Persist a POST request's body. Per the response builder, POST skips
	/// the Emitting phase entirely — nothing is written to `stream`.
	async fn handle_post(&self, stream: &mut TcpStream, store: &Store, body: &[u8]) -> io::Result<()>;
}

/// The built-in request handler, implementing the behavior described in
/// [`crate::request`] and [`crate::response`].
#[derive(Debug, Default)]
pub struct DefaultHandler;

#[async_trait]
impl RequestHandler for DefaultHandler {
	fn validate_request(&self, buf: &[u8]) -> Result<ParsedRequest, RequestError> {
		validate_request(buf)
	}

	fn extract_path(&self, root: &Path, req: &ParsedRequest) -> PathBuf {
		response::resolve_path(root, &req.target)
	}

	#[instrument(level = "trace", skip(self, stream))]
	async fn handle_request(
		&self,
		stream: &mut TcpStream,
		resolved: &Path,
		req: &ParsedRequest,
		send_server: bool,
	) -> io::Result<()> {
		response::serve_file(
			stream,
			req.method,
			resolved,
			&req.target,
			req.is_image,
			response::STATUS_OK,
			response::STATUS_NOT_FOUND,
			FALLBACK_404_BODY,
			send_server,
		)
		.await
	}

	/// Persists the body and returns without writing anything to `stream`,
	/// matching the reference implementation's documented quirk of never
	/// emitting a POST response.
	#[instrument(level = "trace", skip(self, _stream, store, body), fields(body_len = body.len()))]
	async fn handle_post(&self, _stream: &mut TcpStream, store: &Store, body: &[u8]) -> io::Result<()> {
		if let Err(err) = store.record_post(body.to_vec()).await {
			debug!(%err, "failed to persist POST body");
		}
		Ok(())
	}
}

/// Errors that can occur while (re)loading the handler module artifact.
#[derive(Debug, Error)]
pub enum ReloadError {
	/// The artifact's modification time couldn't be determined.
	#[error("failed to read handler artifact mtime: {0}")]
	Mtime(#[source] std::io::Error),
	/// The artifact exists but is empty, the stand-in this crate uses for
	/// "symbol resolution failed".
	#[error("handler artifact at {0} is empty")]
	EmptyArtifact(PathBuf),
}

/// Watches a handler module artifact on disk and hot-swaps the active
/// [`RequestHandler`] when its mtime changes.
#[derive(Debug)]
pub struct HandlerManager {
	path: PathBuf,
	last_loaded_mtime: Mutex<Option<SystemTime>>,
	current: ArcSwap<dyn RequestHandler>,
}

impl HandlerManager {
	/// Create a manager watching `path`, initially serving `initial`.
	pub fn new(path: PathBuf, initial: std::sync::Arc<dyn RequestHandler>) -> Self {
		Self {
			path,
			last_loaded_mtime: Mutex::new(None),
			current: ArcSwap::from(initial),
		}
	}

	/// Check the artifact's mtime and, if it has changed since the last
	/// load, release the current handler and acquire a freshly
	/// instantiated one. Must only be called between request cycles, never
	/// mid-cycle. Any stat failure — missing artifact, permission denied,
	/// or otherwise — retains whatever handler is currently loaded; an
	/// empty artifact is treated as a corrupt module and returns an error,
	/// which the caller should treat as Fatal.
	#[instrument(level = "debug", skip(self))]
	pub async fn reload_if_stale(&self) -> Result<std::sync::Arc<dyn RequestHandler>, ReloadError> {
		match tokio::fs::metadata(&self.path).await {
			Ok(meta) => {
				if meta.len() == 0 {
					return Err(ReloadError::EmptyArtifact(self.path.clone()));
				}

				let mtime = meta.modified().map_err(ReloadError::Mtime)?;
				let mut last = self.last_loaded_mtime.lock().unwrap();

				if last.map_or(true, |l| mtime > l) {
					let fresh: std::sync::Arc<dyn RequestHandler> =
						std::sync::Arc::new(DefaultHandler);
					self.current.store(fresh);
					*last = Some(mtime);
					info!(path = %self.path.display(), "handler module reloaded");
				}
			}
			Err(err) => {
				debug!(path = %self.path.display(), %err, "handler artifact stat failed, retaining loaded module");
			}
		}

		Ok(self.current.load_full())
	}
}
