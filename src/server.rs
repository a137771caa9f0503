//! The Acceptor/Monitor/Worker dispatch core.
//!
//! Connections are moved by value across [`tokio::sync::mpsc`] channels
//! rather than passed as raw descriptors between OS processes — Rust's
//! ownership model already enforces the single-owner invariant that
//! descriptor passing exists to provide. The Acceptor owns the listening
//! socket and the shutdown-time cleanup of in-flight connections; the
//! Monitor round-robins connections out to a fixed-size worker pool and
//! reaps and respawns any worker task that terminates; each Worker reloads
//! its handler module between cycles and runs one request to completion
//! before unconditionally returning the connection to the Monitor.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use socket2::{Domain, Socket, Type};
use tokio::{
	io::AsyncReadExt,
	net::{TcpListener, TcpStream},
	sync::{mpsc, watch},
	task::JoinHandle,
};
use tracing::{debug, error, info, instrument, warn};

use crate::{
	config::Config,
	handler::{HandlerManager, RequestHandler},
	request::{split_body, Method, ALLOWED_METHODS},
	response::{self, FALLBACK_400_BODY, STATUS_BAD_REQUEST, STATUS_METHOD_NOT_ALLOWED},
	store::Store,
};

const LISTENER_TCP_BACKLOG_SIZE: i32 = 1024;
const REAP_INTERVAL: Duration = Duration::from_millis(100);
const REQUEST_BUFFER_SIZE: usize = 1024;
const MONITOR_CHANNEL_DEPTH: usize = 8;

/// An accepted connection, tagged with a locally assigned monotonic id
/// used for logging and correlating across the Acceptor/Monitor/Worker
/// handoffs.
#[derive(Debug)]
pub struct Connection {
	pub id: u64,
	pub peer: SocketAddr,
	pub stream: TcpStream,
}

/// Bind a [`TcpListener`] configured the way this server needs: address
/// reuse enabled, nonblocking, and a fixed backlog.
pub fn bind_listener(addr: SocketAddr) -> std::io::Result<TcpListener> {
	let domain = if addr.is_ipv6() {
		Domain::IPV6
	} else {
		Domain::IPV4
	};

	let socket = Socket::new(domain, Type::STREAM, None)?;
	socket.set_reuse_address(true)?;
	if addr.is_ipv6() {
		socket.set_only_v6(true)?;
	}
	socket.set_nonblocking(true)?;
	socket.bind(&addr.into())?;
	socket.listen(LISTENER_TCP_BACKLOG_SIZE)?;

	TcpListener::from_std(socket.into())
}

/// Run the Acceptor: own the listening socket, accept new connections and
/// hand them to the Monitor, and drop connections the Monitor hands back
/// once their request cycle is complete.
#[instrument(level = "info", skip_all)]
pub async fn acceptor_loop(
	listener: TcpListener,
	to_monitor: mpsc::Sender<Connection>,
	mut from_monitor: mpsc::Receiver<Connection>,
	mut exit: watch::Receiver<bool>,
) {
	let mut next_id: u64 = 0;
	info!(addr = ?listener.local_addr().ok(), "acceptor listening");

	loop {
		tokio::select! {
			biased;
			changed = exit.changed() => {
				if changed.is_err() || *exit.borrow() {
					info!("acceptor shutting down");
					break;
				}
			}
			accepted = listener.accept() => {
				match accepted {
					Ok((stream, peer)) => {
						let id = next_id;
						next_id = next_id.wrapping_add(1);
						debug!(id, %peer, "accepted connection");

						if to_monitor.send(Connection { id, peer, stream }).await.is_err() {
							warn!("monitor channel closed, stopping acceptor");
							break;
						}
					}
					Err(err) => warn!(?err, "accept failed"),
				}
			}
			returned = from_monitor.recv() => {
				match returned {
					Some(conn) => debug!(id = conn.id, "connection cycle complete, closing"),
					None => {
						warn!("monitor return channel closed, stopping acceptor");
						break;
					}
				}
			}
		}
	}
}

struct WorkerSlot {
	to_worker: mpsc::Sender<Connection>,
	handle: JoinHandle<usize>,
}

fn spawn_worker(
	idx: usize,
	done_tx: mpsc::Sender<Connection>,
	handler_manager: Arc<HandlerManager>,
	store: Store,
	config: &'static Config,
	exit: watch::Receiver<bool>,
) -> WorkerSlot {
	let (tx, rx) = mpsc::channel(MONITOR_CHANNEL_DEPTH);
	let handle = tokio::spawn(worker_loop(idx, rx, done_tx, handler_manager, store, config, exit));
	WorkerSlot {
		to_worker: tx,
		handle,
	}
}

/// Run the Monitor: dispatch connections from the Acceptor to workers
/// round-robin, fan completed connections back to the Acceptor, and
/// periodically reap and respawn any worker task that has terminated.
#[instrument(level = "info", skip_all)]
pub async fn monitor_loop(
	mut from_acceptor: mpsc::Receiver<Connection>,
	to_acceptor: mpsc::Sender<Connection>,
	config: &'static Config,
	handler_manager: Arc<HandlerManager>,
	store: Store,
	mut exit: watch::Receiver<bool>,
) {
	let n = config.workers().max(1);
	let (done_tx, mut done_rx) = mpsc::channel::<Connection>(n * MONITOR_CHANNEL_DEPTH);

	let mut slots: Vec<WorkerSlot> = (0..n)
		.map(|idx| {
			spawn_worker(
				idx,
				done_tx.clone(),
				handler_manager.clone(),
				store.clone(),
				config,
				exit.clone(),
			)
		})
		.collect();

	let mut cursor = 0usize;
	let mut reap = tokio::time::interval(REAP_INTERVAL);

	loop {
		tokio::select! {
			biased;
			changed = exit.changed() => {
				if changed.is_err() || *exit.borrow() {
					info!("monitor shutting down");
					break;
				}
			}
			Some(conn) = from_acceptor.recv() => {
				if slots[cursor].to_worker.send(conn).await.is_err() {
					warn!(worker = cursor, "worker channel closed, dropping connection");
				}
				cursor = (cursor + 1) % n;
			}
			Some(conn) = done_rx.recv() => {
				if to_acceptor.send(conn).await.is_err() {
					error!("acceptor channel closed, monitor stopping");
					break;
				}
			}
			_ = reap.tick() => {
				for idx in 0..slots.len() {
					if slots[idx].handle.is_finished() {
						warn!(worker = idx, "worker terminated, respawning");
						slots[idx] = spawn_worker(
							idx,
							done_tx.clone(),
							handler_manager.clone(),
							store.clone(),
							config,
							exit.clone(),
						);
					}
				}
			}
		}
	}

	for slot in slots {
		slot.handle.abort();
	}
}

async fn worker_loop(
	idx: usize,
	mut rx: mpsc::Receiver<Connection>,
	done_tx: mpsc::Sender<Connection>,
	handler_manager: Arc<HandlerManager>,
	store: Store,
	config: &'static Config,
	mut exit: watch::Receiver<bool>,
) -> usize {
	loop {
		if *exit.borrow() {
			break;
		}

		tokio::select! {
			biased;
			changed = exit.changed() => {
				if changed.is_err() || *exit.borrow() {
					break;
				}
			}
			received = rx.recv() => {
				let Some(mut conn) = received else {
					debug!(worker = idx, "monitor channel closed, worker exiting");
					break;
				};

				let handler = match handler_manager.reload_if_stale().await {
					Ok(handler) => handler,
					Err(err) => {
						error!(worker = idx, %err, "handler reload failed, worker exiting");
						break;
					}
				};

				if let Err(err) = serve_connection(&mut conn, config, handler.as_ref(), &store).await {
					warn!(worker = idx, id = conn.id, %err, "error serving connection");
				}

				if done_tx.send(conn).await.is_err() {
					error!(worker = idx, "monitor return channel closed, worker exiting");
					break;
				}
			}
		}
	}

	idx
}

#[instrument(level = "info", skip(conn, config, handler, store), fields(id = conn.id, peer = %conn.peer))]
async fn serve_connection(
	conn: &mut Connection,
	config: &Config,
	handler: &dyn RequestHandler,
	store: &Store,
) -> std::io::Result<()> {
	let mut buf = vec![0u8; REQUEST_BUFFER_SIZE];
	let n = conn.stream.read(&mut buf).await?;
	if n == 0 {
		return Ok(());
	}
	buf.truncate(n);

	match handler.validate_request(&buf) {
		Ok(req) => match req.method {
			Method::Get | Method::Head => {
				let resolved = handler.extract_path(config.root(), &req);
				handler
					.handle_request(&mut conn.stream, &resolved, &req, config.send_server())
					.await
			}
			Method::Post => {
				let body = split_body(&buf).unwrap_or(&[]);
				handler.handle_post(&mut conn.stream, store, body).await
			}
			_ => {
				response::write_buffered(
					&mut conn.stream,
					STATUS_METHOD_NOT_ALLOWED,
					"text/plain",
					ALLOWED_METHODS.as_bytes(),
					config.send_server(),
				)
				.await
			}
		},
		Err(err) => {
			debug!(%err, "rejecting malformed request");
			let resolved = response::resolve_path(config.root(), response::BAD_REQUEST_PATH);
			response::serve_file(
				&mut conn.stream,
				Method::Get,
				&resolved,
				response::BAD_REQUEST_PATH,
				false,
				STATUS_BAD_REQUEST,
				STATUS_BAD_REQUEST,
				FALLBACK_400_BODY,
				config.send_server(),
			)
			.await
		}
	}
}

/// Run the full dispatch core until a shutdown signal (Ctrl-C) is
/// received: bind the listener, spawn the Acceptor and Monitor, and wait
/// for both to finish.
pub async fn run(config: &'static Config, handler_manager: Arc<HandlerManager>, store: Store) -> anyhow::Result<()> {
	let addr = SocketAddr::from(([0, 0, 0, 0], config.port()));
	let listener = bind_listener(addr)?;

	let (exit_tx, exit_rx) = watch::channel(false);
	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			info!("shutdown signal received");
			let _ = exit_tx.send(true);
		}
	});

	let (to_monitor_tx, to_monitor_rx) = mpsc::channel(MONITOR_CHANNEL_DEPTH * config.workers().max(1));
	let (to_acceptor_tx, to_acceptor_rx) = mpsc::channel(MONITOR_CHANNEL_DEPTH * config.workers().max(1));

	let acceptor = tokio::spawn(acceptor_loop(
		listener,
		to_monitor_tx,
		to_acceptor_rx,
		exit_rx.clone(),
	));
	let monitor = tokio::spawn(monitor_loop(
		to_monitor_rx,
		to_acceptor_tx,
		config,
		handler_manager,
		store,
		exit_rx,
	));

	let _ = tokio::join!(acceptor, monitor);

	Ok(())
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use tokio::{
		io::{AsyncReadExt, AsyncWriteExt},
		net::TcpStream as ClientStream,
	};

	use super::*;
	use crate::{
		handler::DefaultHandler,
		store::{MemoryStore, Store},
	};

	async fn start_test_server() -> (SocketAddr, watch::Sender<bool>) {
		let listener = bind_listener(SocketAddr::from(([127, 0, 0, 1], 0))).unwrap();
		let addr = listener.local_addr().unwrap();

		let (exit_tx, exit_rx) = watch::channel(false);
		let (to_monitor_tx, to_monitor_rx) = mpsc::channel(8);
		let (to_acceptor_tx, to_acceptor_rx) = mpsc::channel(8);

		tokio::spawn(acceptor_loop(listener, to_monitor_tx, to_acceptor_rx, exit_rx.clone()));

		let config = Box::leak(Box::new(
			Config::from_args(pico_args::Arguments::from_vec(vec!["-c".into(), "2".into()])).unwrap(),
		));
		let handler_manager = Arc::new(HandlerManager::new(
			config.handler_path().to_owned(),
			Arc::new(DefaultHandler),
		));
		let store = Store::with_backend(Arc::new(MemoryStore::new()));

		tokio::spawn(monitor_loop(
			to_monitor_rx,
			to_acceptor_tx,
			config,
			handler_manager,
			store,
			exit_rx,
		));

		(addr, exit_tx)
	}

	#[tokio::test]
	async fn round_trips_a_post_through_the_dispatch_core() {
		let (addr, _exit) = start_test_server().await;

		let mut stream = ClientStream::connect(addr).await.unwrap();
		let request = b"POST /submit HTTP/1.0\r\nContent-Length: 5\r\n\r\nhello";
		stream.write_all(request).await.unwrap();

		let mut response = Vec::new();
		stream.shutdown().await.ok();
		stream.read_to_end(&mut response).await.unwrap();

		assert!(response.is_empty(), "POST must not emit a response body");
	}
}
