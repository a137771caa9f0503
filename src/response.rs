//! Response status lines, content-type mapping, and the three response
//! emission modes: a buffered body read fully into memory, headers-only
//! for HEAD requests, and a streamed file body for recognized image
//! extensions.
//!
//! Status lines and the extension-to-content-type mapping are taken
//! directly from the reference implementation this crate's specification
//! was distilled from.

use std::path::{Path, PathBuf};

use tokio::{
	fs::File,
	io::{self, AsyncReadExt, AsyncWriteExt},
	net::TcpStream,
};

use crate::{request::Method, util::SERVER_NAME};

/// `HTTP/1.0 200 OK\r\n`
pub const STATUS_OK: &str = "HTTP/1.0 200 OK\r\n";
/// `HTTP/1.0 400 Bad Request\r\n`
pub const STATUS_BAD_REQUEST: &str = "HTTP/1.0 400 Bad Request\r\n";
/// `HTTP/1.0 404 Not Found\r\n`
pub const STATUS_NOT_FOUND: &str = "HTTP/1.0 404 Not Found\r\n";
/// `HTTP/1.0 405 Method Not Allowed\r\nAllow: GET, HEAD\r\n`
pub const STATUS_METHOD_NOT_ALLOWED: &str = "HTTP/1.0 405 Method Not Allowed\r\nAllow: GET, HEAD\r\n";

/// The canonical path substituted for a request that fails validation,
/// served through the normal file-serving pipeline with a 400 status line.
pub const BAD_REQUEST_PATH: &str = "/400.txt";

/// The inline body served for a 404 response when the configured 404 page
/// itself can't be opened.
pub const FALLBACK_404_BODY: &str = "<p>404 NOT FOUND</p>";
/// The inline body served for a 400 response when [`BAD_REQUEST_PATH`]
/// itself can't be opened.
pub const FALLBACK_400_BODY: &str = "<p>400 BAD REQUEST</p>";

/// Map a request target's extension onto a `Content-Type` value. Targets
/// with an unrecognized or missing extension are served as `text/html`.
pub fn content_type_for(target: &str) -> &'static str {
	if target.ends_with(".txt") {
		"text/plain"
	} else if target.ends_with(".js") {
		"text/javascript"
	} else if target.ends_with(".css") {
		"text/css"
	} else if target.ends_with(".jpg") || target.ends_with(".jpeg") {
		"image/jpeg"
	} else if target.ends_with(".png") {
		"image/png"
	} else if target.ends_with(".gif") {
		"image/gif"
	} else {
		"text/html"
	}
}

/// Resolve a request target onto a filesystem path under `root`. `/` is
/// rewritten to `/index.html`. No `..`-traversal normalization is
/// performed beyond what `Path::join` itself does with a leading `/`
/// component stripped.
pub fn resolve_path(root: &Path, target: &str) -> PathBuf {
	let target = if target == "/" { "/index.html" } else { target };
	root.join(target.trim_start_matches('/'))
}

fn write_headers(status: &str, content_type: &str, content_length: u64, send_server: bool) -> String {
	let server_header = if send_server {
		format!("Server: {SERVER_NAME}\r\n")
	} else {
		String::new()
	};

	format!("{status}{server_header}Content-Type: {content_type}\r\nContent-Length: {content_length}\r\n\r\n")
}

/// Write a complete buffered response (status, headers, and a body already
/// read fully into memory) to the connection.
pub async fn write_buffered(
	stream: &mut TcpStream,
	status: &str,
	content_type: &str,
	body: &[u8],
	send_server: bool,
) -> io::Result<()> {
	let headers = write_headers(status, content_type, body.len() as u64, send_server);
	stream.write_all(headers.as_bytes()).await?;
	stream.write_all(body).await?;
	stream.flush().await
}

/// Write only the status line and headers for a HEAD request — the body
/// is described but never sent.
pub async fn write_head_only(
	stream: &mut TcpStream,
	status: &str,
	content_type: &str,
	content_length: u64,
	send_server: bool,
) -> io::Result<()> {
	let headers = write_headers(status, content_type, content_length, send_server);
	stream.write_all(headers.as_bytes()).await?;
	stream.flush().await
}

/// Stream a file's contents as the response body after writing its
/// headers, without buffering the whole file in memory. Reserved for
/// recognized image extensions.
pub async fn write_streamed(
	stream: &mut TcpStream,
	status: &str,
	content_type: &str,
	mut file: File,
	content_length: u64,
	send_server: bool,
) -> io::Result<()> {
	let headers = write_headers(status, content_type, content_length, send_server);
	stream.write_all(headers.as_bytes()).await?;
	io::copy(&mut file, stream).await?;
	stream.flush().await
}

/// Serve a request for a resolved filesystem path with the given success
/// status line, opening the file and dispatching to the appropriate
/// emission mode, or serving `not_found_status`/`not_found_body` if it
/// can't be opened — a plain GET miss answers 404, while the `/400.txt`
/// substitution path answers 400 even when that file itself is missing.
/// `is_image` selects the streamed-binary path for GET; every other
/// successfully opened file is read fully into memory and sent buffered,
/// per the response builder's three emission modes.
#[allow(clippy::too_many_arguments)]
pub async fn serve_file(
	stream: &mut TcpStream,
	method: Method,
	resolved: &Path,
	target: &str,
	is_image: bool,
	status: &str,
	not_found_status: &str,
	not_found_body: &str,
	send_server: bool,
) -> io::Result<()> {
	let content_type = content_type_for(target);

	match File::open(resolved).await {
		Ok(mut file) => {
			let len = file.metadata().await?.len();
			match method {
				Method::Head => write_head_only(stream, status, content_type, len, send_server).await,
				_ if is_image => write_streamed(stream, status, content_type, file, len, send_server).await,
				_ => {
					let mut body = Vec::with_capacity(len as usize);
					file.read_to_end(&mut body).await?;
					write_buffered(stream, status, content_type, &body, send_server).await
				}
			}
		}
		Err(_) => match method {
			Method::Head => {
				write_head_only(
					stream,
					not_found_status,
					"text/html",
					not_found_body.len() as u64,
					send_server,
				)
				.await
			}
			_ => {
				write_buffered(
					stream,
					not_found_status,
					"text/html",
					not_found_body.as_bytes(),
					send_server,
				)
				.await
			}
		},
	}
}
