//! HTTP/1.0 request validation and parsing.
//!
//! Validation runs in a single pass over the raw bytes read from a
//! connection: the method token against a closed set, the request-line
//! grammar, and the header block's `CRLF` termination. Nothing here
//! allocates more than the request line and headers actually need.

use std::fmt;

use strum::{Display, EnumString};
use thiserror::Error;

/// The maximum length, in bytes, of a request target this parser accepts.
pub const MAX_TARGET_LEN: usize = 1024;

/// The closed set of HTTP method tokens this server recognizes. Unlisted
/// tokens are rejected outright rather than accepted and later ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Method {
	Get,
	Head,
	Post,
	Put,
	Delete,
	Connect,
	Options,
	Trace,
	Patch,
}

/// Errors produced while validating a raw request buffer. Any of these
/// corresponds to a 400 Bad Request response, except [`RequestError::Method`]
/// which corresponds to 405 Method Not Allowed when the method is a
/// syntactically valid token outside the set this server serves.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
	/// The buffer did not contain a complete request line.
	#[error("missing or incomplete request line")]
	MissingRequestLine,
	/// The method token was not in the closed set this server recognizes.
	#[error("unrecognized method token")]
	InvalidMethod,
	/// The request target was empty or did not start with `/`.
	#[error("request target must be a non-empty absolute path")]
	InvalidTarget,
	/// The request target exceeded [`MAX_TARGET_LEN`].
	#[error("request target exceeds {MAX_TARGET_LEN} bytes")]
	TargetTooLong,
	/// The protocol token was not `HTTP/` followed by a version.
	#[error("malformed protocol token")]
	InvalidProtocol,
	/// A header line was missing its `:` separator.
	#[error("malformed header line")]
	MalformedHeader,
	/// The header block never reached a terminating blank line within the
	/// buffer that was read.
	#[error("unterminated header block")]
	UnterminatedHeaders,
}

/// The method and methods allowed on this server's GET/HEAD-only paths,
/// used to build the `Allow` header on a 405 response.
pub const ALLOWED_METHODS: &str = "GET, HEAD";

/// A successfully validated and parsed HTTP/1.0 request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRequest {
	/// The request method.
	pub method: Method,
	/// The request target, always starting with `/`.
	pub target: String,
	/// The protocol token, e.g. `HTTP/1.0`.
	pub protocol: String,
	/// Whether the target's extension matches one of the recognized image
	/// extensions.
	pub is_image: bool,
}

impl fmt::Display for ParsedRequest {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} {} {}", self.method, self.target, self.protocol)
	}
}

const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif"];

/// Returns whether `path`'s extension matches one of the recognized image
/// extensions (see [`response::content_type_for`](crate::response::content_type_for)
/// for the full extension-to-content-type mapping).
pub fn is_image_path(path: &str) -> bool {
	IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Validate and parse a raw request buffer.
///
/// Only the request line and the header block are validated; any bytes
/// after the terminating blank line are left untouched for the caller to
/// treat as a request body (see [`split_body`]).
pub fn validate_request(buf: &[u8]) -> Result<ParsedRequest, RequestError> {
	let text = String::from_utf8_lossy(buf);

	let line_end = text.find("\r\n").ok_or(RequestError::MissingRequestLine)?;
	let request_line = &text[..line_end];

	let mut parts = request_line.splitn(3, ' ');
	let method_str = parts.next().ok_or(RequestError::MissingRequestLine)?;
	let target = parts.next().ok_or(RequestError::MissingRequestLine)?;
	let protocol = parts.next().ok_or(RequestError::MissingRequestLine)?;

	if method_str.is_empty() || method_str.len() > 8 {
		return Err(RequestError::InvalidMethod);
	}
	let method = method_str
		.parse::<Method>()
		.map_err(|_| RequestError::InvalidMethod)?;

	if target.is_empty() || !target.starts_with('/') {
		return Err(RequestError::InvalidTarget);
	}
	if target.len() > MAX_TARGET_LEN {
		return Err(RequestError::TargetTooLong);
	}

	if !protocol.starts_with("HTTP/") || protocol.len() < "HTTP/1.0".len() {
		return Err(RequestError::InvalidProtocol);
	}

	let headers_start = line_end + 2;
	let headers_end = text[headers_start..]
		.find("\r\n\r\n")
		.ok_or(RequestError::UnterminatedHeaders)?
		+ headers_start;

	for header_line in text[headers_start..headers_end].split("\r\n") {
		if header_line.is_empty() {
			continue;
		}
		if !header_line.contains(':') {
			return Err(RequestError::MalformedHeader);
		}
	}

	Ok(ParsedRequest {
		method,
		target: target.to_owned(),
		protocol: protocol.to_owned(),
		is_image: is_image_path(target),
	})
}

/// Given the raw buffer a request was parsed from, return the bytes
/// following the blank line that terminates the header block, i.e. the
/// request body, if present.
pub fn split_body(buf: &[u8]) -> Option<&[u8]> {
	let marker = b"\r\n\r\n";
	buf.windows(marker.len())
		.position(|window| window == marker)
		.map(|pos| &buf[pos + marker.len()..])
}
