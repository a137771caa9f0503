//! Integration tests for GET/HEAD file serving.

mod util;

use std::{
	io::{Read as _, Write as _},
	net::TcpStream,
};

#[tokio::test]
async fn serves_index_html_for_root() {
	let dir = tempfile::tempdir().unwrap();
	std::fs::write(dir.path().join("index.html"), "<p>hello</p>").unwrap();

	let (addr, _exit, _store) = util::start_server(dir.path().to_owned()).await;

	let response = send_request(addr, "GET / HTTP/1.0\r\n\r\n");
	assert!(response.starts_with("HTTP/1.0 200 OK"));
	assert!(response.contains("Content-Type: text/html"));
	assert!(response.ends_with("<p>hello</p>"));
}

#[tokio::test]
async fn serves_named_text_file_with_matching_content_type() {
	let dir = tempfile::tempdir().unwrap();
	std::fs::write(dir.path().join("note.txt"), "plain text body").unwrap();

	let (addr, _exit, _store) = util::start_server(dir.path().to_owned()).await;

	let response = send_request(addr, "GET /note.txt HTTP/1.0\r\n\r\n");
	assert!(response.starts_with("HTTP/1.0 200 OK"));
	assert!(response.contains("Content-Type: text/plain"));
	assert!(response.ends_with("plain text body"));
}

#[tokio::test]
async fn serves_image_extension_via_streamed_path() {
	let dir = tempfile::tempdir().unwrap();
	let bytes: &[u8] = &[0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10];
	std::fs::write(dir.path().join("photo.jpg"), bytes).unwrap();

	let (addr, _exit, _store) = util::start_server(dir.path().to_owned()).await;

	let mut stream = TcpStream::connect(addr).unwrap();
	stream.write_all(b"GET /photo.jpg HTTP/1.0\r\n\r\n").unwrap();
	stream.shutdown(std::net::Shutdown::Write).unwrap();

	let mut response = Vec::new();
	stream.read_to_end(&mut response).unwrap();

	let split = response.windows(4).position(|w| w == b"\r\n\r\n").unwrap() + 4;
	let (headers, body) = response.split_at(split);
	let headers = String::from_utf8_lossy(headers);
	assert!(headers.starts_with("HTTP/1.0 200 OK"));
	assert!(headers.contains("Content-Type: image/jpeg"));
	assert_eq!(body, bytes);
}

#[tokio::test]
async fn returns_404_for_missing_file() {
	let dir = tempfile::tempdir().unwrap();
	let (addr, _exit, _store) = util::start_server(dir.path().to_owned()).await;

	let response = send_request(addr, "GET /nope.html HTTP/1.0\r\n\r\n");
	assert!(response.starts_with("HTTP/1.0 404 Not Found"));
}

#[tokio::test]
async fn head_request_omits_body() {
	let dir = tempfile::tempdir().unwrap();
	std::fs::write(dir.path().join("index.html"), "<p>hello</p>").unwrap();

	let (addr, _exit, _store) = util::start_server(dir.path().to_owned()).await;

	let response = send_request(addr, "HEAD / HTTP/1.0\r\n\r\n");
	assert!(response.starts_with("HTTP/1.0 200 OK"));
	assert!(response.contains("Content-Length: 12"));
	assert!(response.ends_with("\r\n\r\n"));
}

fn send_request(addr: std::net::SocketAddr, request: &str) -> String {
	let mut stream = TcpStream::connect(addr).unwrap();
	stream.write_all(request.as_bytes()).unwrap();
	stream.shutdown(std::net::Shutdown::Write).unwrap();

	let mut response = String::new();
	stream.read_to_string(&mut response).unwrap();
	response
}
