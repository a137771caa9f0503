//! Integration tests for POST persistence into the keyed store.

mod util;

use std::{
	io::{Read as _, Write as _},
	net::TcpStream,
};

use hyperfiled::store::{COUNTER_KEY, POST_DATA_KEY};

#[tokio::test]
async fn post_is_persisted_with_no_response_body() {
	let dir = tempfile::tempdir().unwrap();
	let (addr, _exit, store) = util::start_server(dir.path().to_owned()).await;

	let body = "hello from a test";
	let request = format!(
		"POST /submit HTTP/1.0\r\nContent-Length: {}\r\n\r\n{body}",
		body.len()
	);

	let response = send_request(addr, &request);
	assert!(response.is_empty(), "POST must not emit a response body");

	assert_eq!(store.get("0").await.unwrap(), Some(body.as_bytes().to_vec()));
	assert_eq!(store.get(POST_DATA_KEY).await.unwrap(), Some(body.as_bytes().to_vec()));
	assert_eq!(store.get(COUNTER_KEY).await.unwrap(), Some(b"1".to_vec()));
}

#[tokio::test]
async fn successive_posts_get_increasing_entries() {
	let dir = tempfile::tempdir().unwrap();
	let (addr, _exit, store) = util::start_server(dir.path().to_owned()).await;

	for (i, body) in ["first", "second", "third"].iter().enumerate() {
		let request = format!(
			"POST /submit HTTP/1.0\r\nContent-Length: {}\r\n\r\n{body}",
			body.len()
		);
		let response = send_request(addr, &request);
		assert!(response.is_empty(), "POST must not emit a response body");
		assert_eq!(store.get(&i.to_string()).await.unwrap(), Some(body.as_bytes().to_vec()));
	}

	assert_eq!(store.counter().await.unwrap(), 3);
}

fn send_request(addr: std::net::SocketAddr, request: &str) -> String {
	let mut stream = TcpStream::connect(addr).unwrap();
	stream.write_all(request.as_bytes()).unwrap();
	stream.shutdown(std::net::Shutdown::Write).unwrap();

	let mut response = String::new();
	stream.read_to_string(&mut response).unwrap();
	response
}
