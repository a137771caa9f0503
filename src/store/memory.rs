//! An in-memory [`StoreBackend`], used in tests in place of the `sled`
//! backend.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::backend::{StoreBackend, StoreError, COUNTER_KEY, POST_DATA_KEY};

/// A keyed store held entirely in memory, for tests that don't need
/// anything persisted to disk.
#[derive(Debug, Default)]
pub struct MemoryStore {
	entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
	/// Create an empty in-memory store.
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl StoreBackend for MemoryStore {
	async fn record_post(&self, body: Vec<u8>) -> Result<u64, StoreError> {
		let mut entries = self.entries.write();

		let counter = entries
			.get(COUNTER_KEY)
			.and_then(|v| std::str::from_utf8(v).ok().and_then(|s| s.parse::<u64>().ok()))
			.unwrap_or(0);

		entries.insert(counter.to_string(), body.clone());
		entries.insert(COUNTER_KEY.to_owned(), (counter + 1).to_string().into_bytes());
		entries.insert(POST_DATA_KEY.to_owned(), body);

		Ok(counter)
	}

	async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
		Ok(self.entries.read().get(key).cloned())
	}

	async fn counter(&self) -> Result<u64, StoreError> {
		Ok(self
			.get(COUNTER_KEY)
			.await?
			.and_then(|v| std::str::from_utf8(&v).ok().and_then(|s| s.parse::<u64>().ok()))
			.unwrap_or(0))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn counter_increments_per_post() {
		let store = MemoryStore::new();

		assert_eq!(store.record_post(b"one".to_vec()).await.unwrap(), 0);
		assert_eq!(store.record_post(b"two".to_vec()).await.unwrap(), 1);
		assert_eq!(store.counter().await.unwrap(), 2);
	}

	#[tokio::test]
	async fn missing_key_is_not_an_error() {
		let store = MemoryStore::new();
		assert_eq!(store.get("nope").await.unwrap(), None);
	}
}
