//! A `sled`-backed [`StoreBackend`], persisting entries to a directory on
//! disk. This is the default backend, the Rust-native analog of the
//! `ndbm`-backed `requests_db` file pair used by the reference
//! implementation's inspection tool.

use std::path::Path;

use async_trait::async_trait;
use sled::{transaction::TransactionError, Db};
use tracing::instrument;

use super::backend::{StoreBackend, StoreError, COUNTER_KEY, POST_DATA_KEY};

/// A keyed store backed by an on-disk `sled` database.
#[derive(Debug, Clone)]
pub struct SledStore {
	db: Db,
}

impl SledStore {
	/// Open (creating if necessary) a `sled` database at `path`.
	pub fn open(path: &Path) -> Result<Self, StoreError> {
		let db = sled::open(path).map_err(|e| StoreError::Backend(e.to_string()))?;
		Ok(Self { db })
	}
}

fn record_post_tx(db: &Db, body: &[u8]) -> Result<u64, TransactionError<StoreError>> {
	db.transaction(|tx| {
		let counter = tx
			.get(COUNTER_KEY)?
			.and_then(|v| std::str::from_utf8(&v).ok().and_then(|s| s.parse::<u64>().ok()))
			.unwrap_or(0);

		tx.insert(counter.to_string().as_bytes(), body)?;
		tx.insert(COUNTER_KEY, (counter + 1).to_string().as_bytes())?;
		tx.insert(POST_DATA_KEY, body)?;

		Ok(counter)
	})
}

#[async_trait]
impl StoreBackend for SledStore {
	#[instrument(level = "trace", skip(self, body), fields(body_len = body.len()), err)]
	async fn record_post(&self, body: Vec<u8>) -> Result<u64, StoreError> {
		let db = self.db.clone();

		tokio::task::spawn_blocking(move || record_post_tx(&db, &body))
			.await
			.map_err(|e| StoreError::Backend(e.to_string()))?
			.map_err(|e| match e {
				TransactionError::Abort(inner) => inner,
				TransactionError::Storage(inner) => StoreError::Backend(inner.to_string()),
			})
	}

	#[instrument(level = "trace", skip(self), err)]
	async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
		let db = self.db.clone();
		let key = key.to_owned();

		tokio::task::spawn_blocking(move || db.get(key.as_bytes()))
			.await
			.map_err(|e| StoreError::Backend(e.to_string()))?
			.map(|opt| opt.map(|ivec| ivec.to_vec()))
			.map_err(|e| StoreError::Backend(e.to_string()))
	}

	#[instrument(level = "trace", skip(self), err)]
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

	fn temp_store() -> SledStore {
		let dir = tempfile_dir();
		SledStore::open(&dir).unwrap()
	}

	fn tempfile_dir() -> std::path::PathBuf {
		let mut path = std::env::temp_dir();
		path.push(format!("hyperfiled-sled-test-{}", rand::random::<u64>()));
		path
	}

	#[tokio::test]
	async fn counter_increments_per_post() {
		let store = temp_store();

		assert_eq!(store.record_post(b"one".to_vec()).await.unwrap(), 0);
		assert_eq!(store.record_post(b"two".to_vec()).await.unwrap(), 1);
		assert_eq!(store.counter().await.unwrap(), 2);
	}

	#[tokio::test]
	async fn post_data_tracks_latest() {
		let store = temp_store();

		store.record_post(b"first".to_vec()).await.unwrap();
		store.record_post(b"second".to_vec()).await.unwrap();

		assert_eq!(
			store.get(POST_DATA_KEY).await.unwrap(),
			Some(b"second".to_vec())
		);
	}

	#[tokio::test]
	async fn numbered_keys_preserve_each_body() {
		let store = temp_store();

		store.record_post(b"zero".to_vec()).await.unwrap();
		store.record_post(b"one".to_vec()).await.unwrap();

		assert_eq!(store.get("0").await.unwrap(), Some(b"zero".to_vec()));
		assert_eq!(store.get("1").await.unwrap(), Some(b"one".to_vec()));
	}
}
