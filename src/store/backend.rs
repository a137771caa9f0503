//! The trait implemented by each keyed-store backend.

use async_trait::async_trait;
use thiserror::Error;

/// Errors a [`StoreBackend`] can return.
#[derive(Debug, Error)]
pub enum StoreError {
	/// The underlying storage engine failed.
	#[error("store backend error: {0}")]
	Backend(String),
}

/// The reserved key holding the monotonically increasing POST counter.
pub const COUNTER_KEY: &str = "__counter__";
/// The reserved key always holding the most recently POSTed body, matching
/// the default key used by the reference implementation's inspection tool.
pub const POST_DATA_KEY: &str = "post_data";

/// A keyed store backend used to persist POST request bodies.
///
/// Implementations must make [`record_post`](StoreBackend::record_post)
/// atomic: bumping the counter, inserting the numbered key, and updating
/// [`POST_DATA_KEY`] all happen, or none of them do.
#[async_trait]
pub trait StoreBackend: std::fmt::Debug + Send + Sync {
	/// Atomically record a POST body under the next counter value, and
	/// update [`POST_DATA_KEY`] to point at it. Returns the counter value
	/// used as the new entry's key.
	async fn record_post(&self, body: Vec<u8>) -> Result<u64, StoreError>;

	/// Fetch the value stored under an arbitrary key, if any.
	async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

	/// Fetch the current counter value. Callers must tolerate this
	/// returning `0` both when no POST has ever been recorded and when the
	/// counter key is missing or unreadable for some other reason — the
	/// two cases are not distinguished.
	async fn counter(&self) -> Result<u64, StoreError>;
}
