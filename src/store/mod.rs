//! The keyed store POST requests persist their bodies into, with a
//! pluggable backend (see [`backend::StoreBackend`]) behind a single
//! `Arc<dyn StoreBackend>` facade.

pub mod backend;
pub mod memory;
pub mod sled_backend;

use std::{path::Path, sync::Arc};

pub use backend::{StoreBackend, StoreError, COUNTER_KEY, POST_DATA_KEY};
pub use memory::MemoryStore;
pub use sled_backend::SledStore;

/// The keyed store used by the server, wrapping whichever
/// [`StoreBackend`] was configured.
#[derive(Debug, Clone)]
pub struct Store {
	backend: Arc<dyn StoreBackend>,
}

impl Store {
	/// Open the default `sled`-backed store at `path`.
	pub fn open(path: &Path) -> Result<Self, StoreError> {
		Ok(Self {
			backend: Arc::new(SledStore::open(path)?),
		})
	}

	/// Wrap an arbitrary [`StoreBackend`], e.g. [`MemoryStore`] in tests.
	pub fn with_backend(backend: Arc<dyn StoreBackend>) -> Self {
		Self { backend }
	}

	/// Atomically record a POST body; see [`StoreBackend::record_post`].
	pub async fn record_post(&self, body: Vec<u8>) -> Result<u64, StoreError> {
		self.backend.record_post(body).await
	}

	/// Fetch a value by key; see [`StoreBackend::get`].
	pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
		self.backend.get(key).await
	}

	/// Fetch the current counter value; see [`StoreBackend::counter`].
	pub async fn counter(&self) -> Result<u64, StoreError> {
		self.backend.counter().await
	}
}
