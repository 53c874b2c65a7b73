//! In-memory storage backend with TTL support.

use crate::{StorageError, StorageInterface};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

type Entries = HashMap<String, (Vec<u8>, Option<Instant>)>;

/// Volatile storage for tests and single-run deployments.
#[derive(Debug, Default)]
pub struct MemoryStorage {
	entries: RwLock<Entries>,
}

impl MemoryStorage {
	pub fn new() -> Self {
		Self::default()
	}
}

fn is_live(expires_at: &Option<Instant>) -> bool {
	expires_at.map_or(true, |at| Instant::now() < at)
}

#[async_trait]
impl StorageInterface for MemoryStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let entries = self.entries.read().await;
		match entries.get(key) {
			Some((value, expires_at)) if is_live(expires_at) => Ok(value.clone()),
			_ => Err(StorageError::NotFound),
		}
	}

	async fn set_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<(), StorageError> {
		let expires_at = ttl.map(|ttl| Instant::now() + ttl);
		let mut entries = self.entries.write().await;
		entries.retain(|_, (_, at)| is_live(at));
		entries.insert(key.to_string(), (value, expires_at));
		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		self.entries.write().await.remove(key);
		Ok(())
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		let entries = self.entries.read().await;
		Ok(entries.get(key).is_some_and(|(_, at)| is_live(at)))
	}
}
