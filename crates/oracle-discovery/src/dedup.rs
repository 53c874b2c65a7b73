//! Time-bounded record of handled requests.

use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use std::time::Duration;

pub const DEFAULT_CAPACITY: usize = 10_000;
pub const DEFAULT_TTL: Duration = Duration::from_secs(12 * 60 * 60);

/// Write-once set of processed request keys.
///
/// Entries expire a fixed time after they are first marked. When the cache is
/// full the least recently marked entry is evicted.
pub struct DedupCache {
	entries: Cache<String, ()>,
}

impl Default for DedupCache {
	fn default() -> Self {
		Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
	}
}

impl DedupCache {
	pub fn new(capacity: usize, ttl: Duration) -> Self {
		let entries = Cache::builder()
			.max_capacity(capacity.max(1) as u64)
			.time_to_live(ttl)
			.eviction_policy(EvictionPolicy::lru())
			.build();
		Self { entries }
	}

	pub fn seen(&self, key: &str) -> bool {
		self.entries.contains_key(key)
	}

	/// Records `key` as handled. Marking a live key again keeps its original
	/// expiry.
	pub fn mark(&self, key: &str) {
		self.entries.entry(key.to_string()).or_insert(());
	}

	/// Number of live entries, after applying pending evictions.
	pub fn len(&self) -> usize {
		self.entries.run_pending_tasks();
		self.entries.entry_count() as usize
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
