//! Per-address polling cursors.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// High-water-mark block timestamps, one per watched address.
///
/// A cursor only ever moves forward. Addresses without a cursor are seeded by
/// the listener from the lookback window or the stored chain head.
#[derive(Debug, Default)]
pub struct CursorStore {
	cursors: DashMap<String, i64>,
}

impl CursorStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get(&self, address: &str) -> Option<i64> {
		self.cursors.get(address).map(|c| *c)
	}

	/// Moves the cursor to `timestamp` if it is ahead of the current value.
	///
	/// Returns whether the cursor moved.
	pub fn advance(&self, address: &str, timestamp: i64) -> bool {
		match self.cursors.entry(address.to_string()) {
			Entry::Occupied(mut entry) => {
				if timestamp > *entry.get() {
					entry.insert(timestamp);
					true
				} else {
					false
				}
			}
			Entry::Vacant(entry) => {
				entry.insert(timestamp);
				true
			}
		}
	}

	pub fn remove(&self, address: &str) {
		self.cursors.remove(address);
	}
}
