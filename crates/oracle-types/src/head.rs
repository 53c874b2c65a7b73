//! Chain-head records.
//!
//! A head records the last block observed for a watched address. Only the VRF
//! family persists heads; the listener uses the stored block timestamp to
//! resume polling after a restart.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Block metadata returned by the full node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
	pub number: u64,
	pub hash: String,
	pub parent_hash: String,
	/// Block timestamp in milliseconds.
	pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainHead {
	/// Record identity, assigned by the head store on first insert.
	pub id: Option<u64>,
	pub address: String,
	pub block_number: u64,
	pub block_hash: String,
	pub parent_hash: String,
	pub block_timestamp: i64,
	pub updated_at: DateTime<Utc>,
}

impl ChainHead {
	pub fn from_block(address: impl Into<String>, block: &BlockInfo) -> Self {
		Self {
			id: None,
			address: address.into(),
			block_number: block.number,
			block_hash: block.hash.clone(),
			parent_hash: block.parent_hash.clone(),
			block_timestamp: block.timestamp,
			updated_at: Utc::now(),
		}
	}

	/// Moves this head to `block`, keeping its identity.
	pub fn advance_to(&mut self, block: &BlockInfo) {
		self.block_number = block.number;
		self.block_hash = block.hash.clone();
		self.parent_hash = block.parent_hash.clone();
		self.block_timestamp = block.timestamp;
		self.updated_at = Utc::now();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn block(number: u64) -> BlockInfo {
		BlockInfo {
			number,
			hash: format!("hash-{}", number),
			parent_hash: format!("hash-{}", number - 1),
			timestamp: 1_700_000_000_000 + number as i64 * 3000,
		}
	}

	#[test]
	fn test_advance_keeps_id() {
		let mut head = ChainHead::from_block("TAddr", &block(10));
		head.id = Some(7);

		head.advance_to(&block(12));

		assert_eq!(head.id, Some(7));
		assert_eq!(head.block_number, 12);
		assert_eq!(head.block_hash, "hash-12");
		assert_eq!(head.parent_hash, "hash-11");
		assert_eq!(head.block_timestamp, 1_700_000_036_000);
	}
}
