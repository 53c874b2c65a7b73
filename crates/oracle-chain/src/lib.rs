//! Full-node access for the oracle node.
//!
//! This crate wraps the full node's HTTP wallet API (contract triggering,
//! broadcasting and block lookup), provides the bounded retry combinator shared
//! with the event fetcher, and encodes signed transactions for broadcast.
//!
//! # Modules
//!
//! - `client`: HTTP client for the `/wallet/*` endpoints
//! - `transaction`: transaction hashing and signed envelope encoding
//! - `utils`: linear backoff and the retry helper built on it

use async_trait::async_trait;
use oracle_types::BlockInfo;
use thiserror::Error;

pub mod client;
pub mod transaction;
pub mod utils;

pub use client::{FullNodeClient, TriggerRequest, TriggeredTransaction};
pub use utils::{retry_with_backoff, LinearBackoff, RetryPolicy};

/// Errors raised while talking to the full node.
#[derive(Debug, Error)]
pub enum ChainError {
	/// Transport failure or non-success HTTP status.
	#[error("HTTP error: {0}")]
	Http(String),
	/// The response body could not be understood.
	#[error("Invalid response: {0}")]
	InvalidResponse(String),
	/// The node accepted the request but refused to act on it.
	#[error("Rejected by node: {0}")]
	Rejected(String),
	#[error("Block {0} not found")]
	BlockNotFound(u64),
}

/// Source of block metadata by height.
#[async_trait]
pub trait BlockSource: Send + Sync {
	async fn block_by_number(&self, number: u64) -> Result<BlockInfo, ChainError>;
}
