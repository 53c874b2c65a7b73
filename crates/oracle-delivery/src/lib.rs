//! Fulfillment delivery for the oracle node.
//!
//! A fulfillment is delivered by asking the full node to build the contract
//! call, signing the resulting transaction hash with the node account and
//! broadcasting the signed envelope. Failures are returned to the caller as
//! they happen; nothing in this crate retries.

use async_trait::async_trait;
use oracle_account::AccountError;
use oracle_chain::ChainError;
use oracle_types::{FulfillmentRequest, SignedTxReceipt};
use thiserror::Error;

pub mod abi;

pub mod implementations {
	pub mod fullnode;
}

#[derive(Debug, Error)]
pub enum DeliveryError {
	#[error("Account error: {0}")]
	Account(#[from] AccountError),
	#[error("Chain error: {0}")]
	Chain(#[from] ChainError),
	#[error("Invalid transaction: {0}")]
	InvalidTransaction(String),
}

#[async_trait]
pub trait DeliveryInterface: Send + Sync {
	/// Builds, signs and broadcasts the fulfillment transaction.
	async fn fulfil(&self, request: &FulfillmentRequest)
		-> Result<SignedTxReceipt, DeliveryError>;
}

pub struct DeliveryService {
	provider: Box<dyn DeliveryInterface>,
}

impl DeliveryService {
	pub fn new(provider: Box<dyn DeliveryInterface>) -> Self {
		Self { provider }
	}

	pub async fn deliver(
		&self,
		request: &FulfillmentRequest,
	) -> Result<SignedTxReceipt, DeliveryError> {
		self.provider.fulfil(request).await
	}
}
