//! Key custody for the oracle node.
//!
//! The node never touches key material directly: it asks a [`SignerInterface`]
//! for the account address and for signatures over transaction hashes.

use async_trait::async_trait;
use oracle_types::TronAddress;
use thiserror::Error;

pub mod implementations {
	pub mod local;
}

/// A 65-byte recoverable signature laid out as `r || s || recid`.
pub type RecoverableSignature = [u8; 65];

#[derive(Debug, Error)]
pub enum AccountError {
	#[error("Signing failed: {0}")]
	SigningFailed(String),
	#[error("Invalid key: {0}")]
	InvalidKey(String),
}

/// Signing capability backing the node's account.
#[async_trait]
pub trait SignerInterface: Send + Sync {
	async fn address(&self) -> Result<TronAddress, AccountError>;

	/// Signs a 32-byte digest without any message prefixing.
	async fn sign_hash(&self, hash: &[u8; 32]) -> Result<RecoverableSignature, AccountError>;
}

pub struct AccountService {
	provider: Box<dyn SignerInterface>,
}

impl AccountService {
	pub fn new(provider: Box<dyn SignerInterface>) -> Self {
		Self { provider }
	}

	pub async fn get_address(&self) -> Result<TronAddress, AccountError> {
		self.provider.address().await
	}

	pub async fn sign_hash(&self, hash: &[u8; 32]) -> Result<RecoverableSignature, AccountError> {
		self.provider.sign_hash(hash).await
	}
}
