//! Local private-key signer.

use crate::{AccountError, RecoverableSignature, SignerInterface};
use alloy::primitives::B256;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use async_trait::async_trait;
use oracle_types::TronAddress;

/// Wallet holding a secp256k1 private key in memory.
pub struct LocalWallet {
	signer: PrivateKeySigner,
}

impl LocalWallet {
	/// Creates a wallet from a hex-encoded private key, with or without `0x`.
	pub fn new(private_key_hex: &str) -> Result<Self, AccountError> {
		let key = private_key_hex.trim();
		let key = key.strip_prefix("0x").unwrap_or(key);
		if key.len() != 64 || hex::decode(key).is_err() {
			return Err(AccountError::InvalidKey(
				"private key must be 64 hex characters".to_string(),
			));
		}

		let signer = key
			.parse::<PrivateKeySigner>()
			.map_err(|e| AccountError::InvalidKey(format!("Invalid private key: {}", e)))?;

		Ok(Self { signer })
	}
}

#[async_trait]
impl SignerInterface for LocalWallet {
	async fn address(&self) -> Result<TronAddress, AccountError> {
		Ok(TronAddress::from_evm(self.signer.address()))
	}

	async fn sign_hash(&self, hash: &[u8; 32]) -> Result<RecoverableSignature, AccountError> {
		let signature = self
			.signer
			.sign_hash(&B256::from(*hash))
			.await
			.map_err(|e| AccountError::SigningFailed(format!("Failed to sign hash: {}", e)))?;

		let mut out = [0u8; 65];
		out[..32].copy_from_slice(&signature.r().to_be_bytes::<32>());
		out[32..64].copy_from_slice(&signature.s().to_be_bytes::<32>());
		out[64] = signature.v() as u8;
		Ok(out)
	}
}
