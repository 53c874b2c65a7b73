//! Transaction hashing and signed envelope encoding.
//!
//! The full node returns the unsigned transaction as the hex of its serialized
//! `raw_data`. The transaction id is the SHA-256 of those bytes, and the signed
//! transaction is the protobuf `Transaction` message carrying the raw bytes
//! and the signatures over its id.

use prost::Message;
use sha2::{Digest, Sha256};

/// Wire form of a signed transaction. Only the envelope fields are modelled;
/// `raw_data` stays opaque bytes as returned by the full node.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SignedTransaction {
	#[prost(bytes = "vec", tag = "1")]
	pub raw_data: Vec<u8>,
	#[prost(bytes = "vec", repeated, tag = "2")]
	pub signature: Vec<Vec<u8>>,
}

/// SHA-256 digest of the serialized raw transaction.
pub fn transaction_hash(raw_data: &[u8]) -> [u8; 32] {
	Sha256::digest(raw_data).into()
}

/// Encodes the signed transaction envelope.
pub fn encode_signed_transaction(raw_data: &[u8], signatures: &[[u8; 65]]) -> Vec<u8> {
	SignedTransaction {
		raw_data: raw_data.to_vec(),
		signature: signatures.iter().map(|s| s.to_vec()).collect(),
	}
	.encode_to_vec()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_hash_is_sha256() {
		assert_eq!(
			hex::encode(transaction_hash(b"abc")),
			"ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
		);
	}

	#[test]
	fn test_signed_envelope_layout() {
		let raw = [0xaa, 0xbb, 0xcc];
		let signature = [0x11u8; 65];

		let encoded = encode_signed_transaction(&raw, &[signature]);

		assert_eq!(&encoded[..5], &[0x0a, 0x03, 0xaa, 0xbb, 0xcc]);
		assert_eq!(&encoded[5..7], &[0x12, 0x41]);
		assert_eq!(&encoded[7..], &signature[..]);
	}

	#[test]
	fn test_long_raw_data_uses_multibyte_length() {
		let raw = vec![0u8; 200];
		let encoded = encode_signed_transaction(&raw, &[]);
		assert_eq!(&encoded[..3], &[0x0a, 0xc8, 0x01]);
		assert_eq!(encoded.len(), 203);
	}

	#[test]
	fn test_envelope_decodes_with_every_signature() {
		let raw = b"raw transaction".to_vec();
		let encoded = encode_signed_transaction(&raw, &[[0x01; 65], [0x02; 65]]);

		let decoded = SignedTransaction::decode(encoded.as_slice()).unwrap();
		assert_eq!(decoded.raw_data, raw);
		assert_eq!(decoded.signature, vec![vec![0x01; 65], vec![0x02; 65]]);
	}
}
