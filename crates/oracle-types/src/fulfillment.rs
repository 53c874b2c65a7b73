//! Fulfillment requests and the receipts produced by broadcasting them.

use alloy::primitives::{Bytes, FixedBytes, B256, U256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::TronAddress;

/// Arguments of an oracle-request fulfillment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleFulfillment {
	pub request_id: B256,
	pub payment: U256,
	pub callback_address: TronAddress,
	pub callback_function_id: FixedBytes<4>,
	pub expiration: U256,
	pub data: B256,
}

/// The contract call carried by a fulfillment transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FulfillmentCall {
	Oracle(OracleFulfillment),
	/// Randomness fulfillment carrying the serialized VRF proof.
	Vrf { proof: Bytes },
}

/// A fulfillment to submit to an oracle or coordinator contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FulfillmentRequest {
	pub contract_address: TronAddress,
	pub call: FulfillmentCall,
}

impl FulfillmentRequest {
	pub fn oracle(contract_address: TronAddress, args: OracleFulfillment) -> Self {
		Self {
			contract_address,
			call: FulfillmentCall::Oracle(args),
		}
	}

	pub fn vrf(contract_address: TronAddress, proof: impl Into<Bytes>) -> Self {
		Self {
			contract_address,
			call: FulfillmentCall::Vrf {
				proof: proof.into(),
			},
		}
	}
}

/// Record of a broadcast fulfillment transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTxReceipt {
	/// Base58 address of the signing account.
	pub from_address: String,
	/// Base58 address of the called contract.
	pub to_address: String,
	/// Transaction id reported by the full node.
	pub remote_tx_id: String,
	/// Hex of the 65-byte recoverable signature.
	pub signature_hex: String,
	/// Hex of the SHA-256 digest of the raw transaction.
	pub tx_hash_hex: String,
	/// Trigger parameters as `key=value` pairs joined by `,`.
	pub encoded_args: String,
}

/// Joins parameters as `key=value` pairs separated by `,`, in key order.
pub fn flatten_params(params: &BTreeMap<String, String>) -> String {
	params
		.iter()
		.map(|(k, v)| format!("{}={}", k, v))
		.collect::<Vec<_>>()
		.join(",")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_flatten_params() {
		let mut params = BTreeMap::new();
		params.insert("fee_limit".to_string(), "100".to_string());
		params.insert("call_value".to_string(), "0".to_string());
		params.insert("visible".to_string(), "true".to_string());

		assert_eq!(
			flatten_params(&params),
			"call_value=0,fee_limit=100,visible=true"
		);
		assert_eq!(flatten_params(&BTreeMap::new()), "");
	}

	#[test]
	fn test_vrf_request_constructor() {
		let contract = TronAddress([0x41; 21]);
		let request = FulfillmentRequest::vrf(contract, vec![1u8, 2, 3]);
		assert_eq!(
			request.call,
			FulfillmentCall::Vrf {
				proof: Bytes::from(vec![1u8, 2, 3])
			}
		);
	}
}
