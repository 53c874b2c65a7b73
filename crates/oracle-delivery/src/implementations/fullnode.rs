//! Delivery through the full node's trigger and broadcast endpoints.

use async_trait::async_trait;
use oracle_account::AccountService;
use oracle_chain::transaction::{encode_signed_transaction, transaction_hash};
use oracle_chain::{FullNodeClient, TriggerRequest};
use oracle_types::{flatten_params, FulfillmentRequest, SignedTxReceipt};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::abi::encode_call;
use crate::{DeliveryError, DeliveryInterface};

/// Fee limit, in sun, attached to every fulfillment call.
pub const DEFAULT_FEE_LIMIT: u64 = 1_000_000_000;

pub struct FullNodeDelivery {
	client: FullNodeClient,
	account: Arc<AccountService>,
	fee_limit: u64,
}

impl FullNodeDelivery {
	pub fn new(client: FullNodeClient, account: Arc<AccountService>) -> Self {
		Self {
			client,
			account,
			fee_limit: DEFAULT_FEE_LIMIT,
		}
	}

	pub fn with_fee_limit(mut self, fee_limit: u64) -> Self {
		self.fee_limit = fee_limit;
		self
	}
}

#[async_trait]
impl DeliveryInterface for FullNodeDelivery {
	async fn fulfil(
		&self,
		request: &FulfillmentRequest,
	) -> Result<SignedTxReceipt, DeliveryError> {
		let owner = self.account.get_address().await?;
		let encoded = encode_call(&request.call);

		let trigger = TriggerRequest {
			owner_address: owner.to_base58(),
			contract_address: request.contract_address.to_base58(),
			function_selector: encoded.function_selector.to_string(),
			parameter: encoded.parameter,
			fee_limit: self.fee_limit,
			call_value: 0,
			visible: true,
		};

		let unsigned = self.client.trigger_smart_contract(&trigger).await?;
		let raw_data = hex::decode(&unsigned.raw_data_hex)
			.map_err(|e| DeliveryError::InvalidTransaction(format!("raw_data_hex: {}", e)))?;
		if raw_data.is_empty() {
			return Err(DeliveryError::InvalidTransaction(
				"node returned an empty transaction".to_string(),
			));
		}

		let hash = transaction_hash(&raw_data);
		let tx_hash_hex = hex::encode(hash);
		if !unsigned.tx_id.eq_ignore_ascii_case(&tx_hash_hex) {
			warn!(
				"Node reported txID {} but raw data hashes to {}",
				unsigned.tx_id, tx_hash_hex
			);
		}

		let signature = self.account.sign_hash(&hash).await?;
		let envelope = encode_signed_transaction(&raw_data, &[signature]);
		debug!(
			"Broadcasting {} bytes for {}",
			envelope.len(),
			trigger.function_selector
		);

		let remote_tx_id = self.client.broadcast_hex(&hex::encode(&envelope)).await?;
		info!(
			"Broadcast {} to {} as {}",
			trigger.function_selector, trigger.contract_address, remote_tx_id
		);

		Ok(SignedTxReceipt {
			from_address: trigger.owner_address.clone(),
			to_address: trigger.contract_address.clone(),
			remote_tx_id,
			signature_hex: hex::encode(signature),
			tx_hash_hex,
			encoded_args: flatten_params(&trigger.params()),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy::primitives::Bytes;
	use oracle_account::implementations::local::LocalWallet;
	use oracle_chain::ChainError;
	use oracle_types::TronAddress;
	use serde_json::{json, Value};
	use wiremock::matchers::{method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	const KEY: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";
	const RAW_DATA_HEX: &str = "0a02d4a12208b5a3c1f0e2d9a8b740e8c7a2b8c131";
	const COORDINATOR_HEX: &str = "41a614f803b6fd780986a42c78ec9c7f77e6ded13c";

	fn delivery(server: &MockServer) -> FullNodeDelivery {
		let wallet = LocalWallet::new(KEY).unwrap();
		FullNodeDelivery::new(
			FullNodeClient::new(server.uri()),
			Arc::new(AccountService::new(Box::new(wallet))),
		)
		.with_fee_limit(150_000_000)
	}

	fn vrf_request() -> FulfillmentRequest {
		FulfillmentRequest::vrf(
			TronAddress::from_hex(COORDINATOR_HEX).unwrap(),
			Bytes::from(vec![0xab; 8]),
		)
	}

	async fn mount_trigger(server: &MockServer) {
		let raw = hex::decode(RAW_DATA_HEX).unwrap();
		Mock::given(method("POST"))
			.and(path("/wallet/triggersmartcontract"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({
				"result": { "result": true },
				"transaction": {
					"txID": hex::encode(transaction_hash(&raw)),
					"raw_data_hex": RAW_DATA_HEX
				}
			})))
			.expect(1)
			.mount(server)
			.await;
	}

	#[tokio::test]
	async fn test_fulfil_signs_and_broadcasts() {
		let server = MockServer::start().await;
		mount_trigger(&server).await;
		Mock::given(method("POST"))
			.and(path("/wallet/broadcasthex"))
			.respond_with(
				ResponseTemplate::new(200)
					.set_body_json(json!({ "result": true, "txid": "c0ffee" })),
			)
			.expect(1)
			.mount(&server)
			.await;

		let request = vrf_request();
		let receipt = delivery(&server).fulfil(&request).await.unwrap();

		let owner = TronAddress::from_hex("417e5f4552091a69125d5dfcb7b8c2659029395bdf").unwrap();
		assert_eq!(receipt.remote_tx_id, "c0ffee");
		assert_eq!(receipt.to_address, request.contract_address.to_base58());
		assert_eq!(receipt.from_address, owner.to_base58());
		let raw = hex::decode(RAW_DATA_HEX).unwrap();
		assert_eq!(receipt.tx_hash_hex, hex::encode(transaction_hash(&raw)));
		assert_eq!(receipt.signature_hex.len(), 130);
		assert!(receipt
			.encoded_args
			.contains("function_selector=fulfillRandomnessRequest(bytes)"));
		assert!(receipt.encoded_args.contains("fee_limit=150000000"));
		assert!(receipt.encoded_args.contains("call_value=0"));

		let requests = server.received_requests().await.unwrap();
		let trigger: Value = serde_json::from_slice(&requests[0].body).unwrap();
		assert_eq!(trigger["owner_address"], owner.to_base58());
		assert_eq!(trigger["visible"], true);
		assert_eq!(trigger["call_value"], 0);

		let broadcast: Value = serde_json::from_slice(&requests[1].body).unwrap();
		let envelope = hex::decode(broadcast["transaction"].as_str().unwrap()).unwrap();
		let signature = hex::decode(&receipt.signature_hex).unwrap();
		let mut expected = vec![0x0a, raw.len() as u8];
		expected.extend_from_slice(&raw);
		expected.extend_from_slice(&[0x12, 0x41]);
		expected.extend_from_slice(&signature);
		assert_eq!(envelope, expected);
	}

	#[tokio::test]
	async fn test_broadcast_rejection_is_returned_once() {
		let server = MockServer::start().await;
		mount_trigger(&server).await;
		Mock::given(method("POST"))
			.and(path("/wallet/broadcasthex"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({
				"result": false,
				"code": "TRANSACTION_EXPIRATION_ERROR",
				"message": hex::encode("transaction expired")
			})))
			.expect(1)
			.mount(&server)
			.await;

		let err = delivery(&server).fulfil(&vrf_request()).await.unwrap_err();
		assert!(matches!(err, DeliveryError::Chain(ChainError::Rejected(_))));
	}

	#[tokio::test]
	async fn test_malformed_raw_data_stops_before_broadcast() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/wallet/triggersmartcontract"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({
				"result": { "result": true },
				"transaction": { "txID": "00", "raw_data_hex": "not-hex" }
			})))
			.mount(&server)
			.await;
		Mock::given(method("POST"))
			.and(path("/wallet/broadcasthex"))
			.respond_with(ResponseTemplate::new(200))
			.expect(0)
			.mount(&server)
			.await;

		let err = delivery(&server).fulfil(&vrf_request()).await.unwrap_err();
		assert!(matches!(err, DeliveryError::InvalidTransaction(_)));
	}

	#[tokio::test]
	async fn test_trigger_rejection_propagates() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/wallet/triggersmartcontract"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({
				"result": { "code": "CONTRACT_VALIDATE_ERROR", "message": hex::encode("balance is not sufficient") }
			})))
			.mount(&server)
			.await;

		let err = delivery(&server).fulfil(&vrf_request()).await.unwrap_err();
		assert_eq!(
			err.to_string(),
			"Chain error: Rejected by node: balance is not sufficient"
		);
	}
}
