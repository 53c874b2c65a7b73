//! HTTP client for the full node wallet API.

use async_trait::async_trait;
use oracle_types::BlockInfo;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::debug;

use crate::utils::{retry_with_backoff, RetryPolicy};
use crate::{BlockSource, ChainError};

/// Parameters of a `triggersmartcontract` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerRequest {
	pub owner_address: String,
	pub contract_address: String,
	pub function_selector: String,
	/// ABI-encoded arguments as hex, without the 4-byte selector.
	pub parameter: String,
	pub fee_limit: u64,
	pub call_value: u64,
	pub visible: bool,
}

impl TriggerRequest {
	/// The request fields as string pairs, ordered by key.
	pub fn params(&self) -> BTreeMap<String, String> {
		let mut params = BTreeMap::new();
		params.insert("owner_address".to_string(), self.owner_address.clone());
		params.insert("contract_address".to_string(), self.contract_address.clone());
		params.insert("function_selector".to_string(), self.function_selector.clone());
		params.insert("parameter".to_string(), self.parameter.clone());
		params.insert("fee_limit".to_string(), self.fee_limit.to_string());
		params.insert("call_value".to_string(), self.call_value.to_string());
		params.insert("visible".to_string(), self.visible.to_string());
		params
	}
}

/// Unsigned transaction built by the node for a contract call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggeredTransaction {
	pub tx_id: String,
	pub raw_data_hex: String,
}

#[derive(Debug, Deserialize)]
struct TriggerResponse {
	#[serde(default)]
	result: Option<TriggerResult>,
	#[serde(default)]
	transaction: Option<TriggerTransaction>,
}

#[derive(Debug, Deserialize)]
struct TriggerResult {
	#[serde(default)]
	result: bool,
	#[serde(default)]
	message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TriggerTransaction {
	#[serde(rename = "txID")]
	tx_id: String,
	raw_data_hex: String,
}

#[derive(Debug, Deserialize)]
struct BroadcastResponse {
	#[serde(default)]
	result: bool,
	#[serde(default)]
	txid: Option<String>,
	#[serde(default)]
	code: Option<String>,
	#[serde(default)]
	message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BlockResponse {
	#[serde(rename = "blockID")]
	block_id: Option<String>,
	block_header: Option<BlockHeader>,
}

#[derive(Debug, Deserialize)]
struct BlockHeader {
	raw_data: BlockRawData,
}

#[derive(Debug, Deserialize)]
struct BlockRawData {
	#[serde(default)]
	number: Option<u64>,
	#[serde(rename = "parentHash")]
	parent_hash: String,
	timestamp: i64,
}

/// Client for one full node's HTTP API.
#[derive(Debug, Clone)]
pub struct FullNodeClient {
	http: Client,
	base_url: String,
	retry: RetryPolicy,
}

impl FullNodeClient {
	pub fn new(base_url: impl Into<String>) -> Self {
		Self::with_client(Client::new(), base_url)
	}

	pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
		Self {
			http,
			base_url: base_url.into().trim_end_matches('/').to_string(),
			retry: RetryPolicy::default(),
		}
	}

	/// Sets the retry policy used for block lookups.
	pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
		self.retry = retry;
		self
	}

	/// Asks the node to build an unsigned contract-call transaction.
	pub async fn trigger_smart_contract(
		&self,
		request: &TriggerRequest,
	) -> Result<TriggeredTransaction, ChainError> {
		let response: TriggerResponse = self.post("wallet/triggersmartcontract", request).await?;

		let result = response.result.ok_or_else(|| {
			ChainError::InvalidResponse("trigger response has no result".to_string())
		})?;
		if !result.result {
			return Err(ChainError::Rejected(decode_message(
				result.message.as_deref().unwrap_or("unknown error"),
			)));
		}

		let transaction = response.transaction.ok_or_else(|| {
			ChainError::InvalidResponse("trigger response has no transaction".to_string())
		})?;
		debug!("Node built transaction {}", transaction.tx_id);

		Ok(TriggeredTransaction {
			tx_id: transaction.tx_id,
			raw_data_hex: transaction.raw_data_hex,
		})
	}

	/// Broadcasts a hex-encoded signed transaction and returns its id.
	pub async fn broadcast_hex(&self, transaction_hex: &str) -> Result<String, ChainError> {
		let response: BroadcastResponse = self
			.post("wallet/broadcasthex", &json!({ "transaction": transaction_hex }))
			.await?;

		if !response.result {
			let message = response
				.message
				.as_deref()
				.map(decode_message)
				.unwrap_or_default();
			return Err(ChainError::Rejected(format!(
				"{}: {}",
				response.code.as_deref().unwrap_or("UNKNOWN"),
				message
			)));
		}

		response.txid.ok_or_else(|| {
			ChainError::InvalidResponse("broadcast response has no txid".to_string())
		})
	}

	/// Looks up a block by height, retrying on failure or an empty answer.
	pub async fn get_block_by_num(&self, number: u64) -> Result<BlockInfo, ChainError> {
		retry_with_backoff(&self.retry, "getblockbynum", move || self.fetch_block(number)).await
	}

	async fn fetch_block(&self, number: u64) -> Result<BlockInfo, ChainError> {
		let response: BlockResponse = self
			.post(
				"wallet/getblockbynum",
				&json!({ "num": number, "visible": true }),
			)
			.await?;

		match (response.block_id, response.block_header) {
			(Some(hash), Some(header)) => Ok(BlockInfo {
				number: header.raw_data.number.unwrap_or(number),
				hash,
				parent_hash: header.raw_data.parent_hash,
				timestamp: header.raw_data.timestamp,
			}),
			_ => Err(ChainError::BlockNotFound(number)),
		}
	}

	async fn post<B, R>(&self, endpoint: &str, body: &B) -> Result<R, ChainError>
	where
		B: Serialize + ?Sized,
		R: DeserializeOwned,
	{
		let url = format!("{}/{}", self.base_url, endpoint);
		let response = self
			.http
			.post(&url)
			.json(body)
			.send()
			.await
			.map_err(|e| ChainError::Http(e.to_string()))?;

		let status = response.status();
		if !status.is_success() {
			return Err(ChainError::Http(format!("{} returned {}", endpoint, status)));
		}

		let text = response
			.text()
			.await
			.map_err(|e| ChainError::Http(e.to_string()))?;
		if text.trim().is_empty() {
			return Err(ChainError::InvalidResponse(format!(
				"{} returned an empty body",
				endpoint
			)));
		}

		serde_json::from_str(&text).map_err(|e| ChainError::InvalidResponse(e.to_string()))
	}
}

#[async_trait]
impl BlockSource for FullNodeClient {
	async fn block_by_number(&self, number: u64) -> Result<BlockInfo, ChainError> {
		self.get_block_by_num(number).await
	}
}

/// Node error messages are usually hex-encoded UTF-8.
fn decode_message(message: &str) -> String {
	hex::decode(message)
		.ok()
		.and_then(|bytes| String::from_utf8(bytes).ok())
		.unwrap_or_else(|| message.to_string())
}
