//! Configuration types for the oracle node.

use oracle_types::InitiatorType;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
	#[serde(default)]
	pub node: NodeSettings,
	pub event_api: EventApiConfig,
	pub full_node: FullNodeConfig,
	#[serde(default)]
	pub listener: ListenerSettings,
	#[serde(default)]
	pub dedup: DedupSettings,
	pub account: AccountConfig,
	#[serde(default)]
	pub storage: StorageSettings,
	#[serde(default)]
	pub jobs: Vec<JobConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSettings {
	#[serde(default = "default_name")]
	pub name: String,
	#[serde(default = "default_log_level")]
	pub log_level: String,
}

impl Default for NodeSettings {
	fn default() -> Self {
		Self {
			name: default_name(),
			log_level: default_log_level(),
		}
	}
}

/// Event-indexing API the listener polls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventApiConfig {
	pub url: String,
	#[serde(default)]
	pub api_key: Option<String>,
	/// Retries after the first attempt of each page request.
	#[serde(default = "default_max_retries")]
	pub max_retries: u32,
	#[serde(default = "default_retry_base_delay_ms")]
	pub retry_base_delay_ms: u64,
}

impl EventApiConfig {
	pub fn retry_base_delay(&self) -> Duration {
		Duration::from_millis(self.retry_base_delay_ms)
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullNodeConfig {
	pub url: String,
	/// Fee limit in sun attached to fulfillment calls.
	#[serde(default = "default_min_fee_limit")]
	pub min_fee_limit: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerSettings {
	#[serde(default = "default_poll_interval_ms")]
	pub poll_interval_ms: u64,
	/// How far back an address with no cursor starts reading.
	#[serde(default = "default_lookback_ms")]
	pub lookback_ms: u64,
}

impl ListenerSettings {
	pub fn poll_interval(&self) -> Duration {
		Duration::from_millis(self.poll_interval_ms)
	}

	pub fn lookback(&self) -> Duration {
		Duration::from_millis(self.lookback_ms)
	}
}

impl Default for ListenerSettings {
	fn default() -> Self {
		Self {
			poll_interval_ms: default_poll_interval_ms(),
			lookback_ms: default_lookback_ms(),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupSettings {
	#[serde(default = "default_dedup_capacity")]
	pub capacity: usize,
	#[serde(default = "default_dedup_ttl_secs")]
	pub ttl_secs: u64,
}

impl DedupSettings {
	pub fn ttl(&self) -> Duration {
		Duration::from_secs(self.ttl_secs)
	}
}

impl Default for DedupSettings {
	fn default() -> Self {
		Self {
			capacity: default_dedup_capacity(),
			ttl_secs: default_dedup_ttl_secs(),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
	pub private_key: String,
}

/// Durable storage for chain heads and job runs. Without a path the node
/// keeps them in memory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSettings {
	#[serde(default)]
	pub path: Option<PathBuf>,
}

/// A job watched from startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
	pub address: String,
	pub job_id: String,
	pub initiator: InitiatorType,
}

fn default_name() -> String {
	"tron-oracle".to_string()
}

fn default_log_level() -> String {
	"info".to_string()
}

fn default_max_retries() -> u32 {
	3
}

fn default_retry_base_delay_ms() -> u64 {
	100
}

fn default_min_fee_limit() -> u64 {
	1_000_000_000
}

fn default_poll_interval_ms() -> u64 {
	3_000
}

fn default_lookback_ms() -> u64 {
	60_000
}

fn default_dedup_capacity() -> usize {
	10_000
}

fn default_dedup_ttl_secs() -> u64 {
	12 * 60 * 60
}
