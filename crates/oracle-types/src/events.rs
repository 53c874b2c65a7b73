//! Contract event types for the oracle node.
//!
//! Raw events come straight from the event-indexing API. The listener
//! classifies them into one of the supported [`EventFamily`] variants and the
//! family processor decodes them into the typed request events below.

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::TronAddress;

pub const ORACLE_REQUEST_EVENT: &str = "OracleRequest";
pub const NEW_ROUND_EVENT: &str = "NewRound";
pub const VRF_REQUEST_EVENT: &str = "VRFRequest";

/// Separator used when several event names are co-registered for one job.
pub const EVENT_NAME_DELIMITER: char = ',';

/// A contract event as reported by the event-indexing API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
	pub contract_address: String,
	pub event_name: String,
	pub block_number: u64,
	/// Block timestamp in milliseconds.
	pub block_timestamp: i64,
	/// Event arguments keyed by parameter name.
	pub result: HashMap<String, String>,
}

impl RawEvent {
	pub fn field(&self, name: &str) -> Option<&str> {
		self.result.get(name).map(String::as_str)
	}
}

/// The event families this node knows how to process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventFamily {
	OracleRequest,
	NewRound,
	VrfRequest,
}

impl EventFamily {
	pub fn from_event_name(name: &str) -> Option<Self> {
		match name {
			ORACLE_REQUEST_EVENT => Some(Self::OracleRequest),
			NEW_ROUND_EVENT => Some(Self::NewRound),
			VRF_REQUEST_EVENT => Some(Self::VrfRequest),
			_ => None,
		}
	}

	pub fn event_name(&self) -> &'static str {
		match self {
			Self::OracleRequest => ORACLE_REQUEST_EVENT,
			Self::NewRound => NEW_ROUND_EVENT,
			Self::VrfRequest => VRF_REQUEST_EVENT,
		}
	}
}

impl fmt::Display for EventFamily {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.event_name())
	}
}

/// Job initiator types that can be attached to a watched address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitiatorType {
	/// Oracle requests and aggregator rounds.
	RunLog,
	/// Verifiable randomness requests.
	RandomnessLog,
}

impl InitiatorType {
	/// Event names watched for this initiator, joined with [`EVENT_NAME_DELIMITER`].
	pub fn event_names(&self) -> String {
		match self {
			Self::RunLog => format!(
				"{}{}{}",
				ORACLE_REQUEST_EVENT, EVENT_NAME_DELIMITER, NEW_ROUND_EVENT
			),
			Self::RandomnessLog => VRF_REQUEST_EVENT.to_string(),
		}
	}
}

impl FromStr for InitiatorType {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"runlog" => Ok(Self::RunLog),
			"randomnesslog" => Ok(Self::RandomnessLog),
			other => Err(format!("Unknown initiator type: {}", other)),
		}
	}
}

/// The job a watched address routes its events to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchRegistration {
	pub address: String,
	pub job_id: String,
	/// Watched event names, kept in registration order.
	pub event_names: Vec<String>,
}

impl WatchRegistration {
	pub fn new(address: impl Into<String>, job_id: impl Into<String>, events: &str) -> Self {
		let mut event_names: Vec<String> = Vec::new();
		for name in events.split(EVENT_NAME_DELIMITER).map(str::trim) {
			if !name.is_empty() && !event_names.iter().any(|n| n == name) {
				event_names.push(name.to_string());
			}
		}

		Self {
			address: address.into(),
			job_id: job_id.into(),
			event_names,
		}
	}
}

/// A decoded `OracleRequest` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleRequestEvent {
	pub block_number: u64,
	pub job_id: String,
	pub requester: TronAddress,
	pub callback_addr: TronAddress,
	pub callback_function_id: String,
	pub cancel_expiration: u64,
	pub data: String,
	pub data_version: u64,
	pub request_id: String,
	pub payment: U256,
	/// The oracle contract that emitted the event.
	pub source_address: String,
}

/// A decoded `VRFRequest` event, enriched with the hash of its block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VrfRequestEvent {
	pub block_number: u64,
	pub block_hash: String,
	pub job_id: String,
	pub key_hash: String,
	pub seed: String,
	pub sender: TronAddress,
	pub request_id: String,
	pub fee: U256,
	pub source_address: String,
}

/// A decoded `NewRound` event from an aggregator contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRoundEvent {
	pub source_address: String,
	pub started_by: TronAddress,
	pub round_id: u64,
	pub started_at: u64,
}

/// A request handed to the job pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobRequest {
	Oracle(OracleRequestEvent),
	Vrf(VrfRequestEvent),
	NewRound(NewRoundEvent),
}

impl JobRequest {
	pub fn family(&self) -> EventFamily {
		match self {
			Self::Oracle(_) => EventFamily::OracleRequest,
			Self::Vrf(_) => EventFamily::VrfRequest,
			Self::NewRound(_) => EventFamily::NewRound,
		}
	}

	/// Short identifier for logs.
	pub fn describe(&self) -> String {
		match self {
			Self::Oracle(e) => format!("oracle request {} for job {}", e.request_id, e.job_id),
			Self::Vrf(e) => format!("vrf request {} for job {}", e.request_id, e.job_id),
			Self::NewRound(e) => format!("round {} on {}", e.round_id, e.source_address),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_event_family_from_name() {
		assert_eq!(
			EventFamily::from_event_name("OracleRequest"),
			Some(EventFamily::OracleRequest)
		);
		assert_eq!(
			EventFamily::from_event_name("VRFRequest"),
			Some(EventFamily::VrfRequest)
		);
		assert_eq!(
			EventFamily::from_event_name("NewRound"),
			Some(EventFamily::NewRound)
		);
		assert_eq!(EventFamily::from_event_name("Transfer"), None);
	}

	#[test]
	fn test_initiator_event_names() {
		assert_eq!(InitiatorType::RunLog.event_names(), "OracleRequest,NewRound");
		assert_eq!(InitiatorType::RandomnessLog.event_names(), "VRFRequest");
		assert_eq!("runlog".parse::<InitiatorType>(), Ok(InitiatorType::RunLog));
		assert_eq!(
			"RandomnessLog".parse::<InitiatorType>(),
			Ok(InitiatorType::RandomnessLog)
		);
		assert!("cron".parse::<InitiatorType>().is_err());
	}

	#[test]
	fn test_watch_registration_splits_and_dedups() {
		let reg = WatchRegistration::new("TAddr", "job-1", "OracleRequest, NewRound,OracleRequest");
		assert_eq!(reg.event_names, vec!["OracleRequest", "NewRound"]);
	}
}
