//! Event discovery for the oracle node.
//!
//! The listener polls the event-indexing API for every watched contract,
//! routes each event to the processor of its family, and hands the decoded
//! requests to the job pipeline.
//!
//! # Modules
//!
//! - `fetcher`: paginated event retrieval with bounded retry
//! - `cursor`: per-address high-water-mark timestamps
//! - `dedup`: time-bounded set of processed request identifiers
//! - `registry`: watched address to job routing
//! - `processors`: per-family decode, routing, dedup and enrichment
//! - `listener`: the fixed-delay polling loop

use thiserror::Error;

pub mod cursor;
pub mod dedup;
pub mod fetcher;
pub mod listener;
pub mod processors;
pub mod registry;

#[cfg(test)]
mod testing;

pub use cursor::CursorStore;
pub use dedup::DedupCache;
pub use fetcher::{EventClient, EventSource};
pub use listener::{EventListener, ListenerConfig, TickSummary};
pub use processors::{DropReason, ProcessOutcome, ProcessorContext};
pub use registry::WatchRegistry;

#[derive(Debug, Error)]
pub enum DiscoveryError {
	#[error("HTTP error: {0}")]
	Http(String),
	#[error("Invalid event payload: {0}")]
	InvalidPayload(String),
	#[error("Already monitoring")]
	AlreadyMonitoring,
}
