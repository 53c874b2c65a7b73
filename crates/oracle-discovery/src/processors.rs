//! Event processors.
//!
//! Every event family runs through the same pipeline:
//!
//! 1. decode the raw event
//! 2. check the decoded job id against the registered job, if the family has one
//! 3. drop requests already in the dedup cache
//! 4. drop requests with a recorded job run (randomness only)
//! 5. enrich the request (randomness requests fetch their block)
//! 6. submit to the job pipeline
//! 7. mark the request in the dedup cache
//! 8. upsert the chain head when enrichment produced a block
//!
//! Families plug into the pipeline through [`EventProcessor`].

use alloy::primitives::U256;
use async_trait::async_trait;
use oracle_chain::BlockSource;
use oracle_storage::{HeadStore, JobRunStore, StorageError};
use oracle_types::{
	BlockInfo, ChainHead, EventFamily, JobPipeline, JobRequest, NewRoundEvent, OracleRequestEvent,
	RawEvent, TronAddress, VrfRequestEvent, WatchRegistration,
};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::DedupCache;

/// Why an event did not produce a job request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
	Decode(String),
	JobMismatch { expected: String, found: String },
	Duplicate,
	AlreadyRun,
	Storage(String),
	Enrichment(String),
	Pipeline(String),
}

impl fmt::Display for DropReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Decode(e) => write!(f, "undecodable event: {}", e),
			Self::JobMismatch { expected, found } => {
				write!(f, "job {} is not served here (expected {})", found, expected)
			}
			Self::Duplicate => f.write_str("already handled"),
			Self::AlreadyRun => f.write_str("job run already recorded"),
			Self::Storage(e) => write!(f, "storage error: {}", e),
			Self::Enrichment(e) => write!(f, "enrichment failed: {}", e),
			Self::Pipeline(e) => write!(f, "job pipeline unavailable: {}", e),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
	Submitted,
	Dropped(DropReason),
}

/// Collaborators shared by all processors.
#[derive(Clone)]
pub struct ProcessorContext {
	pub pipeline: Arc<dyn JobPipeline>,
	pub dedup: Arc<DedupCache>,
	pub heads: Arc<dyn HeadStore>,
	pub job_runs: Arc<dyn JobRunStore>,
	pub blocks: Arc<dyn BlockSource>,
}

/// A request ready for submission.
#[derive(Debug, Clone)]
pub struct Prepared {
	pub request: JobRequest,
	/// Block to record as the address's chain head after submission.
	pub head_block: Option<BlockInfo>,
}

impl Prepared {
	fn plain(request: JobRequest) -> Self {
		Self {
			request,
			head_block: None,
		}
	}
}

/// Family-specific steps of the processing pipeline.
#[async_trait]
pub trait EventProcessor: Send + Sync {
	type Decoded: Send + Sync;

	fn family(&self) -> EventFamily;

	/// Decodes an event emitted by the watched contract `source`.
	fn decode(&self, source: &str, event: &RawEvent) -> Result<Self::Decoded, String>;

	/// Job id carried by the event, for families that route by job.
	fn job_id<'a>(&self, decoded: &'a Self::Decoded) -> Option<&'a str>;

	fn dedup_key(&self, source: &str, decoded: &Self::Decoded) -> String;

	/// Whether a durable record shows the request was already handled.
	async fn already_run(
		&self,
		_ctx: &ProcessorContext,
		_decoded: &Self::Decoded,
	) -> Result<bool, StorageError> {
		Ok(false)
	}

	async fn enrich(
		&self,
		ctx: &ProcessorContext,
		decoded: Self::Decoded,
	) -> Result<Prepared, String>;
}

/// Runs one event through the processing pipeline of `processor`.
pub async fn process_event<P>(
	processor: &P,
	ctx: &ProcessorContext,
	registration: &WatchRegistration,
	event: &RawEvent,
) -> ProcessOutcome
where
	P: EventProcessor + ?Sized,
{
	let source = registration.address.as_str();
	let family = processor.family();

	let decoded = match processor.decode(source, event) {
		Ok(decoded) => decoded,
		Err(e) => {
			warn!("Failed to decode {} event from {}: {}", family, source, e);
			return ProcessOutcome::Dropped(DropReason::Decode(e));
		}
	};

	if let Some(job_id) = processor.job_id(&decoded) {
		if registration.job_id.is_empty() || registration.job_id != job_id {
			warn!("Job {} from {} is not served by this node", job_id, source);
			return ProcessOutcome::Dropped(DropReason::JobMismatch {
				expected: registration.job_id.clone(),
				found: job_id.to_string(),
			});
		}
	}

	let key = processor.dedup_key(source, &decoded);
	if ctx.dedup.seen(&key) {
		info!("{} {} has already been handled", family, key);
		return ProcessOutcome::Dropped(DropReason::Duplicate);
	}

	match processor.already_run(ctx, &decoded).await {
		Ok(false) => {}
		Ok(true) => {
			info!("{} {} has a recorded job run", family, key);
			return ProcessOutcome::Dropped(DropReason::AlreadyRun);
		}
		Err(e) => {
			error!("Failed to look up job run for {}: {}", key, e);
			return ProcessOutcome::Dropped(DropReason::Storage(e.to_string()));
		}
	}

	let prepared = match processor.enrich(ctx, decoded).await {
		Ok(prepared) => prepared,
		Err(e) => {
			error!("Failed to enrich {} {}: {}", family, key, e);
			return ProcessOutcome::Dropped(DropReason::Enrichment(e));
		}
	};

	let description = prepared.request.describe();
	if let Err(e) = ctx.pipeline.submit(prepared.request) {
		error!("Failed to submit {}: {}", description, e);
		return ProcessOutcome::Dropped(DropReason::Pipeline(e.to_string()));
	}
	info!("Submitted {}", description);
	ctx.dedup.mark(&key);

	if let Some(block) = prepared.head_block {
		upsert_head(ctx.heads.as_ref(), source, &block).await;
	}

	ProcessOutcome::Submitted
}

/// Records `block` as the head of `address` when its number changed.
async fn upsert_head(heads: &dyn HeadStore, address: &str, block: &BlockInfo) {
	let result = match heads.get_by_address(address).await {
		Ok(None) => heads
			.insert(ChainHead::from_block(address, block))
			.await
			.map(|_| ()),
		Ok(Some(mut head)) if head.block_number != block.number => {
			head.advance_to(block);
			heads.update(&head).await
		}
		Ok(Some(_)) => {
			debug!("Head of {} already at block {}", address, block.number);
			Ok(())
		}
		Err(e) => Err(e),
	};

	if let Err(e) = result {
		error!("Failed to record head {} for {}: {}", block.number, address, e);
	}
}

fn required<'a>(event: &'a RawEvent, name: &str) -> Result<&'a str, String> {
	event
		.field(name)
		.ok_or_else(|| format!("missing field {}", name))
}

fn parse_u64(event: &RawEvent, name: &str) -> Result<u64, String> {
	let value = required(event, name)?;
	value
		.parse()
		.map_err(|e| format!("invalid {} {:?}: {}", name, value, e))
}

fn parse_u256(event: &RawEvent, name: &str) -> Result<U256, String> {
	let value = required(event, name)?;
	U256::from_str_radix(value, 10).map_err(|e| format!("invalid {} {:?}: {}", name, value, e))
}

fn parse_address(event: &RawEvent, name: &str) -> Result<TronAddress, String> {
	let value = required(event, name)?;
	TronAddress::from_hex(value).map_err(|e| format!("invalid {} {:?}: {}", name, value, e))
}

/// Job ids are emitted as the hex of their UTF-8 bytes, NUL-padded to 32 bytes.
fn parse_job_id(event: &RawEvent, name: &str) -> Result<String, String> {
	let value = required(event, name)?;
	let bytes = hex::decode(value.strip_prefix("0x").unwrap_or(value))
		.map_err(|e| format!("invalid {} {:?}: {}", name, value, e))?;
	let job_id =
		String::from_utf8(bytes).map_err(|e| format!("invalid {} {:?}: {}", name, value, e))?;
	Ok(job_id.trim_end_matches('\0').to_string())
}

pub struct OracleRequestProcessor;

#[async_trait]
impl EventProcessor for OracleRequestProcessor {
	type Decoded = OracleRequestEvent;

	fn family(&self) -> EventFamily {
		EventFamily::OracleRequest
	}

	fn decode(&self, source: &str, event: &RawEvent) -> Result<OracleRequestEvent, String> {
		Ok(OracleRequestEvent {
			block_number: event.block_number,
			job_id: parse_job_id(event, "specId")?,
			requester: parse_address(event, "requester")?,
			callback_addr: parse_address(event, "callbackAddr")?,
			callback_function_id: required(event, "callbackFunctionId")?.to_string(),
			cancel_expiration: parse_u64(event, "cancelExpiration")?,
			data: required(event, "data")?.to_string(),
			data_version: parse_u64(event, "dataVersion")?,
			request_id: required(event, "requestId")?.to_string(),
			payment: parse_u256(event, "payment")?,
			source_address: source.to_string(),
		})
	}

	fn job_id<'a>(&self, decoded: &'a OracleRequestEvent) -> Option<&'a str> {
		Some(&decoded.job_id)
	}

	fn dedup_key(&self, _source: &str, decoded: &OracleRequestEvent) -> String {
		decoded.request_id.clone()
	}

	async fn enrich(
		&self,
		_ctx: &ProcessorContext,
		decoded: OracleRequestEvent,
	) -> Result<Prepared, String> {
		Ok(Prepared::plain(JobRequest::Oracle(decoded)))
	}
}

/// Aggregator rounds carry no job id and are routed by address alone.
pub struct NewRoundProcessor;

#[async_trait]
impl EventProcessor for NewRoundProcessor {
	type Decoded = NewRoundEvent;

	fn family(&self) -> EventFamily {
		EventFamily::NewRound
	}

	fn decode(&self, source: &str, event: &RawEvent) -> Result<NewRoundEvent, String> {
		Ok(NewRoundEvent {
			source_address: source.to_string(),
			round_id: parse_u64(event, "roundId")?,
			started_by: parse_address(event, "startedBy")?,
			started_at: parse_u64(event, "startedAt")?,
		})
	}

	fn job_id<'a>(&self, _decoded: &'a NewRoundEvent) -> Option<&'a str> {
		None
	}

	fn dedup_key(&self, source: &str, decoded: &NewRoundEvent) -> String {
		format!("{}{}", source, decoded.round_id)
	}

	async fn enrich(
		&self,
		_ctx: &ProcessorContext,
		decoded: NewRoundEvent,
	) -> Result<Prepared, String> {
		Ok(Prepared::plain(JobRequest::NewRound(decoded)))
	}
}

pub struct VrfRequestProcessor;

#[async_trait]
impl EventProcessor for VrfRequestProcessor {
	type Decoded = VrfRequestEvent;

	fn family(&self) -> EventFamily {
		EventFamily::VrfRequest
	}

	fn decode(&self, source: &str, event: &RawEvent) -> Result<VrfRequestEvent, String> {
		Ok(VrfRequestEvent {
			block_number: event.block_number,
			// Filled in by enrichment
			block_hash: String::new(),
			job_id: parse_job_id(event, "jobID")?,
			key_hash: required(event, "keyHash")?.to_string(),
			seed: required(event, "seed")?.to_string(),
			sender: parse_address(event, "sender")?,
			request_id: required(event, "requestID")?.to_string(),
			fee: parse_u256(event, "fee")?,
			source_address: source.to_string(),
		})
	}

	fn job_id<'a>(&self, decoded: &'a VrfRequestEvent) -> Option<&'a str> {
		Some(&decoded.job_id)
	}

	fn dedup_key(&self, _source: &str, decoded: &VrfRequestEvent) -> String {
		decoded.request_id.clone()
	}

	async fn already_run(
		&self,
		ctx: &ProcessorContext,
		decoded: &VrfRequestEvent,
	) -> Result<bool, StorageError> {
		Ok(ctx
			.job_runs
			.get_by_request_id(&decoded.request_id)
			.await?
			.is_some())
	}

	async fn enrich(
		&self,
		ctx: &ProcessorContext,
		mut decoded: VrfRequestEvent,
	) -> Result<Prepared, String> {
		let block = ctx
			.blocks
			.block_by_number(decoded.block_number)
			.await
			.map_err(|e| e.to_string())?;
		decoded.block_hash = block.hash.clone();

		Ok(Prepared {
			request: JobRequest::Vrf(decoded),
			head_block: Some(block),
		})
	}
}
