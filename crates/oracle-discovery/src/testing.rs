//! In-process fakes shared by the processor and listener tests.

use async_trait::async_trait;
use oracle_chain::{BlockSource, ChainError};
use oracle_storage::implementations::memory::MemoryStorage;
use oracle_storage::{HeadStore, StorageError, StorageJobRunStore, StorageService};
use oracle_types::{BlockInfo, ChainHead, ChannelJobPipeline, JobRequest, RawEvent};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::{DedupCache, EventSource, ProcessorContext};

pub const ORACLE: &str = "TOracleContract";
pub const AGGREGATOR: &str = "TAggregatorContract";
pub const COORDINATOR: &str = "TCoordinatorContract";
pub const JOB_ID: &str = "5a3f1c2e9b8d4e6fa7c0b1d2e3f40516";
pub const REQUESTER_HEX: &str = "0xa614f803b6fd780986a42c78ec9c7f77e6ded13c";

pub fn raw_event(
	contract: &str,
	name: &str,
	block_number: u64,
	block_timestamp: i64,
	fields: &[(&str, &str)],
) -> RawEvent {
	RawEvent {
		contract_address: contract.to_string(),
		event_name: name.to_string(),
		block_number,
		block_timestamp,
		result: fields
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect(),
	}
}

pub fn oracle_request_event(request_id: &str, job_id: &str, timestamp: i64) -> RawEvent {
	let spec_id = hex::encode(job_id);
	raw_event(
		ORACLE,
		"OracleRequest",
		1000,
		timestamp,
		&[
			("specId", spec_id.as_str()),
			("requester", REQUESTER_HEX),
			("callbackAddr", REQUESTER_HEX),
			("callbackFunctionId", "0x4357855e"),
			("cancelExpiration", "1700000300"),
			("data", "0x6375726c"),
			("dataVersion", "1"),
			("requestId", request_id),
			("payment", "1000000"),
		],
	)
}

pub fn new_round_event(round_id: u64, timestamp: i64) -> RawEvent {
	let round_id = round_id.to_string();
	raw_event(
		AGGREGATOR,
		"NewRound",
		2000,
		timestamp,
		&[
			("roundId", round_id.as_str()),
			("startedBy", REQUESTER_HEX),
			("startedAt", "1700000000"),
		],
	)
}

pub fn vrf_request_event(request_id: &str, job_id: &str, block_number: u64) -> RawEvent {
	let job = hex::encode(job_id);
	raw_event(
		COORDINATOR,
		"VRFRequest",
		block_number,
		block_number as i64 * 1000,
		&[
			("jobID", job.as_str()),
			("keyHash", "0x9fe0eebf"),
			("seed", "12345"),
			("sender", REQUESTER_HEX),
			("requestID", request_id),
			("fee", "100000000000000000"),
		],
	)
}

pub fn block_hash(number: u64) -> String {
	format!("{:064x}", number)
}

#[derive(Default)]
pub struct FakeHeads {
	heads: Mutex<HashMap<String, ChainHead>>,
	writes: AtomicUsize,
}

impl FakeHeads {
	pub fn head(&self, address: &str) -> Option<ChainHead> {
		self.heads.lock().unwrap().get(address).cloned()
	}

	pub fn put(&self, head: ChainHead) {
		self.heads.lock().unwrap().insert(head.address.clone(), head);
	}

	pub fn writes(&self) -> usize {
		self.writes.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl HeadStore for FakeHeads {
	async fn get_by_address(&self, address: &str) -> Result<Option<ChainHead>, StorageError> {
		Ok(self.head(address))
	}

	async fn insert(&self, mut head: ChainHead) -> Result<ChainHead, StorageError> {
		let mut heads = self.heads.lock().unwrap();
		head.id = Some(heads.len() as u64 + 1);
		heads.insert(head.address.clone(), head.clone());
		self.writes.fetch_add(1, Ordering::SeqCst);
		Ok(head)
	}

	async fn update(&self, head: &ChainHead) -> Result<(), StorageError> {
		self.heads
			.lock()
			.unwrap()
			.insert(head.address.clone(), head.clone());
		self.writes.fetch_add(1, Ordering::SeqCst);
		Ok(())
	}
}

#[derive(Default)]
pub struct FakeBlocks {
	calls: AtomicUsize,
	failing: Mutex<HashSet<u64>>,
}

impl FakeBlocks {
	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	pub fn fail_on(&self, number: u64) {
		self.failing.lock().unwrap().insert(number);
	}
}

#[async_trait]
impl BlockSource for FakeBlocks {
	async fn block_by_number(&self, number: u64) -> Result<BlockInfo, ChainError> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		if self.failing.lock().unwrap().contains(&number) {
			return Err(ChainError::BlockNotFound(number));
		}
		Ok(BlockInfo {
			number,
			hash: block_hash(number),
			parent_hash: block_hash(number.saturating_sub(1)),
			timestamp: number as i64 * 1000,
		})
	}
}

/// Serves canned events per `(address, event name)`, honouring the minimum
/// timestamp, and records every request.
#[derive(Default)]
pub struct FakeEvents {
	events: Mutex<HashMap<(String, String), Vec<RawEvent>>>,
	unavailable: Mutex<HashSet<String>>,
	requests: Mutex<Vec<(String, String, i64)>>,
}

impl FakeEvents {
	pub fn push(&self, address: &str, event: RawEvent) {
		self.events
			.lock()
			.unwrap()
			.entry((address.to_string(), event.event_name.clone()))
			.or_default()
			.push(event);
	}

	pub fn set_unavailable(&self, address: &str) {
		self.unavailable.lock().unwrap().insert(address.to_string());
	}

	pub fn requests(&self) -> Vec<(String, String, i64)> {
		self.requests.lock().unwrap().clone()
	}
}

#[async_trait]
impl EventSource for FakeEvents {
	async fn fetch(
		&self,
		address: &str,
		event_name: &str,
		min_block_timestamp: i64,
	) -> Option<Vec<RawEvent>> {
		self.requests.lock().unwrap().push((
			address.to_string(),
			event_name.to_string(),
			min_block_timestamp,
		));
		if self.unavailable.lock().unwrap().contains(address) {
			return None;
		}

		let events = self.events.lock().unwrap();
		Some(
			events
				.get(&(address.to_string(), event_name.to_string()))
				.map(|events| {
					events
						.iter()
						.filter(|e| e.block_timestamp >= min_block_timestamp)
						.cloned()
						.collect()
				})
				.unwrap_or_default(),
		)
	}
}

pub struct Harness {
	pub ctx: ProcessorContext,
	pub heads: Arc<FakeHeads>,
	pub blocks: Arc<FakeBlocks>,
	pub job_runs: Arc<StorageJobRunStore>,
	receiver: Mutex<mpsc::UnboundedReceiver<JobRequest>>,
}

impl Harness {
	pub fn new() -> Self {
		let (pipeline, receiver) = ChannelJobPipeline::new();
		let heads = Arc::new(FakeHeads::default());
		let blocks = Arc::new(FakeBlocks::default());
		let job_runs = Arc::new(StorageJobRunStore::new(Arc::new(StorageService::new(
			Box::new(MemoryStorage::new()),
		))));

		let ctx = ProcessorContext {
			pipeline: Arc::new(pipeline),
			dedup: Arc::new(DedupCache::default()),
			heads: heads.clone(),
			job_runs: job_runs.clone(),
			blocks: blocks.clone(),
		};

		Self {
			ctx,
			heads,
			blocks,
			job_runs,
			receiver: Mutex::new(receiver),
		}
	}

	/// Requests submitted so far.
	pub fn drain(&self) -> Vec<JobRequest> {
		let mut receiver = self.receiver.lock().unwrap();
		let mut requests = Vec::new();
		while let Ok(request) = receiver.try_recv() {
			requests.push(request);
		}
		requests
	}
}
