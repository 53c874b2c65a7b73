//! Record stores used by the event listener.

use async_trait::async_trait;
use oracle_types::{ChainHead, JobRun};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::{StorageError, StorageService};

const HEADS_NAMESPACE: &str = "heads";
const JOB_RUNS_NAMESPACE: &str = "job_runs";
const SEQUENCE_NAMESPACE: &str = "sequences";
const HEAD_SEQUENCE: &str = "heads";

/// Lookup-and-upsert access to chain-head records, keyed by watched address.
#[async_trait]
pub trait HeadStore: Send + Sync {
	async fn get_by_address(&self, address: &str) -> Result<Option<ChainHead>, StorageError>;

	/// Inserts a new head and returns it with its assigned id.
	async fn insert(&self, head: ChainHead) -> Result<ChainHead, StorageError>;

	/// Overwrites an existing head; the head must carry its id.
	async fn update(&self, head: &ChainHead) -> Result<(), StorageError>;
}

/// Read access to job runs, used to skip randomness requests already handled.
#[async_trait]
pub trait JobRunStore: Send + Sync {
	async fn get_by_request_id(&self, request_id: &str) -> Result<Option<JobRun>, StorageError>;

	async fn record(&self, run: &JobRun) -> Result<(), StorageError>;
}

pub struct StorageHeadStore {
	storage: Arc<StorageService>,
	// Serializes id assignment
	sequence: Mutex<()>,
}

impl StorageHeadStore {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self {
			storage,
			sequence: Mutex::new(()),
		}
	}
}

#[async_trait]
impl HeadStore for StorageHeadStore {
	async fn get_by_address(&self, address: &str) -> Result<Option<ChainHead>, StorageError> {
		self.storage.find(HEADS_NAMESPACE, address).await
	}

	async fn insert(&self, mut head: ChainHead) -> Result<ChainHead, StorageError> {
		let _guard = self.sequence.lock().await;

		let last: u64 = self
			.storage
			.find(SEQUENCE_NAMESPACE, HEAD_SEQUENCE)
			.await?
			.unwrap_or(0);
		let id = last + 1;
		self.storage
			.store(SEQUENCE_NAMESPACE, HEAD_SEQUENCE, &id)
			.await?;

		head.id = Some(id);
		self.storage
			.store(HEADS_NAMESPACE, &head.address, &head)
			.await?;
		debug!(
			"Inserted head {} for {} at block {}",
			id, head.address, head.block_number
		);
		Ok(head)
	}

	async fn update(&self, head: &ChainHead) -> Result<(), StorageError> {
		if head.id.is_none() {
			return Err(StorageError::Backend(format!(
				"head for {} has no id",
				head.address
			)));
		}
		if !self.storage.contains(HEADS_NAMESPACE, &head.address).await? {
			return Err(StorageError::NotFound);
		}

		self.storage.store(HEADS_NAMESPACE, &head.address, head).await
	}
}

pub struct StorageJobRunStore {
	storage: Arc<StorageService>,
}

impl StorageJobRunStore {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}
}

#[async_trait]
impl JobRunStore for StorageJobRunStore {
	async fn get_by_request_id(&self, request_id: &str) -> Result<Option<JobRun>, StorageError> {
		self.storage.find(JOB_RUNS_NAMESPACE, request_id).await
	}

	async fn record(&self, run: &JobRun) -> Result<(), StorageError> {
		self.storage
			.store(JOB_RUNS_NAMESPACE, &run.request_id, run)
			.await
	}
}
