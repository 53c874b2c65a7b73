//! The oracle node.
//!
//! [`OracleNodeBuilder`] wires the listener, stores, signer and delivery
//! pipeline from an [`OracleConfig`]; [`OracleNode`] is the running façade
//! used to register jobs, deliver fulfillments and stop the node.

use alloy::primitives::Bytes;
use chrono::Utc;
use oracle_account::implementations::local::LocalWallet;
use oracle_account::{AccountService, SignerInterface};
use oracle_chain::{FullNodeClient, RetryPolicy};
use oracle_config::OracleConfig;
use oracle_delivery::implementations::fullnode::FullNodeDelivery;
use oracle_delivery::DeliveryService;
use oracle_discovery::{
	DedupCache, EventClient, EventListener, EventSource, ListenerConfig, ProcessorContext,
	TickSummary, WatchRegistry,
};
use oracle_storage::implementations::file::FileStorage;
use oracle_storage::implementations::memory::MemoryStorage;
use oracle_storage::{
	JobRunStore, StorageHeadStore, StorageInterface, StorageJobRunStore, StorageService,
};
use oracle_types::{
	FulfillmentRequest, InitiatorType, JobPipeline, JobRun, OracleFulfillment, SignedTxReceipt,
	TronAddress, WatchRegistration,
};
use std::sync::Arc;
use tracing::info;

pub mod error;

pub use error::NodeError;

pub struct OracleNode {
	config: OracleConfig,
	registry: Arc<WatchRegistry>,
	listener: Arc<EventListener>,
	delivery: Arc<DeliveryService>,
	account: Arc<AccountService>,
	job_runs: Arc<dyn JobRunStore>,
}

impl OracleNode {
	pub fn config(&self) -> &OracleConfig {
		&self.config
	}

	pub fn registry(&self) -> &Arc<WatchRegistry> {
		&self.registry
	}

	/// Watches `address` for the events of `initiator`, routing them to
	/// `job_id`. Takes effect from the next tick.
	pub fn register_job(
		&self,
		address: &str,
		job_id: &str,
		initiator: InitiatorType,
	) -> Option<WatchRegistration> {
		self.registry.register_initiator(address, job_id, initiator)
	}

	pub fn unregister_job(&self, address: &str) -> Option<WatchRegistration> {
		self.registry.unregister(address)
	}

	/// Records that the job pipeline started a run for `request_id`.
	pub async fn record_job_run(&self, request_id: &str, job_id: &str) -> Result<(), NodeError> {
		let run = JobRun {
			request_id: request_id.to_string(),
			job_id: job_id.to_string(),
			created_at: Utc::now(),
		};
		self.job_runs.record(&run).await?;
		Ok(())
	}

	pub async fn account_address(&self) -> Result<TronAddress, NodeError> {
		Ok(self.account.get_address().await?)
	}

	pub async fn fulfil(
		&self,
		request: &FulfillmentRequest,
	) -> Result<SignedTxReceipt, NodeError> {
		Ok(self.delivery.deliver(request).await?)
	}

	/// Delivers an oracle-request answer to `oracle`.
	pub async fn fulfil_oracle(
		&self,
		oracle: TronAddress,
		args: OracleFulfillment,
	) -> Result<SignedTxReceipt, NodeError> {
		self.fulfil(&FulfillmentRequest::oracle(oracle, args)).await
	}

	/// Delivers a VRF proof to `coordinator`.
	pub async fn fulfil_vrf(
		&self,
		coordinator: TronAddress,
		proof: impl Into<Bytes>,
	) -> Result<SignedTxReceipt, NodeError> {
		self.fulfil(&FulfillmentRequest::vrf(coordinator, proof)).await
	}

	/// Runs a single listener tick outside the polling loop.
	pub async fn poll_once(&self) -> TickSummary {
		self.listener.tick().await
	}

	pub async fn start(&self) -> Result<(), NodeError> {
		info!(
			"Starting {} with {} watched addresses",
			self.config.node.name,
			self.registry.len()
		);
		self.listener.start().await?;
		Ok(())
	}

	pub fn is_running(&self) -> bool {
		self.listener.is_running()
	}

	pub async fn shutdown(&self) {
		info!("Shutting down {}", self.config.node.name);
		self.listener.stop().await;
	}
}

pub struct OracleNodeBuilder {
	config: OracleConfig,
	pipeline: Option<Arc<dyn JobPipeline>>,
	storage: Option<Box<dyn StorageInterface>>,
	event_source: Option<Arc<dyn EventSource>>,
	signer: Option<Box<dyn SignerInterface>>,
}

impl OracleNodeBuilder {
	pub fn new(config: OracleConfig) -> Self {
		Self {
			config,
			pipeline: None,
			storage: None,
			event_source: None,
			signer: None,
		}
	}

	pub fn with_pipeline(mut self, pipeline: Arc<dyn JobPipeline>) -> Self {
		self.pipeline = Some(pipeline);
		self
	}

	/// Overrides the storage backend chosen from `[storage]`.
	pub fn with_storage(mut self, storage: Box<dyn StorageInterface>) -> Self {
		self.storage = Some(storage);
		self
	}

	pub fn with_event_source(mut self, source: Arc<dyn EventSource>) -> Self {
		self.event_source = Some(source);
		self
	}

	/// Overrides the local wallet built from `[account]`.
	pub fn with_signer(mut self, signer: Box<dyn SignerInterface>) -> Self {
		self.signer = Some(signer);
		self
	}

	pub fn build(self) -> Result<OracleNode, NodeError> {
		let config = self.config;
		let pipeline = self
			.pipeline
			.ok_or_else(|| NodeError::Config("Job pipeline not provided".into()))?;

		let backend = match self.storage {
			Some(backend) => backend,
			None => match &config.storage.path {
				Some(path) => Box::new(FileStorage::new(path.clone())) as Box<dyn StorageInterface>,
				None => Box::new(MemoryStorage::new()),
			},
		};
		let storage = Arc::new(StorageService::new(backend));
		let job_runs: Arc<dyn JobRunStore> = Arc::new(StorageJobRunStore::new(storage.clone()));

		let signer = match self.signer {
			Some(signer) => signer,
			None => Box::new(LocalWallet::new(&config.account.private_key)?),
		};
		let account = Arc::new(AccountService::new(signer));

		let retry = RetryPolicy::new(
			config.event_api.max_retries,
			config.event_api.retry_base_delay(),
		);
		let full_node =
			FullNodeClient::new(config.full_node.url.clone()).with_retry_policy(retry);

		let source = match self.event_source {
			Some(source) => source,
			None => Arc::new(
				EventClient::new(config.event_api.url.clone())
					.with_api_key(config.event_api.api_key.clone())
					.with_retry_policy(retry),
			),
		};

		let ctx = ProcessorContext {
			pipeline,
			dedup: Arc::new(DedupCache::new(config.dedup.capacity, config.dedup.ttl())),
			heads: Arc::new(StorageHeadStore::new(storage)),
			job_runs: job_runs.clone(),
			blocks: Arc::new(full_node.clone()),
		};

		let registry = Arc::new(WatchRegistry::new());
		for job in &config.jobs {
			registry.register_initiator(&job.address, &job.job_id, job.initiator);
		}

		let listener = Arc::new(EventListener::new(
			registry.clone(),
			source,
			ctx,
			ListenerConfig {
				poll_interval: config.listener.poll_interval(),
				lookback: config.listener.lookback(),
			},
		));

		let delivery = Arc::new(DeliveryService::new(Box::new(
			FullNodeDelivery::new(full_node, account.clone())
				.with_fee_limit(config.full_node.min_fee_limit),
		)));

		Ok(OracleNode {
			config,
			registry,
			listener,
			delivery,
			account,
			job_runs,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use oracle_config::ConfigLoader;
	use oracle_discovery::DiscoveryError;
	use oracle_types::{ChannelJobPipeline, JobRequest};
	use serde_json::json;
	use wiremock::matchers::{method, path, query_param};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	const KEY: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";
	const ORACLE: &str = "TOracleContract";
	const JOB_ID: &str = "5a3f1c2e9b8d4e6fa7c0b1d2e3f40516";
	const REQUESTER_HEX: &str = "0xa614f803b6fd780986a42c78ec9c7f77e6ded13c";

	fn config(url: &str, jobs: &str) -> OracleConfig {
		let content = format!(
			r#"
[event_api]
url = "{url}"
max_retries = 0
retry_base_delay_ms = 1

[full_node]
url = "{url}"

[account]
private_key = "{KEY}"
{jobs}
"#
		);
		ConfigLoader::new()
			.with_env_prefix("ORACLE_CORE_TEST_UNSET_")
			.parse(&content)
			.unwrap()
	}

	fn build(config: OracleConfig) -> (OracleNode, tokio::sync::mpsc::UnboundedReceiver<JobRequest>) {
		let (pipeline, receiver) = ChannelJobPipeline::new();
		let node = OracleNodeBuilder::new(config)
			.with_pipeline(Arc::new(pipeline))
			.build()
			.unwrap();
		(node, receiver)
	}

	fn oracle_job() -> String {
		format!(
			"[[jobs]]\naddress = \"{}\"\njob_id = \"{}\"\ninitiator = \"runlog\"\n",
			ORACLE, JOB_ID
		)
	}

	#[test]
	fn test_build_requires_pipeline() {
		let err = OracleNodeBuilder::new(config("http://127.0.0.1:1", ""))
			.build()
			.err()
			.unwrap();
		assert!(matches!(err, NodeError::Config(_)));
	}

	#[test]
	fn test_configured_jobs_registered() {
		let (node, _receiver) = build(config("http://127.0.0.1:1", &oracle_job()));

		let registration = node.registry().get(ORACLE).unwrap();
		assert_eq!(registration.job_id, JOB_ID);
		assert_eq!(registration.event_names, vec!["OracleRequest", "NewRound"]);

		node.register_job("TCoordinator", "vrf-job", InitiatorType::RandomnessLog);
		assert_eq!(node.registry().len(), 2);
		assert!(node.unregister_job("TCoordinator").is_some());
		assert_eq!(node.registry().len(), 1);
	}

	#[tokio::test]
	async fn test_poll_once_submits_oracle_request() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path(format!("/v1/contracts/{}/events", ORACLE)))
			.and(query_param("event_name", "OracleRequest"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({
				"data": [{
					"block_number": 1000,
					"block_timestamp": 1_700_000_000_000i64,
					"contract_address": ORACLE,
					"event_name": "OracleRequest",
					"result": {
						"specId": hex::encode(JOB_ID),
						"requester": REQUESTER_HEX,
						"callbackAddr": REQUESTER_HEX,
						"callbackFunctionId": "0x4357855e",
						"cancelExpiration": "1700000300",
						"data": "0x6375726c",
						"dataVersion": "1",
						"requestId": "0x01",
						"payment": "1000000"
					}
				}],
				"meta": {}
			})))
			.mount(&server)
			.await;
		Mock::given(method("GET"))
			.and(path(format!("/v1/contracts/{}/events", ORACLE)))
			.and(query_param("event_name", "NewRound"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
			.mount(&server)
			.await;

		let (node, mut receiver) = build(config(&server.uri(), &oracle_job()));

		let summary = node.poll_once().await;
		assert_eq!(summary.submitted, 1);
		match receiver.try_recv().unwrap() {
			JobRequest::Oracle(request) => {
				assert_eq!(request.request_id, "0x01");
				assert_eq!(request.job_id, JOB_ID);
			}
			other => panic!("unexpected request: {:?}", other),
		}

		let again = node.poll_once().await;
		assert_eq!(again.submitted, 0);
		assert!(receiver.try_recv().is_err());
	}

	#[tokio::test]
	async fn test_start_twice_fails_and_shutdown_stops() {
		let (node, _receiver) = build(config("http://127.0.0.1:1", ""));

		node.start().await.unwrap();
		assert!(node.is_running());
		let err = node.start().await.unwrap_err();
		assert!(matches!(
			err,
			NodeError::Discovery(DiscoveryError::AlreadyMonitoring)
		));

		node.shutdown().await;
		assert!(!node.is_running());
	}

	#[tokio::test]
	async fn test_fulfil_vrf_broadcasts() {
		let server = MockServer::start().await;
		let raw = [0x0a, 0x02, 0xbe, 0xef];
		Mock::given(method("POST"))
			.and(path("/wallet/triggersmartcontract"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({
				"result": { "result": true },
				"transaction": { "txID": "00", "raw_data_hex": hex::encode(raw) }
			})))
			.expect(1)
			.mount(&server)
			.await;
		Mock::given(method("POST"))
			.and(path("/wallet/broadcasthex"))
			.respond_with(
				ResponseTemplate::new(200)
					.set_body_json(json!({ "result": true, "txid": "beefcafe" })),
			)
			.expect(1)
			.mount(&server)
			.await;

		let (node, _receiver) = build(config(&server.uri(), ""));
		let coordinator =
			TronAddress::from_hex("41a614f803b6fd780986a42c78ec9c7f77e6ded13c").unwrap();

		let receipt = node.fulfil_vrf(coordinator, vec![0x01u8; 4]).await.unwrap();
		assert_eq!(receipt.remote_tx_id, "beefcafe");
		assert_eq!(receipt.to_address, coordinator.to_base58());
		assert_eq!(
			receipt.from_address,
			node.account_address().await.unwrap().to_base58()
		);
	}

	#[tokio::test]
	async fn test_record_job_run_is_durable() {
		let (node, _receiver) = build(config("http://127.0.0.1:1", ""));
		node.record_job_run("0xabc", JOB_ID).await.unwrap();

		let run = node.job_runs.get_by_request_id("0xabc").await.unwrap().unwrap();
		assert_eq!(run.job_id, JOB_ID);
	}
}
