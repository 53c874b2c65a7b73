use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use oracle_config::{ConfigLoader, OracleConfig};
use oracle_core::{OracleNode, OracleNodeBuilder};
use oracle_types::{ChannelJobPipeline, JobRequest};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "tron-oracle")]
#[command(about = "TRON oracle node", long_about = None)]
struct Cli {
	#[command(subcommand)]
	command: Option<Commands>,

	#[arg(short, long, value_name = "FILE", default_value = "config/oracle.toml")]
	config: PathBuf,

	/// Overrides `node.log_level` from the configuration file
	#[arg(long, env = "ORACLE_LOG_LEVEL")]
	log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
	/// Start the oracle node
	Start,
	/// Validate the configuration file
	Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	let config = ConfigLoader::new()
		.with_file(&cli.config)
		.load()
		.await
		.with_context(|| format!("Failed to load configuration from {:?}", cli.config))?;

	let log_level = cli
		.log_level
		.clone()
		.unwrap_or_else(|| config.node.log_level.clone());
	setup_tracing(&log_level)?;

	match cli.command {
		Some(Commands::Start) | None => start_node(config).await,
		Some(Commands::Validate) => {
			validate_config(&config);
			Ok(())
		}
	}
}

async fn start_node(config: OracleConfig) -> Result<()> {
	info!("Starting {}", config.node.name);

	let (pipeline, requests) = ChannelJobPipeline::new();
	let node = OracleNodeBuilder::new(config)
		.with_pipeline(Arc::new(pipeline))
		.build()
		.context("Failed to build oracle node")?;
	let node = Arc::new(node);

	let address = node
		.account_address()
		.await
		.context("Failed to resolve node account")?;
	info!("Node account {}", address);

	let consumer = tokio::spawn(consume_requests(node.clone(), requests));

	node.start().await.context("Failed to start event listener")?;
	info!("Oracle node started");

	setup_shutdown_signal().await;
	info!("Shutdown signal received, stopping node...");

	node.shutdown().await;
	consumer.abort();

	info!("Oracle node stopped");
	Ok(())
}

/// Logs submitted requests and records runs for randomness requests so that
/// replays of the same request are recognised after a restart.
async fn consume_requests(node: Arc<OracleNode>, mut requests: mpsc::UnboundedReceiver<JobRequest>) {
	while let Some(request) = requests.recv().await {
		info!("Job pipeline received {}", request.describe());
		if let JobRequest::Vrf(vrf) = &request {
			if let Err(e) = node.record_job_run(&vrf.request_id, &vrf.job_id).await {
				warn!("Failed to record run for {}: {}", vrf.request_id, e);
			}
		}
	}
}

fn validate_config(config: &OracleConfig) {
	info!("Configuration is valid");
	info!("Node name: {}", config.node.name);
	info!("Event API: {}", config.event_api.url);
	info!("Full node: {}", config.full_node.url);
	for job in &config.jobs {
		info!("  Job {} on {} ({:?})", job.job_id, job.address, job.initiator);
	}
}

fn setup_tracing(log_level: &str) -> Result<()> {
	let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

	tracing_subscriber::registry()
		.with(env_filter)
		.with(tracing_subscriber::fmt::layer())
		.try_init()
		.context("Failed to initialise tracing")?;

	Ok(())
}

async fn setup_shutdown_signal() {
	let ctrl_c = async {
		if let Err(e) = signal::ctrl_c().await {
			error!("Failed to listen for Ctrl+C: {}", e);
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match signal::unix::signal(signal::unix::SignalKind::terminate()) {
			Ok(mut stream) => {
				stream.recv().await;
			}
			Err(e) => {
				error!("Failed to install SIGTERM handler: {}", e);
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}
}
