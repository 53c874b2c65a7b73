//! The event listener loop.
//!
//! Each tick walks the registry, fetches every watched event name from the
//! address's cursor onwards, advances the cursor past each event and runs the
//! event through the processor of its family. Ticks run with a fixed delay:
//! the next one starts `poll_interval` after the previous one finished.

use chrono::Utc;
use futures::FutureExt;
use oracle_types::{EventFamily, RawEvent, WatchRegistration, VRF_REQUEST_EVENT};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::processors::{
	process_event, NewRoundProcessor, OracleRequestProcessor, VrfRequestProcessor,
};
use crate::{DiscoveryError, EventSource, ProcessOutcome, ProcessorContext, WatchRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerConfig {
	/// Delay between the end of one tick and the start of the next.
	pub poll_interval: Duration,
	/// How far back an address without a cursor starts polling.
	pub lookback: Duration,
}

impl Default for ListenerConfig {
	fn default() -> Self {
		Self {
			poll_interval: Duration::from_millis(3000),
			lookback: Duration::from_millis(60_000),
		}
	}
}

/// Counters for one pass over the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
	pub addresses: usize,
	pub events: usize,
	pub submitted: usize,
	pub dropped: usize,
	/// Events of a family this node does not process.
	pub skipped: usize,
	/// Fetches that returned no data after retries.
	pub unavailable: usize,
}

pub struct EventListener {
	registry: Arc<WatchRegistry>,
	source: Arc<dyn EventSource>,
	ctx: ProcessorContext,
	config: ListenerConfig,
	is_running: AtomicBool,
	stop_signal: Mutex<Option<mpsc::Sender<()>>>,
	handle: Mutex<Option<JoinHandle<()>>>,
}

impl EventListener {
	pub fn new(
		registry: Arc<WatchRegistry>,
		source: Arc<dyn EventSource>,
		ctx: ProcessorContext,
		config: ListenerConfig,
	) -> Self {
		Self {
			registry,
			source,
			ctx,
			config,
			is_running: AtomicBool::new(false),
			stop_signal: Mutex::new(None),
			handle: Mutex::new(None),
		}
	}

	pub fn registry(&self) -> &Arc<WatchRegistry> {
		&self.registry
	}

	pub fn is_running(&self) -> bool {
		self.is_running.load(Ordering::SeqCst)
	}

	/// Spawns the polling loop.
	pub async fn start(self: &Arc<Self>) -> Result<(), DiscoveryError> {
		if self.is_running.swap(true, Ordering::SeqCst) {
			return Err(DiscoveryError::AlreadyMonitoring);
		}

		let (stop_tx, stop_rx) = mpsc::channel(1);
		*self.stop_signal.lock().await = Some(stop_tx);

		let listener = Arc::clone(self);
		let handle = tokio::spawn(async move {
			listener.run(stop_rx).await;
		});
		*self.handle.lock().await = Some(handle);

		info!(
			"Event listener started, polling every {:?}",
			self.config.poll_interval
		);
		Ok(())
	}

	/// Stops the polling loop, letting a running tick finish first.
	pub async fn stop(&self) {
		if let Some(stop_tx) = self.stop_signal.lock().await.take() {
			let _ = stop_tx.send(()).await;
		}
		if let Some(handle) = self.handle.lock().await.take() {
			if let Err(e) = handle.await {
				error!("Event listener task failed: {}", e);
			}
		}
		self.is_running.store(false, Ordering::SeqCst);
	}

	async fn run(&self, mut stop_rx: mpsc::Receiver<()>) {
		loop {
			// A tick is never cancelled midway; stop requests are seen between ticks
			match AssertUnwindSafe(self.tick()).catch_unwind().await {
				Ok(summary) => self.log_summary(&summary),
				Err(_) => error!("Event listener tick panicked, continuing with the next tick"),
			}

			tokio::select! {
				_ = tokio::time::sleep(self.config.poll_interval) => {}
				_ = stop_rx.recv() => {
					info!("Event listener stopping");
					break;
				}
			}
		}
	}

	fn log_summary(&self, summary: &TickSummary) {
		if summary.events > 0 || summary.unavailable > 0 {
			info!(
				"Tick over {} addresses: {} events, {} submitted, {} dropped, {} skipped, {} fetches failed",
				summary.addresses,
				summary.events,
				summary.submitted,
				summary.dropped,
				summary.skipped,
				summary.unavailable
			);
		} else {
			debug!("Tick over {} addresses: no new events", summary.addresses);
		}
	}

	/// Runs one pass over every registered address.
	pub async fn tick(&self) -> TickSummary {
		let mut summary = TickSummary::default();

		for registration in self.registry.snapshot() {
			summary.addresses += 1;
			let address = registration.address.as_str();

			let mut events: Vec<RawEvent> = Vec::new();
			for event_name in &registration.event_names {
				let min_timestamp = self.min_block_timestamp(address, event_name).await;
				match self.source.fetch(address, event_name, min_timestamp).await {
					Some(batch) => events.extend(batch),
					None => summary.unavailable += 1,
				}
			}

			for event in &events {
				summary.events += 1;
				self.registry
					.cursors()
					.advance(address, event.block_timestamp);

				let Some(family) = EventFamily::from_event_name(&event.event_name) else {
					warn!(
						"Unsupported event {} from {}, skipping",
						event.event_name, address
					);
					summary.skipped += 1;
					continue;
				};

				match self.dispatch(family, &registration, event).await {
					ProcessOutcome::Submitted => summary.submitted += 1,
					ProcessOutcome::Dropped(reason) => {
						debug!(
							"Dropped {} event from {}: {}",
							family, address, reason
						);
						summary.dropped += 1;
					}
				}
			}
		}

		summary
	}

	async fn dispatch(
		&self,
		family: EventFamily,
		registration: &WatchRegistration,
		event: &RawEvent,
	) -> ProcessOutcome {
		match family {
			EventFamily::OracleRequest => {
				process_event(&OracleRequestProcessor, &self.ctx, registration, event).await
			}
			EventFamily::NewRound => {
				process_event(&NewRoundProcessor, &self.ctx, registration, event).await
			}
			EventFamily::VrfRequest => {
				process_event(&VrfRequestProcessor, &self.ctx, registration, event).await
			}
		}
	}

	/// Where polling starts for an address.
	///
	/// The in-process cursor wins. Without one, randomness requests resume from
	/// the stored chain head and everything else starts at the lookback window.
	async fn min_block_timestamp(&self, address: &str, event_name: &str) -> i64 {
		if let Some(cursor) = self.registry.cursors().get(address) {
			return cursor;
		}

		if event_name == VRF_REQUEST_EVENT {
			match self.ctx.heads.get_by_address(address).await {
				Ok(Some(head)) => return head.block_timestamp,
				Ok(None) => {}
				Err(e) => warn!("Failed to load head for {}: {}", address, e),
			}
		}

		Utc::now().timestamp_millis() - self.config.lookback.as_millis() as i64
	}
}
