//! Watched-address registry.

use dashmap::DashMap;
use oracle_types::{InitiatorType, WatchRegistration};
use tracing::info;

use crate::CursorStore;

/// Maps each watched contract address to the job its events are routed to,
/// and owns the polling cursors of those addresses.
///
/// An address routes to at most one job; registering it again replaces the
/// previous mapping but keeps its cursor.
#[derive(Debug, Default)]
pub struct WatchRegistry {
	jobs: DashMap<String, WatchRegistration>,
	cursors: CursorStore,
}

impl WatchRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `address` for the comma-separated `events`, returning the
	/// registration it replaced.
	pub fn register(
		&self,
		address: &str,
		job_id: &str,
		events: &str,
	) -> Option<WatchRegistration> {
		let registration = WatchRegistration::new(address, job_id, events);
		info!(
			"Watching {} for job {} ({})",
			address,
			job_id,
			registration.event_names.join(",")
		);
		self.jobs.insert(address.to_string(), registration)
	}

	pub fn register_initiator(
		&self,
		address: &str,
		job_id: &str,
		initiator: InitiatorType,
	) -> Option<WatchRegistration> {
		self.register(address, job_id, &initiator.event_names())
	}

	pub fn unregister(&self, address: &str) -> Option<WatchRegistration> {
		self.cursors.remove(address);
		self.jobs.remove(address).map(|(_, registration)| registration)
	}

	pub fn get(&self, address: &str) -> Option<WatchRegistration> {
		self.jobs.get(address).map(|r| r.clone())
	}

	/// Current registrations ordered by address.
	pub fn snapshot(&self) -> Vec<WatchRegistration> {
		let mut registrations: Vec<WatchRegistration> =
			self.jobs.iter().map(|r| r.value().clone()).collect();
		registrations.sort_by(|a, b| a.address.cmp(&b.address));
		registrations
	}

	pub fn len(&self) -> usize {
		self.jobs.len()
	}

	pub fn is_empty(&self) -> bool {
		self.jobs.is_empty()
	}

	pub fn cursors(&self) -> &CursorStore {
		&self.cursors
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_register_replaces_job_and_keeps_cursor() {
		let registry = WatchRegistry::new();
		assert!(registry
			.register_initiator("TA", "job-1", InitiatorType::RunLog)
			.is_none());
		registry.cursors().advance("TA", 500);

		let previous = registry
			.register_initiator("TA", "job-2", InitiatorType::RandomnessLog)
			.unwrap();
		assert_eq!(previous.job_id, "job-1");

		let current = registry.get("TA").unwrap();
		assert_eq!(current.job_id, "job-2");
		assert_eq!(current.event_names, vec!["VRFRequest"]);
		assert_eq!(registry.cursors().get("TA"), Some(500));
		assert_eq!(registry.len(), 1);
	}

	#[test]
	fn test_snapshot_is_sorted() {
		let registry = WatchRegistry::new();
		registry.register("TC", "j3", "OracleRequest");
		registry.register("TA", "j1", "OracleRequest");
		registry.register("TB", "j2", "NewRound");

		let addresses: Vec<String> = registry
			.snapshot()
			.into_iter()
			.map(|r| r.address)
			.collect();
		assert_eq!(addresses, vec!["TA", "TB", "TC"]);
	}

	#[test]
	fn test_unregister_drops_cursor() {
		let registry = WatchRegistry::new();
		registry.register("TA", "j1", "OracleRequest");
		registry.cursors().advance("TA", 10);

		assert!(registry.unregister("TA").is_some());
		assert!(registry.get("TA").is_none());
		assert_eq!(registry.cursors().get("TA"), None);
	}
}
