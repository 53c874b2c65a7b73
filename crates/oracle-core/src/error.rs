use oracle_account::AccountError;
use oracle_delivery::DeliveryError;
use oracle_discovery::DiscoveryError;
use oracle_storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NodeError {
	#[error("Configuration error: {0}")]
	Config(String),

	#[error("Account error: {0}")]
	Account(#[from] AccountError),

	#[error("Discovery error: {0}")]
	Discovery(#[from] DiscoveryError),

	#[error("Delivery error: {0}")]
	Delivery(#[from] DeliveryError),

	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
}
