//! Configuration loading for the oracle node.
//!
//! Configuration is read from a TOML file in which `${VAR}` references are
//! replaced by environment variables before parsing. A handful of settings
//! can then be overridden by prefixed environment variables, and the result
//! is validated before the node is built from it.

use std::collections::HashSet;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

pub mod types;

pub use types::*;

#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("File not found: {0}")]
	FileNotFound(String),

	#[error("Parse error: {0}")]
	ParseError(String),

	#[error("Validation error: {0}")]
	ValidationError(String),

	#[error("Environment variable not found: {0}")]
	EnvVarNotFound(String),

	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),
}

/// Configuration loader with environment variable substitution
pub struct ConfigLoader {
	file_path: Option<String>,
	env_prefix: String,
}

impl Default for ConfigLoader {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigLoader {
	pub fn new() -> Self {
		Self {
			file_path: None,
			env_prefix: "ORACLE_".to_string(),
		}
	}

	pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
		self.file_path = Some(path.as_ref().to_string_lossy().to_string());
		self
	}

	pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.env_prefix = prefix.into();
		self
	}

	pub async fn load(&self) -> Result<OracleConfig, ConfigError> {
		let file_path = self.file_path.as_ref().ok_or_else(|| {
			ConfigError::FileNotFound("No configuration file specified".to_string())
		})?;
		if !Path::new(file_path).exists() {
			return Err(ConfigError::FileNotFound(file_path.clone()));
		}

		let content = tokio::fs::read_to_string(file_path).await?;
		self.parse(&content)
	}

	/// Parses, overrides and validates configuration held in memory.
	pub fn parse(&self, content: &str) -> Result<OracleConfig, ConfigError> {
		let substituted = self.substitute_env_vars(content)?;
		let mut config: OracleConfig =
			toml::from_str(&substituted).map_err(|e| ConfigError::ParseError(e.to_string()))?;

		self.apply_env_overrides(&mut config);
		self.validate_config(&config)?;

		Ok(config)
	}

	fn substitute_env_vars(&self, content: &str) -> Result<String, ConfigError> {
		let mut result = content.to_string();

		let re = regex::Regex::new(r"\$\{([^}]+)\}")
			.map_err(|e| ConfigError::ParseError(e.to_string()))?;

		for cap in re.captures_iter(content) {
			let full_match = &cap[0];
			let var_name = &cap[1];

			let env_value = env::var(var_name)
				.map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;

			result = result.replace(full_match, &env_value);
		}

		Ok(result)
	}

	fn apply_env_overrides(&self, config: &mut OracleConfig) {
		if let Ok(log_level) = env::var(format!("{}LOG_LEVEL", self.env_prefix)) {
			debug!("Overriding log level from environment");
			config.node.log_level = log_level;
		}

		if let Ok(url) = env::var(format!("{}EVENT_API_URL", self.env_prefix)) {
			debug!("Overriding event API URL from environment");
			config.event_api.url = url;
		}

		if let Ok(url) = env::var(format!("{}FULL_NODE_URL", self.env_prefix)) {
			debug!("Overriding full node URL from environment");
			config.full_node.url = url;
		}
	}

	fn validate_config(&self, config: &OracleConfig) -> Result<(), ConfigError> {
		validate_url("event_api.url", &config.event_api.url)?;
		validate_url("full_node.url", &config.full_node.url)?;

		let key = config.account.private_key.trim();
		let key = key.strip_prefix("0x").unwrap_or(key);
		if key.len() != 64 || !key.chars().all(|c| c.is_ascii_hexdigit()) {
			return Err(ConfigError::ValidationError(
				"account.private_key must be 32 bytes of hex".to_string(),
			));
		}

		if config.listener.poll_interval_ms == 0 {
			return Err(ConfigError::ValidationError(
				"listener.poll_interval_ms must be greater than zero".to_string(),
			));
		}

		if config.dedup.capacity == 0 {
			return Err(ConfigError::ValidationError(
				"dedup.capacity must be greater than zero".to_string(),
			));
		}

		if config.dedup.ttl_secs == 0 {
			return Err(ConfigError::ValidationError(
				"dedup.ttl_secs must be greater than zero".to_string(),
			));
		}

		let mut addresses = HashSet::new();
		for job in &config.jobs {
			if job.address.trim().is_empty() || job.job_id.trim().is_empty() {
				return Err(ConfigError::ValidationError(
					"jobs entries need an address and a job_id".to_string(),
				));
			}
			if !addresses.insert(job.address.as_str()) {
				return Err(ConfigError::ValidationError(format!(
					"Address {} is assigned to more than one job",
					job.address
				)));
			}
		}

		Ok(())
	}
}

fn validate_url(field: &str, url: &str) -> Result<(), ConfigError> {
	if url.starts_with("http://") || url.starts_with("https://") {
		Ok(())
	} else {
		Err(ConfigError::ValidationError(format!(
			"{} must be an http(s) URL, got '{}'",
			field, url
		)))
	}
}
