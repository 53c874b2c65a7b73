//! Configuration validation utility
//!
//! Usage: cargo run --bin validate-config config/oracle.toml

use std::env;
use std::process;

use oracle_config::ConfigLoader;

#[tokio::main]
async fn main() {
	let args: Vec<String> = env::args().collect();

	if args.len() != 2 {
		eprintln!("Usage: {} <config-file>", args[0]);
		process::exit(1);
	}

	let config_path = &args[1];

	println!("Validating configuration file: {}", config_path);

	match ConfigLoader::new().with_file(config_path).load().await {
		Ok(config) => {
			println!("Configuration is valid");
			println!("Node name: {}", config.node.name);
			println!("Event API: {}", config.event_api.url);
			println!("Full node: {}", config.full_node.url);
			println!(
				"Storage: {}",
				config
					.storage
					.path
					.as_ref()
					.map(|p| p.display().to_string())
					.unwrap_or_else(|| "memory".to_string())
			);
			for job in &config.jobs {
				println!("Job {} on {} ({:?})", job.job_id, job.address, job.initiator);
			}
		}
		Err(e) => {
			eprintln!("Configuration validation failed:");
			eprintln!("{}", e);
			process::exit(1);
		}
	}
}
