//! Event retrieval from the event-indexing API.
//!
//! Events are requested per contract and event name in ascending timestamp
//! order, starting at a minimum block timestamp. The API paginates through a
//! `meta.links.next` URL; every page is fetched before the batch is returned.

use async_trait::async_trait;
use oracle_chain::{retry_with_backoff, RetryPolicy};
use oracle_types::RawEvent;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, error, warn};

use crate::DiscoveryError;

const API_KEY_HEADER: &str = "TRON-PRO-API-KEY";
const ORDER_BY: &str = "block_timestamp,asc";

/// Source of contract events.
#[async_trait]
pub trait EventSource: Send + Sync {
	/// Returns every event named `event_name` emitted by `address` at or after
	/// `min_block_timestamp` (milliseconds).
	///
	/// `None` means the first page could not be obtained; an empty vector
	/// means the API answered with no events.
	async fn fetch(
		&self,
		address: &str,
		event_name: &str,
		min_block_timestamp: i64,
	) -> Option<Vec<RawEvent>>;
}

#[derive(Debug, Deserialize)]
struct EventPage {
	#[serde(default)]
	data: Vec<WireEvent>,
	#[serde(default)]
	meta: Option<PageMeta>,
}

#[derive(Debug, Deserialize)]
struct PageMeta {
	#[serde(default)]
	links: Option<PageLinks>,
}

#[derive(Debug, Deserialize)]
struct PageLinks {
	#[serde(default)]
	next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireEvent {
	block_number: u64,
	block_timestamp: i64,
	contract_address: String,
	event_name: String,
	#[serde(default)]
	result: HashMap<String, Value>,
}

impl From<WireEvent> for RawEvent {
	fn from(event: WireEvent) -> Self {
		let result = event
			.result
			.into_iter()
			.map(|(key, value)| {
				let value = match value {
					Value::String(s) => s,
					other => other.to_string(),
				};
				(key, value)
			})
			.collect();

		RawEvent {
			contract_address: event.contract_address,
			event_name: event.event_name,
			block_number: event.block_number,
			block_timestamp: event.block_timestamp,
			result,
		}
	}
}

impl EventPage {
	fn next_link(&self) -> Option<&str> {
		self.meta
			.as_ref()
			.and_then(|meta| meta.links.as_ref())
			.and_then(|links| links.next.as_deref())
			.filter(|next| !next.is_empty())
	}
}

/// HTTP client for the event-indexing API.
#[derive(Debug, Clone)]
pub struct EventClient {
	http: Client,
	base_url: String,
	api_key: Option<String>,
	retry: RetryPolicy,
}

impl EventClient {
	pub fn new(base_url: impl Into<String>) -> Self {
		Self {
			http: Client::new(),
			base_url: base_url.into().trim_end_matches('/').to_string(),
			api_key: None,
			retry: RetryPolicy::default(),
		}
	}

	pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
		self.api_key = api_key.filter(|key| !key.is_empty());
		self
	}

	pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
		self.retry = retry;
		self
	}

	/// GETs `url` with retries, returning the non-empty body.
	async fn get_body(&self, url: &str, query: &[(&str, String)]) -> Result<String, DiscoveryError> {
		retry_with_backoff(&self.retry, "event request", move || async move {
			let mut request = self.http.get(url).query(query);
			if let Some(key) = &self.api_key {
				request = request.header(API_KEY_HEADER, key);
			}

			let response = request
				.send()
				.await
				.map_err(|e| DiscoveryError::Http(e.to_string()))?;
			let status = response.status();
			if !status.is_success() {
				return Err(DiscoveryError::Http(format!("{} returned {}", url, status)));
			}

			let body = response
				.text()
				.await
				.map_err(|e| DiscoveryError::Http(e.to_string()))?;
			if body.trim().is_empty() {
				return Err(DiscoveryError::Http(format!("{} returned an empty body", url)));
			}
			Ok(body)
		})
		.await
	}

	async fn get_page(
		&self,
		url: &str,
		query: &[(&str, String)],
	) -> Result<EventPage, DiscoveryError> {
		let body = self.get_body(url, query).await?;
		serde_json::from_str(&body).map_err(|e| DiscoveryError::InvalidPayload(e.to_string()))
	}
}

#[async_trait]
impl EventSource for EventClient {
	async fn fetch(
		&self,
		address: &str,
		event_name: &str,
		min_block_timestamp: i64,
	) -> Option<Vec<RawEvent>> {
		let url = format!("{}/v1/contracts/{}/events", self.base_url, address);
		let query = [
			("event_name", event_name.to_string()),
			("order_by", ORDER_BY.to_string()),
			("min_block_timestamp", min_block_timestamp.to_string()),
		];

		let first = match self.get_page(&url, &query).await {
			Ok(page) => page,
			Err(e) => {
				error!(
					"Failed to fetch {} events for {}: {}",
					event_name, address, e
				);
				return None;
			}
		};

		let mut next = first.next_link().map(str::to_string);
		let mut events: Vec<RawEvent> = first.data.into_iter().map(RawEvent::from).collect();
		let mut pages = 1;

		while let Some(link) = next.take() {
			match self.get_page(&link, &[]).await {
				Ok(page) => {
					next = page.next_link().map(str::to_string);
					events.extend(page.data.into_iter().map(RawEvent::from));
					pages += 1;
				}
				Err(e) => {
					warn!(
						"Stopping pagination of {} events for {} after {} pages: {}",
						event_name, address, pages, e
					);
					break;
				}
			}
		}

		debug!(
			"Fetched {} {} events for {} in {} pages",
			events.len(),
			event_name,
			address,
			pages
		);
		Some(events)
	}
}
