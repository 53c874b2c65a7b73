//! The hand-off point between event listening and job execution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::JobRequest;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
	#[error("Job pipeline closed")]
	Closed,
}

/// Receives job requests produced by the event processors.
///
/// Submission is fire-and-forget: the caller never waits for the job to run.
pub trait JobPipeline: Send + Sync {
	fn submit(&self, request: JobRequest) -> Result<(), PipelineError>;
}

/// Job pipeline that forwards requests over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelJobPipeline {
	sender: mpsc::UnboundedSender<JobRequest>,
}

impl ChannelJobPipeline {
	pub fn new() -> (Self, mpsc::UnboundedReceiver<JobRequest>) {
		let (sender, receiver) = mpsc::unbounded_channel();
		(Self { sender }, receiver)
	}
}

impl JobPipeline for ChannelJobPipeline {
	fn submit(&self, request: JobRequest) -> Result<(), PipelineError> {
		self.sender.send(request).map_err(|_| PipelineError::Closed)
	}
}

/// A job run started for a randomness request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRun {
	pub request_id: String,
	pub job_id: String,
	pub created_at: DateTime<Utc>,
}
