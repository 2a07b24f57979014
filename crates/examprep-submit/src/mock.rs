//! Mock sink for testing.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use examprep_core::results::SubmissionPayload;
use examprep_core::traits::ResultSink;

use crate::error::SinkError;

/// A sink that records what it receives instead of delivering it.
///
/// Can be told to reject every submission, or to take a while before
/// answering, to exercise the driver's failure and pending paths.
#[derive(Default)]
pub struct MockSink {
    /// Reason to reject with, if any.
    failure: Option<String>,
    /// Simulated delivery latency.
    delay: Option<Duration>,
    /// Number of calls made.
    call_count: AtomicU32,
    /// Payloads accepted so far.
    received: Mutex<Vec<SubmissionPayload>>,
}

impl MockSink {
    /// A sink that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that rejects everything with the given reason.
    pub fn failing(reason: &str) -> Self {
        Self {
            failure: Some(reason.to_string()),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Get the number of calls made to this sink.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Payloads accepted so far, oldest first.
    pub fn received(&self) -> Vec<SubmissionPayload> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResultSink for MockSink {
    fn name(&self) -> &str {
        "mock"
    }

    async fn submit(&self, payload: &SubmissionPayload) -> anyhow::Result<()> {
        self.call_count.fetch_add(1, Ordering::Relaxed);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = &self.failure {
            return Err(SinkError::Rejected(reason.clone()).into());
        }

        self.received.lock().unwrap().push(payload.clone());
        Ok(())
    }
}
