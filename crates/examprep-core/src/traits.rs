//! Trait seams between the attempt driver and the outside world.
//!
//! `ResultSink` is implemented by the `examprep-submit` crate; observers are
//! implemented by whatever is showing the attempt (the CLI, tests).

use async_trait::async_trait;

use crate::attempt::AttemptSnapshot;
use crate::results::SubmissionPayload;

// ---------------------------------------------------------------------------
// Result sink trait
// ---------------------------------------------------------------------------

/// Destination for submitted attempts.
///
/// Called once per attempt. Implementations own retries and timeouts; the
/// driver never calls `submit` twice for the same attempt.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Short name for logs (e.g. "outbox").
    fn name(&self) -> &str;

    /// Deliver a submission.
    async fn submit(&self, payload: &SubmissionPayload) -> anyhow::Result<()>;
}

/// A sink that accepts everything and keeps nothing.
pub struct DiscardSink;

#[async_trait]
impl ResultSink for DiscardSink {
    fn name(&self) -> &str {
        "discard"
    }

    async fn submit(&self, _: &SubmissionPayload) -> anyhow::Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Observer trait
// ---------------------------------------------------------------------------

/// Callbacks from the driver task.
pub trait AttemptObserver: Send + Sync {
    fn on_tick(&self, snapshot: &AttemptSnapshot);
    fn on_submitted(&self, payload: &SubmissionPayload);
    fn on_delivery(&self, payload: &SubmissionPayload, outcome: Result<(), &str>);
}

/// No-op observer.
pub struct NoopObserver;

impl AttemptObserver for NoopObserver {
    fn on_tick(&self, _: &AttemptSnapshot) {}
    fn on_submitted(&self, _: &SubmissionPayload) {}
    fn on_delivery(&self, _: &SubmissionPayload, _: Result<(), &str>) {}
}
