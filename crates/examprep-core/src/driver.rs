//! Async driver for an attempt session.
//!
//! One task owns the [`AttemptSession`] and runs a single `select!` loop over
//! the one-second ticker and the command channel, so every mutation happens
//! on one logical thread. The ticker lives in that loop and is dropped the
//! moment the session leaves `Active`; dropping every [`AttemptHandle`]
//! ends the loop as well.
//!
//! Handing the result to the [`ResultSink`] is spawned separately. Its
//! outcome is published on the status channel and never feeds back into the
//! session: a failed delivery leaves the result readable from the handle.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval};

use crate::attempt::{AttemptSession, AttemptSnapshot, Direction, Phase, Tick};
use crate::error::SessionError;
use crate::model::TestDefinition;
use crate::results::{AttemptResult, SubmissionPayload, SubmitTrigger};
use crate::traits::{AttemptObserver, ResultSink};

const COMMAND_BUFFER: usize = 32;
/// Shortest accepted tick; `interval_at` rejects a zero period.
const MIN_TICK: Duration = Duration::from_millis(1);

/// Configuration for an attempt driver.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Real time per second of attempt time.
    pub tick: Duration,
    /// Learner to attribute the submission to.
    pub learner_id: Option<String>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            learner_id: None,
        }
    }
}

/// Where the hand-off to the result sink stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum SubmissionStatus {
    NotSubmitted,
    Pending,
    Delivered,
    Failed(String),
}

impl SubmissionStatus {
    pub fn is_settled(&self) -> bool {
        matches!(self, SubmissionStatus::Delivered | SubmissionStatus::Failed(_))
    }
}

/// Latest published state of an attempt.
#[derive(Debug, Clone)]
pub struct AttemptStatus {
    pub phase: Phase,
    pub remaining_secs: u64,
    /// Set once, when the attempt is submitted.
    pub payload: Option<SubmissionPayload>,
    pub submission: SubmissionStatus,
}

impl AttemptStatus {
    pub fn result(&self) -> Option<&AttemptResult> {
        self.payload.as_ref().map(|p| &p.result)
    }
}

enum Command {
    Select {
        question_id: String,
        option_id: String,
        reply: oneshot::Sender<Result<bool, SessionError>>,
    },
    Clear {
        question_id: String,
        reply: oneshot::Sender<Result<bool, SessionError>>,
    },
    ToggleReview {
        question_id: String,
        reply: oneshot::Sender<Result<bool, SessionError>>,
    },
    Advance {
        direction: Direction,
        reply: oneshot::Sender<Result<usize, SessionError>>,
    },
    GoTo {
        index: usize,
        reply: oneshot::Sender<Result<usize, SessionError>>,
    },
    Snapshot {
        reply: oneshot::Sender<AttemptSnapshot>,
    },
    Submit {
        reply: oneshot::Sender<Result<AttemptResult, SessionError>>,
    },
    Dispose {
        reply: oneshot::Sender<()>,
    },
}

/// Start an attempt and its timer.
///
/// The definition is checked before anything is spawned, so an invalid test
/// never starts a timer. Must be called from within a Tokio runtime.
pub fn spawn_attempt(
    definition: TestDefinition,
    mut config: DriverConfig,
    sink: Arc<dyn ResultSink>,
    observer: Arc<dyn AttemptObserver>,
) -> Result<AttemptHandle, SessionError> {
    config.tick = config.tick.max(MIN_TICK);
    let definition = Arc::new(definition);
    let session = AttemptSession::start(TestDefinition::clone(&definition))?;

    let (commands, command_rx) = mpsc::channel(COMMAND_BUFFER);
    let (status_tx, status) = watch::channel(AttemptStatus {
        phase: session.phase(),
        remaining_secs: session.remaining_secs(),
        payload: None,
        submission: SubmissionStatus::NotSubmitted,
    });

    let ticker = tokio::time::interval_at(Instant::now() + config.tick, config.tick);
    let driver = Driver {
        session,
        ticker: Some(ticker),
        config,
        sink,
        observer,
        status: Arc::new(status_tx),
    };
    let task = tokio::spawn(driver.run(command_rx));

    Ok(AttemptHandle {
        commands,
        status,
        definition,
        task,
    })
}

struct Driver {
    session: AttemptSession,
    ticker: Option<Interval>,
    config: DriverConfig,
    sink: Arc<dyn ResultSink>,
    observer: Arc<dyn AttemptObserver>,
    status: Arc<watch::Sender<AttemptStatus>>,
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(t) => {
            t.tick().await;
        }
        None => std::future::pending().await,
    }
}

impl Driver {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        let test_id = self.session.definition().id.clone();
        tracing::debug!(%test_id, "attempt driver started");

        loop {
            tokio::select! {
                _ = next_tick(&mut self.ticker) => self.on_tick(),
                command = commands.recv() => {
                    let Some(command) = command else {
                        tracing::debug!(%test_id, "all handles dropped");
                        break;
                    };
                    if !self.handle(command) {
                        break;
                    }
                }
            }
        }

        self.ticker = None;
        self.session.dispose();
        self.publish();
        tracing::debug!(%test_id, "attempt driver stopped");
    }

    fn on_tick(&mut self) {
        match self.session.tick() {
            Tick::Running { .. } => {
                self.observer.on_tick(&self.session.snapshot());
                self.publish();
            }
            Tick::Expired => self.hand_off(SubmitTrigger::Timer),
            Tick::Idle => self.ticker = None,
        }
    }

    /// Apply one command. Returns `false` when the loop should stop.
    fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Select {
                question_id,
                option_id,
                reply,
            } => {
                let _ = reply.send(self.session.select(&question_id, &option_id));
            }
            Command::Clear { question_id, reply } => {
                let _ = reply.send(self.session.clear(&question_id));
            }
            Command::ToggleReview { question_id, reply } => {
                let _ = reply.send(self.session.toggle_review(&question_id));
            }
            Command::Advance { direction, reply } => {
                let _ = reply.send(self.session.advance(direction));
            }
            Command::GoTo { index, reply } => {
                let _ = reply.send(self.session.go_to(index));
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.session.snapshot());
            }
            Command::Submit { reply } => {
                if self.session.submit().is_some() {
                    self.hand_off(SubmitTrigger::Manual);
                }
                let outcome = self
                    .session
                    .result()
                    .cloned()
                    .ok_or(SessionError::Closed(self.session.phase()));
                let _ = reply.send(outcome);
            }
            Command::Dispose { reply } => {
                let _ = reply.send(());
                return false;
            }
        }
        self.publish();
        true
    }

    /// Stop the timer and pass the fresh result to the sink.
    fn hand_off(&mut self, trigger: SubmitTrigger) {
        self.ticker = None;

        let Some(result) = self.session.result().cloned() else {
            return;
        };
        let payload = SubmissionPayload::new(result, trigger, self.config.learner_id.clone());
        tracing::info!(
            test_id = %payload.test_id,
            attempt_id = %payload.attempt_id,
            ?trigger,
            score = payload.result.score,
            "attempt submitted"
        );
        self.observer.on_submitted(&payload);

        let phase = self.session.phase();
        let remaining_secs = self.session.remaining_secs();
        self.status.send_modify(|s| {
            s.phase = phase;
            s.remaining_secs = remaining_secs;
            s.payload = Some(payload.clone());
            s.submission = SubmissionStatus::Pending;
        });

        let sink = Arc::clone(&self.sink);
        let observer = Arc::clone(&self.observer);
        let status = Arc::clone(&self.status);
        tokio::spawn(async move {
            match sink.submit(&payload).await {
                Ok(()) => {
                    tracing::info!(sink = sink.name(), attempt_id = %payload.attempt_id, "submission delivered");
                    observer.on_delivery(&payload, Ok(()));
                    status.send_modify(|s| s.submission = SubmissionStatus::Delivered);
                }
                Err(e) => {
                    let reason = format!("{e:#}");
                    tracing::warn!(sink = sink.name(), attempt_id = %payload.attempt_id, "submission failed: {reason}");
                    observer.on_delivery(&payload, Err(reason.as_str()));
                    status.send_modify(|s| s.submission = SubmissionStatus::Failed(reason));
                }
            }
        });
    }

    fn publish(&self) {
        let phase = self.session.phase();
        let remaining_secs = self.session.remaining_secs();
        self.status.send_modify(|s| {
            s.phase = phase;
            s.remaining_secs = remaining_secs;
        });
    }
}

/// Caller-side handle to a running attempt.
///
/// Dropping the handle stops the driver and its timer.
pub struct AttemptHandle {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<AttemptStatus>,
    definition: Arc<TestDefinition>,
    task: JoinHandle<()>,
}

impl AttemptHandle {
    pub fn definition(&self) -> &TestDefinition {
        &self.definition
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| SessionError::DriverStopped)?;
        rx.await.map_err(|_| SessionError::DriverStopped)
    }

    pub async fn select(&self, question_id: &str, option_id: &str) -> Result<bool, SessionError> {
        self.request(|reply| Command::Select {
            question_id: question_id.to_string(),
            option_id: option_id.to_string(),
            reply,
        })
        .await?
    }

    pub async fn clear(&self, question_id: &str) -> Result<bool, SessionError> {
        self.request(|reply| Command::Clear {
            question_id: question_id.to_string(),
            reply,
        })
        .await?
    }

    pub async fn toggle_review(&self, question_id: &str) -> Result<bool, SessionError> {
        self.request(|reply| Command::ToggleReview {
            question_id: question_id.to_string(),
            reply,
        })
        .await?
    }

    pub async fn advance(&self, direction: Direction) -> Result<usize, SessionError> {
        self.request(|reply| Command::Advance { direction, reply })
            .await?
    }

    pub async fn go_to(&self, index: usize) -> Result<usize, SessionError> {
        self.request(|reply| Command::GoTo { index, reply }).await?
    }

    pub async fn snapshot(&self) -> Result<AttemptSnapshot, SessionError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Submit the attempt, or return the existing result if already submitted.
    pub async fn submit(&self) -> Result<AttemptResult, SessionError> {
        self.request(|reply| Command::Submit { reply }).await?
    }

    /// Latest published status.
    pub fn status(&self) -> AttemptStatus {
        self.status.borrow().clone()
    }

    /// The submitted result, if any. Available even when delivery failed.
    pub fn result(&self) -> Option<AttemptResult> {
        self.status.borrow().result().cloned()
    }

    /// Wait until the attempt is submitted, manually or by the timer.
    ///
    /// Returns `None` if the attempt ends without a result (disposed).
    pub async fn wait_for_result(&self) -> Option<AttemptResult> {
        let mut rx = self.status.clone();
        let status = rx.wait_for(|s| s.payload.is_some()).await.ok()?;
        status.result().cloned()
    }

    /// Wait until the sink hand-off has succeeded or failed.
    pub async fn wait_for_delivery(&self) -> Option<SubmissionStatus> {
        let mut rx = self.status.clone();
        let status = rx.wait_for(|s| s.submission.is_settled()).await.ok()?;
        Some(status.submission.clone())
    }

    /// Abandon the attempt and wait for the driver to stop.
    pub async fn dispose(self) {
        let _ = self.request(|reply| Command::Dispose { reply }).await;
        if let Err(e) = self.task.await {
            tracing::error!("attempt driver panicked: {e}");
        }
    }
}
