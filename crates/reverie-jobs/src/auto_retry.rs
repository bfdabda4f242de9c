//! Client-side auto-retry orchestration.
//!
//! When the presentation layer observes a freshly created entry in
//! `pending`, it hands the entry to [`AutoRetryOrchestrator`], which fires
//! the processing trigger once and, on retryable failures, re-fires with
//! exponential backoff up to a bounded attempt count. After the job settles
//! (success, non-retryable failure, or exhaustion) the orchestrator signals
//! the caller to refresh and polls the status-read operation a bounded
//! number of times to converge on the final displayed state.
//!
//! The processor never schedules anything on its own — this component is
//! the caller-side convergence policy, kept separate so embedders can swap
//! it out.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

use reverie_core::{defaults, AiStatus};

use crate::processor::ProcessOutcome;

/// Automatic retry policy: exponential backoff, bounded attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Automatic re-attempts after the initial trigger.
    pub max_auto_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_auto_retries: defaults::AUTO_RETRY_MAX,
            initial_delay: Duration::from_millis(defaults::AUTO_RETRY_INITIAL_DELAY_MS),
            max_delay: Duration::from_millis(defaults::AUTO_RETRY_MAX_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry following attempt `attempt_index`
    /// (0 = the initial trigger): `min(initial * 2^i, max)`.
    pub fn delay_for(&self, attempt_index: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt_index);
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Bounded refresh polling after a job settles.
#[derive(Debug, Clone)]
pub struct RefreshPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            attempts: defaults::REFRESH_POLL_ATTEMPTS,
            interval: Duration::from_millis(defaults::REFRESH_POLL_INTERVAL_MS),
        }
    }
}

/// Result of one trigger round trip, as seen by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerResult {
    /// The job settled in success, or another trigger owns it — either
    /// way there is nothing left to retry.
    Settled,
    /// The job failed with the given retryability verdict.
    Failure { retryable: bool },
}

impl From<&ProcessOutcome> for TriggerResult {
    fn from(outcome: &ProcessOutcome) -> Self {
        match outcome {
            ProcessOutcome::Ok => TriggerResult::Settled,
            // A concurrent trigger owns the transition; converge by polling.
            ProcessOutcome::Skipped(_) => TriggerResult::Settled,
            ProcessOutcome::NotFound => TriggerResult::Failure { retryable: false },
            ProcessOutcome::Failed(classified) => TriggerResult::Failure {
                retryable: classified.retryable,
            },
        }
    }
}

/// Fires the processing entry point for one entry.
#[async_trait]
pub trait AnalysisTrigger: Send + Sync + 'static {
    async fn trigger(&self, entry_id: Uuid) -> TriggerResult;
}

/// The status-read operation the orchestrator converges against.
#[async_trait]
pub trait StatusProbe: Send + Sync + 'static {
    /// Current status of the entry, or `None` if it no longer exists.
    async fn status(&self, entry_id: Uuid) -> Option<AiStatus>;
}

/// Per-entry auto-retry scheduler.
///
/// At most one task runs per entry; re-observing an entry that is already
/// tracked is a no-op. Cancelling (component teardown) aborts the task
/// before any pending timer fires.
pub struct AutoRetryOrchestrator {
    trigger: Arc<dyn AnalysisTrigger>,
    probe: Arc<dyn StatusProbe>,
    retry: RetryPolicy,
    refresh: RefreshPolicy,
    refresh_tx: mpsc::UnboundedSender<Uuid>,
    tasks: Mutex<HashMap<Uuid, JoinHandle<()>>>,
}

impl AutoRetryOrchestrator {
    /// Create an orchestrator with default policies. The returned receiver
    /// yields an entry id every time the caller should refresh its view of
    /// that entry.
    pub fn new(
        trigger: Arc<dyn AnalysisTrigger>,
        probe: Arc<dyn StatusProbe>,
    ) -> (Self, mpsc::UnboundedReceiver<Uuid>) {
        Self::with_policies(trigger, probe, RetryPolicy::default(), RefreshPolicy::default())
    }

    /// Create an orchestrator with explicit policies.
    pub fn with_policies(
        trigger: Arc<dyn AnalysisTrigger>,
        probe: Arc<dyn StatusProbe>,
        retry: RetryPolicy,
        refresh: RefreshPolicy,
    ) -> (Self, mpsc::UnboundedReceiver<Uuid>) {
        let (refresh_tx, refresh_rx) = mpsc::unbounded_channel();
        (
            Self {
                trigger,
                probe,
                retry,
                refresh,
                refresh_tx,
                tasks: Mutex::new(HashMap::new()),
            },
            refresh_rx,
        )
    }

    /// Start driving an entry observed in `pending`. No-op when the entry
    /// is already being driven.
    pub fn observe_pending(&self, entry_id: Uuid) {
        let mut tasks = self.tasks.lock().unwrap();
        tasks.retain(|_, handle| !handle.is_finished());
        if tasks.contains_key(&entry_id) {
            return;
        }

        debug!(
            subsystem = "jobs",
            component = "auto_retry",
            entry_id = %entry_id,
            "Observed pending entry; scheduling trigger"
        );

        let trigger = self.trigger.clone();
        let probe = self.probe.clone();
        let retry = self.retry.clone();
        let refresh = self.refresh.clone();
        let refresh_tx = self.refresh_tx.clone();

        let handle = tokio::spawn(async move {
            drive_entry(trigger, probe, retry, refresh, refresh_tx, entry_id).await;
        });
        tasks.insert(entry_id, handle);
    }

    /// Cancel the scheduled work for one entry (component teardown). Any
    /// pending retry timer is dropped before it fires.
    pub fn cancel(&self, entry_id: Uuid) {
        if let Some(handle) = self.tasks.lock().unwrap().remove(&entry_id) {
            handle.abort();
            debug!(
                subsystem = "jobs",
                component = "auto_retry",
                entry_id = %entry_id,
                "Cancelled auto-retry task"
            );
        }
    }

    /// Whether an entry currently has a live task.
    pub fn is_tracking(&self, entry_id: Uuid) -> bool {
        self.tasks
            .lock()
            .unwrap()
            .get(&entry_id)
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for AutoRetryOrchestrator {
    fn drop(&mut self) {
        for (_, handle) in self.tasks.lock().unwrap().drain() {
            handle.abort();
        }
    }
}

async fn drive_entry(
    trigger: Arc<dyn AnalysisTrigger>,
    probe: Arc<dyn StatusProbe>,
    retry: RetryPolicy,
    refresh: RefreshPolicy,
    refresh_tx: mpsc::UnboundedSender<Uuid>,
    entry_id: Uuid,
) {
    let mut attempt = 0u32;
    loop {
        debug!(
            subsystem = "jobs",
            component = "auto_retry",
            entry_id = %entry_id,
            attempt,
            "Triggering analysis"
        );

        match trigger.trigger(entry_id).await {
            TriggerResult::Settled => break,
            TriggerResult::Failure { retryable: false } => break,
            TriggerResult::Failure { retryable: true } => {
                if attempt >= retry.max_auto_retries {
                    debug!(
                        subsystem = "jobs",
                        component = "auto_retry",
                        entry_id = %entry_id,
                        attempt,
                        "Auto-retry cap reached"
                    );
                    break;
                }
                let delay = retry.delay_for(attempt);
                debug!(
                    subsystem = "jobs",
                    component = "auto_retry",
                    entry_id = %entry_id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Scheduling auto-retry"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }

    // The trigger is a stateless request/response hop, so the observed
    // state may lag the persisted one. Nudge the caller to refresh, then
    // poll the status read until a terminal state shows up (bounded).
    let _ = refresh_tx.send(entry_id);
    for _ in 0..refresh.attempts {
        tokio::time::sleep(refresh.interval).await;
        let _ = refresh_tx.send(entry_id);
        match probe.status(entry_id).await {
            Some(status) if status.is_terminal() => break,
            None => break,
            _ => {}
        }
    }
}
