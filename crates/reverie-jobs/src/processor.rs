//! AI job status controller.
//!
//! [`AiProcessor`] drives the `ai_status` state machine for entries and
//! insights: `pending -> processing -> {success | failed}`. The `processing`
//! transition is a conditional write, persisted before the external call
//! starts; the terminal transition is exactly one write carrying the full
//! AI field set. The processor holds no state between invocations — every
//! call re-reads current status from the repository.
//!
//! `failed` and `success` are re-entered only through the explicit reset
//! paths (`retry_*`, `regenerate_entry`), never automatically.

use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use tracing::{info, warn};
use uuid::Uuid;

use reverie_ai::{analyze_entry, generate_batch_insight, AiJobError, ClassifiedError};
use reverie_core::{
    AiStatus, Entry, EntryRepository, Error, GenerationBackend, InsightRepository, InsightType,
    Result,
};

/// Outcome of driving one entry through the state machine.
#[derive(Debug, Clone)]
pub enum ProcessOutcome {
    /// Analysis succeeded; the entry now holds the output fields.
    Ok,
    /// Analysis failed; the entry holds the user message and the caller
    /// gets the classification (for retry decisions).
    Failed(ClassifiedError),
    /// No such entry for this owner. Nothing was written.
    NotFound,
    /// The entry was not in a processable status (already terminal, or a
    /// concurrent trigger holds the `processing` transition). Nothing was
    /// written.
    Skipped(AiStatus),
}

impl ProcessOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, ProcessOutcome::Ok)
    }
}

/// Outcome of driving one insight through the state machine.
#[derive(Debug, Clone)]
pub enum InsightOutcome {
    /// Reflection succeeded.
    Ok { insight_id: Uuid },
    /// Reflection failed; the insight holds the user message.
    Failed {
        insight_id: Uuid,
        classified: ClassifiedError,
    },
    /// The date range holds no entries. On first generation no record is
    /// created; on retry the existing record is marked failed.
    EmptyRange { start: NaiveDate, end: NaiveDate },
    /// No such insight for this owner.
    NotFound,
    /// The insight was not in a processable status. Nothing was written.
    Skipped(AiStatus),
}

/// The job status controller.
///
/// All dependencies are injected once at startup; the processor itself is
/// cheap to clone and share.
#[derive(Clone)]
pub struct AiProcessor {
    entries: Arc<dyn EntryRepository>,
    insights: Arc<dyn InsightRepository>,
    entry_backend: Arc<dyn GenerationBackend>,
    insight_backend: Arc<dyn GenerationBackend>,
}

impl AiProcessor {
    pub fn new(
        entries: Arc<dyn EntryRepository>,
        insights: Arc<dyn InsightRepository>,
        entry_backend: Arc<dyn GenerationBackend>,
        insight_backend: Arc<dyn GenerationBackend>,
    ) -> Self {
        Self {
            entries,
            insights,
            entry_backend,
            insight_backend,
        }
    }

    // =========================================================================
    // ENTRIES
    // =========================================================================

    /// Run AI analysis for a `pending` entry.
    ///
    /// Phase 2 of the two-phase contract: entry creation persists a
    /// `pending` row, and this is the separately triggerable unit of work.
    pub async fn process_entry(&self, id: Uuid, owner_id: Uuid) -> Result<ProcessOutcome> {
        let Some(entry) = self.entries.fetch(id, owner_id).await? else {
            return Ok(ProcessOutcome::NotFound);
        };

        if entry.ai_status != AiStatus::Pending {
            return Ok(ProcessOutcome::Skipped(entry.ai_status));
        }

        // Persisted before the external call starts, so concurrent
        // observers see "in flight" rather than stale "pending". Losing
        // this conditional write means another trigger won the race.
        if !self.entries.begin_processing(id, owner_id).await? {
            let status = self
                .entries
                .fetch(id, owner_id)
                .await?
                .map(|e| e.ai_status)
                .unwrap_or(AiStatus::Processing);
            return Ok(ProcessOutcome::Skipped(status));
        }

        let start = Instant::now();
        info!(
            subsystem = "jobs",
            component = "processor",
            op = "process_entry",
            entry_id = %id,
            "Processing entry analysis"
        );

        match analyze_entry(self.entry_backend.as_ref(), &entry.content).await {
            Ok(analysis) => {
                self.entries.complete_analysis(id, owner_id, &analysis).await?;
                info!(
                    subsystem = "jobs",
                    component = "processor",
                    entry_id = %id,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Entry analysis completed"
                );
                Ok(ProcessOutcome::Ok)
            }
            Err(AiJobError::Classified(classified)) => {
                self.entries
                    .fail_analysis(id, owner_id, &classified.user_message)
                    .await?;
                warn!(
                    subsystem = "jobs",
                    component = "processor",
                    entry_id = %id,
                    error_kind = classified.kind.as_str(),
                    retryable = classified.retryable,
                    duration_ms = start.elapsed().as_millis() as u64,
                    error = %classified.message,
                    "Entry analysis failed"
                );
                Ok(ProcessOutcome::Failed(classified))
            }
            Err(AiJobError::Precondition(msg)) => Err(Error::InvalidInput(msg)),
        }
    }

    /// Re-run analysis for a `failed` entry: reset to `pending`, then
    /// process end-to-end.
    pub async fn retry_entry(&self, id: Uuid, owner_id: Uuid) -> Result<ProcessOutcome> {
        self.reset_and_process(id, owner_id, &[AiStatus::Failed]).await
    }

    /// Recompute analysis for an entry that already succeeded, discarding
    /// the old output. Also accepts `failed` (regenerate doubles as retry).
    pub async fn regenerate_entry(&self, id: Uuid, owner_id: Uuid) -> Result<ProcessOutcome> {
        self.reset_and_process(id, owner_id, &[AiStatus::Success, AiStatus::Failed])
            .await
    }

    async fn reset_and_process(
        &self,
        id: Uuid,
        owner_id: Uuid,
        resettable: &[AiStatus],
    ) -> Result<ProcessOutcome> {
        let Some(entry) = self.entries.fetch(id, owner_id).await? else {
            return Ok(ProcessOutcome::NotFound);
        };

        match entry.ai_status {
            AiStatus::Pending => self.process_entry(id, owner_id).await,
            status if resettable.contains(&status) => {
                if self.entries.reset_pending(id, owner_id, resettable).await? {
                    self.process_entry(id, owner_id).await
                } else {
                    // Raced with another reset or trigger; report what the
                    // row holds now.
                    let status = self
                        .entries
                        .fetch(id, owner_id)
                        .await?
                        .map(|e| e.ai_status)
                        .unwrap_or(AiStatus::Processing);
                    Ok(ProcessOutcome::Skipped(status))
                }
            }
            status => Ok(ProcessOutcome::Skipped(status)),
        }
    }

    // =========================================================================
    // INSIGHTS
    // =========================================================================

    /// Generate a batch insight over `[start, end]`.
    ///
    /// An empty range fails before any record is created, so no `pending`
    /// row is ever left behind for an impossible job.
    pub async fn generate_insight(
        &self,
        owner_id: Uuid,
        insight_type: InsightType,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<InsightOutcome> {
        let entries = self.entries.list_by_date_range(owner_id, start, end).await?;

        if entries.is_empty() {
            info!(
                subsystem = "jobs",
                component = "processor",
                op = "generate_insight",
                %start,
                %end,
                "No entries in range; insight not created"
            );
            return Ok(InsightOutcome::EmptyRange { start, end });
        }

        let insight_id = self
            .insights
            .insert(owner_id, insight_type, start, end)
            .await?;

        self.run_insight(insight_id, owner_id, insight_type, &entries)
            .await
    }

    /// Re-run a failed (or previously successful) insight end-to-end.
    pub async fn retry_insight(&self, id: Uuid, owner_id: Uuid) -> Result<InsightOutcome> {
        let Some(insight) = self.insights.fetch(id, owner_id).await? else {
            return Ok(InsightOutcome::NotFound);
        };

        if insight.ai_status != AiStatus::Pending {
            let resettable = [AiStatus::Failed, AiStatus::Success];
            if !self
                .insights
                .reset_pending(id, owner_id, &resettable)
                .await?
            {
                let status = self
                    .insights
                    .fetch(id, owner_id)
                    .await?
                    .map(|i| i.ai_status)
                    .unwrap_or(AiStatus::Processing);
                return Ok(InsightOutcome::Skipped(status));
            }
        }

        let entries = self
            .entries
            .list_by_date_range(owner_id, insight.start_date, insight.end_date)
            .await?;

        if entries.is_empty() {
            // The range emptied out since the insight was created (entries
            // deleted). Mark the record failed so it never sits in pending
            // with nothing to process.
            let message = empty_range_message(insight.start_date, insight.end_date);
            self.insights.begin_processing(id, owner_id).await?;
            self.insights.fail_insight(id, owner_id, &message).await?;
            return Ok(InsightOutcome::EmptyRange {
                start: insight.start_date,
                end: insight.end_date,
            });
        }

        self.run_insight(id, owner_id, insight.insight_type, &entries)
            .await
    }

    async fn run_insight(
        &self,
        insight_id: Uuid,
        owner_id: Uuid,
        insight_type: InsightType,
        entries: &[Entry],
    ) -> Result<InsightOutcome> {
        if !self.insights.begin_processing(insight_id, owner_id).await? {
            let status = self
                .insights
                .fetch(insight_id, owner_id)
                .await?
                .map(|i| i.ai_status)
                .unwrap_or(AiStatus::Processing);
            return Ok(InsightOutcome::Skipped(status));
        }

        let start = Instant::now();
        info!(
            subsystem = "jobs",
            component = "processor",
            op = "run_insight",
            insight_id = %insight_id,
            entry_count = entries.len(),
            "Processing batch insight"
        );

        match generate_batch_insight(self.insight_backend.as_ref(), entries, insight_type).await {
            Ok(batch) => {
                self.insights
                    .complete_insight(insight_id, owner_id, &batch)
                    .await?;
                info!(
                    subsystem = "jobs",
                    component = "processor",
                    insight_id = %insight_id,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Batch insight completed"
                );
                Ok(InsightOutcome::Ok { insight_id })
            }
            Err(AiJobError::Classified(classified)) => {
                self.insights
                    .fail_insight(insight_id, owner_id, &classified.user_message)
                    .await?;
                warn!(
                    subsystem = "jobs",
                    component = "processor",
                    insight_id = %insight_id,
                    error_kind = classified.kind.as_str(),
                    retryable = classified.retryable,
                    duration_ms = start.elapsed().as_millis() as u64,
                    error = %classified.message,
                    "Batch insight failed"
                );
                Ok(InsightOutcome::Failed {
                    insight_id,
                    classified,
                })
            }
            Err(AiJobError::Precondition(msg)) => Err(Error::InvalidInput(msg)),
        }
    }
}

/// User-facing message for a date range with no entries.
pub fn empty_range_message(start: NaiveDate, end: NaiveDate) -> String {
    format!("No entries found between {} and {}", start, end)
}
