//! Core traits for reverie abstractions.
//!
//! These traits define the interfaces that concrete implementations
//! must satisfy, enabling pluggable backends and testability.

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// ENTRY REPOSITORY
// =============================================================================

/// Request for creating a new journal entry.
#[derive(Debug, Clone, serde::Deserialize, utoipa::ToSchema)]
pub struct CreateEntryRequest {
    pub content: String,
    pub mood: Option<Mood>,
    /// Calendar day for the entry; defaults to today when omitted.
    pub entry_date: Option<NaiveDate>,
}

/// Request for updating an existing journal entry.
///
/// All fields are optional to support partial updates.
#[derive(Debug, Clone, Default, serde::Deserialize, utoipa::ToSchema)]
pub struct UpdateEntryRequest {
    pub content: Option<String>,
    pub mood: Option<Mood>,
}

/// Repository for journal entry CRUD and AI-field writes.
///
/// Every operation is keyed by `(id, owner_id)`. The AI writes
/// (`begin_processing`, `complete_analysis`, `fail_analysis`,
/// `reset_pending`) always write the complete AI field set so a row can
/// never hold a partial success/failed combination.
#[async_trait]
pub trait EntryRepository: Send + Sync {
    /// Insert a new entry in `pending` status.
    async fn insert(&self, owner_id: Uuid, req: CreateEntryRequest) -> Result<Uuid>;

    /// Fetch an entry by id, scoped to its owner. Returns `None` when the
    /// row does not exist or belongs to someone else.
    async fn fetch(&self, id: Uuid, owner_id: Uuid) -> Result<Option<Entry>>;

    /// List entries for an owner, newest first.
    async fn list(&self, owner_id: Uuid, limit: i64, offset: i64) -> Result<Vec<Entry>>;

    /// List entries whose date falls in `[start, end]`, oldest first
    /// (batch insights read entries in chronological order).
    async fn list_by_date_range(
        &self,
        owner_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Entry>>;

    /// Update content and/or mood. A content change resets the AI fields
    /// back to `pending` — the stored analysis no longer describes the text.
    async fn update(&self, id: Uuid, owner_id: Uuid, req: UpdateEntryRequest) -> Result<bool>;

    /// Hard-delete an entry. Returns whether a row was removed.
    async fn delete(&self, id: Uuid, owner_id: Uuid) -> Result<bool>;

    /// Transition `pending -> processing`, but only if the row still holds
    /// `pending` at write time. Returns whether the transition happened —
    /// the loser of a concurrent race observes `false`.
    async fn begin_processing(&self, id: Uuid, owner_id: Uuid) -> Result<bool>;

    /// Terminal write: `processing -> success` with the full analysis
    /// output, clearing any prior error.
    async fn complete_analysis(
        &self,
        id: Uuid,
        owner_id: Uuid,
        analysis: &EntryAnalysis,
    ) -> Result<()>;

    /// Terminal write: `processing -> failed` with the user-facing message,
    /// clearing all output fields.
    async fn fail_analysis(&self, id: Uuid, owner_id: Uuid, user_message: &str) -> Result<()>;

    /// Reset to `pending` (clearing outputs and error), but only if the row
    /// currently holds one of `expected`. Returns whether the reset happened.
    async fn reset_pending(
        &self,
        id: Uuid,
        owner_id: Uuid,
        expected: &[AiStatus],
    ) -> Result<bool>;
}

// =============================================================================
// INSIGHT REPOSITORY
// =============================================================================

/// Repository for batch insight records and their AI-field writes.
#[async_trait]
pub trait InsightRepository: Send + Sync {
    /// Insert a new insight in `pending` status.
    async fn insert(
        &self,
        owner_id: Uuid,
        insight_type: InsightType,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Uuid>;

    /// Fetch an insight by id, scoped to its owner.
    async fn fetch(&self, id: Uuid, owner_id: Uuid) -> Result<Option<Insight>>;

    /// List insights for an owner, newest first.
    async fn list(&self, owner_id: Uuid, limit: i64) -> Result<Vec<Insight>>;

    /// Hard-delete an insight. Returns whether a row was removed.
    async fn delete(&self, id: Uuid, owner_id: Uuid) -> Result<bool>;

    /// Transition `pending -> processing` if the row still holds `pending`.
    async fn begin_processing(&self, id: Uuid, owner_id: Uuid) -> Result<bool>;

    /// Terminal write: `processing -> success` with the full batch output.
    async fn complete_insight(
        &self,
        id: Uuid,
        owner_id: Uuid,
        insight: &BatchInsight,
    ) -> Result<()>;

    /// Terminal write: `processing -> failed` with the user-facing message.
    async fn fail_insight(&self, id: Uuid, owner_id: Uuid, user_message: &str) -> Result<()>;

    /// Reset to `pending` if the row currently holds one of `expected`.
    async fn reset_pending(
        &self,
        id: Uuid,
        owner_id: Uuid,
        expected: &[AiStatus],
    ) -> Result<bool>;
}

// =============================================================================
// INFERENCE
// =============================================================================

/// Backend for text generation (LLM).
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate text given a prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Generate text with system context.
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

/// Diagnostics surface for the AI backend, used by the connectivity
/// test endpoint.
#[async_trait]
pub trait ChatDiagnostics: Send + Sync {
    /// Whether a credential is configured at all.
    fn configured(&self) -> bool;

    /// Whether a trivial round-trip to the provider succeeds.
    async fn health_check(&self) -> Result<bool>;
}
