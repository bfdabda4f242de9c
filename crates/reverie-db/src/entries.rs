//! Journal entry repository implementation.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde_json::Value as JsonValue;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use reverie_core::{
    AiStatus, CreateEntryRequest, Entry, EntryAnalysis, EntryRepository, Error, Mood, Result,
    UpdateEntryRequest,
};

/// Columns selected for every entry read. Enum columns are cast to text and
/// converted in [`parse_entry_row`].
const ENTRY_COLUMNS: &str = "id, owner_id, entry_date, content, mood::text AS mood, \
     ai_status::text AS ai_status, ai_summary, ai_sentiment, ai_themes, ai_error, \
     created_at, updated_at";

/// PostgreSQL implementation of EntryRepository.
#[derive(Clone)]
pub struct PgEntryRepository {
    pool: Pool<Postgres>,
}

impl PgEntryRepository {
    /// Create a new PgEntryRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

/// Map expected statuses to their text form for `= ANY($n)` filters.
fn status_strings(expected: &[AiStatus]) -> Vec<String> {
    expected.iter().map(|s| s.as_str().to_string()).collect()
}

/// Parse an entry row into an Entry struct.
fn parse_entry_row(row: sqlx::postgres::PgRow) -> Result<Entry> {
    let mood: Option<String> = row.get("mood");
    let status: String = row.get("ai_status");
    let sentiment: Option<JsonValue> = row.get("ai_sentiment");
    let themes: Option<JsonValue> = row.get("ai_themes");

    Ok(Entry {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        entry_date: row.get("entry_date"),
        content: row.get("content"),
        mood: mood.as_deref().and_then(Mood::parse),
        ai_status: AiStatus::parse(&status),
        ai_summary: row.get("ai_summary"),
        ai_sentiment: sentiment
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| Error::Serialization(format!("bad ai_sentiment payload: {}", e)))?,
        ai_themes: themes
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| Error::Serialization(format!("bad ai_themes payload: {}", e)))?,
        ai_error: row.get("ai_error"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[async_trait]
impl EntryRepository for PgEntryRepository {
    async fn insert(&self, owner_id: Uuid, req: CreateEntryRequest) -> Result<Uuid> {
        let id = Uuid::now_v7();
        let now = Utc::now();
        let entry_date = req.entry_date.unwrap_or_else(|| now.date_naive());

        sqlx::query(
            "INSERT INTO entries (id, owner_id, entry_date, content, mood, ai_status, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5::mood, 'pending'::ai_status, $6, $6)",
        )
        .bind(id)
        .bind(owner_id)
        .bind(entry_date)
        .bind(&req.content)
        .bind(req.mood.map(|m| m.as_str()))
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(id)
    }

    async fn fetch(&self, id: Uuid, owner_id: Uuid) -> Result<Option<Entry>> {
        let query = format!(
            "SELECT {} FROM entries WHERE id = $1 AND owner_id = $2",
            ENTRY_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        row.map(parse_entry_row).transpose()
    }

    async fn list(&self, owner_id: Uuid, limit: i64, offset: i64) -> Result<Vec<Entry>> {
        let query = format!(
            "SELECT {} FROM entries WHERE owner_id = $1
             ORDER BY entry_date DESC, created_at DESC
             LIMIT $2 OFFSET $3",
            ENTRY_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(owner_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        rows.into_iter().map(parse_entry_row).collect()
    }

    async fn list_by_date_range(
        &self,
        owner_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Entry>> {
        let query = format!(
            "SELECT {} FROM entries
             WHERE owner_id = $1 AND entry_date >= $2 AND entry_date <= $3
             ORDER BY entry_date ASC, created_at ASC",
            ENTRY_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(owner_id)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        rows.into_iter().map(parse_entry_row).collect()
    }

    async fn update(&self, id: Uuid, owner_id: Uuid, req: UpdateEntryRequest) -> Result<bool> {
        let now = Utc::now();

        let result = match (&req.content, req.mood) {
            // A content change invalidates the stored analysis: the AI
            // fields go back to pending alongside the new text.
            (Some(content), mood) => sqlx::query(
                "UPDATE entries
                 SET content = $3, mood = COALESCE($4::mood, mood),
                     ai_status = 'pending'::ai_status, ai_summary = NULL,
                     ai_sentiment = NULL, ai_themes = NULL, ai_error = NULL,
                     updated_at = $5
                 WHERE id = $1 AND owner_id = $2",
            )
            .bind(id)
            .bind(owner_id)
            .bind(content)
            .bind(mood.map(|m| m.as_str()))
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?,

            (None, Some(mood)) => sqlx::query(
                "UPDATE entries SET mood = $3::mood, updated_at = $4
                 WHERE id = $1 AND owner_id = $2",
            )
            .bind(id)
            .bind(owner_id)
            .bind(mood.as_str())
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?,

            (None, None) => return Ok(self.fetch(id, owner_id).await?.is_some()),
        };

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: Uuid, owner_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM entries WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(result.rows_affected() > 0)
    }

    async fn begin_processing(&self, id: Uuid, owner_id: Uuid) -> Result<bool> {
        // Conditional update: only the caller that still observes `pending`
        // wins the transition. A concurrent trigger gets `false` back
        // instead of double-running the job.
        let row = sqlx::query(
            "UPDATE entries
             SET ai_status = 'processing'::ai_status, updated_at = $3
             WHERE id = $1 AND owner_id = $2 AND ai_status = 'pending'::ai_status
             RETURNING id",
        )
        .bind(id)
        .bind(owner_id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.is_some())
    }

    async fn complete_analysis(
        &self,
        id: Uuid,
        owner_id: Uuid,
        analysis: &EntryAnalysis,
    ) -> Result<()> {
        let sentiment = serde_json::to_value(&analysis.sentiment)?;
        let themes = serde_json::to_value(&analysis.themes)?;

        sqlx::query(
            "UPDATE entries
             SET ai_status = 'success'::ai_status, ai_summary = $3,
                 ai_sentiment = $4, ai_themes = $5, ai_error = NULL,
                 updated_at = $6
             WHERE id = $1 AND owner_id = $2",
        )
        .bind(id)
        .bind(owner_id)
        .bind(&analysis.summary)
        .bind(sentiment)
        .bind(themes)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(())
    }

    async fn fail_analysis(&self, id: Uuid, owner_id: Uuid, user_message: &str) -> Result<()> {
        sqlx::query(
            "UPDATE entries
             SET ai_status = 'failed'::ai_status, ai_summary = NULL,
                 ai_sentiment = NULL, ai_themes = NULL, ai_error = $3,
                 updated_at = $4
             WHERE id = $1 AND owner_id = $2",
        )
        .bind(id)
        .bind(owner_id)
        .bind(user_message)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(())
    }

    async fn reset_pending(
        &self,
        id: Uuid,
        owner_id: Uuid,
        expected: &[AiStatus],
    ) -> Result<bool> {
        let row = sqlx::query(
            "UPDATE entries
             SET ai_status = 'pending'::ai_status, ai_summary = NULL,
                 ai_sentiment = NULL, ai_themes = NULL, ai_error = NULL,
                 updated_at = $3
             WHERE id = $1 AND owner_id = $2 AND ai_status::text = ANY($4)
             RETURNING id",
        )
        .bind(id)
        .bind(owner_id)
        .bind(Utc::now())
        .bind(status_strings(expected))
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.is_some())
    }
}
