//! Batch insight repository implementation.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde_json::Value as JsonValue;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use reverie_core::{
    AiStatus, BatchInsight, Error, Insight, InsightRepository, InsightType, Result,
};

const INSIGHT_COLUMNS: &str = "id, owner_id, insight_type::text AS insight_type, start_date, \
     end_date, ai_status::text AS ai_status, content, themes, sentiment_trend, ai_error, \
     created_at, updated_at";

/// PostgreSQL implementation of InsightRepository.
#[derive(Clone)]
pub struct PgInsightRepository {
    pool: Pool<Postgres>,
}

impl PgInsightRepository {
    /// Create a new PgInsightRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn status_strings(expected: &[AiStatus]) -> Vec<String> {
    expected.iter().map(|s| s.as_str().to_string()).collect()
}

/// Parse an insight row into an Insight struct.
fn parse_insight_row(row: sqlx::postgres::PgRow) -> Result<Insight> {
    let insight_type: String = row.get("insight_type");
    let status: String = row.get("ai_status");
    let themes: Option<JsonValue> = row.get("themes");
    let trend: Option<JsonValue> = row.get("sentiment_trend");

    Ok(Insight {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        insight_type: InsightType::parse(&insight_type)
            .ok_or_else(|| Error::Serialization(format!("bad insight_type: {}", insight_type)))?,
        start_date: row.get("start_date"),
        end_date: row.get("end_date"),
        ai_status: AiStatus::parse(&status),
        content: row.get("content"),
        themes: themes
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| Error::Serialization(format!("bad themes payload: {}", e)))?,
        sentiment_trend: trend
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| Error::Serialization(format!("bad sentiment_trend payload: {}", e)))?,
        ai_error: row.get("ai_error"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[async_trait]
impl InsightRepository for PgInsightRepository {
    async fn insert(
        &self,
        owner_id: Uuid,
        insight_type: InsightType,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Uuid> {
        let id = Uuid::now_v7();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO insights (id, owner_id, insight_type, start_date, end_date, ai_status, created_at, updated_at)
             VALUES ($1, $2, $3::insight_type, $4, $5, 'pending'::ai_status, $6, $6)",
        )
        .bind(id)
        .bind(owner_id)
        .bind(insight_type.as_str())
        .bind(start_date)
        .bind(end_date)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(id)
    }

    async fn fetch(&self, id: Uuid, owner_id: Uuid) -> Result<Option<Insight>> {
        let query = format!(
            "SELECT {} FROM insights WHERE id = $1 AND owner_id = $2",
            INSIGHT_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        row.map(parse_insight_row).transpose()
    }

    async fn list(&self, owner_id: Uuid, limit: i64) -> Result<Vec<Insight>> {
        let query = format!(
            "SELECT {} FROM insights WHERE owner_id = $1
             ORDER BY created_at DESC
             LIMIT $2",
            INSIGHT_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(owner_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        rows.into_iter().map(parse_insight_row).collect()
    }

    async fn delete(&self, id: Uuid, owner_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM insights WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(result.rows_affected() > 0)
    }

    async fn begin_processing(&self, id: Uuid, owner_id: Uuid) -> Result<bool> {
        let row = sqlx::query(
            "UPDATE insights
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

    async fn complete_insight(
        &self,
        id: Uuid,
        owner_id: Uuid,
        insight: &BatchInsight,
    ) -> Result<()> {
        let themes = serde_json::to_value(&insight.themes)?;
        let trend = serde_json::to_value(&insight.sentiment_trend)?;

        sqlx::query(
            "UPDATE insights
             SET ai_status = 'success'::ai_status, content = $3, themes = $4,
                 sentiment_trend = $5, ai_error = NULL, updated_at = $6
             WHERE id = $1 AND owner_id = $2",
        )
        .bind(id)
        .bind(owner_id)
        .bind(&insight.content)
        .bind(themes)
        .bind(trend)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(())
    }

    async fn fail_insight(&self, id: Uuid, owner_id: Uuid, user_message: &str) -> Result<()> {
        sqlx::query(
            "UPDATE insights
             SET ai_status = 'failed'::ai_status, content = NULL, themes = NULL,
                 sentiment_trend = NULL, ai_error = $3, updated_at = $4
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
            "UPDATE insights
             SET ai_status = 'pending'::ai_status, content = NULL, themes = NULL,
                 sentiment_trend = NULL, ai_error = NULL, updated_at = $3
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
