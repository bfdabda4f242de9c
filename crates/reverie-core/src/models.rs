//! Core data models for reverie.
//!
//! These types are shared across all reverie crates and represent the
//! journaling domain entities: entries, batch insights, and the AI
//! processing status attached to both.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// AI STATUS
// =============================================================================

/// Lifecycle status of AI processing for an entry or insight.
///
/// Transitions are driven exclusively by the job status controller:
/// `Pending -> Processing -> {Success | Failed}`. A terminal status is only
/// re-entered via an explicit user-initiated reset back to `Pending`
/// (retry / regenerate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AiStatus {
    Pending,
    Processing,
    Success,
    Failed,
}

impl AiStatus {
    /// String form used in the database and over the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            AiStatus::Pending => "pending",
            AiStatus::Processing => "processing",
            AiStatus::Success => "success",
            AiStatus::Failed => "failed",
        }
    }

    /// Parse from the database string form. Unknown strings fall back to
    /// `Pending`, matching how unrecognized rows should be treated (safe to
    /// re-process, never silently terminal).
    pub fn parse(s: &str) -> Self {
        match s {
            "pending" => AiStatus::Pending,
            "processing" => AiStatus::Processing,
            "success" => AiStatus::Success,
            "failed" => AiStatus::Failed,
            _ => AiStatus::Pending,
        }
    }

    /// Whether this status is terminal (success or failed).
    pub fn is_terminal(&self) -> bool {
        matches!(self, AiStatus::Success | AiStatus::Failed)
    }
}

impl std::fmt::Display for AiStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// MOOD & SENTIMENT
// =============================================================================

/// User-tagged mood for a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Positive,
    Neutral,
    Negative,
    Mixed,
}

impl Mood {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Positive => "positive",
            Mood::Neutral => "neutral",
            Mood::Negative => "negative",
            Mood::Mixed => "mixed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "positive" => Some(Mood::Positive),
            "neutral" => Some(Mood::Neutral),
            "negative" => Some(Mood::Negative),
            "mixed" => Some(Mood::Mixed),
            _ => None,
        }
    }
}

/// Sentiment label produced by entry analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
    Mixed,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Negative => "negative",
            SentimentLabel::Neutral => "neutral",
            SentimentLabel::Mixed => "mixed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "positive" => Some(SentimentLabel::Positive),
            "negative" => Some(SentimentLabel::Negative),
            "neutral" => Some(SentimentLabel::Neutral),
            "mixed" => Some(SentimentLabel::Mixed),
            _ => None,
        }
    }
}

/// AI-derived sentiment for a single entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Sentiment {
    /// Score in [-1, 1]; negative is negative affect.
    pub score: f32,
    pub label: SentimentLabel,
}

/// Direction of the sentiment trajectory across a batch of entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Trajectory {
    Improving,
    Declining,
    Stable,
}

impl Trajectory {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "improving" => Some(Trajectory::Improving),
            "declining" => Some(Trajectory::Declining),
            "stable" => Some(Trajectory::Stable),
            _ => None,
        }
    }
}

/// Longitudinal sentiment summary for a batch insight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SentimentTrend {
    /// One-sentence summary of the emotional trajectory.
    pub overall: String,
    /// Average sentiment score in [-1, 1].
    pub average: f32,
    pub trajectory: Trajectory,
}

// =============================================================================
// ENTRIES
// =============================================================================

/// A single journal entry with its AI-derived fields.
///
/// The AI output fields (`ai_summary`, `ai_sentiment`, `ai_themes`) are set
/// if and only if `ai_status == Success`; `ai_error` is set if and only if
/// `ai_status == Failed`.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Entry {
    pub id: Uuid,
    pub owner_id: Uuid,
    /// Calendar day the entry belongs to (no time component).
    pub entry_date: NaiveDate,
    pub content: String,
    pub mood: Option<Mood>,
    pub ai_status: AiStatus,
    pub ai_summary: Option<String>,
    pub ai_sentiment: Option<Sentiment>,
    pub ai_themes: Option<Vec<String>>,
    /// User-facing message from the last failed analysis.
    pub ai_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entry {
    /// Check the success/failed field consistency rule for this entry.
    pub fn ai_fields_consistent(&self) -> bool {
        match self.ai_status {
            AiStatus::Success => {
                self.ai_summary.is_some()
                    && self.ai_sentiment.is_some()
                    && self.ai_themes.is_some()
                    && self.ai_error.is_none()
            }
            AiStatus::Failed => {
                self.ai_error.is_some()
                    && self.ai_summary.is_none()
                    && self.ai_sentiment.is_none()
                    && self.ai_themes.is_none()
            }
            AiStatus::Pending | AiStatus::Processing => {
                self.ai_summary.is_none()
                    && self.ai_sentiment.is_none()
                    && self.ai_themes.is_none()
            }
        }
    }
}

/// Result of AI analysis on a single entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct EntryAnalysis {
    /// Brief 2-3 sentence overview of the entry.
    pub summary: String,
    pub sentiment: Sentiment,
    /// 3-5 key themes or topics, ordered by relevance.
    pub themes: Vec<String>,
}

// =============================================================================
// INSIGHTS
// =============================================================================

/// Kind of batch reflection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum InsightType {
    Weekly,
    Monthly,
}

impl InsightType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InsightType::Weekly => "weekly",
            InsightType::Monthly => "monthly",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "weekly" => Some(InsightType::Weekly),
            "monthly" => Some(InsightType::Monthly),
            _ => None,
        }
    }
}

/// An AI-synthesized reflection aggregating entries over a date range.
///
/// Same success/failed field consistency rules as [`Entry`].
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Insight {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub insight_type: InsightType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub ai_status: AiStatus,
    /// Reflection text.
    pub content: Option<String>,
    pub themes: Option<Vec<String>>,
    pub sentiment_trend: Option<SentimentTrend>,
    pub ai_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Insight {
    /// Check the success/failed field consistency rule for this insight.
    pub fn ai_fields_consistent(&self) -> bool {
        match self.ai_status {
            AiStatus::Success => {
                self.content.is_some()
                    && self.themes.is_some()
                    && self.sentiment_trend.is_some()
                    && self.ai_error.is_none()
            }
            AiStatus::Failed => {
                self.ai_error.is_some()
                    && self.content.is_none()
                    && self.themes.is_none()
                    && self.sentiment_trend.is_none()
            }
            AiStatus::Pending | AiStatus::Processing => true,
        }
    }
}

/// Result of batch insight generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct BatchInsight {
    /// Reflection text (2-3 paragraphs, second person).
    pub content: String,
    pub themes: Vec<String>,
    pub sentiment_trend: SentimentTrend,
}
