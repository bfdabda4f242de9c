//! Batch insight job runner.
//!
//! Synthesizes a weekly or monthly reflection from an ordered series of
//! entries. The bounded wait is twice the single-entry ceiling because
//! batch prompts grow with the number of entries.

use std::time::Duration;

use serde::Deserialize;
use tokio::time::timeout;
use tracing::{debug, warn};

use reverie_core::{
    defaults, BatchInsight, Entry, GenerationBackend, InsightType, SentimentTrend, Trajectory,
};

use crate::error::{classify_error, AiJobError, ClassifiedError};
use crate::json::extract_json;

const BATCH_SYSTEM_PROMPT: &str = "You are a compassionate journal reflection assistant. You help people understand patterns and growth in their journaling practice. Always respond with valid JSON only.";

/// Generate a batch insight from an ordered, non-empty list of entries.
///
/// An empty `entries` slice is a caller bug, not a provider failure, and
/// is reported as a precondition error rather than a classified one.
pub async fn generate_batch_insight(
    backend: &dyn GenerationBackend,
    entries: &[Entry],
    insight_type: InsightType,
) -> std::result::Result<BatchInsight, AiJobError> {
    if entries.is_empty() {
        return Err(AiJobError::Precondition(
            "cannot generate an insight from zero entries".to_string(),
        ));
    }

    let prompt = build_batch_prompt(entries, insight_type);

    debug!(
        subsystem = "ai",
        op = "generate_batch_insight",
        entry_count = entries.len(),
        prompt_len = prompt.len(),
        "Requesting batch reflection"
    );

    let ceiling = Duration::from_secs(defaults::INSIGHT_TIMEOUT_SECS);
    let raw = match timeout(ceiling, backend.generate_with_system(BATCH_SYSTEM_PROMPT, &prompt))
        .await
    {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            let classified = classify_error(&e.to_string());
            warn!(
                subsystem = "ai",
                op = "generate_batch_insight",
                error_kind = classified.kind.as_str(),
                retryable = classified.retryable,
                error = %classified.message,
                "Batch insight call failed"
            );
            return Err(classified.into());
        }
        Err(_) => {
            let classified = classify_error(&format!(
                "Request timed out after {}s",
                defaults::INSIGHT_TIMEOUT_SECS
            ));
            warn!(
                subsystem = "ai",
                op = "generate_batch_insight",
                error_kind = classified.kind.as_str(),
                "Batch insight exceeded the bounded wait"
            );
            return Err(classified.into());
        }
    };

    parse_batch_insight(&raw).map_err(AiJobError::Classified)
}

/// Concatenate dated entries (with any stored sentiment labels) into the
/// reflection prompt.
fn build_batch_prompt(entries: &[Entry], insight_type: InsightType) -> String {
    let entries_text = entries
        .iter()
        .enumerate()
        .map(|(idx, entry)| {
            let sentiment = entry
                .ai_sentiment
                .as_ref()
                .map(|s| format!(" (Sentiment: {})", s.label.as_str()))
                .unwrap_or_default();
            format!(
                "Entry {} - {}{}:\n{}",
                idx + 1,
                entry.entry_date,
                sentiment,
                entry.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");

    let time_frame = match insight_type {
        InsightType::Weekly => "week",
        InsightType::Monthly => "month",
    };
    let start_date = entries[0].entry_date;
    let end_date = entries[entries.len() - 1].entry_date;

    format!(
        r#"You are analyzing a series of {count} journal entries from a {time_frame} ({start_date} to {end_date}).

Provide a thoughtful, longitudinal reflection that:
1. Identifies patterns and themes across the entries
2. Notes any changes or developments over time
3. Highlights significant moments or realizations
4. Offers a compassionate, non-judgmental perspective
5. Identifies 3-5 recurring themes

Your response MUST be valid JSON matching this exact structure:
{{
  "reflection": "A 2-3 paragraph reflection on the entries, written in second person (you). Be warm, insightful, and focus on patterns over time.",
  "themes": ["theme1", "theme2", "theme3"],
  "sentimentAnalysis": {{
    "overall": "A one-sentence summary of the emotional trajectory",
    "average": 0.5,
    "trajectory": "improving"
  }}
}}

Notes:
- "average" should be a number between -1 (very negative) and 1 (very positive)
- "trajectory" must be one of: "improving", "declining", or "stable"
- Keep the reflection conversational and warm, not clinical
- Focus on growth, patterns, and insights rather than just summarizing

Here are the entries:

{entries_text}"#,
        count = entries.len(),
    )
}

#[derive(Deserialize)]
struct RawBatchInsight {
    reflection: Option<String>,
    themes: Option<Vec<String>>,
    #[serde(rename = "sentimentAnalysis")]
    sentiment_analysis: Option<RawTrend>,
}

#[derive(Deserialize)]
struct RawTrend {
    overall: Option<String>,
    average: Option<f32>,
    trajectory: Option<String>,
}

/// Enforce the structural contract on a batch completion payload.
fn parse_batch_insight(raw: &str) -> std::result::Result<BatchInsight, ClassifiedError> {
    let parsed: RawBatchInsight = serde_json::from_str(extract_json(raw))
        .map_err(|e| classify_error(&format!("Invalid response: not a JSON object ({})", e)))?;

    let content = parsed
        .reflection
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| classify_error("Invalid response: missing reflection"))?;

    let themes = parsed
        .themes
        .filter(|t| !t.is_empty())
        .ok_or_else(|| classify_error("Invalid response: missing themes"))?;

    let trend = parsed
        .sentiment_analysis
        .ok_or_else(|| classify_error("Invalid response: missing sentiment analysis"))?;
    let overall = trend
        .overall
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| classify_error("Invalid response: missing trajectory summary"))?;
    let average = trend
        .average
        .filter(|a| a.is_finite())
        .ok_or_else(|| classify_error("Invalid response: average is not a number"))?;
    let trajectory = trend
        .trajectory
        .as_deref()
        .and_then(Trajectory::parse)
        .ok_or_else(|| classify_error("Invalid response: unrecognized trajectory"))?;

    Ok(BatchInsight {
        content,
        themes,
        sentiment_trend: SentimentTrend {
            overall,
            average,
            trajectory,
        },
    })
}
