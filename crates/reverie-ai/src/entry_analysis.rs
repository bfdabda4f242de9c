//! Single-entry analysis job runner.
//!
//! Extracts a summary, a sentiment score, and themes from one journal
//! entry. Content is validated before the provider is contacted, the
//! external call is bounded by a 30-second ceiling, and the returned
//! payload must satisfy a structural contract before it counts as success.

use std::time::Duration;

use serde::Deserialize;
use tokio::time::timeout;
use tracing::{debug, warn};

use reverie_core::{defaults, EntryAnalysis, GenerationBackend, Sentiment, SentimentLabel};

use crate::error::{classify_error, validate_content, AiJobError, ClassifiedError};
use crate::json::extract_json;

/// System instruction for entry analysis. The completion must be a JSON
/// object with `summary`, `sentiment {score, label}`, and `themes`.
const ENTRY_SYSTEM_PROMPT: &str = r#"You are a thoughtful journaling assistant. Analyze the user's journal entry and provide:
1. A brief 2-3 sentence summary
2. Overall sentiment (score from -1 to 1, and a label)
3. 3-5 key themes or topics

Be empathetic, non-judgmental, and focus on understanding rather than advising.

Respond in JSON format:
{
  "summary": "...",
  "sentiment": {
    "score": 0.5,
    "label": "positive" | "negative" | "neutral" | "mixed"
  },
  "themes": ["theme1", "theme2", "theme3"]
}"#;

/// Analyze a journal entry.
///
/// Fails fast (non-retryable) on content outside the accepted length
/// bounds; otherwise the provider call is awaited for at most
/// [`defaults::ENTRY_TIMEOUT_SECS`]. If the ceiling elapses the call is
/// abandoned — not cancelled at the network layer — and the failure is
/// classified as a timeout.
pub async fn analyze_entry(
    backend: &dyn GenerationBackend,
    content: &str,
) -> std::result::Result<EntryAnalysis, AiJobError> {
    if let Some(classified) = validate_content(content) {
        return Err(classified.into());
    }

    let ceiling = Duration::from_secs(defaults::ENTRY_TIMEOUT_SECS);
    let raw = match timeout(ceiling, backend.generate_with_system(ENTRY_SYSTEM_PROMPT, content))
        .await
    {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            let classified = classify_error(&e.to_string());
            warn!(
                subsystem = "ai",
                op = "analyze_entry",
                error_kind = classified.kind.as_str(),
                retryable = classified.retryable,
                error = %classified.message,
                "Entry analysis call failed"
            );
            return Err(classified.into());
        }
        Err(_) => {
            let classified = classify_error(&format!(
                "Request timed out after {}s",
                defaults::ENTRY_TIMEOUT_SECS
            ));
            warn!(
                subsystem = "ai",
                op = "analyze_entry",
                error_kind = classified.kind.as_str(),
                "Entry analysis exceeded the bounded wait"
            );
            return Err(classified.into());
        }
    };

    debug!(
        subsystem = "ai",
        op = "analyze_entry",
        response_len = raw.len(),
        "Parsing analysis payload"
    );

    parse_entry_analysis(&raw).map_err(AiJobError::Classified)
}

/// Verify the AI connection with a trivial round trip.
pub async fn test_connection(backend: &dyn GenerationBackend) -> bool {
    analyze_entry(backend, "Today was a good day. I felt happy and productive.")
        .await
        .is_ok()
}

#[derive(Deserialize)]
struct RawEntryAnalysis {
    summary: Option<String>,
    sentiment: Option<RawSentiment>,
    themes: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct RawSentiment {
    score: Option<f32>,
    label: Option<String>,
}

/// Enforce the structural contract on a completion payload.
fn parse_entry_analysis(raw: &str) -> std::result::Result<EntryAnalysis, ClassifiedError> {
    let parsed: RawEntryAnalysis = serde_json::from_str(extract_json(raw))
        .map_err(|e| classify_error(&format!("Invalid response: not a JSON object ({})", e)))?;

    let summary = parsed
        .summary
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| classify_error("Invalid response: missing summary"))?;

    let sentiment = parsed
        .sentiment
        .ok_or_else(|| classify_error("Invalid response: missing sentiment"))?;
    let score = sentiment
        .score
        .filter(|s| s.is_finite())
        .ok_or_else(|| classify_error("Invalid response: sentiment score is not a number"))?;
    let label = sentiment
        .label
        .as_deref()
        .and_then(SentimentLabel::parse)
        .ok_or_else(|| classify_error("Invalid response: unrecognized sentiment label"))?;

    let themes = parsed
        .themes
        .filter(|t| !t.is_empty())
        .ok_or_else(|| classify_error("Invalid response: missing themes"))?;

    Ok(EntryAnalysis {
        summary,
        sentiment: Sentiment { score, label },
        themes,
    })
}
