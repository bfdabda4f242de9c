//! HTTP handler modules for reverie-api.

pub mod ai;
pub mod entries;
pub mod insights;

use serde::Serialize;
use uuid::Uuid;

use reverie_ai::ClassifiedError;

/// Uniform outcome shape for every AI action endpoint.
///
/// Failures are reported in-band (HTTP 200 with `success: false`) so the
/// client retry logic can read `can_retry`/`retry_after` from one place.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AiActionResponse {
    pub success: bool,
    /// User-facing error message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Classified failure kind (snake_case).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_retry: Option<bool>,
    /// Seconds to wait before retrying, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    /// Created insight id, for the insight generation endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insight_id: Option<Uuid>,
}

impl AiActionResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
            error_type: None,
            can_retry: None,
            retry_after: None,
            insight_id: None,
        }
    }

    pub fn ok_with_insight(insight_id: Uuid) -> Self {
        Self {
            insight_id: Some(insight_id),
            ..Self::ok()
        }
    }

    pub fn from_classified(classified: &ClassifiedError) -> Self {
        Self {
            success: false,
            error: Some(classified.user_message.clone()),
            error_type: Some(classified.kind.as_str().to_string()),
            can_retry: Some(classified.retryable),
            retry_after: classified.retry_after_secs,
            insight_id: None,
        }
    }

    /// Plain failure with no classification (e.g. an empty date range).
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            error_type: None,
            can_retry: None,
            retry_after: None,
            insight_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reverie_ai::classify_error;

    #[test]
    fn from_classified_carries_retry_hints() {
        let classified = classify_error("429 retry after 25");
        let response = AiActionResponse::from_classified(&classified);

        assert!(!response.success);
        assert_eq!(response.error_type.as_deref(), Some("rate_limit"));
        assert_eq!(response.can_retry, Some(true));
        assert_eq!(response.retry_after, Some(25));
    }

    #[test]
    fn ok_serializes_without_error_fields() {
        let json = serde_json::to_string(&AiActionResponse::ok()).unwrap();
        assert_eq!(json, "{\"success\":true}");
    }

    #[test]
    fn failure_has_message_but_no_type() {
        let response = AiActionResponse::failure("No entries found between a and b");
        assert!(!response.success);
        assert!(response.error_type.is_none());
        assert!(response.can_retry.is_none());
    }
}
