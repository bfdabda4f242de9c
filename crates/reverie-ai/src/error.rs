//! AI failure classification and content validation.
//!
//! Every failure surfaced by the AI pipeline — validation, transport, or the
//! provider itself — passes through [`classify_error`] exactly once. Nothing
//! downstream (persistence, HTTP responses, clients) ever sees raw provider
//! text; it sees the fixed user-facing templates below plus the retryability
//! verdict.
//!
//! The classification is a substring decision table over the lowercased
//! error text. Provider wording changes can silently break it, so the table
//! lives behind this single pure function with per-kind tests and is not
//! duplicated anywhere else.

use regex::Regex;
use serde::{Deserialize, Serialize};

use reverie_core::defaults::{
    CONTENT_MAX_CHARS, CONTENT_MIN_CHARS, RATE_LIMIT_RETRY_AFTER_SECS,
};

/// Classified failure kinds for AI processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiErrorKind {
    Timeout,
    RateLimit,
    InvalidCredential,
    InsufficientQuota,
    NetworkError,
    InvalidResponse,
    ContentTooShort,
    ContentTooLong,
    Unknown,
}

impl AiErrorKind {
    /// String form used in HTTP responses and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            AiErrorKind::Timeout => "timeout",
            AiErrorKind::RateLimit => "rate_limit",
            AiErrorKind::InvalidCredential => "invalid_credential",
            AiErrorKind::InsufficientQuota => "insufficient_quota",
            AiErrorKind::NetworkError => "network_error",
            AiErrorKind::InvalidResponse => "invalid_response",
            AiErrorKind::ContentTooShort => "content_too_short",
            AiErrorKind::ContentTooLong => "content_too_long",
            AiErrorKind::Unknown => "unknown",
        }
    }
}

/// Normalized, user-safe representation of a failure during AI processing.
///
/// Reconstructed fresh on each failure, never stored — only `user_message`
/// is persisted (as the entity's `ai_error`).
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedError {
    pub kind: AiErrorKind,
    /// Raw internal message, for logs only.
    pub message: String,
    /// Fixed template shown to the user. Never contains provider text.
    pub user_message: String,
    /// Whether a re-attempt is expected to plausibly succeed without
    /// external intervention.
    pub retryable: bool,
    /// Seconds to wait before retrying, when the provider said so.
    pub retry_after_secs: Option<u64>,
}

impl ClassifiedError {
    /// User message plus retry guidance, for display surfaces.
    pub fn display_message(&self) -> String {
        let mut message = self.user_message.clone();
        if self.retryable {
            match self.retry_after_secs {
                Some(secs) => message.push_str(&format!(" You can retry in {} seconds.", secs)),
                None => message.push_str(" Click 'Retry' to try again."),
            }
        } else {
            message.push_str(" Please resolve the issue before retrying.");
        }
        message
    }
}

/// Failure from a job runner.
#[derive(Debug, Clone)]
pub enum AiJobError {
    /// The caller violated a runner precondition (e.g. an empty batch).
    /// Not a provider failure and never persisted as an `ai_error`.
    Precondition(String),
    /// Classified failure from validation or the provider.
    Classified(ClassifiedError),
}

impl From<ClassifiedError> for AiJobError {
    fn from(classified: ClassifiedError) -> Self {
        AiJobError::Classified(classified)
    }
}

/// Classify a raw error message from the AI provider or transport layer.
///
/// Deterministic, side-effect-free substring match over the lowercased
/// text. Order matters: credential and quota checks take precedence over
/// the generic timeout/network wording that can coincidentally appear in
/// longer provider messages. Unrecognized failures default to a retryable
/// `Unknown` — transient until proven otherwise.
pub fn classify_error(raw: &str) -> ClassifiedError {
    let lowered = raw.to_lowercase();

    if contains_any(&lowered, &["api key", "unauthorized", "401"]) {
        return ClassifiedError {
            kind: AiErrorKind::InvalidCredential,
            message: raw.to_string(),
            user_message: "Invalid AI provider API key. Please check your configuration."
                .to_string(),
            retryable: false,
            retry_after_secs: None,
        };
    }

    if contains_any(&lowered, &["rate limit", "429", "too many requests"]) {
        let retry_after = extract_retry_after(raw).unwrap_or(RATE_LIMIT_RETRY_AFTER_SECS);
        return ClassifiedError {
            kind: AiErrorKind::RateLimit,
            message: raw.to_string(),
            user_message: format!(
                "Rate limit reached. Please wait {} seconds before retrying.",
                retry_after
            ),
            retryable: true,
            retry_after_secs: Some(retry_after),
        };
    }

    if contains_any(&lowered, &["quota", "insufficient", "billing", "credits"]) {
        return ClassifiedError {
            kind: AiErrorKind::InsufficientQuota,
            message: raw.to_string(),
            user_message:
                "The AI account has insufficient credits. Please check your billing settings."
                    .to_string(),
            retryable: false,
            retry_after_secs: None,
        };
    }

    if contains_any(&lowered, &["timeout", "timed out", "etimedout"]) {
        return ClassifiedError {
            kind: AiErrorKind::Timeout,
            message: raw.to_string(),
            user_message: "Request timed out. The AI service may be slow. Please try again."
                .to_string(),
            retryable: true,
            retry_after_secs: None,
        };
    }

    if contains_any(
        &lowered,
        &[
            "network",
            "connection refused",
            "dns error",
            "error sending request",
            "econnrefused",
            "enotfound",
            "fetch failed",
        ],
    ) {
        return ClassifiedError {
            kind: AiErrorKind::NetworkError,
            message: raw.to_string(),
            user_message: "Network error. Please check your connection and try again."
                .to_string(),
            retryable: true,
            retry_after_secs: None,
        };
    }

    if contains_any(&lowered, &["invalid response", "json", "parse"]) {
        return ClassifiedError {
            kind: AiErrorKind::InvalidResponse,
            message: raw.to_string(),
            user_message:
                "Received an unexpected response from the AI service. Please try again."
                    .to_string(),
            retryable: true,
            retry_after_secs: None,
        };
    }

    ClassifiedError {
        kind: AiErrorKind::Unknown,
        message: raw.to_string(),
        user_message: "An unexpected error occurred during AI analysis. Please try again."
            .to_string(),
        retryable: true,
        retry_after_secs: None,
    }
}

/// Validate entry content before sending it to the AI provider.
///
/// Runs strictly before any external call so inputs that cannot succeed
/// never cost a provider round trip. Returns `None` when the content is
/// acceptable.
pub fn validate_content(content: &str) -> Option<ClassifiedError> {
    let trimmed = content.trim();

    if trimmed.chars().count() < CONTENT_MIN_CHARS {
        return Some(ClassifiedError {
            kind: AiErrorKind::ContentTooShort,
            message: "Content is too short for meaningful analysis".to_string(),
            user_message: format!(
                "Entry is too short for AI analysis. Please write at least {} characters.",
                CONTENT_MIN_CHARS
            ),
            retryable: false,
            retry_after_secs: None,
        });
    }

    if trimmed.chars().count() > CONTENT_MAX_CHARS {
        return Some(ClassifiedError {
            kind: AiErrorKind::ContentTooLong,
            message: "Content exceeds maximum length".to_string(),
            user_message: format!(
                "Entry is too long for AI analysis. Please keep it under {} characters.",
                CONTENT_MAX_CHARS
            ),
            retryable: false,
            retry_after_secs: None,
        });
    }

    None
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Pull a "retry after N" token out of a rate-limit message, if present.
fn extract_retry_after(raw: &str) -> Option<u64> {
    let re = Regex::new(r"(?i)retry[- ]after[:\s]+(\d+)").expect("static pattern");
    re.captures(raw)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Classification: one test per kind ──────────────────────────────────

    #[test]
    fn classify_api_key_as_invalid_credential() {
        let classified = classify_error("Incorrect API key provided: sk-proj-***");
        assert_eq!(classified.kind, AiErrorKind::InvalidCredential);
        assert!(!classified.retryable);
    }

    #[test]
    fn classify_401_as_invalid_credential() {
        let classified = classify_error("OpenAI returned 401 Unauthorized: bad token");
        assert_eq!(classified.kind, AiErrorKind::InvalidCredential);
        assert!(!classified.retryable);
    }

    #[test]
    fn classify_429_as_rate_limit() {
        let classified = classify_error("OpenAI returned 429 Too Many Requests");
        assert_eq!(classified.kind, AiErrorKind::RateLimit);
        assert!(classified.retryable);
        assert_eq!(classified.retry_after_secs, Some(60));
    }

    #[test]
    fn classify_rate_limit_extracts_retry_after() {
        let classified = classify_error("Rate limit exceeded, retry after 17 seconds");
        assert_eq!(classified.kind, AiErrorKind::RateLimit);
        assert_eq!(classified.retry_after_secs, Some(17));
        assert!(classified.user_message.contains("17"));
    }

    #[test]
    fn classify_rate_limit_retry_after_with_dash_and_colon() {
        let classified = classify_error("429: Retry-After: 30");
        assert_eq!(classified.retry_after_secs, Some(30));
    }

    #[test]
    fn classify_quota_as_insufficient_quota() {
        for raw in [
            "You exceeded your current quota",
            "insufficient funds on account",
            "billing hard limit reached",
            "not enough credits",
        ] {
            let classified = classify_error(raw);
            assert_eq!(classified.kind, AiErrorKind::InsufficientQuota, "{}", raw);
            assert!(!classified.retryable);
        }
    }

    #[test]
    fn classify_timeout() {
        for raw in [
            "Request timed out after 30000ms",
            "connect ETIMEDOUT 104.18.7.192:443",
            "operation timeout",
        ] {
            let classified = classify_error(raw);
            assert_eq!(classified.kind, AiErrorKind::Timeout, "{}", raw);
            assert!(classified.retryable);
            assert_eq!(classified.retry_after_secs, None);
        }
    }

    #[test]
    fn classify_network_markers() {
        for raw in [
            "network is unreachable",
            "tcp connect error: Connection refused (os error 111)",
            "dns error: failed to lookup address",
            "error sending request for url (https://api.openai.com/v1/chat/completions)",
        ] {
            let classified = classify_error(raw);
            assert_eq!(classified.kind, AiErrorKind::NetworkError, "{}", raw);
            assert!(classified.retryable);
        }
    }

    #[test]
    fn classify_invalid_response_markers() {
        for raw in [
            "Invalid response structure from provider",
            "expected value at line 1 column 1 (json)",
            "failed to parse completion payload",
        ] {
            let classified = classify_error(raw);
            assert_eq!(classified.kind, AiErrorKind::InvalidResponse, "{}", raw);
            assert!(classified.retryable);
        }
    }

    #[test]
    fn classify_unknown_is_optimistically_retryable() {
        let classified = classify_error("something inexplicable happened");
        assert_eq!(classified.kind, AiErrorKind::Unknown);
        assert!(classified.retryable);
    }

    // ── Precedence laws ────────────────────────────────────────────────────

    #[test]
    fn credential_takes_precedence_over_timeout_wording() {
        let classified =
            classify_error("401 Unauthorized: upstream gateway timeout while checking api key");
        assert_eq!(classified.kind, AiErrorKind::InvalidCredential);
        assert!(!classified.retryable);
    }

    #[test]
    fn credential_takes_precedence_over_rate_limit_wording() {
        let classified = classify_error("api key suspended after too many requests");
        assert_eq!(classified.kind, AiErrorKind::InvalidCredential);
    }

    #[test]
    fn quota_takes_precedence_over_network_wording() {
        let classified = classify_error("insufficient quota; network fallback disabled");
        assert_eq!(classified.kind, AiErrorKind::InsufficientQuota);
    }

    #[test]
    fn rate_limit_takes_precedence_over_json_wording() {
        let classified = classify_error("429 while decoding json body");
        assert_eq!(classified.kind, AiErrorKind::RateLimit);
    }

    // ── User messages never leak provider text ─────────────────────────────

    #[test]
    fn user_messages_do_not_leak_raw_text() {
        let secret = "sk-proj-SECRETSECRET";
        for raw in [
            format!("api key {} rejected", secret),
            format!("429 rate limit, token {}", secret),
            format!("inexplicable: {}", secret),
        ] {
            let classified = classify_error(&raw);
            assert!(!classified.user_message.contains(secret));
            assert_eq!(classified.message, raw);
        }
    }

    #[test]
    fn classification_is_case_insensitive() {
        assert_eq!(
            classify_error("RATE LIMIT EXCEEDED").kind,
            AiErrorKind::RateLimit
        );
        assert_eq!(
            classify_error("Request TIMED OUT").kind,
            AiErrorKind::Timeout
        );
    }

    // ── Validation ─────────────────────────────────────────────────────────

    #[test]
    fn validate_rejects_short_content() {
        let classified = validate_content("short").unwrap();
        assert_eq!(classified.kind, AiErrorKind::ContentTooShort);
        assert!(!classified.retryable);
    }

    #[test]
    fn validate_trims_before_measuring() {
        // 12 characters of padding around 5 of content
        let classified = validate_content("      hello      ").unwrap();
        assert_eq!(classified.kind, AiErrorKind::ContentTooShort);
    }

    #[test]
    fn validate_boundary_lengths() {
        assert!(validate_content(&"x".repeat(9)).is_some());
        assert!(validate_content(&"x".repeat(10)).is_none());
        assert!(validate_content(&"x".repeat(10_000)).is_none());
        let classified = validate_content(&"x".repeat(10_001)).unwrap();
        assert_eq!(classified.kind, AiErrorKind::ContentTooLong);
        assert!(!classified.retryable);
    }

    #[test]
    fn validate_accepts_normal_content() {
        assert!(validate_content("Today was a good day. I felt happy and productive.").is_none());
    }

    // ── Display guidance ───────────────────────────────────────────────────

    #[test]
    fn display_message_appends_retry_window() {
        let classified = classify_error("429 retry after 45");
        assert!(classified
            .display_message()
            .contains("You can retry in 45 seconds."));
    }

    #[test]
    fn display_message_for_non_retryable() {
        let classified = classify_error("invalid api key");
        assert!(classified
            .display_message()
            .contains("Please resolve the issue before retrying."));
    }

    #[test]
    fn display_message_for_retryable_without_delay() {
        let classified = classify_error("request timed out");
        assert!(classified.display_message().contains("Click 'Retry'"));
    }

    #[test]
    fn kind_strings_are_snake_case() {
        assert_eq!(AiErrorKind::RateLimit.as_str(), "rate_limit");
        assert_eq!(AiErrorKind::InvalidCredential.as_str(), "invalid_credential");
        assert_eq!(AiErrorKind::ContentTooShort.as_str(), "content_too_short");
    }
}
