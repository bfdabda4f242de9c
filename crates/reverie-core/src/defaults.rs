//! Centralized default constants for the reverie system.
//!
//! **This module is the single source of truth** for all shared default
//! values. Crates reference these constants instead of defining their own
//! magic numbers.

// =============================================================================
// CONTENT VALIDATION
// =============================================================================

/// Minimum trimmed content length accepted for AI analysis.
pub const CONTENT_MIN_CHARS: usize = 10;

/// Maximum trimmed content length accepted for AI analysis
/// (token limit + cost control).
pub const CONTENT_MAX_CHARS: usize = 10_000;

// =============================================================================
// INFERENCE
// =============================================================================

/// Default OpenAI-compatible API endpoint.
pub const OPENAI_URL: &str = "https://api.openai.com/v1";

/// Default model for single-entry analysis.
pub const ENTRY_MODEL: &str = "gpt-4o-mini";

/// Default model for batch insight generation (higher quality for
/// longitudinal analysis).
pub const INSIGHT_MODEL: &str = "gpt-4o";

/// Bounded wait for a single-entry analysis call.
pub const ENTRY_TIMEOUT_SECS: u64 = 30;

/// Bounded wait for a batch insight call. Longer than the entry ceiling
/// because batch prompts are proportionally larger.
pub const INSIGHT_TIMEOUT_SECS: u64 = 60;

/// Sampling temperature for both job kinds.
pub const GEN_TEMPERATURE: f32 = 0.7;

/// Completion token cap for single-entry analysis.
pub const ENTRY_MAX_TOKENS: u32 = 500;

/// Completion token cap for batch insights.
pub const INSIGHT_MAX_TOKENS: u32 = 1000;

// =============================================================================
// ERROR CLASSIFICATION
// =============================================================================

/// Fallback retry-after for rate-limit failures when the provider message
/// carries no explicit delay.
pub const RATE_LIMIT_RETRY_AFTER_SECS: u64 = 60;

// =============================================================================
// AUTO RETRY
// =============================================================================

/// Maximum automatic re-attempts after the initial trigger.
pub const AUTO_RETRY_MAX: u32 = 2;

/// First auto-retry delay.
pub const AUTO_RETRY_INITIAL_DELAY_MS: u64 = 2_000;

/// Cap on the exponential auto-retry delay.
pub const AUTO_RETRY_MAX_DELAY_MS: u64 = 10_000;

/// Bounded refresh polls after a job settles.
pub const REFRESH_POLL_ATTEMPTS: u32 = 5;

/// Interval between refresh polls.
pub const REFRESH_POLL_INTERVAL_MS: u64 = 2_000;

// =============================================================================
// INSIGHT RANGES
// =============================================================================

/// Trailing window for a weekly insight when no dates are given.
pub const WEEKLY_RANGE_DAYS: i64 = 7;

/// Trailing window for a monthly insight when no dates are given.
pub const MONTHLY_RANGE_DAYS: i64 = 30;

// =============================================================================
// PAGINATION
// =============================================================================

/// Default page size for list endpoints.
pub const PAGE_LIMIT: i64 = 50;

/// Default page offset.
pub const PAGE_OFFSET: i64 = 0;

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 3000;

/// Default rate limit: max requests per period.
pub const RATE_LIMIT_REQUESTS: u64 = 100;

/// Default rate limit: period in seconds.
pub const RATE_LIMIT_PERIOD_SECS: u64 = 60;

/// Default CORS max-age in seconds (1 hour).
pub const CORS_MAX_AGE_SECS: u64 = 3600;
