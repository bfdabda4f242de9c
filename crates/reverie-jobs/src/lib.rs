//! # reverie-jobs
//!
//! The AI job lifecycle for reverie: the status state machine driving
//! `pending -> processing -> {success | failed}` over entries and insights,
//! and the client-side auto-retry orchestration that re-fires retryable
//! failures with bounded exponential backoff.

pub mod auto_retry;
pub mod processor;

pub use auto_retry::{
    AnalysisTrigger, AutoRetryOrchestrator, RefreshPolicy, RetryPolicy, StatusProbe,
    TriggerResult,
};
pub use processor::{empty_range_message, AiProcessor, InsightOutcome, ProcessOutcome};
