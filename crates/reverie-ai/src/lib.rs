//! # reverie-ai
//!
//! AI analysis for reverie: the failure classifier and content validator,
//! the OpenAI-compatible chat backend, and the two job runners (single-entry
//! analysis and batch insight generation).
//!
//! The runners treat the provider as fallible and slow: content is validated
//! before any external call, the call itself is raced against a bounded
//! wait, and every failure is funneled through [`classify_error`] so nothing
//! upstream ever handles raw provider text.

pub mod batch_insights;
pub mod entry_analysis;
pub mod error;
mod json;
pub mod mock;
pub mod openai;

pub use batch_insights::generate_batch_insight;
pub use entry_analysis::{analyze_entry, test_connection};
pub use error::{classify_error, validate_content, AiErrorKind, AiJobError, ClassifiedError};
pub use openai::{OpenAIBackend, OpenAIConfig};
