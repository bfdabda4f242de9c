//! OpenAI-compatible chat backend.

mod backend;
mod types;

pub use backend::{OpenAIBackend, OpenAIConfig, DEFAULT_OPENAI_URL};
pub use types::*;
