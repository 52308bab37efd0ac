//! Tag suggestion over an OpenAI-compatible chat completions API.
//!
//! Works with any endpoint that implements `POST /chat/completions`:
//! OpenAI, Ollama in compatibility mode, vLLM, LocalAI.

mod error;
mod suggester;
mod types;

pub use error::{to_archipelago_error, OpenAIErrorCode};
pub use suggester::{clean_suggestion, OpenAITagSuggester, TAG_SYSTEM_PROMPT};
pub use types::*;
