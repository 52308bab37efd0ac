//! # archipelago-inference
//!
//! Advisory services for archipelago tags.
//!
//! This crate provides:
//! - A tag suggester backed by any OpenAI-compatible chat completions endpoint
//! - A Triton embedding inferer for short texts
//! - A Qdrant-backed tag graph for "closest tags" lookups
//!
//! None of these take part in a store transaction. Callers treat failures as
//! advisory and keep going.
//!
//! # Example
//!
//! ```rust,no_run
//! use archipelago_inference::{OpenAITagSuggester, SuggesterConfig};
//! use archipelago_core::TagSuggester;
//!
//! #[tokio::main]
//! async fn main() {
//!     let suggester =
//!         OpenAITagSuggester::new(SuggesterConfig::new("http://localhost:11434/v1")).unwrap();
//!     let tags = suggester.suggest_tags("Rust ownership notes", 3).await.unwrap();
//!     println!("{:?}", tags);
//! }
//! ```

pub mod config;
pub mod openai;
pub mod qdrant;

pub use archipelago_core::*;

pub use config::{SuggesterConfig, TagGraphConfig};
pub use openai::OpenAITagSuggester;
pub use qdrant::{QdrantTagGraph, TritonInferer};
