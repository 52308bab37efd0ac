//! HTTP handlers, one module per resource.
//!
//! Handlers only parse the request and shape the response; the decisions
//! live in [`crate::services`].

pub mod dirs;
pub mod health;
pub mod notes;
pub mod summaries;
pub mod tags;
