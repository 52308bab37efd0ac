//! # archipelago-core
//!
//! Core types, traits, and pure logic for the archipelago notes backend.
//!
//! This crate holds the pieces every other crate depends on: the domain
//! models, the note access resolver, the directory tree assembler, tag name
//! normalization, and the repository traits implemented by `archipelago-db`.

pub mod access;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod tags;
pub mod traits;
pub mod tree;
pub mod uuid_utils;

// Re-export commonly used types at crate root
pub use access::{
    allowed_operations, authorize, resolve, AccessLevel, AccessSnapshot, NoteOperation,
};
pub use error::{Error, ErrorKind, Result};
pub use models::*;
pub use tags::{normalize_and_validate, normalize_tag_name, validate_tag_name};
pub use traits::*;
pub use tree::{build_tree, DirTree};
pub use uuid_utils::new_v7;
