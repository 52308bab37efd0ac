//! Request-scoped business logic.
//!
//! Services sit between the HTTP handlers and the repositories: they resolve
//! the caller's access, enforce operation minimums and fire the advisory
//! tag-graph updates once a mutation has committed. Every service holds its
//! dependencies as trait objects so tests can swap in
//! [`crate::test_support::MemoryStore`].

pub mod access;
pub mod dirs;
pub mod notes;
pub mod summaries;
pub mod tags;

use std::sync::Arc;

use archipelago_core::{DirectoryRepository, NoteRepository, SummaryRepository, TagRepository};
use archipelago_db::Database;

pub use access::NoteGuard;
pub use dirs::DirectoryService;
pub use notes::{CreateNote, NoteService, NoteView};
pub use summaries::{SaveSummary, SummaryService};
pub use tags::TagService;

/// The four repositories behind trait objects.
#[derive(Clone)]
pub struct Stores {
    pub dirs: Arc<dyn DirectoryRepository>,
    pub notes: Arc<dyn NoteRepository>,
    pub tags: Arc<dyn TagRepository>,
    pub summaries: Arc<dyn SummaryRepository>,
}

impl Stores {
    /// Wrap the PostgreSQL repositories.
    pub fn from_database(db: Database) -> Self {
        Self {
            dirs: Arc::new(db.dirs),
            notes: Arc::new(db.notes),
            tags: Arc::new(db.tags),
            summaries: Arc::new(db.summaries),
        }
    }
}
