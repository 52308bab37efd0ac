//! Shared application state.

use std::sync::Arc;

use archipelago_core::{IdentityResolver, TagGraph, TagSuggester};

use crate::services::{DirectoryService, NoteService, Stores, SummaryService, TagService};

/// Cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub dirs: DirectoryService,
    pub notes: NoteService,
    pub tags: TagService,
    pub summaries: SummaryService,
    pub identity: Arc<dyn IdentityResolver>,
}

impl AppState {
    pub fn new(stores: Stores, identity: Arc<dyn IdentityResolver>) -> Self {
        Self {
            dirs: DirectoryService::new(stores.clone()),
            notes: NoteService::new(stores.clone()),
            tags: TagService::new(stores.clone()),
            summaries: SummaryService::new(stores),
            identity,
        }
    }

    pub fn with_suggester(mut self, suggester: Arc<dyn TagSuggester>) -> Self {
        self.tags = self.tags.with_suggester(suggester);
        self
    }

    pub fn with_tag_graph(mut self, graph: Arc<dyn TagGraph>) -> Self {
        self.tags = self.tags.with_graph(graph);
        self
    }
}
