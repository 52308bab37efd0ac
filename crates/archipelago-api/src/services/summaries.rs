//! Meeting summaries.
//!
//! Summaries are written by the transcription pipeline and are not access
//! controlled on their own. Attaching one to a note, or listing a note's
//! summaries, goes through the note's access level.

use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use archipelago_core::{Detalization, NoteOperation, Result, SaveSummaryRequest, Summary};

use super::{NoteGuard, Stores};

/// Body of a summary upsert.
#[derive(Debug, Clone, Deserialize)]
pub struct SaveSummary {
    pub id: Uuid,
    pub text: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub detalization: Detalization,
    #[serde(default)]
    pub platform: String,
}

fn default_active() -> bool {
    true
}

#[derive(Clone)]
pub struct SummaryService {
    stores: Stores,
    guard: NoteGuard,
}

impl SummaryService {
    pub fn new(stores: Stores) -> Self {
        let guard = NoteGuard::new(stores.notes.clone());
        Self { stores, guard }
    }

    pub async fn save_text(&self, req: SaveSummary) -> Result<Summary> {
        self.stores
            .summaries
            .save_text(SaveSummaryRequest {
                id: req.id,
                text: req.text,
                active: req.active,
                detalization: req.detalization,
                platform: req.platform,
            })
            .await
    }

    pub async fn update_text_role(&self, id: Uuid, text_with_role: &str, role: &str) -> Result<()> {
        self.stores
            .summaries
            .update_text_role(id, text_with_role, role)
            .await
    }

    pub async fn finish(&self, id: Uuid) -> Result<()> {
        self.stores.summaries.finish(id).await
    }

    pub async fn get(&self, id: Uuid) -> Result<Summary> {
        self.stores.summaries.get(id).await
    }

    pub async fn list_active(&self) -> Result<Vec<Summary>> {
        self.stores.summaries.list_active().await
    }

    pub async fn update_name(&self, id: Uuid, name: &str) -> Result<()> {
        self.stores.summaries.update_name(id, name).await
    }

    pub async fn attach_to_note(&self, user_id: Uuid, summary_id: Uuid, note_id: Uuid) -> Result<()> {
        self.guard
            .require(note_id, user_id, NoteOperation::AttachSummary)
            .await?;
        self.stores
            .summaries
            .attach_to_note(summary_id, note_id)
            .await?;
        info!(
            subsystem = "api",
            component = "summaries",
            op = "attach_to_note",
            summary_id = %summary_id,
            note_id = %note_id,
            user_id = %user_id,
            "Summary attached"
        );
        Ok(())
    }

    pub async fn list_for_note(&self, user_id: Uuid, note_id: Uuid) -> Result<Vec<Summary>> {
        self.guard
            .require(note_id, user_id, NoteOperation::ListSummaries)
            .await?;
        self.stores.summaries.list_for_note(note_id).await
    }
}
