//! Repository and service traits.
//!
//! Stores are PostgreSQL-backed in `archipelago-db`; advisory services live in
//! `archipelago-inference`. Every trait is object-safe and `Send + Sync` so the
//! API can hold them as `Arc<dyn ...>` and tests can swap in fakes.

use async_trait::async_trait;
use uuid::Uuid;

use crate::access::{AccessLevel, AccessSnapshot};
use crate::error::Result;
use crate::models::*;

// =============================================================================
// DIRECTORIES
// =============================================================================

/// Persistence of the directory hierarchy.
#[async_trait]
pub trait DirectoryRepository: Send + Sync {
    /// Fetch one directory. Absent → `DirectoryNotFound`.
    async fn get(&self, id: i64) -> Result<Directory>;

    /// The directory and every descendant, in one query.
    ///
    /// Returns an empty vector when `root_id` does not exist.
    async fn subtree(&self, root_id: i64) -> Result<Vec<Directory>>;

    /// All root directories.
    async fn list_roots(&self) -> Result<Vec<Directory>>;

    /// Create a directory under `parent_id`, or a root when `None`.
    async fn create(&self, name: &str, parent_id: Option<i64>) -> Result<Directory>;

    /// Rename a directory.
    async fn rename(&self, id: i64, name: &str) -> Result<Directory>;

    /// Re-parent a directory together with its whole subtree.
    ///
    /// Moving a directory under itself or one of its descendants fails with
    /// `InvalidInput`.
    async fn move_to(&self, id: i64, new_parent_id: Option<i64>) -> Result<Directory>;

    /// Delete an empty directory.
    ///
    /// Fails with `Conflict` while it still has child directories or notes.
    async fn delete(&self, id: i64) -> Result<()>;
}

// =============================================================================
// NOTES
// =============================================================================

/// Persistence of notes and per-user access overrides.
#[async_trait]
pub trait NoteRepository: Send + Sync {
    /// Fetch one note. Absent → `NoteNotFound`.
    async fn get(&self, id: Uuid) -> Result<Note>;

    /// Notes the user can at least read, with their effective level.
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<AccessibleNote>>;

    /// Notes stored in any of the given directories.
    async fn list_by_dir_ids(&self, dir_ids: &[i64]) -> Result<Vec<Note>>;

    /// Insert a new note. Unknown directory → `DirectoryNotFound`.
    async fn create(&self, req: CreateNoteRequest) -> Result<Note>;

    /// Apply a partial update.
    async fn update(&self, id: Uuid, req: UpdateNoteRequest) -> Result<Note>;

    /// Delete a note together with its overrides and links.
    async fn delete(&self, id: Uuid) -> Result<()>;

    /// Read the note's creator, default and the caller's override together.
    async fn access_snapshot(&self, note_id: Uuid, user_id: Uuid) -> Result<AccessSnapshot>;

    /// [`access_snapshot`](Self::access_snapshot) for a set of notes in one
    /// read. Ids with no note are left out.
    async fn access_snapshots(
        &self,
        note_ids: &[Uuid],
        user_id: Uuid,
    ) -> Result<Vec<AccessSnapshot>>;

    /// Upsert the override of `user_id` on the note.
    async fn set_user_access(&self, note_id: Uuid, user_id: Uuid, access: AccessLevel)
        -> Result<()>;

    /// Remove an override, falling back to the note's default.
    ///
    /// Returns whether an override existed.
    async fn remove_user_access(&self, note_id: Uuid, user_id: Uuid) -> Result<bool>;

    /// Every explicit override on the note.
    async fn list_access(&self, note_id: Uuid) -> Result<Vec<NoteAccessGrant>>;
}

// =============================================================================
// TAGS
// =============================================================================

/// Tag storage and the tag-note / tag-tag relations.
///
/// Every mutating method runs in its own transaction.
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Fetch one tag. Absent → `TagNotFound`.
    async fn get(&self, id: Uuid) -> Result<Tag>;

    /// Look a tag up by its normalized name.
    async fn find_by_name(&self, name: &str) -> Result<Option<Tag>>;

    /// Normalize `name`, find or create the tag and link it to the note.
    ///
    /// Linking an already-linked pair is a no-op.
    async fn create_and_link(&self, name: &str, note_id: Uuid) -> Result<Tag>;

    /// Link an existing tag to a note. Already linked is a no-op.
    async fn link_to_note(&self, tag_id: Uuid, note_id: Uuid) -> Result<()>;

    /// Remove a tag-note link, deleting the tag once it has no notes left.
    ///
    /// Returns whether the tag itself was deleted.
    async fn unlink_from_note(&self, tag_id: Uuid, note_id: Uuid) -> Result<bool>;

    /// Rename a tag, merging it into an existing tag on a name collision.
    ///
    /// Returns the surviving tag.
    async fn update_tag(&self, id: Uuid, new_name: &str) -> Result<Tag>;

    /// Point one note's link at the tag named `new_name` instead of `tag_id`.
    ///
    /// The old tag is deleted when no other note uses it. Returns the tag now
    /// linked and whether the old tag was deleted.
    async fn rename_for_note(
        &self,
        tag_id: Uuid,
        note_id: Uuid,
        new_name: &str,
    ) -> Result<(Tag, bool)>;

    /// Link two distinct tags, optionally labelling the relation.
    async fn link_tags(&self, tag1_id: Uuid, tag2_id: Uuid, label: Option<&str>) -> Result<()>;

    /// Remove a tag-tag link.
    async fn unlink_tags(&self, tag1_id: Uuid, tag2_id: Uuid) -> Result<()>;

    /// Tags linked to `id`, from either side of the relation.
    async fn linked_tags(&self, id: Uuid) -> Result<Vec<LinkedTag>>;

    /// Tags of a note ordered by name.
    async fn tags_for_note(&self, note_id: Uuid) -> Result<Vec<Tag>>;

    /// Ids of the notes carrying a tag.
    async fn notes_for_tag(&self, tag_id: Uuid) -> Result<Vec<Uuid>>;

    /// Delete a tag with all of its links.
    async fn delete_tag(&self, id: Uuid) -> Result<()>;
}

// =============================================================================
// SUMMARIES
// =============================================================================

/// Persistence of meeting summaries and their note attachments.
#[async_trait]
pub trait SummaryRepository: Send + Sync {
    /// Insert or replace the summary text. Re-saving clears the role fields.
    async fn save_text(&self, req: SaveSummaryRequest) -> Result<Summary>;

    async fn update_text_role(&self, id: Uuid, text_with_role: &str, role: &str) -> Result<()>;

    /// Mark a summary inactive.
    async fn finish(&self, id: Uuid) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Summary>;

    /// Summaries still being produced.
    async fn list_active(&self) -> Result<Vec<Summary>>;

    async fn update_name(&self, id: Uuid, name: &str) -> Result<()>;

    /// Attach a summary to a note. Already attached is a no-op.
    async fn attach_to_note(&self, summary_id: Uuid, note_id: Uuid) -> Result<()>;

    /// Summaries attached to a note, newest first.
    async fn list_for_note(&self, note_id: Uuid) -> Result<Vec<Summary>>;
}

// =============================================================================
// IDENTITY
// =============================================================================

/// Maps an opaque session id to the authenticated user.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// `Ok(None)` when the session is unknown or expired.
    async fn resolve(&self, session_id: &str) -> Result<Option<Uuid>>;
}

// =============================================================================
// ADVISORY SERVICES
// =============================================================================

/// Suggests tag names for a piece of text.
#[async_trait]
pub trait TagSuggester: Send + Sync {
    /// Up to `count` normalized tag names. May return fewer.
    async fn suggest_tags(&self, text: &str, count: usize) -> Result<Vec<String>>;
}

/// Produces an embedding vector for a short text.
#[async_trait]
pub trait EmbeddingInferer: Send + Sync {
    async fn infer(&self, text: &str) -> Result<Vec<f32>>;
}

/// Similarity index over tag names.
#[async_trait]
pub trait TagGraph: Send + Sync {
    /// Insert or refresh the tag's point, owned by `user_id`.
    async fn upsert_tag(&self, tag: &Tag, user_id: Uuid) -> Result<()>;

    /// Ids of the tags of `user_id` closest to `tag`.
    async fn closest_tags(&self, tag: &Tag, user_id: Uuid, limit: usize) -> Result<Vec<Uuid>>;

    async fn delete_tag(&self, tag_id: Uuid) -> Result<()>;
}
