//! Tag operations and the advisory suggestion and similarity services.
//!
//! Note-level operations are checked against the note. Tag-level operations
//! are checked against the notes carrying the tag: reading a tag needs
//! `read` on one of them, changing it needs `modify` on one of them.
//!
//! After a mutation commits, the tag graph is updated on a detached task.
//! Those updates are best effort: a failure is logged and never reaches the
//! caller.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use archipelago_core::defaults::{CLOSEST_TAGS_LIMIT, SUGGESTED_TAG_COUNT_MAX};
use archipelago_core::{
    AccessLevel, Error, LinkedTag, NoteOperation, Result, Tag, TagGraph, TagSuggester,
};

use super::{NoteGuard, Stores};

#[derive(Clone)]
pub struct TagService {
    stores: Stores,
    guard: NoteGuard,
    suggester: Option<Arc<dyn TagSuggester>>,
    graph: Option<Arc<dyn TagGraph>>,
}

impl TagService {
    pub fn new(stores: Stores) -> Self {
        let guard = NoteGuard::new(stores.notes.clone());
        Self {
            stores,
            guard,
            suggester: None,
            graph: None,
        }
    }

    pub fn with_suggester(mut self, suggester: Arc<dyn TagSuggester>) -> Self {
        self.suggester = Some(suggester);
        self
    }

    pub fn with_graph(mut self, graph: Arc<dyn TagGraph>) -> Self {
        self.graph = Some(graph);
        self
    }

    fn spawn_upsert(&self, tag: Tag, user_id: Uuid) {
        let Some(graph) = self.graph.clone() else {
            return;
        };
        tokio::spawn(async move {
            if let Err(e) = graph.upsert_tag(&tag, user_id).await {
                warn!(
                    subsystem = "api",
                    component = "tag_graph",
                    op = "upsert_tag",
                    tag_id = %tag.id,
                    error = %e,
                    "Tag graph update failed"
                );
            }
        });
    }

    fn spawn_delete(&self, tag_id: Uuid) {
        let Some(graph) = self.graph.clone() else {
            return;
        };
        tokio::spawn(async move {
            if let Err(e) = graph.delete_tag(tag_id).await {
                warn!(
                    subsystem = "api",
                    component = "tag_graph",
                    op = "delete_tag",
                    tag_id = %tag_id,
                    error = %e,
                    "Tag graph delete failed"
                );
            }
        });
    }

    /// Fetch a tag, failing unless the caller holds `required` on a note
    /// carrying it.
    async fn require_tag(&self, user_id: Uuid, tag_id: Uuid, required: AccessLevel) -> Result<Tag> {
        let tag = self.stores.tags.get(tag_id).await?;
        let note_ids = self.stores.tags.notes_for_tag(tag_id).await?;
        self.guard.require_any(&note_ids, user_id, required).await?;
        Ok(tag)
    }

    // ─── Note tags ─────────────────────────────────────────────────────────

    pub async fn tags_for_note(&self, user_id: Uuid, note_id: Uuid) -> Result<Vec<Tag>> {
        self.guard
            .require(note_id, user_id, NoteOperation::ListTags)
            .await?;
        self.stores.tags.tags_for_note(note_id).await
    }

    pub async fn create_and_link(&self, user_id: Uuid, note_id: Uuid, name: &str) -> Result<Tag> {
        self.guard
            .require(note_id, user_id, NoteOperation::ManageTags)
            .await?;
        let tag = self.stores.tags.create_and_link(name, note_id).await?;
        info!(
            subsystem = "api",
            component = "tags",
            op = "create_and_link",
            tag_id = %tag.id,
            note_id = %note_id,
            user_id = %user_id,
            "Tag linked to note"
        );
        self.spawn_upsert(tag.clone(), user_id);
        Ok(tag)
    }

    pub async fn link_to_note(&self, user_id: Uuid, note_id: Uuid, tag_id: Uuid) -> Result<()> {
        self.guard
            .require(note_id, user_id, NoteOperation::ManageTags)
            .await?;
        self.stores.tags.link_to_note(tag_id, note_id).await
    }

    /// Returns whether the tag was deleted with its last link.
    pub async fn unlink_from_note(&self, user_id: Uuid, note_id: Uuid, tag_id: Uuid) -> Result<bool> {
        self.guard
            .require(note_id, user_id, NoteOperation::ManageTags)
            .await?;
        let deleted = self.stores.tags.unlink_from_note(tag_id, note_id).await?;
        if deleted {
            self.spawn_delete(tag_id);
        }
        Ok(deleted)
    }

    pub async fn rename_for_note(
        &self,
        user_id: Uuid,
        note_id: Uuid,
        tag_id: Uuid,
        new_name: &str,
    ) -> Result<Tag> {
        self.guard
            .require(note_id, user_id, NoteOperation::ManageTags)
            .await?;
        let (tag, old_deleted) = self
            .stores
            .tags
            .rename_for_note(tag_id, note_id, new_name)
            .await?;
        if tag.id != tag_id {
            self.spawn_upsert(tag.clone(), user_id);
        }
        if old_deleted {
            self.spawn_delete(tag_id);
        }
        Ok(tag)
    }

    // ─── Tags ──────────────────────────────────────────────────────────────

    pub async fn get(&self, user_id: Uuid, tag_id: Uuid) -> Result<Tag> {
        self.require_tag(user_id, tag_id, AccessLevel::Read).await
    }

    /// Rename a tag everywhere, merging into an existing tag of the same
    /// name.
    pub async fn update_tag(&self, user_id: Uuid, tag_id: Uuid, new_name: &str) -> Result<Tag> {
        self.require_tag(user_id, tag_id, AccessLevel::Modify).await?;
        let tag = self.stores.tags.update_tag(tag_id, new_name).await?;
        info!(
            subsystem = "api",
            component = "tags",
            op = "update_tag",
            tag_id = %tag_id,
            surviving_tag_id = %tag.id,
            user_id = %user_id,
            "Tag updated"
        );
        self.spawn_upsert(tag.clone(), user_id);
        if tag.id != tag_id {
            self.spawn_delete(tag_id);
        }
        Ok(tag)
    }

    pub async fn delete_tag(&self, user_id: Uuid, tag_id: Uuid) -> Result<()> {
        self.require_tag(user_id, tag_id, AccessLevel::Modify).await?;
        self.stores.tags.delete_tag(tag_id).await?;
        info!(
            subsystem = "api",
            component = "tags",
            op = "delete_tag",
            tag_id = %tag_id,
            user_id = %user_id,
            "Tag deleted"
        );
        self.spawn_delete(tag_id);
        Ok(())
    }

    pub async fn link_tags(
        &self,
        user_id: Uuid,
        tag1_id: Uuid,
        tag2_id: Uuid,
        label: Option<&str>,
    ) -> Result<()> {
        self.require_tag(user_id, tag1_id, AccessLevel::Modify).await?;
        self.require_tag(user_id, tag2_id, AccessLevel::Modify).await?;
        self.stores.tags.link_tags(tag1_id, tag2_id, label).await
    }

    pub async fn unlink_tags(&self, user_id: Uuid, tag1_id: Uuid, tag2_id: Uuid) -> Result<()> {
        self.require_tag(user_id, tag1_id, AccessLevel::Modify).await?;
        self.require_tag(user_id, tag2_id, AccessLevel::Modify).await?;
        self.stores.tags.unlink_tags(tag1_id, tag2_id).await
    }

    pub async fn linked_tags(&self, user_id: Uuid, tag_id: Uuid) -> Result<Vec<LinkedTag>> {
        self.require_tag(user_id, tag_id, AccessLevel::Read).await?;
        self.stores.tags.linked_tags(tag_id).await
    }

    /// Notes carrying the tag, limited to the ones the caller can read.
    pub async fn notes_for_tag(&self, user_id: Uuid, tag_id: Uuid) -> Result<Vec<Uuid>> {
        let linked = self.stores.tags.notes_for_tag(tag_id).await?;
        let readable = self.guard.readable(&linked, user_id).await?;
        let notes: Vec<Uuid> = linked
            .into_iter()
            .filter(|id| readable.contains_key(id))
            .collect();
        if notes.is_empty() {
            return Err(Error::Forbidden(
                "'read' access to a note carrying this tag is required".to_string(),
            ));
        }
        Ok(notes)
    }

    // ─── Advisory ──────────────────────────────────────────────────────────

    /// Ask the language model for tags describing `text`.
    ///
    /// `count` of zero means the configured default.
    pub async fn suggest_tags(&self, user_id: Uuid, text: &str, count: usize) -> Result<Vec<String>> {
        let suggester = self
            .suggester
            .as_ref()
            .ok_or_else(|| Error::Config("Tag suggestion is not configured".to_string()))?;
        if text.trim().is_empty() {
            return Err(Error::InvalidInput("Text cannot be empty".to_string()));
        }
        let tags = suggester
            .suggest_tags(text, count.min(SUGGESTED_TAG_COUNT_MAX))
            .await?;
        debug!(
            subsystem = "api",
            component = "tags",
            op = "suggest_tags",
            user_id = %user_id,
            result_count = tags.len(),
            "Tags suggested"
        );
        Ok(tags)
    }

    /// Tags semantically close to `tag_id` among the caller's own tags.
    ///
    /// Ids the store no longer knows are skipped.
    pub async fn closest_tags(&self, user_id: Uuid, tag_id: Uuid, limit: Option<usize>) -> Result<Vec<Tag>> {
        let graph = self
            .graph
            .as_ref()
            .ok_or_else(|| Error::Config("Tag similarity is not configured".to_string()))?;
        let tag = self.require_tag(user_id, tag_id, AccessLevel::Read).await?;
        let limit = limit.unwrap_or(CLOSEST_TAGS_LIMIT);

        let mut closest = Vec::new();
        for id in graph.closest_tags(&tag, user_id, limit).await? {
            match self.stores.tags.get(id).await {
                Ok(found) => closest.push(found),
                Err(Error::TagNotFound(_)) => {
                    debug!(
                        subsystem = "api",
                        component = "tags",
                        op = "closest_tags",
                        tag_id = %id,
                        "Skipping stale tag graph point"
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Ok(closest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FixedSuggester, MemoryStore, RecordingTagGraph};
    use archipelago_core::{CreateNoteRequest, Note};

    struct Fixture {
        stores: Stores,
        graph: Arc<RecordingTagGraph>,
        service: TagService,
        owner: Uuid,
        note: Note,
    }

    async fn fixture(default_access: AccessLevel) -> Fixture {
        fixture_with_closest(default_access, Vec::new()).await
    }

    async fn fixture_with_closest(default_access: AccessLevel, closest: Vec<Uuid>) -> Fixture {
        let stores = MemoryStore::new().into_stores();
        let dir = stores.dirs.create("root", None).await.unwrap();
        let owner = Uuid::new_v4();
        let note = stores
            .notes
            .create(CreateNoteRequest {
                dir_id: dir.id,
                title: "recipes".to_string(),
                automerge_url: "automerge:r".to_string(),
                creator_id: owner,
                default_access: Some(default_access),
            })
            .await
            .unwrap();
        let graph = Arc::new(RecordingTagGraph::with_closest(closest));
        let service = TagService::new(stores.clone())
            .with_graph(graph.clone())
            .with_suggester(Arc::new(FixedSuggester(vec![
                "citrus".to_string(),
                "fruit".to_string(),
            ])));
        Fixture {
            stores,
            graph,
            service,
            owner,
            note,
        }
    }

    /// Let detached graph updates run.
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_create_and_link_normalizes_and_upserts() {
        let f = fixture(AccessLevel::None).await;
        let tag = f
            .service
            .create_and_link(f.owner, f.note.id, " 🍋 LeMOn 🍋 ")
            .await
            .unwrap();
        assert_eq!(tag.name, "lemon");

        settle().await;
        assert_eq!(f.graph.upserted(), vec![(tag.id, f.owner)]);
        let tags = f.service.tags_for_note(f.owner, f.note.id).await.unwrap();
        assert_eq!(tags, vec![tag]);
    }

    #[tokio::test]
    async fn test_reader_cannot_tag() {
        let f = fixture(AccessLevel::Read).await;
        let reader = Uuid::new_v4();

        let err = f
            .service
            .create_and_link(reader, f.note.id, "lemon")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
        assert!(f.service.tags_for_note(reader, f.note.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_unlink_last_link_deletes_from_graph() {
        let f = fixture(AccessLevel::None).await;
        let tag = f
            .service
            .create_and_link(f.owner, f.note.id, "lemon")
            .await
            .unwrap();

        assert!(f
            .service
            .unlink_from_note(f.owner, f.note.id, tag.id)
            .await
            .unwrap());
        settle().await;
        assert_eq!(f.graph.deleted(), vec![tag.id]);
    }

    #[tokio::test]
    async fn test_rename_for_note_drops_orphan_from_graph() {
        let f = fixture(AccessLevel::None).await;
        let old = f
            .service
            .create_and_link(f.owner, f.note.id, "lemon")
            .await
            .unwrap();

        let renamed = f
            .service
            .rename_for_note(f.owner, f.note.id, old.id, "Lime")
            .await
            .unwrap();
        assert_eq!(renamed.name, "lime");

        settle().await;
        assert!(f.graph.upserted().contains(&(renamed.id, f.owner)));
        assert_eq!(f.graph.deleted(), vec![old.id]);
    }

    #[tokio::test]
    async fn test_tag_level_access_follows_linked_notes() {
        let f = fixture(AccessLevel::Read).await;
        let tag = f
            .service
            .create_and_link(f.owner, f.note.id, "lemon")
            .await
            .unwrap();
        let reader = Uuid::new_v4();

        assert_eq!(f.service.get(reader, tag.id).await.unwrap(), tag);
        assert_eq!(
            f.service.notes_for_tag(reader, tag.id).await.unwrap(),
            vec![f.note.id]
        );
        let err = f
            .service
            .update_tag(reader, tag.id, "lime")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        f.stores
            .notes
            .set_user_access(f.note.id, reader, AccessLevel::None)
            .await
            .unwrap();
        let err = f.service.get(reader, tag.id).await.unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_update_tag_merge_removes_old_point() {
        let f = fixture(AccessLevel::None).await;
        let lemon = f
            .service
            .create_and_link(f.owner, f.note.id, "lemon")
            .await
            .unwrap();
        let citrus = f
            .service
            .create_and_link(f.owner, f.note.id, "citrus")
            .await
            .unwrap();

        let survivor = f
            .service
            .update_tag(f.owner, lemon.id, "Citrus")
            .await
            .unwrap();
        assert_eq!(survivor.id, citrus.id);

        settle().await;
        assert_eq!(f.graph.deleted(), vec![lemon.id]);
        let err = f.service.get(f.owner, lemon.id).await.unwrap_err();
        assert!(matches!(err, Error::TagNotFound(_)));
    }

    #[tokio::test]
    async fn test_link_tags_round_trip() {
        let f = fixture(AccessLevel::None).await;
        let a = f
            .service
            .create_and_link(f.owner, f.note.id, "lemon")
            .await
            .unwrap();
        let b = f
            .service
            .create_and_link(f.owner, f.note.id, "citrus")
            .await
            .unwrap();

        f.service
            .link_tags(f.owner, a.id, b.id, Some(" kind of "))
            .await
            .unwrap();
        let linked = f.service.linked_tags(f.owner, b.id).await.unwrap();
        assert_eq!(linked.len(), 1);
        assert_eq!(linked[0].tag, a);
        assert_eq!(linked[0].label.as_deref(), Some("kind of"));

        let err = f
            .service
            .link_tags(f.owner, b.id, a.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TagsAlreadyLinked { .. }));

        f.service.unlink_tags(f.owner, b.id, a.id).await.unwrap();
        assert!(f.service.linked_tags(f.owner, a.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_tag() {
        let f = fixture(AccessLevel::None).await;
        let tag = f
            .service
            .create_and_link(f.owner, f.note.id, "lemon")
            .await
            .unwrap();

        f.service.delete_tag(f.owner, tag.id).await.unwrap();
        settle().await;
        assert_eq!(f.graph.deleted(), vec![tag.id]);
        assert!(f
            .service
            .tags_for_note(f.owner, f.note.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_suggest_tags() {
        let f = fixture(AccessLevel::None).await;
        let tags = f.service.suggest_tags(f.owner, "Лимонный пирог", 1).await.unwrap();
        assert_eq!(tags, vec!["citrus".to_string()]);

        let err = f.service.suggest_tags(f.owner, "  ", 1).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_advisory_services_not_configured() {
        let f = fixture(AccessLevel::None).await;
        let bare = TagService::new(f.stores.clone());

        let err = bare.suggest_tags(f.owner, "text", 1).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        let err = bare
            .closest_tags(f.owner, Uuid::new_v4(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_shared_tag_is_indexed_for_each_user() {
        let f = fixture(AccessLevel::None).await;
        let other = Uuid::new_v4();
        let other_note = f
            .stores
            .notes
            .create(CreateNoteRequest {
                dir_id: f.note.dir_id,
                title: "drinks".to_string(),
                automerge_url: "automerge:d".to_string(),
                creator_id: other,
                default_access: Some(AccessLevel::None),
            })
            .await
            .unwrap();

        let mine = f
            .service
            .create_and_link(f.owner, f.note.id, "lemon")
            .await
            .unwrap();
        let theirs = f
            .service
            .create_and_link(other, other_note.id, "Lemon")
            .await
            .unwrap();
        assert_eq!(mine.id, theirs.id);

        settle().await;
        assert_eq!(
            f.graph.upserted(),
            vec![(mine.id, f.owner), (mine.id, other)]
        );
        assert!(f.graph.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_closest_tags_skips_stale_points() {
        let stale = Uuid::new_v4();
        let f = fixture_with_closest(AccessLevel::None, Vec::new()).await;
        let lemon = f
            .service
            .create_and_link(f.owner, f.note.id, "lemon")
            .await
            .unwrap();
        let lime = f
            .service
            .create_and_link(f.owner, f.note.id, "lime")
            .await
            .unwrap();

        let graph = Arc::new(RecordingTagGraph::with_closest(vec![stale, lime.id]));
        let service = TagService::new(f.stores.clone()).with_graph(graph);

        let closest = service.closest_tags(f.owner, lemon.id, Some(2)).await.unwrap();
        assert_eq!(closest, vec![lime]);
    }
}
