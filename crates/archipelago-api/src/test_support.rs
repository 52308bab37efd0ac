//! In-memory stand-ins for the stores and advisory services.
//!
//! [`MemoryStore`] implements all four repository traits over one mutex-held
//! state, following the same rules as the PostgreSQL repositories: tag
//! names are normalized, orphaned tags are collected, tag-to-tag links are
//! unordered and directory moves rewrite the whole subtree. Service and
//! router tests run against it without a database.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use archipelago_core::{
    new_v7, normalize_and_validate, normalize_tag_name, AccessLevel, AccessSnapshot, AccessibleNote,
    CreateNoteRequest, Directory, DirectoryRepository, Error, IdentityResolver, LinkedTag,
    MaterializedPath, Note, NoteAccessGrant, NoteRepository, Result, SaveSummaryRequest, Summary,
    SummaryRepository, Tag, TagGraph, TagRepository, TagSuggester, UpdateNoteRequest,
};

use crate::services::Stores;

#[derive(Default)]
struct Inner {
    next_dir_id: i64,
    dirs: BTreeMap<i64, Directory>,
    notes: BTreeMap<Uuid, Note>,
    grants: BTreeMap<(Uuid, Uuid), AccessLevel>,
    tags: HashMap<Uuid, Tag>,
    /// (tag_id, note_id)
    note_tags: BTreeSet<(Uuid, Uuid)>,
    /// Canonical (smaller, larger) pairs.
    tag_links: BTreeMap<(Uuid, Uuid), Option<String>>,
    summaries: HashMap<Uuid, Summary>,
    /// (summary_id, note_id)
    summary_notes: BTreeSet<(Uuid, Uuid)>,
}

fn canonical(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl Inner {
    fn dir(&self, id: i64) -> Result<&Directory> {
        self.dirs.get(&id).ok_or(Error::DirectoryNotFound(id))
    }

    fn note(&self, id: Uuid) -> Result<&Note> {
        self.notes.get(&id).ok_or(Error::NoteNotFound(id))
    }

    fn tag(&self, id: Uuid) -> Result<&Tag> {
        self.tags.get(&id).ok_or(Error::TagNotFound(id))
    }

    fn snapshot(&self, note: &Note, user_id: Uuid) -> AccessSnapshot {
        AccessSnapshot {
            note_id: note.id,
            creator_id: note.creator_id,
            default_access: note.default_access,
            override_access: self.grants.get(&(note.id, user_id)).copied(),
        }
    }

    fn tag_by_name(&self, name: &str) -> Option<Tag> {
        self.tags.values().find(|t| t.name == name).cloned()
    }

    fn get_or_create_tag(&mut self, name: &str) -> Tag {
        if let Some(tag) = self.tag_by_name(name) {
            return tag;
        }
        let tag = Tag {
            id: new_v7(),
            name: name.to_string(),
        };
        self.tags.insert(tag.id, tag.clone());
        tag
    }

    fn remove_tag(&mut self, id: Uuid) {
        self.tags.remove(&id);
        self.note_tags.retain(|(tag_id, _)| *tag_id != id);
        self.tag_links.retain(|(a, b), _| *a != id && *b != id);
    }

    fn collect_if_orphan(&mut self, id: Uuid) -> bool {
        if self.note_tags.iter().any(|(tag_id, _)| *tag_id == id) {
            return false;
        }
        self.remove_tag(id);
        true
    }

    fn merge_tag(&mut self, from: Uuid, into: Uuid) {
        let notes: Vec<Uuid> = self
            .note_tags
            .iter()
            .filter(|(tag_id, _)| *tag_id == from)
            .map(|(_, note_id)| *note_id)
            .collect();
        for note_id in notes {
            self.note_tags.insert((into, note_id));
        }

        let links: Vec<(Uuid, Option<String>)> = self
            .tag_links
            .iter()
            .filter(|((a, b), _)| *a == from || *b == from)
            .map(|((a, b), label)| (if *a == from { *b } else { *a }, label.clone()))
            .collect();
        for (other, label) in links {
            if other != into {
                self.tag_links.entry(canonical(into, other)).or_insert(label);
            }
        }

        self.remove_tag(from);
    }
}

/// All four repositories over one in-memory state.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Share one store behind every repository trait.
    pub fn into_stores(self) -> Stores {
        let store = Arc::new(self);
        Stores {
            dirs: store.clone(),
            notes: store.clone(),
            tags: store.clone(),
            summaries: store,
        }
    }
}

#[async_trait]
impl DirectoryRepository for MemoryStore {
    async fn get(&self, id: i64) -> Result<Directory> {
        self.lock().dir(id).cloned()
    }

    async fn subtree(&self, root_id: i64) -> Result<Vec<Directory>> {
        let inner = self.lock();
        inner.dir(root_id)?;
        let mut dirs: Vec<Directory> = inner
            .dirs
            .values()
            .filter(|d| d.id == root_id || d.path.contains(root_id))
            .cloned()
            .collect();
        dirs.sort_by_key(|d| (d.path.depth(), d.id));
        Ok(dirs)
    }

    async fn list_roots(&self) -> Result<Vec<Directory>> {
        Ok(self
            .lock()
            .dirs
            .values()
            .filter(|d| d.is_root())
            .cloned()
            .collect())
    }

    async fn create(&self, name: &str, parent_id: Option<i64>) -> Result<Directory> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput(
                "Directory name cannot be empty".to_string(),
            ));
        }
        let mut inner = self.lock();
        let path = match parent_id {
            Some(parent) => inner.dir(parent)?.full_path(),
            None => MaterializedPath::root(),
        };
        inner.next_dir_id += 1;
        let dir = Directory {
            id: inner.next_dir_id,
            name: name.to_string(),
            path,
        };
        inner.dirs.insert(dir.id, dir.clone());
        Ok(dir)
    }

    async fn rename(&self, id: i64, name: &str) -> Result<Directory> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput(
                "Directory name cannot be empty".to_string(),
            ));
        }
        let mut inner = self.lock();
        let dir = inner
            .dirs
            .get_mut(&id)
            .ok_or(Error::DirectoryNotFound(id))?;
        dir.name = name.to_string();
        Ok(dir.clone())
    }

    async fn move_to(&self, id: i64, new_parent_id: Option<i64>) -> Result<Directory> {
        let mut inner = self.lock();
        let moved = inner.dir(id)?.clone();
        let new_path = match new_parent_id {
            Some(parent) if parent == id => {
                return Err(Error::InvalidInput(
                    "A directory cannot be moved into itself".to_string(),
                ))
            }
            Some(parent) => {
                let parent = inner.dir(parent)?;
                if parent.path.contains(id) {
                    return Err(Error::InvalidInput(
                        "A directory cannot be moved into its own subtree".to_string(),
                    ));
                }
                parent.full_path()
            }
            None => MaterializedPath::root(),
        };

        let old_depth = moved.path.depth();
        for dir in inner.dirs.values_mut() {
            if dir.id == id {
                dir.path = new_path.clone();
            } else if dir.path.contains(id) {
                let mut chain = new_path.ancestors().to_vec();
                chain.extend_from_slice(&dir.path.ancestors()[old_depth..]);
                dir.path = MaterializedPath::from_ancestors(chain);
            }
        }
        inner.dir(id).cloned()
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let mut inner = self.lock();
        inner.dir(id)?;
        let has_children = inner.dirs.values().any(|d| d.parent_id() == Some(id));
        let has_notes = inner.notes.values().any(|n| n.dir_id == id);
        if has_children || has_notes {
            return Err(Error::Conflict(format!(
                "Directory {} is not empty",
                id
            )));
        }
        inner.dirs.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl NoteRepository for MemoryStore {
    async fn get(&self, id: Uuid) -> Result<Note> {
        self.lock().note(id).cloned()
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<AccessibleNote>> {
        let inner = self.lock();
        let mut notes: Vec<AccessibleNote> = inner
            .notes
            .values()
            .filter_map(|note| {
                let access = inner.snapshot(note, user_id).resolve(user_id);
                access.satisfies(AccessLevel::Read).then(|| AccessibleNote {
                    note: note.clone(),
                    access,
                })
            })
            .collect();
        notes.sort_by(|a, b| (&a.note.title, a.note.id).cmp(&(&b.note.title, b.note.id)));
        Ok(notes)
    }

    async fn list_by_dir_ids(&self, dir_ids: &[i64]) -> Result<Vec<Note>> {
        Ok(self
            .lock()
            .notes
            .values()
            .filter(|n| dir_ids.contains(&n.dir_id))
            .cloned()
            .collect())
    }

    async fn create(&self, req: CreateNoteRequest) -> Result<Note> {
        let default_access = req.default_access.unwrap_or(AccessLevel::None);
        if !default_access.is_valid_default() {
            return Err(Error::InvalidInput(format!(
                "Default access cannot exceed write, got '{}'",
                default_access
            )));
        }
        let mut inner = self.lock();
        inner.dir(req.dir_id)?;
        let note = Note {
            id: new_v7(),
            dir_id: req.dir_id,
            title: req.title,
            automerge_url: req.automerge_url,
            creator_id: req.creator_id,
            default_access,
        };
        inner.notes.insert(note.id, note.clone());
        Ok(note)
    }

    async fn update(&self, id: Uuid, req: UpdateNoteRequest) -> Result<Note> {
        if let Some(level) = req.default_access {
            if !level.is_valid_default() {
                return Err(Error::InvalidInput(format!(
                    "Default access cannot exceed write, got '{}'",
                    level
                )));
            }
        }
        let mut inner = self.lock();
        if let Some(dir_id) = req.dir_id {
            inner.dir(dir_id)?;
        }
        let note = inner.notes.get_mut(&id).ok_or(Error::NoteNotFound(id))?;
        if let Some(title) = req.title {
            note.title = title;
        }
        if let Some(dir_id) = req.dir_id {
            note.dir_id = dir_id;
        }
        if let Some(url) = req.automerge_url {
            note.automerge_url = url;
        }
        if let Some(level) = req.default_access {
            note.default_access = level;
        }
        Ok(note.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let mut inner = self.lock();
        inner.notes.remove(&id).ok_or(Error::NoteNotFound(id))?;
        inner.grants.retain(|(note_id, _), _| *note_id != id);
        inner.summary_notes.retain(|(_, note_id)| *note_id != id);
        let tags: Vec<Uuid> = inner
            .note_tags
            .iter()
            .filter(|(_, note_id)| *note_id == id)
            .map(|(tag_id, _)| *tag_id)
            .collect();
        inner.note_tags.retain(|(_, note_id)| *note_id != id);
        for tag_id in tags {
            inner.collect_if_orphan(tag_id);
        }
        Ok(())
    }

    async fn access_snapshot(&self, note_id: Uuid, user_id: Uuid) -> Result<AccessSnapshot> {
        let inner = self.lock();
        let note = inner.note(note_id)?;
        Ok(inner.snapshot(note, user_id))
    }

    async fn access_snapshots(
        &self,
        note_ids: &[Uuid],
        user_id: Uuid,
    ) -> Result<Vec<AccessSnapshot>> {
        let inner = self.lock();
        Ok(note_ids
            .iter()
            .filter_map(|id| inner.notes.get(id))
            .map(|note| inner.snapshot(note, user_id))
            .collect())
    }

    async fn set_user_access(
        &self,
        note_id: Uuid,
        user_id: Uuid,
        access: AccessLevel,
    ) -> Result<()> {
        let mut inner = self.lock();
        inner.note(note_id)?;
        inner.grants.insert((note_id, user_id), access);
        Ok(())
    }

    async fn remove_user_access(&self, note_id: Uuid, user_id: Uuid) -> Result<bool> {
        Ok(self.lock().grants.remove(&(note_id, user_id)).is_some())
    }

    async fn list_access(&self, note_id: Uuid) -> Result<Vec<NoteAccessGrant>> {
        Ok(self
            .lock()
            .grants
            .iter()
            .filter(|((id, _), _)| *id == note_id)
            .map(|((note_id, user_id), access)| NoteAccessGrant {
                note_id: *note_id,
                user_id: *user_id,
                access: *access,
            })
            .collect())
    }
}

#[async_trait]
impl TagRepository for MemoryStore {
    async fn get(&self, id: Uuid) -> Result<Tag> {
        self.lock().tag(id).cloned()
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Tag>> {
        Ok(self.lock().tag_by_name(&normalize_tag_name(name)))
    }

    async fn create_and_link(&self, name: &str, note_id: Uuid) -> Result<Tag> {
        let name = normalize_and_validate(name)?;
        let mut inner = self.lock();
        inner.note(note_id)?;
        let tag = inner.get_or_create_tag(&name);
        inner.note_tags.insert((tag.id, note_id));
        Ok(tag)
    }

    async fn link_to_note(&self, tag_id: Uuid, note_id: Uuid) -> Result<()> {
        let mut inner = self.lock();
        inner.tag(tag_id)?;
        inner.note(note_id)?;
        inner.note_tags.insert((tag_id, note_id));
        Ok(())
    }

    async fn unlink_from_note(&self, tag_id: Uuid, note_id: Uuid) -> Result<bool> {
        let mut inner = self.lock();
        inner.tag(tag_id)?;
        if !inner.note_tags.remove(&(tag_id, note_id)) {
            return Err(Error::TagLinkNotFound { tag_id, note_id });
        }
        Ok(inner.collect_if_orphan(tag_id))
    }

    async fn update_tag(&self, id: Uuid, new_name: &str) -> Result<Tag> {
        let name = normalize_and_validate(new_name)?;
        let mut inner = self.lock();
        let tag = inner.tag(id)?.clone();
        if tag.name == name {
            return Ok(tag);
        }
        match inner.tag_by_name(&name) {
            Some(existing) => {
                inner.merge_tag(id, existing.id);
                Ok(existing)
            }
            None => {
                let renamed = Tag { id, name };
                inner.tags.insert(id, renamed.clone());
                Ok(renamed)
            }
        }
    }

    async fn rename_for_note(
        &self,
        tag_id: Uuid,
        note_id: Uuid,
        new_name: &str,
    ) -> Result<(Tag, bool)> {
        let name = normalize_and_validate(new_name)?;
        let mut inner = self.lock();
        let old = inner.tag(tag_id)?.clone();
        if !inner.note_tags.contains(&(tag_id, note_id)) {
            return Err(Error::TagLinkNotFound { tag_id, note_id });
        }
        if old.name == name {
            return Ok((old, false));
        }
        let target = inner.get_or_create_tag(&name);
        inner.note_tags.remove(&(tag_id, note_id));
        inner.note_tags.insert((target.id, note_id));
        let old_deleted = inner.collect_if_orphan(tag_id);
        Ok((target, old_deleted))
    }

    async fn link_tags(&self, tag1_id: Uuid, tag2_id: Uuid, label: Option<&str>) -> Result<()> {
        if tag1_id == tag2_id {
            return Err(Error::InvalidInput(
                "A tag cannot be linked to itself".to_string(),
            ));
        }
        let mut inner = self.lock();
        inner.tag(tag1_id)?;
        inner.tag(tag2_id)?;
        let key = canonical(tag1_id, tag2_id);
        if inner.tag_links.contains_key(&key) {
            return Err(Error::TagsAlreadyLinked { tag1_id, tag2_id });
        }
        let label = label
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string);
        inner.tag_links.insert(key, label);
        Ok(())
    }

    async fn unlink_tags(&self, tag1_id: Uuid, tag2_id: Uuid) -> Result<()> {
        let mut inner = self.lock();
        if inner.tag_links.remove(&canonical(tag1_id, tag2_id)).is_none() {
            return Err(Error::TagsLinkNotFound { tag1_id, tag2_id });
        }
        Ok(())
    }

    async fn linked_tags(&self, id: Uuid) -> Result<Vec<LinkedTag>> {
        let inner = self.lock();
        inner.tag(id)?;
        let mut linked: Vec<LinkedTag> = inner
            .tag_links
            .iter()
            .filter(|((a, b), _)| *a == id || *b == id)
            .filter_map(|((a, b), label)| {
                let other = if *a == id { *b } else { *a };
                inner.tags.get(&other).map(|tag| LinkedTag {
                    tag: tag.clone(),
                    label: label.clone(),
                })
            })
            .collect();
        linked.sort_by(|x, y| x.tag.name.cmp(&y.tag.name));
        Ok(linked)
    }

    async fn tags_for_note(&self, note_id: Uuid) -> Result<Vec<Tag>> {
        let inner = self.lock();
        let mut tags: Vec<Tag> = inner
            .note_tags
            .iter()
            .filter(|(_, id)| *id == note_id)
            .filter_map(|(tag_id, _)| inner.tags.get(tag_id).cloned())
            .collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }

    async fn notes_for_tag(&self, tag_id: Uuid) -> Result<Vec<Uuid>> {
        let inner = self.lock();
        inner.tag(tag_id)?;
        Ok(inner
            .note_tags
            .iter()
            .filter(|(id, _)| *id == tag_id)
            .map(|(_, note_id)| *note_id)
            .collect())
    }

    async fn delete_tag(&self, id: Uuid) -> Result<()> {
        let mut inner = self.lock();
        inner.tag(id)?;
        inner.remove_tag(id);
        Ok(())
    }
}

#[async_trait]
impl SummaryRepository for MemoryStore {
    async fn save_text(&self, req: SaveSummaryRequest) -> Result<Summary> {
        let mut inner = self.lock();
        let summary = inner
            .summaries
            .entry(req.id)
            .and_modify(|s| {
                s.text = req.text.clone();
                s.text_with_role.clear();
                s.role.clear();
            })
            .or_insert_with(|| Summary {
                id: req.id,
                name: String::new(),
                text: req.text.clone(),
                text_with_role: String::new(),
                role: String::new(),
                active: req.active,
                platform: req.platform.clone(),
                started_at: Utc::now(),
                detalization: req.detalization,
            });
        Ok(summary.clone())
    }

    async fn update_text_role(&self, id: Uuid, text_with_role: &str, role: &str) -> Result<()> {
        let mut inner = self.lock();
        let summary = inner
            .summaries
            .get_mut(&id)
            .ok_or(Error::SummaryNotFound(id))?;
        summary.text_with_role = text_with_role.to_string();
        summary.role = role.to_string();
        Ok(())
    }

    async fn finish(&self, id: Uuid) -> Result<()> {
        let mut inner = self.lock();
        let summary = inner
            .summaries
            .get_mut(&id)
            .ok_or(Error::SummaryNotFound(id))?;
        summary.active = false;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Summary> {
        self.lock()
            .summaries
            .get(&id)
            .cloned()
            .ok_or(Error::SummaryNotFound(id))
    }

    async fn list_active(&self) -> Result<Vec<Summary>> {
        let mut active: Vec<Summary> = self
            .lock()
            .summaries
            .values()
            .filter(|s| s.active)
            .cloned()
            .collect();
        active.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(active)
    }

    async fn update_name(&self, id: Uuid, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput(
                "Summary name cannot be empty".to_string(),
            ));
        }
        let mut inner = self.lock();
        let summary = inner
            .summaries
            .get_mut(&id)
            .ok_or(Error::SummaryNotFound(id))?;
        summary.name = name.to_string();
        Ok(())
    }

    async fn attach_to_note(&self, summary_id: Uuid, note_id: Uuid) -> Result<()> {
        let mut inner = self.lock();
        if !inner.summaries.contains_key(&summary_id) {
            return Err(Error::SummaryNotFound(summary_id));
        }
        inner.note(note_id)?;
        inner.summary_notes.insert((summary_id, note_id));
        Ok(())
    }

    async fn list_for_note(&self, note_id: Uuid) -> Result<Vec<Summary>> {
        let inner = self.lock();
        let mut summaries: Vec<Summary> = inner
            .summary_notes
            .iter()
            .filter(|(_, id)| *id == note_id)
            .filter_map(|(summary_id, _)| inner.summaries.get(summary_id).cloned())
            .collect();
        summaries.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(summaries)
    }
}

/// Resolves sessions from a fixed table.
#[derive(Default)]
pub struct StaticIdentityResolver {
    sessions: HashMap<String, Uuid>,
}

impl StaticIdentityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(mut self, session_id: &str, user_id: Uuid) -> Self {
        self.sessions.insert(session_id.to_string(), user_id);
        self
    }
}

#[async_trait]
impl IdentityResolver for StaticIdentityResolver {
    async fn resolve(&self, session_id: &str) -> Result<Option<Uuid>> {
        Ok(self.sessions.get(session_id).copied())
    }
}

/// Suggester that answers with a fixed list.
pub struct FixedSuggester(pub Vec<String>);

#[async_trait]
impl TagSuggester for FixedSuggester {
    async fn suggest_tags(&self, text: &str, count: usize) -> Result<Vec<String>> {
        if text.trim().is_empty() {
            return Err(Error::InvalidInput("Text cannot be empty".to_string()));
        }
        Ok(self.0.iter().take(count).cloned().collect())
    }
}

/// Tag graph that records upserts and deletes and answers `closest_tags`
/// from a preset list.
#[derive(Default)]
pub struct RecordingTagGraph {
    pub upserted: Mutex<Vec<(Uuid, Uuid)>>,
    pub deleted: Mutex<Vec<Uuid>>,
    pub closest: Vec<Uuid>,
}

impl RecordingTagGraph {
    pub fn with_closest(closest: Vec<Uuid>) -> Self {
        Self {
            closest,
            ..Default::default()
        }
    }

    pub fn upserted(&self) -> Vec<(Uuid, Uuid)> {
        self.upserted
            .lock()
            .map(|v| v.clone())
            .unwrap_or_default()
    }

    pub fn deleted(&self) -> Vec<Uuid> {
        self.deleted.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TagGraph for RecordingTagGraph {
    async fn upsert_tag(&self, tag: &Tag, user_id: Uuid) -> Result<()> {
        if let Ok(mut upserted) = self.upserted.lock() {
            upserted.push((tag.id, user_id));
        }
        Ok(())
    }

    async fn closest_tags(&self, tag: &Tag, _user_id: Uuid, limit: usize) -> Result<Vec<Uuid>> {
        Ok(self
            .closest
            .iter()
            .copied()
            .filter(|id| *id != tag.id)
            .take(limit)
            .collect())
    }

    async fn delete_tag(&self, tag_id: Uuid) -> Result<()> {
        if let Ok(mut deleted) = self.deleted.lock() {
            deleted.push(tag_id);
        }
        Ok(())
    }
}
