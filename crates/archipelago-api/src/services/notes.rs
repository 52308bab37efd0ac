//! Note lifecycle and sharing.

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use archipelago_core::{
    allowed_operations, AccessLevel, AccessibleNote, CreateNoteRequest, Error, Note,
    NoteAccessGrant, NoteOperation, Result, UpdateNoteRequest,
};

use super::{NoteGuard, Stores};

/// Body of a note creation; the creator is always the caller.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateNote {
    pub dir_id: i64,
    pub title: String,
    pub automerge_url: String,
    #[serde(default)]
    pub default_access: Option<AccessLevel>,
}

/// A note as seen by one caller.
#[derive(Debug, Clone, Serialize)]
pub struct NoteView {
    #[serde(flatten)]
    pub note: Note,
    pub access: AccessLevel,
    pub allowed_operations: Vec<NoteOperation>,
}

#[derive(Clone)]
pub struct NoteService {
    stores: Stores,
    guard: NoteGuard,
}

impl NoteService {
    pub fn new(stores: Stores) -> Self {
        let guard = NoteGuard::new(stores.notes.clone());
        Self { stores, guard }
    }

    pub fn guard(&self) -> &NoteGuard {
        &self.guard
    }

    pub async fn list(&self, user_id: Uuid) -> Result<Vec<AccessibleNote>> {
        self.stores.notes.list_for_user(user_id).await
    }

    pub async fn get(&self, user_id: Uuid, id: Uuid) -> Result<NoteView> {
        let snapshot = self.guard.require(id, user_id, NoteOperation::Get).await?;
        let note = self.stores.notes.get(id).await?;
        let access = snapshot.resolve(user_id);
        Ok(NoteView {
            note,
            access,
            allowed_operations: allowed_operations(access),
        })
    }

    pub async fn create(&self, user_id: Uuid, req: CreateNote) -> Result<Note> {
        if req.title.trim().is_empty() {
            return Err(Error::InvalidInput("Note title cannot be empty".to_string()));
        }
        let note = self
            .stores
            .notes
            .create(CreateNoteRequest {
                dir_id: req.dir_id,
                title: req.title.trim().to_string(),
                automerge_url: req.automerge_url,
                creator_id: user_id,
                default_access: req.default_access,
            })
            .await?;
        info!(
            subsystem = "api",
            component = "notes",
            op = "create",
            note_id = %note.id,
            dir_id = note.dir_id,
            user_id = %user_id,
            "Note created"
        );
        Ok(note)
    }

    /// Replacing only the content handle needs `write`; anything else needs
    /// `modify`.
    pub async fn update(&self, user_id: Uuid, id: Uuid, req: UpdateNoteRequest) -> Result<Note> {
        if req.is_empty() {
            return Err(Error::InvalidInput("Nothing to update".to_string()));
        }
        if req.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(Error::InvalidInput("Note title cannot be empty".to_string()));
        }
        let content_only =
            req.title.is_none() && req.dir_id.is_none() && req.default_access.is_none();
        let operation = if content_only {
            NoteOperation::EditContent
        } else {
            NoteOperation::Update
        };
        self.guard.require(id, user_id, operation).await?;

        let req = UpdateNoteRequest {
            title: req.title.map(|t| t.trim().to_string()),
            ..req
        };
        let note = self.stores.notes.update(id, req).await?;
        info!(
            subsystem = "api",
            component = "notes",
            op = operation.as_str(),
            note_id = %id,
            user_id = %user_id,
            "Note updated"
        );
        Ok(note)
    }

    pub async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<()> {
        self.guard.require(id, user_id, NoteOperation::Delete).await?;
        self.stores.notes.delete(id).await?;
        info!(
            subsystem = "api",
            component = "notes",
            op = "delete",
            note_id = %id,
            user_id = %user_id,
            "Note deleted"
        );
        Ok(())
    }

    /// Effective level of `target` on the note.
    ///
    /// Callers may always ask about themselves; asking about anyone else
    /// needs `manage`.
    pub async fn get_user_access(
        &self,
        caller: Uuid,
        note_id: Uuid,
        target: Uuid,
    ) -> Result<AccessLevel> {
        if caller == target {
            return self.guard.level(note_id, caller).await;
        }
        self.guard
            .require(note_id, caller, NoteOperation::SetAccess)
            .await?;
        self.guard.level(note_id, target).await
    }

    pub async fn set_user_access(
        &self,
        caller: Uuid,
        note_id: Uuid,
        target: Uuid,
        access: AccessLevel,
    ) -> Result<()> {
        let snapshot = self
            .guard
            .require(note_id, caller, NoteOperation::SetAccess)
            .await?;
        if target == snapshot.creator_id {
            return Err(Error::InvalidInput(
                "The creator's access cannot be changed".to_string(),
            ));
        }
        self.stores
            .notes
            .set_user_access(note_id, target, access)
            .await?;
        info!(
            subsystem = "api",
            component = "notes",
            op = "set_user_access",
            note_id = %note_id,
            user_id = %caller,
            target_user_id = %target,
            access = access.as_str(),
            "Access granted"
        );
        Ok(())
    }

    /// Drop an override so the note's default applies again.
    pub async fn remove_user_access(&self, caller: Uuid, note_id: Uuid, target: Uuid) -> Result<bool> {
        self.guard
            .require(note_id, caller, NoteOperation::SetAccess)
            .await?;
        self.stores.notes.remove_user_access(note_id, target).await
    }

    pub async fn list_access(&self, caller: Uuid, note_id: Uuid) -> Result<Vec<NoteAccessGrant>> {
        self.guard
            .require(note_id, caller, NoteOperation::SetAccess)
            .await?;
        self.stores.notes.list_access(note_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemoryStore;

    struct Fixture {
        service: NoteService,
        owner: Uuid,
        note: Note,
    }

    async fn fixture(default_access: AccessLevel) -> Fixture {
        let stores = MemoryStore::new().into_stores();
        let dir = stores.dirs.create("root", None).await.unwrap();
        let service = NoteService::new(stores);
        let owner = Uuid::new_v4();
        let note = service
            .create(
                owner,
                CreateNote {
                    dir_id: dir.id,
                    title: "  Roadmap ".to_string(),
                    automerge_url: "automerge:abc".to_string(),
                    default_access: Some(default_access),
                },
            )
            .await
            .unwrap();
        Fixture {
            service,
            owner,
            note,
        }
    }

    #[tokio::test]
    async fn test_create_trims_title_and_sets_creator() {
        let f = fixture(AccessLevel::None).await;
        assert_eq!(f.note.title, "Roadmap");
        assert_eq!(f.note.creator_id, f.owner);

        let view = f.service.get(f.owner, f.note.id).await.unwrap();
        assert_eq!(view.access, AccessLevel::Manage);
        assert_eq!(view.allowed_operations.len(), NoteOperation::ALL.len());
    }

    #[tokio::test]
    async fn test_private_note_is_forbidden_to_others() {
        let f = fixture(AccessLevel::None).await;
        let err = f.service.get(Uuid::new_v4(), f.note.id).await.unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_reader_cannot_update() {
        let f = fixture(AccessLevel::Read).await;
        let reader = Uuid::new_v4();
        let req = UpdateNoteRequest {
            title: Some("Hijacked".to_string()),
            ..Default::default()
        };

        let err = f.service.update(reader, f.note.id, req).await.unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
        let unchanged = f.service.get(f.owner, f.note.id).await.unwrap();
        assert_eq!(unchanged.note.title, "Roadmap");
    }

    #[tokio::test]
    async fn test_writer_may_only_replace_content() {
        let f = fixture(AccessLevel::Write).await;
        let writer = Uuid::new_v4();

        let content = UpdateNoteRequest {
            automerge_url: Some("automerge:def".to_string()),
            ..Default::default()
        };
        let note = f.service.update(writer, f.note.id, content).await.unwrap();
        assert_eq!(note.automerge_url, "automerge:def");

        let rename = UpdateNoteRequest {
            title: Some("Renamed".to_string()),
            ..Default::default()
        };
        let err = f.service.update(writer, f.note.id, rename).await.unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_empty_update_is_invalid() {
        let f = fixture(AccessLevel::None).await;
        let err = f
            .service
            .update(f.owner, f.note.id, UpdateNoteRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_sharing_requires_manage() {
        let f = fixture(AccessLevel::Read).await;
        let editor = Uuid::new_v4();
        let friend = Uuid::new_v4();

        f.service
            .set_user_access(f.owner, f.note.id, editor, AccessLevel::Modify)
            .await
            .unwrap();
        let err = f
            .service
            .set_user_access(editor, f.note.id, friend, AccessLevel::Write)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        f.service
            .set_user_access(f.owner, f.note.id, editor, AccessLevel::Manage)
            .await
            .unwrap();
        f.service
            .set_user_access(editor, f.note.id, friend, AccessLevel::Write)
            .await
            .unwrap();
        assert_eq!(
            f.service
                .get_user_access(f.owner, f.note.id, friend)
                .await
                .unwrap(),
            AccessLevel::Write
        );
        assert_eq!(f.service.list_access(f.owner, f.note.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_creator_access_cannot_be_changed() {
        let f = fixture(AccessLevel::None).await;
        let err = f
            .service
            .set_user_access(f.owner, f.note.id, f.owner, AccessLevel::Read)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_get_user_access_self_and_others() {
        let f = fixture(AccessLevel::Read).await;
        let user = Uuid::new_v4();

        assert_eq!(
            f.service.get_user_access(user, f.note.id, user).await.unwrap(),
            AccessLevel::Read
        );
        let err = f
            .service
            .get_user_access(user, f.note.id, f.owner)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
        assert_eq!(
            f.service
                .get_user_access(f.owner, f.note.id, user)
                .await
                .unwrap(),
            AccessLevel::Read
        );
    }

    #[tokio::test]
    async fn test_override_revokes_and_removal_restores() {
        let f = fixture(AccessLevel::Read).await;
        let user = Uuid::new_v4();

        f.service
            .set_user_access(f.owner, f.note.id, user, AccessLevel::None)
            .await
            .unwrap();
        assert!(f.service.list(user).await.unwrap().is_empty());

        assert!(f
            .service
            .remove_user_access(f.owner, f.note.id, user)
            .await
            .unwrap());
        assert_eq!(f.service.list(user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_needs_modify() {
        let f = fixture(AccessLevel::Write).await;
        let err = f
            .service
            .delete(Uuid::new_v4(), f.note.id)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        f.service.delete(f.owner, f.note.id).await.unwrap();
        let err = f.service.get(f.owner, f.note.id).await.unwrap_err();
        assert!(matches!(err, Error::NoteNotFound(_)));
    }
}
