//! Access checks shared by the services.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use archipelago_core::{
    authorize, AccessLevel, AccessSnapshot, Error, NoteOperation, NoteRepository, Result,
};

/// Resolves and enforces a caller's access to notes.
#[derive(Clone)]
pub struct NoteGuard {
    notes: Arc<dyn NoteRepository>,
}

impl NoteGuard {
    pub fn new(notes: Arc<dyn NoteRepository>) -> Self {
        Self { notes }
    }

    /// Effective level of `user_id` on the note. Missing note → `NoteNotFound`.
    pub async fn level(&self, note_id: Uuid, user_id: Uuid) -> Result<AccessLevel> {
        Ok(self.snapshot(note_id, user_id).await?.resolve(user_id))
    }

    pub async fn snapshot(&self, note_id: Uuid, user_id: Uuid) -> Result<AccessSnapshot> {
        self.notes.access_snapshot(note_id, user_id).await
    }

    /// Fail with `Forbidden` unless the caller may perform `operation`.
    ///
    /// Returns the snapshot the decision was made on.
    pub async fn require(
        &self,
        note_id: Uuid,
        user_id: Uuid,
        operation: NoteOperation,
    ) -> Result<AccessSnapshot> {
        let snapshot = self.snapshot(note_id, user_id).await?;
        let level = snapshot.resolve(user_id);
        authorize(level, operation)?;
        debug!(
            subsystem = "api",
            component = "access",
            op = operation.as_str(),
            note_id = %note_id,
            user_id = %user_id,
            access = level.as_str(),
            "Operation allowed"
        );
        Ok(snapshot)
    }

    /// The notes among `note_ids` the caller can read, with the caller's
    /// level on each.
    pub async fn readable(
        &self,
        note_ids: &[Uuid],
        user_id: Uuid,
    ) -> Result<HashMap<Uuid, AccessLevel>> {
        Ok(self
            .notes
            .access_snapshots(note_ids, user_id)
            .await?
            .into_iter()
            .map(|snapshot| (snapshot.note_id, snapshot.resolve(user_id)))
            .filter(|(_, level)| level.satisfies(AccessLevel::Read))
            .collect())
    }

    /// Fail with `Forbidden` unless the caller holds `required` on at least
    /// one of `note_ids`.
    ///
    /// Tags have no owner of their own; they are reachable through the notes
    /// that carry them.
    pub async fn require_any(
        &self,
        note_ids: &[Uuid],
        user_id: Uuid,
        required: AccessLevel,
    ) -> Result<()> {
        let readable = self.readable(note_ids, user_id).await?;
        let allowed = note_ids
            .iter()
            .any(|id| readable.get(id).is_some_and(|level| level.satisfies(required)));
        if allowed {
            Ok(())
        } else {
            debug!(
                subsystem = "api",
                component = "access",
                user_id = %user_id,
                required = required.as_str(),
                "No linked note grants the required access"
            );
            Err(Error::Forbidden(format!(
                "'{}' access to a note carrying this tag is required",
                required
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemoryStore;
    use archipelago_core::{CreateNoteRequest, DirectoryRepository};

    async fn setup() -> (Arc<MemoryStore>, NoteGuard, Uuid, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let dir = DirectoryRepository::create(store.as_ref(), "root", None)
            .await
            .unwrap();
        let creator = Uuid::new_v4();
        let note = NoteRepository::create(
            store.as_ref(),
            CreateNoteRequest {
                dir_id: dir.id,
                title: "plan".to_string(),
                automerge_url: "automerge:1".to_string(),
                creator_id: creator,
                default_access: Some(AccessLevel::Read),
            },
        )
        .await
        .unwrap();
        let guard = NoteGuard::new(store.clone());
        (store, guard, creator, note.id)
    }

    #[tokio::test]
    async fn test_reader_cannot_update() {
        let (_store, guard, _creator, note_id) = setup().await;
        let reader = Uuid::new_v4();

        assert!(guard.require(note_id, reader, NoteOperation::Get).await.is_ok());
        let err = guard
            .require(note_id, reader, NoteOperation::Update)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_creator_is_always_allowed() {
        let (store, guard, creator, note_id) = setup().await;
        store
            .set_user_access(note_id, creator, AccessLevel::None)
            .await
            .unwrap();

        for op in NoteOperation::ALL {
            assert!(guard.require(note_id, creator, op).await.is_ok(), "{}", op);
        }
    }

    #[tokio::test]
    async fn test_missing_note_is_not_found() {
        let (_store, guard, creator, _note_id) = setup().await;
        let err = guard.level(Uuid::new_v4(), creator).await.unwrap_err();
        assert!(matches!(err, Error::NoteNotFound(_)));
    }

    #[tokio::test]
    async fn test_readable_only_covers_requested_notes() {
        let (store, guard, creator, note_id) = setup().await;
        let dir_id = NoteRepository::get(store.as_ref(), note_id).await.unwrap().dir_id;
        let other = NoteRepository::create(
            store.as_ref(),
            CreateNoteRequest {
                dir_id,
                title: "other".to_string(),
                automerge_url: "automerge:2".to_string(),
                creator_id: creator,
                default_access: Some(AccessLevel::Write),
            },
        )
        .await
        .unwrap();
        let hidden = NoteRepository::create(
            store.as_ref(),
            CreateNoteRequest {
                dir_id,
                title: "hidden".to_string(),
                automerge_url: "automerge:3".to_string(),
                creator_id: creator,
                default_access: Some(AccessLevel::None),
            },
        )
        .await
        .unwrap();
        let user = Uuid::new_v4();

        let readable = guard.readable(&[note_id], user).await.unwrap();
        assert_eq!(readable.len(), 1);
        assert_eq!(readable.get(&note_id), Some(&AccessLevel::Read));

        let readable = guard
            .readable(&[note_id, other.id, hidden.id, Uuid::new_v4()], user)
            .await
            .unwrap();
        assert_eq!(readable.len(), 2);
        assert_eq!(readable.get(&other.id), Some(&AccessLevel::Write));
        assert!(!readable.contains_key(&hidden.id));

        assert!(guard.readable(&[], user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_require_any() {
        let (store, guard, _creator, note_id) = setup().await;
        let user = Uuid::new_v4();

        assert!(guard
            .require_any(&[note_id], user, AccessLevel::Read)
            .await
            .is_ok());
        assert!(guard
            .require_any(&[note_id], user, AccessLevel::Modify)
            .await
            .is_err());
        assert!(guard.require_any(&[], user, AccessLevel::Read).await.is_err());

        store
            .set_user_access(note_id, user, AccessLevel::Modify)
            .await
            .unwrap();
        assert!(guard
            .require_any(&[note_id], user, AccessLevel::Modify)
            .await
            .is_ok());
    }
}
