//! Note persistence and per-user access overrides against PostgreSQL.

use archipelago_db::test_fixtures::{TestDataBuilder, TestDatabase};
use archipelago_db::{
    AccessLevel, CreateNoteRequest, DirectoryRepository, Error, NoteRepository, TagRepository,
    UpdateNoteRequest,
};
use uuid::Uuid;

#[tokio::test]
#[ignore] // Requires DATABASE_URL with a reachable PostgreSQL server
async fn test_snapshot_resolves_creator_override_and_default() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    let data = TestDataBuilder::new(db)
        .with_dir("root", None)
        .await
        .with_note("shared", AccessLevel::Read)
        .await
        .build();
    let note = &data.notes[0];
    let editor = Uuid::new_v4();
    let stranger = Uuid::new_v4();

    db.notes
        .set_user_access(note.id, editor, AccessLevel::Write)
        .await
        .unwrap();

    let creator_view = db.notes.access_snapshot(note.id, data.creator_id).await.unwrap();
    assert_eq!(creator_view.resolve(data.creator_id), AccessLevel::Manage);

    let editor_view = db.notes.access_snapshot(note.id, editor).await.unwrap();
    assert_eq!(editor_view.override_access, Some(AccessLevel::Write));
    assert_eq!(editor_view.resolve(editor), AccessLevel::Write);

    let stranger_view = db.notes.access_snapshot(note.id, stranger).await.unwrap();
    assert_eq!(stranger_view.override_access, None);
    assert_eq!(stranger_view.resolve(stranger), AccessLevel::Read);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with a reachable PostgreSQL server
async fn test_override_can_lower_below_default() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    let data = TestDataBuilder::new(db)
        .with_dir("root", None)
        .await
        .with_note("open", AccessLevel::Write)
        .await
        .build();
    let note = &data.notes[0];
    let muted = Uuid::new_v4();

    db.notes
        .set_user_access(note.id, muted, AccessLevel::None)
        .await
        .unwrap();
    let snapshot = db.notes.access_snapshot(note.id, muted).await.unwrap();
    assert_eq!(snapshot.resolve(muted), AccessLevel::None);

    assert!(db.notes.remove_user_access(note.id, muted).await.unwrap());
    assert!(!db.notes.remove_user_access(note.id, muted).await.unwrap());
    let snapshot = db.notes.access_snapshot(note.id, muted).await.unwrap();
    assert_eq!(snapshot.resolve(muted), AccessLevel::Write);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with a reachable PostgreSQL server
async fn test_list_for_user_skips_inaccessible_notes() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    let data = TestDataBuilder::new(db)
        .with_dir("root", None)
        .await
        .with_note("public", AccessLevel::Read)
        .await
        .with_note("private", AccessLevel::None)
        .await
        .with_note("invited", AccessLevel::None)
        .await
        .build();
    let reader = Uuid::new_v4();
    db.notes
        .set_user_access(data.notes[2].id, reader, AccessLevel::Modify)
        .await
        .unwrap();

    let mut visible = db.notes.list_for_user(reader).await.unwrap();
    visible.sort_by(|a, b| a.note.title.cmp(&b.note.title));
    let titles: Vec<&str> = visible.iter().map(|n| n.note.title.as_str()).collect();
    assert_eq!(titles, vec!["invited", "public"]);
    assert_eq!(visible[0].access, AccessLevel::Modify);
    assert_eq!(visible[1].access, AccessLevel::Read);

    let own = db.notes.list_for_user(data.creator_id).await.unwrap();
    assert_eq!(own.len(), 3);
    assert!(own.iter().all(|n| n.access == AccessLevel::Manage));

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with a reachable PostgreSQL server
async fn test_access_snapshots_cover_only_requested_notes() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    let data = TestDataBuilder::new(db)
        .with_dir("root", None)
        .await
        .with_note("public", AccessLevel::Read)
        .await
        .with_note("private", AccessLevel::None)
        .await
        .with_note("unrequested", AccessLevel::Write)
        .await
        .build();
    let reader = Uuid::new_v4();
    let (public, private) = (data.notes[0].id, data.notes[1].id);
    db.notes
        .set_user_access(private, reader, AccessLevel::Write)
        .await
        .unwrap();

    let mut snapshots = db
        .notes
        .access_snapshots(&[public, private, Uuid::new_v4()], reader)
        .await
        .unwrap();
    snapshots.sort_by_key(|s| if s.note_id == public { 0 } else { 1 });
    assert_eq!(snapshots.len(), 2);
    assert_eq!(snapshots[0].note_id, public);
    assert_eq!(snapshots[0].resolve(reader), AccessLevel::Read);
    assert_eq!(snapshots[1].note_id, private);
    assert_eq!(snapshots[1].override_access, Some(AccessLevel::Write));
    assert_eq!(snapshots[1].resolve(reader), AccessLevel::Write);

    assert!(db.notes.access_snapshots(&[], reader).await.unwrap().is_empty());

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with a reachable PostgreSQL server
async fn test_create_rejects_unknown_directory_and_bad_default() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    let dir = db.dirs.create("root", None).await.unwrap();

    let missing_dir = db
        .notes
        .create(CreateNoteRequest {
            dir_id: 987654,
            title: "lost".to_string(),
            automerge_url: "automerge:lost".to_string(),
            creator_id: Uuid::new_v4(),
            default_access: None,
        })
        .await;
    assert!(matches!(missing_dir, Err(Error::DirectoryNotFound(987654))));

    let bad_default = db
        .notes
        .create(CreateNoteRequest {
            dir_id: dir.id,
            title: "too open".to_string(),
            automerge_url: "automerge:open".to_string(),
            creator_id: Uuid::new_v4(),
            default_access: Some(AccessLevel::Modify),
        })
        .await;
    assert!(matches!(bad_default, Err(Error::InvalidInput(_))));

    let fallback = db
        .notes
        .create(CreateNoteRequest {
            dir_id: dir.id,
            title: "closed".to_string(),
            automerge_url: "automerge:closed".to_string(),
            creator_id: Uuid::new_v4(),
            default_access: None,
        })
        .await
        .unwrap();
    assert_eq!(fallback.default_access, AccessLevel::None);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with a reachable PostgreSQL server
async fn test_update_moves_note_and_keeps_untouched_fields() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    let data = TestDataBuilder::new(db)
        .with_dir("from", None)
        .await
        .with_note("draft", AccessLevel::Read)
        .await
        .build();
    let note = &data.notes[0];
    let target = db.dirs.create("to", None).await.unwrap();

    let updated = db
        .notes
        .update(
            note.id,
            UpdateNoteRequest {
                title: Some("final".to_string()),
                dir_id: Some(target.id),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.title, "final");
    assert_eq!(updated.dir_id, target.id);
    assert_eq!(updated.automerge_url, note.automerge_url);
    assert_eq!(updated.default_access, AccessLevel::Read);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with a reachable PostgreSQL server
async fn test_delete_removes_grants_and_orphaned_tags() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    let data = TestDataBuilder::new(db)
        .with_dir("root", None)
        .await
        .with_note("doomed", AccessLevel::None)
        .await
        .with_note("survivor", AccessLevel::None)
        .await
        .build();
    let doomed = &data.notes[0];
    let survivor = &data.notes[1];

    db.notes
        .set_user_access(doomed.id, Uuid::new_v4(), AccessLevel::Read)
        .await
        .unwrap();
    let only_here = db.tags.create_and_link("lonely", doomed.id).await.unwrap();
    let shared = db.tags.create_and_link("shared", doomed.id).await.unwrap();
    db.tags.link_to_note(shared.id, survivor.id).await.unwrap();

    db.notes.delete(doomed.id).await.unwrap();

    assert!(matches!(
        db.notes.get(doomed.id).await,
        Err(Error::NoteNotFound(_))
    ));
    assert!(db.notes.list_access(doomed.id).await.unwrap().is_empty());
    assert!(db.tags.find_by_name("lonely").await.unwrap().is_none());
    assert!(matches!(
        db.tags.get(only_here.id).await,
        Err(Error::TagNotFound(_))
    ));
    assert_eq!(
        db.tags.notes_for_tag(shared.id).await.unwrap(),
        vec![survivor.id]
    );

    test_db.cleanup().await;
}
