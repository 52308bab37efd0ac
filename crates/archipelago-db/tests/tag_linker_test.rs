//! Transactional tag linker against PostgreSQL.

use std::sync::Arc;

use archipelago_db::test_fixtures::{TestData, TestDataBuilder, TestDatabase};
use archipelago_db::{AccessLevel, Database, Error, PgTagRepository, TagRepository};

async fn two_notes(db: &Database) -> TestData {
    TestDataBuilder::new(db)
        .with_dir("root", None)
        .await
        .with_note("first", AccessLevel::None)
        .await
        .with_note("second", AccessLevel::None)
        .await
        .build()
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with a reachable PostgreSQL server
async fn test_create_and_link_reuses_normalized_tag() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    let data = two_notes(db).await;
    let (first, second) = (&data.notes[0], &data.notes[1]);

    let tag = db.tags.create_and_link("  Rust!  ", first.id).await.unwrap();
    assert_eq!(tag.name, "rust");

    let again = db.tags.create_and_link("RUST", first.id).await.unwrap();
    assert_eq!(again.id, tag.id);
    let other = db.tags.create_and_link("rust", second.id).await.unwrap();
    assert_eq!(other.id, tag.id);

    let mut notes = db.tags.notes_for_tag(tag.id).await.unwrap();
    notes.sort();
    let mut expected = vec![first.id, second.id];
    expected.sort();
    assert_eq!(notes, expected);
    assert_eq!(db.tags.tags_for_note(first.id).await.unwrap().len(), 1);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with a reachable PostgreSQL server
async fn test_create_and_link_rejects_bad_input() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    let data = two_notes(db).await;

    assert!(matches!(
        db.tags.create_and_link("🍋 !!", data.notes[0].id).await,
        Err(Error::InvalidInput(_))
    ));
    let missing = uuid::Uuid::new_v4();
    assert!(matches!(
        db.tags.create_and_link("valid", missing).await,
        Err(Error::NoteNotFound(id)) if id == missing
    ));
    assert!(db.tags.find_by_name("valid").await.unwrap().is_none());

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with a reachable PostgreSQL server
async fn test_unlink_last_link_deletes_tag() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    let data = two_notes(db).await;
    let (first, second) = (&data.notes[0], &data.notes[1]);

    let tag = db.tags.create_and_link("ephemeral", first.id).await.unwrap();
    db.tags.link_to_note(tag.id, second.id).await.unwrap();

    assert!(!db.tags.unlink_from_note(tag.id, first.id).await.unwrap());
    assert_eq!(db.tags.get(tag.id).await.unwrap().name, "ephemeral");

    assert!(db.tags.unlink_from_note(tag.id, second.id).await.unwrap());
    assert!(matches!(db.tags.get(tag.id).await, Err(Error::TagNotFound(_))));

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with a reachable PostgreSQL server
async fn test_unlink_without_link_is_reported() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    let data = two_notes(db).await;
    let (first, second) = (&data.notes[0], &data.notes[1]);

    let tag = db.tags.create_and_link("pinned", first.id).await.unwrap();
    let err = db.tags.unlink_from_note(tag.id, second.id).await.unwrap_err();
    assert!(matches!(
        err,
        Error::TagLinkNotFound { tag_id, note_id } if tag_id == tag.id && note_id == second.id
    ));
    // The failed unlink must not collect the tag.
    assert!(db.tags.get(tag.id).await.is_ok());

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with a reachable PostgreSQL server
async fn test_rename_for_note_collects_old_tag() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    let data = two_notes(db).await;
    let (first, second) = (&data.notes[0], &data.notes[1]);

    let old = db.tags.create_and_link("draft", first.id).await.unwrap();
    let (renamed, old_deleted) = db.tags.rename_for_note(old.id, first.id, "Final").await.unwrap();
    assert!(old_deleted);
    assert_eq!(renamed.name, "final");
    assert_ne!(renamed.id, old.id);
    assert!(matches!(db.tags.get(old.id).await, Err(Error::TagNotFound(_))));

    // A tag still used elsewhere survives the rename.
    let shared = db.tags.create_and_link("shared", first.id).await.unwrap();
    db.tags.link_to_note(shared.id, second.id).await.unwrap();
    let (_, shared_deleted) = db.tags.rename_for_note(shared.id, first.id, "solo").await.unwrap();
    assert!(!shared_deleted);
    assert_eq!(db.tags.notes_for_tag(shared.id).await.unwrap(), vec![second.id]);

    let names: Vec<String> = db
        .tags
        .tags_for_note(first.id)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(names, vec!["final", "solo"]);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with a reachable PostgreSQL server
async fn test_update_tag_merges_into_existing_name() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    let data = two_notes(db).await;
    let (first, second) = (&data.notes[0], &data.notes[1]);

    let source = db.tags.create_and_link("colour", first.id).await.unwrap();
    let target = db.tags.create_and_link("color", second.id).await.unwrap();
    db.tags.link_to_note(target.id, first.id).await.unwrap();
    let neighbour = db.tags.create_and_link("paint", second.id).await.unwrap();
    db.tags
        .link_tags(source.id, neighbour.id, Some("spelling"))
        .await
        .unwrap();

    let merged = db.tags.update_tag(source.id, "Color").await.unwrap();
    assert_eq!(merged.id, target.id);
    assert!(matches!(db.tags.get(source.id).await, Err(Error::TagNotFound(_))));

    let mut notes = db.tags.notes_for_tag(target.id).await.unwrap();
    notes.sort();
    let mut expected = vec![first.id, second.id];
    expected.sort();
    assert_eq!(notes, expected);

    let linked = db.tags.linked_tags(target.id).await.unwrap();
    assert_eq!(linked.len(), 1);
    assert_eq!(linked[0].tag.id, neighbour.id);
    assert_eq!(linked[0].label.as_deref(), Some("spelling"));

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with a reachable PostgreSQL server
async fn test_update_tag_plain_rename() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    let data = two_notes(db).await;

    let tag = db.tags.create_and_link("typo", data.notes[0].id).await.unwrap();
    let renamed = db.tags.update_tag(tag.id, "Fixed").await.unwrap();
    assert_eq!(renamed.id, tag.id);
    assert_eq!(renamed.name, "fixed");

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with a reachable PostgreSQL server
async fn test_tag_to_tag_links_are_unordered() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    let data = two_notes(db).await;
    let note = &data.notes[0];

    let a = db.tags.create_and_link("alpha", note.id).await.unwrap();
    let b = db.tags.create_and_link("beta", note.id).await.unwrap();

    assert!(matches!(
        db.tags.link_tags(a.id, a.id, None).await,
        Err(Error::InvalidInput(_))
    ));

    db.tags.link_tags(b.id, a.id, Some("  related ")).await.unwrap();
    assert!(matches!(
        db.tags.link_tags(a.id, b.id, None).await,
        Err(Error::TagsAlreadyLinked { .. })
    ));

    let from_a = db.tags.linked_tags(a.id).await.unwrap();
    assert_eq!(from_a[0].tag.id, b.id);
    assert_eq!(from_a[0].label.as_deref(), Some("related"));
    let from_b = db.tags.linked_tags(b.id).await.unwrap();
    assert_eq!(from_b[0].tag.id, a.id);

    db.tags.unlink_tags(a.id, b.id).await.unwrap();
    assert!(matches!(
        db.tags.unlink_tags(b.id, a.id).await,
        Err(Error::TagsLinkNotFound { .. })
    ));
    assert!(db.tags.linked_tags(a.id).await.unwrap().is_empty());

    test_db.cleanup().await;
}

/// Tags left without any note link.
async fn orphan_count(test_db: &TestDatabase) -> i64 {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM tag t WHERE NOT EXISTS (SELECT 1 FROM tag_to_note tn WHERE tn.tag_id = t.tag_id)",
    )
    .fetch_one(&test_db.pool)
    .await
    .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore] // Requires DATABASE_URL with a reachable PostgreSQL server
async fn test_concurrent_unlinks_of_last_links_delete_once() {
    let test_db = TestDatabase::new().await;
    let data = two_notes(&test_db.db).await;
    let (first, second) = (data.notes[0].id, data.notes[1].id);
    let tags = Arc::new(PgTagRepository::new(test_db.pool.clone()));

    for round in 0..30 {
        let tag = tags
            .create_and_link(&format!("race{}", round), first)
            .await
            .unwrap();
        tags.link_to_note(tag.id, second).await.unwrap();

        let (a, b) = {
            let (t1, t2) = (tags.clone(), tags.clone());
            let tag_id = tag.id;
            tokio::join!(
                tokio::spawn(async move { t1.unlink_from_note(tag_id, first).await }),
                tokio::spawn(async move { t2.unlink_from_note(tag_id, second).await }),
            )
        };
        let a = a.unwrap().unwrap();
        let b = b.unwrap().unwrap();
        assert!(a ^ b, "round {}: exactly one unlink deletes the tag", round);
        assert!(matches!(tags.get(tag.id).await, Err(Error::TagNotFound(_))));
    }
    assert_eq!(orphan_count(&test_db).await, 0);

    test_db.cleanup().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore] // Requires DATABASE_URL with a reachable PostgreSQL server
async fn test_create_and_link_racing_last_unlink() {
    let test_db = TestDatabase::new().await;
    let data = two_notes(&test_db.db).await;
    let (first, second) = (data.notes[0].id, data.notes[1].id);
    let tags = Arc::new(PgTagRepository::new(test_db.pool.clone()));

    for round in 0..30 {
        let name = format!("contested{}", round);
        let tag = tags.create_and_link(&name, first).await.unwrap();

        let (unlinked, linked) = {
            let (t1, t2) = (tags.clone(), tags.clone());
            let (tag_id, name) = (tag.id, name.clone());
            tokio::join!(
                tokio::spawn(async move { t1.unlink_from_note(tag_id, first).await }),
                tokio::spawn(async move { t2.create_and_link(&name, second).await }),
            )
        };
        let deleted = unlinked.unwrap().unwrap();
        let linked = linked.unwrap().unwrap();

        // Whichever order won, the second note ends up with a live tag.
        let live = tags.find_by_name(&name).await.unwrap().unwrap();
        assert_eq!(live.id, linked.id);
        assert_eq!(tags.notes_for_tag(live.id).await.unwrap(), vec![second]);
        if deleted {
            assert_ne!(live.id, tag.id, "round {}", round);
        } else {
            assert_eq!(live.id, tag.id, "round {}", round);
        }

        tags.unlink_from_note(live.id, second).await.unwrap();
    }
    assert_eq!(orphan_count(&test_db).await, 0);

    test_db.cleanup().await;
}
