//! Meeting summary persistence against PostgreSQL.

use archipelago_db::test_fixtures::{TestDataBuilder, TestDatabase};
use archipelago_db::{AccessLevel, Detalization, Error, SaveSummaryRequest, SummaryRepository};
use uuid::Uuid;

fn save_request(id: Uuid, text: &str) -> SaveSummaryRequest {
    SaveSummaryRequest {
        id,
        text: text.to_string(),
        active: true,
        detalization: Detalization::Short,
        platform: "zoom".to_string(),
    }
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with a reachable PostgreSQL server
async fn test_save_text_upsert_clears_role_annotation() {
    let test_db = TestDatabase::new().await;
    let summaries = &test_db.db.summaries;
    let id = Uuid::new_v4();

    let first = summaries.save_text(save_request(id, "hello")).await.unwrap();
    assert_eq!(first.text, "hello");
    assert!(first.active);

    summaries
        .update_text_role(id, "Alice: hello", "Alice")
        .await
        .unwrap();
    let annotated = summaries.get(id).await.unwrap();
    assert_eq!(annotated.role, "Alice");

    let mut second = save_request(id, "hello again");
    second.platform = "meet".to_string();
    let resaved = summaries.save_text(second).await.unwrap();
    assert_eq!(resaved.text, "hello again");
    assert_eq!(resaved.text_with_role, "");
    assert_eq!(resaved.role, "");
    // Only the text is rewritten on conflict.
    assert_eq!(resaved.platform, "zoom");
    assert_eq!(resaved.started_at, first.started_at);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with a reachable PostgreSQL server
async fn test_finish_and_list_active() {
    let test_db = TestDatabase::new().await;
    let summaries = &test_db.db.summaries;
    let live = Uuid::new_v4();
    let done = Uuid::new_v4();

    summaries.save_text(save_request(live, "a")).await.unwrap();
    summaries.save_text(save_request(done, "b")).await.unwrap();
    summaries.finish(done).await.unwrap();

    let active: Vec<Uuid> = summaries
        .list_active()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(active, vec![live]);
    assert!(!summaries.get(done).await.unwrap().active);

    assert!(matches!(
        summaries.finish(Uuid::new_v4()).await,
        Err(Error::SummaryNotFound(_))
    ));

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with a reachable PostgreSQL server
async fn test_update_name_validation() {
    let test_db = TestDatabase::new().await;
    let summaries = &test_db.db.summaries;
    let id = Uuid::new_v4();
    summaries.save_text(save_request(id, "x")).await.unwrap();

    summaries.update_name(id, "  Weekly sync ").await.unwrap();
    assert_eq!(summaries.get(id).await.unwrap().name, "Weekly sync");

    assert!(matches!(
        summaries.update_name(id, "   ").await,
        Err(Error::InvalidInput(_))
    ));

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with a reachable PostgreSQL server
async fn test_attach_to_note() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    let data = TestDataBuilder::new(db)
        .with_dir("root", None)
        .await
        .with_note("minutes", AccessLevel::None)
        .await
        .build();
    let note = &data.notes[0];
    let id = Uuid::new_v4();
    db.summaries.save_text(save_request(id, "notes")).await.unwrap();

    db.summaries.attach_to_note(id, note.id).await.unwrap();
    db.summaries.attach_to_note(id, note.id).await.unwrap();
    let attached = db.summaries.list_for_note(note.id).await.unwrap();
    assert_eq!(attached.len(), 1);
    assert_eq!(attached[0].id, id);

    assert!(matches!(
        db.summaries.attach_to_note(id, Uuid::new_v4()).await,
        Err(Error::NoteNotFound(_))
    ));
    assert!(matches!(
        db.summaries.attach_to_note(Uuid::new_v4(), note.id).await,
        Err(Error::SummaryNotFound(_))
    ));

    test_db.cleanup().await;
}
