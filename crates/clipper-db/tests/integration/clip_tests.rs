use clipper_core::models::NewClipRecord;
use clipper_core::traits::ClipStore;
use clipper_db::{ClipRepository, Database};

use crate::integration::common::setup_test_db;

fn new_clip(url: &str, title: &str) -> NewClipRecord {
    NewClipRecord {
        url: Some(url.into()),
        title: title.into(),
        content: format!("# {title}\n\nBody"),
        genre: "tutorial".into(),
        template_id: "tutorial".into(),
        tags: vec!["rust".into(), "async".into()],
        metadata: serde_json::json!({"title": title, "readingTime": 3}),
        markdown_path: Some(format!("tutorial/rust/{title}.md")),
        content_hash: "a".repeat(64),
        status: "draft".into(),
        user_id: Some("user-1".into()),
    }
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn save_and_get_by_url() {
    let (pool, _container) = setup_test_db().await;
    let repo = ClipRepository::new(pool);

    let id = repo
        .save(&new_clip("https://example.com/a", "first"))
        .await
        .unwrap();
    assert!(!id.is_nil());

    let clip = repo
        .get_by_url("https://example.com/a")
        .await
        .unwrap()
        .expect("Should find the clip");

    assert_eq!(clip.id, id);
    assert_eq!(clip.title, "first");
    assert_eq!(clip.tags, vec!["rust", "async"]);
    assert_eq!(clip.metadata["readingTime"], 3);
    assert_eq!(clip.status, "draft");
    assert_eq!(clip.user_id.as_deref(), Some("user-1"));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn get_by_url_returns_most_recent() {
    let (pool, _container) = setup_test_db().await;
    let repo = ClipRepository::new(pool);

    repo.save(&new_clip("https://example.com/a", "old")).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    let newest = repo
        .save(&new_clip("https://example.com/a", "new"))
        .await
        .unwrap();

    let clip = repo
        .get_by_url("https://example.com/a")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(clip.id, newest);
    assert_eq!(clip.title, "new");

    let history = repo.get_history("https://example.com/a", 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].title, "old");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn unknown_url_is_none() {
    let (pool, _container) = setup_test_db().await;
    let repo = ClipRepository::new(pool);

    assert!(repo.get_by_url("https://nowhere.example").await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn list_recent_respects_limit_and_order() {
    let (pool, _container) = setup_test_db().await;
    let db = Database::from_pool(pool);
    let repo = db.clip_repo();

    for (i, url) in ["https://a.example", "https://b.example", "https://c.example"]
        .iter()
        .enumerate()
    {
        repo.save(&new_clip(url, &format!("clip-{i}"))).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    let recent = ClipStore::list_recent(&repo, 2).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].title, "clip-2");
    assert_eq!(recent[1].title, "clip-1");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn selection_clip_without_url() {
    let (pool, _container) = setup_test_db().await;
    let repo = ClipRepository::new(pool);

    let mut clip = new_clip("unused", "selection");
    clip.url = None;
    clip.markdown_path = None;
    let id = repo.save(&clip).await.unwrap();

    let recent = repo.list_recent(1).await.unwrap();
    assert_eq!(recent[0].id, id);
    assert!(recent[0].url.is_none());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn invalid_status_is_rejected() {
    let (pool, _container) = setup_test_db().await;
    let repo = ClipRepository::new(pool);

    let mut clip = new_clip("https://example.com", "bad");
    clip.status = "deleted".into();
    let err = repo.save(&clip).await.unwrap_err();
    assert!(matches!(err, clipper_core::AppError::DatabaseError(_)));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn health_check_succeeds() {
    let (pool, _container) = setup_test_db().await;
    Database::from_pool(pool).health_check().await.unwrap();
}
