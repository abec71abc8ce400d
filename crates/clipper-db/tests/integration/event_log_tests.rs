use chrono::{Duration, Utc};
use clipper_core::traits::EventLog;
use clipper_db::EventLogRepository;
use serde_json::json;

use crate::integration::common::setup_test_db;

#[tokio::test]
#[ignore = "requires Docker"]
async fn record_and_read_back() {
    let (pool, _container) = setup_test_db().await;
    let log = EventLogRepository::new(pool);

    EventLog::record(&log, "scrape_started", &json!({"url": "https://a.example"}), Some("u1"))
        .await
        .unwrap();

    let events = log.recent(None, 10).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event, "scrape_started");
    assert_eq!(events[0].details["url"], "https://a.example");
    assert_eq!(events[0].user_id.as_deref(), Some("u1"));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn recent_filters_by_event_newest_first() {
    let (pool, _container) = setup_test_db().await;
    let log = EventLogRepository::new(pool);

    log.record("error", &json!({"code": "ECONNREFUSED"}), None).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    log.record("content_scraped", &json!({}), None).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    log.record("error", &json!({"code": "RATE_LIMIT"}), None).await.unwrap();

    let errors = log.recent(Some("error"), 10).await.unwrap();
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0].details["code"], "RATE_LIMIT");
    assert_eq!(errors[1].details["code"], "ECONNREFUSED");

    let latest = log.recent(None, 1).await.unwrap();
    assert_eq!(latest[0].details["code"], "RATE_LIMIT");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn prune_removes_old_events() {
    let (pool, _container) = setup_test_db().await;
    let log = EventLogRepository::new(pool);

    log.record("error", &json!({}), None).await.unwrap();
    let removed = log.prune(Utc::now() + Duration::seconds(1)).await.unwrap();
    assert_eq!(removed, 1);
    assert!(log.recent(None, 10).await.unwrap().is_empty());
}
