use serde_json::json;

use axum::http::StatusCode;

use crate::integration::common::{get, post_json, send, setup_db_app};

#[tokio::test]
#[ignore = "requires Docker"]
async fn clipped_selection_is_stored_and_served() {
    let (app, _container) = setup_db_app().await;

    let (status, clip) = send(
        &app.router,
        post_json(
            "/v1/clip",
            json!({
                "url": "https://example.com/note",
                "selection": "<p>Stored selections come back through the content endpoint.</p>",
                "title": "Stored",
                "user_id": "u1"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(clip["clip_id"].is_string());

    let (status, content) = send(&app.router, get("/v1/content?url=https://example.com/note")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content["id"], clip["clip_id"]);
    assert_eq!(content["title"], "Stored");
    assert_eq!(content["status"], "draft");
    assert_eq!(content["content_hash"], clip["content_hash"]);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn pipeline_events_are_listed() {
    let (app, _container) = setup_db_app().await;

    let (status, _) = send(
        &app.router,
        post_json(
            "/v1/clip",
            json!({"selection": "<p>Event log entry.</p>", "title": "Events"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, logs) = send(&app.router, get("/v1/logs?event=content_scraped")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(logs["total"], 1);
    assert_eq!(logs["events"][0]["details"]["title"], "Events");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn recent_clips_are_listed_newest_first() {
    let (app, _container) = setup_db_app().await;

    for title in ["First", "Second"] {
        let (status, _) = send(
            &app.router,
            post_json(
                "/v1/clip",
                json!({"selection": format!("<p>{title} stored note body.</p>"), "title": title}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, recent) = send(&app.router, get("/v1/content/recent?limit=1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(recent["total"], 1);
    assert_eq!(recent["clips"][0]["title"], "Second");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn health_reports_database() {
    let (app, _container) = setup_db_app().await;

    let (status, json) = send(
        &app.router,
        axum::http::Request::get("/health")
            .body(axum::body::Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["database"], "ok");
}
