use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;

use crate::integration::common::{get, post_json, send, setup_test_app, setup_test_app_with_vault};

fn code_page() -> String {
    format!(
        r#"<html><head><title>Parsing numbers</title></head><body><main>
           <h1>Parsing numbers</h1><p>{}</p>
           <pre><code>let n: u32 = "42".parse()?;</code></pre>
           <p>A quick review of the standard parse method.</p>
           </main></body></html>"#,
        "Strings turn into numbers with a single call. ".repeat(12)
    )
}

#[tokio::test]
async fn health_without_database_is_healthy() {
    let app = setup_test_app();

    let (status, json) = send(
        &app.router,
        Request::get("/health").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["database"], "disabled");
}

#[tokio::test]
async fn unauthenticated_request_returns_401() {
    let app = setup_test_app();

    let (status, json) = send(
        &app.router,
        Request::get("/v1/templates").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "unauthorized");
}

#[tokio::test]
async fn wrong_api_key_returns_401() {
    let app = setup_test_app();

    let (status, _) = send(
        &app.router,
        Request::get("/v1/templates")
            .header("authorization", "Bearer wrong-key")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn openapi_document_is_public() {
    let app = setup_test_app();

    let (status, json) = send(
        &app.router,
        Request::get("/api-docs/openapi.json")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["paths"].get("/v1/clip").is_some());
    assert!(json["paths"].get("/v1/classify").is_some());
}

#[tokio::test]
async fn templates_lists_the_catalog() {
    let app = setup_test_app();

    let (status, json) = send(&app.router, get("/v1/templates")).await;

    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = json["templates"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_str().unwrap())
        .collect();
    assert_eq!(
        ids,
        vec!["blog-post", "research-note", "code-snippet", "tutorial", "affiliate-post"]
    );
}

#[tokio::test]
async fn classify_code_page() {
    let app = setup_test_app();

    let (status, json) = send(
        &app.router,
        post_json(
            "/v1/classify",
            json!({"html": code_page(), "url": "https://example.com/parse"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["genre"], "code_snippet");
    assert_eq!(json["votes"].as_array().unwrap().len(), 3);
    assert_eq!(json["template_scores"].as_array().unwrap().len(), 5);
    assert_eq!(json["signals"]["has_code_block"], true);
    assert!(json["keywords"].as_array().unwrap().len() <= 10);
}

#[tokio::test]
async fn classify_rejects_empty_markup() {
    let app = setup_test_app();

    let (status, json) = send(&app.router, post_json("/v1/classify", json!({"html": "  "}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "bad_request");
}

#[tokio::test]
async fn clip_selection_uses_given_title() {
    let app = setup_test_app();

    let (status, json) = send(
        &app.router,
        post_json(
            "/v1/clip",
            json!({
                "url": "https://example.com/ownership",
                "selection": "<article><p>Ownership and borrowing keep memory safe without a garbage collector.</p></article>",
                "title": "My Note",
                "tags": ["rust"]
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["title"], "My Note");
    assert_eq!(json["url"], "https://example.com/ownership");
    assert_eq!(json["metadata"]["isPartialContent"], true);
    assert_eq!(json["tags"], json!(["rust"]));
    assert!(json["markdown"].as_str().unwrap().starts_with("# My Note"));
    assert!(json["saved_path"].is_null());
    assert!(json["clip_id"].is_null());
}

#[tokio::test]
async fn clip_selection_is_written_to_the_vault() {
    let app = setup_test_app_with_vault();

    let (status, json) = send(
        &app.router,
        post_json(
            "/v1/clip",
            json!({
                "selection": "<p>A short note about lifetimes in Rust.</p>",
                "title": "Lifetimes"
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let path = json["saved_path"].as_str().unwrap();
    assert!(path.ends_with("lifetimes.md"));
    let written = std::fs::read_to_string(app.vault().join(path)).unwrap();
    assert!(written.starts_with("# Lifetimes"));
}

#[tokio::test]
async fn clip_without_save_skips_the_vault() {
    let app = setup_test_app_with_vault();

    let (status, json) = send(
        &app.router,
        post_json(
            "/v1/clip",
            json!({"selection": "<p>Draft only.</p>", "title": "Draft", "save": false}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["saved_path"].is_null());
    assert!(!app.vault().exists());
}

#[tokio::test]
async fn clip_requires_url_or_selection() {
    let app = setup_test_app();

    let (status, _) = send(&app.router, post_json("/v1/clip", json!({"title": "x"}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn scrape_validates_input() {
    let app = setup_test_app();

    let cases = [
        json!({"url": "not a url"}),
        json!({"url": "ftp://example.com/file"}),
        json!({"url": "https://example.com", "template": "recipe"}),
        json!({"url": "https://example.com", "tags": ["two words"]}),
        json!({"url": "https://example.com", "metadata": "flat"}),
    ];
    for body in cases {
        let (status, json) = send(&app.router, post_json("/v1/scrape", body.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(json["error"], "bad_request");
    }
}

#[tokio::test]
async fn scrape_failure_reports_context_without_cause() {
    let app = setup_test_app();

    let (status, json) = send(
        &app.router,
        post_json("/v1/scrape", json!({"url": "http://127.0.0.1:9/private"})),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "rejected");
    assert_eq!(json["context"]["service"], "scraper");
    assert_eq!(json["context"]["operation"], "fetch");
    assert!(json["context"]["timestamp"].is_string());
    assert!(json["context"].get("cause").is_none());
    assert!(!json["message"].as_str().unwrap().contains("SSRF"));
}

#[tokio::test]
async fn content_without_database_is_not_found() {
    let app = setup_test_app();

    let (status, json) = send(&app.router, get("/v1/content?url=https://example.com/a")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not_found");
}

#[tokio::test]
async fn logs_without_database_are_empty() {
    let app = setup_test_app();

    let (status, json) = send(&app.router, get("/v1/logs?event=error&limit=5")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 0);
}

#[tokio::test]
async fn recent_without_database_is_empty() {
    let app = setup_test_app();

    let (status, json) = send(&app.router, get("/v1/content/recent?limit=3")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 0);
    assert_eq!(json["clips"], json!([]));
}

#[tokio::test]
async fn affiliate_selection_is_enhanced() {
    let app = setup_test_app();
    let selection = format!(
        "<p>{}</p><p>{}</p>",
        "Acme Blender is quiet and costs $89. Zenith Mixer has a larger jar.",
        "We may earn an affiliate commission when you buy through our links."
    );

    let (status, json) = send(
        &app.router,
        post_json(
            "/v1/clip",
            json!({"selection": selection, "title": "Best blenders", "save": false}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["genre"], "affiliate_post");
    assert_eq!(json["metadata"]["enhanced"], true);
    let markdown = json["markdown"].as_str().unwrap();
    assert!(markdown.contains("## Buying Guide"));
    assert!(markdown.contains("*Disclaimer: As an affiliate"));
}
