use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tempfile::TempDir;
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};
use tower::ServiceExt;

use clipper_core::PipelineConfig;
use clipper_db::Database;
use clipper_server::routes;
use clipper_server::state::AppState;
use clipper_server::store::Storage;

pub const TEST_API_KEY: &str = "test-secret-key";

pub struct TestApp {
    pub router: Router,
    pub dir: TempDir,
}

impl TestApp {
    pub fn vault(&self) -> PathBuf {
        self.dir.path().join("vault")
    }
}

fn config(dir: &TempDir, with_vault: bool) -> PipelineConfig {
    PipelineConfig {
        vault_path: with_vault.then(|| dir.path().join("vault")),
        templates_dir: dir.path().join("templates"),
        temp_dir: dir.path().join("tmp"),
        ..PipelineConfig::default()
    }
}

fn build(storage: Storage, with_vault: bool) -> TestApp {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let state = AppState::new(storage, TEST_API_KEY, &config(&dir, with_vault))
        .expect("Failed to build app state");
    TestApp {
        router: routes::router(Arc::new(state)),
        dir,
    }
}

/// App without a database or vault.
pub fn setup_test_app() -> TestApp {
    build(Storage::Disabled, false)
}

/// App without a database, writing documents into `<tempdir>/vault`.
pub fn setup_test_app_with_vault() -> TestApp {
    build(Storage::Disabled, true)
}

/// Spin up a PostgreSQL container and return the test app + container handle.
pub async fn setup_db_app() -> (TestApp, ContainerAsync<GenericImage>) {
    let container = GenericImage::new("postgres", "16")
        .with_exposed_port(ContainerPort::Tcp(5432))
        .with_wait_for(WaitFor::message_on_stderr(
            "database system is ready to accept connections",
        ))
        .with_env_var("POSTGRES_PASSWORD", "postgres")
        .with_env_var("POSTGRES_DB", "clipper_test")
        .start()
        .await
        .expect("Failed to start PostgreSQL container");

    let host = container.get_host().await.expect("Failed to get host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("Failed to get port");

    let url = format!("postgresql://postgres:postgres@{host}:{port}/clipper_test");
    let db = Database::from_pool(retry_connect(&url).await);
    db.migrate().await.expect("Failed to run migrations");

    (build(Storage::Postgres(db), false), container)
}

async fn retry_connect(url: &str) -> PgPool {
    for _ in 0..30 {
        if let Ok(pool) = PgPoolOptions::new().max_connections(5).connect(url).await {
            return pool;
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
    panic!("Failed to connect to test database");
}

/// Send a request and decode the JSON body.
pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::get(uri)
        .header("authorization", format!("Bearer {TEST_API_KEY}"))
        .body(Body::empty())
        .unwrap()
}

pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::post(uri)
        .header("authorization", format!("Bearer {TEST_API_KEY}"))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}
