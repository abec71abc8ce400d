//! Fallbacks registered with the resilience guard.
//!
//! | service.operation | fallback                                            |
//! |-------------------|-----------------------------------------------------|
//! | scraper.extract   | page `<title>` and whole `<body>` text              |
//! | template.render   | built-in default template body                      |
//! | storage.persist   | backup file under the temp directory                |
//! | storage.save      | JSON backup under the temp directory, nil id        |

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::Utc;
use clipper_core::error::AppError;
use clipper_core::models::ExtractedContent;
use clipper_core::render::{DEFAULT_TEMPLATE_BODY, RenderData, render_template};
use clipper_core::resilience::{ErrorContext, FallbackRegistry};
use clipper_core::traits::Fetcher;
use scraper::{Html, Selector};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::extract::excerpt;

static BODY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("valid selector"));
static TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("valid selector"));

/// Strategy name reported by fallback extraction.
pub const FALLBACK_STRATEGY: &str = "fallback";

/// The standard fallback set.
pub fn default_fallbacks<F>(fetcher: F, temp_dir: impl Into<PathBuf>) -> FallbackRegistry
where
    F: Fetcher + 'static,
{
    let temp_dir = temp_dir.into();
    let persist_dir = temp_dir.clone();

    FallbackRegistry::new()
        .with("scraper", "extract", move |ctx| {
            let fetcher = fetcher.clone();
            async move { extract_fallback(&fetcher, &ctx).await }
        })
        .with("template", "render", |ctx| async move { render_fallback(&ctx) })
        .with("storage", "persist", move |ctx| {
            let dir = persist_dir.clone();
            async move {
                let markdown = ctx.parameters["document"]["markdown"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string();
                let path = write_backup(&dir, "md", &markdown).await?;
                Ok::<_, AppError>(json!(path))
            }
        })
        .with("storage", "save", move |ctx| {
            let dir = temp_dir.clone();
            async move {
                let record = serde_json::to_string(&ctx.parameters["record"])?;
                write_backup(&dir, "json", &record).await?;
                Ok::<_, AppError>(json!(Uuid::nil()))
            }
        })
}

async fn extract_fallback<F: Fetcher>(fetcher: &F, ctx: &ErrorContext) -> Result<Value, AppError> {
    let html = match (ctx.parameters["html"].as_str(), ctx.parameters["url"].as_str()) {
        (Some(html), _) => html.to_string(),
        (None, Some(url)) => fetcher.fetch(url).await?,
        (None, None) => {
            return Err(AppError::ExtractionFailed {
                attempted: vec![FALLBACK_STRATEGY.into()],
            });
        }
    };
    let content = plain_extract(&html)?;
    tracing::info!(words = content.word_count(), "Fallback extraction succeeded");
    Ok(serde_json::to_value(content)?)
}

/// `<title>` plus all `<body>` text, whitespace collapsed.
pub fn plain_extract(html: &str) -> Result<ExtractedContent, AppError> {
    let document = Html::parse_document(html);
    let collapse = |s: String| s.split_whitespace().collect::<Vec<_>>().join(" ");
    let title = document
        .select(&TITLE)
        .next()
        .map(|t| collapse(t.text().collect()))
        .unwrap_or_default();
    let text = document
        .select(&BODY)
        .next()
        .map(|b| collapse(b.text().collect()))
        .unwrap_or_default();
    let excerpt = excerpt(&text);
    ExtractedContent::new(title, "", text, excerpt, FALLBACK_STRATEGY)
}

fn render_fallback(ctx: &ErrorContext) -> Result<Value, AppError> {
    let data: RenderData = serde_json::from_value(ctx.parameters["data"].clone())?;
    Ok(json!(render_template(DEFAULT_TEMPLATE_BODY, &data)))
}

async fn write_backup(dir: &Path, extension: &str, contents: &str) -> Result<String, AppError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| AppError::StorageError(format!("Failed to create {}: {e}", dir.display())))?;
    let path = dir.join(format!(
        "backup_{}_{}.{extension}",
        Utc::now().timestamp_millis(),
        Uuid::new_v4().simple()
    ));
    tokio::fs::write(&path, contents)
        .await
        .map_err(|e| AppError::StorageError(format!("Failed to write {}: {e}", path.display())))?;
    tracing::warn!(path = %path.display(), "Wrote backup file");
    Ok(path.display().to_string())
}
