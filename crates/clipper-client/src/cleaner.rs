use std::sync::{Arc, LazyLock};

use clipper_core::error::AppError;
use clipper_core::traits::Cleaner;
use htmd::HtmlToMarkdown;
use regex::Regex;

/// Elements that never carry article content.
pub const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "nav", "footer", "header", "aside", "noscript", "iframe", "svg",
];

static BLANK_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// HTML-to-Markdown converter using htmd.
///
/// Produces ATX headings and fenced code blocks, and drops
/// [`SKIPPED_TAGS`] entirely.
#[derive(Clone)]
pub struct HtmdCleaner {
    converter: Arc<HtmlToMarkdown>,
}

impl HtmdCleaner {
    pub fn new() -> Self {
        let converter = HtmlToMarkdown::builder()
            .skip_tags(SKIPPED_TAGS.to_vec())
            .build();

        Self {
            converter: Arc::new(converter),
        }
    }
}

impl Default for HtmdCleaner {
    fn default() -> Self {
        Self::new()
    }
}

impl Cleaner for HtmdCleaner {
    fn clean(&self, html: &str) -> Result<String, AppError> {
        let markdown = self
            .converter
            .convert(html)
            .map_err(|e| AppError::CleanerError(e.to_string()))?;
        Ok(BLANK_RUNS.replace_all(markdown.trim(), "\n\n").into_owned())
    }
}
