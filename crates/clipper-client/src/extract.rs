use std::sync::LazyLock;

use clipper_core::error::AppError;
use clipper_core::models::{ExtractedContent, ParsedDocument};
use clipper_core::traits::ContentExtractor;
use dom_smoothie::Readability;
use scraper::{Html, Selector};

/// Maximum excerpt length, in characters.
pub const EXCERPT_CHARS: usize = 200;

/// Landmark selectors tried in order by [`landmark`].
pub const LANDMARK_SELECTORS: &[&str] = &[
    "article",
    r#"[role="article"]"#,
    "main",
    r#"[role="main"]"#,
    "#content",
    ".content",
    ".post-content",
    ".entry-content",
];

static LANDMARKS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    LANDMARK_SELECTORS
        .iter()
        .map(|css| Selector::parse(css).expect("valid selector"))
        .collect()
});

/// A single extraction strategy. `None` means "nothing found here".
pub type Strategy = fn(&ParsedDocument) -> Option<ExtractedContent>;

/// Runs extraction strategies in order; the first one that yields non-blank
/// text wins.
#[derive(Clone)]
pub struct StrategyChainExtractor {
    strategies: Vec<(&'static str, Strategy)>,
}

impl StrategyChainExtractor {
    /// Readability first, then landmark selectors.
    pub fn new() -> Self {
        Self {
            strategies: vec![
                ("readability", readability as Strategy),
                ("landmark", landmark as Strategy),
            ],
        }
    }

    /// A chain with caller-chosen strategies.
    pub fn with_strategies(strategies: Vec<(&'static str, Strategy)>) -> Self {
        Self { strategies }
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|(name, _)| *name).collect()
    }
}

impl Default for StrategyChainExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StrategyChainExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyChainExtractor")
            .field("strategies", &self.strategy_names())
            .finish()
    }
}

impl ContentExtractor for StrategyChainExtractor {
    fn extract(&self, document: &ParsedDocument) -> Result<ExtractedContent, AppError> {
        let mut attempted = Vec::with_capacity(self.strategies.len());
        for (name, strategy) in &self.strategies {
            attempted.push(name.to_string());
            match strategy(document) {
                Some(content) => {
                    tracing::debug!(strategy = name, "Extraction strategy succeeded");
                    return Ok(content);
                }
                None => tracing::debug!(strategy = name, "Extraction strategy found nothing"),
            }
        }
        Err(AppError::ExtractionFailed { attempted })
    }
}

/// Readability scoring via `dom_smoothie` over the full markup.
pub fn readability(document: &ParsedDocument) -> Option<ExtractedContent> {
    let mut reader = Readability::new(document.markup.as_str(), document.base_url.as_deref(), None)
        .map_err(|e| tracing::debug!(error = %e, "Readability init failed"))
        .ok()?;
    let article = reader
        .parse()
        .map_err(|e| tracing::debug!(error = %e, "Readability parse failed"))
        .ok()?;

    let text = normalize_text(&article.text_content);
    let title = Some(article.title.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| page_title(document));
    let excerpt = document
        .metadata
        .description
        .clone()
        .unwrap_or_else(|| excerpt(&text));

    ExtractedContent::new(title, article.content.to_string(), text, excerpt, "readability").ok()
}

/// First landmark element (see [`LANDMARK_SELECTORS`]) with text.
pub fn landmark(document: &ParsedDocument) -> Option<ExtractedContent> {
    let html = Html::parse_document(&document.markup);
    let (body_html, text) = LANDMARKS.iter().find_map(|selector| {
        html.select(selector).find_map(|element| {
            let text = normalize_text(&element.text().collect::<String>());
            (!text.is_empty()).then(|| (element.html(), text))
        })
    })?;
    let excerpt = excerpt(&text);
    ExtractedContent::new(page_title(document), body_html, text, excerpt, "landmark").ok()
}

/// `<title>`, then og:title, then empty.
fn page_title(document: &ParsedDocument) -> String {
    let meta = &document.metadata;
    meta.title
        .as_deref()
        .or(meta.og_title.as_deref())
        .unwrap_or_default()
        .to_string()
}

/// Collapse runs of blank lines and trim each line.
fn normalize_text(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// First [`EXCERPT_CHARS`] characters of `text`.
pub fn excerpt(text: &str) -> String {
    text.chars().take(EXCERPT_CHARS).collect()
}
