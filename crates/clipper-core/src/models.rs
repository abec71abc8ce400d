use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::AppError;

/// Structural flags derived from the DOM of a page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralSignals {
    pub has_article_root: bool,
    pub has_code_block: bool,
    pub has_ordered_steps: bool,
    pub has_citation_markers: bool,
    pub code_block_count: usize,
    pub heading_count: usize,
}

/// Metadata collected from `<meta>` tags, `<title>`, and schema hints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub og_type: Option<String>,
    pub og_title: Option<String>,
    pub og_description: Option<String>,
    pub og_image: Option<String>,
    pub article_type: Option<String>,
    /// `itemtype` attribute or JSON-LD `@type` of the first schema block.
    pub schema_type: Option<String>,
    pub author: Option<String>,
    pub published_time: Option<String>,
    pub modified_time: Option<String>,
    /// `<meta name="keywords">`, split on commas.
    pub keywords: Vec<String>,
    /// `article:tag` values.
    pub tags: Vec<String>,
}

/// An image referenced by the page. Nothing is downloaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRef {
    pub url: String,
    pub alt: String,
    pub title: String,
    pub original_src: String,
}

/// A page parsed once per ingestion.
///
/// HTML trees are not `Send`, so the source markup is kept and every
/// signal is computed eagerly when the document is built.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedDocument {
    pub markup: String,
    pub base_url: Option<String>,
    pub signals: StructuralSignals,
    pub metadata: PageMetadata,
    pub headings: Vec<String>,
    pub body_classes: Vec<String>,
    pub images: Vec<ImageRef>,
}

/// The primary content of a page.
///
/// `body_text` is never blank: the only ways to build one are
/// [`ExtractedContent::new`] and deserialization, both of which check it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawExtractedContent")]
pub struct ExtractedContent {
    title: String,
    body_html: String,
    body_text: String,
    excerpt: String,
    strategy: String,
}

#[derive(Deserialize)]
struct RawExtractedContent {
    title: String,
    body_html: String,
    body_text: String,
    excerpt: String,
    strategy: String,
}

impl TryFrom<RawExtractedContent> for ExtractedContent {
    type Error = AppError;

    fn try_from(raw: RawExtractedContent) -> Result<Self, Self::Error> {
        ExtractedContent::new(
            raw.title,
            raw.body_html,
            raw.body_text,
            raw.excerpt,
            raw.strategy,
        )
    }
}

impl ExtractedContent {
    pub fn new(
        title: impl Into<String>,
        body_html: impl Into<String>,
        body_text: impl Into<String>,
        excerpt: impl Into<String>,
        strategy: impl Into<String>,
    ) -> Result<Self, AppError> {
        let body_text = body_text.into();
        let strategy = strategy.into();
        if body_text.trim().is_empty() {
            return Err(AppError::ExtractionFailed {
                attempted: vec![strategy],
            });
        }
        Ok(Self {
            title: title.into(),
            body_html: body_html.into(),
            body_text,
            excerpt: excerpt.into(),
            strategy,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn body_html(&self) -> &str {
        &self.body_html
    }

    pub fn body_text(&self) -> &str {
        &self.body_text
    }

    pub fn excerpt(&self) -> &str {
        &self.excerpt
    }

    /// Name of the extraction strategy that produced this content.
    pub fn strategy(&self) -> &str {
        &self.strategy
    }

    pub fn word_count(&self) -> usize {
        self.body_text.split_whitespace().count()
    }
}

/// A ranked keyword.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordScore {
    pub term: String,
    pub weight: f64,
}

/// Content genre.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Genre {
    CodeSnippet,
    Tutorial,
    ResearchNote,
    AffiliatePost,
    BlogPost,
}

impl Genre {
    pub const ALL: [Genre; 5] = [
        Genre::CodeSnippet,
        Genre::Tutorial,
        Genre::ResearchNote,
        Genre::AffiliatePost,
        Genre::BlogPost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Genre::CodeSnippet => "code_snippet",
            Genre::Tutorial => "tutorial",
            Genre::ResearchNote => "research_note",
            Genre::AffiliatePost => "affiliate_post",
            Genre::BlogPost => "blog_post",
        }
    }

    /// The catalog template id with the same name (`code_snippet` -> `code-snippet`).
    pub fn template_id(&self) -> &'static str {
        match self {
            Genre::CodeSnippet => "code-snippet",
            Genre::Tutorial => "tutorial",
            Genre::ResearchNote => "research-note",
            Genre::AffiliatePost => "affiliate-post",
            Genre::BlogPost => "blog-post",
        }
    }
}

impl std::fmt::Display for Genre {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Genre {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Genre::ALL
            .into_iter()
            .find(|g| g.as_str() == s || g.template_id() == s)
            .ok_or_else(|| AppError::Generic(format!("Unknown genre: {s}")))
    }
}

/// A filled-in template, ready to be written to the vault.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedDocument {
    pub template_id: String,
    pub title: String,
    /// Sanitized file name without extension.
    pub file_stem: String,
    /// Vault-relative folder, `/`-separated.
    pub folder: String,
    pub markdown: String,
}

impl RenderedDocument {
    /// Vault-relative path of the document.
    pub fn relative_path(&self) -> String {
        if self.folder.is_empty() {
            format!("{}.md", self.file_stem)
        } else {
            format!("{}/{}.md", self.folder, self.file_stem)
        }
    }
}

/// Everything the clip pipeline derived from one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipResult {
    pub url: Option<String>,
    pub title: String,
    pub excerpt: String,
    pub genre: Genre,
    pub keywords: Vec<KeywordScore>,
    pub template_id: String,
    pub tags: Vec<String>,
    pub metadata: serde_json::Value,
    pub document: RenderedDocument,
    pub reading_time_minutes: usize,
    /// SHA-256 of the Markdown body.
    pub content_hash: String,
    pub strategy: String,
    /// Vault-relative path, when the document was persisted.
    pub saved_path: Option<String>,
    /// Content store id, when a store is configured.
    pub clip_id: Option<Uuid>,
}

/// A clip stored in the content store.
#[derive(Debug, Clone, Serialize)]
pub struct ClipRecord {
    pub id: Uuid,
    pub url: Option<String>,
    pub title: String,
    pub content: String,
    pub genre: String,
    pub template_id: String,
    pub tags: Vec<String>,
    pub metadata: serde_json::Value,
    pub markdown_path: Option<String>,
    pub content_hash: String,
    pub status: String,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// DTO for inserting a new clip into the content store.
#[derive(Debug, Clone, Serialize)]
pub struct NewClipRecord {
    pub url: Option<String>,
    pub title: String,
    pub content: String,
    pub genre: String,
    pub template_id: String,
    pub tags: Vec<String>,
    pub metadata: serde_json::Value,
    pub markdown_path: Option<String>,
    pub content_hash: String,
    pub status: String,
    pub user_id: Option<String>,
}

/// A row of the event log.
#[derive(Debug, Clone, Serialize)]
pub struct LogEvent {
    pub id: Uuid,
    pub event: String,
    pub details: serde_json::Value,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Compute a SHA-256 hash of a string, returned as 64-char hex.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Estimated reading time in minutes at 200 words per minute, rounded up.
pub fn reading_time_minutes(word_count: usize) -> usize {
    word_count.div_ceil(200)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_hash_consistency() {
        let h1 = compute_hash("hello world");
        let h2 = compute_hash("hello world");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn test_compute_hash_different_inputs() {
        assert_ne!(compute_hash("hello"), compute_hash("world"));
    }

    #[test]
    fn test_extracted_content_rejects_blank_text() {
        let err = ExtractedContent::new("t", "<p> </p>", "  \n\t", "", "landmark").unwrap_err();
        assert!(matches!(err, AppError::ExtractionFailed { ref attempted } if attempted == &["landmark"]));
    }

    #[test]
    fn test_extracted_content_deserialize_checks_text() {
        let ok = serde_json::json!({
            "title": "T", "body_html": "<p>x</p>", "body_text": "x",
            "excerpt": "x", "strategy": "fallback"
        });
        let content: ExtractedContent = serde_json::from_value(ok).unwrap();
        assert_eq!(content.body_text(), "x");

        let blank = serde_json::json!({
            "title": "T", "body_html": "", "body_text": " ",
            "excerpt": "", "strategy": "fallback"
        });
        assert!(serde_json::from_value::<ExtractedContent>(blank).is_err());
    }

    #[test]
    fn test_genre_names() {
        assert_eq!(Genre::ResearchNote.template_id(), "research-note");
        assert_eq!("affiliate-post".parse::<Genre>().unwrap(), Genre::AffiliatePost);
        assert_eq!("blog_post".parse::<Genre>().unwrap(), Genre::BlogPost);
        assert!("poem".parse::<Genre>().is_err());
        assert_eq!(
            serde_json::to_value(Genre::CodeSnippet).unwrap(),
            serde_json::json!("code_snippet")
        );
    }

    #[test]
    fn test_reading_time_rounds_up() {
        assert_eq!(reading_time_minutes(0), 0);
        assert_eq!(reading_time_minutes(1), 1);
        assert_eq!(reading_time_minutes(200), 1);
        assert_eq!(reading_time_minutes(201), 2);
    }

    #[test]
    fn test_relative_path() {
        let doc = RenderedDocument {
            template_id: "blog-post".into(),
            title: "Hello".into(),
            file_stem: "hello".into(),
            folder: "blog_post/rust".into(),
            markdown: String::new(),
        };
        assert_eq!(doc.relative_path(), "blog_post/rust/hello.md");
    }
}
