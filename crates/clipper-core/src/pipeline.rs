use std::future::ready;

use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value, json};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::classifier::{Vote, collect_votes, resolve};
use crate::enhance::enhance;
use crate::error::AppError;
use crate::keywords::KeywordCorpus;
use crate::models::{
    ClipResult, ExtractedContent, Genre, KeywordScore, NewClipRecord, PageMetadata,
    ParsedDocument, RenderedDocument, StructuralSignals, compute_hash, reading_time_minutes,
};
use crate::render::{RenderData, TemplateStore};
use crate::resilience::{ErrorContext, Guard, GuardError, shape};
use crate::template::{TemplateInput, TemplateScore, find_candidate, score_templates, select_template};
use crate::traits::{
    Cleaner, ClipStore, ContentExtractor, DocumentParser, DocumentWriter, EventLog, Fetcher,
};
use crate::vault::{file_stem, folder_structure};

/// Where the page comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum ClipSource {
    Url(String),
    /// Markup supplied directly, e.g. a browser selection.
    Markup {
        html: String,
        base_url: Option<String>,
    },
}

impl ClipSource {
    /// `http(s)://` input is a URL, anything else is markup.
    pub fn detect(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            ClipSource::Url(trimmed.to_string())
        } else {
            ClipSource::Markup {
                html: input.to_string(),
                base_url: None,
            }
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            ClipSource::Url(url) => Some(url),
            ClipSource::Markup { base_url, .. } => base_url.as_deref(),
        }
    }
}

/// A request to clip one page.
#[derive(Debug, Clone)]
pub struct ClipRequest {
    pub source: ClipSource,
    /// Catalog template id; selected automatically when `None`.
    pub template: Option<String>,
    /// Extra tags, merged after the page's own.
    pub tags: Vec<String>,
    /// Caller metadata, merged over the derived metadata.
    pub metadata: Value,
    pub user_id: Option<String>,
    /// Write the rendered document to the vault.
    pub persist: bool,
}

impl ClipRequest {
    pub fn new(source: ClipSource) -> Self {
        Self {
            source,
            template: None,
            tags: Vec::new(),
            metadata: Value::Null,
            user_id: None,
            persist: false,
        }
    }

    pub fn with_template(mut self, template: Option<String>) -> Self {
        self.template = template;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_user(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn persisted(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }
}

/// Classification of a page without rendering it.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub title: String,
    pub excerpt: String,
    pub strategy: String,
    pub signals: StructuralSignals,
    pub metadata: PageMetadata,
    pub votes: Vec<Vote>,
    pub genre: Genre,
    pub keywords: Vec<KeywordScore>,
    pub template_id: &'static str,
    pub template_scores: Vec<TemplateScore>,
}

/// Declared shape of clip metadata.
pub fn metadata_shape() -> Value {
    json!({
        "title": {"type": "string", "required": true},
        "url": {"type": "string"},
        "description": {"type": "string"},
        "author": {"type": "string"},
        "tags": {"type": "array", "items": "string", "required": true},
        "keywords": {"type": "array", "items": "string"},
        "contentType": {"type": "string", "required": true},
        "readingTime": {"type": "number"},
        "images": {"type": "array"},
    })
}

/// Orchestrates the clip pipeline: fetch → parse → extract → markdown →
/// keywords + genre → template → validate → enhance (affiliate posts) →
/// render → persist.
///
/// Generic over every external dependency via traits. Each fallible stage
/// runs inside the [`Guard`], so only [`GuardError`]s reach the caller.
pub struct ClipService<F, P, X, C, W, S, L>
where
    F: Fetcher,
    P: DocumentParser,
    X: ContentExtractor,
    C: Cleaner,
    W: DocumentWriter,
    S: ClipStore,
    L: EventLog,
{
    fetcher: F,
    parser: P,
    extractor: X,
    cleaner: C,
    writer: Option<W>,
    store: Option<S>,
    guard: Guard<L>,
    templates: TemplateStore,
    corpus: KeywordCorpus,
}

impl<F, P, X, C, W, S, L> ClipService<F, P, X, C, W, S, L>
where
    F: Fetcher,
    P: DocumentParser,
    X: ContentExtractor,
    C: Cleaner,
    W: DocumentWriter,
    S: ClipStore,
    L: EventLog,
{
    /// Create a new ClipService without a vault writer or content store.
    pub fn new(fetcher: F, parser: P, extractor: X, cleaner: C, guard: Guard<L>) -> Self {
        Self {
            fetcher,
            parser,
            extractor,
            cleaner,
            writer: None,
            store: None,
            guard,
            templates: TemplateStore::builtin(),
            corpus: KeywordCorpus::new(),
        }
    }

    pub fn with_writer(mut self, writer: W) -> Self {
        self.writer = Some(writer);
        self
    }

    pub fn with_store(mut self, store: S) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_templates(mut self, templates: TemplateStore) -> Self {
        self.templates = templates;
        self
    }

    pub fn with_corpus(mut self, corpus: KeywordCorpus) -> Self {
        self.corpus = corpus;
        self
    }

    pub fn guard(&self) -> &Guard<L> {
        &self.guard
    }

    /// Run the full clip pipeline for one page.
    pub async fn clip(
        &self,
        request: ClipRequest,
        cancel: &CancellationToken,
    ) -> Result<ClipResult, GuardError> {
        let user = request.user_id.clone();
        let ctx = |service: &str, operation: &str| {
            ErrorContext::new(service, operation).with_user(user.clone())
        };

        // 1. Load
        let fetched = matches!(request.source, ClipSource::Url(_));
        let (markup, source_url) = match &request.source {
            ClipSource::Url(url) => {
                self.record("scrape_started", json!({ "url": url }), user.as_deref())
                    .await;
                tracing::info!("Fetching {}", url);
                let html: String = self
                    .guard
                    .guard(
                        ctx("scraper", "fetch").with_parameters(json!({ "url": url })),
                        cancel,
                        || self.fetcher.fetch(url),
                    )
                    .await?;
                tracing::info!("Fetched {} bytes of HTML", html.len());
                (html, Some(url.clone()))
            }
            ClipSource::Markup { html, base_url } => (html.clone(), base_url.clone()),
        };

        // 2. Parse + extract
        let document = self.parser.parse(&markup, source_url.as_deref());
        let refetch = source_url.as_deref().filter(|_| fetched);
        let content = self
            .extract(&document, refetch, user.clone(), cancel)
            .await?;
        let markdown = self.to_markdown(&content, user.clone(), cancel).await?;
        tracing::info!(
            strategy = content.strategy(),
            words = content.word_count(),
            "Extracted {} bytes of Markdown",
            markdown.len()
        );

        // 3. Keywords + genre
        let keywords = self.corpus.rank(content.body_text());
        let votes = collect_votes(&document, &content);
        let genre = resolve(&votes);
        tracing::info!(%genre, ?votes, "Classified");

        // 4. Template
        let page_tags = merge_tags(&document.metadata.tags, &request.tags);
        let template_id = match request.template.as_deref() {
            Some(id) => find_candidate(id).map(|c| c.id).ok_or_else(|| {
                GuardError::rejected(
                    AppError::TemplateError(format!("Unknown template: {id}")),
                    ctx("template", "select"),
                )
            })?,
            None => select_template(&TemplateInput {
                genre,
                keywords: &keywords,
                signals: &document.signals,
                tags: &page_tags,
                markdown: &markdown,
            }),
        };

        // 5. Metadata
        let reading_time = reading_time_minutes(content.word_count());
        let metadata = build_metadata(
            &document,
            &content,
            source_url.as_deref(),
            genre,
            &keywords,
            &page_tags,
            reading_time,
            &request.metadata,
        );
        let declared = metadata_shape();
        let mut metadata: Value = self
            .guard
            .guard(ctx("content", "validate"), cancel, || {
                ready(shape::validate(&metadata, &declared).map(|()| metadata.clone()))
            })
            .await?;

        let title = metadata
            .get("title")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or("Untitled")
            .to_string();
        let tags: Vec<String> = metadata
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| {
                tags.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        // 6. Enhance
        let body = if genre == Genre::AffiliatePost {
            let enhancement = enhance(&markdown, &keywords, &metadata, Utc::now());
            enhancement.annotate(&mut metadata);
            tracing::info!(
                products = enhancement.products.len(),
                "Enhanced affiliate post"
            );
            enhancement.markdown
        } else {
            markdown.clone()
        };

        // 7. Render
        let data = RenderData {
            title: title.clone(),
            url: source_url.clone(),
            created_at: Utc::now(),
            tags: tags.clone(),
            content: body,
            excerpt: content.excerpt().to_string(),
            genre: genre.as_str().to_string(),
            metadata: metadata.clone(),
            images: document.images.clone(),
        };
        let rendered: String = self
            .guard
            .guard(
                ctx("template", "render")
                    .with_parameters(json!({ "template": template_id, "data": &data })),
                cancel,
                || ready(self.templates.render(template_id, &data)),
            )
            .await?;

        let output = RenderedDocument {
            template_id: template_id.to_string(),
            title: title.clone(),
            file_stem: file_stem(&title),
            folder: folder_structure(genre, &keywords),
            markdown: rendered,
        };

        // 8. Persist
        let saved_path = match (&self.writer, request.persist) {
            (Some(writer), true) => {
                let path: String = self
                    .guard
                    .guard(
                        ctx("storage", "persist").with_parameters(json!({ "document": &output })),
                        cancel,
                        || writer.persist(&output),
                    )
                    .await?;
                tracing::info!(%path, "Saved document");
                Some(path)
            }
            _ => None,
        };

        let content_hash = compute_hash(&markdown);
        let clip_id = match &self.store {
            Some(store) => {
                let record = NewClipRecord {
                    url: source_url.clone(),
                    title: title.clone(),
                    content: output.markdown.clone(),
                    genre: genre.as_str().to_string(),
                    template_id: template_id.to_string(),
                    tags: tags.clone(),
                    metadata: metadata.clone(),
                    markdown_path: saved_path.clone(),
                    content_hash: content_hash.clone(),
                    status: "draft".to_string(),
                    user_id: user.clone(),
                };
                let id: Uuid = self
                    .guard
                    .guard(
                        ctx("storage", "save").with_parameters(json!({ "record": &record })),
                        cancel,
                        || store.save(&record),
                    )
                    .await?;
                (!id.is_nil()).then_some(id)
            }
            None => None,
        };

        self.corpus.append(content.body_text());
        tracing::info!(
            content_hash = %&content_hash[..8],
            template = template_id,
            ?clip_id,
            "Clip complete"
        );
        self.record(
            "content_scraped",
            json!({
                "url": source_url,
                "title": title,
                "genre": genre,
                "template": template_id,
                "path": saved_path,
            }),
            user.as_deref(),
        )
        .await;

        Ok(ClipResult {
            url: source_url,
            title,
            excerpt: content.excerpt().to_string(),
            genre,
            keywords,
            template_id: template_id.to_string(),
            tags,
            metadata,
            document: output,
            reading_time_minutes: reading_time,
            content_hash,
            strategy: content.strategy().to_string(),
            saved_path,
            clip_id,
        })
    }

    /// Classify a page and pick its template without rendering or storing
    /// anything. The keyword corpus is read but not extended.
    pub async fn analyze(
        &self,
        markup: &str,
        base_url: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Analysis, GuardError> {
        let document = self.parser.parse(markup, base_url);
        let content = self.extract(&document, None, None, cancel).await?;
        let markdown = self.to_markdown(&content, None, cancel).await?;

        let keywords = self.corpus.rank(content.body_text());

        let votes = collect_votes(&document, &content);
        let genre = resolve(&votes);
        let input = TemplateInput {
            genre,
            keywords: &keywords,
            signals: &document.signals,
            tags: &document.metadata.tags,
            markdown: &markdown,
        };
        let template_scores = score_templates(&input);
        let template_id = select_template(&input);

        Ok(Analysis {
            title: content.title().to_string(),
            excerpt: content.excerpt().to_string(),
            strategy: content.strategy().to_string(),
            signals: document.signals,
            metadata: document.metadata.clone(),
            votes,
            genre,
            keywords,
            template_id,
            template_scores,
        })
    }

    /// `refetch` is set only when the markup came from the fetcher. Supplied
    /// markup is handed to the fallback as is and never replaced by the page.
    async fn extract(
        &self,
        document: &ParsedDocument,
        refetch: Option<&str>,
        user: Option<String>,
        cancel: &CancellationToken,
    ) -> Result<ExtractedContent, GuardError> {
        let parameters = match refetch {
            Some(url) => json!({ "url": url }),
            None => json!({ "html": document.markup, "url": document.base_url }),
        };
        self.guard
            .guard(
                ErrorContext::new("scraper", "extract")
                    .with_parameters(parameters)
                    .with_user(user),
                cancel,
                || ready(self.extractor.extract(document)),
            )
            .await
    }

    async fn to_markdown(
        &self,
        content: &ExtractedContent,
        user: Option<String>,
        cancel: &CancellationToken,
    ) -> Result<String, GuardError> {
        if content.body_html().trim().is_empty() {
            return Ok(content.body_text().to_string());
        }
        self.guard
            .guard(
                ErrorContext::new("content", "clean").with_user(user),
                cancel,
                || ready(self.cleaner.clean(content.body_html())),
            )
            .await
    }

    /// Record a pipeline event. Failures are logged and ignored.
    async fn record(&self, event: &str, details: Value, user_id: Option<&str>) {
        if let Err(e) = self.guard.log().record(event, &details, user_id).await {
            tracing::warn!(%event, error = %e, "Failed to record event");
        }
    }
}

/// Page tags followed by request tags, de-duplicated case-insensitively,
/// first occurrence wins.
pub fn merge_tags(page: &[String], extra: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::new();
    for tag in page.iter().chain(extra) {
        let tag = tag.trim();
        if !tag.is_empty() && !merged.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
            merged.push(tag.to_string());
        }
    }
    merged
}

/// Metadata recorded with a clip. Caller-supplied keys win.
#[allow(clippy::too_many_arguments)]
pub fn build_metadata(
    document: &ParsedDocument,
    content: &ExtractedContent,
    url: Option<&str>,
    genre: Genre,
    keywords: &[KeywordScore],
    tags: &[String],
    reading_time: usize,
    caller: &Value,
) -> Value {
    let meta = &document.metadata;
    let mut fields = Map::new();
    fields.insert("title".into(), json!(content.title()));
    if let Some(url) = url {
        fields.insert("url".into(), json!(url));
    }
    let optional = [
        ("description", meta.description.as_ref()),
        ("ogTitle", meta.og_title.as_ref()),
        ("ogDescription", meta.og_description.as_ref()),
        ("ogImage", meta.og_image.as_ref()),
        ("author", meta.author.as_ref()),
        ("publishedTime", meta.published_time.as_ref()),
        ("modifiedTime", meta.modified_time.as_ref()),
    ];
    for (key, value) in optional {
        if let Some(value) = value {
            fields.insert(key.into(), json!(value));
        }
    }
    fields.insert("tags".into(), json!(tags));
    fields.insert(
        "keywords".into(),
        json!(keywords.iter().map(|k| &k.term).collect::<Vec<_>>()),
    );
    fields.insert("contentType".into(), json!(genre.as_str()));
    fields.insert("images".into(), json!(document.images));
    fields.insert("readingTime".into(), json!(reading_time));
    fields.insert("excerpt".into(), json!(content.excerpt()));
    fields.insert("length".into(), json!(content.body_text().chars().count()));
    fields.insert("strategy".into(), json!(content.strategy()));

    if let Some(extra) = caller.as_object() {
        for (key, value) in extra {
            fields.insert(key.clone(), value.clone());
        }
    }
    Value::Object(fields)
}
