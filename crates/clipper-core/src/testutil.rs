//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    ClipRecord, ExtractedContent, LogEvent, NewClipRecord, ParsedDocument, RenderedDocument,
};
use crate::traits::{
    Cleaner, ClipStore, ContentExtractor, DocumentParser, DocumentWriter, EventLog, Fetcher,
};

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Mock fetcher that returns a configurable response.
#[derive(Clone)]
pub struct MockFetcher {
    /// Queue of responses. Each call pops the first element.
    /// If empty, returns a default HTML string.
    responses: Arc<Mutex<Vec<Result<String, AppError>>>>,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl MockFetcher {
    pub fn new(html: &str) -> Self {
        Self::with_responses(vec![Ok(html.to_string())])
    }

    pub fn with_error(error: AppError) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    pub fn with_responses(responses: Vec<Result<String, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        self.calls.lock().unwrap().push(url.to_string());
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok("<html><body>default</body></html>".to_string())
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockParser
// ---------------------------------------------------------------------------

/// Mock parser that returns a preset document with the given markup.
#[derive(Clone, Default)]
pub struct MockParser {
    template: Arc<ParsedDocument>,
}

impl MockParser {
    /// Parser whose documents carry no signals.
    pub fn plain() -> Self {
        Self::default()
    }

    /// Parser that returns `document` (markup and base URL replaced).
    pub fn with_document(document: ParsedDocument) -> Self {
        Self {
            template: Arc::new(document),
        }
    }
}

impl DocumentParser for MockParser {
    fn parse(&self, markup: &str, base_url: Option<&str>) -> ParsedDocument {
        ParsedDocument {
            markup: markup.to_string(),
            base_url: base_url.map(str::to_string),
            ..(*self.template).clone()
        }
    }
}

// ---------------------------------------------------------------------------
// MockExtractor
// ---------------------------------------------------------------------------

/// Mock extractor. Pops queued results; when the queue is empty, uses the
/// document's markup as the body text.
#[derive(Clone)]
pub struct MockExtractor {
    responses: Arc<Mutex<Vec<Result<ExtractedContent, AppError>>>>,
}

impl MockExtractor {
    pub fn from_markup() -> Self {
        Self::with_responses(vec![])
    }

    pub fn new(title: &str, text: &str) -> Self {
        let content = ExtractedContent::new(title, format!("<p>{text}</p>"), text, text, "mock");
        Self::with_responses(vec![content])
    }

    pub fn with_error(error: AppError) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    pub fn with_responses(responses: Vec<Result<ExtractedContent, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
        }
    }
}

impl ContentExtractor for MockExtractor {
    fn extract(&self, document: &ParsedDocument) -> Result<ExtractedContent, AppError> {
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            ExtractedContent::new(
                "Mock title",
                document.markup.clone(),
                document.markup.clone(),
                "",
                "mock",
            )
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockCleaner
// ---------------------------------------------------------------------------

/// Mock cleaner that applies a simple transformation.
#[derive(Clone)]
pub struct MockCleaner {
    error: Arc<Mutex<Option<AppError>>>,
}

impl MockCleaner {
    /// Creates a cleaner that returns the input unchanged.
    pub fn passthrough() -> Self {
        Self {
            error: Arc::new(Mutex::new(None)),
        }
    }

    /// Creates a cleaner that returns an error.
    pub fn with_error(error: AppError) -> Self {
        Self {
            error: Arc::new(Mutex::new(Some(error))),
        }
    }
}

impl Cleaner for MockCleaner {
    fn clean(&self, html: &str) -> Result<String, AppError> {
        let mut err = self.error.lock().unwrap();
        if let Some(e) = err.take() {
            return Err(e);
        }
        Ok(html.to_string())
    }
}

// ---------------------------------------------------------------------------
// MockWriter
// ---------------------------------------------------------------------------

/// Mock document writer that records documents instead of writing them.
#[derive(Clone)]
pub struct MockWriter {
    pub written: Arc<Mutex<Vec<RenderedDocument>>>,
    errors: Arc<Mutex<Vec<AppError>>>,
}

impl MockWriter {
    pub fn new() -> Self {
        Self::with_errors(vec![])
    }

    /// Writer that fails once per queued error before succeeding.
    pub fn with_errors(errors: Vec<AppError>) -> Self {
        Self {
            written: Arc::new(Mutex::new(Vec::new())),
            errors: Arc::new(Mutex::new(errors)),
        }
    }
}

impl Default for MockWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentWriter for MockWriter {
    async fn persist(&self, document: &RenderedDocument) -> Result<String, AppError> {
        {
            let mut errors = self.errors.lock().unwrap();
            if !errors.is_empty() {
                return Err(errors.remove(0));
            }
        }
        self.written.lock().unwrap().push(document.clone());
        Ok(document.relative_path())
    }
}

// ---------------------------------------------------------------------------
// MockStore
// ---------------------------------------------------------------------------

/// Mock store that records saves and returns a configurable latest clip.
#[derive(Clone)]
pub struct MockStore {
    pub saved: Arc<Mutex<Vec<NewClipRecord>>>,
    latest: Arc<Mutex<Option<ClipRecord>>>,
    save_error: Arc<Mutex<Option<AppError>>>,
}

impl MockStore {
    pub fn empty() -> Self {
        Self {
            saved: Arc::new(Mutex::new(Vec::new())),
            latest: Arc::new(Mutex::new(None)),
            save_error: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_latest(clip: ClipRecord) -> Self {
        let store = Self::empty();
        *store.latest.lock().unwrap() = Some(clip);
        store
    }

    /// Store that returns an error on save.
    pub fn with_save_error(error: AppError) -> Self {
        let store = Self::empty();
        *store.save_error.lock().unwrap() = Some(error);
        store
    }
}

impl ClipStore for MockStore {
    async fn save(&self, clip: &NewClipRecord) -> Result<Uuid, AppError> {
        let mut err = self.save_error.lock().unwrap();
        if let Some(e) = err.take() {
            return Err(e);
        }
        self.saved.lock().unwrap().push(clip.clone());
        Ok(Uuid::new_v4())
    }

    async fn get_by_url(&self, url: &str) -> Result<Option<ClipRecord>, AppError> {
        Ok(self
            .latest
            .lock()
            .unwrap()
            .clone()
            .filter(|c| c.url.as_deref() == Some(url)))
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<ClipRecord>, AppError> {
        Ok(self.latest.lock().unwrap().iter().take(limit).cloned().collect())
    }
}

// ---------------------------------------------------------------------------
// MockEventLog
// ---------------------------------------------------------------------------

/// Recorded event: (event, details, user_id).
pub type RecordedEvent = (String, serde_json::Value, Option<String>);

/// Mock event log that keeps events in memory.
#[derive(Clone, Debug, Default)]
pub struct MockEventLog {
    events: Arc<Mutex<Vec<RecordedEvent>>>,
    failing: bool,
}

impl MockEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log whose `record` always fails.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn events_named(&self, event: &str) -> Vec<RecordedEvent> {
        self.events()
            .into_iter()
            .filter(|(name, _, _)| name == event)
            .collect()
    }
}

impl EventLog for MockEventLog {
    async fn record(
        &self,
        event: &str,
        details: &serde_json::Value,
        user_id: Option<&str>,
    ) -> Result<(), AppError> {
        if self.failing {
            return Err(AppError::DatabaseError("log table unavailable".into()));
        }
        self.events.lock().unwrap().push((
            event.to_string(),
            details.clone(),
            user_id.map(str::to_string),
        ));
        Ok(())
    }

    async fn recent(&self, event: Option<&str>, limit: usize) -> Result<Vec<LogEvent>, AppError> {
        Ok(self
            .events()
            .into_iter()
            .rev()
            .filter(|(name, _, _)| event.is_none_or(|e| e == name.as_str()))
            .take(limit)
            .map(|(event, details, user_id)| LogEvent {
                id: Uuid::new_v4(),
                event,
                details,
                user_id,
                created_at: Utc::now(),
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Create a test ClipRecord for a URL.
pub fn make_test_clip(url: &str) -> ClipRecord {
    ClipRecord {
        id: Uuid::new_v4(),
        url: Some(url.to_string()),
        title: "Test".into(),
        content: "# Test".into(),
        genre: "blog_post".into(),
        template_id: "blog-post".into(),
        tags: vec![],
        metadata: serde_json::json!({}),
        markdown_path: None,
        content_hash: "abc123".into(),
        status: "draft".into(),
        user_id: None,
        created_at: Utc::now(),
    }
}
