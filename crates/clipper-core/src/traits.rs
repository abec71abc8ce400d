use std::future::Future;

use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    ClipRecord, ExtractedContent, LogEvent, NewClipRecord, ParsedDocument, RenderedDocument,
};

/// Fetches raw HTML content from a URL.
pub trait Fetcher: Send + Sync + Clone {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Parses raw markup into a [`ParsedDocument`].
///
/// Never fails: malformed markup yields a best-effort document with all
/// flags false and no metadata.
pub trait DocumentParser: Send + Sync + Clone {
    fn parse(&self, markup: &str, base_url: Option<&str>) -> ParsedDocument;
}

/// Pulls the primary content out of a parsed page.
pub trait ContentExtractor: Send + Sync + Clone {
    /// Returns [`AppError::ExtractionFailed`] when no strategy finds text.
    fn extract(&self, document: &ParsedDocument) -> Result<ExtractedContent, AppError>;
}

/// Converts raw HTML into clean Markdown text.
pub trait Cleaner: Send + Sync + Clone {
    fn clean(&self, html: &str) -> Result<String, AppError>;
}

/// Materializes rendered documents.
pub trait DocumentWriter: Send + Sync + Clone {
    /// Write the document under its folder. Returns the path relative to the
    /// writer's root.
    fn persist(
        &self,
        document: &RenderedDocument,
    ) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Persists and retrieves clips.
pub trait ClipStore: Send + Sync + Clone {
    /// Save a new clip. Returns the generated UUID.
    fn save(&self, clip: &NewClipRecord) -> impl Future<Output = Result<Uuid, AppError>> + Send;

    /// Most recent clip for a source URL.
    fn get_by_url(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<Option<ClipRecord>, AppError>> + Send;

    /// Recent clips, newest first.
    fn list_recent(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<ClipRecord>, AppError>> + Send;
}

/// Append-only event log.
pub trait EventLog: Send + Sync + Clone {
    fn record(
        &self,
        event: &str,
        details: &serde_json::Value,
        user_id: Option<&str>,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Recent events, newest first, optionally filtered by event name.
    fn recent(
        &self,
        event: Option<&str>,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<LogEvent>, AppError>> + Send;
}

/// A no-op store and log for use when persistence is not needed.
#[derive(Debug, Clone)]
pub struct NullStore;

impl ClipStore for NullStore {
    async fn save(&self, _clip: &NewClipRecord) -> Result<Uuid, AppError> {
        Ok(Uuid::nil())
    }

    async fn get_by_url(&self, _url: &str) -> Result<Option<ClipRecord>, AppError> {
        Ok(None)
    }

    async fn list_recent(&self, _limit: usize) -> Result<Vec<ClipRecord>, AppError> {
        Ok(vec![])
    }
}

impl EventLog for NullStore {
    async fn record(
        &self,
        _event: &str,
        _details: &serde_json::Value,
        _user_id: Option<&str>,
    ) -> Result<(), AppError> {
        Ok(())
    }

    async fn recent(&self, _event: Option<&str>, _limit: usize) -> Result<Vec<LogEvent>, AppError> {
        Ok(vec![])
    }
}

/// Event log that only emits `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventLog;

impl EventLog for TracingEventLog {
    async fn record(
        &self,
        event: &str,
        details: &serde_json::Value,
        user_id: Option<&str>,
    ) -> Result<(), AppError> {
        tracing::info!(%event, ?user_id, %details, "Event recorded");
        Ok(())
    }

    async fn recent(&self, _event: Option<&str>, _limit: usize) -> Result<Vec<LogEvent>, AppError> {
        Ok(vec![])
    }
}
