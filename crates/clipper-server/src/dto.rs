use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use clipper_core::models::{ClipRecord, ClipResult, LogEvent};
use clipper_core::pipeline::Analysis;
use clipper_core::template::TemplateCandidate;

// ---------------------------------------------------------------------------
// Scrape / clip
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ScrapeRequest {
    /// Page to clip (http or https)
    pub url: String,
    /// Catalog template id; chosen automatically when absent
    pub template: Option<String>,
    /// Extra tags, merged after the page's own
    pub tags: Option<Vec<String>>,
    /// Metadata merged over the derived metadata
    pub metadata: Option<serde_json::Value>,
    /// Write to the vault and the content store (default: true)
    pub save: Option<bool>,
    pub user_id: Option<String>,
}

/// Web-clipper payload: a selection is clipped as-is, otherwise the page is
/// fetched.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ClipRequestBody {
    pub url: Option<String>,
    /// Selected markup from the page
    pub selection: Option<String>,
    pub title: Option<String>,
    pub tags: Option<Vec<String>>,
    pub template: Option<String>,
    /// Write to the vault and the content store (default: true)
    pub save: Option<bool>,
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct KeywordResponse {
    pub term: String,
    pub weight: f64,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ClipResponse {
    pub url: Option<String>,
    pub title: String,
    pub excerpt: String,
    pub genre: String,
    pub keywords: Vec<KeywordResponse>,
    pub template: String,
    pub tags: Vec<String>,
    pub metadata: serde_json::Value,
    pub markdown: String,
    pub folder: String,
    pub file_name: String,
    pub reading_time_minutes: usize,
    pub content_hash: String,
    pub strategy: String,
    pub saved_path: Option<String>,
    pub clip_id: Option<Uuid>,
}

impl From<ClipResult> for ClipResponse {
    fn from(r: ClipResult) -> Self {
        Self {
            url: r.url,
            title: r.title,
            excerpt: r.excerpt,
            genre: r.genre.as_str().to_string(),
            keywords: r
                .keywords
                .into_iter()
                .map(|k| KeywordResponse {
                    term: k.term,
                    weight: k.weight,
                })
                .collect(),
            template: r.template_id,
            tags: r.tags,
            metadata: r.metadata,
            file_name: format!("{}.md", r.document.file_stem),
            folder: r.document.folder,
            markdown: r.document.markdown,
            reading_time_minutes: r.reading_time_minutes,
            content_hash: r.content_hash,
            strategy: r.strategy,
            saved_path: r.saved_path,
            clip_id: r.clip_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Classify
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ClassifyRequest {
    /// Raw page markup
    pub html: String,
    /// Base URL for resolving relative links
    pub url: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct VoteResponse {
    pub voter: String,
    /// `null` when the voter abstained
    pub genre: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct TemplateScoreResponse {
    pub id: String,
    pub score: u32,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ClassifyResponse {
    pub title: String,
    pub excerpt: String,
    pub strategy: String,
    pub genre: String,
    pub votes: Vec<VoteResponse>,
    pub keywords: Vec<KeywordResponse>,
    pub template: String,
    pub template_scores: Vec<TemplateScoreResponse>,
    /// Structural signals and page metadata
    pub signals: serde_json::Value,
    pub metadata: serde_json::Value,
}

impl From<Analysis> for ClassifyResponse {
    fn from(a: Analysis) -> Self {
        Self {
            title: a.title,
            excerpt: a.excerpt,
            strategy: a.strategy,
            genre: a.genre.as_str().to_string(),
            votes: a
                .votes
                .iter()
                .map(|v| VoteResponse {
                    voter: format!("{:?}", v.voter).to_lowercase(),
                    genre: v.genre.map(|g| g.as_str().to_string()),
                })
                .collect(),
            keywords: a
                .keywords
                .into_iter()
                .map(|k| KeywordResponse {
                    term: k.term,
                    weight: k.weight,
                })
                .collect(),
            template: a.template_id.to_string(),
            template_scores: a
                .template_scores
                .into_iter()
                .map(|s| TemplateScoreResponse {
                    id: s.id.to_string(),
                    score: s.score,
                })
                .collect(),
            signals: serde_json::to_value(a.signals).unwrap_or_default(),
            metadata: serde_json::to_value(a.metadata).unwrap_or_default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct TemplateResponse {
    pub id: String,
    pub name: String,
    pub description: String,
    pub default_tags: Vec<String>,
}

impl From<&TemplateCandidate> for TemplateResponse {
    fn from(t: &TemplateCandidate) -> Self {
        Self {
            id: t.id.to_string(),
            name: t.name.to_string(),
            description: t.description.to_string(),
            default_tags: t.default_tags.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct TemplateListResponse {
    pub templates: Vec<TemplateResponse>,
}

// ---------------------------------------------------------------------------
// Stored content
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ContentQuery {
    pub url: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ContentResponse {
    pub id: Uuid,
    pub url: Option<String>,
    pub title: String,
    pub content: String,
    pub genre: String,
    pub template: String,
    pub tags: Vec<String>,
    pub metadata: serde_json::Value,
    pub markdown_path: Option<String>,
    pub content_hash: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<ClipRecord> for ContentResponse {
    fn from(c: ClipRecord) -> Self {
        Self {
            id: c.id,
            url: c.url,
            title: c.title,
            content: c.content,
            genre: c.genre,
            template: c.template_id,
            tags: c.tags,
            metadata: c.metadata,
            markdown_path: c.markdown_path,
            content_hash: c.content_hash,
            status: c.status,
            created_at: c.created_at,
        }
    }
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct RecentQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ContentListResponse {
    pub clips: Vec<ContentResponse>,
    pub total: usize,
}

// ---------------------------------------------------------------------------
// Event log
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct LogsQuery {
    /// Only this event kind, e.g. `error` or `content_scraped`
    pub event: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct LogEventResponse {
    pub id: Uuid,
    pub event: String,
    pub details: serde_json::Value,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<LogEvent> for LogEventResponse {
    fn from(e: LogEvent) -> Self {
        Self {
            id: e.id,
            event: e.event,
            details: e.details,
            user_id: e.user_id,
            created_at: e.created_at,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct LogListResponse {
    pub events: Vec<LogEventResponse>,
    pub total: usize,
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    /// Where the failure happened; present for pipeline failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}
