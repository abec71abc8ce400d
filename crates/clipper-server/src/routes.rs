use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use serde_json::{Value, json};
use url::Url;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use clipper_core::pipeline::{ClipRequest, ClipSource};
use clipper_core::template::{find_candidate, load_candidates};
use clipper_core::traits::{ClipStore, EventLog};

use crate::auth::require_api_key;
use crate::dto::{
    ClassifyRequest, ClassifyResponse, ClipRequestBody, ClipResponse, ContentListResponse,
    ContentQuery, ContentResponse, HealthResponse, LogEventResponse, LogListResponse, LogsQuery,
    RecentQuery, ScrapeRequest, TemplateListResponse, TemplateResponse,
};
use crate::error::ApiError;
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Build the full router with all routes and middleware.
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/v1/scrape", post(scrape))
        .route("/v1/clip", post(clip))
        .route("/v1/classify", post(classify))
        .route("/v1/templates", get(list_templates))
        .route("/v1/content", get(get_content))
        .route("/v1/content/recent", get(list_recent))
        .route("/v1/logs", get(list_logs))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    let public = Router::new()
        .route("/health", get(health))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    public.merge(api).with_state(state)
}

// ---------------------------------------------------------------------------
// Input validation
// ---------------------------------------------------------------------------

fn validate_url(raw: &str) -> Result<String, ApiError> {
    let parsed =
        Url::parse(raw.trim()).map_err(|e| ApiError::BadRequest(format!("Invalid URL: {e}")))?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(parsed.to_string()),
        scheme => Err(ApiError::BadRequest(format!(
            "Unsupported URL '{raw}' (scheme '{scheme}'); only http and https pages can be clipped"
        ))),
    }
}

fn validate_template(template: Option<String>) -> Result<Option<String>, ApiError> {
    match template {
        Some(id) if find_candidate(&id).is_none() => {
            Err(ApiError::BadRequest(format!("Unknown template: {id}")))
        }
        other => Ok(other),
    }
}

/// Tags are single words: no blanks, no whitespace inside.
fn validate_tags(tags: Option<Vec<String>>) -> Result<Vec<String>, ApiError> {
    let tags = tags.unwrap_or_default();
    if let Some(bad) = tags
        .iter()
        .find(|t| t.trim().is_empty() || t.trim().contains(char::is_whitespace))
    {
        return Err(ApiError::BadRequest(format!("Invalid tag: {bad:?}")));
    }
    Ok(tags)
}

fn validate_metadata(metadata: Option<Value>) -> Result<Value, ApiError> {
    match metadata {
        None | Some(Value::Null) => Ok(Value::Null),
        Some(value @ Value::Object(_)) => Ok(value),
        Some(_) => Err(ApiError::BadRequest("metadata must be a JSON object".into())),
    }
}

// ---------------------------------------------------------------------------
// Clipping
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/v1/scrape",
    request_body = ScrapeRequest,
    responses(
        (status = 200, description = "Clip result", body = ClipResponse),
        (status = 400, description = "Bad request", body = crate::dto::ErrorResponse),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Pipeline failure", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "clips"
)]
pub async fn scrape(
    State(state): State<Arc<AppState>>,
    axum::Json(body): axum::Json<ScrapeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let url = validate_url(&body.url)?;
    let template = validate_template(body.template)?;
    let tags = validate_tags(body.tags)?;
    let metadata = validate_metadata(body.metadata)?;
    let save = body.save.unwrap_or(true);

    let request = ClipRequest::new(ClipSource::Url(url))
        .with_template(template)
        .with_tags(tags)
        .with_metadata(metadata)
        .with_user(body.user_id)
        .persisted(save);

    let result = state
        .clip_service(save)
        .clip(request, &state.shutdown.child_token())
        .await
        .map_err(|e| ApiError::pipeline(e, state.development))?;

    Ok(axum::Json(ClipResponse::from(result)))
}

#[utoipa::path(
    post,
    path = "/v1/clip",
    request_body = ClipRequestBody,
    responses(
        (status = 200, description = "Clip result", body = ClipResponse),
        (status = 400, description = "Bad request", body = crate::dto::ErrorResponse),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Pipeline failure", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "clips"
)]
pub async fn clip(
    State(state): State<Arc<AppState>>,
    axum::Json(body): axum::Json<ClipRequestBody>,
) -> Result<impl IntoResponse, ApiError> {
    let template = validate_template(body.template)?;
    let tags = validate_tags(body.tags)?;
    let save = body.save.unwrap_or(true);

    let selection = body.selection.filter(|s| !s.trim().is_empty());
    let (source, mut metadata) = match (selection, body.url) {
        (Some(html), url) => {
            let base_url = url.as_deref().map(validate_url).transpose()?;
            (
                ClipSource::Markup { html, base_url },
                json!({ "isPartialContent": true }),
            )
        }
        (None, Some(url)) => (ClipSource::Url(validate_url(&url)?), json!({})),
        (None, None) => {
            return Err(ApiError::BadRequest(
                "Either url or selection is required".into(),
            ));
        }
    };
    if let Some(title) = body.title.filter(|t| !t.trim().is_empty()) {
        metadata["title"] = json!(title.trim());
    }

    let request = ClipRequest::new(source)
        .with_template(template)
        .with_tags(tags)
        .with_metadata(metadata)
        .with_user(body.user_id)
        .persisted(save);

    let result = state
        .clip_service(save)
        .clip(request, &state.shutdown.child_token())
        .await
        .map_err(|e| ApiError::pipeline(e, state.development))?;

    Ok(axum::Json(ClipResponse::from(result)))
}

#[utoipa::path(
    post,
    path = "/v1/classify",
    request_body = ClassifyRequest,
    responses(
        (status = 200, description = "Genre, keywords, and template", body = ClassifyResponse),
        (status = 400, description = "Bad request", body = crate::dto::ErrorResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "clips"
)]
pub async fn classify(
    State(state): State<Arc<AppState>>,
    axum::Json(body): axum::Json<ClassifyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if body.html.trim().is_empty() {
        return Err(ApiError::BadRequest("html must not be empty".into()));
    }
    let base_url = body.url.as_deref().map(validate_url).transpose()?;

    let analysis = state
        .clip_service(false)
        .analyze(&body.html, base_url.as_deref(), &state.shutdown.child_token())
        .await
        .map_err(|e| ApiError::pipeline(e, state.development))?;

    Ok(axum::Json(ClassifyResponse::from(analysis)))
}

// ---------------------------------------------------------------------------
// Catalog and history
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/v1/templates",
    responses(
        (status = 200, description = "Template catalog", body = TemplateListResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "templates"
)]
pub async fn list_templates() -> impl IntoResponse {
    let response = TemplateListResponse {
        templates: load_candidates().iter().map(TemplateResponse::from).collect(),
    };
    axum::Json(response)
}

#[utoipa::path(
    get,
    path = "/v1/content",
    params(ContentQuery),
    responses(
        (status = 200, description = "Latest stored clip for the URL", body = ContentResponse),
        (status = 404, description = "Not found", body = crate::dto::ErrorResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "content"
)]
pub async fn get_content(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ContentQuery>,
) -> Result<impl IntoResponse, ApiError> {
    match state.storage.get_by_url(&query.url).await? {
        Some(clip) => Ok(axum::Json(ContentResponse::from(clip))),
        None => Err(ApiError::NotFound(format!(
            "No content stored for {}",
            query.url
        ))),
    }
}

#[utoipa::path(
    get,
    path = "/v1/content/recent",
    params(RecentQuery),
    responses(
        (status = 200, description = "Stored clips, newest first", body = ContentListResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "content"
)]
pub async fn list_recent(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RecentQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query.limit.unwrap_or(20).min(200);
    let clips = state.storage.list_recent(limit).await?;
    let total = clips.len();

    Ok(axum::Json(ContentListResponse {
        clips: clips.into_iter().map(ContentResponse::from).collect(),
        total,
    }))
}

#[utoipa::path(
    get,
    path = "/v1/logs",
    params(LogsQuery),
    responses(
        (status = 200, description = "Recent events, newest first", body = LogListResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "content"
)]
pub async fn list_logs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LogsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query.limit.unwrap_or(50).min(500);
    let events = state.storage.recent(query.event.as_deref(), limit).await?;
    let total = events.len();

    let response = LogListResponse {
        events: events.into_iter().map(LogEventResponse::from).collect(),
        total,
    };

    Ok(axum::Json(response))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Service is unhealthy", body = HealthResponse),
    ),
    tag = "system"
)]
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let db_status = state.storage.health().await;

    let (status, label) = if db_status == "error" {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    } else {
        (StatusCode::OK, "healthy")
    };

    let response = HealthResponse {
        status: label,
        database: db_status,
    };

    (status, axum::Json(response))
}
