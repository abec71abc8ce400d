use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use clipper_core::error::{AppError, ErrorKind};
use clipper_core::resilience::GuardError;

use crate::dto::ErrorResponse;

/// Everything a handler can fail with.
pub enum ApiError {
    /// A direct store/config failure outside the guarded pipeline.
    App(AppError),
    /// A pipeline stage failed and could not be recovered.
    Pipeline {
        error: GuardError,
        /// Include the underlying cause in the response.
        development: bool,
    },
    BadRequest(String),
    NotFound(String),
}

impl ApiError {
    pub fn pipeline(error: GuardError, development: bool) -> Self {
        Self::Pipeline { error, development }
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self::App(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::App(err) => {
                let (status, error_type) = match &err {
                    AppError::Validation { .. } | AppError::SerializationError(_) => {
                        (StatusCode::BAD_REQUEST, "validation_error")
                    }
                    AppError::DatabaseError(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "database_error")
                    }
                    AppError::ConfigError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
                    AppError::RateLimitExceeded => {
                        (StatusCode::TOO_MANY_REQUESTS, "rate_limit_exceeded")
                    }
                    AppError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
                    _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
                };
                tracing::error!(error = %err, "Request failed");
                (
                    status,
                    ErrorResponse {
                        error: error_type.to_string(),
                        message: err.to_string(),
                        context: None,
                    },
                )
            }
            ApiError::Pipeline { error, development } => pipeline_error(&error, development),
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: "bad_request".to_string(),
                    message,
                    context: None,
                },
            ),
            ApiError::NotFound(message) => (
                StatusCode::NOT_FOUND,
                ErrorResponse {
                    error: "not_found".to_string(),
                    message,
                    context: None,
                },
            ),
        };

        (status, axum::Json(body)).into_response()
    }
}

/// Guard failures are always 5xx. Outside development the message names
/// only the failing stage and kind.
fn pipeline_error(error: &GuardError, development: bool) -> (StatusCode, ErrorResponse) {
    let ctx = error.context();
    let stage = format!("{}.{}", ctx.service, ctx.operation);

    let Some(enhanced) = error.enhanced() else {
        let body = ErrorResponse {
            error: "cancelled".to_string(),
            message: format!("{stage} was cancelled"),
            context: Some(json!({
                "service": ctx.service,
                "operation": ctx.operation,
                "user_id": ctx.user_id,
            })),
        };
        return (StatusCode::SERVICE_UNAVAILABLE, body);
    };

    let status = match enhanced.kind {
        ErrorKind::ConnectionRefused | ErrorKind::RateLimited => StatusCode::BAD_GATEWAY,
        ErrorKind::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::ValidationError | ErrorKind::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let error_type = match error {
        GuardError::RecoveryExhausted(_) => "recovery_exhausted",
        _ => "rejected",
    };

    let mut context = json!({
        "service": ctx.service,
        "operation": ctx.operation,
        "user_id": ctx.user_id,
        "kind": enhanced.kind,
        "timestamp": enhanced.timestamp,
        "attempts": enhanced.attempts,
    });
    let message = if development {
        context["cause"] = json!(enhanced.message);
        context["parameters"] = ctx.parameters.clone();
        enhanced.to_string()
    } else {
        format!("{stage} failed ({})", enhanced.kind)
    };

    tracing::error!(
        stage = %stage,
        kind = %enhanced.kind,
        attempts = enhanced.attempts,
        "Pipeline failed: {}",
        enhanced.message
    );

    (
        status,
        ErrorResponse {
            error: error_type.to_string(),
            message,
            context: Some(context),
        },
    )
}
