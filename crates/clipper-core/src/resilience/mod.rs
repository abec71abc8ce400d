//! Error classification and recovery dispatch.
//!
//! Every pipeline stage runs inside [`Guard::guard`]. A failure is logged,
//! classified into an [`ErrorKind`], and handed to exactly one recovery
//! strategy:
//!
//! ```text
//! ATTEMPTING --ok--> SUCCEEDED
//!     |
//!   [err]
//!     v
//! CLASSIFYING --reject--> REJECTED
//!     |
//!  [strategy]
//!     v
//! RECOVERING --ok--> SUCCEEDED
//!     |
//!     +--exhausted--> REJECTED (RecoveryExhausted)
//! ```
//!
//! | kind               | strategy                                   |
//! |--------------------|--------------------------------------------|
//! | ConnectionRefused  | retry up to 3 times, waiting 2^attempt s   |
//! | RateLimited        | wait 5 s, retry once                       |
//! | ServiceUnavailable | registered fallback, else reject           |
//! | ValidationError    | coerce data toward its declared shape      |
//! | Unknown            | reject                                     |

mod fallback;
mod guard;
pub mod shape;

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::error::{AppError, ErrorKind};

pub use fallback::{FallbackFn, FallbackFuture, FallbackRegistry};
pub use guard::Guard;

/// Where a guarded call happened.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorContext {
    pub service: String,
    pub operation: String,
    pub parameters: serde_json::Value,
    pub user_id: Option<String>,
}

impl ErrorContext {
    pub fn new(service: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            operation: operation.into(),
            parameters: serde_json::Value::Null,
            user_id: None,
        }
    }

    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_user(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }
}

/// Recovery strategy chosen for a classified failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStrategy {
    RetryWithBackoff,
    DelayAndRetry,
    Fallback,
    Coerce,
    Reject,
}

impl RecoveryStrategy {
    /// Strategy for a failure kind. `has_fallback` tells whether the failing
    /// `(service, operation)` pair has a registered fallback.
    pub fn for_kind(kind: ErrorKind, has_fallback: bool) -> Self {
        match kind {
            ErrorKind::ConnectionRefused => RecoveryStrategy::RetryWithBackoff,
            ErrorKind::RateLimited => RecoveryStrategy::DelayAndRetry,
            ErrorKind::ServiceUnavailable if has_fallback => RecoveryStrategy::Fallback,
            ErrorKind::ValidationError => RecoveryStrategy::Coerce,
            ErrorKind::ServiceUnavailable | ErrorKind::Unknown => RecoveryStrategy::Reject,
        }
    }
}

/// States of a guarded call, for tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Attempting,
    Classifying,
    Recovering(RecoveryStrategy),
    Succeeded,
    Rejected,
}

impl std::fmt::Display for GuardState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GuardState::Attempting => write!(f, "attempting"),
            GuardState::Classifying => write!(f, "classifying"),
            GuardState::Recovering(strategy) => write!(f, "recovering({strategy:?})"),
            GuardState::Succeeded => write!(f, "succeeded"),
            GuardState::Rejected => write!(f, "rejected"),
        }
    }
}

/// Timing knobs for recovery.
#[derive(Debug, Clone)]
pub struct RecoveryPolicy {
    /// Retries after a refused connection.
    pub max_attempts: u32,
    /// Backoff base; the wait before retry `n` (from 0) is `base * 2^n`.
    pub base_delay: Duration,
    /// Wait before the single retry after a rate limit.
    pub rate_limit_cooldown: Duration,
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            rate_limit_cooldown: Duration::from_secs(5),
        }
    }
}

impl RecoveryPolicy {
    /// Wait before retry `attempt` (0-indexed).
    ///
    /// - Attempt 0: 1 second
    /// - Attempt 1: 2 seconds
    /// - Attempt 2: 4 seconds
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Read overrides from environment variables.
    ///
    /// - `CLIPPER_RETRY_MAX_ATTEMPTS` (optional, defaults to 3)
    /// - `CLIPPER_RETRY_BASE_SECS` (optional, defaults to 1)
    /// - `CLIPPER_RATE_LIMIT_COOLDOWN_SECS` (optional, defaults to 5)
    pub fn from_env() -> Result<Self, AppError> {
        let defaults = Self::default();
        Ok(Self {
            max_attempts: env_u64("CLIPPER_RETRY_MAX_ATTEMPTS")?
                .map(|v| u32::try_from(v).unwrap_or(u32::MAX))
                .unwrap_or(defaults.max_attempts),
            base_delay: env_u64("CLIPPER_RETRY_BASE_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.base_delay),
            rate_limit_cooldown: env_u64("CLIPPER_RATE_LIMIT_COOLDOWN_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.rate_limit_cooldown),
        })
    }
}

fn env_u64(name: &str) -> Result<Option<u64>, AppError> {
    match std::env::var(name) {
        Err(_) => Ok(None),
        Ok(raw) => raw.parse().map(Some).map_err(|_| {
            AppError::ConfigError(format!(
                "Invalid {name} '{raw}': must be a non-negative integer"
            ))
        }),
    }
}

/// A failure that could not be recovered, with everything known about it.
#[derive(Debug, Serialize)]
pub struct EnhancedError {
    pub message: String,
    pub kind: ErrorKind,
    pub context: ErrorContext,
    pub timestamp: DateTime<Utc>,
    /// Operation attempts made, the first one included.
    pub attempts: u32,
    pub recoverable: bool,
    #[serde(skip)]
    pub source: AppError,
}

impl EnhancedError {
    pub fn new(source: AppError, context: ErrorContext, attempts: u32) -> Self {
        Self {
            message: source.to_string(),
            kind: source.kind(),
            context,
            timestamp: Utc::now(),
            attempts,
            recoverable: false,
            source,
        }
    }
}

impl std::fmt::Display for EnhancedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{} failed ({}): {}",
            self.context.service, self.context.operation, self.kind, self.message
        )
    }
}

impl std::error::Error for EnhancedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Errors surfaced by [`Guard::guard`].
#[derive(Error, Debug)]
pub enum GuardError {
    /// The failure kind has no recovery, or recovery was not applicable.
    #[error("rejected: {0}")]
    Rejected(Box<EnhancedError>),

    /// Recovery ran and failed.
    #[error("recovery exhausted after {} attempts: {}", .0.attempts, .0)]
    RecoveryExhausted(Box<EnhancedError>),

    /// A recovery wait was abandoned.
    #[error("cancelled while recovering {}.{}", .context.service, .context.operation)]
    Cancelled { context: Box<ErrorContext> },
}

impl GuardError {
    /// Reject without attempting recovery.
    pub fn rejected(source: AppError, context: ErrorContext) -> Self {
        GuardError::Rejected(Box::new(EnhancedError::new(source, context, 1)))
    }

    pub fn enhanced(&self) -> Option<&EnhancedError> {
        match self {
            GuardError::Rejected(e) | GuardError::RecoveryExhausted(e) => Some(e),
            GuardError::Cancelled { .. } => None,
        }
    }

    pub fn context(&self) -> &ErrorContext {
        match self {
            GuardError::Rejected(e) | GuardError::RecoveryExhausted(e) => &e.context,
            GuardError::Cancelled { context } => context,
        }
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        self.enhanced().map(|e| e.kind)
    }
}
