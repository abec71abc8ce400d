use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::AppError;
use crate::resilience::ErrorContext;

/// Boxed future returned by a fallback.
pub type FallbackFuture = Pin<Box<dyn Future<Output = Result<serde_json::Value, AppError>> + Send>>;

/// A fallback handler. Receives the failing call's context and produces a
/// replacement result as JSON.
pub type FallbackFn = Arc<dyn Fn(ErrorContext) -> FallbackFuture + Send + Sync>;

/// Fallback handlers keyed by `(service, operation)`.
#[derive(Clone, Default)]
pub struct FallbackRegistry {
    handlers: HashMap<(String, String), FallbackFn>,
}

impl FallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any previous one for the same pair.
    pub fn register<F, Fut>(&mut self, service: &str, operation: &str, handler: F)
    where
        F: Fn(ErrorContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value, AppError>> + Send + 'static,
    {
        let boxed: FallbackFn =
            Arc::new(move |ctx: ErrorContext| -> FallbackFuture { Box::pin(handler(ctx)) });
        self.handlers
            .insert((service.to_string(), operation.to_string()), boxed);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<F, Fut>(mut self, service: &str, operation: &str, handler: F) -> Self
    where
        F: Fn(ErrorContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value, AppError>> + Send + 'static,
    {
        self.register(service, operation, handler);
        self
    }

    pub fn get(&self, service: &str, operation: &str) -> Option<&FallbackFn> {
        self.handlers
            .get(&(service.to_string(), operation.to_string()))
    }

    pub fn contains(&self, service: &str, operation: &str) -> bool {
        self.get(service, operation).is_some()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for FallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<String> = self
            .handlers
            .keys()
            .map(|(s, o)| format!("{s}.{o}"))
            .collect();
        keys.sort();
        f.debug_struct("FallbackRegistry")
            .field("handlers", &keys)
            .finish()
    }
}
