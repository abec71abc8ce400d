use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, ErrorKind};
use crate::resilience::shape;
use crate::resilience::{
    EnhancedError, ErrorContext, FallbackRegistry, GuardError, GuardState, RecoveryPolicy,
    RecoveryStrategy,
};
use crate::traits::EventLog;

/// Runs operations under the recovery policy.
///
/// Cloning is cheap; the fallback registry is shared.
#[derive(Debug, Clone)]
pub struct Guard<L: EventLog> {
    log: L,
    policy: RecoveryPolicy,
    fallbacks: Arc<FallbackRegistry>,
}

impl<L: EventLog> Guard<L> {
    pub fn new(log: L) -> Self {
        Self {
            log,
            policy: RecoveryPolicy::default(),
            fallbacks: Arc::new(FallbackRegistry::new()),
        }
    }

    pub fn with_policy(mut self, policy: RecoveryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_fallbacks(mut self, fallbacks: FallbackRegistry) -> Self {
        self.fallbacks = Arc::new(fallbacks);
        self
    }

    pub fn policy(&self) -> &RecoveryPolicy {
        &self.policy
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    /// Run `operation`, recovering from its failure if the failure kind
    /// allows it.
    ///
    /// `operation` is called once, then again for every retry. Fallback and
    /// coercion results arrive as JSON and are deserialized into `T`.
    /// Recovery waits are abandoned when `cancel` fires.
    pub async fn guard<T, F, Fut>(
        &self,
        context: ErrorContext,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T, GuardError>
    where
        T: DeserializeOwned,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        trace_state(&context, GuardState::Attempting);
        let error = match operation().await {
            Ok(value) => {
                trace_state(&context, GuardState::Succeeded);
                return Ok(value);
            }
            Err(e) => e,
        };

        trace_state(&context, GuardState::Classifying);
        self.record_failure(&context, &error).await;

        let kind = error.kind();
        let has_fallback = self
            .fallbacks
            .contains(&context.service, &context.operation);
        let strategy = RecoveryStrategy::for_kind(kind, has_fallback);
        tracing::warn!(
            service = %context.service,
            operation = %context.operation,
            %kind,
            ?strategy,
            error = %error,
            "Guarded operation failed"
        );

        if strategy != RecoveryStrategy::Reject {
            trace_state(&context, GuardState::Recovering(strategy));
        }
        let outcome = match strategy {
            RecoveryStrategy::Reject => Err(GuardError::Rejected(Box::new(EnhancedError::new(
                error,
                context.clone(),
                1,
            )))),
            RecoveryStrategy::RetryWithBackoff => {
                self.retry_with_backoff(&context, cancel, error, &mut operation)
                    .await
            }
            RecoveryStrategy::DelayAndRetry => {
                self.delay_and_retry(&context, cancel, error, &mut operation)
                    .await
            }
            RecoveryStrategy::Fallback => self.run_fallback(&context, error).await,
            RecoveryStrategy::Coerce => coerce_result(&context, error),
        };

        match &outcome {
            Ok(_) => trace_state(&context, GuardState::Succeeded),
            Err(_) => trace_state(&context, GuardState::Rejected),
        }
        outcome
    }

    async fn retry_with_backoff<T, F, Fut>(
        &self,
        context: &ErrorContext,
        cancel: &CancellationToken,
        first_error: AppError,
        operation: &mut F,
    ) -> Result<T, GuardError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let mut last_error = first_error;
        let mut attempts = 1;

        for retry in 0..self.policy.max_attempts {
            let delay = self.policy.backoff_delay(retry);
            tracing::info!(
                service = %context.service,
                operation = %context.operation,
                retry = retry + 1,
                delay_secs = delay.as_secs_f64(),
                "Retrying after backoff"
            );
            wait(delay, cancel, context).await?;

            attempts += 1;
            match operation().await {
                Ok(value) => {
                    tracing::info!(attempts, "Recovered by retry");
                    return Ok(value);
                }
                Err(e) if e.kind() == ErrorKind::ConnectionRefused => {
                    tracing::warn!(attempts, error = %e, "Retry failed");
                    last_error = e;
                }
                Err(e) => {
                    // A different failure ends the retry loop.
                    last_error = e;
                    break;
                }
            }
        }

        Err(GuardError::RecoveryExhausted(Box::new(EnhancedError::new(
            last_error,
            context.clone(),
            attempts,
        ))))
    }

    async fn delay_and_retry<T, F, Fut>(
        &self,
        context: &ErrorContext,
        cancel: &CancellationToken,
        _first_error: AppError,
        operation: &mut F,
    ) -> Result<T, GuardError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let cooldown = self.policy.rate_limit_cooldown;
        tracing::info!(
            service = %context.service,
            cooldown_secs = cooldown.as_secs_f64(),
            "Rate limited, cooling down"
        );
        wait(cooldown, cancel, context).await?;

        operation().await.map_err(|e| {
            GuardError::RecoveryExhausted(Box::new(EnhancedError::new(e, context.clone(), 2)))
        })
    }

    async fn run_fallback<T: DeserializeOwned>(
        &self,
        context: &ErrorContext,
        error: AppError,
    ) -> Result<T, GuardError> {
        let Some(fallback) = self.fallbacks.get(&context.service, &context.operation) else {
            return Err(GuardError::Rejected(Box::new(EnhancedError::new(
                error,
                context.clone(),
                1,
            ))));
        };

        let exhausted = |e: AppError| {
            GuardError::RecoveryExhausted(Box::new(EnhancedError::new(e, context.clone(), 1)))
        };
        let value = fallback(context.clone()).await.map_err(exhausted)?;
        tracing::info!(
            service = %context.service,
            operation = %context.operation,
            "Recovered by fallback"
        );
        serde_json::from_value(value).map_err(|e| exhausted(AppError::from(e)))
    }

    /// Write the failure to the event log. Logging failures are swallowed.
    async fn record_failure(&self, context: &ErrorContext, error: &AppError) {
        let details = serde_json::json!({
            "message": error.to_string(),
            "code": error.kind().code(),
            "service": context.service,
            "operation": context.operation,
            "context": context,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        if let Err(e) = self
            .log
            .record("error", &details, context.user_id.as_deref())
            .await
        {
            tracing::warn!(error = %e, "Failed to record error event");
        }
    }
}

fn coerce_result<T: DeserializeOwned>(
    context: &ErrorContext,
    error: AppError,
) -> Result<T, GuardError> {
    let AppError::Validation { data, shape: declared, .. } = &error else {
        // Classified by message only; there is no data to repair.
        return Err(GuardError::Rejected(Box::new(EnhancedError::new(
            error,
            context.clone(),
            1,
        ))));
    };

    let fixed = shape::coerce(data, declared);
    match serde_json::from_value(fixed) {
        Ok(value) => {
            tracing::info!(operation = %context.operation, "Recovered by coercion");
            Ok(value)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Coerced data still does not fit");
            Err(GuardError::RecoveryExhausted(Box::new(EnhancedError::new(
                error,
                context.clone(),
                1,
            ))))
        }
    }
}

async fn wait(
    delay: Duration,
    cancel: &CancellationToken,
    context: &ErrorContext,
) -> Result<(), GuardError> {
    tokio::select! {
        () = tokio::time::sleep(delay) => Ok(()),
        () = cancel.cancelled() => {
            tracing::info!(
                service = %context.service,
                operation = %context.operation,
                "Recovery cancelled"
            );
            Err(GuardError::Cancelled {
                context: Box::new(context.clone()),
            })
        }
    }
}

fn trace_state(context: &ErrorContext, state: GuardState) {
    tracing::debug!(
        service = %context.service,
        operation = %context.operation,
        %state,
        "Guard state"
    );
}
