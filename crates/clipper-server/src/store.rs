use clipper_core::error::AppError;
use clipper_core::models::{ClipRecord, LogEvent, NewClipRecord};
use clipper_core::traits::{ClipStore, EventLog, TracingEventLog};
use clipper_db::Database;
use uuid::Uuid;

/// Content store and event log behind the API.
///
/// Without a database the server still clips: nothing is stored, and events
/// only go to the tracing output.
#[derive(Clone)]
pub enum Storage {
    Postgres(Database),
    Disabled,
}

impl Storage {
    pub fn is_enabled(&self) -> bool {
        matches!(self, Storage::Postgres(_))
    }

    /// `"ok"`, `"error"`, or `"disabled"`.
    pub async fn health(&self) -> &'static str {
        match self {
            Storage::Postgres(db) => match db.health_check().await {
                Ok(()) => "ok",
                Err(e) => {
                    tracing::warn!(error = %e, "Database health check failed");
                    "error"
                }
            },
            Storage::Disabled => "disabled",
        }
    }
}

impl ClipStore for Storage {
    async fn save(&self, clip: &NewClipRecord) -> Result<Uuid, AppError> {
        match self {
            Storage::Postgres(db) => db.clip_repo().save(clip).await,
            Storage::Disabled => Ok(Uuid::nil()),
        }
    }

    async fn get_by_url(&self, url: &str) -> Result<Option<ClipRecord>, AppError> {
        match self {
            Storage::Postgres(db) => db.clip_repo().get_by_url(url).await,
            Storage::Disabled => Ok(None),
        }
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<ClipRecord>, AppError> {
        match self {
            Storage::Postgres(db) => db.clip_repo().list_recent(limit).await,
            Storage::Disabled => Ok(vec![]),
        }
    }
}

impl EventLog for Storage {
    async fn record(
        &self,
        event: &str,
        details: &serde_json::Value,
        user_id: Option<&str>,
    ) -> Result<(), AppError> {
        match self {
            Storage::Postgres(db) => db
                .event_log()
                .record(event, details, user_id)
                .await
                .map(|_| ()),
            Storage::Disabled => TracingEventLog.record(event, details, user_id).await,
        }
    }

    async fn recent(&self, event: Option<&str>, limit: usize) -> Result<Vec<LogEvent>, AppError> {
        match self {
            Storage::Postgres(db) => db.event_log().recent(event, limit).await,
            Storage::Disabled => Ok(vec![]),
        }
    }
}
