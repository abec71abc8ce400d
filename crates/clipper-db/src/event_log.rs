use chrono::{DateTime, Utc};
use clipper_core::error::AppError;
use clipper_core::models::LogEvent;
use sqlx::PgPool;
use uuid::Uuid;

/// Append-only event log in the `event_logs` table.
#[derive(Clone)]
pub struct EventLogRepository {
    pool: PgPool,
}

impl EventLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append an event. Returns the generated UUID.
    pub async fn record(
        &self,
        event: &str,
        details: &serde_json::Value,
        user_id: Option<&str>,
    ) -> Result<Uuid, AppError> {
        let row: (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO event_logs (event, details, user_id)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(event)
        .bind(details)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(row.0)
    }

    /// Recent events, newest first. `event = None` returns every kind.
    pub async fn recent(&self, event: Option<&str>, limit: usize) -> Result<Vec<LogEvent>, AppError> {
        let rows = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT id, event, details, user_id, created_at
            FROM event_logs
            WHERE $1::VARCHAR IS NULL OR event = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(event)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Delete events older than `before`. Returns the number removed.
    pub async fn prune(&self, before: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM event_logs WHERE created_at < $1")
            .bind(before)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(result.rows_affected())
    }
}

#[derive(sqlx::FromRow)]
struct EventRow {
    id: Uuid,
    event: String,
    details: serde_json::Value,
    user_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<EventRow> for LogEvent {
    fn from(row: EventRow) -> Self {
        LogEvent {
            id: row.id,
            event: row.event,
            details: row.details,
            user_id: row.user_id,
            created_at: row.created_at,
        }
    }
}

impl clipper_core::traits::EventLog for EventLogRepository {
    async fn record(
        &self,
        event: &str,
        details: &serde_json::Value,
        user_id: Option<&str>,
    ) -> Result<(), AppError> {
        EventLogRepository::record(self, event, details, user_id)
            .await
            .map(|_| ())
    }

    async fn recent(&self, event: Option<&str>, limit: usize) -> Result<Vec<LogEvent>, AppError> {
        EventLogRepository::recent(self, event, limit).await
    }
}
