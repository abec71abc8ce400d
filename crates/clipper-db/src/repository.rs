use chrono::{DateTime, Utc};
use clipper_core::error::AppError;
use clipper_core::models::{ClipRecord, NewClipRecord};
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

/// Repository for clips in PostgreSQL.
#[derive(Clone)]
pub struct ClipRepository {
    pool: Pool<Postgres>,
}

impl ClipRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Save a new clip. Returns the generated UUID.
    pub async fn save(&self, clip: &NewClipRecord) -> Result<Uuid, AppError> {
        let row: (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO clips (url, title, content, genre, template_id, tags, metadata,
                               markdown_path, content_hash, status, user_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id
            "#,
        )
        .bind(&clip.url)
        .bind(&clip.title)
        .bind(&clip.content)
        .bind(&clip.genre)
        .bind(&clip.template_id)
        .bind(&clip.tags)
        .bind(&clip.metadata)
        .bind(&clip.markdown_path)
        .bind(&clip.content_hash)
        .bind(&clip.status)
        .bind(&clip.user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        tracing::debug!(id = %row.0, "Clip saved");
        Ok(row.0)
    }

    /// Most recent clip for a source URL.
    pub async fn get_by_url(&self, url: &str) -> Result<Option<ClipRecord>, AppError> {
        let row = sqlx::query_as::<_, ClipRow>(
            r#"
            SELECT id, url, title, content, genre, template_id, tags, metadata,
                   markdown_path, content_hash, status, user_id, created_at
            FROM clips
            WHERE url = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(row.map(Into::into))
    }

    /// Recent clips across all sources, newest first.
    pub async fn list_recent(&self, limit: usize) -> Result<Vec<ClipRecord>, AppError> {
        let rows = sqlx::query_as::<_, ClipRow>(
            r#"
            SELECT id, url, title, content, genre, template_id, tags, metadata,
                   markdown_path, content_hash, status, user_id, created_at
            FROM clips
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Clip history for one source URL, newest first.
    pub async fn get_history(&self, url: &str, limit: usize) -> Result<Vec<ClipRecord>, AppError> {
        let rows = sqlx::query_as::<_, ClipRow>(
            r#"
            SELECT id, url, title, content, genre, template_id, tags, metadata,
                   markdown_path, content_hash, status, user_id, created_at
            FROM clips
            WHERE url = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(url)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct ClipRow {
    id: Uuid,
    url: Option<String>,
    title: String,
    content: String,
    genre: String,
    template_id: String,
    tags: Vec<String>,
    metadata: serde_json::Value,
    markdown_path: Option<String>,
    content_hash: String,
    status: String,
    user_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<ClipRow> for ClipRecord {
    fn from(row: ClipRow) -> Self {
        ClipRecord {
            id: row.id,
            url: row.url,
            title: row.title,
            content: row.content,
            genre: row.genre,
            template_id: row.template_id,
            tags: row.tags,
            metadata: row.metadata,
            markdown_path: row.markdown_path,
            content_hash: row.content_hash,
            status: row.status,
            user_id: row.user_id,
            created_at: row.created_at,
        }
    }
}

// -- Trait implementation --

impl clipper_core::traits::ClipStore for ClipRepository {
    async fn save(&self, clip: &NewClipRecord) -> Result<Uuid, AppError> {
        ClipRepository::save(self, clip).await
    }

    async fn get_by_url(&self, url: &str) -> Result<Option<ClipRecord>, AppError> {
        ClipRepository::get_by_url(self, url).await
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<ClipRecord>, AppError> {
        ClipRepository::list_recent(self, limit).await
    }
}
