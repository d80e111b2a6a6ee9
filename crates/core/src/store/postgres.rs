use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    FromRow, PgPool,
    postgres::PgPoolOptions,
    types::Json,
};
use tracing::info;

use crate::{
    error::{PipelineError, Result},
    retry::with_timeout,
    store::ContentStore,
    types::{ContentRecord, ContentSummary, Difficulty, KeyPoint, Quote, RecordListItem},
};

const MIGRATION: &str = include_str!("../../migrations/0001_content_records.sql");

const UPSERT: &str = r#"
INSERT INTO content_records (
    video_id, video_url, status, source_language, original_transcript, korean_transcript,
    one_liner, tags, difficulty, keywords, key_points, quotes, action_items, related_topics,
    error, failed_stage, error_kind, created_at, updated_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
ON CONFLICT (video_id) DO UPDATE SET
    video_url = EXCLUDED.video_url,
    status = EXCLUDED.status,
    source_language = EXCLUDED.source_language,
    original_transcript = EXCLUDED.original_transcript,
    korean_transcript = EXCLUDED.korean_transcript,
    one_liner = EXCLUDED.one_liner,
    tags = EXCLUDED.tags,
    difficulty = EXCLUDED.difficulty,
    keywords = EXCLUDED.keywords,
    key_points = EXCLUDED.key_points,
    quotes = EXCLUDED.quotes,
    action_items = EXCLUDED.action_items,
    related_topics = EXCLUDED.related_topics,
    error = EXCLUDED.error,
    failed_stage = EXCLUDED.failed_stage,
    error_kind = EXCLUDED.error_kind,
    updated_at = EXCLUDED.updated_at
"#;

const SELECT_ONE: &str = r#"
SELECT video_id, video_url, status, source_language, original_transcript, korean_transcript,
       one_liner, tags, difficulty, keywords, key_points, quotes, action_items, related_topics,
       error, failed_stage, error_kind, created_at, updated_at
FROM content_records
WHERE video_id = $1
"#;

const SELECT_LIST: &str = r#"
SELECT video_id, status, one_liner, tags, updated_at
FROM content_records
ORDER BY updated_at DESC
"#;

/// PostgreSQL-backed store, one row per video.
pub struct PgContentStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgContentStore {
    pub async fn connect(database_url: &str, timeout: Duration) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(timeout)
            .connect(database_url)
            .await?;
        Ok(Self { pool, timeout })
    }

    /// Create the table and index if they are missing.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(MIGRATION).execute(&self.pool).await?;
        info!("content_records schema ready");
        Ok(())
    }

    fn timed_out(&self) -> PipelineError {
        PipelineError::persistence(format!(
            "database did not answer within {}s",
            self.timeout.as_secs()
        ))
    }
}

#[derive(FromRow)]
struct ContentRow {
    video_id: String,
    video_url: String,
    status: String,
    source_language: Option<String>,
    original_transcript: Option<String>,
    korean_transcript: Option<String>,
    one_liner: Option<String>,
    tags: Option<Vec<String>>,
    difficulty: Option<String>,
    keywords: Option<Vec<String>>,
    key_points: Option<Json<Vec<KeyPoint>>>,
    quotes: Option<Json<Vec<Quote>>>,
    action_items: Option<Vec<String>>,
    related_topics: Option<Vec<String>>,
    error: Option<String>,
    failed_stage: Option<String>,
    error_kind: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct ListRow {
    video_id: String,
    status: String,
    one_liner: Option<String>,
    tags: Option<Vec<String>>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ContentRow> for ContentRecord {
    type Error = PipelineError;

    fn try_from(row: ContentRow) -> Result<Self> {
        let difficulty = row.difficulty.as_deref().and_then(Difficulty::parse_label);
        let summary = match (row.one_liner, difficulty) {
            (Some(one_liner), Some(difficulty)) => Some(ContentSummary {
                one_liner,
                tags: row.tags.unwrap_or_default(),
                difficulty,
                keywords: row.keywords.unwrap_or_default(),
                key_points: row.key_points.map(|j| j.0).unwrap_or_default(),
                quotes: row.quotes.map(|j| j.0).unwrap_or_default(),
                action_items: row.action_items.unwrap_or_default(),
                related_topics: row.related_topics.unwrap_or_default(),
            }),
            _ => None,
        };

        Ok(ContentRecord {
            video_id: row.video_id,
            video_url: row.video_url,
            status: row.status.parse()?,
            source_language: row.source_language,
            original_transcript: row.original_transcript,
            korean_transcript: row.korean_transcript,
            summary,
            error: row.error,
            failed_stage: row.failed_stage,
            error_kind: row.error_kind,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl ContentStore for PgContentStore {
    async fn upsert(&self, record: &ContentRecord) -> Result<()> {
        let summary = record.summary.as_ref();
        let query = sqlx::query(UPSERT)
            .bind(&record.video_id)
            .bind(&record.video_url)
            .bind(record.status.as_str())
            .bind(&record.source_language)
            .bind(&record.original_transcript)
            .bind(&record.korean_transcript)
            .bind(summary.map(|s| s.one_liner.clone()))
            .bind(summary.map(|s| s.tags.clone()))
            .bind(summary.map(|s| s.difficulty.as_str()))
            .bind(summary.map(|s| s.keywords.clone()))
            .bind(summary.map(|s| Json(s.key_points.clone())))
            .bind(summary.map(|s| Json(s.quotes.clone())))
            .bind(summary.map(|s| s.action_items.clone()))
            .bind(summary.map(|s| s.related_topics.clone()))
            .bind(&record.error)
            .bind(&record.failed_stage)
            .bind(&record.error_kind)
            .bind(record.created_at)
            .bind(record.updated_at);

        with_timeout(
            self.timeout,
            async { query.execute(&self.pool).await.map_err(PipelineError::from) },
            || self.timed_out(),
        )
        .await?;
        Ok(())
    }

    async fn get(&self, video_id: &str) -> Result<Option<ContentRecord>> {
        let row = with_timeout(
            self.timeout,
            async {
                sqlx::query_as::<_, ContentRow>(SELECT_ONE)
                    .bind(video_id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(PipelineError::from)
            },
            || self.timed_out(),
        )
        .await?;

        row.map(ContentRecord::try_from).transpose()
    }

    async fn list(&self) -> Result<Vec<RecordListItem>> {
        let rows = with_timeout(
            self.timeout,
            async {
                sqlx::query_as::<_, ListRow>(SELECT_LIST)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(PipelineError::from)
            },
            || self.timed_out(),
        )
        .await?;

        rows.into_iter()
            .map(|row| -> Result<RecordListItem> {
                Ok(RecordListItem {
                    video_id: row.video_id,
                    status: row.status.parse()?,
                    one_liner: row.one_liner,
                    tags: row.tags.unwrap_or_default(),
                    updated_at: row.updated_at,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str, one_liner: Option<&str>, difficulty: Option<&str>) -> ContentRow {
        ContentRow {
            video_id: "abc123".into(),
            video_url: "https://www.youtube.com/watch?v=abc123".into(),
            status: status.into(),
            source_language: Some("en".into()),
            original_transcript: Some("hello".into()),
            korean_transcript: None,
            one_liner: one_liner.map(String::from),
            tags: Some(vec!["창업".into()]),
            difficulty: difficulty.map(String::from),
            keywords: None,
            key_points: Some(Json(vec![])),
            quotes: None,
            action_items: None,
            related_topics: None,
            error: None,
            failed_stage: None,
            error_kind: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn row_with_summary_columns_becomes_summary() {
        let record = ContentRecord::try_from(row("completed", Some("요약"), Some("advanced")))
            .unwrap();
        let summary = record.summary.unwrap();
        assert_eq!(summary.difficulty, Difficulty::Advanced);
        assert_eq!(summary.tags, vec!["창업"]);
        assert!(summary.quotes.is_empty());
    }

    #[test]
    fn row_without_summary_columns_has_no_summary() {
        let record = ContentRecord::try_from(row("failed", None, None)).unwrap();
        assert!(record.summary.is_none());
        assert_eq!(record.original_transcript.as_deref(), Some("hello"));
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!(ContentRecord::try_from(row("archived", None, None)).is_err());
    }
}
