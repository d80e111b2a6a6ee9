use std::{fmt, sync::Arc};

use serde::Serialize;
use tracing::{debug, info};

use crate::{
    error::{PipelineError, Result},
    retry::{RetryPolicy, with_retry},
    store::ContentStore,
    types::{ContentRecord, ContentSummary, RecordStatus},
};

/// Pipeline step a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Transcript,
    Translate,
    Summarize,
    Archive,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Transcript => "transcript",
            Stage::Translate => "translate",
            Stage::Summarize => "summarize",
            Stage::Archive => "archive",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Writes record lifecycle transitions through to a [`ContentStore`].
///
/// Every write is a full upsert keyed by `video_id`, so repeating one is harmless.
pub struct Archiver {
    store: Arc<dyn ContentStore>,
    retry: RetryPolicy,
}

impl Archiver {
    pub fn new(store: Arc<dyn ContentStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    pub fn store(&self) -> &Arc<dyn ContentStore> {
        &self.store
    }

    pub async fn lookup(&self, video_id: &str) -> Result<Option<ContentRecord>> {
        with_retry(&self.retry, "store lookup", || self.store.get(video_id)).await
    }

    /// Start a fresh lifecycle for `video_id`, keeping the `created_at` of the
    /// row it replaces.
    pub async fn begin(
        &self,
        video_id: &str,
        existing: Option<&ContentRecord>,
    ) -> Result<ContentRecord> {
        let mut record = ContentRecord::new(video_id);
        if let Some(existing) = existing {
            record.created_at = existing.created_at;
        }
        self.write(&record).await?;
        debug!(video_id, "record pending");
        Ok(record)
    }

    /// Persist partial progress after a stage finished.
    pub async fn checkpoint(&self, record: &mut ContentRecord) -> Result<()> {
        record.advance(RecordStatus::Processing)?;
        self.write(record).await
    }

    pub async fn complete(
        &self,
        record: &mut ContentRecord,
        summary: ContentSummary,
    ) -> Result<()> {
        // The in-memory record only turns terminal once the write landed, so a
        // failed write can still be recorded as `failed`.
        let mut completed = record.clone();
        completed.summary = Some(summary);
        completed.advance(RecordStatus::Completed)?;
        self.write(&completed).await?;
        *record = completed;
        info!(video_id = %record.video_id, "record completed");
        Ok(())
    }

    /// Mark the record failed, keeping whatever stages already produced.
    pub async fn fail(
        &self,
        record: &mut ContentRecord,
        stage: Stage,
        err: &PipelineError,
    ) -> Result<()> {
        record.advance(RecordStatus::Failed)?;
        record.error = Some(err.to_string());
        record.failed_stage = Some(stage.as_str().to_string());
        record.error_kind = Some(err.kind().to_string());
        self.write(record).await
    }

    async fn write(&self, record: &ContentRecord) -> Result<()> {
        with_retry(&self.retry, "store write", || self.store.upsert(record)).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::store::MemoryStore;

    fn archiver() -> (Arc<MemoryStore>, Archiver) {
        let store = Arc::new(MemoryStore::new());
        let archiver = Archiver::new(store.clone(), RetryPolicy::no_retry());
        (store, archiver)
    }

    #[tokio::test]
    async fn failure_keeps_partial_progress() {
        let (store, archiver) = archiver();
        let mut record = archiver.begin("abc123", None).await.unwrap();
        record.source_language = Some("en".into());
        record.original_transcript = Some("hello world".into());
        archiver.checkpoint(&mut record).await.unwrap();

        let err = PipelineError::upstream("text generation", "503");
        archiver
            .fail(&mut record, Stage::Translate, &err)
            .await
            .unwrap();

        let stored = store.get("abc123").await.unwrap().unwrap();
        assert_eq!(stored.status, RecordStatus::Failed);
        assert_eq!(stored.failed_stage.as_deref(), Some("translate"));
        assert_eq!(stored.error_kind.as_deref(), Some("upstream"));
        assert_eq!(stored.original_transcript.as_deref(), Some("hello world"));
        assert!(stored.korean_transcript.is_none());
        assert!(stored.error.unwrap().contains("503"));
    }

    #[tokio::test]
    async fn begin_resets_lifecycle_but_keeps_created_at() {
        let (store, archiver) = archiver();
        let mut first = archiver.begin("abc123", None).await.unwrap();
        let created_at = first.created_at - chrono::Duration::hours(1);
        first.created_at = created_at;
        first.status = RecordStatus::Failed;
        store.upsert(&first).await.unwrap();

        tokio::time::sleep(Duration::from_millis(2)).await;
        let existing = store.get("abc123").await.unwrap();
        let again = archiver.begin("abc123", existing.as_ref()).await.unwrap();

        assert_eq!(again.status, RecordStatus::Pending);
        assert_eq!(again.created_at, created_at);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn completed_record_cannot_be_failed() {
        let (_store, archiver) = archiver();
        let mut record = archiver.begin("abc123", None).await.unwrap();
        record.status = RecordStatus::Completed;

        let err = archiver
            .fail(
                &mut record,
                Stage::Archive,
                &PipelineError::persistence("disk full"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidTransition { .. }));
    }
}
