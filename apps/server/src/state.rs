use std::{collections::HashMap, sync::Arc, time::Duration};

use beonyeok_core::{ContentStore, Pipeline, PipelineEvent, extract_video_id};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tokio::sync::{RwLock, Semaphore, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub job_id: String,
    pub status: JobStatus,
    pub url: String,
    pub video_id: String,
    pub step: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    fn is_active(&self) -> bool {
        matches!(self.status, JobStatus::Queued | JobStatus::Processing)
    }

    fn expired(&self, now: DateTime<Utc>, retention: TimeDelta) -> bool {
        self.finished_at
            .is_some_and(|finished| now - finished >= retention)
    }
}

fn step_label(event: &PipelineEvent) -> Option<&'static str> {
    match event {
        PipelineEvent::Started { .. } => Some("자막 추출 중..."),
        PipelineEvent::TranscriptExtracted { .. } => Some("번역 중..."),
        PipelineEvent::Translated { .. } => Some("요약 중..."),
        PipelineEvent::Summarized { .. } => Some("저장 중..."),
        _ => None,
    }
}

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
    jobs: Arc<RwLock<HashMap<String, Job>>>,
    permits: Arc<Semaphore>,
    webhook_secret: Option<String>,
    job_retention: TimeDelta,
}

impl AppState {
    pub fn new(
        pipeline: Arc<Pipeline>,
        max_concurrent_jobs: usize,
        webhook_secret: Option<String>,
    ) -> Self {
        Self {
            pipeline,
            jobs: Arc::default(),
            permits: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
            webhook_secret,
            job_retention: TimeDelta::hours(1),
        }
    }

    /// How long finished jobs stay in the table before they are dropped.
    pub fn with_job_retention(mut self, retention: Duration) -> Self {
        self.job_retention = TimeDelta::from_std(retention).unwrap_or(TimeDelta::MAX);
        self
    }

    pub fn store(&self) -> &Arc<dyn ContentStore> {
        self.pipeline.store()
    }

    pub fn webhook_secret(&self) -> Option<&str> {
        self.webhook_secret.as_deref()
    }

    pub async fn job(&self, job_id: &str) -> Option<Job> {
        self.jobs.read().await.get(job_id).cloned()
    }

    /// Whether a queued or running job already covers `video_id`.
    pub async fn is_in_flight(&self, video_id: &str) -> bool {
        self.jobs
            .read()
            .await
            .values()
            .any(|job| job.video_id == video_id && job.is_active())
    }

    /// Queue a pipeline run for `url` and return its job id. A video that is
    /// already queued or running keeps its job, whose id is returned instead.
    pub async fn submit(&self, url: &str, force: bool) -> Result<String> {
        let video_id = extract_video_id(url)?;
        let now = Utc::now();

        let job_id = {
            let mut jobs = self.jobs.write().await;
            let before = jobs.len();
            jobs.retain(|_, job| !job.expired(now, self.job_retention));
            if jobs.len() < before {
                debug!(evicted = before - jobs.len(), "finished jobs dropped");
            }

            if let Some(active) = jobs
                .values()
                .find(|job| job.video_id == video_id && job.is_active())
            {
                info!(job_id = %active.job_id, %video_id, "video already queued");
                return Ok(active.job_id.clone());
            }

            let job_id = Uuid::new_v4().simple().to_string()[..8].to_string();
            jobs.insert(
                job_id.clone(),
                Job {
                    job_id: job_id.clone(),
                    status: JobStatus::Queued,
                    url: url.to_string(),
                    video_id: video_id.clone(),
                    step: None,
                    error: None,
                    created_at: now,
                    finished_at: None,
                },
            );
            job_id
        };
        info!(%job_id, %video_id, "job queued");

        let state = self.clone();
        let id = job_id.clone();
        tokio::spawn(async move { state.run_job(id, video_id, force).await });

        Ok(job_id)
    }

    async fn update(&self, job_id: &str, apply: impl FnOnce(&mut Job)) {
        if let Some(job) = self.jobs.write().await.get_mut(job_id) {
            apply(job);
        }
    }

    async fn run_job(self, job_id: String, video_id: String, force: bool) {
        let Ok(_permit) = Arc::clone(&self.permits).acquire_owned().await else {
            return;
        };
        self.update(&job_id, |job| job.status = JobStatus::Processing)
            .await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let steps = {
            let state = self.clone();
            let job_id = job_id.clone();
            tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    if let Some(step) = step_label(&event) {
                        state
                            .update(&job_id, |job| job.step = Some(step.to_string()))
                            .await;
                    }
                }
            })
        };

        let result = self.pipeline.run_observed(&video_id, force, Some(tx)).await;
        let _ = steps.await;

        match result {
            Ok(_) => {
                self.update(&job_id, |job| {
                    job.status = JobStatus::Completed;
                    job.step = None;
                    job.finished_at = Some(Utc::now());
                })
                .await;
            }
            Err(err) => {
                warn!(%job_id, %video_id, error = %err, "job failed");
                self.update(&job_id, |job| {
                    job.status = JobStatus::Failed;
                    job.error = Some(err.to_string());
                    job.finished_at = Some(Utc::now());
                })
                .await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use beonyeok_core::{
        PipelineConfig, PipelineError, TextGenerator, Transcript, TranscriptSource,
        store::MemoryStore,
    };

    use super::*;

    struct Stalled;

    #[async_trait]
    impl TranscriptSource for Stalled {
        async fn fetch(&self, _video_id: &str) -> beonyeok_core::Result<Transcript> {
            std::future::pending().await
        }
    }

    #[async_trait]
    impl TextGenerator for Stalled {
        async fn generate(&self, _: &str, _: &str, _: u32) -> beonyeok_core::Result<String> {
            Err(PipelineError::upstream("text generation", "unused"))
        }
    }

    fn state() -> AppState {
        let pipeline = Pipeline::new(
            Arc::new(Stalled),
            Arc::new(Stalled),
            Arc::new(MemoryStore::new()),
            &PipelineConfig::default(),
        );
        AppState::new(Arc::new(pipeline), 1, None)
    }

    fn finished_job(job_id: &str, finished_at: DateTime<Utc>) -> Job {
        Job {
            job_id: job_id.into(),
            status: JobStatus::Completed,
            url: "https://youtu.be/aaaaaaaaaaa".into(),
            video_id: "aaaaaaaaaaa".into(),
            step: None,
            error: None,
            created_at: finished_at,
            finished_at: Some(finished_at),
        }
    }

    #[tokio::test]
    async fn resubmitting_an_active_video_returns_its_job() {
        let state = state();

        let first = state.submit("https://youtu.be/dQw4w9WgXcQ", false).await.unwrap();
        let again = state
            .submit("https://www.youtube.com/watch?v=dQw4w9WgXcQ", true)
            .await
            .unwrap();
        let other = state.submit("https://youtu.be/bbbbbbbbbbb", false).await.unwrap();

        assert_eq!(again, first);
        assert_ne!(other, first);
        assert_eq!(state.jobs.read().await.len(), 2);
    }

    #[tokio::test]
    async fn finished_jobs_are_dropped_after_retention() {
        let state = state().with_job_retention(Duration::from_secs(60));
        let now = Utc::now();
        {
            let mut jobs = state.jobs.write().await;
            jobs.insert("old00000".into(), finished_job("old00000", now - TimeDelta::minutes(5)));
            jobs.insert("new00000".into(), finished_job("new00000", now));
        }

        let job_id = state.submit("https://youtu.be/dQw4w9WgXcQ", false).await.unwrap();

        assert!(state.job("old00000").await.is_none());
        assert!(state.job("new00000").await.is_some());
        assert!(state.job(&job_id).await.is_some());
    }
}
