use std::time::Duration;

use beonyeok_core::{FeedClient, FeedEntry, types::watch_url};
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::state::AppState;

const FEED_TIMEOUT: Duration = Duration::from_secs(30);

/// Poll every channel feed on `interval` and queue uploads not yet archived.
pub fn spawn_feed_poller(
    state: AppState,
    channels: Vec<String>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let client = FeedClient::new(FEED_TIMEOUT);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            for channel_id in &channels {
                match client.fetch(channel_id).await {
                    Ok(entries) => {
                        let queued = enqueue_new(&state, &entries).await;
                        debug!(%channel_id, entries = entries.len(), queued, "feed polled");
                    }
                    Err(err) => warn!(%channel_id, error = %err, "feed poll failed"),
                }
            }
        }
    })
}

/// Submit entries whose record is absent, unfinished, or failed in a way a
/// later attempt can fix. Returns how many were queued.
pub async fn enqueue_new(state: &AppState, entries: &[FeedEntry]) -> usize {
    let mut queued = 0;
    for entry in entries {
        if state.is_in_flight(&entry.video_id).await {
            continue;
        }
        match state.store().get(&entry.video_id).await {
            Ok(Some(record)) if !record.needs_processing() => continue,
            Ok(_) => {}
            Err(err) => {
                warn!(video_id = %entry.video_id, error = %err, "store lookup failed");
                continue;
            }
        }

        match state.submit(&watch_url(&entry.video_id), false).await {
            Ok(job_id) => {
                info!(%job_id, video_id = %entry.video_id, title = %entry.title, "new upload queued");
                queued += 1;
            }
            Err(err) => warn!(video_id = %entry.video_id, ?err, "could not queue upload"),
        }
    }
    queued
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use beonyeok_core::{
        ContentRecord, ContentStore, Pipeline, PipelineConfig, PipelineError, RecordStatus,
        TextGenerator, Transcript, TranscriptSource, store::MemoryStore,
    };

    use super::*;

    struct NeverReady;

    #[async_trait]
    impl TranscriptSource for NeverReady {
        async fn fetch(&self, _video_id: &str) -> beonyeok_core::Result<Transcript> {
            std::future::pending().await
        }
    }

    #[async_trait]
    impl TextGenerator for NeverReady {
        async fn generate(&self, _: &str, _: &str, _: u32) -> beonyeok_core::Result<String> {
            Err(PipelineError::upstream("text generation", "unused"))
        }
    }

    struct NoSubtitles;

    #[async_trait]
    impl TranscriptSource for NoSubtitles {
        async fn fetch(&self, video_id: &str) -> beonyeok_core::Result<Transcript> {
            Err(PipelineError::NotFound {
                video_id: video_id.to_string(),
            })
        }
    }

    fn entry(video_id: &str) -> FeedEntry {
        FeedEntry {
            video_id: video_id.into(),
            title: "upload".into(),
            published: None,
        }
    }

    #[tokio::test]
    async fn skips_completed_and_in_flight_videos() {
        let store = Arc::new(MemoryStore::new());
        let mut done = ContentRecord::new("aaaaaaaaaaa");
        done.status = RecordStatus::Completed;
        store.upsert(&done).await.unwrap();
        let mut failed = ContentRecord::new("bbbbbbbbbbb");
        failed.status = RecordStatus::Failed;
        failed.error_kind = Some("upstream".into());
        store.upsert(&failed).await.unwrap();
        let mut no_subtitles = ContentRecord::new("ddddddddddd");
        no_subtitles.status = RecordStatus::Failed;
        no_subtitles.error_kind = Some("not_found".into());
        store.upsert(&no_subtitles).await.unwrap();

        let pipeline = Pipeline::new(
            Arc::new(NeverReady),
            Arc::new(NeverReady),
            store,
            &PipelineConfig::default(),
        );
        let state = AppState::new(Arc::new(pipeline), 1, None);

        let entries = vec![
            entry("aaaaaaaaaaa"),
            entry("bbbbbbbbbbb"),
            entry("ccccccccccc"),
            entry("ddddddddddd"),
        ];
        assert_eq!(enqueue_new(&state, &entries).await, 2);

        // both are still queued or running, so a second poll adds nothing
        assert_eq!(enqueue_new(&state, &entries).await, 0);
    }

    #[tokio::test]
    async fn video_without_subtitles_is_queued_once_across_polls() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = Pipeline::new(
            Arc::new(NoSubtitles),
            Arc::new(NeverReady),
            store.clone(),
            &PipelineConfig::default(),
        );
        let state = AppState::new(Arc::new(pipeline), 1, None);
        let entries = vec![entry("nosubs00000")];

        let mut queued = 0;
        for _ in 0..3 {
            queued += enqueue_new(&state, &entries).await;
            while state.is_in_flight("nosubs00000").await {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }

        assert_eq!(queued, 1);
        let record = store.get("nosubs00000").await.unwrap().unwrap();
        assert_eq!(record.status, RecordStatus::Failed);
        assert_eq!(record.error_kind.as_deref(), Some("not_found"));
    }
}
