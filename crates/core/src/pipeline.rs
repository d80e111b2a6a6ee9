use std::{
    collections::HashMap,
    sync::{Arc, Mutex as StdMutex},
};

use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard, mpsc};
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::{
    archiver::{Archiver, Stage},
    config::PipelineConfig,
    error::{PipelineError, Result},
    generation::TextGenerator,
    retry::{RetryPolicy, with_retry},
    store::ContentStore,
    summarizer::Summarizer,
    transcript::TranscriptSource,
    translator::Translator,
    types::{ContentRecord, Difficulty, RecordStatus},
};

/// Progress notifications for whoever drives a run (spinners, job tables).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    Started {
        run_id: Uuid,
        video_id: String,
    },
    TranscriptExtracted {
        run_id: Uuid,
        language: String,
        chars: usize,
        duration_minutes: f64,
    },
    Translated {
        run_id: Uuid,
        chars: usize,
    },
    Summarized {
        run_id: Uuid,
        one_liner: String,
        difficulty: Difficulty,
    },
    Completed {
        run_id: Uuid,
        video_id: String,
    },
    Failed {
        run_id: Uuid,
        stage: Stage,
        message: String,
    },
    Cached {
        video_id: String,
    },
}

impl PipelineEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            PipelineEvent::Started { .. } => "started",
            PipelineEvent::TranscriptExtracted { .. } => "transcript_extracted",
            PipelineEvent::Translated { .. } => "translated",
            PipelineEvent::Summarized { .. } => "summarized",
            PipelineEvent::Completed { .. } => "completed",
            PipelineEvent::Failed { .. } => "failed",
            PipelineEvent::Cached { .. } => "cached",
        }
    }
}

pub type EventSender = mpsc::UnboundedSender<PipelineEvent>;

struct Progress(Option<EventSender>);

impl Progress {
    fn emit(&self, event: PipelineEvent) {
        if let Some(tx) = &self.0 {
            // A receiver that went away only loses progress output.
            let _ = tx.send(event);
        }
    }
}

fn at(stage: Stage) -> impl Fn(PipelineError) -> (Stage, PipelineError) {
    move |err| (stage, err)
}

/// One lock per video id, so runs for the same video happen one after another.
#[derive(Default)]
struct RunLocks(StdMutex<HashMap<String, Arc<Mutex<()>>>>);

impl RunLocks {
    async fn acquire(&self, video_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            // Only the map holds idle locks.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(video_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }
}

/// Transcript → Korean translation → structured summary → archive, for one video.
pub struct Pipeline {
    transcripts: Arc<dyn TranscriptSource>,
    translator: Translator,
    summarizer: Summarizer,
    archiver: Archiver,
    retry: RetryPolicy,
    running: RunLocks,
}

impl Pipeline {
    pub fn new(
        transcripts: Arc<dyn TranscriptSource>,
        generator: Arc<dyn TextGenerator>,
        store: Arc<dyn ContentStore>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            transcripts,
            translator: Translator::new(
                Arc::clone(&generator),
                config.retry,
                config.translation_max_tokens,
            ),
            summarizer: Summarizer::new(generator, config.retry, config.summary_max_tokens),
            archiver: Archiver::new(store, config.retry),
            retry: config.retry,
            running: RunLocks::default(),
        }
    }

    pub fn store(&self) -> &Arc<dyn ContentStore> {
        self.archiver.store()
    }

    pub async fn run(&self, video_id: &str, force: bool) -> Result<ContentRecord> {
        self.run_observed(video_id, force, None).await
    }

    /// Run every stage for `video_id`, reporting progress on `events`.
    ///
    /// A completed record is returned as-is unless `force` is set. Otherwise
    /// the row starts a fresh lifecycle and ends `completed` or `failed`.
    /// A second run for a video that is already running waits for the first
    /// to finish, so it usually ends as a cache hit.
    #[instrument(skip(self, events), fields(run_id = tracing::field::Empty))]
    pub async fn run_observed(
        &self,
        video_id: &str,
        force: bool,
        events: Option<EventSender>,
    ) -> Result<ContentRecord> {
        let progress = Progress(events);
        let _running = self.running.acquire(video_id).await;

        let existing = self.archiver.lookup(video_id).await?;
        if !force
            && let Some(existing) = &existing
            && existing.status == RecordStatus::Completed
        {
            info!("already archived, skipping");
            progress.emit(PipelineEvent::Cached {
                video_id: video_id.to_string(),
            });
            return Ok(existing.clone());
        }

        let run_id = Uuid::new_v4();
        tracing::Span::current().record("run_id", tracing::field::display(run_id));
        progress.emit(PipelineEvent::Started {
            run_id,
            video_id: video_id.to_string(),
        });

        let mut record = match self.archiver.begin(video_id, existing.as_ref()).await {
            Ok(record) => record,
            Err(err) => {
                progress.emit(PipelineEvent::Failed {
                    run_id,
                    stage: Stage::Archive,
                    message: err.to_string(),
                });
                return Err(err);
            }
        };

        match self.process(run_id, &mut record, &progress).await {
            Ok(()) => {
                progress.emit(PipelineEvent::Completed {
                    run_id,
                    video_id: video_id.to_string(),
                });
                Ok(record)
            }
            Err((stage, err)) => {
                error!(%stage, error = %err, "pipeline failed");
                if let Err(write_err) = self.archiver.fail(&mut record, stage, &err).await {
                    error!(error = %write_err, "could not record the failure");
                }
                progress.emit(PipelineEvent::Failed {
                    run_id,
                    stage,
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    async fn process(
        &self,
        run_id: Uuid,
        record: &mut ContentRecord,
        progress: &Progress,
    ) -> std::result::Result<(), (Stage, PipelineError)> {
        let video_id = record.video_id.clone();

        let transcript = with_retry(&self.retry, "transcript", || {
            self.transcripts.fetch(&video_id)
        })
        .await
        .map_err(at(Stage::Transcript))?;

        info!(
            language = %transcript.language,
            segments = transcript.segments.len(),
            "transcript extracted"
        );
        progress.emit(PipelineEvent::TranscriptExtracted {
            run_id,
            language: transcript.language.clone(),
            chars: transcript.text.chars().count(),
            duration_minutes: transcript.duration_minutes(),
        });

        record.source_language = Some(transcript.language.clone());
        record.original_transcript = Some(transcript.text.clone());
        self.archiver
            .checkpoint(record)
            .await
            .map_err(at(Stage::Archive))?;

        let korean = self
            .translator
            .translate(&transcript.text)
            .await
            .map_err(at(Stage::Translate))?;
        progress.emit(PipelineEvent::Translated {
            run_id,
            chars: korean.chars().count(),
        });

        record.korean_transcript = Some(korean.clone());
        self.archiver
            .checkpoint(record)
            .await
            .map_err(at(Stage::Archive))?;

        let summary = self
            .summarizer
            .summarize(&korean)
            .await
            .map_err(at(Stage::Summarize))?;
        progress.emit(PipelineEvent::Summarized {
            run_id,
            one_liner: summary.one_liner.clone(),
            difficulty: summary.difficulty,
        });

        self.archiver
            .complete(record, summary)
            .await
            .map_err(at(Stage::Archive))
    }
}
