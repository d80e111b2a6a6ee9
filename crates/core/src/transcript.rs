use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::{fs, process::Command};
use tracing::{debug, info};

use crate::{
    error::{PipelineError, Result},
    retry::with_timeout,
    types::{Segment, Transcript, watch_url},
};

const SERVICE: &str = "transcript";

/// yt-dlp's suffix for the speech recognition track in the spoken language.
/// Other automatic tracks are machine translations of it.
const ORIGINAL_ASR_SUFFIX: &str = "-orig";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Captions {
    Uploaded,
    Automatic,
}

#[async_trait]
pub trait TranscriptSource: Send + Sync {
    /// Fetch the subtitle text of a video in its original language.
    async fn fetch(&self, video_id: &str) -> Result<Transcript>;
}

/// Pulls subtitles with yt-dlp, never downloading the video itself.
pub struct YtDlpTranscriptSource {
    binary: PathBuf,
    languages: Vec<String>,
    timeout: Duration,
}

impl YtDlpTranscriptSource {
    pub fn new(languages: Vec<String>, timeout: Duration) -> Self {
        Self {
            binary: PathBuf::from("yt-dlp"),
            languages,
            timeout,
        }
    }

    /// Use a yt-dlp executable other than the one on `PATH`.
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    async fn download_subtitles(
        &self,
        video_id: &str,
        out_dir: &Path,
        sub_langs: &str,
        captions: Captions,
    ) -> Result<()> {
        let output_template = out_dir.join("%(id)s.%(ext)s");
        let mut command = Command::new(&self.binary);
        command
            .arg(watch_url(video_id))
            .arg("--skip-download")
            .arg(match captions {
                Captions::Uploaded => "--write-subs",
                Captions::Automatic => "--write-auto-subs",
            })
            .arg("--sub-format")
            .arg("json3")
            .arg("--sub-langs")
            .arg(sub_langs)
            .arg("--no-warnings")
            .arg("-o")
            .arg(&output_template)
            .kill_on_drop(true);

        let output = with_timeout(
            self.timeout,
            async {
                command.output().await.map_err(|e| {
                    PipelineError::upstream(SERVICE, format!("failed to run yt-dlp: {e}"))
                })
            },
            || {
                PipelineError::upstream(
                    SERVICE,
                    format!("yt-dlp timed out after {}s", self.timeout.as_secs()),
                )
            },
        )
        .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(video_id, &stderr));
        }

        Ok(())
    }
}

#[async_trait]
impl TranscriptSource for YtDlpTranscriptSource {
    async fn fetch(&self, video_id: &str) -> Result<Transcript> {
        let scratch = tempfile::tempdir()
            .map_err(|e| PipelineError::upstream(SERVICE, format!("no scratch dir: {e}")))?;

        self.download_subtitles(
            video_id,
            scratch.path(),
            "all,-live_chat",
            Captions::Uploaded,
        )
        .await?;
        let found = find_subtitle_files(scratch.path(), video_id).await?;
        let mut track = pick_track(found, &self.languages, Captions::Uploaded);

        if track.is_none() {
            debug!(video_id, "no uploaded subtitles, trying speech recognition");
            let original_only = format!(".*{ORIGINAL_ASR_SUFFIX}");
            self.download_subtitles(
                video_id,
                scratch.path(),
                &original_only,
                Captions::Automatic,
            )
            .await?;
            let found = find_subtitle_files(scratch.path(), video_id).await?;
            track = pick_track(found, &self.languages, Captions::Automatic);
        }

        let Some((language, path)) = track else {
            return Err(PipelineError::NotFound {
                video_id: video_id.to_string(),
            });
        };

        let raw = fs::read_to_string(&path)
            .await
            .map_err(|e| PipelineError::upstream(SERVICE, format!("unreadable subtitles: {e}")))?;
        let transcript = parse_json3(&raw, &language)?;

        if transcript.text.is_empty() {
            return Err(PipelineError::NotFound {
                video_id: video_id.to_string(),
            });
        }

        info!(
            video_id,
            language = %transcript.language,
            chars = transcript.text.chars().count(),
            "transcript extracted"
        );
        Ok(transcript)
    }
}

fn classify_failure(video_id: &str, stderr: &str) -> PipelineError {
    let lowered = stderr.to_lowercase();
    if lowered.contains("429") || lowered.contains("too many requests") {
        PipelineError::RateLimited {
            service: SERVICE,
            retry_after: None,
        }
    } else if lowered.contains("video unavailable")
        || lowered.contains("private video")
        || lowered.contains("does not exist")
        || lowered.contains("there are no subtitles")
    {
        PipelineError::NotFound {
            video_id: video_id.to_string(),
        }
    } else {
        PipelineError::upstream(SERVICE, stderr.trim().to_string())
    }
}

/// Subtitle files are named `<id>.<lang>.json3`.
async fn find_subtitle_files(dir: &Path, video_id: &str) -> Result<Vec<(String, PathBuf)>> {
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| PipelineError::upstream(SERVICE, e.to_string()))?;
    let prefix = format!("{video_id}.");
    let mut found = Vec::new();

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| PipelineError::upstream(SERVICE, e.to_string()))?
    {
        let name = entry.file_name().to_string_lossy().to_string();
        if let Some(language) = name
            .strip_prefix(&prefix)
            .and_then(|rest| rest.strip_suffix(".json3"))
        {
            found.push((language.to_string(), entry.path()));
        }
    }

    found.sort();
    Ok(found)
}

/// Choose the track to use, preferring `preferred` in order. Automatic captions
/// only count when they are the original-language recognition track.
fn pick_track(
    found: Vec<(String, PathBuf)>,
    preferred: &[String],
    captions: Captions,
) -> Option<(String, PathBuf)> {
    let candidates: Vec<(String, PathBuf)> = match captions {
        Captions::Uploaded => found,
        Captions::Automatic => found
            .into_iter()
            .filter_map(|(lang, path)| {
                lang.strip_suffix(ORIGINAL_ASR_SUFFIX)
                    .map(|spoken| (spoken.to_string(), path))
            })
            .collect(),
    };

    preferred
        .iter()
        .find_map(|lang| candidates.iter().find(|(l, _)| l == lang).cloned())
        .or_else(|| candidates.into_iter().next())
}

#[derive(Deserialize)]
struct Json3 {
    #[serde(default)]
    events: Vec<Json3Event>,
}

#[derive(Deserialize)]
struct Json3Event {
    #[serde(rename = "tStartMs", default)]
    start_ms: u64,
    #[serde(rename = "dDurationMs", default)]
    duration_ms: u64,
    #[serde(default)]
    segs: Vec<Json3Seg>,
}

#[derive(Deserialize)]
struct Json3Seg {
    #[serde(default)]
    utf8: String,
}

/// Parse YouTube's json3 subtitle format into timed segments.
pub fn parse_json3(raw: &str, language: &str) -> Result<Transcript> {
    let parsed: Json3 = serde_json::from_str(raw)
        .map_err(|e| PipelineError::upstream(SERVICE, format!("malformed subtitles: {e}")))?;

    let segments: Vec<Segment> = parsed
        .events
        .into_iter()
        .filter_map(|event| {
            let text = event
                .segs
                .iter()
                .map(|seg| seg.utf8.as_str())
                .collect::<String>()
                .replace('\n', " ");
            let text = text.trim();
            if text.is_empty() {
                return None;
            }
            Some(Segment {
                start: event.start_ms as f64 / 1000.0,
                end: (event.start_ms + event.duration_ms) as f64 / 1000.0,
                text: text.to_string(),
            })
        })
        .collect();

    let text = segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    Ok(Transcript {
        text,
        segments,
        language: language.to_string(),
    })
}
