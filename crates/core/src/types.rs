use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

pub const ONE_LINER_MAX_CHARS: usize = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    pub segments: Vec<Segment>,
    pub language: String,
}

impl Transcript {
    pub fn duration_minutes(&self) -> f64 {
        self.segments.last().map(|s| s.end / 60.0).unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }

    pub fn label_ko(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "입문",
            Difficulty::Intermediate => "중급",
            Difficulty::Advanced => "고급",
        }
    }

    /// Accepts the English names in any case and the Korean labels.
    pub fn parse_label(label: &str) -> Option<Difficulty> {
        match label.trim().to_lowercase().as_str() {
            "beginner" | "입문" => Some(Difficulty::Beginner),
            "intermediate" | "중급" => Some(Difficulty::Intermediate),
            "advanced" | "고급" => Some(Difficulty::Advanced),
            _ => None,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Pending => "pending",
            RecordStatus::Processing => "processing",
            RecordStatus::Completed => "completed",
            RecordStatus::Failed => "failed",
        }
    }

    /// Processing may be written repeatedly, once per finished stage.
    pub fn can_advance_to(&self, next: RecordStatus) -> bool {
        match self {
            RecordStatus::Pending => next != RecordStatus::Pending,
            RecordStatus::Processing => next != RecordStatus::Pending,
            RecordStatus::Completed | RecordStatus::Failed => false,
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordStatus {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(RecordStatus::Pending),
            "processing" => Ok(RecordStatus::Processing),
            "completed" => Ok(RecordStatus::Completed),
            "failed" => Ok(RecordStatus::Failed),
            other => Err(PipelineError::InvalidInput(format!(
                "unknown record status: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyPoint {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub example: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub original: String,
    #[serde(alias = "korean")]
    pub translated: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentSummary {
    pub one_liner: String,
    pub tags: Vec<String>,
    pub difficulty: Difficulty,
    pub keywords: Vec<String>,
    pub key_points: Vec<KeyPoint>,
    pub quotes: Vec<Quote>,
    pub action_items: Vec<String>,
    pub related_topics: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRecord {
    pub video_id: String,
    pub video_url: String,
    pub status: RecordStatus,
    pub source_language: Option<String>,
    pub original_transcript: Option<String>,
    pub korean_transcript: Option<String>,
    pub summary: Option<ContentSummary>,
    pub error: Option<String>,
    pub failed_stage: Option<String>,
    /// [`PipelineError::kind`] of the failure, when the record failed.
    #[serde(default)]
    pub error_kind: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContentRecord {
    pub fn new(video_id: &str) -> Self {
        let now = Utc::now();
        Self {
            video_id: video_id.to_string(),
            video_url: watch_url(video_id),
            status: RecordStatus::Pending,
            source_language: None,
            original_transcript: None,
            korean_transcript: None,
            summary: None,
            error: None,
            failed_stage: None,
            error_kind: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn advance(&mut self, next: RecordStatus) -> Result<()> {
        if !self.status.can_advance_to(next) {
            return Err(PipelineError::InvalidTransition {
                video_id: self.video_id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Whether an unattended run should pick this record up again. Completed
    /// records and failures that cannot succeed on retry are left alone.
    pub fn needs_processing(&self) -> bool {
        match self.status {
            RecordStatus::Completed => false,
            RecordStatus::Failed => self
                .error_kind
                .as_deref()
                .is_none_or(crate::error::is_transient_kind),
            RecordStatus::Pending | RecordStatus::Processing => true,
        }
    }

    pub fn to_list_item(&self) -> RecordListItem {
        RecordListItem {
            video_id: self.video_id.clone(),
            status: self.status,
            one_liner: self.summary.as_ref().map(|s| s.one_liner.clone()),
            tags: self
                .summary
                .as_ref()
                .map(|s| s.tags.clone())
                .unwrap_or_default(),
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordListItem {
    pub video_id: String,
    pub status: RecordStatus,
    pub one_liner: Option<String>,
    pub tags: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}
