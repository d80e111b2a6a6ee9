use std::time::Duration;

use thiserror::Error;

use crate::{provider::ProviderError, types::RecordStatus};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("No transcript available for {video_id}")]
    NotFound { video_id: String },

    #[error("{service} is rate limiting requests")]
    RateLimited {
        service: &'static str,
        retry_after: Option<Duration>,
    },

    #[error("{service} request failed: {reason}")]
    Upstream {
        service: &'static str,
        reason: String,
    },

    #[error("Generated summary does not match the schema: {}", .problems.join("; "))]
    SchemaValidation { problems: Vec<String>, raw: String },

    #[error("Store write failed: {reason}")]
    Persistence { reason: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Record {video_id} cannot move from {from} to {to}")]
    InvalidTransition {
        video_id: String,
        from: RecordStatus,
        to: RecordStatus,
    },

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl PipelineError {
    pub fn upstream(service: &'static str, reason: impl Into<String>) -> Self {
        PipelineError::Upstream {
            service,
            reason: reason.into(),
        }
    }

    pub fn persistence(reason: impl ToString) -> Self {
        PipelineError::Persistence {
            reason: reason.to_string(),
        }
    }

    /// Stable name for the error kind, stored with failed records.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::NotFound { .. } => "not_found",
            PipelineError::RateLimited { .. } => "rate_limited",
            PipelineError::Upstream { .. } => "upstream",
            PipelineError::SchemaValidation { .. } => "schema_validation",
            PipelineError::Persistence { .. } => "persistence",
            PipelineError::InvalidInput(_) => "invalid_input",
            PipelineError::InvalidTransition { .. } => "invalid_transition",
            PipelineError::Provider(_) => "provider",
        }
    }

    /// Throttling, upstream hiccups and store outages are worth another attempt.
    pub fn is_transient(&self) -> bool {
        is_transient_kind(self.kind())
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            PipelineError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

pub fn is_transient_kind(kind: &str) -> bool {
    matches!(kind, "rate_limited" | "upstream" | "persistence")
}

impl From<sqlx::Error> for PipelineError {
    fn from(err: sqlx::Error) -> Self {
        PipelineError::persistence(err)
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
