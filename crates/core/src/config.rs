use std::time::Duration;

use crate::{provider::Provider, retry::RetryPolicy};

/// Knobs shared by every stage of a run.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub provider: Provider,
    /// Overrides the provider's default model.
    pub model: Option<String>,
    pub transcript_timeout: Duration,
    pub generation_timeout: Duration,
    pub store_timeout: Duration,
    pub retry: RetryPolicy,
    /// Subtitle languages tried in order before falling back to any track.
    pub transcript_languages: Vec<String>,
    pub translation_max_tokens: u32,
    pub summary_max_tokens: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            model: None,
            transcript_timeout: Duration::from_secs(30),
            generation_timeout: Duration::from_secs(180),
            store_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            transcript_languages: vec!["en".into(), "en-US".into(), "ko".into()],
            translation_max_tokens: 8192,
            summary_max_tokens: 4096,
        }
    }
}

impl PipelineConfig {
    pub fn model(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| self.provider.config().model.to_string())
    }
}
