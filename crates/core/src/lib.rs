pub mod archiver;
pub mod config;
pub mod error;
pub mod feed;
pub mod format;
pub mod generation;
pub mod logging;
pub mod pipeline;
pub mod provider;
pub mod retry;
pub mod store;
pub mod summarizer;
pub mod transcript;
pub mod translator;
pub mod types;
pub mod video;

pub use archiver::{Archiver, Stage};
pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use feed::{FeedClient, FeedEntry, parse_feed};
pub use format::{format_report_readable, render_html};
pub use generation::{LlmClient, TextGenerator};
pub use pipeline::{EventSender, Pipeline, PipelineEvent};
pub use provider::{Provider, ProviderConfig, ProviderError};
pub use retry::RetryPolicy;
pub use store::{ContentStore, StoreKind, StoreOptions, open_store};
pub use transcript::{TranscriptSource, YtDlpTranscriptSource};
pub use types::{
    ContentRecord, ContentSummary, Difficulty, KeyPoint, Quote, RecordListItem, RecordStatus,
    Segment, Transcript,
};
pub use video::extract_video_id;
