use std::{path::PathBuf, str::FromStr, sync::Arc, time::Duration};

use async_trait::async_trait;

use crate::{
    error::{PipelineError, Result},
    types::{ContentRecord, RecordListItem},
};

pub mod json_dir;
pub mod memory;
pub mod postgres;

pub use json_dir::{JsonDirStore, default_output_dir};
pub use memory::MemoryStore;
pub use postgres::PgContentStore;

/// Durable home for [`ContentRecord`]s, keyed by `video_id`.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Insert the record or replace the stored one with the same `video_id`.
    async fn upsert(&self, record: &ContentRecord) -> Result<()>;

    async fn get(&self, video_id: &str) -> Result<Option<ContentRecord>>;

    /// All records, most recently updated first.
    async fn list(&self) -> Result<Vec<RecordListItem>>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    #[default]
    Json,
    Memory,
}

impl FromStr for StoreKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreKind::Postgres),
            "json" => Ok(StoreKind::Json),
            "memory" => Ok(StoreKind::Memory),
            other => Err(PipelineError::InvalidInput(format!("unknown store: {other}"))),
        }
    }
}

pub struct StoreOptions {
    pub kind: StoreKind,
    pub database_url: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub timeout: Duration,
}

pub async fn open_store(options: StoreOptions) -> Result<Arc<dyn ContentStore>> {
    match options.kind {
        StoreKind::Postgres => {
            let url = options.database_url.ok_or_else(|| {
                PipelineError::InvalidInput(
                    "a database URL is required for the postgres store".into(),
                )
            })?;
            let store = PgContentStore::connect(&url, options.timeout).await?;
            store.migrate().await?;
            Ok(Arc::new(store))
        }
        StoreKind::Json => {
            let dir = options.output_dir.unwrap_or_else(default_output_dir);
            Ok(Arc::new(JsonDirStore::open(dir).await?))
        }
        StoreKind::Memory => Ok(Arc::new(MemoryStore::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_store_kinds() {
        assert_eq!("Postgres".parse::<StoreKind>().unwrap(), StoreKind::Postgres);
        assert_eq!("json".parse::<StoreKind>().unwrap(), StoreKind::Json);
        assert!("sqlite".parse::<StoreKind>().is_err());
    }

    #[tokio::test]
    async fn postgres_store_needs_a_url() {
        let result = open_store(StoreOptions {
            kind: StoreKind::Postgres,
            database_url: None,
            output_dir: None,
            timeout: Duration::from_secs(1),
        })
        .await;
        assert!(matches!(result, Err(PipelineError::InvalidInput(_))));
    }
}
