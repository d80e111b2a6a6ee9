use std::{
    io::Write,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tokio::fs;
use tracing::warn;

use crate::{
    error::{PipelineError, Result},
    format::render_html,
    store::ContentStore,
    types::{ContentRecord, RecordListItem},
    video::is_safe_video_id,
};

pub fn default_output_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("beonyeok")
        .join("output")
}

/// One `<video_id>.json` per record, plus `<video_id>.html` once a summary exists.
pub struct JsonDirStore {
    dir: PathBuf,
}

impl JsonDirStore {
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| PipelineError::persistence(format!("{}: {e}", dir.display())))?;
        Ok(Self { dir })
    }

    /// Path of the JSON file backing a record.
    pub fn record_path(&self, video_id: &str) -> Result<PathBuf> {
        Ok(self.dir.join(format!("{}.json", checked(video_id)?)))
    }

    /// Path of the rendered HTML page for a record.
    pub fn html_path(&self, video_id: &str) -> Result<PathBuf> {
        Ok(self.dir.join(format!("{}.html", checked(video_id)?)))
    }
}

fn checked(video_id: &str) -> Result<&str> {
    if is_safe_video_id(video_id) {
        Ok(video_id)
    } else {
        Err(PipelineError::InvalidInput(format!(
            "unsafe video id: {video_id:?}"
        )))
    }
}

/// Write through a uniquely named temp file in the same directory, so readers
/// never see a half-written record and concurrent writers never share one.
async fn write_atomic(path: &Path, contents: String) -> Result<()> {
    let target = path.to_path_buf();
    let written = tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let dir = target.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(contents.as_bytes())?;
        tmp.persist(&target).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(PipelineError::persistence)?;
    written.map_err(|e| PipelineError::persistence(format!("{}: {e}", path.display())))
}

async fn read_record(path: &Path) -> Result<ContentRecord> {
    let json = fs::read_to_string(path)
        .await
        .map_err(|e| PipelineError::persistence(format!("{}: {e}", path.display())))?;
    serde_json::from_str(&json)
        .map_err(|e| PipelineError::persistence(format!("{}: {e}", path.display())))
}

#[async_trait]
impl ContentStore for JsonDirStore {
    async fn upsert(&self, record: &ContentRecord) -> Result<()> {
        let path = self.record_path(&record.video_id)?;
        let pretty_json = serde_json::to_string_pretty(record)
            .map_err(|e| PipelineError::persistence(e.to_string()))?;
        write_atomic(&path, pretty_json).await?;

        if record.summary.is_some() {
            write_atomic(&self.html_path(&record.video_id)?, render_html(record)).await?;
        }
        Ok(())
    }

    async fn get(&self, video_id: &str) -> Result<Option<ContentRecord>> {
        let path = self.record_path(video_id)?;
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(None);
        }
        read_record(&path).await.map(Some)
    }

    async fn list(&self) -> Result<Vec<RecordListItem>> {
        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| PipelineError::persistence(e.to_string()))?;
        let mut items = Vec::new();

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PipelineError::persistence(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            match read_record(&path).await {
                Ok(record) => items.push(record.to_list_item()),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping unreadable record")
                }
            }
        }

        items.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(items)
    }
}
