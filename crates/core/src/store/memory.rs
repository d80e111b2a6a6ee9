use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    error::Result,
    store::ContentStore,
    types::{ContentRecord, RecordListItem},
};

/// In-process store; contents vanish with the process.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, ContentRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn upsert(&self, record: &ContentRecord) -> Result<()> {
        self.records
            .write()
            .await
            .insert(record.video_id.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, video_id: &str) -> Result<Option<ContentRecord>> {
        Ok(self.records.read().await.get(video_id).cloned())
    }

    async fn list(&self) -> Result<Vec<RecordListItem>> {
        let mut items: Vec<RecordListItem> = self
            .records
            .read()
            .await
            .values()
            .map(ContentRecord::to_list_item)
            .collect();
        items.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RecordStatus;

    #[tokio::test]
    async fn upsert_replaces_by_video_id() {
        let store = MemoryStore::new();
        let mut record = ContentRecord::new("abc123");
        store.upsert(&record).await.unwrap();

        record.advance(RecordStatus::Processing).unwrap();
        store.upsert(&record).await.unwrap();

        assert_eq!(store.len().await, 1);
        let stored = store.get("abc123").await.unwrap().unwrap();
        assert_eq!(stored.status, RecordStatus::Processing);
    }

    #[tokio::test]
    async fn lists_newest_first() {
        let store = MemoryStore::new();
        let mut older = ContentRecord::new("older");
        older.updated_at = older.updated_at - chrono::Duration::minutes(5);
        store.upsert(&older).await.unwrap();
        store.upsert(&ContentRecord::new("newer")).await.unwrap();

        let ids: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|item| item.video_id)
            .collect();
        assert_eq!(ids, vec!["newer", "older"]);
    }
}
