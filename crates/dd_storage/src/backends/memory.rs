use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dd_core::{MessageRecord, MessageStore, Result};
use tokio::sync::RwLock;

/// Records for the lifetime of the process only.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    records: Arc<RwLock<HashMap<String, MessageRecord>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for InMemoryStore {
    async fn load(&self, offer_id: &str) -> Result<Option<MessageRecord>> {
        let records = self.records.read().await;
        Ok(records.get(offer_id).cloned())
    }

    async fn save(&self, record: &MessageRecord) -> Result<()> {
        let mut records = self.records.write().await;
        records.insert(record.offer.offer_id.clone(), record.clone());
        Ok(())
    }

    async fn offer_ids(&self) -> Result<Vec<String>> {
        let records = self.records.read().await;
        let mut ids: Vec<String> = records.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
