use async_trait::async_trait;
use crate::types::MessageRecord;
use crate::Result;

/// Per offer id memory of the last posted message.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Load the record for an offer id, if one was ever saved
    async fn load(&self, offer_id: &str) -> Result<Option<MessageRecord>>;

    /// Replace the record for `record.offer.offer_id`
    async fn save(&self, record: &MessageRecord) -> Result<()>;

    /// Offer ids that currently have a record
    async fn offer_ids(&self) -> Result<Vec<String>>;
}
