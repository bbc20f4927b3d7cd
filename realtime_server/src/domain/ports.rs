use async_trait::async_trait;

use crate::domain::UserId;
use crate::domain::errors::StoreError;
use crate::domain::history::{HistoryEntry, HistoryEvent};

// Port for durable chat/call history. Relay paths never wait on it.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn save(&self, event: HistoryEvent) -> Result<(), StoreError>;

    // Both directions between the two ids, oldest first.
    async fn query(
        &self,
        local_id: UserId,
        remote_id: UserId,
    ) -> Result<Vec<HistoryEntry>, StoreError>;
}

// Port for retrieving the current time.
pub trait Clock: Send + Sync {
    fn now_epoch_millis(&self) -> u64;
}
