pub mod json_store;
pub mod record;

use std::time::SystemTime;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::lot::models::ItemRecord;

/// Durable snapshot storage, read and written as a whole collection.
///
/// One poller owns a store; cycles over the same store must not interleave.
#[async_trait]
pub trait ItemStore: Send + Sync {
    async fn load_all(&self) -> Result<Vec<ItemRecord>, StoreError>;

    async fn save_all(&self, items: &[ItemRecord]) -> Result<(), StoreError>;

    /// Last modification time, used as the "changed since last check" signal.
    async fn last_modified(&self) -> Option<SystemTime> {
        None
    }

    fn name(&self) -> &str;
}
