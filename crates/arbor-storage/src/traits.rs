//! Storage backend trait definitions

use crate::error::StorageResult;
use arbor_core::Record;
use async_trait::async_trait;

/// Trait for storage backend implementations
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Prepare the storage (create the file, etc.)
    async fn initialize(&self) -> StorageResult<()>;

    /// Every stored record
    async fn load(&self) -> StorageResult<Vec<Record>>;

    /// Replace the stored records
    async fn save(&self, records: &[Record]) -> StorageResult<()>;

    /// Health check
    async fn health_check(&self) -> StorageResult<bool>;
}
