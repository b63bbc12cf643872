//! In-memory storage backend for testing

use crate::error::{StorageError, StorageResult};
use crate::traits::StorageBackend;
use arbor_core::Record;
use async_trait::async_trait;
use std::sync::RwLock;

/// In-memory storage backend
///
/// Useful for testing and ephemeral sessions.
pub struct MemoryStorage {
    records: RwLock<Vec<Record>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::with_records(Vec::new())
    }

    /// Backend preloaded with records
    pub fn with_records(records: Vec<Record>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    /// Snapshot of the stored records
    pub fn records(&self) -> StorageResult<Vec<Record>> {
        let records = self
            .records
            .read()
            .map_err(|e| StorageError::Database(format!("Lock error: {}", e)))?;
        Ok(records.clone())
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn initialize(&self) -> StorageResult<()> {
        Ok(())
    }

    async fn load(&self) -> StorageResult<Vec<Record>> {
        self.records()
    }

    async fn save(&self, records: &[Record]) -> StorageResult<()> {
        let mut stored = self
            .records
            .write()
            .map_err(|e| StorageError::Database(format!("Lock error: {}", e)))?;
        *stored = records.to_vec();
        Ok(())
    }

    async fn health_check(&self) -> StorageResult<bool> {
        Ok(true)
    }
}
