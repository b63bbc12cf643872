//! An engine bound to a storage backend

use crate::error::StorageResult;
use crate::traits::StorageBackend;
use arbor_core::{Engine, Record, Reply};
use tracing::{debug, info};

/// Engine plus the backend its tree is persisted to
pub struct Database<B: StorageBackend> {
    engine: Engine,
    backend: B,
    autosave: bool,
}

impl<B: StorageBackend> Database<B> {
    /// Initialize the backend and load its records into the engine's store
    pub async fn open(mut engine: Engine, backend: B) -> StorageResult<Self> {
        backend.initialize().await?;
        let records = backend.load().await?;
        if !records.is_empty() {
            engine.store_mut().import(&records)?;
        }
        info!(records = records.len(), "Opened database");
        Ok(Self {
            engine,
            backend,
            autosave: true,
        })
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn autosave(&self) -> bool {
        self.autosave
    }

    /// With autosave off, changes are only written by [`Database::flush`]
    pub fn set_autosave(&mut self, autosave: bool) {
        self.autosave = autosave;
    }

    /// Execute a statement, saving afterwards when it changed the tree
    pub async fn execute(&mut self, text: &str) -> StorageResult<Reply> {
        let reply = self.engine.execute(text);
        if self.autosave && self.engine.should_persist() {
            self.flush().await?;
        }
        Ok(reply)
    }

    /// Save the whole tree unconditionally
    pub async fn flush(&self) -> StorageResult<()> {
        let records = self.engine.store().export();
        debug!(records = records.len(), "Flushing database");
        self.backend.save(&records).await
    }

    pub fn export(&self) -> Vec<Record> {
        self.engine.store().export()
    }

    /// Load records and save the result
    ///
    /// Without `merge` the store must be empty.
    pub async fn import(&mut self, records: &[Record], merge: bool) -> StorageResult<usize> {
        let store = self.engine.store_mut();
        let count = if merge {
            store.merge(records)?
        } else {
            store.import(records)?
        };
        self.flush().await?;
        Ok(count)
    }
}
