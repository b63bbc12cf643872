//! Flat file storage backend
//!
//! One `path:value` line per node. The value is everything after the first
//! colon and is never escaped.

use crate::error::{StorageError, StorageResult};
use crate::traits::StorageBackend;
use arbor_core::Record;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Parse flat file text into records
///
/// Blank lines are skipped; a line without `:` has an empty value.
pub fn parse_records(text: &str) -> StorageResult<Vec<Record>> {
    let mut records = Vec::new();
    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let (path, value) = line.split_once(':').unwrap_or((line, ""));
        if path.is_empty() || path.split('.').any(str::is_empty) {
            return Err(StorageError::Malformed {
                line: index + 1,
                content: line.to_string(),
            });
        }
        records.push(Record::new(path, value));
    }
    Ok(records)
}

/// Render records as flat file text, one line each
pub fn render_records(records: &[Record]) -> String {
    records
        .iter()
        .map(|record| format!("{}\n", record))
        .collect()
}

/// Flat file storage backend
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl StorageBackend for FileStorage {
    async fn initialize(&self) -> StorageResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        if fs::metadata(&self.path).await.is_err() {
            fs::write(&self.path, b"").await?;
            info!(path = %self.path.display(), "Created database file");
        }
        Ok(())
    }

    async fn load(&self) -> StorageResult<Vec<Record>> {
        let text = fs::read_to_string(&self.path).await?;
        let records = parse_records(&text)?;
        debug!(path = %self.path.display(), records = records.len(), "Loaded records");
        Ok(records)
    }

    async fn save(&self, records: &[Record]) -> StorageResult<()> {
        // Temp file in the same directory so the rename stays atomic
        let temp = self.temp_path();
        fs::write(&temp, render_records(records)).await?;
        fs::rename(&temp, &self.path).await?;
        info!(path = %self.path.display(), records = records.len(), "Saved records");
        Ok(())
    }

    async fn health_check(&self) -> StorageResult<bool> {
        Ok(fs::metadata(&self.path).await.is_ok())
    }
}
