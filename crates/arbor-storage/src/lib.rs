//! Arbor Storage - Persistence for the node tree
//!
//! Backends store the flat `path:value` record list exported by the core
//! store. [`Database`] couples an engine with a backend, and
//! [`DatabaseHandle`] serializes access from many callers through one task.

pub mod database;
pub mod error;
pub mod flatfile;
pub mod handle;
pub mod memory;
pub mod traits;

pub use database::Database;
pub use error::{StorageError, StorageResult};
pub use flatfile::FileStorage;
pub use handle::DatabaseHandle;
pub use memory::MemoryStorage;
pub use traits::StorageBackend;
