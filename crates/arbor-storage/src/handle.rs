//! Single-writer access to a database from many callers
//!
//! One task owns the [`Database`]; callers send requests over a channel and
//! wait for the answer, so statements never interleave.

use crate::database::Database;
use crate::error::{StorageError, StorageResult};
use crate::traits::StorageBackend;
use arbor_core::Reply;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

const CHANNEL_CAPACITY: usize = 64;

enum Request {
    Execute {
        text: String,
        reply: oneshot::Sender<StorageResult<Reply>>,
    },
    Flush {
        reply: oneshot::Sender<StorageResult<()>>,
    },
}

/// Cloneable handle to a database task
#[derive(Clone)]
pub struct DatabaseHandle {
    sender: mpsc::Sender<Request>,
}

impl DatabaseHandle {
    /// Move the database into a new task and return a handle to it
    ///
    /// The task ends once every handle is dropped or shut down.
    pub fn spawn<B: StorageBackend + 'static>(mut database: Database<B>) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel::<Request>(CHANNEL_CAPACITY);
        let task = tokio::spawn(async move {
            while let Some(request) = receiver.recv().await {
                match request {
                    Request::Execute { text, reply } => {
                        let result = database.execute(&text).await;
                        let _ = reply.send(result);
                    }
                    Request::Flush { reply } => {
                        let _ = reply.send(database.flush().await);
                    }
                }
            }
            debug!("Database task stopped");
        });
        (Self { sender }, task)
    }

    pub async fn execute(&self, text: impl Into<String>) -> StorageResult<Reply> {
        let (reply, answer) = oneshot::channel();
        self.sender
            .send(Request::Execute {
                text: text.into(),
                reply,
            })
            .await
            .map_err(|_| StorageError::Closed)?;
        answer.await.map_err(|_| StorageError::Closed)?
    }

    pub async fn flush(&self) -> StorageResult<()> {
        let (reply, answer) = oneshot::channel();
        self.sender
            .send(Request::Flush { reply })
            .await
            .map_err(|_| StorageError::Closed)?;
        answer.await.map_err(|_| StorageError::Closed)?
    }

    /// Flush and release this handle
    pub async fn shutdown(self) -> StorageResult<()> {
        self.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStorage;
    use arbor_core::{Engine, Vocabulary};
    use std::sync::Arc;

    async fn handle() -> (DatabaseHandle, JoinHandle<()>) {
        let engine = Engine::new(Arc::new(Vocabulary::default()));
        let db = Database::open(engine, MemoryStorage::new()).await.unwrap();
        DatabaseHandle::spawn(db)
    }

    #[tokio::test]
    async fn test_concurrent_writers_are_serialized() {
        let (handle, task) = handle().await;
        handle.execute("write counter").await.unwrap();

        let mut joins = Vec::new();
        for i in 0..20 {
            let handle = handle.clone();
            joins.push(tokio::spawn(async move {
                handle.execute(format!("write counter: n{} = {}", i, i)).await
            }));
        }
        for join in joins {
            assert!(!join.await.unwrap().unwrap().is_error());
        }

        let reply = handle.execute("read counter").await.unwrap();
        assert_eq!(reply.count(), 21);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_task() {
        let (handle, task) = handle().await;
        task.abort();
        let _ = task.await;
        assert!(matches!(handle.execute("read a").await, Err(StorageError::Closed)));
    }
}
