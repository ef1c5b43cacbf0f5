//! Worker directory trait.

use crate::ticket::QueueError;
use crate::worker::{NewWorker, Worker};

/// Trait for worker storage backends.
pub trait WorkerDirectory: Send + Sync {
    /// Register a new worker; the store assigns the id. A counter number
    /// already in use is rejected with `QueueError::Duplicate`.
    fn create(&self, worker: NewWorker) -> Result<Worker, QueueError>;

    /// Get a worker by id.
    fn resolve(&self, id: i64) -> Result<Option<Worker>, QueueError>;

    /// List all workers, ordered by counter number.
    fn list(&self) -> Result<Vec<Worker>, QueueError>;
}
