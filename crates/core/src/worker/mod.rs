//! Workers: the staffed counters that tickets queue for.

mod directory;
mod sqlite_directory;
mod types;

pub use directory::WorkerDirectory;
pub use sqlite_directory::SqliteWorkerDirectory;
pub use types::{NewWorker, Worker};
