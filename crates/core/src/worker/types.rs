//! Worker data types.

use serde::{Deserialize, Serialize};

/// A staffed service counter with its own ticket queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worker {
    /// Store-assigned identifier, referenced by tickets.
    pub id: i64,

    /// Human-readable name shown on rosters.
    pub display_name: String,

    /// The physical counter this worker staffs. Shown on the waiting-room
    /// screen when a ticket is called. Unique across workers.
    pub counter_number: u32,
}

/// Fields for registering a new worker; the id is assigned by the store.
#[derive(Debug, Clone)]
pub struct NewWorker {
    pub display_name: String,
    pub counter_number: u32,
}
