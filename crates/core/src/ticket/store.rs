//! Ticket storage trait and the queue error taxonomy.

use thiserror::Error;

use crate::ticket::{Ticket, TicketStatus};

/// Error type shared by the stores, the queue engine and the service layer.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Referenced ticket or worker does not exist, or no ticket satisfies
    /// the required query (e.g. no waiting ticket to promote).
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation preconditions violated (e.g. starting the next ticket
    /// while one is already being processed).
    #[error("cannot {operation}: ticket {ticket_id} is {current_status}")]
    InvalidState {
        ticket_id: i64,
        current_status: TicketStatus,
        operation: String,
    },

    /// A concurrent mutation invalidated the expected prior status during a
    /// guarded update. Surfaced only after internal retries are exhausted.
    #[error("concurrent update on ticket {ticket_id}: expected status {expected}")]
    Conflict {
        ticket_id: i64,
        expected: TicketStatus,
    },

    /// A uniqueness constraint was violated (e.g. registering a worker on
    /// an occupied counter).
    #[error("duplicate: {0}")]
    Duplicate(String),

    /// The underlying store failed. Fatal for this request; never retried
    /// by the engine.
    #[error("store error: {0}")]
    Store(String),
}

impl QueueError {
    pub(crate) fn store(e: impl std::fmt::Display) -> Self {
        QueueError::Store(e.to_string())
    }
}

/// Fields for a new ticket; `id`, timestamps and the initial `Waiting`
/// status are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub contact: String,
    pub worker_id: i64,
}

/// Filter for querying tickets. Results are always in FIFO order:
/// `(created_at, id)` ascending.
#[derive(Debug, Clone, Default)]
pub struct TicketFilter {
    /// Restrict to one worker's queue.
    pub worker_id: Option<i64>,
    /// Restrict to one status.
    pub status: Option<TicketStatus>,
    /// Maximum number of results (0 = no limit).
    pub limit: i64,
}

impl TicketFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_worker(mut self, worker_id: i64) -> Self {
        self.worker_id = Some(worker_id);
        self
    }

    pub fn with_status(mut self, status: TicketStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }
}

/// Trait for ticket storage backends.
///
/// Every method is a single atomic statement against the backend; the
/// read-then-write sequencing across calls is the queue engine's job.
pub trait TicketStore: Send + Sync {
    /// Insert a new ticket in `Waiting` status; the store assigns the id.
    fn insert(&self, ticket: NewTicket) -> Result<Ticket, QueueError>;

    /// Get a ticket by id.
    fn get(&self, id: i64) -> Result<Option<Ticket>, QueueError>;

    /// List tickets matching the filter, FIFO-ordered.
    fn find(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, QueueError>;

    /// Count tickets matching the filter.
    fn count(&self, filter: &TicketFilter) -> Result<i64, QueueError>;

    /// The oldest `Waiting` ticket for a worker: minimum `(created_at, id)`.
    fn oldest_waiting(&self, worker_id: i64) -> Result<Option<Ticket>, QueueError>;

    /// The `Processing` ticket for a worker, if any.
    fn processing_for(&self, worker_id: i64) -> Result<Option<Ticket>, QueueError>;

    /// Update a ticket's status. When `expected` is given the write only
    /// applies if the current status matches (compare-and-swap); a mismatch
    /// is reported as `Conflict`.
    fn update_status(
        &self,
        id: i64,
        expected: Option<TicketStatus>,
        new_status: TicketStatus,
    ) -> Result<Ticket, QueueError>;

    /// Administrative reassignment to another worker's queue. The caller is
    /// responsible for validating the new worker.
    fn update_worker(&self, id: i64, worker_id: i64) -> Result<Ticket, QueueError>;

    /// Newest ticket for a contact (self-service lookup).
    fn find_by_contact(&self, contact: &str) -> Result<Option<Ticket>, QueueError>;

    /// Permanently delete a ticket, returning the deleted record.
    /// Administrative escape hatch, outside the state machine.
    fn delete(&self, id: i64) -> Result<Ticket, QueueError>;
}
