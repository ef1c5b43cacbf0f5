//! Core ticket data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current status of a ticket.
///
/// State machine flow:
/// ```text
/// Waiting -> Processing -> Finished
///    |           |
///    v           v
/// Cancelled   Cancelled
///
/// Waiting -> Skipped (the next Waiting ticket is promoted in the same step)
/// Processing -> Skipped (same)
/// ```
///
/// `Finished` and `Cancelled` are terminal: no further transitions are ever
/// persisted for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    /// In the worker's queue, not yet called.
    Waiting,
    /// Currently being served at the counter.
    Processing,
    /// Served to completion (terminal).
    Finished,
    /// The holder left or withdrew (terminal).
    Cancelled,
    /// Called but not present; the queue moved past them.
    Skipped,
}

impl TicketStatus {
    /// Returns true if no further transitions are allowed from this status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TicketStatus::Finished | TicketStatus::Cancelled)
    }

    /// Returns the status as a stable string (persisted form, filter values).
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Waiting => "waiting",
            TicketStatus::Processing => "processing",
            TicketStatus::Finished => "finished",
            TicketStatus::Cancelled => "cancelled",
            TicketStatus::Skipped => "skipped",
        }
    }

    /// Parse the persisted form back into a status.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "waiting" => Some(TicketStatus::Waiting),
            "processing" => Some(TicketStatus::Processing),
            "finished" => Some(TicketStatus::Finished),
            "cancelled" => Some(TicketStatus::Cancelled),
            "skipped" => Some(TicketStatus::Skipped),
            _ => None,
        }
    }

    /// All statuses, in a stable order (used for metrics and filters).
    pub fn all() -> [TicketStatus; 5] {
        [
            TicketStatus::Waiting,
            TicketStatus::Processing,
            TicketStatus::Finished,
            TicketStatus::Cancelled,
            TicketStatus::Skipped,
        ]
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A customer's place in a worker's queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    /// Store-assigned identifier. Monotonically increasing, which makes it
    /// the FIFO tie-break key for tickets created in the same instant.
    pub id: i64,

    /// Opaque holder identifier (an email in practice). Used for
    /// self-service lookup; not unique across ticket history.
    pub contact: String,

    /// The worker whose queue this ticket belongs to.
    pub worker_id: i64,

    /// Current status.
    pub status: TicketStatus,

    /// When the ticket was created. Primary FIFO ordering key.
    pub created_at: DateTime<Utc>,

    /// Last status or assignment change.
    pub updated_at: DateTime<Utc>,
}
