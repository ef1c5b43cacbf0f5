use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Audit event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    // System events
    ServiceStarted {
        version: String,
        config_hash: String,
    },
    ServiceStopped {
        reason: String,
    },

    // Ticket lifecycle
    TicketCreated {
        ticket_id: i64,
        worker_id: i64,
        contact: String,
    },
    /// A ticket was promoted to the counter (start or advance).
    TicketCalled {
        ticket_id: i64,
        worker_id: i64,
        counter_number: u32,
    },
    TicketFinished {
        ticket_id: i64,
        worker_id: i64,
    },
    TicketCancelled {
        ticket_id: i64,
        previous_status: String,
    },
    TicketSkipped {
        ticket_id: i64,
        worker_id: i64,
        /// The waiting ticket promoted in the same step, if one existed.
        promoted_ticket_id: Option<i64>,
    },
    TicketReassigned {
        ticket_id: i64,
        from_worker: i64,
        to_worker: i64,
    },
    /// Ticket was permanently deleted (hard delete).
    TicketPurged {
        ticket_id: i64,
        previous_status: String,
    },

    // Worker events
    WorkerCreated {
        worker_id: i64,
        counter_number: u32,
    },
}

impl AuditEvent {
    /// Returns the event type as a string for storage
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ServiceStarted { .. } => "service_started",
            Self::ServiceStopped { .. } => "service_stopped",
            Self::TicketCreated { .. } => "ticket_created",
            Self::TicketCalled { .. } => "ticket_called",
            Self::TicketFinished { .. } => "ticket_finished",
            Self::TicketCancelled { .. } => "ticket_cancelled",
            Self::TicketSkipped { .. } => "ticket_skipped",
            Self::TicketReassigned { .. } => "ticket_reassigned",
            Self::TicketPurged { .. } => "ticket_purged",
            Self::WorkerCreated { .. } => "worker_created",
        }
    }

    /// Extract ticket_id if this event is ticket-related
    pub fn ticket_id(&self) -> Option<i64> {
        match self {
            Self::TicketCreated { ticket_id, .. }
            | Self::TicketCalled { ticket_id, .. }
            | Self::TicketFinished { ticket_id, .. }
            | Self::TicketCancelled { ticket_id, .. }
            | Self::TicketSkipped { ticket_id, .. }
            | Self::TicketReassigned { ticket_id, .. }
            | Self::TicketPurged { ticket_id, .. } => Some(*ticket_id),
            _ => None,
        }
    }

    /// Extract worker_id if this event belongs to a worker's queue
    pub fn worker_id(&self) -> Option<i64> {
        match self {
            Self::TicketCreated { worker_id, .. }
            | Self::TicketCalled { worker_id, .. }
            | Self::TicketFinished { worker_id, .. }
            | Self::TicketSkipped { worker_id, .. }
            | Self::WorkerCreated { worker_id, .. } => Some(*worker_id),
            Self::TicketReassigned { to_worker, .. } => Some(*to_worker),
            _ => None,
        }
    }
}

/// A stored audit record with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub ticket_id: Option<i64>,
    pub worker_id: Option<i64>,
    pub data: AuditEvent,
}
