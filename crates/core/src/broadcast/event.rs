//! Queue events pushed to websocket viewers.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::ticket::Ticket;

/// What happened. The command tells display clients which part of their
/// view to refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCommand {
    /// A ticket joined a worker's queue.
    NewTicket,
    /// A ticket was cancelled while still pending.
    CancelTicket,
    /// A ticket was called to a counter; the waiting-room screen should
    /// show it.
    ScreenShow,
}

impl EventCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventCommand::NewTicket => "new_ticket",
            EventCommand::CancelTicket => "cancel_ticket",
            EventCommand::ScreenShow => "screen_show",
        }
    }
}

impl std::fmt::Display for EventCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One broadcast message. Every connected viewer receives every event;
/// `target` is advisory routing information for clients that only care
/// about one worker's queue (0 addresses the shared waiting-room screen).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEvent {
    pub command: EventCommand,
    pub target: i64,
    pub data: serde_json::Value,
}

impl QueueEvent {
    pub fn new_ticket(ticket: &Ticket) -> Self {
        Self {
            command: EventCommand::NewTicket,
            target: ticket.worker_id,
            data: json!({
                "ticket_id": ticket.id,
                "contact": ticket.contact,
            }),
        }
    }

    pub fn cancel_ticket(ticket: &Ticket) -> Self {
        Self {
            command: EventCommand::CancelTicket,
            target: ticket.worker_id,
            data: json!({
                "ticket_id": ticket.id,
            }),
        }
    }

    pub fn screen_show(ticket_id: i64, counter_number: u32) -> Self {
        Self {
            command: EventCommand::ScreenShow,
            target: 0,
            data: json!({
                "ticket_id": ticket_id,
                "counter_number": counter_number,
            }),
        }
    }
}
