//! Real-time fanout of queue changes to connected viewers.

mod event;
mod hub;

pub use event::{EventCommand, QueueEvent};
pub use hub::{BroadcastHub, ConnectionId};
