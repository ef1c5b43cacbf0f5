//! Tickets and their storage: one row per customer in a worker's queue.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteTicketStore;
pub use store::{NewTicket, QueueError, TicketFilter, TicketStore};
pub use types::{Ticket, TicketStatus};
