pub mod audit;
pub mod broadcast;
pub mod config;
pub mod queue;
pub mod service;
pub mod ticket;
pub mod worker;

pub use broadcast::{BroadcastHub, ConnectionId, EventCommand, QueueEvent};
pub use config::{load_config, load_config_from_str, validate_config, Config, ConfigError};
pub use queue::{AdvanceOutcome, CancelOutcome, QueueEngine, SkipOutcome};
pub use service::{QueuePosition, RosterEntry, TicketService};
pub use ticket::{
    NewTicket, QueueError, SqliteTicketStore, Ticket, TicketFilter, TicketStatus, TicketStore,
};
pub use worker::{NewWorker, SqliteWorkerDirectory, Worker, WorkerDirectory};
