//! Queue state machine.
//!
//! All ticket transitions go through the engine. Operations on the same
//! worker's queue are serialized with a per-worker async lock, and every
//! status write is a compare-and-swap against the status the engine last
//! observed. A lost swap is retried a bounded number of times before the
//! conflict is surfaced.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::ticket::{NewTicket, QueueError, Ticket, TicketStatus, TicketStore};
use crate::worker::{Worker, WorkerDirectory};

/// Re-reads per operation after a lost compare-and-swap.
const CAS_RETRIES: usize = 2;

/// Outcome of cancelling a ticket. Cancelling an already terminal ticket
/// is a no-op reported with `changed: false`.
#[derive(Debug, Clone)]
pub struct CancelOutcome {
    pub ticket: Ticket,
    pub changed: bool,
}

/// Outcome of advancing a worker's queue: the ticket that was finished,
/// if the counter was occupied, and the one promoted in its place, if
/// the queue was not empty.
#[derive(Debug, Clone)]
pub struct AdvanceOutcome {
    pub finished: Option<Ticket>,
    pub promoted: Option<Ticket>,
}

/// Outcome of skipping a ticket. The skip is committed even when there
/// was no waiting ticket to promote.
#[derive(Debug, Clone)]
pub struct SkipOutcome {
    pub skipped: Ticket,
    pub promoted: Option<Ticket>,
    /// Promotion was withheld because a different ticket was already at
    /// the counter.
    pub counter_busy: bool,
}

pub struct QueueEngine {
    tickets: Arc<dyn TicketStore>,
    workers: Arc<dyn WorkerDirectory>,
    locks: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
}

impl QueueEngine {
    pub fn new(tickets: Arc<dyn TicketStore>, workers: Arc<dyn WorkerDirectory>) -> Self {
        Self {
            tickets,
            workers,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// The serialization lock for one worker's queue. Locks are created
    /// lazily and never removed; the map is bounded by the worker roster.
    fn worker_lock(&self, worker_id: i64) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        Arc::clone(locks.entry(worker_id).or_default())
    }

    fn require_worker(&self, worker_id: i64) -> Result<Worker, QueueError> {
        self.workers
            .resolve(worker_id)?
            .ok_or_else(|| QueueError::NotFound(format!("worker {worker_id}")))
    }

    /// Add a ticket to the back of a worker's queue.
    pub async fn create(&self, ticket: NewTicket) -> Result<Ticket, QueueError> {
        self.require_worker(ticket.worker_id)?;
        self.tickets.insert(ticket)
    }

    /// Call the oldest waiting ticket to an idle counter.
    ///
    /// Fails with `NotFound` when the queue has no waiting tickets and with
    /// `InvalidState` when the worker is still serving someone.
    pub async fn start_next(&self, worker_id: i64) -> Result<Ticket, QueueError> {
        self.require_worker(worker_id)?;
        let lock = self.worker_lock(worker_id);
        let _guard = lock.lock().await;

        let mut last_err = None;
        for _ in 0..=CAS_RETRIES {
            let next = self
                .tickets
                .oldest_waiting(worker_id)?
                .ok_or_else(|| QueueError::NotFound(format!("no waiting ticket for worker {worker_id}")))?;

            if let Some(current) = self.tickets.processing_for(worker_id)? {
                return Err(QueueError::InvalidState {
                    ticket_id: current.id,
                    current_status: current.status,
                    operation: "start next ticket".to_string(),
                });
            }

            match self.tickets.update_status(
                next.id,
                Some(TicketStatus::Waiting),
                TicketStatus::Processing,
            ) {
                Ok(ticket) => return Ok(ticket),
                Err(e @ QueueError::Conflict { .. }) => {
                    tracing::debug!(worker_id, ticket_id = next.id, "lost promotion race, retrying");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or_else(|| QueueError::store("promotion retries exhausted")))
    }

    /// Finish the ticket at the counter, if there is one, and promote its
    /// successor in one step. An idle counter just promotes. The finish is
    /// committed even when the queue turns out to be empty; `promoted` is
    /// `None` in that case.
    pub async fn advance(&self, worker_id: i64) -> Result<AdvanceOutcome, QueueError> {
        self.require_worker(worker_id)?;
        let lock = self.worker_lock(worker_id);
        let _guard = lock.lock().await;

        let finished = match self.tickets.processing_for(worker_id)? {
            Some(current) => Some(self.tickets.update_status(
                current.id,
                Some(TicketStatus::Processing),
                TicketStatus::Finished,
            )?),
            None => None,
        };

        let promoted = self.promote_next(worker_id)?;

        Ok(AdvanceOutcome { finished, promoted })
    }

    /// Finish the ticket at the counter without calling anyone else.
    pub async fn finish(&self, worker_id: i64) -> Result<Ticket, QueueError> {
        self.require_worker(worker_id)?;
        let lock = self.worker_lock(worker_id);
        let _guard = lock.lock().await;

        let current = self
            .tickets
            .processing_for(worker_id)?
            .ok_or_else(|| QueueError::NotFound(format!("no ticket in processing for worker {worker_id}")))?;

        self.tickets.update_status(
            current.id,
            Some(TicketStatus::Processing),
            TicketStatus::Finished,
        )
    }

    /// Cancel a ticket. Works from any non-terminal status and never
    /// promotes a successor; a terminal ticket is left untouched.
    pub async fn cancel(&self, ticket_id: i64) -> Result<CancelOutcome, QueueError> {
        let ticket = self
            .tickets
            .get(ticket_id)?
            .ok_or_else(|| QueueError::NotFound(format!("ticket {ticket_id}")))?;

        let lock = self.worker_lock(ticket.worker_id);
        let _guard = lock.lock().await;

        let mut last_err = None;
        for _ in 0..=CAS_RETRIES {
            let current = self
                .tickets
                .get(ticket_id)?
                .ok_or_else(|| QueueError::NotFound(format!("ticket {ticket_id}")))?;

            if current.status.is_terminal() {
                return Ok(CancelOutcome {
                    ticket: current,
                    changed: false,
                });
            }

            match self
                .tickets
                .update_status(ticket_id, Some(current.status), TicketStatus::Cancelled)
            {
                Ok(ticket) => {
                    return Ok(CancelOutcome {
                        ticket,
                        changed: true,
                    })
                }
                Err(e @ QueueError::Conflict { .. }) => {
                    tracing::debug!(ticket_id, "cancel lost a status race, retrying");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or_else(|| QueueError::store("cancel retries exhausted")))
    }

    /// Mark a ticket as skipped (called but not present) and promote the
    /// next waiting ticket onto an idle counter. A ticket already being
    /// served stays in place; only one ticket per worker may be in
    /// processing. The skip is committed even when nothing is promoted.
    pub async fn skip(&self, ticket_id: i64) -> Result<SkipOutcome, QueueError> {
        let ticket = self
            .tickets
            .get(ticket_id)?
            .ok_or_else(|| QueueError::NotFound(format!("ticket {ticket_id}")))?;

        let lock = self.worker_lock(ticket.worker_id);
        let _guard = lock.lock().await;

        let current = self
            .tickets
            .get(ticket_id)?
            .ok_or_else(|| QueueError::NotFound(format!("ticket {ticket_id}")))?;

        if current.status.is_terminal() {
            return Err(QueueError::InvalidState {
                ticket_id,
                current_status: current.status,
                operation: "skip".to_string(),
            });
        }

        let skipped =
            self.tickets
                .update_status(ticket_id, Some(current.status), TicketStatus::Skipped)?;

        let counter_busy = self.tickets.processing_for(current.worker_id)?.is_some();
        let promoted = if counter_busy {
            None
        } else {
            self.promote_next(current.worker_id)?
        };

        Ok(SkipOutcome {
            skipped,
            promoted,
            counter_busy,
        })
    }

    /// Move a ticket to another worker's queue. The ticket keeps its
    /// status and its original creation time (and therefore its seniority
    /// in the destination queue).
    pub async fn reassign(&self, ticket_id: i64, to_worker: i64) -> Result<Ticket, QueueError> {
        self.require_worker(to_worker)?;

        let ticket = self
            .tickets
            .get(ticket_id)?
            .ok_or_else(|| QueueError::NotFound(format!("ticket {ticket_id}")))?;

        if ticket.status.is_terminal() {
            return Err(QueueError::InvalidState {
                ticket_id,
                current_status: ticket.status,
                operation: "reassign".to_string(),
            });
        }

        let lock = self.worker_lock(ticket.worker_id);
        let _guard = lock.lock().await;

        self.tickets.update_worker(ticket_id, to_worker)
    }

    /// Promote the oldest waiting ticket, retrying lost swaps. Callers
    /// hold the worker lock; a concurrent writer racing us here can only
    /// be a cancel coming in by ticket id.
    fn promote_next(&self, worker_id: i64) -> Result<Option<Ticket>, QueueError> {
        let mut last_err = None;
        for _ in 0..=CAS_RETRIES {
            let next = match self.tickets.oldest_waiting(worker_id)? {
                Some(ticket) => ticket,
                None => return Ok(None),
            };

            match self.tickets.update_status(
                next.id,
                Some(TicketStatus::Waiting),
                TicketStatus::Processing,
            ) {
                Ok(ticket) => return Ok(Some(ticket)),
                Err(e @ QueueError::Conflict { .. }) => {
                    tracing::debug!(worker_id, ticket_id = next.id, "lost promotion race, retrying");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or_else(|| QueueError::store("promotion retries exhausted")))
    }
}
