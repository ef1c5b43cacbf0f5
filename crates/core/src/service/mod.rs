//! Queue service: ties the state machine to broadcasting and auditing.
//!
//! Handlers talk to this layer only. Every mutation goes through the
//! engine first; events are fanned out and audited only after the store
//! commit, so viewers never see a change that did not happen.

use std::sync::Arc;

use serde::Serialize;

use crate::audit::{AuditEvent, AuditHandle};
use crate::broadcast::{BroadcastHub, QueueEvent};
use crate::queue::QueueEngine;
use crate::ticket::{NewTicket, QueueError, Ticket, TicketFilter, TicketStatus, TicketStore};
use crate::worker::{NewWorker, Worker, WorkerDirectory};

/// A worker together with the live shape of their queue.
#[derive(Debug, Clone, Serialize)]
pub struct RosterEntry {
    #[serde(flatten)]
    pub worker: Worker,
    /// Waiting tickets in this worker's queue.
    pub queue_length: i64,
    /// The ticket currently at the counter, if any.
    pub current_ticket: Option<Ticket>,
}

/// A ticket and its place in line (1-based among waiting tickets; absent
/// once the ticket has been called or closed).
#[derive(Debug, Clone, Serialize)]
pub struct QueuePosition {
    pub ticket: Ticket,
    pub position: Option<usize>,
}

pub struct TicketService {
    engine: QueueEngine,
    tickets: Arc<dyn TicketStore>,
    workers: Arc<dyn WorkerDirectory>,
    hub: Arc<BroadcastHub>,
    audit: Option<AuditHandle>,
}

impl TicketService {
    pub fn new(
        engine: QueueEngine,
        tickets: Arc<dyn TicketStore>,
        workers: Arc<dyn WorkerDirectory>,
        hub: Arc<BroadcastHub>,
        audit: Option<AuditHandle>,
    ) -> Self {
        Self {
            engine,
            tickets,
            workers,
            hub,
            audit,
        }
    }

    fn audit(&self, event: AuditEvent) {
        if let Some(handle) = &self.audit {
            handle.try_emit(event);
        }
    }

    /// Announce a called ticket on the waiting-room screen.
    fn announce(&self, ticket: &Ticket) {
        match self.workers.resolve(ticket.worker_id) {
            Ok(Some(worker)) => {
                self.hub
                    .broadcast(&QueueEvent::screen_show(ticket.id, worker.counter_number));
                self.audit(AuditEvent::TicketCalled {
                    ticket_id: ticket.id,
                    worker_id: worker.id,
                    counter_number: worker.counter_number,
                });
            }
            Ok(None) => {
                tracing::warn!(
                    ticket_id = ticket.id,
                    worker_id = ticket.worker_id,
                    "called ticket belongs to an unknown worker, skipping announcement"
                );
            }
            Err(e) => {
                tracing::warn!(ticket_id = ticket.id, error = %e, "failed to resolve worker for announcement");
            }
        }
    }

    /// Add a customer to a worker's queue and tell the viewers.
    pub async fn create_ticket(&self, request: NewTicket) -> Result<Ticket, QueueError> {
        let ticket = self.engine.create(request).await?;

        self.hub.broadcast(&QueueEvent::new_ticket(&ticket));
        self.audit(AuditEvent::TicketCreated {
            ticket_id: ticket.id,
            worker_id: ticket.worker_id,
            contact: ticket.contact.clone(),
        });

        Ok(ticket)
    }

    /// Call the next waiting customer to an idle counter.
    pub async fn start_next(&self, worker_id: i64) -> Result<Ticket, QueueError> {
        let ticket = self.engine.start_next(worker_id).await?;
        self.announce(&ticket);
        Ok(ticket)
    }

    /// Finish the current customer, if any, and call the next one in a
    /// single step. An idle counter just calls the next customer.
    ///
    /// The finish commits even when the queue turns out to be empty; the
    /// empty queue is then reported as `NotFound`.
    pub async fn advance(&self, worker_id: i64) -> Result<Ticket, QueueError> {
        let outcome = self.engine.advance(worker_id).await?;

        if let Some(finished) = &outcome.finished {
            self.audit(AuditEvent::TicketFinished {
                ticket_id: finished.id,
                worker_id,
            });
        }

        match outcome.promoted {
            Some(promoted) => {
                self.announce(&promoted);
                Ok(promoted)
            }
            None => Err(QueueError::NotFound(format!(
                "no waiting ticket for worker {worker_id}"
            ))),
        }
    }

    /// Finish the current customer without calling anyone else.
    pub async fn finish(&self, worker_id: i64) -> Result<Ticket, QueueError> {
        let ticket = self.engine.finish(worker_id).await?;

        self.audit(AuditEvent::TicketFinished {
            ticket_id: ticket.id,
            worker_id,
        });

        Ok(ticket)
    }

    /// Cancel a ticket. Cancelling an already closed ticket is a quiet
    /// no-op: the ticket is returned unchanged and nothing is broadcast.
    pub async fn cancel_ticket(&self, ticket_id: i64) -> Result<Ticket, QueueError> {
        let previous_status = self
            .tickets
            .get(ticket_id)?
            .map(|t| t.status)
            .ok_or_else(|| QueueError::NotFound(format!("ticket {ticket_id}")))?;

        let outcome = self.engine.cancel(ticket_id).await?;

        if outcome.changed {
            self.hub.broadcast(&QueueEvent::cancel_ticket(&outcome.ticket));
            self.audit(AuditEvent::TicketCancelled {
                ticket_id,
                previous_status: previous_status.to_string(),
            });
        }

        Ok(outcome.ticket)
    }

    /// Skip a customer who did not show up and, if the counter is idle,
    /// call the next one. Skipping a waiting customer while another is
    /// being served just removes them from the line. The skip sticks even
    /// when the queue is empty, which is reported as `NotFound`.
    pub async fn skip_ticket(&self, ticket_id: i64) -> Result<Ticket, QueueError> {
        let outcome = self.engine.skip(ticket_id).await?;

        self.audit(AuditEvent::TicketSkipped {
            ticket_id: outcome.skipped.id,
            worker_id: outcome.skipped.worker_id,
            promoted_ticket_id: outcome.promoted.as_ref().map(|t| t.id),
        });

        match outcome.promoted {
            Some(promoted) => {
                self.announce(&promoted);
                Ok(promoted)
            }
            None if outcome.counter_busy => Ok(outcome.skipped),
            None => Err(QueueError::NotFound(format!(
                "no waiting ticket for worker {}",
                outcome.skipped.worker_id
            ))),
        }
    }

    /// Move a ticket to another worker's queue.
    pub async fn reassign_ticket(&self, ticket_id: i64, to_worker: i64) -> Result<Ticket, QueueError> {
        let from_worker = self
            .tickets
            .get(ticket_id)?
            .map(|t| t.worker_id)
            .ok_or_else(|| QueueError::NotFound(format!("ticket {ticket_id}")))?;

        let ticket = self.engine.reassign(ticket_id, to_worker).await?;

        self.audit(AuditEvent::TicketReassigned {
            ticket_id,
            from_worker,
            to_worker,
        });

        Ok(ticket)
    }

    /// Permanently delete a ticket, bypassing the state machine.
    pub async fn purge_ticket(&self, ticket_id: i64) -> Result<Ticket, QueueError> {
        let deleted = self.tickets.delete(ticket_id)?;

        self.audit(AuditEvent::TicketPurged {
            ticket_id,
            previous_status: deleted.status.to_string(),
        });

        Ok(deleted)
    }

    pub fn get_ticket(&self, ticket_id: i64) -> Result<Ticket, QueueError> {
        self.tickets
            .get(ticket_id)?
            .ok_or_else(|| QueueError::NotFound(format!("ticket {ticket_id}")))
    }

    /// Self-service lookup: the newest ticket for a contact.
    pub fn lookup_ticket(&self, contact: &str) -> Result<Ticket, QueueError> {
        self.tickets
            .find_by_contact(contact)?
            .ok_or_else(|| QueueError::NotFound(format!("no ticket for contact {contact}")))
    }

    /// A ticket together with its place in line.
    pub fn queue_position(&self, ticket_id: i64) -> Result<QueuePosition, QueueError> {
        let ticket = self.get_ticket(ticket_id)?;

        let position = if ticket.status == TicketStatus::Waiting {
            let waiting = self.tickets.find(
                &TicketFilter::new()
                    .with_worker(ticket.worker_id)
                    .with_status(TicketStatus::Waiting),
            )?;
            waiting.iter().position(|t| t.id == ticket.id).map(|i| i + 1)
        } else {
            None
        };

        Ok(QueuePosition { ticket, position })
    }

    /// All workers with the live shape of their queues.
    pub fn roster(&self) -> Result<Vec<RosterEntry>, QueueError> {
        let workers = self.workers.list()?;

        let mut roster = Vec::with_capacity(workers.len());
        for worker in workers {
            let queue_length = self.tickets.count(
                &TicketFilter::new()
                    .with_worker(worker.id)
                    .with_status(TicketStatus::Waiting),
            )?;
            let current_ticket = self.tickets.processing_for(worker.id)?;

            roster.push(RosterEntry {
                worker,
                queue_length,
                current_ticket,
            });
        }

        Ok(roster)
    }

    pub fn get_worker(&self, worker_id: i64) -> Result<Worker, QueueError> {
        self.workers
            .resolve(worker_id)?
            .ok_or_else(|| QueueError::NotFound(format!("worker {worker_id}")))
    }

    /// Tickets in one worker's queue, optionally restricted to a status.
    pub fn worker_tickets(
        &self,
        worker_id: i64,
        status: Option<TicketStatus>,
    ) -> Result<Vec<Ticket>, QueueError> {
        self.get_worker(worker_id)?;

        let mut filter = TicketFilter::new().with_worker(worker_id);
        if let Some(status) = status {
            filter = filter.with_status(status);
        }

        self.tickets.find(&filter)
    }

    pub fn create_worker(&self, request: NewWorker) -> Result<Worker, QueueError> {
        let worker = self.workers.create(request)?;

        self.audit(AuditEvent::WorkerCreated {
            worker_id: worker.id,
            counter_number: worker.counter_number,
        });

        Ok(worker)
    }
}
