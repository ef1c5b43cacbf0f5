//! Ticket API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use qline_core::{NewTicket, QueuePosition, Ticket, TicketStatus};

use super::{error_response, ErrorResponse};
use crate::metrics::{record_operation, TICKETS_CREATED_TOTAL};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for creating a ticket
#[derive(Debug, Deserialize)]
pub struct CreateTicketBody {
    /// Contact handle for the customer (used for self-service lookup)
    pub contact: String,
    /// Which worker's queue to join
    pub worker_id: i64,
}

/// Request body for self-service lookup
#[derive(Debug, Deserialize)]
pub struct LookupTicketBody {
    pub contact: String,
}

/// Request body for reassigning a ticket
#[derive(Debug, Deserialize)]
pub struct ReassignTicketBody {
    pub worker_id: i64,
}

/// Response for ticket operations
#[derive(Debug, Serialize)]
pub struct TicketResponse {
    pub id: i64,
    pub contact: String,
    pub worker_id: i64,
    pub status: TicketStatus,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Ticket> for TicketResponse {
    fn from(ticket: Ticket) -> Self {
        Self {
            id: ticket.id,
            contact: ticket.contact,
            worker_id: ticket.worker_id,
            status: ticket.status,
            created_at: ticket.created_at.to_rfc3339(),
            updated_at: ticket.updated_at.to_rfc3339(),
        }
    }
}

/// Response for the position endpoint
#[derive(Debug, Serialize)]
pub struct PositionResponse {
    #[serde(flatten)]
    pub ticket: TicketResponse,
    /// 1-based place among waiting tickets; absent once called or closed
    pub position: Option<usize>,
}

impl From<QueuePosition> for PositionResponse {
    fn from(qp: QueuePosition) -> Self {
        Self {
            ticket: TicketResponse::from(qp.ticket),
            position: qp.position,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a new ticket
pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateTicketBody>,
) -> Result<(StatusCode, Json<TicketResponse>), (StatusCode, Json<ErrorResponse>)> {
    let request = NewTicket {
        contact: body.contact,
        worker_id: body.worker_id,
    };

    match state.service().create_ticket(request).await {
        Ok(ticket) => {
            record_operation("create", true);
            TICKETS_CREATED_TOTAL.inc();
            Ok((StatusCode::CREATED, Json(TicketResponse::from(ticket))))
        }
        Err(e) => {
            record_operation("create", false);
            Err(error_response(e))
        }
    }
}

/// Get a ticket by ID
pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<TicketResponse>, (StatusCode, Json<ErrorResponse>)> {
    state
        .service()
        .get_ticket(id)
        .map(|ticket| Json(TicketResponse::from(ticket)))
        .map_err(error_response)
}

/// Look up the newest ticket for a contact
pub async fn lookup_ticket(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LookupTicketBody>,
) -> Result<Json<TicketResponse>, (StatusCode, Json<ErrorResponse>)> {
    state
        .service()
        .lookup_ticket(&body.contact)
        .map(|ticket| Json(TicketResponse::from(ticket)))
        .map_err(error_response)
}

/// A ticket's place in line
pub async fn queue_position(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<PositionResponse>, (StatusCode, Json<ErrorResponse>)> {
    state
        .service()
        .queue_position(id)
        .map(|qp| Json(PositionResponse::from(qp)))
        .map_err(error_response)
}

/// Cancel a ticket (DELETE endpoint)
pub async fn cancel_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<TicketResponse>, (StatusCode, Json<ErrorResponse>)> {
    match state.service().cancel_ticket(id).await {
        Ok(ticket) => {
            record_operation("cancel", true);
            Ok(Json(TicketResponse::from(ticket)))
        }
        Err(e) => {
            record_operation("cancel", false);
            Err(error_response(e))
        }
    }
}

/// Skip a ticket whose holder did not show up
pub async fn skip_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<TicketResponse>, (StatusCode, Json<ErrorResponse>)> {
    match state.service().skip_ticket(id).await {
        Ok(promoted) => {
            record_operation("skip", true);
            Ok(Json(TicketResponse::from(promoted)))
        }
        Err(e) => {
            record_operation("skip", false);
            Err(error_response(e))
        }
    }
}

/// Move a ticket to another worker's queue
pub async fn reassign_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(body): Json<ReassignTicketBody>,
) -> Result<Json<TicketResponse>, (StatusCode, Json<ErrorResponse>)> {
    match state.service().reassign_ticket(id, body.worker_id).await {
        Ok(ticket) => {
            record_operation("reassign", true);
            Ok(Json(TicketResponse::from(ticket)))
        }
        Err(e) => {
            record_operation("reassign", false);
            Err(error_response(e))
        }
    }
}

/// Permanently delete a ticket
pub async fn purge_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<TicketResponse>, (StatusCode, Json<ErrorResponse>)> {
    match state.service().purge_ticket(id).await {
        Ok(ticket) => {
            record_operation("purge", true);
            Ok(Json(TicketResponse::from(ticket)))
        }
        Err(e) => {
            record_operation("purge", false);
            Err(error_response(e))
        }
    }
}
