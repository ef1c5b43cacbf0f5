//! Worker API handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use qline_core::{NewWorker, RosterEntry, TicketStatus, Worker};

use super::tickets::TicketResponse;
use super::{error_response, ErrorResponse};
use crate::metrics::record_operation;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for registering a worker
#[derive(Debug, Deserialize)]
pub struct CreateWorkerBody {
    pub display_name: String,
    pub counter_number: u32,
}

/// Query parameters for listing a worker's tickets
#[derive(Debug, Deserialize)]
pub struct WorkerTicketsParams {
    /// Filter by status (waiting, processing, finished, cancelled, skipped)
    pub status: Option<String>,
}

/// Response for the roster endpoint
#[derive(Debug, Serialize)]
pub struct RosterResponse {
    pub workers: Vec<RosterEntry>,
}

// ============================================================================
// Handlers
// ============================================================================

/// List all workers with the live shape of their queues
pub async fn list_workers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RosterResponse>, (StatusCode, Json<ErrorResponse>)> {
    state
        .service()
        .roster()
        .map(|workers| Json(RosterResponse { workers }))
        .map_err(error_response)
}

/// Register a new worker
pub async fn create_worker(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateWorkerBody>,
) -> Result<(StatusCode, Json<Worker>), (StatusCode, Json<ErrorResponse>)> {
    let request = NewWorker {
        display_name: body.display_name,
        counter_number: body.counter_number,
    };

    state
        .service()
        .create_worker(request)
        .map(|worker| (StatusCode::CREATED, Json(worker)))
        .map_err(error_response)
}

/// Get a worker by ID
pub async fn get_worker(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Worker>, (StatusCode, Json<ErrorResponse>)> {
    state
        .service()
        .get_worker(id)
        .map(Json)
        .map_err(error_response)
}

/// List one worker's tickets, optionally filtered by status
pub async fn worker_tickets(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(params): Query<WorkerTicketsParams>,
) -> Result<Json<Vec<TicketResponse>>, (StatusCode, Json<ErrorResponse>)> {
    let status = match params.status.as_deref() {
        Some(s) => Some(TicketStatus::parse(s).ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: format!("unrecognized status filter: {s}"),
                }),
            )
        })?),
        None => None,
    };

    state
        .service()
        .worker_tickets(id, status)
        .map(|tickets| Json(tickets.into_iter().map(TicketResponse::from).collect()))
        .map_err(error_response)
}

/// Call the oldest waiting ticket to this worker's counter
pub async fn start_next(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<TicketResponse>, (StatusCode, Json<ErrorResponse>)> {
    match state.service().start_next(id).await {
        Ok(ticket) => {
            record_operation("start_next", true);
            Ok(Json(TicketResponse::from(ticket)))
        }
        Err(e) => {
            record_operation("start_next", false);
            Err(error_response(e))
        }
    }
}

/// Finish the current ticket and call the next one
pub async fn advance(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<TicketResponse>, (StatusCode, Json<ErrorResponse>)> {
    match state.service().advance(id).await {
        Ok(ticket) => {
            record_operation("advance", true);
            Ok(Json(TicketResponse::from(ticket)))
        }
        Err(e) => {
            record_operation("advance", false);
            Err(error_response(e))
        }
    }
}

/// Finish the current ticket without calling anyone else
pub async fn finish(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<TicketResponse>, (StatusCode, Json<ErrorResponse>)> {
    match state.service().finish(id).await {
        Ok(ticket) => {
            record_operation("finish", true);
            Ok(Json(TicketResponse::from(ticket)))
        }
        Err(e) => {
            record_operation("finish", false);
            Err(error_response(e))
        }
    }
}
