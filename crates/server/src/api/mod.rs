pub mod audit;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod tickets;
pub mod workers;
pub mod ws;

pub use routes::create_router;

use axum::{http::StatusCode, Json};
use serde::Serialize;

use qline_core::QueueError;

/// Error response body shared by all endpoints.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Map a queue error to its HTTP representation.
pub fn error_response(e: QueueError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &e {
        QueueError::NotFound(_) => StatusCode::NOT_FOUND,
        QueueError::InvalidState { .. } => StatusCode::CONFLICT,
        QueueError::Conflict { .. } => StatusCode::CONFLICT,
        QueueError::Duplicate(_) => StatusCode::CONFLICT,
        QueueError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!("request failed: {e}");
    }

    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}
