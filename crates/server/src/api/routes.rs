use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::middleware::metrics_middleware;
use super::{audit, handlers, tickets, workers, ws};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Health, config, metrics
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/metrics", get(handlers::metrics))
        // Audit
        .route("/audit", get(audit::query_audit))
        // Tickets
        .route("/tickets", post(tickets::create_ticket))
        .route("/tickets/lookup", post(tickets::lookup_ticket))
        .route("/tickets/{id}", get(tickets::get_ticket))
        .route("/tickets/{id}", delete(tickets::cancel_ticket))
        .route("/tickets/{id}/position", get(tickets::queue_position))
        .route("/tickets/{id}/skip", post(tickets::skip_ticket))
        .route("/tickets/{id}/worker", put(tickets::reassign_ticket))
        .route("/tickets/{id}/purge", delete(tickets::purge_ticket))
        // Workers
        .route("/workers", get(workers::list_workers))
        .route("/workers", post(workers::create_worker))
        .route("/workers/{id}", get(workers::get_worker))
        .route("/workers/{id}/tickets", get(workers::worker_tickets))
        .route("/workers/{id}/start", post(workers::start_next))
        .route("/workers/{id}/advance", post(workers::advance))
        .route("/workers/{id}/finish", post(workers::finish));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
}
