//! API route definitions

use super::handlers::{self, ConsoleState};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the API router
pub fn create_router(state: ConsoleState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // ====================================================================
        // Incidents
        // ====================================================================
        .route("/api/incidents", get(handlers::list_incidents))
        .route(
            "/api/incidents/{incident_id}/graph",
            get(handlers::get_incident_graph),
        )
        .route(
            "/api/incidents/{incident_id}/graph/regenerate",
            post(handlers::regenerate_incident_graph),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
