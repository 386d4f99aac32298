pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::copilot;
use crate::pipeline;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Pipeline runs
        .route("/api/v1/runs", post(pipeline::handlers::handle_launch))
        .route("/api/v1/runs/:id", get(pipeline::handlers::handle_get_run))
        // Copilot chat
        .route(
            "/api/v1/runs/:id/copilot",
            post(copilot::handlers::handle_send).get(copilot::handlers::handle_transcript),
        )
        .route(
            "/api/v1/runs/:id/copilot/reset",
            post(copilot::handlers::handle_reset),
        )
        .with_state(state)
}
