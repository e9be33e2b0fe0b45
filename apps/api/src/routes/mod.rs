pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::catalog::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Prompt search and rating
        .route("/api/prompts", get(handlers::handle_search))
        .route("/api/prompts/:id/rating", post(handlers::handle_rate))
        // Dimension listings
        .route("/api/departments", get(handlers::handle_list_departments))
        .route("/api/functions", get(handlers::handle_list_functions))
        .route("/api/activities", get(handlers::handle_list_activities))
        // Organizational hierarchy
        .route(
            "/api/department-functions",
            get(handlers::handle_department_functions),
        )
        .route(
            "/api/departments/:id/functions",
            get(handlers::handle_functions_of),
        )
        .route(
            "/api/functions/:id/activities",
            get(handlers::handle_activities_of),
        )
        .with_state(state)
}
