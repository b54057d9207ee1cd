//! Router configuration for the HTTP API.
//!
//! Sets up all routes and middleware (CORS, compression, tracing).

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers;
use super::state::AppState;

/// Create the main application router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // Permissive CORS; the admin UI is served from another origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let schedule = Router::new()
        .route("/run", post(handlers::run_schedule))
        .route("/jobs", get(handlers::list_jobs))
        .route(
            "/jobs/{job_id}",
            get(handlers::get_job).delete(handlers::delete_job),
        )
        .route("/jobs/{job_id}/finalize", post(handlers::finalize_job))
        .route("/jobs/{job_id}/events", get(handlers::stream_job_events))
        .route("/status", get(handlers::scheduler_status))
        .route("/analytics", get(handlers::job_analytics));

    let api_v1 = Router::new()
        .nest("/schedule", schedule)
        .route("/sessions/conflicts", post(handlers::check_conflict))
        .route("/events", get(handlers::stream_all_events));

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/v1", api_v1)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
