//! cw-progress library - learning-content progress service
//!
//! Records learner interaction with trackable content units (SCORM
//! packages, audio assets) and keeps completion state consistent across
//! every placement of the same package within a course.

use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;
pub mod error;
pub mod progress;

pub use error::{Error, Result};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    Router::new()
        .route("/health", get(api::handlers::health))
        // All four write entrypoints funnel through the same semantics;
        // they differ only in how the client invoked them
        .route("/api/progress/update", post(api::handlers::update_progress))
        .route("/api/progress/save", post(api::handlers::update_progress))
        .route("/api/progress/beacon", post(api::handlers::beacon_progress))
        .route("/api/progress/batch", post(api::handlers::batch_progress))
        .route(
            "/api/progress/:record_id/complete",
            post(api::handlers::mark_completed),
        )
        .route("/api/progress/resume", get(api::handlers::get_resume_position))
        .route("/api/progress/course", get(api::handlers::get_course_progress))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
