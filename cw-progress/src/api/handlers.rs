//! HTTP request handlers
//!
//! Thin transport layer over the progress engine. Every handler converts
//! domain errors into a definite success/failure JSON outcome; a
//! RecordNotFound during update is a non-fatal `success = false`, not an
//! error status.

use crate::error::Error;
use crate::progress::{self, ProgressSignal, ResumePosition};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cw_common::db::models::{ContentPackageRef, PlacementKey, ProgressRecord, ProgressState};
use cw_common::RequestContext;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;
use uuid::Uuid;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

/// One interaction event: identity, placement, package, raw signal.
/// The package kind is carried by the signal's tag.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateProgressRequest {
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub client_id: Uuid,
    #[serde(flatten)]
    pub placement: PlacementKey,
    pub package_id: Uuid,
    pub signal: ProgressSignal,
}

#[derive(Debug, Serialize)]
pub struct UpdateProgressResponse {
    pub success: bool,
    pub state: ProgressState,
    pub record: ProgressRecord,
}

#[derive(Debug, Deserialize)]
pub struct BatchProgressRequest {
    pub items: Vec<UpdateProgressRequest>,
}

#[derive(Debug, Serialize)]
pub struct BatchItemOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BatchProgressResponse {
    pub results: Vec<BatchItemOutcome>,
}

#[derive(Debug, Serialize)]
pub struct MarkCompletedResponse {
    pub success: bool,
}

#[derive(Debug, Deserialize)]
pub struct ResumeQuery {
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub client_id: Uuid,
    pub placement_type: String,
    pub placement_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct CourseProgressQuery {
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub client_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct CourseProgressResponse {
    pub percent: f64,
}

// ============================================================================
// Error mapping
// ============================================================================

/// Wrapper mapping domain errors onto transport outcomes
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            Error::MissingParameters(msg) | Error::InvalidInput(msg) => {
                (StatusCode::BAD_REQUEST, msg.clone())
            }
            Error::NotAuthorized(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            Error::PackageNotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Error::AttemptLimit(msg) => (StatusCode::CONFLICT, msg.clone()),
            // Non-fatal: the record disappeared underneath the update
            Error::RecordNotFound(msg) => {
                let body = Json(json!({ "success": false, "error": msg }));
                return (StatusCode::OK, body).into_response();
            }
            Error::Database(e) => {
                error!("Persistence failure: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }
            Error::Internal(msg) => {
                error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string())
            }
        };

        let body = Json(json!({ "success": false, "error": message }));
        (status, body).into_response()
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "cw-progress".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /api/progress/update (also serves /api/progress/save)
///
/// The single synchronous write entrypoint: AJAX updates and immediate
/// saves land here.
pub async fn update_progress(
    State(state): State<AppState>,
    Json(request): Json<UpdateProgressRequest>,
) -> Result<Json<UpdateProgressResponse>, ApiError> {
    let record = apply_update(&state, &request).await?;
    Ok(Json(UpdateProgressResponse {
        success: true,
        state: record.state(),
        record,
    }))
}

/// POST /api/progress/beacon
///
/// Tab-close saves. Identical semantics to update, but the client never
/// reads the response, so every outcome is a 200 with a success flag.
pub async fn beacon_progress(
    State(state): State<AppState>,
    Json(request): Json<UpdateProgressRequest>,
) -> Json<serde_json::Value> {
    match apply_update(&state, &request).await {
        Ok(record) => Json(json!({ "success": true, "record_id": record.guid })),
        Err(e) => Json(json!({ "success": false, "error": e.to_string() })),
    }
}

/// POST /api/progress/batch
///
/// Applies each event through the same funnel; one bad item never blocks
/// the rest.
pub async fn batch_progress(
    State(state): State<AppState>,
    Json(request): Json<BatchProgressRequest>,
) -> Json<BatchProgressResponse> {
    let mut results = Vec::with_capacity(request.items.len());
    for item in &request.items {
        match apply_update(&state, item).await {
            Ok(record) => results.push(BatchItemOutcome {
                success: true,
                record_id: Some(record.guid),
                error: None,
            }),
            Err(e) => results.push(BatchItemOutcome {
                success: false,
                record_id: None,
                error: Some(e.to_string()),
            }),
        }
    }
    Json(BatchProgressResponse { results })
}

/// POST /api/progress/:record_id/complete
///
/// Explicit terminal transition (SCORM players reporting "completed" out
/// of band). `success = false` when the record no longer exists.
pub async fn mark_completed(
    State(state): State<AppState>,
    Path(record_id): Path<Uuid>,
) -> Result<Json<MarkCompletedResponse>, ApiError> {
    let success = progress::mark_completed(&state.db, record_id).await?;
    Ok(Json(MarkCompletedResponse { success }))
}

/// GET /api/progress/resume
///
/// Read-only; zeroed defaults when no record exists (never an error).
pub async fn get_resume_position(
    State(state): State<AppState>,
    Query(query): Query<ResumeQuery>,
) -> Result<Json<ResumePosition>, ApiError> {
    let ctx = RequestContext::new(query.user_id, query.course_id, query.client_id);
    let placement = PlacementKey::from_parts(&query.placement_type, query.placement_id)
        .map_err(Error::from)?;

    let resume = progress::resume_position(&state.db, &ctx, &placement).await?;
    Ok(Json(resume))
}

/// GET /api/progress/course - stored whole-course aggregate
pub async fn get_course_progress(
    State(state): State<AppState>,
    Query(query): Query<CourseProgressQuery>,
) -> Result<Json<CourseProgressResponse>, ApiError> {
    let ctx = RequestContext::new(query.user_id, query.course_id, query.client_id);
    let percent = crate::db::enrollment::get_course_progress(&state.db, &ctx)
        .await?
        .ok_or_else(|| {
            Error::NotAuthorized(format!(
                "User {} has no enrollment in course {}",
                ctx.user_id, ctx.course_id
            ))
        })?;
    Ok(Json(CourseProgressResponse { percent }))
}

async fn apply_update(
    state: &AppState,
    request: &UpdateProgressRequest,
) -> crate::error::Result<ProgressRecord> {
    let ctx = RequestContext::new(request.user_id, request.course_id, request.client_id);
    let package = ContentPackageRef {
        package_id: request.package_id,
        kind: match &request.signal {
            ProgressSignal::Scorm { .. } => cw_common::db::models::ContentKind::Scorm,
            ProgressSignal::Audio { .. } => cw_common::db::models::ContentKind::Audio,
        },
    };

    progress::update_progress(&state.db, &ctx, &request.placement, &package, &request.signal).await
}
