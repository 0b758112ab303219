//! Progress record store
//!
//! Persistence over per-placement progress records. One row per
//! (user, course, client, placement); the natural-key UNIQUE index is the
//! only serialization boundary the service guarantees.
//!
//! Creation is an atomic insert-or-fetch: `INSERT OR IGNORE` followed by a
//! select, so two near-simultaneous first events for the same placement
//! (a start ping racing a beacon save) produce exactly one row. Completion
//! is a one-way latch enforced in the UPDATE statement itself, so no
//! interleaving of concurrent writers can revert a completed record.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use cw_common::db::models::{
    ContentKind, ContentPackageRef, PlacementKey, ProgressPayload, ProgressRecord,
};
use cw_common::RequestContext;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Partial update applied to one progress record.
///
/// `None` fields keep their stored value (last write wins for the rest).
/// Completion is requested, never assigned: `set_completed = true` latches
/// the flag on, and `false` leaves whatever is stored untouched.
#[derive(Debug, Clone, Default)]
pub struct ProgressUpdate {
    pub position_seconds: Option<f64>,
    pub duration_seconds: Option<f64>,
    pub percent_progress: Option<f64>,
    pub status: Option<String>,
    pub set_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub increment_play_count: bool,
    pub payload: Option<ProgressPayload>,
}

/// Return the existing record for the natural key, creating a zeroed one if
/// none exists. Race-safe: concurrent callers converge on a single row.
pub async fn get_or_create(
    pool: &SqlitePool,
    ctx: &RequestContext,
    placement: &PlacementKey,
    package: &ContentPackageRef,
) -> Result<ProgressRecord> {
    let initial_status = match package.kind {
        ContentKind::Scorm => "not attempted",
        ContentKind::Audio => "not_started",
    };
    let payload = serde_json::to_string(&ProgressPayload::empty(package.kind))?;

    sqlx::query(
        r#"
        INSERT OR IGNORE INTO progress_records
            (guid, user_id, course_id, client_id, placement_type, placement_id,
             package_id, kind, status, last_interaction_at, payload)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(ctx.user_id.to_string())
    .bind(ctx.course_id.to_string())
    .bind(ctx.client_id.to_string())
    .bind(placement.type_str())
    .bind(placement.row_id().to_string())
    .bind(package.package_id.to_string())
    .bind(package.kind.as_str())
    .bind(initial_status)
    .bind(Utc::now())
    .bind(payload)
    .execute(pool)
    .await?;

    find_by_placement(pool, ctx, placement)
        .await?
        .ok_or_else(|| Error::Internal("Progress row vanished after insert".to_string()))
}

/// Apply a partial update to one record.
///
/// Returns `false` (not an error) if the record no longer exists. The
/// statement never transitions `is_completed` from 1 back to 0, and
/// `completed_at` is frozen once set.
pub async fn update(pool: &SqlitePool, record_id: Uuid, changes: &ProgressUpdate) -> Result<bool> {
    let payload_json = match &changes.payload {
        Some(p) => Some(serde_json::to_string(p)?),
        None => None,
    };

    let result = sqlx::query(
        r#"
        UPDATE progress_records SET
            position_seconds = COALESCE(?, position_seconds),
            duration_seconds = COALESCE(?, duration_seconds),
            percent_progress = COALESCE(?, percent_progress),
            status = COALESCE(?, status),
            completed_at = CASE
                WHEN is_completed = 1 THEN completed_at
                WHEN ? THEN ?
                ELSE completed_at
            END,
            is_completed = MAX(is_completed, ?),
            play_count = play_count + ?,
            payload = COALESCE(?, payload),
            last_interaction_at = ?,
            updated_at = CURRENT_TIMESTAMP
        WHERE guid = ?
        "#,
    )
    .bind(changes.position_seconds)
    .bind(changes.duration_seconds)
    .bind(changes.percent_progress)
    .bind(changes.status.as_deref())
    .bind(changes.set_completed)
    .bind(changes.completed_at.unwrap_or_else(Utc::now))
    .bind(changes.set_completed as i64)
    .bind(changes.increment_play_count as i64)
    .bind(payload_json)
    .bind(Utc::now())
    .bind(record_id.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Existence check used by the propagator to avoid duplicate creation
pub async fn find_by_placement(
    pool: &SqlitePool,
    ctx: &RequestContext,
    placement: &PlacementKey,
) -> Result<Option<ProgressRecord>> {
    let row = sqlx::query(
        r#"
        SELECT * FROM progress_records
        WHERE user_id = ? AND course_id = ? AND client_id = ?
          AND placement_type = ? AND placement_id = ?
        "#,
    )
    .bind(ctx.user_id.to_string())
    .bind(ctx.course_id.to_string())
    .bind(ctx.client_id.to_string())
    .bind(placement.type_str())
    .bind(placement.row_id().to_string())
    .fetch_optional(pool)
    .await?;

    row.map(|r| record_from_row(&r)).transpose()
}

/// Most-recently-updated record for a package regardless of placement.
/// Propagation source of truth when the caller only knows the package.
pub async fn latest_for_package(
    pool: &SqlitePool,
    ctx: &RequestContext,
    package_id: Uuid,
) -> Result<Option<ProgressRecord>> {
    let row = sqlx::query(
        r#"
        SELECT * FROM progress_records
        WHERE user_id = ? AND course_id = ? AND client_id = ? AND package_id = ?
        ORDER BY last_interaction_at DESC, updated_at DESC
        LIMIT 1
        "#,
    )
    .bind(ctx.user_id.to_string())
    .bind(ctx.course_id.to_string())
    .bind(ctx.client_id.to_string())
    .bind(package_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.map(|r| record_from_row(&r)).transpose()
}

/// Fetch one record by id
pub async fn get_by_id(pool: &SqlitePool, record_id: Uuid) -> Result<Option<ProgressRecord>> {
    let row = sqlx::query("SELECT * FROM progress_records WHERE guid = ?")
        .bind(record_id.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(|r| record_from_row(&r)).transpose()
}

fn parse_uuid_column(row: &SqliteRow, col: &str) -> Result<Uuid> {
    let s: String = row.try_get(col)?;
    Uuid::parse_str(&s).map_err(|e| Error::Internal(format!("Invalid UUID in {}: {}", col, e)))
}

/// Map a raw row to the shared model
fn record_from_row(row: &SqliteRow) -> Result<ProgressRecord> {
    let placement_type: String = row.try_get("placement_type")?;
    let placement = PlacementKey::from_parts(
        &placement_type,
        parse_uuid_column(row, "placement_id")?,
    )?;

    let kind_str: String = row.try_get("kind")?;
    let kind = ContentKind::parse(&kind_str)?;

    let payload_json: String = row.try_get("payload")?;
    let payload: ProgressPayload = serde_json::from_str(&payload_json)
        .map_err(|e| Error::Internal(format!("Invalid stored payload: {}", e)))?;

    Ok(ProgressRecord {
        guid: parse_uuid_column(row, "guid")?,
        user_id: parse_uuid_column(row, "user_id")?,
        course_id: parse_uuid_column(row, "course_id")?,
        client_id: parse_uuid_column(row, "client_id")?,
        placement,
        package_id: parse_uuid_column(row, "package_id")?,
        kind,
        position_seconds: row.try_get("position_seconds")?,
        duration_seconds: row.try_get("duration_seconds")?,
        percent_progress: row.try_get("percent_progress")?,
        status: row.try_get("status")?,
        is_completed: row.try_get::<i64, _>("is_completed")? != 0,
        completed_at: row.try_get("completed_at")?,
        play_count: row.try_get("play_count")?,
        last_interaction_at: row.try_get("last_interaction_at")?,
        payload,
    })
}
