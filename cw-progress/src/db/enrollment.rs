//! Enrollment gate and whole-course progress aggregate
//!
//! `has_course_access` gates every progress call. The aggregate recompute
//! runs after any completed or propagated write: percent complete is the
//! share of live module-content rows (role `content`) whose placement has a
//! completed progress record for this learner.

use crate::error::Result;
use cw_common::RequestContext;
use sqlx::SqlitePool;

/// True when the learner is enrolled in the course under this client
pub async fn has_course_access(pool: &SqlitePool, ctx: &RequestContext) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM enrollments WHERE user_id = ? AND course_id = ? AND client_id = ?",
    )
    .bind(ctx.user_id.to_string())
    .bind(ctx.course_id.to_string())
    .bind(ctx.client_id.to_string())
    .fetch_one(pool)
    .await?;

    Ok(count > 0)
}

/// Recompute and persist the enrollment's percent-complete.
///
/// Returns the new percent (0 when the course has no trackable content).
pub async fn recalculate_course_progress(pool: &SqlitePool, ctx: &RequestContext) -> Result<f64> {
    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM module_contents mc
        JOIN course_modules m ON mc.module_id = m.guid
        WHERE mc.course_id = ? AND mc.role = 'content'
          AND mc.deleted = 0 AND m.deleted = 0
        "#,
    )
    .bind(ctx.course_id.to_string())
    .fetch_one(pool)
    .await?;

    if total == 0 {
        return Ok(0.0);
    }

    let completed: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM module_contents mc
        JOIN course_modules m ON mc.module_id = m.guid
        JOIN progress_records pr
            ON pr.placement_type = 'module'
           AND pr.placement_id = mc.guid
           AND pr.user_id = ?
           AND pr.course_id = ?
           AND pr.client_id = ?
           AND pr.is_completed = 1
        WHERE mc.course_id = ? AND mc.role = 'content'
          AND mc.deleted = 0 AND m.deleted = 0
        "#,
    )
    .bind(ctx.user_id.to_string())
    .bind(ctx.course_id.to_string())
    .bind(ctx.client_id.to_string())
    .bind(ctx.course_id.to_string())
    .fetch_one(pool)
    .await?;

    let percent = ((completed as f64 / total as f64) * 100.0 * 100.0).round() / 100.0;

    sqlx::query(
        "UPDATE enrollments SET progress_percent = ?
         WHERE user_id = ? AND course_id = ? AND client_id = ?",
    )
    .bind(percent)
    .bind(ctx.user_id.to_string())
    .bind(ctx.course_id.to_string())
    .bind(ctx.client_id.to_string())
    .execute(pool)
    .await?;

    Ok(percent)
}

/// Read back the stored aggregate for an enrollment
pub async fn get_course_progress(pool: &SqlitePool, ctx: &RequestContext) -> Result<Option<f64>> {
    let percent: Option<f64> = sqlx::query_scalar(
        "SELECT progress_percent FROM enrollments
         WHERE user_id = ? AND course_id = ? AND client_id = ?",
    )
    .bind(ctx.user_id.to_string())
    .bind(ctx.course_id.to_string())
    .bind(ctx.client_id.to_string())
    .fetch_optional(pool)
    .await?;

    Ok(percent)
}
