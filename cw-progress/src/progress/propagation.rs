//! Shared-completion propagation
//!
//! A course may attach the same content package in several places: as
//! module content, as a prerequisite, as a postrequisite. Completing the
//! package at one placement completes it everywhere, so a confirmed
//! completion fans out: each sibling placement without a progress record
//! gets one carrying a value-copy of the triggering record's terminal
//! state.
//!
//! Propagation is best-effort amplification. The triggering record's
//! completion is the authoritative event; a sibling write failure is
//! logged and skipped, and is recovered by re-running propagation on the
//! next interaction with any sibling.

use crate::db::{placements, progress};
use crate::db::progress::ProgressUpdate;
use crate::error::Result;
use chrono::Utc;
use cw_common::db::models::{ContentPackageRef, PlacementKey, ProgressRecord};
use cw_common::RequestContext;
use sqlx::SqlitePool;
use tracing::{debug, warn};

/// Fan a confirmed completion of `package` out to every sibling placement
/// in the course.
///
/// No-op unless a completed record exists for the triggering placement (or,
/// when that placement has no record, for the package as a whole). Safe to
/// re-run: siblings that already have a record are skipped untouched.
pub async fn propagate(
    pool: &SqlitePool,
    ctx: &RequestContext,
    package: &ContentPackageRef,
    triggering: &PlacementKey,
) -> Result<()> {
    // Triggering record, falling back to the freshest record for the
    // package when the caller's placement has none (a prerequisite
    // completion arriving by package id only).
    let source = match progress::find_by_placement(pool, ctx, triggering).await? {
        Some(record) => record,
        None => match progress::latest_for_package(pool, ctx, package.package_id).await? {
            Some(record) => record,
            None => return Ok(()),
        },
    };

    // Never speculative: only confirmed completions fan out
    if !source.is_completed {
        return Ok(());
    }

    let siblings =
        placements::find_sibling_placements(pool, ctx.course_id, package, &source.placement)
            .await?;

    for sibling in siblings {
        match clone_to_sibling(pool, ctx, package, &source, &sibling).await {
            Ok(true) => {
                debug!(
                    user_id = %ctx.user_id,
                    course_id = %ctx.course_id,
                    package_id = %package.package_id,
                    placement_type = sibling.type_str(),
                    placement_id = %sibling.row_id(),
                    "Propagated completion to sibling placement"
                );
            }
            Ok(false) => {} // sibling already has its own record
            Err(e) => {
                // Triggering completion stands; this sibling is retried on
                // its next interaction
                warn!(
                    user_id = %ctx.user_id,
                    course_id = %ctx.course_id,
                    package_id = %package.package_id,
                    placement_type = sibling.type_str(),
                    placement_id = %sibling.row_id(),
                    "Propagation to sibling placement failed: {}",
                    e
                );
            }
        }
    }

    Ok(())
}

/// Create a completed record for one sibling placement.
///
/// Returns false when the sibling already has a record of its own
/// (idempotence: re-running propagation never duplicates or resets one).
async fn clone_to_sibling(
    pool: &SqlitePool,
    ctx: &RequestContext,
    package: &ContentPackageRef,
    source: &ProgressRecord,
    sibling: &PlacementKey,
) -> Result<bool> {
    if progress::find_by_placement(pool, ctx, sibling).await?.is_some() {
        return Ok(false);
    }

    // The natural-key unique index makes the create a fetch if another
    // propagation won the race between the check above and this insert.
    let record = progress::get_or_create(pool, ctx, sibling, package).await?;
    if record.is_completed {
        return Ok(false);
    }

    // Value-copy of the triggering record's interaction fields at the
    // moment of propagation; the sibling record is independently owned
    // thereafter.
    progress::update(
        pool,
        record.guid,
        &ProgressUpdate {
            position_seconds: Some(source.position_seconds),
            duration_seconds: Some(source.duration_seconds),
            percent_progress: Some(source.percent_progress),
            status: Some(source.status.clone()),
            set_completed: true,
            completed_at: Some(Utc::now()),
            increment_play_count: false,
            payload: Some(source.payload.clone()),
        },
    )
    .await?;

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cw_common::db::models::ContentKind;
    use sqlx::sqlite::SqlitePoolOptions;
    use uuid::Uuid;

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();
        cw_common::db::create_schema(&pool).await.unwrap();
        pool
    }

    struct Fixture {
        ctx: RequestContext,
        package: ContentPackageRef,
        module_placement: PlacementKey,
        prereq_placement: PlacementKey,
    }

    /// One course with the same audio package attached as module content
    /// and as a prerequisite
    async fn seed_dual_placement(pool: &SqlitePool) -> Fixture {
        let ctx = RequestContext::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let package_id = Uuid::new_v4();
        sqlx::query("INSERT INTO content_packages (guid, kind, title) VALUES (?, 'audio', 'a')")
            .bind(package_id.to_string())
            .execute(pool)
            .await
            .unwrap();

        let module_id = Uuid::new_v4();
        sqlx::query("INSERT INTO course_modules (guid, course_id, title) VALUES (?, ?, 'm')")
            .bind(module_id.to_string())
            .bind(ctx.course_id.to_string())
            .execute(pool)
            .await
            .unwrap();

        let content_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO module_contents (guid, course_id, module_id, package_id, kind)
             VALUES (?, ?, ?, ?, 'audio')",
        )
        .bind(content_id.to_string())
        .bind(ctx.course_id.to_string())
        .bind(module_id.to_string())
        .bind(package_id.to_string())
        .execute(pool)
        .await
        .unwrap();

        let prereq_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO course_prerequisites (guid, course_id, package_id, kind)
             VALUES (?, ?, ?, 'audio')",
        )
        .bind(prereq_id.to_string())
        .bind(ctx.course_id.to_string())
        .bind(package_id.to_string())
        .execute(pool)
        .await
        .unwrap();

        Fixture {
            ctx,
            package: ContentPackageRef {
                package_id,
                kind: ContentKind::Audio,
            },
            module_placement: PlacementKey::Module {
                module_content_id: content_id,
            },
            prereq_placement: PlacementKey::Prerequisite {
                prerequisite_row_id: prereq_id,
            },
        }
    }

    async fn complete_at(
        pool: &SqlitePool,
        ctx: &RequestContext,
        placement: &PlacementKey,
        package: &ContentPackageRef,
    ) -> ProgressRecord {
        let record = progress::get_or_create(pool, ctx, placement, package)
            .await
            .unwrap();
        progress::update(
            pool,
            record.guid,
            &ProgressUpdate {
                position_seconds: Some(100.0),
                duration_seconds: Some(120.0),
                percent_progress: Some(83.33),
                status: Some("completed".to_string()),
                set_completed: true,
                completed_at: Some(Utc::now()),
                increment_play_count: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        progress::get_by_id(pool, record.guid).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_prerequisite_completion_fans_out_to_module() {
        let pool = setup_test_db().await;
        let fx = seed_dual_placement(&pool).await;

        complete_at(&pool, &fx.ctx, &fx.prereq_placement, &fx.package).await;
        propagate(&pool, &fx.ctx, &fx.package, &fx.prereq_placement)
            .await
            .unwrap();

        let cloned = progress::find_by_placement(&pool, &fx.ctx, &fx.module_placement)
            .await
            .unwrap()
            .expect("module placement should have a propagated record");
        assert!(cloned.is_completed);
        assert!(cloned.completed_at.is_some());
        // Value-copy of the triggering record's interaction fields
        assert_eq!(cloned.position_seconds, 100.0);
        assert_eq!(cloned.duration_seconds, 120.0);
        assert_eq!(cloned.percent_progress, 83.33);
        assert_eq!(cloned.status, "completed");
        // A clone is not a new attempt
        assert_eq!(cloned.play_count, 0);
    }

    #[tokio::test]
    async fn test_module_completion_fans_out_to_prerequisite() {
        let pool = setup_test_db().await;
        let fx = seed_dual_placement(&pool).await;

        complete_at(&pool, &fx.ctx, &fx.module_placement, &fx.package).await;
        propagate(&pool, &fx.ctx, &fx.package, &fx.module_placement)
            .await
            .unwrap();

        let cloned = progress::find_by_placement(&pool, &fx.ctx, &fx.prereq_placement)
            .await
            .unwrap()
            .expect("prerequisite placement should have a propagated record");
        assert!(cloned.is_completed);
    }

    #[tokio::test]
    async fn test_propagation_is_idempotent() {
        let pool = setup_test_db().await;
        let fx = seed_dual_placement(&pool).await;

        complete_at(&pool, &fx.ctx, &fx.prereq_placement, &fx.package).await;
        propagate(&pool, &fx.ctx, &fx.package, &fx.prereq_placement)
            .await
            .unwrap();

        let first = progress::find_by_placement(&pool, &fx.ctx, &fx.module_placement)
            .await
            .unwrap()
            .unwrap();

        propagate(&pool, &fx.ctx, &fx.package, &fx.prereq_placement)
            .await
            .unwrap();

        let second = progress::find_by_placement(&pool, &fx.ctx, &fx.module_placement)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(first.guid, second.guid);
        assert_eq!(first.completed_at, second.completed_at);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM progress_records")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_incomplete_record_does_not_propagate() {
        let pool = setup_test_db().await;
        let fx = seed_dual_placement(&pool).await;

        // Record exists but is not completed
        progress::get_or_create(&pool, &fx.ctx, &fx.prereq_placement, &fx.package)
            .await
            .unwrap();
        propagate(&pool, &fx.ctx, &fx.package, &fx.prereq_placement)
            .await
            .unwrap();

        assert!(progress::find_by_placement(&pool, &fx.ctx, &fx.module_placement)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_no_record_at_all_is_a_noop() {
        let pool = setup_test_db().await;
        let fx = seed_dual_placement(&pool).await;

        propagate(&pool, &fx.ctx, &fx.package, &fx.prereq_placement)
            .await
            .unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM progress_records")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_existing_sibling_record_is_left_alone() {
        let pool = setup_test_db().await;
        let fx = seed_dual_placement(&pool).await;

        // Learner already has independent progress at the module placement
        let own = progress::get_or_create(&pool, &fx.ctx, &fx.module_placement, &fx.package)
            .await
            .unwrap();
        progress::update(
            &pool,
            own.guid,
            &ProgressUpdate {
                position_seconds: Some(10.0),
                percent_progress: Some(8.33),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        complete_at(&pool, &fx.ctx, &fx.prereq_placement, &fx.package).await;
        propagate(&pool, &fx.ctx, &fx.package, &fx.prereq_placement)
            .await
            .unwrap();

        let after = progress::get_by_id(&pool, own.guid).await.unwrap().unwrap();
        assert!(!after.is_completed);
        assert_eq!(after.position_seconds, 10.0);
    }

    #[tokio::test]
    async fn test_no_cross_course_leakage() {
        let pool = setup_test_db().await;
        let fx = seed_dual_placement(&pool).await;

        // Same package attached in a second course for the same user
        let other_course = Uuid::new_v4();
        let other_module = Uuid::new_v4();
        sqlx::query("INSERT INTO course_modules (guid, course_id, title) VALUES (?, ?, 'm')")
            .bind(other_module.to_string())
            .bind(other_course.to_string())
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO module_contents (guid, course_id, module_id, package_id, kind)
             VALUES (?, ?, ?, ?, 'audio')",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(other_course.to_string())
        .bind(other_module.to_string())
        .bind(fx.package.package_id.to_string())
        .execute(&pool)
        .await
        .unwrap();

        complete_at(&pool, &fx.ctx, &fx.prereq_placement, &fx.package).await;
        propagate(&pool, &fx.ctx, &fx.package, &fx.prereq_placement)
            .await
            .unwrap();

        let other_course_rows: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM progress_records WHERE course_id = ?",
        )
        .bind(other_course.to_string())
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(other_course_rows, 0);
    }
}
