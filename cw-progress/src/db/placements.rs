//! Content placement resolution
//!
//! Finds every placement of a content package within one course: rows in
//! the module-content listing (roles `content` and `postrequisite`) and
//! rows in the prerequisite listing. Soft-deleted rows and rows under
//! soft-deleted modules never count as placements.

use crate::error::Result;
use cw_common::db::models::{ContentPackageRef, PlacementKey};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Every placement of `package` in `course_id` other than `exclude`.
///
/// The result is a set; ordering is irrelevant. Zero siblings is the
/// typical case (most content is attached once).
pub async fn find_sibling_placements(
    pool: &SqlitePool,
    course_id: Uuid,
    package: &ContentPackageRef,
    exclude: &PlacementKey,
) -> Result<Vec<PlacementKey>> {
    let mut placements = Vec::new();

    let module_rows: Vec<(String, String)> = sqlx::query_as(
        r#"
        SELECT mc.guid, mc.role
        FROM module_contents mc
        JOIN course_modules m ON mc.module_id = m.guid
        WHERE mc.course_id = ?
          AND mc.package_id = ?
          AND mc.kind = ?
          AND mc.deleted = 0
          AND m.deleted = 0
        "#,
    )
    .bind(course_id.to_string())
    .bind(package.package_id.to_string())
    .bind(package.kind.as_str())
    .fetch_all(pool)
    .await?;

    for (guid, role) in module_rows {
        let module_content_id = Uuid::parse_str(&guid).map_err(|e| {
            crate::error::Error::Internal(format!("Invalid UUID in module_contents: {}", e))
        })?;
        let key = if role == "postrequisite" {
            PlacementKey::Postrequisite { module_content_id }
        } else {
            PlacementKey::Module { module_content_id }
        };
        placements.push(key);
    }

    let prereq_rows: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT guid
        FROM course_prerequisites
        WHERE course_id = ? AND package_id = ? AND kind = ? AND deleted = 0
        "#,
    )
    .bind(course_id.to_string())
    .bind(package.package_id.to_string())
    .bind(package.kind.as_str())
    .fetch_all(pool)
    .await?;

    for (guid,) in prereq_rows {
        let prerequisite_row_id = Uuid::parse_str(&guid).map_err(|e| {
            crate::error::Error::Internal(format!("Invalid UUID in course_prerequisites: {}", e))
        })?;
        placements.push(PlacementKey::Prerequisite { prerequisite_row_id });
    }

    placements.retain(|p| p != exclude);
    Ok(placements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cw_common::db::models::ContentKind;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();
        cw_common::db::create_schema(&pool).await.unwrap();
        pool
    }

    async fn seed_package(pool: &SqlitePool, kind: &str) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO content_packages (guid, kind, title) VALUES (?, ?, 'pkg')")
            .bind(id.to_string())
            .bind(kind)
            .execute(pool)
            .await
            .unwrap();
        id
    }

    async fn seed_module(pool: &SqlitePool, course_id: Uuid, deleted: bool) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO course_modules (guid, course_id, title, deleted) VALUES (?, ?, 'mod', ?)",
        )
        .bind(id.to_string())
        .bind(course_id.to_string())
        .bind(deleted as i64)
        .execute(pool)
        .await
        .unwrap();
        id
    }

    async fn seed_module_content(
        pool: &SqlitePool,
        course_id: Uuid,
        module_id: Uuid,
        package_id: Uuid,
        role: &str,
        deleted: bool,
    ) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO module_contents (guid, course_id, module_id, package_id, kind, role, deleted)
             VALUES (?, ?, ?, ?, 'audio', ?, ?)",
        )
        .bind(id.to_string())
        .bind(course_id.to_string())
        .bind(module_id.to_string())
        .bind(package_id.to_string())
        .bind(role)
        .bind(deleted as i64)
        .execute(pool)
        .await
        .unwrap();
        id
    }

    async fn seed_prerequisite(
        pool: &SqlitePool,
        course_id: Uuid,
        package_id: Uuid,
        deleted: bool,
    ) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO course_prerequisites (guid, course_id, package_id, kind, deleted)
             VALUES (?, ?, ?, 'audio', ?)",
        )
        .bind(id.to_string())
        .bind(course_id.to_string())
        .bind(package_id.to_string())
        .bind(deleted as i64)
        .execute(pool)
        .await
        .unwrap();
        id
    }

    #[tokio::test]
    async fn test_siblings_across_both_listings() {
        let pool = setup_test_db().await;
        let course_id = Uuid::new_v4();
        let package_id = seed_package(&pool, "audio").await;
        let module_id = seed_module(&pool, course_id, false).await;

        let content_id =
            seed_module_content(&pool, course_id, module_id, package_id, "content", false).await;
        let post_id = seed_module_content(
            &pool, course_id, module_id, package_id, "postrequisite", false,
        )
        .await;
        let prereq_id = seed_prerequisite(&pool, course_id, package_id, false).await;

        let package = ContentPackageRef {
            package_id,
            kind: ContentKind::Audio,
        };
        let origin = PlacementKey::Prerequisite {
            prerequisite_row_id: prereq_id,
        };

        let siblings = find_sibling_placements(&pool, course_id, &package, &origin)
            .await
            .unwrap();

        assert_eq!(siblings.len(), 2);
        assert!(siblings.contains(&PlacementKey::Module {
            module_content_id: content_id
        }));
        assert!(siblings.contains(&PlacementKey::Postrequisite {
            module_content_id: post_id
        }));
    }

    #[tokio::test]
    async fn test_originating_placement_excluded() {
        let pool = setup_test_db().await;
        let course_id = Uuid::new_v4();
        let package_id = seed_package(&pool, "audio").await;
        let module_id = seed_module(&pool, course_id, false).await;

        let content_id =
            seed_module_content(&pool, course_id, module_id, package_id, "content", false).await;

        let package = ContentPackageRef {
            package_id,
            kind: ContentKind::Audio,
        };
        let origin = PlacementKey::Module {
            module_content_id: content_id,
        };

        let siblings = find_sibling_placements(&pool, course_id, &package, &origin)
            .await
            .unwrap();
        assert!(siblings.is_empty());
    }

    #[tokio::test]
    async fn test_soft_deleted_rows_are_not_placements() {
        let pool = setup_test_db().await;
        let course_id = Uuid::new_v4();
        let package_id = seed_package(&pool, "audio").await;

        let live_module = seed_module(&pool, course_id, false).await;
        let dead_module = seed_module(&pool, course_id, true).await;

        // Deleted content row, content row under a deleted module, deleted prereq
        seed_module_content(&pool, course_id, live_module, package_id, "content", true).await;
        seed_module_content(&pool, course_id, dead_module, package_id, "content", false).await;
        seed_prerequisite(&pool, course_id, package_id, true).await;

        // One live prereq placement remains
        let prereq_id = seed_prerequisite(&pool, course_id, package_id, false).await;

        let package = ContentPackageRef {
            package_id,
            kind: ContentKind::Audio,
        };
        let origin = PlacementKey::Module {
            module_content_id: Uuid::new_v4(),
        };

        let siblings = find_sibling_placements(&pool, course_id, &package, &origin)
            .await
            .unwrap();
        assert_eq!(
            siblings,
            vec![PlacementKey::Prerequisite {
                prerequisite_row_id: prereq_id
            }]
        );
    }

    #[tokio::test]
    async fn test_other_courses_do_not_leak() {
        let pool = setup_test_db().await;
        let course_a = Uuid::new_v4();
        let course_b = Uuid::new_v4();
        let package_id = seed_package(&pool, "audio").await;

        let module_b = seed_module(&pool, course_b, false).await;
        seed_module_content(&pool, course_b, module_b, package_id, "content", false).await;

        let package = ContentPackageRef {
            package_id,
            kind: ContentKind::Audio,
        };
        let origin = PlacementKey::Module {
            module_content_id: Uuid::new_v4(),
        };

        let siblings = find_sibling_placements(&pool, course_a, &package, &origin)
            .await
            .unwrap();
        assert!(siblings.is_empty());
    }
}
