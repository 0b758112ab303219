//! Content-library metadata reads
//!
//! The progress core never manipulates package bytes or administration
//! fields; it only needs the tracking metadata below.

use crate::error::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Default audio completion threshold (percent listened)
pub const DEFAULT_COMPLETION_THRESHOLD: f64 = 80.0;

/// Tracking metadata for one content package
#[derive(Debug, Clone)]
pub struct PackageMetadata {
    pub launch_path: String,
    /// Percent-listened threshold for audio completion
    pub completion_threshold: f64,
    /// None = unlimited attempts
    pub max_attempts: Option<i64>,
}

/// Load tracking metadata for a package. Returns None when the package is
/// unknown or soft-deleted.
pub async fn get_package_metadata(
    pool: &SqlitePool,
    package_id: Uuid,
) -> Result<Option<PackageMetadata>> {
    let row: Option<(String, Option<f64>, Option<i64>)> = sqlx::query_as(
        r#"
        SELECT launch_path, completion_threshold, max_attempts
        FROM content_packages
        WHERE guid = ? AND deleted = 0
        "#,
    )
    .bind(package_id.to_string())
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(launch_path, threshold, max_attempts)| PackageMetadata {
        launch_path,
        completion_threshold: threshold.unwrap_or(DEFAULT_COMPLETION_THRESHOLD),
        // 0 and NULL both mean unlimited
        max_attempts: max_attempts.filter(|n| *n > 0),
    }))
}
