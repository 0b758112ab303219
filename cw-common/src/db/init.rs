//! Database initialization
//!
//! Creates the database on first run and brings the schema up to date.
//! All `create_*_table` statements are idempotent (CREATE TABLE IF NOT
//! EXISTS), so init is safe to run on every startup.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(20)
        .min_connections(5)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;

    // WAL mode: concurrent readers with one writer. Interaction events from
    // content players arrive in bursts (ping + beacon + explicit save), so
    // write concurrency matters here.
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables and indexes (idempotent)
///
/// Exposed separately from [`init_database`] so tests can build the schema
/// on a `sqlite::memory:` pool.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_content_packages_table(pool).await?;
    create_course_modules_table(pool).await?;
    create_module_contents_table(pool).await?;
    create_course_prerequisites_table(pool).await?;
    create_enrollments_table(pool).await?;
    create_progress_records_table(pool).await?;
    Ok(())
}

async fn create_content_packages_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS content_packages (
            guid TEXT PRIMARY KEY,
            kind TEXT NOT NULL CHECK (kind IN ('scorm', 'audio')),
            title TEXT NOT NULL,
            launch_path TEXT NOT NULL DEFAULT '',
            completion_threshold REAL,
            max_attempts INTEGER,
            deleted INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_course_modules_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS course_modules (
            guid TEXT PRIMARY KEY,
            course_id TEXT NOT NULL,
            title TEXT NOT NULL,
            position INTEGER NOT NULL DEFAULT 0,
            deleted INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_course_modules_course
         ON course_modules (course_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_module_contents_table(pool: &SqlitePool) -> Result<()> {
    // role 'postrequisite' rows gate course completion; same shape otherwise
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS module_contents (
            guid TEXT PRIMARY KEY,
            course_id TEXT NOT NULL,
            module_id TEXT NOT NULL REFERENCES course_modules(guid),
            package_id TEXT NOT NULL REFERENCES content_packages(guid),
            kind TEXT NOT NULL CHECK (kind IN ('scorm', 'audio')),
            role TEXT NOT NULL DEFAULT 'content'
                CHECK (role IN ('content', 'postrequisite')),
            position INTEGER NOT NULL DEFAULT 0,
            deleted INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_module_contents_course_package
         ON module_contents (course_id, package_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_course_prerequisites_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS course_prerequisites (
            guid TEXT PRIMARY KEY,
            course_id TEXT NOT NULL,
            package_id TEXT NOT NULL REFERENCES content_packages(guid),
            kind TEXT NOT NULL CHECK (kind IN ('scorm', 'audio')),
            deleted INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_course_prerequisites_course_package
         ON course_prerequisites (course_id, package_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_enrollments_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS enrollments (
            guid TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            course_id TEXT NOT NULL,
            client_id TEXT NOT NULL,
            progress_percent REAL NOT NULL DEFAULT 0,
            enrolled_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (user_id, course_id, client_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_progress_records_table(pool: &SqlitePool) -> Result<()> {
    // The UNIQUE constraint on the natural key is what makes get-or-create
    // race-safe: a second concurrent insert becomes a no-op and the
    // follow-up select finds the winner's row.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS progress_records (
            guid TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            course_id TEXT NOT NULL,
            client_id TEXT NOT NULL,
            placement_type TEXT NOT NULL
                CHECK (placement_type IN ('module', 'prerequisite', 'postrequisite')),
            placement_id TEXT NOT NULL,
            package_id TEXT NOT NULL,
            kind TEXT NOT NULL CHECK (kind IN ('scorm', 'audio')),
            position_seconds REAL NOT NULL DEFAULT 0,
            duration_seconds REAL NOT NULL DEFAULT 0,
            percent_progress REAL NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'not attempted',
            is_completed INTEGER NOT NULL DEFAULT 0,
            completed_at TEXT,
            play_count INTEGER NOT NULL DEFAULT 0,
            last_interaction_at TEXT NOT NULL,
            payload TEXT NOT NULL DEFAULT '{}',
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (user_id, course_id, client_id, placement_type, placement_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_progress_records_package
         ON progress_records (user_id, course_id, client_id, package_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
