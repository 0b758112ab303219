//! Shared test fixtures: in-memory database, seeded course structure

use cw_common::RequestContext;
use cw_progress::{build_router, AppState};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use uuid::Uuid;

pub async fn setup_test_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .connect("sqlite::memory:")
        .await
        .expect("Should open in-memory database");
    cw_common::db::create_schema(&pool)
        .await
        .expect("Should create schema");
    pool
}

pub fn setup_app(db: SqlitePool) -> axum::Router {
    build_router(AppState::new(db))
}

pub fn test_ctx() -> RequestContext {
    RequestContext::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4())
}

pub async fn enroll(pool: &SqlitePool, ctx: &RequestContext) {
    sqlx::query("INSERT INTO enrollments (guid, user_id, course_id, client_id) VALUES (?, ?, ?, ?)")
        .bind(Uuid::new_v4().to_string())
        .bind(ctx.user_id.to_string())
        .bind(ctx.course_id.to_string())
        .bind(ctx.client_id.to_string())
        .execute(pool)
        .await
        .expect("Should enroll");
}

pub async fn seed_package(pool: &SqlitePool, kind: &str, threshold: Option<f64>) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO content_packages (guid, kind, title, completion_threshold)
         VALUES (?, ?, 'test package', ?)",
    )
    .bind(id.to_string())
    .bind(kind)
    .bind(threshold)
    .execute(pool)
    .await
    .expect("Should insert package");
    id
}

pub async fn seed_module(pool: &SqlitePool, course_id: Uuid) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO course_modules (guid, course_id, title) VALUES (?, ?, 'module')")
        .bind(id.to_string())
        .bind(course_id.to_string())
        .execute(pool)
        .await
        .expect("Should insert module");
    id
}

pub async fn seed_module_content(
    pool: &SqlitePool,
    course_id: Uuid,
    module_id: Uuid,
    package_id: Uuid,
    kind: &str,
) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO module_contents (guid, course_id, module_id, package_id, kind)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(course_id.to_string())
    .bind(module_id.to_string())
    .bind(package_id.to_string())
    .bind(kind)
    .execute(pool)
    .await
    .expect("Should insert module content");
    id
}

pub async fn seed_prerequisite(
    pool: &SqlitePool,
    course_id: Uuid,
    package_id: Uuid,
    kind: &str,
) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO course_prerequisites (guid, course_id, package_id, kind) VALUES (?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(course_id.to_string())
    .bind(package_id.to_string())
    .bind(kind)
    .execute(pool)
    .await
    .expect("Should insert prerequisite");
    id
}
