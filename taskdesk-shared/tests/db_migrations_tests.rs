/// Integration tests for the per-service migration sets
///
/// These tests require running PostgreSQL databases. The auth and task
/// schemas live in separate databases:
///
/// export AUTH_TEST_DATABASE_URL="postgresql://localhost/taskdesk_auth_test"
/// export TASKS_TEST_DATABASE_URL="postgresql://localhost/taskdesk_tasks_test"
///
/// Run with: cargo test -p taskdesk-shared --test db_migrations_tests -- --ignored --test-threads=1

use sqlx::PgPool;
use std::env;
use taskdesk_shared::db::migrations::{
    auth_migration_count, ensure_database_exists, get_migration_status, run_auth_migrations,
    run_task_migrations, task_migration_count,
};
use taskdesk_shared::db::pool::{close_pool, create_pool, PoolConfig};

fn auth_database_url() -> String {
    env::var("AUTH_TEST_DATABASE_URL")
        .unwrap_or_else(|_| "postgresql://localhost/taskdesk_auth_test".to_string())
}

fn tasks_database_url() -> String {
    env::var("TASKS_TEST_DATABASE_URL")
        .unwrap_or_else(|_| "postgresql://localhost/taskdesk_tasks_test".to_string())
}

async fn connect(url: String) -> PgPool {
    ensure_database_exists(&url)
        .await
        .expect("Failed to create database");
    create_pool(PoolConfig {
        url,
        ..Default::default()
    })
    .await
    .expect("Failed to create pool")
}

async fn table_exists(pool: &PgPool, table: &str) -> bool {
    sqlx::query_scalar(
        "SELECT EXISTS (
            SELECT FROM information_schema.tables
            WHERE table_schema = 'public' AND table_name = $1
        )",
    )
    .bind(table)
    .fetch_one(pool)
    .await
    .expect("Failed to query information_schema")
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn test_auth_migrations_create_tables() {
    let pool = connect(auth_database_url()).await;

    run_auth_migrations(&pool).await.expect("Auth migrations failed");

    for table in ["users", "user_sessions", "refresh_tokens", "login_attempts"] {
        assert!(table_exists(&pool, table).await, "missing table {}", table);
    }

    let status = get_migration_status(&pool, auth_migration_count())
        .await
        .expect("Failed to get migration status");
    assert!(status.is_up_to_date);
    assert!(status.latest_version.is_some());

    close_pool(pool).await;
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn test_task_migrations_create_tables() {
    let pool = connect(tasks_database_url()).await;

    run_task_migrations(&pool).await.expect("Task migrations failed");

    assert!(table_exists(&pool, "categories").await);
    assert!(table_exists(&pool, "tasks").await);
    // Task rows reference users by id only; the users table lives elsewhere
    assert!(!table_exists(&pool, "users").await);

    let status = get_migration_status(&pool, task_migration_count())
        .await
        .expect("Failed to get migration status");
    assert_eq!(status.applied_migrations, task_migration_count());
    assert!(status.is_up_to_date);

    close_pool(pool).await;
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn test_migrations_are_idempotent() {
    let pool = connect(auth_database_url()).await;

    run_auth_migrations(&pool).await.expect("First run failed");
    run_auth_migrations(&pool).await.expect("Second run failed");

    let status = get_migration_status(&pool, auth_migration_count())
        .await
        .expect("Failed to get migration status");
    assert_eq!(status.applied_migrations, auth_migration_count());

    close_pool(pool).await;
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn test_task_status_enum_rejects_unknown_values() {
    let pool = connect(tasks_database_url()).await;
    run_task_migrations(&pool).await.expect("Task migrations failed");

    let result = sqlx::query("SELECT 'archived'::task_status")
        .execute(&pool)
        .await;
    assert!(result.is_err());

    let ok: String = sqlx::query_scalar("SELECT 'in_progress'::task_status::text")
        .fetch_one(&pool)
        .await
        .expect("in_progress should be a valid status");
    assert_eq!(ok, "in_progress");

    close_pool(pool).await;
}
