/// Database migration runner
///
/// Each service has its own database and its own migration set:
///
/// - `migrations/auth`: users, user_sessions, refresh_tokens, login_attempts
/// - `migrations/tasks`: categories, tasks (and their enum types)
///
/// Migrations are embedded at compile time with `sqlx::migrate!`.
///
/// # Example
///
/// ```no_run
/// use taskdesk_shared::db::migrations::run_auth_migrations;
/// use taskdesk_shared::db::pool::{create_pool, PoolConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pool = create_pool(PoolConfig {
///         url: std::env::var("DATABASE_URL")?,
///         ..Default::default()
///     })
///     .await?;
///
///     run_auth_migrations(&pool).await?;
///     Ok(())
/// }
/// ```

use sqlx::{
    migrate::{MigrateDatabase, MigrateError, Migrator},
    postgres::PgPool,
    Postgres,
};
use tracing::{debug, info, warn};

static AUTH_MIGRATOR: Migrator = sqlx::migrate!("../migrations/auth");
static TASK_MIGRATOR: Migrator = sqlx::migrate!("../migrations/tasks");

/// Migration status information
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    /// Number of successfully applied migrations
    pub applied_migrations: usize,

    /// Latest applied migration version
    pub latest_version: Option<i64>,

    /// Whether every embedded migration has been applied
    pub is_up_to_date: bool,
}

async fn run(migrator: &Migrator, pool: &PgPool, name: &str) -> Result<(), MigrateError> {
    info!(schema = name, "Starting database migrations");

    match migrator.run(pool).await {
        Ok(()) => {
            info!(schema = name, "Database migrations completed");
            Ok(())
        }
        Err(e) => {
            warn!(schema = name, error = %e, "Migration failed");
            Err(e)
        }
    }
}

/// Applies pending migrations of the authentication database
pub async fn run_auth_migrations(pool: &PgPool) -> Result<(), MigrateError> {
    run(&AUTH_MIGRATOR, pool, "auth").await
}

/// Applies pending migrations of the task database
pub async fn run_task_migrations(pool: &PgPool) -> Result<(), MigrateError> {
    run(&TASK_MIGRATOR, pool, "tasks").await
}

/// Number of embedded auth migrations
pub fn auth_migration_count() -> usize {
    AUTH_MIGRATOR.iter().count()
}

/// Number of embedded task migrations
pub fn task_migration_count() -> usize {
    TASK_MIGRATOR.iter().count()
}

/// Reads `_sqlx_migrations` and compares it with `expected` migrations
pub async fn get_migration_status(
    pool: &PgPool,
    expected: usize,
) -> Result<MigrationStatus, sqlx::Error> {
    debug!("Checking migration status");

    let table_exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (
            SELECT FROM information_schema.tables
            WHERE table_schema = 'public'
            AND table_name = '_sqlx_migrations'
        )",
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(MigrationStatus {
            applied_migrations: 0,
            latest_version: None,
            is_up_to_date: expected == 0,
        });
    }

    let (count, latest_version): (i64, Option<i64>) = sqlx::query_as(
        "SELECT COUNT(*), MAX(version) FROM _sqlx_migrations WHERE success = true",
    )
    .fetch_one(pool)
    .await?;

    let applied = count as usize;
    Ok(MigrationStatus {
        applied_migrations: applied,
        latest_version,
        is_up_to_date: applied >= expected,
    })
}

/// Creates the database if it doesn't exist (development and tests)
pub async fn ensure_database_exists(database_url: &str) -> Result<(), sqlx::Error> {
    if !Postgres::database_exists(database_url).await? {
        info!("Database does not exist, creating it");
        Postgres::create_database(database_url).await?;
    } else {
        debug!("Database already exists");
    }

    Ok(())
}
