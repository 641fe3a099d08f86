/// Database layer
///
/// # Modules
///
/// - `pool`: PostgreSQL connection pool with health checks
/// - `migrations`: Embedded migration sets for the auth and task databases
/// - Models live in the crate-level `models` module
///
/// # Example
///
/// ```no_run
/// use taskdesk_shared::config::DatabaseSettings;
/// use taskdesk_shared::db::pool::{create_pool, PoolConfig};
///
/// # async fn example(settings: DatabaseSettings) -> Result<(), sqlx::Error> {
/// let pool = create_pool(PoolConfig::from(&settings)).await?;
/// # Ok(())
/// # }
/// ```

pub mod migrations;
pub mod pool;
