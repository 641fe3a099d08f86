//! # TaskDesk Authentication Service
//!
//! Issues and verifies the tokens used across TaskDesk:
//! - Registration and login (email or username)
//! - Access/refresh token pairs bound to server-side sessions
//! - Refresh token rotation with reuse detection
//! - Token verification for the task service
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p taskdesk-auth
//! ```

use chrono::{Duration as ChronoDuration, Utc};
use std::{net::SocketAddr, time::Duration};
use taskdesk_auth::{
    app::{build_router, AppState},
    config::Config,
    service::AuthService,
};
use taskdesk_shared::{
    db::{
        migrations::run_auth_migrations,
        pool::{close_pool, create_pool, PoolConfig},
    },
    redis::{client::sanitize_url, RedisClient},
    telemetry::init_tracing,
};

/// How often expired sessions and refresh tokens are purged
const PURGE_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing("taskdesk_auth=debug,tower_http=debug");

    tracing::info!(
        "TaskDesk auth service v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let pool = create_pool(PoolConfig::from(&config.database)).await?;
    run_auth_migrations(&pool).await?;
    tracing::info!("Auth database migrations applied");

    let redis = RedisClient::new(config.redis.clone()).await?;
    tracing::info!(url = %sanitize_url(&config.redis.url), "Connected to Redis");

    let bind_address = config.server.bind_address();
    let state = AppState::new(pool.clone(), redis, config);
    tokio::spawn(purge_expired(state.auth.clone()));

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Auth service listening on http://{}", bind_address);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    close_pool(pool).await;
    tracing::info!("Auth service stopped");

    Ok(())
}

/// Removes rows that expired more than a day ago, once per interval
async fn purge_expired(auth: AuthService) {
    let mut ticker = tokio::time::interval(PURGE_INTERVAL);
    loop {
        ticker.tick().await;
        match auth.purge_expired(Utc::now() - ChronoDuration::days(1)).await {
            Ok((sessions, tokens)) if sessions + tokens > 0 => {
                tracing::info!(sessions, tokens, "Purged expired sessions");
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Failed to purge expired sessions"),
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received, draining connections...");
}
