//! # TaskDesk Task Service
//!
//! Category and task management. Every `/v1` request is authenticated by
//! the auth service's verify-token endpoint.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p taskdesk-tasks
//! ```

use std::sync::Arc;
use taskdesk_shared::{
    db::{
        migrations::run_task_migrations,
        pool::{close_pool, create_pool, PoolConfig},
    },
    telemetry::init_tracing,
};
use taskdesk_tasks::{
    app::{build_router, AppState},
    auth_client::AuthServiceClient,
    config::Config,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing("taskdesk_tasks=debug,tower_http=debug");

    tracing::info!(
        "TaskDesk task service v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let pool = create_pool(PoolConfig::from(&config.database)).await?;
    run_task_migrations(&pool).await?;
    tracing::info!("Task database migrations applied");

    let verifier = AuthServiceClient::new(&config.auth_service)?;
    tracing::info!(auth_service = %verifier.base_url(), "Using auth service");

    let bind_address = config.server.bind_address();
    let app = build_router(AppState::new(pool.clone(), Arc::new(verifier), config));

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Task service listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    close_pool(pool).await;
    tracing::info!("Task service stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received, draining connections...");
}
