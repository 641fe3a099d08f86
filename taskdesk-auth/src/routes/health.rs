/// Health check endpoint
///
/// Provides a simple health check endpoint that verifies:
/// - The server is running
/// - Database connectivity
/// - Redis connectivity
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "database": "connected",
///   "redis": "connected"
/// }
/// ```
///
/// `status` is `degraded` when either dependency is down.

use crate::app::AppState;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use taskdesk_shared::{db::pool::health_check as db_health_check, error::ApiResult};

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Application version
    pub version: String,

    /// Database status
    pub database: String,

    /// Redis status
    pub redis: String,
}

fn label(up: bool) -> &'static str {
    if up {
        "connected"
    } else {
        "disconnected"
    }
}

pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let database_up = db_health_check(&state.db).await.is_ok();
    let redis_up = matches!(state.redis.ping().await, Ok(true));

    Ok(Json(HealthResponse {
        status: if database_up && redis_up {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: label(database_up).to_string(),
        redis: label(redis_up).to_string(),
    }))
}
