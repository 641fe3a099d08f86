/// Health check endpoint
///
/// ```text
/// GET /health
/// ```
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "database": "connected",
///   "auth_service": "reachable"
/// }
/// ```

use crate::app::AppState;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use taskdesk_shared::{db::pool::health_check as db_health_check, error::ApiResult};

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,
    pub auth_service: String,
}

pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let database_up = db_health_check(&state.db).await.is_ok();
    let auth_up = state.verifier.is_reachable().await;

    Ok(Json(HealthResponse {
        status: if database_up && auth_up { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: if database_up { "connected" } else { "disconnected" }.to_string(),
        auth_service: if auth_up { "reachable" } else { "unreachable" }.to_string(),
    }))
}
