/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use taskdesk_tasks::{
///     app::{build_router, AppState},
///     auth_client::AuthServiceClient,
///     config::Config,
/// };
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let verifier = Arc::new(AuthServiceClient::new(&config.auth_service)?);
/// let app = build_router(AppState::new(pool, verifier, config));
/// # Ok(())
/// # }
/// ```

use crate::{auth_client::TokenVerifier, config::Config, middleware::require_auth};
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use taskdesk_shared::http::{cors_layer, SecurityHeadersLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Task database pool
    pub db: PgPool,

    /// Verifies bearer tokens against the auth service
    pub verifier: Arc<dyn TokenVerifier>,

    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: PgPool, verifier: Arc<dyn TokenVerifier>, config: Config) -> Self {
        Self {
            db,
            verifier,
            config: Arc::new(config),
        }
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// ```text
/// /
/// ├── /health                          # public
/// └── /v1/                             # bearer token, verified by the auth service
///     ├── /categories        GET POST
///     ├── /categories/:id    GET PATCH DELETE
///     ├── /tasks             GET POST
///     ├── /tasks/:id         GET PATCH DELETE
///     └── /tasks/:id/status  POST
/// ```
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let v1_routes = Router::new()
        .route(
            "/categories",
            get(routes::categories::list_categories).post(routes::categories::create_category),
        )
        .route(
            "/categories/:id",
            get(routes::categories::get_category)
                .patch(routes::categories::update_category)
                .delete(routes::categories::delete_category),
        )
        .route(
            "/tasks",
            get(routes::tasks::list_tasks).post(routes::tasks::create_task),
        )
        .route(
            "/tasks/:id",
            get(routes::tasks::get_task)
                .patch(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        )
        .route("/tasks/:id/status", post(routes::tasks::change_status))
        .layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&state.config.server))
        .layer(SecurityHeadersLayer::new(state.config.server.production))
        .with_state(state)
}
