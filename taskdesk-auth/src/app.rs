/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use taskdesk_auth::{app::{build_router, AppState}, config::Config};
/// use taskdesk_shared::redis::RedisClient;
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let redis = RedisClient::new(config.redis.clone()).await?;
/// let app = build_router(AppState::new(pool, redis, config));
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, middleware::rate_limit::ip_rate_limit, service::AuthService};
use axum::{
    extract::{Request, State},
    middleware::{from_fn_with_state, Next},
    response::Response,
    routing::{delete, get, post},
    Extension, Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use taskdesk_shared::{
    auth::{
        jwt::TokenService,
        middleware::{bearer_token, TrustProxyHeaders},
        service_key::ServiceKey,
    },
    error::ApiError,
    http::{cors_layer, SecurityHeadersLayer},
    redis::{RateLimiter, RedisClient, SessionCache},
};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    pub redis: RedisClient,

    pub auth: AuthService,

    /// Per-IP request limiter
    pub limiter: RateLimiter,

    /// Key expected on `verify-token`
    pub service_key: Arc<ServiceKey>,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: PgPool, redis: RedisClient, config: Config) -> Self {
        let tokens = Arc::new(TokenService::new(
            &config.jwt.secret,
            &config.jwt.issuer,
            config.jwt.access_ttl(),
            config.jwt.refresh_ttl(),
        ));
        let limiter = RateLimiter::new(redis.clone());
        let auth = AuthService::new(
            db.clone(),
            tokens,
            SessionCache::new(redis.clone()),
            limiter.clone(),
            config.limits,
        );

        Self {
            db,
            redis,
            auth,
            limiter,
            service_key: Arc::new(ServiceKey::new(&config.service_api_key)),
            config: Arc::new(config),
        }
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                        # Health check (public)
/// └── /v1/auth/
///     ├── POST   /register           # public, IP limited
///     ├── POST   /login              # public, IP limited
///     ├── POST   /refresh            # public, IP limited
///     ├── POST   /logout             # bearer, IP limited
///     ├── POST   /logout-all         # bearer, IP limited
///     ├── GET    /me                 # bearer, IP limited
///     ├── PATCH  /me
///     ├── DELETE /me
///     ├── POST   /change-password
///     ├── GET    /sessions
///     ├── DELETE /sessions/:id
///     └── POST   /verify-token       # service key only
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Security headers
/// 2. CORS
/// 3. Logging (tower-http TraceLayer)
/// 4. Per-IP limit and authentication (per route group)
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let public_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh));

    let protected_routes = Router::new()
        .route("/logout", post(routes::auth::logout))
        .route("/logout-all", post(routes::auth::logout_all))
        .route(
            "/me",
            get(routes::account::me)
                .patch(routes::account::update_profile)
                .delete(routes::account::delete_account),
        )
        .route("/change-password", post(routes::account::change_password))
        .route("/sessions", get(routes::sessions::list_sessions))
        .route("/sessions/:id", delete(routes::sessions::revoke_session))
        .layer(from_fn_with_state(state.clone(), jwt_auth_layer));

    // The task service calls verify-token for every request it serves, all
    // from the same address, so it sits outside the per-IP limiter
    let service_routes = Router::new()
        .route("/verify-token", post(routes::verify::verify_token));

    let auth_routes = public_routes
        .merge(protected_routes)
        .layer(from_fn_with_state(state.clone(), ip_rate_limit))
        .merge(service_routes)
        .layer(Extension(TrustProxyHeaders(
            state.config.trust_proxy_headers,
        )));

    Router::new()
        .merge(health_routes)
        .nest("/v1/auth", auth_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&state.config.server))
        .layer(SecurityHeadersLayer::new(state.config.server.production))
        .with_state(state)
}

/// JWT authentication middleware layer
///
/// Validates the bearer token down to the session and user, then injects
/// the `AuthContext` into request extensions.
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers())?;
    let authenticated = state.auth.authenticate(token).await?;

    req.extensions_mut().insert(authenticated.context);

    Ok(next.run(req).await)
}
