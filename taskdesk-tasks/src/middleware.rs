/// Bearer-token gate for the task routes
///
/// Delegates verification to the configured `TokenVerifier` and injects the
/// resulting `AuthContext` into request extensions.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use taskdesk_shared::{auth::middleware::bearer_token, error::ApiError};

use crate::app::AppState;

pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers())?;
    let context = state.verifier.verify(token).await?;

    tracing::debug!(user_id = %context.user_id, "Request authenticated");
    req.extensions_mut().insert(context);

    Ok(next.run(req).await)
}
