/// Service-to-service token verification
///
/// ```text
/// POST /v1/auth/verify-token
/// X-Service-Key: <SERVICE_API_KEY>
///
/// { "token": "eyJ..." }
/// ```
///
/// A token that does not verify is a normal answer (`200`, `valid: false`),
/// not an error. Only a bad service key (`401`) or an unavailable backend
/// (`503`) produce error responses.

use crate::{app::AppState, service::TokenRejection};
use axum::{extract::State, http::HeaderMap, Json};
use taskdesk_shared::{
    auth::{
        middleware::AuthError,
        service_key::SERVICE_KEY_HEADER,
        verify::{VerifiedUser, VerifyTokenRequest, VerifyTokenResponse},
    },
    error::{ApiError, ApiResult},
};

pub async fn verify_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<VerifyTokenRequest>,
) -> ApiResult<Json<VerifyTokenResponse>> {
    let presented = headers
        .get(SERVICE_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::InvalidServiceKey)?;

    if !state.service_key.matches(presented) {
        tracing::warn!("verify-token called with an invalid service key");
        return Err(AuthError::InvalidServiceKey.into());
    }

    match state.auth.authenticate(&req.token).await {
        Ok(authenticated) => Ok(Json(VerifyTokenResponse::valid(
            VerifiedUser::from(&authenticated.user),
            authenticated.context.session_id,
            authenticated.context.expires_at,
        ))),
        Err(rejection @ TokenRejection::Unavailable(_)) => Err(ApiError::from(rejection)),
        Err(rejection) => {
            tracing::debug!(reason = %rejection, "Token rejected");
            Ok(Json(VerifyTokenResponse::invalid(rejection.to_string())))
        }
    }
}
