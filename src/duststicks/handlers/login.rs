use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::HeaderMap,
    Json,
};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::{append_set_cookie, body_rejected, AuthState};
use crate::duststicks::{
    error::ApiError,
    middleware::cookies::{csrf_cookie, session_cookie},
    password,
    users::{
        validation::{normalize_email, LoginRequest},
        User,
    },
};

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in; sets the session_token and csrf_token cookies", body = User),
        (status = 400, description = "Invalid input, reasons keyed by field", body = crate::duststicks::error::ErrorBody),
        (status = 401, description = "Unknown email or wrong password", body = crate::duststicks::error::ErrorBody),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn login(
    Extension(state): Extension<Arc<AuthState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(HeaderMap, Json<User>), ApiError> {
    let Json(request) = payload.map_err(body_rejected)?;
    request.validate()?;

    let email = normalize_email(&request.email);
    let Some(credentials) = state.users.find_credentials_by_email(&email).await? else {
        debug!("login for unknown email");
        return Err(ApiError::Authentication);
    };

    if !password::verify_blocking(request.password, credentials.password_digest).await? {
        debug!(user_id = %credentials.id, "login with wrong password");
        return Err(ApiError::Authentication);
    }

    let user = state
        .users
        .find_public(credentials.id)
        .await?
        .ok_or(ApiError::Authentication)?;

    let session = state.issuer.issue_session_token(user.id).await?;
    let csrf = state.issuer.issue_csrf_token(user.id).await?;

    let mut headers = HeaderMap::new();
    append_set_cookie(
        &mut headers,
        session_cookie(&session.secret, session.expires_at, state.secure_cookies),
    )?;
    append_set_cookie(
        &mut headers,
        csrf_cookie(&csrf.secret, csrf.expires_at, state.secure_cookies),
    )?;

    info!(user_id = %user.id, "user logged in");

    Ok((headers, Json(user)))
}
