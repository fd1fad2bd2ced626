use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
};
use std::sync::Arc;
use tracing::{info, instrument};

use super::{append_set_cookie, AuthState};
use crate::duststicks::{
    error::ApiError,
    middleware::cookies::{clear_cookie, read_cookie, CSRF_COOKIE_NAME, SESSION_COOKIE_NAME},
    users::User,
};

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    params(
        ("x-csrf-token" = String, Header, description = "Must equal the csrf_token cookie")
    ),
    responses(
        (status = 204, description = "Session and CSRF tokens revoked; cookies cleared"),
        (status = 401, description = "Missing or expired session", body = crate::duststicks::error::ErrorBody),
        (status = 403, description = "CSRF check failed", body = crate::duststicks::error::ErrorBody),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn logout(
    Extension(state): Extension<Arc<AuthState>>,
    Extension(user): Extension<User>,
    headers: HeaderMap,
) -> Result<(StatusCode, HeaderMap), ApiError> {
    // The session guard already resolved this cookie.
    let session_secret = read_cookie(&headers, SESSION_COOKIE_NAME).ok_or(ApiError::Authentication)?;

    state.issuer.revoke_session(user.id, &session_secret).await?;

    let mut cleared = HeaderMap::new();
    append_set_cookie(
        &mut cleared,
        clear_cookie(SESSION_COOKIE_NAME, true, state.secure_cookies),
    )?;
    append_set_cookie(
        &mut cleared,
        clear_cookie(CSRF_COOKIE_NAME, false, state.secure_cookies),
    )?;

    info!(user_id = %user.id, "user logged out");

    Ok((StatusCode::NO_CONTENT, cleared))
}
