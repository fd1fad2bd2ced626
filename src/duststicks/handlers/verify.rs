use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::{body_rejected, AuthState};
use crate::duststicks::{
    error::{ApiError, ValidationErrors},
    users::validation::VerifyRequest,
};

const INVALID_CODE: &str = "invalid or expired verification code";

#[utoipa::path(
    post,
    path = "/v1/auth/verify",
    request_body = VerifyRequest,
    responses(
        (status = 204, description = "Email verified"),
        (status = 400, description = "Unknown or expired code", body = crate::duststicks::error::ErrorBody),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn verify(
    Extension(state): Extension<Arc<AuthState>>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(request) = payload.map_err(body_rejected)?;

    let code = request.token.trim();
    if code.is_empty() {
        return Err(ValidationErrors::single("token", INVALID_CODE).into());
    }

    let Some(owner_id) = state.issuer.verification_owner(code).await? else {
        return Err(ValidationErrors::single("token", INVALID_CODE).into());
    };

    // Codes are only cleared once the user row says verified.
    if !state.users.mark_verified(owner_id).await? {
        warn!(user_id = %owner_id, "verification code for a missing user");
        return Err(ValidationErrors::single("token", INVALID_CODE).into());
    }

    if let Err(err) = state.issuer.clear_verification(owner_id).await {
        warn!(user_id = %owner_id, "failed to clear verification codes: {err}");
    }

    info!(user_id = %owner_id, "email verified");

    Ok(StatusCode::NO_CONTENT)
}
