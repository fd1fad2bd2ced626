use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{body_rejected, AuthState};
use crate::duststicks::{
    db::StoreError,
    error::ApiError,
    mailer::{dispatch_verification_email, VerificationEmail},
    password,
    users::{
        validation::{normalize_email, RegistrationRequest},
        NewUser,
    },
};

#[derive(Debug, Serialize, ToSchema)]
pub struct Registered {
    pub id: Uuid,
}

#[utoipa::path(
    post,
    path = "/v1/auth/register",
    request_body = RegistrationRequest,
    responses(
        (status = 201, description = "User created and verification code mailed", body = Registered),
        (status = 400, description = "Invalid input, reasons keyed by field", body = crate::duststicks::error::ErrorBody),
        (status = 409, description = "Email or username already taken", body = crate::duststicks::error::ErrorBody),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn register(
    Extension(state): Extension<Arc<AuthState>>,
    payload: Result<Json<RegistrationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Registered>), ApiError> {
    let Json(request) = payload.map_err(body_rejected)?;
    request.validate()?;

    let email = normalize_email(&request.email);
    let password_digest = password::hash_blocking(request.password).await?;

    let user = match state
        .users
        .insert(NewUser {
            username: request.username,
            email,
            password_digest,
        })
        .await
    {
        Ok(user) => user,
        Err(StoreError::Conflict) => return Err(ApiError::Conflict),
        Err(err) => return Err(err.into()),
    };

    // Without a code the account could never be verified, so undo the insert
    // and let the client register again.
    let token = match state.issuer.issue_verification_token(user.id).await {
        Ok(token) => token,
        Err(err) => {
            if let Err(cleanup) = state.users.delete(user.id).await {
                error!(user_id = %user.id, "failed to remove unverifiable user: {cleanup}");
            }
            return Err(err.into());
        }
    };

    dispatch_verification_email(
        state.mailer.clone(),
        VerificationEmail {
            to_email: user.email.clone(),
            username: user.username.clone(),
            code: token.secret,
        },
    );

    info!(user_id = %user.id, "user registered");

    Ok((StatusCode::CREATED, Json(Registered { id: user.id })))
}
