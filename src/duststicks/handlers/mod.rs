//! HTTP handlers.
//!
//! Flow Overview:
//! 1) `register` validates input, stores the user and mails a verification code.
//! 2) `verify` consumes that code and marks the user verified.
//! 3) `login` checks the password and sets the `session_token`/`csrf_token` cookies.
//! 4) `me` and `logout` run behind the session guard (and, for logout, the CSRF guard).

pub mod health;
pub mod login;
pub mod logout;
pub mod me;
pub mod register;
pub mod verify;

use axum::{
    extract::rejection::JsonRejection,
    http::{header::SET_COOKIE, HeaderMap, HeaderValue},
};
use std::sync::Arc;

use super::{
    error::{ApiError, ValidationErrors},
    mailer::Mailer,
    tokens::TokenIssuer,
    users::UserStore,
};

/// Collaborators shared by the auth handlers, injected as `Extension<Arc<AuthState>>`.
pub struct AuthState {
    pub issuer: TokenIssuer,
    pub users: Arc<dyn UserStore>,
    pub mailer: Arc<dyn Mailer>,
    /// Add `Secure` to the auth cookies (on behind TLS).
    pub secure_cookies: bool,
}

impl AuthState {
    #[must_use]
    pub fn new(
        issuer: TokenIssuer,
        users: Arc<dyn UserStore>,
        mailer: Arc<dyn Mailer>,
        secure_cookies: bool,
    ) -> Self {
        Self {
            issuer,
            users,
            mailer,
            secure_cookies,
        }
    }
}

/// A body that is not the expected JSON is a validation failure on `body`.
pub(crate) fn body_rejected(rejection: JsonRejection) -> ApiError {
    ApiError::Validation(ValidationErrors::single("body", rejection.body_text()))
}

pub(crate) fn append_set_cookie(headers: &mut HeaderMap, cookie: String) -> Result<(), ApiError> {
    let value = HeaderValue::try_from(cookie)
        .map_err(|err| ApiError::Internal(format!("invalid Set-Cookie value: {err}")))?;
    headers.append(SET_COOKIE, value);
    Ok(())
}
