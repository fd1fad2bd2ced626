use axum::{
    extract::Request,
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::{cookies::read_cookie, Handler, Middleware};
use crate::duststicks::{
    error::ApiError,
    tokens::{TokenKind, TokenStore},
    users::User,
};

pub use super::cookies::CSRF_COOKIE_NAME;

pub const CSRF_HEADER_NAME: &str = "x-csrf-token";

/// Double-submit cookie check.
///
/// The `csrf_token` cookie and the `X-CSRF-Token` header must both be present
/// and equal, and the value must name a live `csrf` token. When a session
/// principal is already on the request, the token must also belong to it.
/// Every failure is a 403.
#[derive(Clone)]
pub struct CsrfGuard {
    tokens: Arc<dyn TokenStore>,
}

impl CsrfGuard {
    #[must_use]
    pub fn new(tokens: Arc<dyn TokenStore>) -> Self {
        Self { tokens }
    }

    async fn authorize(&self, headers: &HeaderMap, principal: Option<Uuid>) -> Result<(), ApiError> {
        let Some(cookie) = read_cookie(headers, CSRF_COOKIE_NAME) else {
            debug!("csrf cookie missing");
            return Err(ApiError::Authorization);
        };

        let Some(header) = headers
            .get(CSRF_HEADER_NAME)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
        else {
            debug!("csrf header missing");
            return Err(ApiError::Authorization);
        };

        if !constant_time_eq(cookie.as_bytes(), header.as_bytes()) {
            debug!("csrf header does not match cookie");
            return Err(ApiError::Authorization);
        }

        let Some(token) = self
            .tokens
            .find_live(TokenKind::Csrf, &cookie, Utc::now())
            .await?
        else {
            debug!("csrf token unknown or expired");
            return Err(ApiError::Authorization);
        };

        match principal {
            Some(owner_id) if owner_id != token.owner_id => {
                debug!("csrf token belongs to another user");
                Err(ApiError::Authorization)
            }
            _ => Ok(()),
        }
    }

    async fn handle(&self, next: &Handler, request: Request) -> Response {
        let principal = request.extensions().get::<User>().map(|user| user.id);

        match self.authorize(request.headers(), principal).await {
            Ok(()) => next.call(request).await,
            Err(err) => err.into_response(),
        }
    }
}

impl Middleware for CsrfGuard {
    fn name(&self) -> &'static str {
        "csrf"
    }

    fn wrap(&self, next: Handler) -> Handler {
        let guard = self.clone();
        Handler::new(move |request: Request| {
            let guard = guard.clone();
            let next = next.clone();
            async move { guard.handle(&next, request).await }
        })
    }
}

/// Compare two byte strings without short-circuiting on the first difference.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
