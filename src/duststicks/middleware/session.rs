use axum::{
    extract::Request,
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

use super::{cookies::read_cookie, Handler, Middleware};
use crate::duststicks::{
    error::ApiError,
    tokens::{TokenKind, TokenStore},
    users::{User, UserStore},
};

pub use super::cookies::SESSION_COOKIE_NAME;

/// Rejects requests without a live session cookie with 401.
///
/// On success the owner's public [`User`] record is inserted into the request
/// extensions, where handlers pick it up with `Extension<User>`.
#[derive(Clone)]
pub struct SessionGuard {
    tokens: Arc<dyn TokenStore>,
    users: Arc<dyn UserStore>,
}

impl SessionGuard {
    #[must_use]
    pub fn new(tokens: Arc<dyn TokenStore>, users: Arc<dyn UserStore>) -> Self {
        Self { tokens, users }
    }

    async fn authenticate(&self, headers: &HeaderMap) -> Result<User, ApiError> {
        let Some(secret) = read_cookie(headers, SESSION_COOKIE_NAME) else {
            debug!("session cookie missing");
            return Err(ApiError::Authentication);
        };

        let Some(token) = self
            .tokens
            .find_live(TokenKind::Session, &secret, Utc::now())
            .await?
        else {
            debug!("session token unknown or expired");
            return Err(ApiError::Authentication);
        };

        self.users
            .find_public(token.owner_id)
            .await?
            .ok_or(ApiError::Authentication)
    }

    async fn handle(&self, next: &Handler, mut request: Request) -> Response {
        match self.authenticate(request.headers()).await {
            Ok(user) => {
                request.extensions_mut().insert(user);
                next.call(request).await
            }
            Err(err) => err.into_response(),
        }
    }
}

impl Middleware for SessionGuard {
    fn name(&self) -> &'static str {
        "session"
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
