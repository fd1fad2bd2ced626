//! Route table for the auth API.
//!
//! | route               | method | pipeline                    |
//! |---------------------|--------|-----------------------------|
//! | `/v1/auth/register` | POST   | recovery                    |
//! | `/v1/auth/login`    | POST   | recovery                    |
//! | `/v1/auth/verify`   | POST   | recovery                    |
//! | `/v1/auth/logout`   | POST   | recovery, session, csrf     |
//! | `/v1/me`            | GET    | recovery, session           |
//!
//! `/health` and `/openapi.json` are mounted by the server next to this router.

use axum::{
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;

use super::{
    handlers::{login, logout, me, register, verify, AuthState},
    middleware::{chain, CsrfGuard, Handler, Middleware, Recovery, SessionGuard},
};

/// Build the auth routes with their middleware pipelines.
pub fn router(state: Arc<AuthState>) -> Router {
    let tokens = state.issuer.store().clone();
    let recovery: Arc<dyn Middleware> = Arc::new(Recovery);
    let session: Arc<dyn Middleware> = Arc::new(SessionGuard::new(tokens.clone(), state.users.clone()));
    let csrf: Arc<dyn Middleware> = Arc::new(CsrfGuard::new(tokens));

    let public = [recovery.clone()];
    let authenticated = [recovery.clone(), session.clone()];
    let protected = [recovery, session, csrf];

    Router::new()
        .route(
            "/v1/auth/register",
            post(chain(Handler::from_axum(register::register), &public).into_axum()),
        )
        .route(
            "/v1/auth/login",
            post(chain(Handler::from_axum(login::login), &public).into_axum()),
        )
        .route(
            "/v1/auth/verify",
            post(chain(Handler::from_axum(verify::verify), &public).into_axum()),
        )
        .route(
            "/v1/auth/logout",
            post(chain(Handler::from_axum(logout::logout), &protected).into_axum()),
        )
        .route(
            "/v1/me",
            get(chain(Handler::from_axum(me::me), &authenticated).into_axum()),
        )
        .layer(Extension(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duststicks::{
        handlers::testing::{body_json, cookie_value, json_request, set_cookies, TestApp},
        middleware::csrf::CSRF_HEADER_NAME,
        tokens::TokenKind,
    };
    use axum::{body::Body, http::StatusCode};
    use serde_json::json;
    use std::time::Duration;
    use tower::ServiceExt;
    use uuid::Uuid;

    #[tokio::test]
    async fn register_verify_login_me_logout() {
        let app = TestApp::new();

        // register
        let response = router(app.state.clone())
            .oneshot(json_request(
                "POST",
                "/v1/auth/register",
                &json!({"username": "player1", "email": "p1@example.com", "password": "Secret123"}),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::CREATED);
        let id: Uuid = body_json(response).await["id"]
            .as_str()
            .and_then(|id| id.parse().ok())
            .expect("id");

        let code = app
            .tokens
            .rows()
            .into_iter()
            .find(|row| row.kind == TokenKind::Verification && row.owner_id == id)
            .expect("verification token")
            .secret;
        assert_eq!(code.len(), 8);

        // verify
        let response = router(app.state.clone())
            .oneshot(json_request("POST", "/v1/auth/verify", &json!({"token": code})))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        // login
        let response = router(app.state.clone())
            .oneshot(json_request(
                "POST",
                "/v1/auth/login",
                &json!({"email": "p1@example.com", "password": "Secret123"}),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let cookies = set_cookies(&response);
        let session = cookie_value(&cookies, "session_token").expect("session");
        let csrf = cookie_value(&cookies, "csrf_token").expect("csrf");
        assert_eq!(session.len(), 32);
        assert_eq!(csrf.len(), 32);

        let rows = app.tokens.rows();
        let session_row = rows
            .iter()
            .find(|row| row.secret == session)
            .expect("session row");
        let csrf_row = rows.iter().find(|row| row.secret == csrf).expect("csrf row");
        assert_eq!(session_row.kind, TokenKind::Session);
        assert_eq!(csrf_row.kind, TokenKind::Csrf);
        assert_ne!(session_row.id, csrf_row.id);

        // me
        let cookie = format!("session_token={session}; csrf_token={csrf}");
        let response = router(app.state.clone())
            .oneshot(
                axum::http::Request::builder()
                    .uri("/v1/me")
                    .header("cookie", cookie.as_str())
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let me = body_json(response).await;
        assert_eq!(me["id"], id.to_string());
        assert_eq!(me["verified"], true);

        // logout
        let response = router(app.state.clone())
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/v1/auth/logout")
                    .header("cookie", cookie.as_str())
                    .header(CSRF_HEADER_NAME, csrf.as_str())
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let cleared = set_cookies(&response);
        assert_eq!(cookie_value(&cleared, "session_token").as_deref(), Some(""));
        assert_eq!(cookie_value(&cleared, "csrf_token").as_deref(), Some(""));

        assert_eq!(app.tokens.live_count(TokenKind::Session, id), 0);
        assert_eq!(app.tokens.live_count(TokenKind::Csrf, id), 0);

        // The mail task ran with the stored code.
        for _ in 0..100 {
            if !app.mailer.sent().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(app.mailer.sent().first().map(|mail| mail.code.clone()), Some(code));
    }

    #[tokio::test]
    async fn unknown_routes_are_404() {
        let app = TestApp::new();
        let response = router(app.state.clone())
            .oneshot(
                axum::http::Request::builder()
                    .uri("/v1/nope")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn wrong_method_is_405() {
        let app = TestApp::new();
        let response = router(app.state.clone())
            .oneshot(
                axum::http::Request::builder()
                    .uri("/v1/auth/login")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
