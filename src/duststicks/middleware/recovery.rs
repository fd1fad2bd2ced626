use axum::{
    extract::Request,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::FutureExt;
use std::{any::Any, panic::AssertUnwindSafe};
use tracing::error;

use super::{Handler, Middleware};

/// Converts a panic anywhere below it into a generic 500.
#[derive(Clone, Copy, Debug, Default)]
pub struct Recovery;

impl Middleware for Recovery {
    fn name(&self) -> &'static str {
        "recovery"
    }

    fn wrap(&self, next: Handler) -> Handler {
        Handler::new(move |request: Request| {
            let next = next.clone();
            async move {
                let method = request.method().clone();
                let path = request.uri().path().to_string();

                // Handlers may panic while building their future or while it runs.
                let future = match std::panic::catch_unwind(AssertUnwindSafe(|| next.call(request))) {
                    Ok(future) => future,
                    Err(panic) => return recovered(&method, &path, panic.as_ref()),
                };

                match AssertUnwindSafe(future).catch_unwind().await {
                    Ok(response) => response,
                    Err(panic) => recovered(&method, &path, panic.as_ref()),
                }
            }
        })
    }
}

fn recovered(method: &axum::http::Method, path: &str, panic: &(dyn Any + Send)) -> Response {
    let message = panic
        .downcast_ref::<&str>()
        .map(|message| (*message).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());

    error!(%method, path, panic = %message, "recovered from panic in request pipeline");

    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duststicks::middleware::{
        chain,
        testing::{entries, terminal, Log, Panicking, Recording},
    };
    use axum::body::Body;
    use std::sync::Arc;

    fn request() -> Request {
        axum::http::Request::builder()
            .uri("/v1/auth/logout")
            .body(Body::empty())
            .expect("request")
    }

    #[tokio::test]
    async fn passes_responses_through() {
        let log = Log::default();
        let response = chain(terminal(&log), &[Arc::new(Recovery)]).call(request()).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(entries(&log), ["handler"]);
    }

    #[tokio::test]
    async fn catches_panics_inside_the_future() {
        let log = Log::default();
        let response = chain(
            terminal(&log),
            &[Arc::new(Recovery), Arc::new(Panicking { eager: false })],
        )
        .call(request())
        .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(entries(&log).is_empty());
    }

    #[tokio::test]
    async fn catches_panics_before_the_future_exists() {
        let log = Log::default();
        let response = chain(
            terminal(&log),
            &[Arc::new(Recovery), Arc::new(Panicking { eager: true })],
        )
        .call(request())
        .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn outer_layers_still_see_the_response() {
        let log = Log::default();
        let response = chain(
            terminal(&log),
            &[
                Arc::new(Recording {
                    name: "outer",
                    log: log.clone(),
                    reject: false,
                }),
                Arc::new(Recovery),
                Arc::new(Panicking { eager: false }),
            ],
        )
        .call(request())
        .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(entries(&log), ["outer:in", "outer:out"]);
    }

    #[test]
    fn panic_payloads_are_rendered() {
        let method = axum::http::Method::GET;
        let response = recovered(&method, "/", &"static message");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let owned: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        let response = recovered(&method, "/", owned.as_ref());
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
