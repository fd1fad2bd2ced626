//! Ordered request pipeline.
//!
//! A [`Middleware`] turns a [`Handler`] into another `Handler`. [`chain`] wraps a
//! terminal handler so the first middleware in the list runs first on the way in
//! and last on the way out:
//!
//! ```text
//! chain(h, [a, b, c]) == a(b(c(h)))
//! ```
//!
//! Protected routes always list [`recovery::Recovery`] first so that a panic in
//! any guard below it becomes a 500 instead of a dropped connection.

pub mod cookies;
pub mod csrf;
pub mod recovery;
pub mod session;

pub use csrf::CsrfGuard;
pub use recovery::Recovery;
pub use session::SessionGuard;

use axum::{extract::Request, handler::Handler as AxumHandler, response::Response};
use futures::future::{BoxFuture, FutureExt};
use std::{future::Future, sync::Arc};

pub type HandlerFuture = BoxFuture<'static, Response>;

/// A cloneable request handler.
#[derive(Clone)]
pub struct Handler(Arc<dyn Fn(Request) -> HandlerFuture + Send + Sync>);

impl Handler {
    pub fn new<F, Fut>(handler: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        Self(Arc::new(move |request| handler(request).boxed()))
    }

    /// Adapt an axum handler (extractors included) into the pipeline.
    pub fn from_axum<H, T>(handler: H) -> Self
    where
        H: AxumHandler<T, ()> + Sync,
        T: 'static,
    {
        Self::new(move |request| handler.clone().call(request, ()))
    }

    #[must_use]
    pub fn call(&self, request: Request) -> HandlerFuture {
        (self.0)(request)
    }

    /// Turn the pipeline back into something `axum::routing` accepts.
    pub fn into_axum(self) -> impl Fn(Request) -> HandlerFuture + Clone + Send + Sync + 'static {
        move |request| self.call(request)
    }
}

pub trait Middleware: Send + Sync {
    fn name(&self) -> &'static str;

    fn wrap(&self, next: Handler) -> Handler;
}

/// Wrap `handler` so that `middlewares[0]` is the outermost layer.
#[must_use]
pub fn chain(handler: Handler, middlewares: &[Arc<dyn Middleware>]) -> Handler {
    middlewares
        .iter()
        .rev()
        .fold(handler, |next, middleware| middleware.wrap(next))
}
