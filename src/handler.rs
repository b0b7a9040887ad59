//! Route handlers.
//!
//! [`Handler`] is object safe, so the router keeps every route as an
//! `Arc<dyn Handler>` no matter what concrete function or closure backs it.
//! Any `Fn(Request) -> impl Future<Output = impl IntoResponse>` is a handler.
//! Shared state such as the conversion pipeline reaches a handler by being
//! captured in a closure:
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use avif2webp::{Method, Request, Response, Router};
//! let greeting = Arc::new(String::from("hi"));
//! Router::new().on(Method::Get, "/", move |_req: Request| {
//!     let greeting = Arc::clone(&greeting);
//!     async move { Response::text(greeting.as_str()) }
//! });
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// The future a handler returns once its output has been turned into a [`Response`].
pub type HandlerFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// Something that answers a routed request.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, req: Request) -> HandlerFuture;
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse,
{
    fn call(&self, req: Request) -> HandlerFuture {
        let fut = self(req);
        Box::pin(async move { fut.await.into_response() })
    }
}

/// How the router stores a handler. Cloned per request so the route table
/// is not borrowed while the handler runs.
pub(crate) type SharedHandler = Arc<dyn Handler>;
