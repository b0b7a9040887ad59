//! Radix-tree request router.
//!
//! One tree per HTTP method, O(path-length) lookup. A path that exists under
//! some other method answers `405`, an unknown path `404`.

use std::collections::HashMap;
use std::sync::Arc;

use matchit::Router as MatchitRouter;

use crate::error::{ConversionError, ErrorKind};
use crate::handler::{Handler, SharedHandler};
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;
use crate::status::Status;

/// The application router.
///
/// Build it once at startup and pass it to [`Server::serve`](crate::Server::serve).
/// Each registration returns `self` so calls chain naturally.
pub struct Router {
    routes: HashMap<Method, MatchitRouter<SharedHandler>>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: HashMap::new() }
    }

    /// Register a handler for a method + path pair.
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid route or is already registered for
    /// `method`. Routes are fixed at startup, so this is a programming error.
    pub fn on(self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.add(method, path, Arc::new(handler))
    }

    fn add(mut self, method: Method, path: &str, handler: SharedHandler) -> Self {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, handler)
            .unwrap_or_else(|e| panic!("invalid route `{method} {path}`: {e}"));
        self
    }

    fn lookup(&self, method: Method, path: &str) -> Option<SharedHandler> {
        let matched = self.routes.get(&method)?.at(path).ok()?;
        Some(Arc::clone(matched.value))
    }

    fn path_exists(&self, path: &str) -> bool {
        self.routes.values().any(|tree| tree.at(path).is_ok())
    }

    /// Picks the handler for `method` and `path`, or the response that
    /// refuses them. Needs only the request line, so the server can refuse a
    /// request before reading its body.
    pub(crate) fn resolve(&self, method: Method, path: &str) -> Resolved {
        if let Some(handler) = self.lookup(method, path) {
            Resolved::Handler(handler)
        } else if self.path_exists(path) {
            Resolved::Refused(ConversionError::new(ErrorKind::MethodNotAllowed).to_response(false))
        } else {
            Resolved::Refused(Response::status(Status::NotFound))
        }
    }

    /// Routes one request and produces one response.
    pub async fn route(&self, req: Request) -> Response {
        match self.resolve(req.method(), req.path()) {
            Resolved::Handler(handler) => handler.call(req).await,
            Resolved::Refused(response) => response,
        }
    }
}

/// Outcome of [`Router::resolve`].
pub(crate) enum Resolved {
    Handler(SharedHandler),
    /// `405` for a path registered under other methods, `404` otherwise.
    Refused(Response),
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http::HeaderMap;

    use super::*;

    fn request(method: Method, path: &str) -> Request {
        Request::new(method, path, HeaderMap::new(), Bytes::new())
    }

    async fn ok(_req: Request) -> Response {
        Response::text("ok")
    }

    #[tokio::test]
    async fn routes_registered_method() {
        let router = Router::new().on(Method::Get, "/healthz", ok);
        let res = router.route(request(Method::Get, "/healthz")).await;
        assert_eq!(res.status_code(), Status::Ok);
        assert_eq!(res.body().as_ref(), b"ok");
    }

    #[tokio::test]
    async fn known_path_with_other_method_is_405() {
        let router = Router::new().on(Method::Get, "/healthz", ok);
        let res = router.route(request(Method::Delete, "/healthz")).await;
        assert_eq!(res.status_code(), Status::MethodNotAllowed);
        assert_eq!(res.body().as_ref(), br#"{"error":"Method Not Allowed"}"#);
    }

    #[tokio::test]
    async fn unknown_path_is_404() {
        let router = Router::new().on(Method::Get, "/healthz", ok);
        let res = router.route(request(Method::Get, "/nope")).await;
        assert_eq!(res.status_code(), Status::NotFound);
        assert!(res.body().is_empty());
    }

    #[test]
    fn resolve_refuses_without_a_request() {
        let router = Router::new().on(Method::Post, "/convert", ok);
        assert!(matches!(router.resolve(Method::Post, "/convert"), Resolved::Handler(_)));

        let Resolved::Refused(res) = router.resolve(Method::Put, "/convert") else {
            panic!("PUT /convert should be refused");
        };
        assert_eq!(res.status_code(), Status::MethodNotAllowed);

        let Resolved::Refused(res) = router.resolve(Method::Post, "/upload") else {
            panic!("POST /upload should be refused");
        };
        assert_eq!(res.status_code(), Status::NotFound);
    }
}
