//! Permissive CORS, matching a browser front-end served from anywhere.

use http::HeaderMap;

use crate::method::Method;
use crate::response::Response;
use crate::status::Status;

const ALLOW_ORIGIN: &str = "*";
const ALLOW_METHODS: &str = "POST, GET, OPTIONS";
const ALLOW_HEADERS: &str = "content-type";

/// An `OPTIONS` request carrying `Access-Control-Request-Method`.
pub fn is_preflight(method: Method, headers: &HeaderMap) -> bool {
    method == Method::Options && headers.contains_key(http::header::ACCESS_CONTROL_REQUEST_METHOD)
}

/// `204 No Content` answering a preflight.
pub fn preflight() -> Response {
    Response::builder()
        .status(Status::NoContent)
        .header("access-control-allow-origin", ALLOW_ORIGIN)
        .header("access-control-allow-methods", ALLOW_METHODS)
        .header("access-control-allow-headers", ALLOW_HEADERS)
        .no_body()
}

/// Adds the allow-origin header to an outgoing response.
pub fn apply(response: &mut Response) {
    response.set_header_if_absent("access-control-allow-origin", ALLOW_ORIGIN);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preflight_needs_options_and_request_method_header() {
        let mut headers = HeaderMap::new();
        assert!(!is_preflight(Method::Options, &headers));

        headers.insert("access-control-request-method", "POST".parse().unwrap());
        assert!(is_preflight(Method::Options, &headers));
        assert!(!is_preflight(Method::Post, &headers));
    }

    #[test]
    fn preflight_response_lists_allowed_methods() {
        let res = preflight();
        assert_eq!(res.status_code(), Status::NoContent);
        assert_eq!(res.header("access-control-allow-methods"), Some("POST, GET, OPTIONS"));
        assert!(res.body().is_empty());
    }

    #[test]
    fn apply_adds_origin_once() {
        let mut res = Response::text("ok");
        apply(&mut res);
        apply(&mut res);
        let count = res
            .headers()
            .iter()
            .filter(|(k, _)| k == "access-control-allow-origin")
            .count();
        assert_eq!(count, 1);
    }
}
