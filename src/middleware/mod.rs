//! Cross-cutting request handling applied by the server around the router.
//!
//! - [`cors`]: `Access-Control-Allow-Origin` on every response and preflight
//!   answers, enabled by the `cors` config key.
//! - [`trace`]: one log line per request with method, path, status, latency.

pub mod cors;

use std::time::Duration;

use tracing::info;

use crate::method::Method;
use crate::status::Status;

/// Logs the outcome of one request.
pub fn trace(method: Option<Method>, path: &str, status: Status, elapsed: Duration) {
    info!(
        method = method.map(Method::as_str).unwrap_or("-"),
        path,
        status = u16::from(status),
        latency_ms = elapsed.as_secs_f64() * 1000.0,
        "request"
    );
}
