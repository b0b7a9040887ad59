//! Route table for the standalone server.

use std::sync::Arc;

use crate::health;
use crate::method::Method;
use crate::pipeline::Pipeline;
use crate::request::Request;
use crate::router::Router;

/// Path of the conversion endpoint.
pub const CONVERT_PATH: &str = "/convert";

/// `POST /convert`, `GET /healthz`, `GET /readyz`. Any other method on
/// these paths gets `405` from the router before the body is read.
pub fn router(pipeline: Arc<Pipeline>) -> Router {
    let convert = {
        let pipeline = Arc::clone(&pipeline);
        move |req: Request| {
            let pipeline = Arc::clone(&pipeline);
            async move { pipeline.handle_request(req).await }
        }
    };
    let readiness = move |_req: Request| {
        let pipeline = Arc::clone(&pipeline);
        async move { health::readiness(pipeline.store()) }
    };

    Router::new()
        .on(Method::Post, CONVERT_PATH, convert)
        .on(Method::Get, "/healthz", health::liveness)
        .on(Method::Get, "/readyz", readiness)
}
