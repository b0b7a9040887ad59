//! HTTP server and graceful shutdown.
//!
//! On SIGTERM or Ctrl-C the server stops accepting, lets every in-flight
//! connection finish, then returns from [`Server::serve`]. An in-flight
//! conversion therefore completes and cleans up its temporary file before
//! the process exits.
//!
//! Requests are routed on their request line, then the matched handler's
//! body is buffered up to a fixed limit. A body over the limit, declared or
//! actual, is refused with `413` without reading the rest of it.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::Config;
use crate::error::{ConversionError, Error, ErrorKind};
use crate::method::Method;
use crate::middleware::{self, cors};
use crate::request::Request;
use crate::response::Response;
use crate::router::{Resolved, Router};

/// Multipart framing allowance on top of the configured upload limit.
pub const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Settings every connection task reads.
#[derive(Clone, Copy, Debug)]
struct Settings {
    body_limit: usize,
    cors: bool,
}

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
    settings: Settings,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called. CORS is off and the body limit is the default upload limit
    /// plus [`MULTIPART_OVERHEAD_BYTES`].
    pub fn bind(addr: SocketAddr) -> Self {
        Self {
            addr,
            settings: Settings {
                body_limit: body_limit_for(crate::config::DEFAULT_MAX_UPLOAD_BYTES),
                cors: false,
            },
        }
    }

    /// Bind address, body limit and CORS taken from `config`.
    pub fn from_config(config: &Config) -> Self {
        Self::bind(config.listen)
            .body_limit(body_limit_for(config.max_upload_bytes))
            .cors(config.cors)
    }

    pub fn body_limit(mut self, bytes: usize) -> Self {
        self.settings.body_limit = bytes;
        self
    }

    pub fn cors(mut self, enabled: bool) -> Self {
        self.settings.cors = enabled;
        self
    }

    /// Binds, then serves until SIGTERM or Ctrl-C and every in-flight
    /// request has completed.
    pub async fn serve(self, router: Router) -> Result<(), Error> {
        let listener = TcpListener::bind(self.addr).await?;
        self.serve_on(listener, router, shutdown_signal()).await
    }

    /// Serves on an already-bound listener until `shutdown` resolves, then
    /// drains in-flight connections.
    pub async fn serve_on(
        self,
        listener: TcpListener,
        router: Router,
        shutdown: impl Future<Output = ()> + Send,
    ) -> Result<(), Error> {
        let router = Arc::new(router);
        let settings = self.settings;

        info!(addr = %listener.local_addr()?, body_limit = settings.body_limit, cors = settings.cors, "avif2webp listening");

        let mut tasks = tokio::task::JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Check shutdown first so a signal stops accepting right away,
                // even with connections queued.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let router = Arc::clone(&router);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // Called once per request on the connection.
                        let svc = service_fn(move |req| {
                            let router = Arc::clone(&router);
                            async move { dispatch(router, settings, req).await }
                        });

                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the set stays small.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("avif2webp stopped");
        Ok(())
    }
}

fn body_limit_for(max_upload_bytes: u64) -> usize {
    usize::try_from(max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD_BYTES)
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Routes one request and produces one response. Every failure is turned
/// into a response, so hyper never sees an error.
///
/// The route is resolved from the request line first. A refused request
/// (`405`, `404`) gets its answer without the body being read, and a body is
/// only collected for a handler that will see it.
async fn dispatch(
    router: Arc<Router>,
    settings: Settings,
    req: hyper::Request<hyper::body::Incoming>,
) -> Result<http::Response<Full<Bytes>>, std::convert::Infallible> {
    let started = Instant::now();
    let (parts, body) = req.into_parts();
    let path = parts.uri.path().to_owned();
    let method = Method::try_from(&parts.method).ok();

    let mut response = match method {
        None => ConversionError::new(ErrorKind::MethodNotAllowed).to_response(false),
        Some(method) if settings.cors && cors::is_preflight(method, &parts.headers) => {
            cors::preflight()
        }
        Some(method) => match router.resolve(method, &path) {
            Resolved::Refused(response) => response,
            Resolved::Handler(_)
                if declared_length(&parts.headers).is_some_and(|n| n > settings.body_limit as u64) =>
            {
                too_large(format!("declared content-length over {} bytes", settings.body_limit))
            }
            Resolved::Handler(handler) => match Limited::new(body, settings.body_limit).collect().await {
                Ok(collected) => {
                    let req = Request::new(method, path.clone(), parts.headers, collected.to_bytes());
                    handler.call(req).await
                }
                Err(e) => body_error(e),
            },
        },
    };

    if settings.cors {
        cors::apply(&mut response);
    }
    middleware::trace(method, &path, response.status_code(), started.elapsed());
    Ok(response.into_inner())
}

/// The request's `Content-Length`, when present and well formed.
fn declared_length(headers: &http::HeaderMap) -> Option<u64> {
    headers
        .get(http::header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

fn too_large(detail: String) -> Response {
    ConversionError::with_detail(ErrorKind::PayloadTooLarge, detail).to_response(false)
}

fn body_error(e: Box<dyn std::error::Error + Send + Sync>) -> Response {
    if e.downcast_ref::<LengthLimitError>().is_some() {
        too_large(e.to_string())
    } else {
        error!("failed to read request body: {e}");
        ConversionError::malformed(format!("body read: {e}")).to_response(false)
    }
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGTERM or SIGINT (Ctrl-C). On Windows only Ctrl-C
/// is available.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
