//! # avif2webp
//!
//! Upload an AVIF image, get a WebP back.
//!
//! The crate is one request pipeline with two front doors:
//!
//! - a standalone HTTP server ([`Server`] + [`app::router`]) answering
//!   `POST /convert` with the converted file as a download, and
//! - a serverless-function handler ([`function::handle_event`]) that takes
//!   the same request as a JSON event.
//!
//! Both run the same [`Pipeline`]: parse the multipart body, validate the
//! declared type and size, convert on the blocking pool, respond, and remove
//! the temporary upload on every exit path.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use avif2webp::{AvifToWebp, Config, Pipeline, Server, app};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), avif2webp::Error> {
//!     let config = Config::load(None)?;
//!     let pipeline = Pipeline::from_config(&config, Arc::new(AvifToWebp))?;
//!     Server::from_config(&config)
//!         .serve(app::router(Arc::new(pipeline)))
//!         .await
//! }
//! ```
//!
//! ```text
//! curl -F 'image=@photo.avif;type=image/avif' -OJ http://localhost:3000/convert
//! ```

mod error;
mod handler;
mod method;
mod request;
mod response;
mod router;
mod server;
mod status;

pub mod app;
pub mod codec;
pub mod config;
pub mod function;
pub mod health;
pub mod middleware;
pub mod multipart;
pub mod pipeline;
pub mod storage;
pub mod upload;
pub mod validate;

pub use codec::{AvifToWebp, Codec};
pub use config::Config;
pub use error::{ConversionError, Error, ErrorKind};
pub use handler::{Handler, HandlerFuture};
pub use method::Method;
pub use pipeline::{Pipeline, Stage};
pub use request::Request;
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::{MULTIPART_OVERHEAD_BYTES, Server};
pub use status::Status;
pub use storage::TempStore;
pub use upload::{ConversionResult, UploadedFile};
