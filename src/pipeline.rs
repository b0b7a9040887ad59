//! The upload → validate → convert → respond pipeline.
//!
//! One [`Pipeline`] is built at startup and shared by every request. It holds
//! no mutable state; each call to [`Pipeline::handle`] owns its upload and
//! the upload's temporary file for exactly as long as the call runs.
//!
//! ```text
//! Received → Parsing → Validating → Converting → Responding → Cleanup → Done
//!               └──────────┴────────────┴── error ──────────────┘
//! ```
//!
//! Cleanup is the drop of the [`UploadedFile`]. A failure in any stage
//! returns early through `?`, which drops it just the same.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, error, warn};

use crate::codec::Codec;
use crate::config::Config;
use crate::error::{ConversionError, Error, ErrorKind};
use crate::method::Method;
use crate::multipart;
use crate::request::Request;
use crate::response::{IntoResponse, Response};
use crate::status::Status;
use crate::storage::TempStore;
use crate::upload::{ConversionResult, UploadedFile};
use crate::validate::validate;

/// Where a request is in the pipeline. Used as a structured log field.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Stage {
    Received,
    Parsing,
    Validating,
    Converting,
    Responding,
    Cleanup,
    Done,
}

pub struct Pipeline {
    store: TempStore,
    codec: Arc<dyn Codec>,
    max_upload_bytes: u64,
    expose_diagnostics: bool,
}

impl Pipeline {
    /// A pipeline with the default upload limit and diagnostics hidden.
    pub fn new(store: TempStore, codec: Arc<dyn Codec>) -> Self {
        Self {
            store,
            codec,
            max_upload_bytes: crate::config::DEFAULT_MAX_UPLOAD_BYTES,
            expose_diagnostics: false,
        }
    }

    /// Builds the pipeline described by `config`, creating its temp directory.
    pub fn from_config(config: &Config, codec: Arc<dyn Codec>) -> Result<Self, Error> {
        let store = TempStore::new(&config.temp_dir).map_err(|e| {
            Error::config(format!("cannot create temp_dir {}: {e}", config.temp_dir.display()))
        })?;
        Ok(Self::new(store, codec)
            .max_upload_bytes(config.max_upload_bytes)
            .expose_diagnostics(config.expose_diagnostics))
    }

    pub fn max_upload_bytes(mut self, limit: u64) -> Self {
        self.max_upload_bytes = limit;
        self
    }

    pub fn expose_diagnostics(mut self, expose: bool) -> Self {
        self.expose_diagnostics = expose;
        self
    }

    pub fn store(&self) -> &TempStore {
        &self.store
    }

    /// Router entry point.
    pub async fn handle_request(&self, req: Request) -> Response {
        let content_type = req.header("content-type").map(str::to_owned);
        let (method, _, body) = req.into_parts();
        self.handle(method, content_type.as_deref(), body).await
    }

    /// Runs one request through every stage and renders the outcome.
    ///
    /// Never fails: every error becomes a JSON error response.
    pub async fn handle(&self, method: Method, content_type: Option<&str>, body: Bytes) -> Response {
        debug!(stage = ?Stage::Received, %method, body_bytes = body.len(), "request received");

        let response = if method != Method::Post {
            self.reject(ErrorKind::MethodNotAllowed.into())
        } else {
            match self.convert(content_type, body).await {
                Ok(result) => {
                    debug!(
                        stage = ?Stage::Responding,
                        filename = %result.output_filename,
                        output_bytes = result.output_bytes.len(),
                        "conversion succeeded"
                    );
                    result.into_response()
                }
                Err(err) => self.reject(err),
            }
        };

        debug!(stage = ?Stage::Done, status = u16::from(response.status_code()), "request finished");
        response
    }

    /// Parses, validates and converts one upload.
    pub async fn convert(
        &self,
        content_type: Option<&str>,
        body: Bytes,
    ) -> Result<ConversionResult, ConversionError> {
        debug!(stage = ?Stage::Parsing, "parsing upload");
        let upload = multipart::parse_upload(content_type, body, &self.store).await?;

        let outcome = self.convert_upload(&upload).await;

        debug!(stage = ?Stage::Cleanup, path = %upload.path().display(), "releasing upload");
        drop(upload);
        outcome
    }

    async fn convert_upload(&self, upload: &UploadedFile) -> Result<ConversionResult, ConversionError> {
        debug!(
            stage = ?Stage::Validating,
            mime = upload.declared_mime_type(),
            size_bytes = upload.size_bytes(),
            "validating upload"
        );
        validate(upload, self.max_upload_bytes)?;

        debug!(stage = ?Stage::Converting, "converting");
        let input = upload.read_bytes().await?;
        let codec = Arc::clone(&self.codec);
        let output_bytes = tokio::task::spawn_blocking(move || codec.convert(&input))
            .await
            .map_err(|e| ConversionError::codec(format!("codec task failed: {e}")))??;

        Ok(ConversionResult { output_bytes, output_filename: upload.output_filename() })
    }

    fn reject(&self, err: ConversionError) -> Response {
        if err.kind.status() == Status::InternalServerError {
            error!(kind = ?err.kind, "conversion failed: {err}");
        } else {
            warn!(kind = ?err.kind, "request rejected: {err}");
        }
        err.to_response(self.expose_diagnostics)
    }
}
