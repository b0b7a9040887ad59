//! Error types.
//!
//! Two layers, split by who ends up seeing them:
//!
//! - [`Error`] surfaces infrastructure failures: binding to a port, reading
//!   the config file, preparing the temporary directory, decoding a function
//!   event. These end the process.
//! - [`ConversionError`] is the per-request taxonomy. Every variant maps to an
//!   HTTP status and a JSON body at the pipeline boundary; none of them ever
//!   reaches hyper or the process.

use std::fmt;

use serde::Serialize;

use crate::response::Response;
use crate::status::Status;

/// The error type returned by the crate's infrastructure operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("config: {0}")]
    Config(String),
    #[error("config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

// ── Request-level errors ──────────────────────────────────────────────────────

/// What went wrong with one conversion request.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum ErrorKind {
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error("no file provided")]
    NoFileProvided,
    #[error("malformed request")]
    MalformedRequest,
    #[error("unsupported media type")]
    UnsupportedMediaType,
    #[error("payload too large")]
    PayloadTooLarge,
    #[error("codec failure")]
    CodecFailure,
    #[error("temporary storage failure")]
    Storage,
}

impl ErrorKind {
    /// HTTP status the kind is reported with.
    pub fn status(self) -> Status {
        match self {
            Self::MethodNotAllowed => Status::MethodNotAllowed,
            Self::NoFileProvided
            | Self::MalformedRequest
            | Self::UnsupportedMediaType => Status::BadRequest,
            Self::PayloadTooLarge => Status::ContentTooLarge,
            Self::CodecFailure | Self::Storage => Status::InternalServerError,
        }
    }

    /// Client-facing message placed in the `error` field of the JSON body.
    pub fn message(self) -> &'static str {
        match self {
            Self::MethodNotAllowed => "Method Not Allowed",
            Self::NoFileProvided => "No file uploaded",
            Self::MalformedRequest => "Malformed multipart request",
            Self::UnsupportedMediaType => "Only AVIF images are allowed",
            Self::PayloadTooLarge => "File exceeds the maximum upload size",
            Self::CodecFailure | Self::Storage => "Error converting the file",
        }
    }
}

/// A failed conversion request.
///
/// `detail` is a diagnostic for logs. It only reaches the client when the
/// pipeline runs with `expose_diagnostics` enabled.
#[derive(Debug, thiserror::Error)]
#[error("{kind}{}", .detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default())]
pub struct ConversionError {
    pub kind: ErrorKind,
    pub detail: Option<String>,
}

impl ConversionError {
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, detail: None }
    }

    pub fn with_detail(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self { kind, detail: Some(detail.into()) }
    }

    pub fn malformed(detail: impl fmt::Display) -> Self {
        Self::with_detail(ErrorKind::MalformedRequest, detail.to_string())
    }

    pub fn codec(detail: impl fmt::Display) -> Self {
        Self::with_detail(ErrorKind::CodecFailure, detail.to_string())
    }

    pub fn storage(detail: impl fmt::Display) -> Self {
        Self::with_detail(ErrorKind::Storage, detail.to_string())
    }
}

/// JSON error body: `{"error": "..."}`, plus `details` when diagnostics are exposed.
#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a str>,
}

impl ConversionError {
    /// Renders the error as the client sees it.
    pub fn to_response(&self, expose_diagnostics: bool) -> Response {
        let body = ErrorBody {
            error: self.kind.message(),
            details: self.detail.as_deref().filter(|_| expose_diagnostics),
        };
        let bytes = serde_json::to_vec(&body)
            .unwrap_or_else(|_| br#"{"error":"Internal Server Error"}"#.to_vec());
        Response::builder().status(self.kind.status()).json(bytes)
    }
}

impl From<ErrorKind> for ConversionError {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl From<std::io::Error> for ConversionError {
    fn from(e: std::io::Error) -> Self {
        Self::storage(e)
    }
}
