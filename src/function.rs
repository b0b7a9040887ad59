//! Serverless-function entry point.
//!
//! The platform hands over one HTTP request as a JSON event and expects a
//! JSON response back. Binary payloads travel base64-encoded with an
//! `isBase64Encoded` flag on both sides. The conversion itself is the same
//! [`Pipeline`] the standalone server uses.
//!
//! ```json
//! { "httpMethod": "POST",
//!   "headers": { "content-type": "multipart/form-data; boundary=x" },
//!   "body": "LS14DQo...",
//!   "isBase64Encoded": true }
//! ```

use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConversionError, ErrorKind};
use crate::method::Method;
use crate::pipeline::Pipeline;
use crate::response::Response;
use crate::status::Status;

/// One inbound request.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionEvent {
    pub http_method: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub is_base64_encoded: bool,
}

impl FunctionEvent {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn decode_body(&self) -> Result<Bytes, ConversionError> {
        let Some(body) = &self.body else {
            return Ok(Bytes::new());
        };
        if self.is_base64_encoded {
            STANDARD
                .decode(body)
                .map(Bytes::from)
                .map_err(|e| ConversionError::malformed(format!("base64 body: {e}")))
        } else {
            Ok(Bytes::copy_from_slice(body.as_bytes()))
        }
    }
}

/// One outbound response.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub is_base64_encoded: bool,
}

impl FunctionResponse {
    /// Decoded body bytes.
    pub fn body_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        if self.is_base64_encoded {
            STANDARD.decode(&self.body)
        } else {
            Ok(self.body.clone().into_bytes())
        }
    }
}

/// Runs one event through the pipeline.
pub async fn handle_event(pipeline: &Pipeline, event: FunctionEvent) -> FunctionResponse {
    let Ok(method) = event.http_method.parse::<Method>() else {
        return to_function_response(ConversionError::new(ErrorKind::MethodNotAllowed).to_response(false));
    };

    let body = match event.decode_body() {
        Ok(body) => body,
        Err(err) => {
            warn!(kind = ?err.kind, "rejecting event: {err}");
            return to_function_response(err.to_response(false));
        }
    };

    let response = pipeline.handle(method, event.header("content-type"), body).await;
    to_function_response(response)
}

/// Successful conversions carry binary data and are base64 encoded; error
/// bodies are JSON text and pass through as-is.
fn to_function_response(response: Response) -> FunctionResponse {
    let status = response.status_code();
    let headers = response
        .headers()
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let (body, is_base64_encoded) = if status == Status::Ok {
        (STANDARD.encode(response.body()), true)
    } else {
        (String::from_utf8_lossy(response.body()).into_owned(), false)
    };
    FunctionResponse { status_code: status.into(), headers, body, is_base64_encoded }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_deserializes_platform_shape() {
        let event: FunctionEvent = serde_json::from_str(
            r#"{"httpMethod":"POST","headers":{"Content-Type":"multipart/form-data; boundary=b"},
                "body":"aGk=","isBase64Encoded":true}"#,
        )
        .unwrap();
        assert_eq!(event.http_method, "POST");
        assert_eq!(event.header("content-type"), Some("multipart/form-data; boundary=b"));
        assert_eq!(event.decode_body().unwrap().as_ref(), b"hi");
    }

    #[test]
    fn missing_optional_fields_default() {
        let event: FunctionEvent = serde_json::from_str(r#"{"httpMethod":"GET"}"#).unwrap();
        assert!(event.headers.is_empty());
        assert!(event.decode_body().unwrap().is_empty());
    }

    #[test]
    fn plain_body_is_taken_verbatim() {
        let event = FunctionEvent {
            http_method: "POST".to_owned(),
            body: Some("--b\r\n".to_owned()),
            ..FunctionEvent::default()
        };
        assert_eq!(event.decode_body().unwrap().as_ref(), b"--b\r\n");
    }

    #[test]
    fn invalid_base64_is_malformed() {
        let event = FunctionEvent {
            http_method: "POST".to_owned(),
            body: Some("***".to_owned()),
            is_base64_encoded: true,
            ..FunctionEvent::default()
        };
        assert_eq!(event.decode_body().unwrap_err().kind, ErrorKind::MalformedRequest);
    }

    #[test]
    fn error_responses_stay_text() {
        let res = to_function_response(ConversionError::new(ErrorKind::NoFileProvided).to_response(false));
        assert_eq!(res.status_code, 400);
        assert!(!res.is_base64_encoded);
        assert_eq!(res.body, r#"{"error":"No file uploaded"}"#);
        assert_eq!(res.headers["content-type"], "application/json");
    }

    #[test]
    fn success_responses_are_base64() {
        let res = to_function_response(
            Response::builder().bytes(crate::response::ContentType::Webp, vec![0xff, 0x00, 0x10]),
        );
        assert_eq!(res.status_code, 200);
        assert!(res.is_base64_encoded);
        assert_eq!(res.body_bytes().unwrap(), vec![0xff, 0x00, 0x10]);
    }
}
