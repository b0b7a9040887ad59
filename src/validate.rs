//! Upload gatekeeping before any decode work happens.

use crate::error::{ConversionError, ErrorKind};
use crate::upload::UploadedFile;

/// The only accepted declared MIME type.
pub const AVIF_MIME: &str = "image/avif";

/// Rejects uploads that are not declared AVIF or exceed `max_upload_bytes`.
///
/// The declared MIME type is authoritative; the filename extension is not
/// consulted. The type check runs before the size check.
pub fn validate(upload: &UploadedFile, max_upload_bytes: u64) -> Result<(), ConversionError> {
    check(upload.declared_mime_type(), upload.size_bytes(), max_upload_bytes)
}

fn check(declared_mime_type: &str, size_bytes: u64, max_upload_bytes: u64) -> Result<(), ConversionError> {
    if !declared_mime_type.eq_ignore_ascii_case(AVIF_MIME) {
        return Err(ConversionError::with_detail(
            ErrorKind::UnsupportedMediaType,
            format!("declared type `{declared_mime_type}`"),
        ));
    }
    if size_bytes > max_upload_bytes {
        return Err(ConversionError::with_detail(
            ErrorKind::PayloadTooLarge,
            format!("{size_bytes} bytes exceeds limit of {max_upload_bytes}"),
        ));
    }
    Ok(())
}
