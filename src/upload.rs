//! The uploaded file and the conversion result derived from it.

use std::io;
use std::path::Path;

use crate::response::{ContentType, IntoResponse, Response};
use crate::storage::ScopedFile;

/// Stem used when the client sends a file part without a filename.
const FALLBACK_STEM: &str = "converted";

/// One uploaded file, held in scoped temporary storage.
///
/// Owned by exactly one pipeline invocation. Dropping it removes the
/// temporary file.
#[derive(Debug)]
pub struct UploadedFile {
    file: ScopedFile,
    original_filename: Option<String>,
    declared_mime_type: String,
    size_bytes: u64,
}

impl UploadedFile {
    pub(crate) fn new(
        file: ScopedFile,
        original_filename: Option<String>,
        declared_mime_type: String,
        size_bytes: u64,
    ) -> Self {
        Self { file, original_filename, declared_mime_type, size_bytes }
    }

    /// Filename as sent by the client, if it sent one.
    pub fn original_filename(&self) -> Option<&str> {
        self.original_filename.as_deref()
    }

    /// Lowercased MIME essence from the part's `Content-Type`.
    pub fn declared_mime_type(&self) -> &str {
        &self.declared_mime_type
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub async fn read_bytes(&self) -> io::Result<Vec<u8>> {
        tokio::fs::read(self.file.path()).await
    }

    pub fn output_filename(&self) -> String {
        output_filename(self.original_filename.as_deref().unwrap_or(""))
    }
}

/// Replaces the final extension of `original` with `.webp`.
///
/// Directory components are discarded first, using both `/` and `\` as
/// separators since the name comes from arbitrary clients. A leading dot
/// does not start an extension, so `.hidden` becomes `.hidden.webp`.
pub fn output_filename(original: &str) -> String {
    let base = original.rsplit(['/', '\\']).next().unwrap_or(original);
    let stem = match base.rfind('.') {
        Some(i) if i > 0 => &base[..i],
        _ => base,
    };
    if stem.is_empty() {
        format!("{FALLBACK_STEM}.webp")
    } else {
        format!("{stem}.webp")
    }
}

/// `attachment; filename="..."` for `filename`.
///
/// Quotes and backslashes are escaped and control characters dropped. Names
/// with non-ASCII characters get an ASCII fallback plus an RFC 5987
/// `filename*` parameter carrying the UTF-8 name.
pub fn content_disposition(filename: &str) -> String {
    let ascii: String = filename
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| if c.is_ascii() { c } else { '_' })
        .flat_map(|c| match c {
            '"' | '\\' => vec!['\\', c],
            c => vec![c],
        })
        .collect();

    if filename.is_ascii() {
        return format!("attachment; filename=\"{ascii}\"");
    }

    let encoded: String = filename
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{b:02X}"),
        })
        .collect();
    format!("attachment; filename=\"{ascii}\"; filename*=UTF-8''{encoded}")
}

/// A successful conversion.
#[derive(Debug)]
pub struct ConversionResult {
    pub output_bytes: Vec<u8>,
    pub output_filename: String,
}

impl IntoResponse for ConversionResult {
    fn into_response(self) -> Response {
        let length = self.output_bytes.len().to_string();
        Response::builder()
            .header("content-length", &length)
            .header("content-disposition", &content_disposition(&self.output_filename))
            .bytes(ContentType::Webp, self.output_bytes)
    }
}
