//! `multipart/form-data` parsing for the upload endpoint.
//!
//! The body has already been buffered by the server, so it is fed to
//! [`multer`] as a one-item stream. The `image` part is streamed chunk by
//! chunk into scoped temporary storage.

use std::convert::Infallible;

use bytes::Bytes;
use multer::{Field, Multipart};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{ConversionError, ErrorKind};
use crate::storage::TempStore;
use crate::upload::UploadedFile;

/// Form field that carries the file.
pub const FILE_FIELD: &str = "image";

/// MIME type recorded for a file part that declares none.
const DEFAULT_MIME: &str = "application/octet-stream";

/// Extracts the `image` part of a multipart body into `store`.
///
/// Only the first `image` part is used; any later ones are read and
/// discarded. Other fields are ignored.
pub async fn parse_upload(
    content_type: Option<&str>,
    body: Bytes,
    store: &TempStore,
) -> Result<UploadedFile, ConversionError> {
    let content_type =
        content_type.ok_or_else(|| ConversionError::malformed("missing content-type header"))?;
    let boundary = multer::parse_boundary(content_type).map_err(ConversionError::malformed)?;

    let stream = futures_util::stream::once(async move { Ok::<Bytes, Infallible>(body) });
    let mut multipart = Multipart::new(stream, boundary);

    let mut upload: Option<UploadedFile> = None;
    while let Some(mut field) = multipart.next_field().await.map_err(ConversionError::malformed)? {
        if field.name() != Some(FILE_FIELD) {
            drain(&mut field).await?;
        } else if upload.is_some() {
            debug!(field = FILE_FIELD, "discarding additional file part");
            drain(&mut field).await?;
        } else {
            upload = Some(receive(field, store).await?);
        }
    }

    match upload {
        Some(upload) if upload.size_bytes() > 0 => Ok(upload),
        Some(_) => Err(ConversionError::with_detail(ErrorKind::NoFileProvided, "file part is empty")),
        None => Err(ErrorKind::NoFileProvided.into()),
    }
}

/// Streams one file part into a fresh temporary file.
///
/// On any error the temporary file guard is dropped before returning, which
/// removes the partial file.
async fn receive(mut field: Field<'_>, store: &TempStore) -> Result<UploadedFile, ConversionError> {
    let original_filename = field
        .file_name()
        .filter(|name| !name.is_empty())
        .map(str::to_owned);
    let declared_mime_type = field
        .content_type()
        .map(|mime| mime.essence_str().to_ascii_lowercase())
        .unwrap_or_else(|| DEFAULT_MIME.to_owned());

    let (mut file, guard) = store.create()?;
    let mut size_bytes: u64 = 0;
    while let Some(chunk) = field.chunk().await.map_err(ConversionError::malformed)? {
        size_bytes += chunk.len() as u64;
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    debug!(
        filename = original_filename.as_deref().unwrap_or(""),
        mime = %declared_mime_type,
        size_bytes,
        "received file part"
    );
    Ok(UploadedFile::new(guard, original_filename, declared_mime_type, size_bytes))
}

async fn drain(field: &mut Field<'_>) -> Result<(), ConversionError> {
    while field.chunk().await.map_err(ConversionError::malformed)?.is_some() {}
    Ok(())
}
