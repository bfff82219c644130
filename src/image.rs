//! Local image files to inline base64 payloads.

use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;

use crate::message::InlineImage;

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} is not a recognized image type")]
    NotAnImage { path: PathBuf },
    #[error("{path} is empty")]
    Empty { path: PathBuf },
}

/// MIME type guessed from the file extension, only when it is `image/*`.
#[must_use]
pub fn image_mime_type(path: &Path) -> Option<String> {
    mime_guess::from_path(path)
        .iter()
        .find(|m| m.type_() == mime_guess::mime::IMAGE)
        .map(|m| m.essence_str().to_string())
}

/// Read `path` and encode it as an inline image.
///
/// # Errors
///
/// Returns [`EncodeError`] if the extension is not an image type, the file
/// cannot be read, or it is empty.
pub async fn encode_file(path: &Path) -> Result<InlineImage, EncodeError> {
    let mime_type = image_mime_type(path).ok_or_else(|| EncodeError::NotAnImage { path: path.to_path_buf() })?;
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| EncodeError::Read { path: path.to_path_buf(), source })?;
    if bytes.is_empty() {
        return Err(EncodeError::Empty { path: path.to_path_buf() });
    }
    Ok(InlineImage::new(mime_type, BASE64_STANDARD.encode(bytes)))
}

/// Decode an inline image back to raw bytes.
///
/// # Errors
///
/// Returns the base64 decode error for malformed payloads.
pub fn decode(image: &InlineImage) -> Result<Vec<u8>, base64::DecodeError> {
    BASE64_STANDARD.decode(image.data.as_bytes())
}

/// Preferred file extension for a MIME type, falling back to `bin`.
#[must_use]
pub fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        other => mime_guess::get_mime_extensions_str(other)
            .and_then(|exts| exts.first().copied())
            .unwrap_or("bin"),
    }
}

#[cfg(test)]
#[path = "image_test.rs"]
mod tests;
