//! Staged image validation and preview derivation.

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;

use super::{WorkflowError, WorkflowResult};
use crate::gateway::ImagePayload;

/// Largest upload the server accepts.
pub const MAX_IMAGE_BYTES: usize = 16 * 1024 * 1024;

/// Extensions the server accepts, with the MIME type sent for each.
const ALLOWED: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("bmp", "image/bmp"),
    ("webp", "image/webp"),
];

/// Check a file before staging it and build the upload payload.
pub fn validate_image(bytes: Bytes, file_name: &str) -> WorkflowResult<ImagePayload> {
    if bytes.is_empty() {
        return Err(WorkflowError::InvalidImage(format!("{} is empty", file_name)));
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(WorkflowError::InvalidImage(format!(
            "{} is {} bytes, limit is {}",
            file_name,
            bytes.len(),
            MAX_IMAGE_BYTES
        )));
    }

    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let mime = ALLOWED
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, mime)| *mime)
        .ok_or_else(|| {
            WorkflowError::InvalidImage(format!("{} is not a supported image type", file_name))
        })?;

    Ok(ImagePayload {
        bytes,
        file_name: file_name.to_string(),
        mime,
    })
}

/// Identify an image from its leading bytes.
fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n";
    if bytes.starts_with(PNG) {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(b"BM") {
        Some("image/bmp")
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

/// Inline `data:` URL for showing the staged image before upload.
pub fn derive_preview(bytes: &[u8]) -> Result<String, String> {
    let mime = sniff_mime(bytes).ok_or_else(|| "unrecognized image data".to_string())?;
    Ok(format!("data:{};base64,{}", mime, STANDARD.encode(bytes)))
}
