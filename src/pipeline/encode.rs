//! Image encoding: file on disk → base64 `ImageData` for the vision request.
//!
//! The bytes are sent as they are; photos of notes are already JPEG or PNG
//! and re-encoding would only lose detail. The MIME type is taken from the
//! file's magic bytes rather than its name or the uploader's claim, since
//! browsers happily label a HEIC photo `image/jpeg`.

use crate::error::Notes2PdfError;
use crate::pipeline::input::InputImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::ImageFormat;
use std::path::Path;
use tracing::{debug, warn};

/// Formats vision providers accept as inline data.
const ACCEPTED: &[ImageFormat] = &[
    ImageFormat::Png,
    ImageFormat::Jpeg,
    ImageFormat::Gif,
    ImageFormat::WebP,
];

/// Read and base64-encode one input image.
pub async fn encode_image(input: &InputImage) -> Result<ImageData, Notes2PdfError> {
    let path = input.path();
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => Notes2PdfError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => Notes2PdfError::FileNotFound {
            path: path.to_path_buf(),
        },
    })?;

    let mime = sniff_mime(path, &bytes)?;
    if let Some(declared) = input.declared_mime() {
        if declared != mime {
            warn!(
                "{}: declared as {} but content is {}",
                path.display(),
                declared,
                mime
            );
        }
    }

    let b64 = STANDARD.encode(&bytes);
    debug!("Encoded {} ({}) → {} bytes base64", path.display(), mime, b64.len());
    Ok(ImageData::new(b64, mime))
}

/// Encode a whole batch in order.
pub async fn encode_batch(inputs: &[InputImage]) -> Result<Vec<ImageData>, Notes2PdfError> {
    let mut out = Vec::with_capacity(inputs.len());
    for input in inputs {
        out.push(encode_image(input).await?);
    }
    Ok(out)
}

fn sniff_mime(path: &Path, bytes: &[u8]) -> Result<&'static str, Notes2PdfError> {
    let format = image::guess_format(bytes).map_err(|e| Notes2PdfError::UnsupportedImage {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    if !ACCEPTED.contains(&format) {
        return Err(Notes2PdfError::UnsupportedImage {
            path: path.to_path_buf(),
            detail: format!("{format:?} is not accepted by vision providers"),
        });
    }
    Ok(format.to_mime_type())
}
