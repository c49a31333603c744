//! Input handling: validate an image batch and clean it up afterwards.
//!
//! Images arrive either as paths the caller owns (CLI) or as uploads the
//! server spooled to disk. Uploads are held as [`TempPath`]s so they are
//! removed when dropped even if a handler panics; [`cleanup_inputs`]
//! removes them explicitly so a failure to delete is at least logged.

use crate::error::Notes2PdfError;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tracing::{debug, warn};

/// One image in a conversion batch.
#[derive(Debug)]
pub enum InputImage {
    /// A file owned by the caller. Never deleted.
    Local {
        path: PathBuf,
        mime_type: Option<String>,
    },
    /// A spooled upload. Deleted after the conversion, whatever its outcome.
    Uploaded {
        path: TempPath,
        mime_type: Option<String>,
    },
}

impl InputImage {
    pub fn local(path: impl Into<PathBuf>) -> Self {
        InputImage::Local {
            path: path.into(),
            mime_type: None,
        }
    }

    pub fn uploaded(path: TempPath, mime_type: Option<String>) -> Self {
        InputImage::Uploaded { path, mime_type }
    }

    /// Path of the image on disk regardless of who owns it.
    pub fn path(&self) -> &Path {
        match self {
            InputImage::Local { path, .. } => path,
            InputImage::Uploaded { path, .. } => path,
        }
    }

    /// MIME type declared by whoever supplied the file, if any.
    pub fn declared_mime(&self) -> Option<&str> {
        match self {
            InputImage::Local { mime_type, .. } | InputImage::Uploaded { mime_type, .. } => {
                mime_type.as_deref()
            }
        }
    }

    pub fn is_uploaded(&self) -> bool {
        matches!(self, InputImage::Uploaded { .. })
    }
}

/// Reject a batch before any work is done on it.
pub fn validate_batch(images: &[InputImage], max_images: usize) -> Result<(), Notes2PdfError> {
    if images.is_empty() {
        return Err(Notes2PdfError::NoInput);
    }
    if images.len() > max_images {
        return Err(Notes2PdfError::TooManyImages {
            count: images.len(),
            max: max_images,
        });
    }
    for image in images {
        check_readable(image.path())?;
    }
    debug!("Validated batch of {} image(s)", images.len());
    Ok(())
}

/// Existence and read-permission check for one input file.
fn check_readable(path: &Path) -> Result<(), Notes2PdfError> {
    if !path.exists() {
        return Err(Notes2PdfError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    match std::fs::File::open(path) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            Err(Notes2PdfError::PermissionDenied {
                path: path.to_path_buf(),
            })
        }
        Err(_) => Err(Notes2PdfError::FileNotFound {
            path: path.to_path_buf(),
        }),
    }
}

/// Delete every uploaded image in the batch. Caller-owned files are left
/// alone. A file that is already gone counts as cleaned up.
///
/// Returns the number of uploads removed by this call.
pub fn cleanup_inputs(images: Vec<InputImage>) -> usize {
    let mut removed = 0;
    for image in images {
        let InputImage::Uploaded { path, .. } = image else {
            continue;
        };
        let shown = path.display().to_string();
        match path.close() {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Upload {} was already removed", shown);
            }
            Err(e) => warn!("Failed to remove upload {}: {}", shown, e),
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn upload() -> InputImage {
        let file = NamedTempFile::new().unwrap();
        InputImage::uploaded(file.into_temp_path(), Some("image/png".into()))
    }

    #[test]
    fn empty_batch_is_no_input() {
        let err = validate_batch(&[], 10).unwrap_err();
        assert!(matches!(err, Notes2PdfError::NoInput));
    }

    #[test]
    fn oversized_batch_is_rejected() {
        let images: Vec<_> = (0..3).map(|_| upload()).collect();
        let err = validate_batch(&images, 2).unwrap_err();
        assert!(matches!(err, Notes2PdfError::TooManyImages { count: 3, max: 2 }));
    }

    #[test]
    fn missing_local_file_is_reported() {
        let images = vec![InputImage::local("/nonexistent/notes-page-1.png")];
        let err = validate_batch(&images, 10).unwrap_err();
        assert!(matches!(err, Notes2PdfError::FileNotFound { .. }));
        assert!(err.is_input_error());
    }

    #[test]
    fn uploads_are_removed_and_locals_kept() {
        let local = NamedTempFile::new().unwrap();
        let up = upload();
        let up_path = up.path().to_path_buf();
        assert!(up_path.exists());

        let removed = cleanup_inputs(vec![InputImage::local(local.path()), up]);
        assert_eq!(removed, 1);
        assert!(!up_path.exists());
        assert!(local.path().exists());
    }

    #[test]
    fn cleanup_tolerates_already_deleted_upload() {
        let up = upload();
        std::fs::remove_file(up.path()).unwrap();
        assert_eq!(cleanup_inputs(vec![up]), 0);
    }

    #[test]
    fn declared_mime_is_kept() {
        let up = upload();
        assert_eq!(up.declared_mime(), Some("image/png"));
        assert!(up.is_uploaded());
        assert_eq!(InputImage::local("a.jpg").declared_mime(), None);
    }
}
