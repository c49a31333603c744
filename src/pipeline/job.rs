//! Output artifacts of one render job: `{base}.html` and `{base}.pdf`.
//!
//! The base name is the job's start time in epoch milliseconds. Two jobs
//! starting in the same millisecond would collide, so the HTML file is
//! created with `create_new` and the base is bumped until a free one is
//! found. The PDF is written to a temp name first and renamed into place,
//! so a reader never sees a half-written document.

use crate::error::Notes2PdfError;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::AsyncWriteExt;
use tracing::debug;

const MAX_NAME_ATTEMPTS: u64 = 1000;

/// Current time in epoch milliseconds.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Join a public prefix and a file name into a URL path.
pub fn public_url(prefix: &str, file_name: &str) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), file_name)
}

/// The two files a conversion leaves behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderJob {
    pub base_name: String,
    pub html_path: PathBuf,
    pub pdf_path: PathBuf,
}

impl RenderJob {
    pub fn new(output_dir: &Path, timestamp_ms: u64) -> Self {
        let base_name = timestamp_ms.to_string();
        Self {
            html_path: output_dir.join(format!("{base_name}.html")),
            pdf_path: output_dir.join(format!("{base_name}.pdf")),
            base_name,
        }
    }

    /// Claim a fresh base name at or after `timestamp_ms` and write the
    /// debug HTML under it.
    pub async fn create(
        output_dir: &Path,
        timestamp_ms: u64,
        html: &str,
    ) -> Result<Self, Notes2PdfError> {
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|e| Notes2PdfError::OutputWriteFailed {
                path: output_dir.to_path_buf(),
                source: e,
            })?;

        for offset in 0..MAX_NAME_ATTEMPTS {
            let job = Self::new(output_dir, timestamp_ms + offset);
            let file = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&job.html_path)
                .await;
            let mut file = match file {
                Ok(f) => f,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(Notes2PdfError::OutputWriteFailed {
                        path: job.html_path,
                        source: e,
                    })
                }
            };
            let write = async {
                file.write_all(html.as_bytes()).await?;
                file.flush().await
            };
            write.await.map_err(|e| Notes2PdfError::OutputWriteFailed {
                path: job.html_path.clone(),
                source: e,
            })?;
            debug!("Wrote {}", job.html_path.display());
            return Ok(job);
        }

        Err(Notes2PdfError::Internal(format!(
            "No free output name in {} after {} attempts",
            output_dir.display(),
            MAX_NAME_ATTEMPTS
        )))
    }

    /// Write the binary document atomically (temp file + rename).
    pub async fn write_pdf(&self, bytes: &[u8]) -> Result<(), Notes2PdfError> {
        let tmp_path = self.pdf_path.with_extension("pdf.tmp");
        tokio::fs::write(&tmp_path, bytes)
            .await
            .map_err(|e| Notes2PdfError::OutputWriteFailed {
                path: self.pdf_path.clone(),
                source: e,
            })?;
        tokio::fs::rename(&tmp_path, &self.pdf_path)
            .await
            .map_err(|e| Notes2PdfError::OutputWriteFailed {
                path: self.pdf_path.clone(),
                source: e,
            })?;
        debug!("Wrote {} ({} bytes)", self.pdf_path.display(), bytes.len());
        Ok(())
    }

    pub fn html_file_name(&self) -> String {
        format!("{}.html", self.base_name)
    }

    pub fn pdf_file_name(&self) -> String {
        format!("{}.pdf", self.base_name)
    }
}
