//! Result types returned by the conversion entry points.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Everything a finished conversion produced.
#[derive(Debug, Clone)]
pub struct ConversionOutput {
    /// Debug HTML artifact: the normalized document body.
    pub html_path: PathBuf,
    /// Binary document.
    pub pdf_path: PathBuf,
    /// Public path of the HTML artifact, e.g. `/converted/1718000000000.html`.
    pub html_url: String,
    /// Public path of the PDF.
    pub pdf_url: String,
    pub stats: ConversionStats,
}

impl ConversionOutput {
    pub fn response(&self) -> ConversionResponse {
        ConversionResponse {
            html_url: self.html_url.clone(),
            pdf_url: self.pdf_url.clone(),
        }
    }
}

/// Counters for one conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Images in the batch; zero when rendering a transcript directly.
    pub image_count: usize,
    /// Characters in the raw model output (or supplied transcript).
    pub transcript_chars: usize,
    /// Blocks emitted by the normalizer.
    pub block_count: usize,
    /// Blocks that are synthesized diagram containers.
    pub diagram_count: usize,
    /// Whether the math library loaded in the render surface.
    pub math_typeset: bool,
    pub pdf_bytes: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub transcribe_duration_ms: u64,
    pub render_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Success body of the HTTP endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResponse {
    pub html_url: String,
    pub pdf_url: String,
}

/// Error body of the HTTP endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
