//! Progress-callback trait for per-stage conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to be told
//! when the pipeline moves from one stage to the next. A conversion is one
//! batch of images, so events are per stage rather than per page.
//!
//! # Example
//!
//! ```rust
//! use notes2pdf::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl ConversionProgressCallback for Printer {
//!     fn on_stage(&self, stage: notes2pdf::Stage) {
//!         eprintln!("→ {stage}");
//!     }
//! }
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(Arc::new(Printer) as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::fmt;
use std::sync::Arc;

/// Pipeline stage announced through [`ConversionProgressCallback::on_stage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Reading and encoding the input images.
    Encoding,
    /// Waiting for the model's transcription.
    Transcribing,
    /// Running the structural normalizer.
    Normalizing,
    /// Loading the document and waiting for math typesetting.
    Rendering,
    /// Printing the page to the binary document.
    Exporting,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Encoding => "encoding images",
            Stage::Transcribing => "transcribing notes",
            Stage::Normalizing => "normalizing markup",
            Stage::Rendering => "rendering document",
            Stage::Exporting => "exporting PDF",
        };
        f.write_str(label)
    }
}

/// Called by the conversion pipeline as it moves through its stages.
///
/// Implementations must be `Send + Sync`: the HTTP server shares one config
/// across concurrent requests. All methods have default no-op
/// implementations so callers only override what they care about.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once, after input validation, with the number of images.
    fn on_conversion_start(&self, image_count: usize) {
        let _ = image_count;
    }

    /// Called when a new stage begins.
    fn on_stage(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when the model's transcription arrives.
    ///
    /// # Arguments
    /// * `chars`: character count of the raw transcript
    fn on_transcribed(&self, chars: usize) {
        let _ = chars;
    }

    /// Called once both artifacts are written.
    ///
    /// # Arguments
    /// * `pdf_url`: public path of the binary document
    fn on_conversion_complete(&self, pdf_url: &str) {
        let _ = pdf_url;
    }

    /// Called when the conversion fails, with the internal error text.
    fn on_conversion_error(&self, error: &str) {
        let _ = error;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
