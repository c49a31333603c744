//! Error types for the notes2pdf library.
//!
//! A single fatal error type, [`Notes2PdfError`], covers every way a
//! conversion can fail. Variants are grouped by where the failure happens:
//!
//! * **Input**: no images, too many images, unreadable or non-image files.
//!   Reported immediately, before any transcription or rendering work.
//! * **Generation**: the provider is not configured, the API call failed,
//!   or the model returned nothing usable.
//! * **Rendering**: the browser could not be launched, a surface call
//!   failed, or the render-finished signal never arrived.
//! * **I/O**: the debug or binary artifact could not be written.
//!
//! Recoverable problems never reach this type: a malformed math expression
//! is left as literal text inside the page, and cleanup failures (temp file
//! already gone, page already closed) are logged and dropped.
//!
//! Callers exposing errors to untrusted clients should go through
//! [`Notes2PdfError::public_message`], which collapses every non-input
//! failure to one generic message so internal detail stays in the logs.

use std::path::PathBuf;
use thiserror::Error;

/// Message returned to clients for any failure that is not an input error.
pub const GENERIC_FAILURE_MESSAGE: &str = "Conversion failed.";

/// All fatal errors returned by the notes2pdf library.
#[derive(Debug, Error)]
pub enum Notes2PdfError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The request carried no images at all.
    #[error("No input images were provided")]
    NoInput,

    /// More images than the configured per-request maximum.
    #[error("Too many images: got {count}, at most {max} are accepted per conversion")]
    TooManyImages { count: usize, max: usize },

    /// An input image path does not exist.
    #[error("Image file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on an input image.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file was read but is not an image format the provider accepts.
    #[error("Unsupported image '{path}': {detail}")]
    UnsupportedImage { path: PathBuf, detail: String },

    /// The upload request body could not be parsed.
    #[error("Malformed upload: {detail}")]
    MalformedUpload { detail: String },

    // ── Generation errors ─────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The LLM API call failed. Not retried.
    #[error("LLM API error: {message}")]
    LlmApiError { message: String },

    /// The model answered, but with nothing that can be turned into a document.
    #[error("The model returned an empty transcription")]
    EmptyTranscription,

    // ── Rendering errors ──────────────────────────────────────────────────
    /// The headless browser process could not be started.
    #[error(
        "Failed to launch headless browser: {0}\n\n\
Install Chrome or Chromium, or point --chrome at an existing executable.\n"
    )]
    BrowserLaunch(String),

    /// A call against the render surface (load, evaluate, export) failed.
    #[error("Render surface error: {0}")]
    Surface(String),

    /// The render-finished flag was not observed before the deadline.
    #[error("Rendering did not finish within {secs}s")]
    RenderTimeout { secs: u64 },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write one of the output artifacts.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Notes2PdfError {
    /// True for failures caused by what the caller sent rather than by
    /// the pipeline itself.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::NoInput
                | Self::TooManyImages { .. }
                | Self::FileNotFound { .. }
                | Self::PermissionDenied { .. }
                | Self::UnsupportedImage { .. }
                | Self::MalformedUpload { .. }
        )
    }

    /// The message safe to hand back to an untrusted caller.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::NoInput => "No files uploaded.",
            Self::TooManyImages { .. } => "Too many files uploaded.",
            Self::FileNotFound { .. }
            | Self::PermissionDenied { .. }
            | Self::UnsupportedImage { .. } => "Unreadable input file.",
            Self::MalformedUpload { .. } => "Malformed upload.",
            _ => GENERIC_FAILURE_MESSAGE,
        }
    }
}
