//! # notes2pdf
//!
//! Turn photographed handwritten notes into typeset PDF documents.
//!
//! A Vision Language Model reads the note images and answers with loosely
//! structured HTML. That answer is rarely print-ready: fenced in markdown,
//! sprinkled with stray `<br>`s, numbered sections as plain text, SVG
//! primitives with no `<svg>` around them. The normalizer rebuilds it into
//! clean semantic HTML, then a headless Chromium tab typesets the `$…$`
//! math with KaTeX and prints the page.
//!
//! ## Pipeline Overview
//!
//! ```text
//! images
//!  │
//!  ├─ 1. Input      validate the batch (count, readability)
//!  ├─ 2. Encode     bytes → base64 ImageData, MIME sniffed
//!  ├─ 3. VLM        one multimodal call, no retry
//!  ├─ 4. Normalize  8 regex passes + diagram collector
//!  ├─ 5. Render     wrapper page → math typeset → readiness flag
//!  └─ 6. Export     {ts}.html (debug) + {ts}.pdf (atomic write)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use notes2pdf::{convert_images, BrowserOptions, ChromeEngine, ConversionConfig, InputImage};
//! use notes2pdf::RenderEngine;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected; GEMINI_API_KEY is preferred.
//!     let config = ConversionConfig::default();
//!     let engine = ChromeEngine::launch(&BrowserOptions::default()).await?;
//!     let images = vec![InputImage::local("page1.jpg"), InputImage::local("page2.jpg")];
//!     let output = convert_images(images, &engine, &config).await?;
//!     println!("{}", output.pdf_path.display());
//!     engine.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | Enables the `notes2pdf` binary (clap + anyhow + tracing-subscriber) |
//! | `server` | on      | Enables [`server`]: the axum HTTP endpoint |
//!
//! The normalizer alone needs neither a browser nor an API key:
//!
//! ```rust
//! let html = notes2pdf::normalize("```html\n3. Overview\n- apple\n```");
//! assert_eq!(html, "<h3>3. Overview</h3>\n<ul><li>apple</li></ul>");
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod browser;
pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
#[cfg(feature = "server")]
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use browser::{BrowserOptions, ChromeEngine};
pub use config::{ConversionConfig, ConversionConfigBuilder, PageFormat};
pub use convert::{convert_images, convert_transcript};
pub use error::Notes2PdfError;
pub use output::{ConversionOutput, ConversionResponse, ConversionStats, ErrorResponse};
pub use pipeline::classify::Block;
pub use pipeline::input::InputImage;
pub use pipeline::normalize::normalize;
pub use pipeline::render::{RenderEngine, RenderSurface};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback, Stage};
