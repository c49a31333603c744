//! Headless rendering: load the wrapper page, wait for it, print it.
//!
//! The browser sits behind two small traits so the orchestration here can
//! be driven by a scripted surface in tests and by Chromium in production
//! (see [`crate::browser::ChromeEngine`]).
//!
//! ## Two-level wait
//!
//! The page itself polls for the math library and sets `renderFinished`
//! when it is done (typeset or not). This side only polls that one flag,
//! every `finish_poll_interval_ms`, under a `render_timeout_secs` deadline.
//! Because the in-page wait is bounded well below the deadline, a missing
//! math library degrades to raw `$…$` text and never to a timeout.

use crate::config::{ConversionConfig, PageFormat};
use crate::error::Notes2PdfError;
use crate::pipeline::template::{MATH_RENDERED_FLAG, RENDER_FINISHED_FLAG};
use crate::pipeline::wait::{poll_until, with_deadline, PollPolicy};
use crate::progress::Stage;
use async_trait::async_trait;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Something that can hand out isolated pages.
///
/// One engine is shared for the life of the process; every conversion
/// opens its own surface so concurrent jobs never see each other's state.
#[async_trait]
pub trait RenderEngine: Send + Sync {
    async fn open_surface(&self) -> Result<Box<dyn RenderSurface>, Notes2PdfError>;

    /// Stop whatever backs the engine. Surfaces opened afterwards fail.
    async fn shutdown(&self) {}
}

/// One page of a [`RenderEngine`].
#[async_trait]
pub trait RenderSurface: Send + Sync {
    /// Replace the page content with a full HTML document and start its scripts.
    async fn load(&self, html: &str) -> Result<(), Notes2PdfError>;

    /// Read a boolean window property. Anything but `true` reads as `false`.
    async fn flag(&self, name: &str) -> Result<bool, Notes2PdfError>;

    /// Print the current page, backgrounds included.
    async fn export_pdf(&self, format: PageFormat) -> Result<Vec<u8>, Notes2PdfError>;

    /// Release the page. Called exactly once per surface.
    async fn close(&self) -> Result<(), Notes2PdfError>;
}

/// What one render produced.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub pdf: Vec<u8>,
    /// Whether the page typeset its math before declaring itself done.
    pub math_typeset: bool,
    /// Number of reads of the finished flag.
    pub finish_polls: u32,
    pub duration_ms: u64,
}

/// Render a complete wrapper page on a fresh surface.
///
/// The surface is closed on every path, success or failure. A failing
/// close is logged and does not change the result.
pub async fn render_document(
    engine: &dyn RenderEngine,
    page: &str,
    config: &ConversionConfig,
) -> Result<RenderedDocument, Notes2PdfError> {
    let start = Instant::now();
    let surface = engine.open_surface().await?;

    let result = drive(surface.as_ref(), page, config).await;

    if let Err(e) = surface.close().await {
        warn!("Failed to close render surface: {}", e);
    }

    let (pdf, math_typeset, finish_polls) = result?;
    let duration_ms = start.elapsed().as_millis() as u64;
    info!(
        bytes = pdf.len(),
        math_typeset, finish_polls, duration_ms, "Document rendered"
    );
    Ok(RenderedDocument {
        pdf,
        math_typeset,
        finish_polls,
        duration_ms,
    })
}

async fn drive(
    surface: &dyn RenderSurface,
    page: &str,
    config: &ConversionConfig,
) -> Result<(Vec<u8>, bool, u32), Notes2PdfError> {
    surface.load(page).await?;
    debug!(bytes = page.len(), "Wrapper page loaded");

    let policy = PollPolicy::unbounded(config.finish_poll_interval());
    let outcome = with_deadline(
        config.render_timeout(),
        poll_until(policy, move || surface.flag(RENDER_FINISHED_FLAG)),
    )
    .await?;
    let finish_polls = outcome.attempts();

    let math_typeset = surface.flag(MATH_RENDERED_FLAG).await?;
    if !math_typeset {
        warn!("Math library did not load in time; exporting formulas as plain text");
    }

    if let Some(ref cb) = config.progress_callback {
        cb.on_stage(Stage::Exporting);
    }
    let pdf = surface.export_pdf(config.page_format).await?;
    if pdf.is_empty() {
        return Err(Notes2PdfError::Surface("print returned an empty document".into()));
    }

    Ok((pdf, math_typeset, finish_polls))
}
