//! Chromium implementation of [`RenderEngine`].
//!
//! One headless browser process is launched up front and shared by every
//! conversion. Each conversion gets its own tab; the tab is closed by
//! [`crate::pipeline::render::render_document`] once the PDF is printed.
//! The CDP event handler runs on a background task for the life of the
//! engine and must keep being polled, or every page call stalls.

use crate::config::PageFormat;
use crate::error::Notes2PdfError;
use crate::pipeline::render::{RenderEngine, RenderSurface};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How to start the browser process.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// Chrome/Chromium binary. If None, the usual install locations are searched.
    pub chrome_executable: Option<PathBuf>,
    /// Timeout for a single DevTools request. Default: 180 s.
    pub request_timeout_secs: u64,
    /// Pass `--no-sandbox`. Needed when running as root in a container.
    pub no_sandbox: bool,
    /// Extra command-line switches.
    pub extra_args: Vec<String>,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            chrome_executable: None,
            request_timeout_secs: 180,
            no_sandbox: true,
            extra_args: Vec::new(),
        }
    }
}

impl BrowserOptions {
    fn to_config(&self) -> Result<BrowserConfig, Notes2PdfError> {
        let mut builder = BrowserConfig::builder()
            .request_timeout(Duration::from_secs(self.request_timeout_secs))
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage");
        if self.no_sandbox {
            builder = builder.no_sandbox().arg("--disable-setuid-sandbox");
        }
        if let Some(ref exe) = self.chrome_executable {
            builder = builder.chrome_executable(exe);
        }
        for arg in &self.extra_args {
            builder = builder.arg(arg.as_str());
        }
        builder.build().map_err(Notes2PdfError::BrowserLaunch)
    }
}

/// A shared headless Chromium process.
pub struct ChromeEngine {
    browser: Mutex<Browser>,
    handler: Mutex<Option<JoinHandle<()>>>,
}

impl ChromeEngine {
    /// Start the browser and its event loop.
    pub async fn launch(options: &BrowserOptions) -> Result<Self, Notes2PdfError> {
        let config = options.to_config()?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| Notes2PdfError::BrowserLaunch(e.to_string()))?;

        let handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler event error: {}", e);
                }
            }
            debug!("Browser handler loop ended");
        });

        info!("Headless browser launched");
        Ok(Self {
            browser: Mutex::new(browser),
            handler: Mutex::new(Some(handle)),
        })
    }
}

#[async_trait]
impl RenderEngine for ChromeEngine {
    async fn open_surface(&self) -> Result<Box<dyn RenderSurface>, Notes2PdfError> {
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .map_err(|e| Notes2PdfError::Surface(format!("new page: {e}")))?;
        Ok(Box::new(ChromeSurface { page }))
    }

    async fn shutdown(&self) {
        let mut browser = self.browser.lock().await;
        if let Err(e) = browser.close().await {
            warn!("Failed to close browser: {}", e);
        }
        if let Err(e) = browser.wait().await {
            warn!("Failed to reap browser process: {}", e);
        }
        if let Some(handle) = self.handler.lock().await.take() {
            handle.abort();
        }
        info!("Headless browser stopped");
    }
}

/// One Chromium tab.
struct ChromeSurface {
    page: Page,
}

#[async_trait]
impl RenderSurface for ChromeSurface {
    async fn load(&self, html: &str) -> Result<(), Notes2PdfError> {
        let literal = serde_json::to_string(html)
            .map_err(|e| Notes2PdfError::Internal(format!("encode page: {e}")))?;
        self.page
            .evaluate_expression(format!(
                "document.open(); document.write({literal}); document.close();"
            ))
            .await
            .map_err(|e| Notes2PdfError::Surface(format!("load: {e}")))?;
        Ok(())
    }

    async fn flag(&self, name: &str) -> Result<bool, Notes2PdfError> {
        let key = serde_json::to_string(name)
            .map_err(|e| Notes2PdfError::Internal(format!("encode flag: {e}")))?;
        let result = self
            .page
            .evaluate_expression(format!("window[{key}] === true"))
            .await
            .map_err(|e| Notes2PdfError::Surface(format!("read {name}: {e}")))?;
        Ok(result
            .value()
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false))
    }

    async fn export_pdf(&self, format: PageFormat) -> Result<Vec<u8>, Notes2PdfError> {
        let (width, height) = format.dimensions_in();
        let params = PrintToPdfParams {
            print_background: Some(true),
            paper_width: Some(width),
            paper_height: Some(height),
            ..Default::default()
        };
        self.page
            .pdf(params)
            .await
            .map_err(|e| Notes2PdfError::Surface(format!("print: {e}")))
    }

    async fn close(&self) -> Result<(), Notes2PdfError> {
        self.page
            .clone()
            .close()
            .await
            .map_err(|e| Notes2PdfError::Surface(format!("close: {e}")))
    }
}
