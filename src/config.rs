//! Configuration types for note-to-PDF conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. One struct holds the provider knobs,
//! the output location and the render-timing budget, so a server can build
//! it once at start-up and share it across every request.

use crate::error::Notes2PdfError;
use crate::pipeline::wait::PollPolicy;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Model used when none is configured. Fast, cheap and good at handwriting.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// KaTeX stylesheet injected into every wrapper document.
pub const DEFAULT_KATEX_CSS_URL: &str =
    "https://cdn.jsdelivr.net/npm/katex@0.16.9/dist/katex.min.css";

/// KaTeX script injected into every wrapper document.
pub const DEFAULT_KATEX_JS_URL: &str =
    "https://cdn.jsdelivr.net/npm/katex@0.16.9/dist/katex.min.js";

/// Configuration for an image-to-PDF conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use notes2pdf::{ConversionConfig, PageFormat};
///
/// let config = ConversionConfig::builder()
///     .model("gemini-2.5-flash")
///     .output_dir("converted")
///     .page_format(PageFormat::Letter)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// LLM model identifier. If None, [`DEFAULT_MODEL`] is used.
    pub model: Option<String>,

    /// LLM provider name (e.g. "gemini", "openai", "ollama").
    /// If None along with `provider`, the provider is auto-detected.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for the transcription call. Default: 0.2.
    pub temperature: f32,

    /// Maximum tokens the model may generate for one batch. Default: 8192.
    ///
    /// A batch holds up to ten pages of notes, so this is larger than a
    /// single-page budget would need.
    pub max_tokens: usize,

    /// Custom transcription prompt. If None, uses the built-in default.
    pub system_prompt: Option<String>,

    /// Maximum number of images accepted in one conversion. Default: 10.
    pub max_images: usize,

    /// Directory receiving the `.html` and `.pdf` artifacts. Default: `converted`.
    pub output_dir: PathBuf,

    /// URL prefix under which `output_dir` is served. Default: `/converted`.
    pub public_prefix: String,

    /// Paper size of the exported document. Default: A4.
    pub page_format: PageFormat,

    /// In-page interval between checks for the math library. Default: 80 ms.
    pub math_poll_interval_ms: u64,

    /// In-page number of checks before giving up on math. Default: 30.
    ///
    /// With the default interval this bounds the wait for KaTeX at 2.4 s;
    /// after that the page is exported with the raw `$…$` text.
    pub math_max_attempts: u32,

    /// Interval at which the orchestrator reads the render-finished flag. Default: 100 ms.
    pub finish_poll_interval_ms: u64,

    /// Hard deadline for the render-finished flag, in seconds. Default: 60.
    pub render_timeout_secs: u64,

    /// Stylesheet URL for the math library.
    pub katex_css_url: String,

    /// Script URL for the math library.
    pub katex_js_url: String,

    /// Optional stage-event listener.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.2,
            max_tokens: 8192,
            system_prompt: None,
            max_images: 10,
            output_dir: PathBuf::from("converted"),
            public_prefix: "/converted".to_string(),
            page_format: PageFormat::default(),
            math_poll_interval_ms: 80,
            math_max_attempts: 30,
            finish_poll_interval_ms: 100,
            render_timeout_secs: 60,
            katex_css_url: DEFAULT_KATEX_CSS_URL.to_string(),
            katex_js_url: DEFAULT_KATEX_JS_URL.to_string(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_images", &self.max_images)
            .field("output_dir", &self.output_dir)
            .field("public_prefix", &self.public_prefix)
            .field("page_format", &self.page_format)
            .field("math_poll_interval_ms", &self.math_poll_interval_ms)
            .field("math_max_attempts", &self.math_max_attempts)
            .field("render_timeout_secs", &self.render_timeout_secs)
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The model to request, falling back to [`DEFAULT_MODEL`].
    pub fn model_or_default(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn math_poll_interval(&self) -> Duration {
        Duration::from_millis(self.math_poll_interval_ms)
    }

    /// The in-page wait for the math library: one check per interval, at
    /// most `math_max_attempts` checks.
    pub fn math_poll_policy(&self) -> PollPolicy {
        PollPolicy::bounded(self.math_poll_interval(), self.math_max_attempts)
    }

    pub fn finish_poll_interval(&self) -> Duration {
        Duration::from_millis(self.finish_poll_interval_ms)
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }
}

/// Builder for [`ConversionConfig`].
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl fmt::Debug for ConversionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ConversionConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn max_images(mut self, n: usize) -> Self {
        self.config.max_images = n.max(1);
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn public_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.public_prefix = prefix.into();
        self
    }

    pub fn page_format(mut self, format: PageFormat) -> Self {
        self.config.page_format = format;
        self
    }

    pub fn math_poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.math_poll_interval_ms = ms.max(1);
        self
    }

    pub fn math_max_attempts(mut self, n: u32) -> Self {
        self.config.math_max_attempts = n;
        self
    }

    pub fn finish_poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.finish_poll_interval_ms = ms.max(1);
        self
    }

    pub fn render_timeout_secs(mut self, secs: u64) -> Self {
        self.config.render_timeout_secs = secs;
        self
    }

    pub fn katex_urls(mut self, css: impl Into<String>, js: impl Into<String>) -> Self {
        self.config.katex_css_url = css.into();
        self.config.katex_js_url = js.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Notes2PdfError> {
        let c = &self.config;
        if c.render_timeout_secs == 0 {
            return Err(Notes2PdfError::InvalidConfig(
                "Render timeout must be ≥ 1s".into(),
            ));
        }
        // The in-page math wait must fit inside the outer deadline, otherwise
        // a slow KaTeX load turns into a hard failure instead of plain text.
        let timeout_ms = c.render_timeout_secs.checked_mul(1000).ok_or_else(|| {
            Notes2PdfError::InvalidConfig(format!(
                "Render timeout ({}s) is out of range",
                c.render_timeout_secs
            ))
        })?;
        let math_budget_ms = c
            .math_poll_interval_ms
            .saturating_mul(u64::from(c.math_max_attempts));
        if math_budget_ms >= timeout_ms {
            return Err(Notes2PdfError::InvalidConfig(format!(
                "Math wait ({math_budget_ms}ms) must be shorter than the render timeout ({}s)",
                c.render_timeout_secs
            )));
        }
        if c.output_dir.as_os_str().is_empty() {
            return Err(Notes2PdfError::InvalidConfig(
                "Output directory must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Paper size of the exported document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PageFormat {
    /// 210 × 297 mm (default).
    #[default]
    A4,
    /// 297 × 420 mm.
    A3,
    /// 8.5 × 11 in.
    Letter,
    /// 8.5 × 14 in.
    Legal,
}

impl PageFormat {
    /// Paper `(width, height)` in inches, the unit the print API expects.
    pub fn dimensions_in(&self) -> (f64, f64) {
        match self {
            PageFormat::A4 => (8.27, 11.69),
            PageFormat::A3 => (11.69, 16.54),
            PageFormat::Letter => (8.5, 11.0),
            PageFormat::Legal => (8.5, 14.0),
        }
    }
}

impl std::str::FromStr for PageFormat {
    type Err = Notes2PdfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a4" => Ok(PageFormat::A4),
            "a3" => Ok(PageFormat::A3),
            "letter" => Ok(PageFormat::Letter),
            "legal" => Ok(PageFormat::Legal),
            other => Err(Notes2PdfError::InvalidConfig(format!(
                "Unknown page format '{other}' (expected a4, a3, letter or legal)"
            ))),
        }
    }
}
