//! Conversion entry points.
//!
//! [`convert_images`] is the full pipeline: images in, HTML and PDF out.
//! [`convert_transcript`] starts from text the caller already has (a saved
//! model answer, a hand-written fragment) and runs only the normalize and
//! render half, which needs no provider or API key.

use crate::config::ConversionConfig;
use crate::error::Notes2PdfError;
use crate::output::{ConversionOutput, ConversionStats};
use crate::pipeline::input::{self, InputImage};
use crate::pipeline::job::{self, RenderJob};
use crate::pipeline::render::{self, RenderEngine};
use crate::pipeline::{encode, llm, normalize, template};
use crate::progress::Stage;
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Convert a batch of note images into a PDF.
///
/// Uploaded inputs are deleted before this returns, on success and on
/// every failure path. Caller-owned files are never touched.
///
/// # Errors
/// - [`Notes2PdfError::NoInput`] for an empty batch, before any other work
/// - input errors for unreadable or non-image files
/// - generation errors (provider missing, API failure, empty answer)
/// - rendering and I/O errors
pub async fn convert_images(
    images: Vec<InputImage>,
    engine: &dyn RenderEngine,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Notes2PdfError> {
    let result = run_images(&images, engine, config).await;

    let removed = input::cleanup_inputs(images);
    if removed > 0 {
        debug!("Removed {} uploaded image(s)", removed);
    }

    report(config, result)
}

/// Render an existing transcript without calling a model.
pub async fn convert_transcript(
    raw: &str,
    engine: &dyn RenderEngine,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Notes2PdfError> {
    let result = if raw.trim().is_empty() {
        Err(Notes2PdfError::EmptyTranscription)
    } else {
        publish(raw, engine, config).await
    };
    report(config, result)
}

fn report(
    config: &ConversionConfig,
    result: Result<ConversionOutput, Notes2PdfError>,
) -> Result<ConversionOutput, Notes2PdfError> {
    match &result {
        Ok(output) => {
            if let Some(ref cb) = config.progress_callback {
                cb.on_conversion_complete(&output.pdf_url);
            }
        }
        Err(e) => {
            error!("Conversion failed: {}", e);
            if let Some(ref cb) = config.progress_callback {
                cb.on_conversion_error(&e.to_string());
            }
        }
    }
    result
}

async fn run_images(
    images: &[InputImage],
    engine: &dyn RenderEngine,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Notes2PdfError> {
    let total_start = Instant::now();

    // ── Step 1: Validate batch ───────────────────────────────────────────
    input::validate_batch(images, config.max_images)?;
    info!("Starting conversion of {} image(s)", images.len());
    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(images.len());
    }

    // ── Step 2: Get/create provider ──────────────────────────────────────
    let provider = resolve_provider(config)?;

    // ── Step 3: Encode images to base64 ──────────────────────────────────
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage(Stage::Encoding);
    }
    let encoded = encode::encode_batch(images).await?;

    // ── Step 4: Transcribe ───────────────────────────────────────────────
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage(Stage::Transcribing);
    }
    let transcript = llm::transcribe(&provider, encoded, config).await?;
    if let Some(ref cb) = config.progress_callback {
        cb.on_transcribed(transcript.text.chars().count());
    }

    // ── Step 5: Normalize, render, write ─────────────────────────────────
    let mut output = publish(&transcript.text, engine, config).await?;

    output.stats.image_count = images.len();
    output.stats.input_tokens = transcript.input_tokens as u64;
    output.stats.output_tokens = transcript.output_tokens as u64;
    output.stats.transcribe_duration_ms = transcript.duration_ms;
    output.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    info!(
        "Conversion complete: {} → {} in {}ms",
        output.html_url, output.pdf_url, output.stats.total_duration_ms
    );
    Ok(output)
}

/// Normalize a transcript, write the debug HTML, render and write the PDF.
async fn publish(
    raw: &str,
    engine: &dyn RenderEngine,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Notes2PdfError> {
    let start = Instant::now();

    if let Some(ref cb) = config.progress_callback {
        cb.on_stage(Stage::Normalizing);
    }
    let blocks = normalize::normalize_blocks(raw);
    let body = normalize::render_blocks(&blocks);
    let diagram_count = blocks.iter().filter(|b| b.is_diagram()).count();
    debug!(
        "Normalized {} chars into {} block(s), {} diagram(s)",
        raw.len(),
        blocks.len(),
        diagram_count
    );

    let page = template::wrap_document(&body, config);
    let job = RenderJob::create(&config.output_dir, job::epoch_millis(), &body).await?;

    if let Some(ref cb) = config.progress_callback {
        cb.on_stage(Stage::Rendering);
    }
    let rendered = render::render_document(engine, &page, config).await?;
    job.write_pdf(&rendered.pdf).await?;

    let stats = ConversionStats {
        transcript_chars: raw.chars().count(),
        block_count: blocks.len(),
        diagram_count,
        math_typeset: rendered.math_typeset,
        pdf_bytes: rendered.pdf.len(),
        render_duration_ms: rendered.duration_ms,
        total_duration_ms: start.elapsed().as_millis() as u64,
        ..Default::default()
    };

    Ok(ConversionOutput {
        html_url: job::public_url(&config.public_prefix, &job.html_file_name()),
        pdf_url: job::public_url(&config.public_prefix, &job.pdf_file_name()),
        html_path: job.html_path,
        pdf_path: job.pdf_path,
        stats,
    })
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, Notes2PdfError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        Notes2PdfError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider** (`config.provider_name`) with the configured or
///    default model; the factory reads the matching API key.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`),
///    both non-empty.
/// 4. **Gemini** whenever `GEMINI_API_KEY` is set, so the default model
///    is honoured even when other keys are present.
/// 5. **Full auto-detection** via `ProviderFactory::from_env`.
fn resolve_provider(config: &ConversionConfig) -> Result<Arc<dyn LLMProvider>, Notes2PdfError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        return create_vision_provider(name, config.model_or_default());
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if std::env::var("GEMINI_API_KEY").is_ok_and(|key| !key.is_empty()) {
        return create_vision_provider("gemini", config.model_or_default());
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| Notes2PdfError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY, OPENAI_API_KEY or ANTHROPIC_API_KEY.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
