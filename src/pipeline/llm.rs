//! VLM interaction: one multimodal request per conversion.
//!
//! Every image in the batch goes into a single user turn, in upload order,
//! so the model sees the notes as one continuous document. The call is made
//! once; a failure or an empty answer fails the conversion. Prompt wording
//! lives in [`crate::prompts`].

use crate::config::ConversionConfig;
use crate::error::Notes2PdfError;
use crate::prompts::DEFAULT_TRANSCRIPTION_PROMPT;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// The model's raw answer plus accounting.
#[derive(Debug, Clone)]
pub struct Transcript {
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
}

/// Transcribe a batch of encoded note images.
///
/// ## Message Layout
///
/// 1. **System message**: the transcription prompt (or the configured override)
/// 2. **User message**: every image as an attachment, with empty text
pub async fn transcribe(
    provider: &Arc<dyn LLMProvider>,
    images: Vec<ImageData>,
    config: &ConversionConfig,
) -> Result<Transcript, Notes2PdfError> {
    let start = Instant::now();
    let image_count = images.len();
    let messages = build_messages(images, config);
    let options = build_options(config);

    debug!(
        "Sending {} image(s) to {}",
        image_count,
        config.model_or_default()
    );

    let response = provider
        .chat(&messages, Some(&options))
        .await
        .map_err(|e| Notes2PdfError::LlmApiError {
            message: e.to_string(),
        })?;

    let duration_ms = start.elapsed().as_millis() as u64;
    if response.content.trim().is_empty() {
        return Err(Notes2PdfError::EmptyTranscription);
    }

    info!(
        "Transcribed {} image(s): {} input tokens, {} output tokens, {}ms",
        image_count, response.prompt_tokens, response.completion_tokens, duration_ms
    );

    Ok(Transcript {
        text: response.content,
        input_tokens: response.prompt_tokens,
        output_tokens: response.completion_tokens,
        duration_ms,
    })
}

fn build_messages(images: Vec<ImageData>, config: &ConversionConfig) -> Vec<ChatMessage> {
    let system_prompt = config
        .system_prompt
        .as_deref()
        .unwrap_or(DEFAULT_TRANSCRIPTION_PROMPT);

    vec![
        ChatMessage::system(system_prompt),
        ChatMessage::user_with_images("", images),
    ]
}

/// Build `CompletionOptions` from the conversion config.
fn build_options(config: &ConversionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}
