//! CLI binary for notes2pdf.
//!
//! A thin shim over the library crate: maps flags to `ConversionConfig`
//! and `BrowserOptions`, runs one subcommand and prints the result.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use notes2pdf::{
    convert_images, convert_transcript, normalize, BrowserOptions, ChromeEngine,
    ConversionConfig, ConversionOutput, ConversionProgressCallback, InputImage, PageFormat,
    ProgressCallback, RenderEngine, Stage,
};
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// One spinner whose message follows the pipeline stage.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("notes2pdf");
        bar.set_message("starting…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, image_count: usize) {
        self.bar
            .println(format!("{} {}", green("◆"), bold(&format!("{image_count} image(s)"))));
    }

    fn on_stage(&self, stage: Stage) {
        self.bar.set_message(format!("{stage}…"));
    }

    fn on_transcribed(&self, chars: usize) {
        self.bar
            .println(format!("  {} transcript  {}", green("✓"), dim(&format!("{chars} chars"))));
    }

    fn on_conversion_complete(&self, _pdf_url: &str) {
        self.bar.finish_and_clear();
    }

    // The error itself is reported once, by main's `Result`.
    fn on_conversion_error(&self, _error: &str) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Photos of notes → converted/<timestamp>.pdf
  notes2pdf convert page1.jpg page2.jpg

  # Re-render a saved model answer without calling the model
  notes2pdf render answer.html --page-format letter

  # Show what the normalizer makes of a transcript
  cat answer.html | notes2pdf normalize

  # HTTP server on :4000 (POST /api/convert-images)
  notes2pdf serve --port 4000

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (preferred)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (gemini, openai, anthropic, ollama)
  EDGEQUAKE_MODEL         Override model ID
  CHROME                  Path to the Chrome/Chromium executable
  PORT                    Server port
"#;

/// Turn photographed handwritten notes into typeset PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "notes2pdf",
    version,
    about = "Turn photographed handwritten notes into typeset PDFs using Vision LLMs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "NOTES2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "NOTES2PDF_QUIET")]
    quiet: bool,

    /// Disable the progress spinner.
    #[arg(long, global = true, env = "NOTES2PDF_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Transcribe note images and render them to PDF.
    Convert {
        /// Note images, in reading order.
        #[arg(required = true)]
        images: Vec<PathBuf>,

        #[command(flatten)]
        model: ModelArgs,

        #[command(flatten)]
        render: RenderArgs,

        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Normalize and render an existing transcript (no model call).
    Render {
        /// File holding the raw model answer.
        transcript: PathBuf,

        #[command(flatten)]
        render: RenderArgs,

        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the normalized HTML body of a transcript (stdin if no file).
    Normalize {
        file: Option<PathBuf>,
    },

    /// Run the HTTP server.
    #[cfg(feature = "server")]
    Serve {
        /// Interface to bind.
        #[arg(long, env = "HOST", default_value = "0.0.0.0")]
        host: std::net::IpAddr,

        #[arg(short, long, env = "PORT", default_value_t = 4000)]
        port: u16,

        /// Scratch directory for uploads.
        #[arg(long, env = "NOTES2PDF_UPLOAD_DIR", default_value = "uploads")]
        upload_dir: PathBuf,

        #[command(flatten)]
        model: ModelArgs,

        #[command(flatten)]
        render: RenderArgs,
    },
}

#[derive(Args, Debug)]
struct ModelArgs {
    /// LLM model ID (default: gemini-2.5-flash).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: gemini, openai, anthropic, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Path to a text file containing a custom transcription prompt.
    #[arg(long, env = "NOTES2PDF_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Max LLM output tokens.
    #[arg(long, env = "NOTES2PDF_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "NOTES2PDF_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Maximum images per conversion.
    #[arg(long, env = "NOTES2PDF_MAX_IMAGES", default_value_t = 10)]
    max_images: usize,
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// Directory for the .html and .pdf artifacts.
    #[arg(short, long, env = "NOTES2PDF_OUTPUT_DIR", default_value = "converted")]
    output_dir: PathBuf,

    /// Paper size: a4, a3, letter, legal.
    #[arg(long, env = "NOTES2PDF_PAGE_FORMAT", default_value = "a4",
          value_parser = parse_page_format)]
    page_format: PageFormat,

    /// Seconds to wait for the page to finish rendering.
    #[arg(long, env = "NOTES2PDF_RENDER_TIMEOUT", default_value_t = 60)]
    render_timeout: u64,

    /// Chrome/Chromium executable.
    #[arg(long, env = "CHROME")]
    chrome: Option<PathBuf>,
}

fn parse_page_format(s: &str) -> std::result::Result<PageFormat, String> {
    s.parse::<PageFormat>().map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner replaces INFO-level library logs while it is visible.
    let json = matches!(
        cli.command,
        Command::Convert { json: true, .. } | Command::Render { json: true, .. }
    );
    let one_shot = matches!(cli.command, Command::Convert { .. } | Command::Render { .. });
    let show_progress = one_shot && !cli.quiet && !cli.no_progress && !json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };

    match cli.command {
        Command::Normalize { file } => {
            let raw = read_source(file.as_ref())?;
            println!("{}", normalize(&raw));
        }

        Command::Render {
            transcript,
            render,
            json,
        } => {
            let raw = read_source(Some(&transcript))?;
            let config = build_config(None, &render, progress).await?;
            let engine = launch(&render).await?;
            let result = convert_transcript(&raw, &engine, &config).await;
            engine.shutdown().await;
            let output = result.context("Rendering failed")?;
            print_output(&output, json, cli.quiet)?;
        }

        Command::Convert {
            images,
            model,
            render,
            json,
        } => {
            let config = build_config(Some(&model), &render, progress).await?;
            let engine = launch(&render).await?;
            let inputs = images.into_iter().map(InputImage::local).collect();
            let result = convert_images(inputs, &engine, &config).await;
            engine.shutdown().await;
            let output = result.context("Conversion failed")?;
            print_output(&output, json, cli.quiet)?;
        }

        #[cfg(feature = "server")]
        Command::Serve {
            host,
            port,
            upload_dir,
            model,
            render,
        } => {
            use notes2pdf::server::{serve, ServerConfig};

            let config = build_config(Some(&model), &render, None).await?;
            let engine = launch(&render).await?;
            let server = ServerConfig {
                bind: std::net::SocketAddr::new(host, port),
                upload_dir,
                ..ServerConfig::default()
            };
            serve(server, Arc::new(engine), config)
                .await
                .context("Server failed")?;
        }
    }

    Ok(())
}

async fn launch(render: &RenderArgs) -> Result<ChromeEngine> {
    let options = BrowserOptions {
        chrome_executable: render.chrome.clone(),
        ..BrowserOptions::default()
    };
    ChromeEngine::launch(&options)
        .await
        .context("Failed to start headless browser")
}

/// Map CLI args to `ConversionConfig`.
async fn build_config(
    model: Option<&ModelArgs>,
    render: &RenderArgs,
    progress: Option<ProgressCallback>,
) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .output_dir(&render.output_dir)
        .page_format(render.page_format)
        .render_timeout_secs(render.render_timeout);

    if let Some(model) = model {
        builder = builder
            .max_tokens(model.max_tokens)
            .temperature(model.temperature)
            .max_images(model.max_images);
        if let Some(ref m) = model.model {
            builder = builder.model(m);
        }
        if let Some(ref p) = model.provider {
            builder = builder.provider_name(p);
        }
        if let Some(ref path) = model.system_prompt {
            let prompt = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
            builder = builder.system_prompt(prompt);
        }
    }

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn read_source(file: Option<&PathBuf>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            Ok(buf)
        }
    }
}

fn print_output(output: &ConversionOutput, json: bool, quiet: bool) -> Result<()> {
    if json {
        let value = serde_json::json!({
            "htmlPath": output.html_path,
            "pdfPath": output.pdf_path,
            "htmlUrl": output.html_url,
            "pdfUrl": output.pdf_url,
            "stats": output.stats,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&value).context("Failed to serialise output")?
        );
        return Ok(());
    }

    println!("{}", output.pdf_path.display());
    if !quiet {
        let stats = &output.stats;
        eprintln!(
            "{}  {} block(s), {} diagram(s)  {}ms  →  {}",
            green("✔"),
            stats.block_count,
            stats.diagram_count,
            stats.total_duration_ms,
            bold(&output.pdf_path.display().to_string()),
        );
        if !stats.math_typeset {
            eprintln!("   {}", dim("math library unavailable; formulas left as text"));
        }
        if stats.input_tokens + stats.output_tokens > 0 {
            eprintln!(
                "   {} tokens in  /  {} tokens out",
                dim(&stats.input_tokens.to_string()),
                dim(&stats.output_tokens.to_string()),
            );
        }
    }
    Ok(())
}
