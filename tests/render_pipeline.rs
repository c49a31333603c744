//! Render orchestration against an emulated page.
//!
//! `EmulatedEngine` stands in for Chromium. Its surfaces read the poll
//! interval and attempt budget out of the loaded wrapper page, then replay
//! the readiness script in virtual time as a bounded `poll_until` task: the
//! math library "loads" after a configurable delay, `$$…$$` and `$…$` are
//! substituted once it has, and `renderFinished` flips on the first in-page
//! check that sees the library, or after the last attempt. Time is paused,
//! so every bound is exact.

use async_trait::async_trait;
use notes2pdf::pipeline::template::{MATH_RENDERED_FLAG, RENDER_FINISHED_FLAG};
use notes2pdf::pipeline::wait::{poll_until, PollPolicy};
use notes2pdf::{
    convert_images, convert_transcript, ConversionConfig, InputImage, Notes2PdfError, PageFormat,
    RenderEngine, RenderSurface,
};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_test::{assert_err, assert_ok};

static RE_ATTEMPTS: Lazy<Regex> = Lazy::new(|| Regex::new(r"attempts >= (\d+)").unwrap());
static RE_INTERVAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\}, (\d+)\);").unwrap());
static RE_BLOCK_MATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\$([\s\S]+?)\$\$").unwrap());
static RE_INLINE_MATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$(.+?)\$").unwrap());

/// Behaviour shared by every surface of one engine.
#[derive(Clone, Copy)]
struct PageScript {
    /// When the math library finishes loading; `None` means never.
    math_loads_after: Option<Duration>,
    /// A page whose script never sets the finished flag.
    hangs: bool,
}

#[derive(Default)]
struct Counters {
    opened: AtomicUsize,
    closed: AtomicUsize,
}

struct EmulatedEngine {
    script: PageScript,
    counters: Arc<Counters>,
}

impl EmulatedEngine {
    fn new(math_loads_after: Option<Duration>) -> Self {
        Self {
            script: PageScript {
                math_loads_after,
                hangs: false,
            },
            counters: Arc::default(),
        }
    }

    fn hanging() -> Self {
        Self {
            script: PageScript {
                math_loads_after: Some(Duration::ZERO),
                hangs: true,
            },
            counters: Arc::default(),
        }
    }

    fn opened(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    fn closed(&self) -> usize {
        self.counters.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RenderEngine for EmulatedEngine {
    async fn open_surface(&self) -> Result<Box<dyn RenderSurface>, Notes2PdfError> {
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(EmulatedSurface {
            script: self.script,
            counters: Arc::clone(&self.counters),
            page: Mutex::new(None),
        }))
    }
}

#[derive(Default)]
struct PageFlags {
    finished: bool,
    typeset: bool,
}

struct LoadedPage {
    body: String,
    flags: Arc<Mutex<PageFlags>>,
    script: Option<JoinHandle<()>>,
}

struct EmulatedSurface {
    script: PageScript,
    counters: Arc<Counters>,
    page: Mutex<Option<LoadedPage>>,
}

impl EmulatedSurface {
    fn flags(&self) -> (bool, bool) {
        let guard = self.page.lock().unwrap();
        guard.as_ref().map_or((false, false), |page| {
            let flags = page.flags.lock().unwrap();
            (flags.finished, flags.typeset)
        })
    }
}

/// Replay the readiness script: check for the math library once per
/// interval, then set the finished flag whether or not it arrived.
fn run_page_script(
    policy: PollPolicy,
    library_at: Option<Instant>,
    flags: Arc<Mutex<PageFlags>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let outcome = poll_until(policy, move || async move {
            Ok::<_, Notes2PdfError>(library_at.is_some_and(|at| Instant::now() >= at))
        })
        .await;
        let mut flags = flags.lock().unwrap();
        flags.typeset = matches!(outcome, Ok(o) if o.is_ready());
        flags.finished = true;
    })
}

fn typeset(body: &str) -> String {
    let body = RE_BLOCK_MATH.replace_all(body, |caps: &Captures<'_>| {
        let tex = caps[1].trim();
        if tex.contains("\\bad") {
            caps[0].to_string()
        } else {
            format!("<div class='math-block'><span class=\"katex-display\">{tex}</span></div>")
        }
    });
    RE_INLINE_MATH
        .replace_all(&body, |caps: &Captures<'_>| {
            let tex = caps[1].trim();
            if tex.contains("\\bad") {
                caps[0].to_string()
            } else {
                format!("<span class=\"katex\">{tex}</span>")
            }
        })
        .into_owned()
}

#[async_trait]
impl RenderSurface for EmulatedSurface {
    async fn load(&self, html: &str) -> Result<(), Notes2PdfError> {
        let number = |re: &Regex| -> Result<u64, Notes2PdfError> {
            re.captures(html)
                .and_then(|c| c[1].parse().ok())
                .ok_or_else(|| Notes2PdfError::Surface("readiness script missing".into()))
        };
        let start = html.find("<body>").map(|i| i + "<body>".len()).unwrap_or(0);
        let end = html.rfind("<script>").unwrap_or(html.len());
        let policy = PollPolicy::bounded(
            Duration::from_millis(number(&RE_INTERVAL)?),
            number(&RE_ATTEMPTS)? as u32,
        );

        let flags = Arc::new(Mutex::new(PageFlags::default()));
        let script = (!self.script.hangs).then(|| {
            let library_at = self.script.math_loads_after.map(|d| Instant::now() + d);
            run_page_script(policy, library_at, Arc::clone(&flags))
        });
        *self.page.lock().unwrap() = Some(LoadedPage {
            body: html[start..end].trim().to_string(),
            flags,
            script,
        });
        Ok(())
    }

    async fn flag(&self, name: &str) -> Result<bool, Notes2PdfError> {
        let (done, typeset) = self.flags();
        match name {
            RENDER_FINISHED_FLAG => Ok(done),
            MATH_RENDERED_FLAG => Ok(typeset),
            _ => Ok(false),
        }
    }

    async fn export_pdf(&self, _format: PageFormat) -> Result<Vec<u8>, Notes2PdfError> {
        let (_, typeset_done) = self.flags();
        let guard = self.page.lock().unwrap();
        let page = guard
            .as_ref()
            .ok_or_else(|| Notes2PdfError::Surface("nothing loaded".into()))?;
        let body = if typeset_done {
            typeset(&page.body)
        } else {
            page.body.clone()
        };
        Ok(format!("%PDF-1.7\n{body}").into_bytes())
    }

    async fn close(&self) -> Result<(), Notes2PdfError> {
        if let Some(script) = self.page.lock().unwrap().as_mut().and_then(|p| p.script.take()) {
            script.abort();
        }
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn config_in(dir: &TempDir) -> ConversionConfig {
    ConversionConfig::builder()
        .output_dir(dir.path())
        .build()
        .unwrap()
}

fn pdf_text(path: &std::path::Path) -> String {
    String::from_utf8(std::fs::read(path).unwrap()).unwrap()
}

#[tokio::test(start_paused = true)]
async fn display_math_becomes_math_block_once_library_loads() {
    let dir = TempDir::new().unwrap();
    let engine = EmulatedEngine::new(Some(Duration::from_millis(200)));

    let out = assert_ok!(convert_transcript("$$x=1$$", &engine, &config_in(&dir)).await);

    let pdf = pdf_text(&out.pdf_path);
    assert!(pdf.starts_with("%PDF"));
    assert!(pdf.contains("<p><div class='math-block'>"), "got: {pdf}");
    assert!(!pdf.contains("$$"));
    assert!(out.stats.math_typeset);
    assert_eq!((engine.opened(), engine.closed()), (1, 1));
}

#[tokio::test(start_paused = true)]
async fn inline_math_is_typeset_after_block_math() {
    let dir = TempDir::new().unwrap();
    let engine = EmulatedEngine::new(Some(Duration::ZERO));

    let out = assert_ok!(
        convert_transcript("Energy $E = mc^2$ and $$\\int_0^1 x\\,dx$$", &engine, &config_in(&dir))
            .await
    );

    let pdf = pdf_text(&out.pdf_path);
    assert!(pdf.contains(r#"<span class="katex">E = mc^2</span>"#), "got: {pdf}");
    assert!(pdf.contains(r#"<span class="katex-display">\int_0^1 x\,dx</span>"#));
}

#[tokio::test(start_paused = true)]
async fn missing_library_exports_raw_delimiters_within_budget() {
    let dir = TempDir::new().unwrap();
    let engine = EmulatedEngine::new(None);
    let config = config_in(&dir);
    let budget = config.math_poll_policy().budget().unwrap();
    let start = Instant::now();

    let out = assert_ok!(convert_transcript("$$x=1$$", &engine, &config).await);

    let pdf = pdf_text(&out.pdf_path);
    assert!(pdf.contains("<p>$$x=1$$</p>"), "got: {pdf}");
    assert!(!out.stats.math_typeset);
    // 30 checks × 80 ms, observed on the next 100 ms orchestrator poll.
    assert_eq!(budget, Duration::from_millis(2400));
    let waited = start.elapsed();
    assert!(waited >= budget, "waited {waited:?}");
    assert!(waited < budget + Duration::from_millis(200), "waited {waited:?}");
}

#[tokio::test(start_paused = true)]
async fn library_arriving_after_budget_is_ignored() {
    let dir = TempDir::new().unwrap();
    let engine = EmulatedEngine::new(Some(Duration::from_secs(5)));

    let out = assert_ok!(convert_transcript("Inline $a+b$", &engine, &config_in(&dir)).await);

    assert!(pdf_text(&out.pdf_path).contains("$a+b$"));
    assert!(!out.stats.math_typeset);
}

#[tokio::test(start_paused = true)]
async fn malformed_expression_is_left_as_written() {
    let dir = TempDir::new().unwrap();
    let engine = EmulatedEngine::new(Some(Duration::ZERO));

    let out = assert_ok!(
        convert_transcript("$$\\bad{$$\n$$y=2$$", &engine, &config_in(&dir)).await
    );

    let pdf = pdf_text(&out.pdf_path);
    assert!(pdf.contains("$$\\bad{$$"), "got: {pdf}");
    assert!(pdf.contains(r#"<span class="katex-display">y=2</span>"#));
}

#[tokio::test(start_paused = true)]
async fn page_that_never_finishes_times_out_and_is_closed() {
    let dir = TempDir::new().unwrap();
    let engine = EmulatedEngine::hanging();
    let start = Instant::now();

    let err = assert_err!(convert_transcript("<h1>Stuck</h1>", &engine, &config_in(&dir)).await);

    assert!(matches!(err, Notes2PdfError::RenderTimeout { secs: 60 }));
    assert!(!err.is_input_error());
    assert_eq!(start.elapsed(), Duration::from_secs(60));
    assert_eq!((engine.opened(), engine.closed()), (1, 1));

    // The debug HTML is kept; no PDF is left behind.
    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names.len(), 1, "files: {names:?}");
    assert!(names[0].ends_with(".html"));
}

#[tokio::test(start_paused = true)]
async fn shorter_deadline_is_honoured() {
    let dir = TempDir::new().unwrap();
    let engine = EmulatedEngine::hanging();
    let config = ConversionConfig::builder()
        .output_dir(dir.path())
        .render_timeout_secs(5)
        .build()
        .unwrap();

    let err = assert_err!(convert_transcript("text", &engine, &config).await);
    assert!(matches!(err, Notes2PdfError::RenderTimeout { secs: 5 }));
}

#[tokio::test(start_paused = true)]
async fn concurrent_jobs_use_separate_surfaces_and_files() {
    let dir = TempDir::new().unwrap();
    let engine = EmulatedEngine::new(Some(Duration::from_millis(100)));
    let config = config_in(&dir);

    let (a, b) = tokio::join!(
        convert_transcript("First $a$", &engine, &config),
        convert_transcript("Second $b$", &engine, &config),
    );
    let (a, b) = (assert_ok!(a), assert_ok!(b));

    assert_ne!(a.pdf_path, b.pdf_path);
    assert!(pdf_text(&a.pdf_path).contains("First"));
    assert!(pdf_text(&b.pdf_path).contains("Second"));
    assert_eq!((engine.opened(), engine.closed()), (2, 2));
}

#[tokio::test(start_paused = true)]
async fn empty_batch_never_reaches_the_engine() {
    let dir = TempDir::new().unwrap();
    let engine = EmulatedEngine::new(Some(Duration::ZERO));

    let err = assert_err!(convert_images(Vec::<InputImage>::new(), &engine, &config_in(&dir)).await);

    assert!(matches!(err, Notes2PdfError::NoInput));
    assert_eq!(err.public_message(), "No files uploaded.");
    assert_eq!(engine.opened(), 0);
}
