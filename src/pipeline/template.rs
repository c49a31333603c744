//! The wrapper document loaded into each render surface.
//!
//! The normalized body is embedded verbatim between a fixed `<head>` (KaTeX
//! stylesheet and script, print CSS) and a small readiness script. The
//! script is the in-page half of the two-level wait:
//!
//! 1. every `math_poll_interval_ms`, check whether KaTeX has loaded;
//! 2. once it has, replace every `$$…$$` span with block math, then every
//!    remaining `$…$` span with inline math, set `mathRendered`, and set
//!    `renderFinished`;
//! 3. after `math_max_attempts` failed checks, set `renderFinished` without
//!    touching the math.
//!
//! Each substitution catches its own typesetting error and keeps the
//! original delimited text, so the script always reaches step 2's flag.

use crate::config::ConversionConfig;

/// Window property set once the page is ready to print.
pub const RENDER_FINISHED_FLAG: &str = "renderFinished";

/// Window property set by the KaTeX script's `onload` handler.
pub const MATH_LIBRARY_FLAG: &str = "katexLoaded";

/// Window property set once the math substitution has run.
pub const MATH_RENDERED_FLAG: &str = "mathRendered";

const PRINT_CSS: &str = r#"body {
    font-family: "Inter", "Pretendard", sans-serif;
    padding: 30px;
    line-height: 1.6;
    color: #222;
}
h1 { font-size: 1.8rem; font-weight: 700; margin-top: 5px; margin-bottom: 20px; }
h2 { font-size: 1.5rem; font-weight: 600; }
h3 { font-size: 1.3rem; font-weight: 500; }
h4 { font-size: 1.1rem; font-weight: 500; }
h2, h3, h4 { margin-top: 10px; margin-bottom: 10px; }
p { margin: 10px 0; font-size: 1rem; }
ul, ol { padding-left: 20px; margin: 10px 0; }
li { margin-bottom: 10px; }
table { width: 100%; border-collapse: collapse; margin: 20px 0; }
th, td { border: 1px solid #ccc; padding: 10px; }
svg { display: block; margin: 20px auto; }
.katex { font-size: 1.15rem; }
.math-block { margin: 16px 0; overflow-x: auto; }"#;

const READINESS_SCRIPT: &str = r#"window.renderFinished = false;

function renderMath() {
    const body = document.body;

    body.innerHTML = body.innerHTML.replace(/\$\$([\s\S]+?)\$\$/g, (m, f) => {
        try {
            return "<div class='math-block'>" +
                katex.renderToString(f.trim(), { displayMode: true, throwOnError: false }) +
                "</div>";
        } catch (e) {
            return m;
        }
    });

    body.innerHTML = body.innerHTML.replace(/\$(.+?)\$/g, (m, f) => {
        try {
            return katex.renderToString(f.trim(), { displayMode: false, throwOnError: false });
        } catch (e) {
            return m;
        }
    });
}

let attempts = 0;
const checker = setInterval(() => {
    attempts++;
    if (window.katexLoaded) {
        clearInterval(checker);
        try {
            renderMath();
            window.mathRendered = true;
        } finally {
            window.renderFinished = true;
        }
    } else if (attempts >= __MAX_ATTEMPTS__) {
        clearInterval(checker);
        console.log("KaTeX did not load, exporting without math rendering.");
        window.renderFinished = true;
    }
}, __INTERVAL_MS__);"#;

/// Build the complete HTML page for one render job.
pub fn wrap_document(body: &str, config: &ConversionConfig) -> String {
    let policy = config.math_poll_policy();
    let script = READINESS_SCRIPT
        .replace(
            "__MAX_ATTEMPTS__",
            &policy.max_attempts.unwrap_or(u32::MAX).to_string(),
        )
        .replace("__INTERVAL_MS__", &policy.interval.as_millis().to_string());

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<link rel="stylesheet" href="{css}">
<script defer src="{js}" onload="window.{flag} = true;"></script>
<style>
{style}
</style>
</head>
<body>
{body}
<script>
{script}
</script>
</body>
</html>
"#,
        css = config.katex_css_url,
        js = config.katex_js_url,
        flag = MATH_LIBRARY_FLAG,
        style = PRINT_CSS,
    )
}
