//! Structural normalisation: turn loosely formatted model output into a
//! block-structured HTML document.
//!
//! ## Why a pass pipeline instead of a parser?
//!
//! The transcription is semi-structured text: sometimes clean HTML,
//! sometimes Markdown-ish prose, usually a mix of both, wrapped in code
//! fences and sprinkled with renderer artefacts. There is no grammar to
//! parse against, so normalisation is a fixed sequence of small rewrite
//! passes, each a pure `&str → String` function that can be tested on its
//! own.
//!
//! ## Pass order
//!
//! 1. Strip carriage returns and invisible characters, trim
//! 2. Drop empty `<p></p>`, unwrap `<svg>` elements held in a `<p>`
//! 3. Strip stray MathJax (`<mjx-…>`) tags
//! 4. Collapse runs of `<br>` into a paragraph boundary
//! 5. Paragraph boundary after sentence-ending punctuation, then drop a
//!    `<p>` that directly opens a heading
//! 6. Remove a leading/trailing code fence
//! 7. Line-anchored rewrites: `- x` lists, `N.` / `N.M.` / `(N)` headings
//! 8. Split into trimmed, non-empty lines
//! 9. Classify lines and collect diagrams ([`crate::pipeline::classify`])
//! 10. Join blocks with newlines
//!
//! Order matters. The heading rewrites in pass 7 see the output of the
//! sentence splitter, so pass 5 leaves the period of a line-leading
//! enumerator (`3.`, `3.2.`) alone. Pass 5 is still free to fire inside
//! markup wrapped earlier, which is why normalising twice is not guaranteed
//! to be a no-op.

use crate::pipeline::classify::{collect_blocks, Block};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Normalise a raw transcript into a block-structured HTML string.
///
/// Total: never fails and never panics, whatever the input. Malformed
/// markup is cleaned up on a best-effort basis and passed through.
pub fn normalize(raw: &str) -> String {
    render_blocks(&normalize_blocks(raw))
}

/// Like [`normalize`], but returns the block sequence before joining.
pub fn normalize_blocks(raw: &str) -> Vec<Block> {
    let s = strip_carriage_returns(raw);
    let s = remove_empty_paragraphs(&s);
    let s = unwrap_paragraph_diagrams(&s);
    let s = strip_namespace_tags(&s);
    let s = collapse_line_breaks(&s);
    let s = split_sentences(&s);
    let s = unwrap_paragraph_headings(&s);
    let s = strip_code_fences(&s);
    let s = rewrite_dash_bullets(&s);
    let s = rewrite_numbered_headings(&s);
    let s = rewrite_sub_numbered_headings(&s);
    let s = rewrite_parenthesized_headings(&s);
    collect_blocks(split_lines(&s))
}

/// Join blocks one per line.
pub fn render_blocks(blocks: &[Block]) -> String {
    blocks
        .iter()
        .map(Block::to_string)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

// ── Pass 1: Carriage returns, invisible characters, outer whitespace ────────

fn strip_carriage_returns(input: &str) -> String {
    input
        .replace(
            [
                '\r', '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
            ],
            "",
        )
        .trim()
        .to_string()
}

// ── Pass 2: Empty paragraphs and paragraph-wrapped diagrams ─────────────────

static RE_EMPTY_PARAGRAPH: Lazy<Regex> = Lazy::new(|| Regex::new(r"<p>\s*</p>").unwrap());

static RE_PARAGRAPH_DIAGRAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<p>\s*(<svg[\s\S]*?</svg>)\s*</p>").unwrap());

static RE_PARAGRAPH_DIAGRAM_OPENER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<p>\s*<svg").unwrap());

fn remove_empty_paragraphs(input: &str) -> String {
    RE_EMPTY_PARAGRAPH.replace_all(input, "").into_owned()
}

/// `<p><svg>…</svg></p>` keeps the diagram and drops the paragraph. A `<p>`
/// opening a diagram whose end is elsewhere loses just the opener.
fn unwrap_paragraph_diagrams(input: &str) -> String {
    let s = RE_PARAGRAPH_DIAGRAM.replace_all(input, "$1");
    RE_PARAGRAPH_DIAGRAM_OPENER
        .replace_all(&s, "<svg")
        .into_owned()
}

// ── Pass 3: Stray MathJax tags ──────────────────────────────────────────────

static RE_NAMESPACE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<\s*/?\s*mjx[^>]*>").unwrap());

fn strip_namespace_tags(input: &str) -> String {
    RE_NAMESPACE_TAG.replace_all(input, "").into_owned()
}

// ── Pass 4: Line-break runs ─────────────────────────────────────────────────

static RE_BREAK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:<br\s*/?>\s*){2,}").unwrap());

fn collapse_line_breaks(input: &str) -> String {
    RE_BREAK_RUN.replace_all(input, "</p><p>").into_owned()
}

// ── Pass 5: Sentence boundaries ─────────────────────────────────────────────

static RE_SENTENCE_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([.!?])\s+([A-Z가-힣0-9])").unwrap());

/// A line that is nothing but a section number, e.g. `3.` or `3.2.`.
static RE_LINE_ENUMERATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,2}(?:[-.]\d{1,2})?\.$").unwrap());

/// Start of a line that opens with a section number, e.g. `3. ` or `3-2. `.
static RE_ENUMERATOR_AHEAD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\A\d{1,2}(?:[-.]\d{1,2})?\.[^\S\n]").unwrap());

static RE_PARAGRAPH_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"<p>\s*<h").unwrap());

/// Insert `</p><p>` after `.`, `!` or `?` when whitespace and an uppercase
/// Latin letter, a Hangul syllable or a digit follow.
///
/// The period ending a line-leading enumerator is skipped so `3. Overview`
/// can still become a heading in pass 7. So is a line break whose next line
/// opens with an enumerator; otherwise the break would be consumed and the
/// heading glued into the previous paragraph.
fn split_sentences(input: &str) -> String {
    RE_SENTENCE_BREAK
        .replace_all(input, |caps: &Captures<'_>| {
            let (Some(whole), Some(punct), Some(next)) = (caps.get(0), caps.get(1), caps.get(2))
            else {
                return String::new();
            };
            let line_start = input[..whole.start()].rfind('\n').map_or(0, |i| i + 1);
            let heading_follows = input[punct.end()..next.start()].contains('\n')
                && RE_ENUMERATOR_AHEAD.is_match(&input[next.start()..]);
            if heading_follows || RE_LINE_ENUMERATOR.is_match(&input[line_start..punct.end()]) {
                whole.as_str().to_string()
            } else {
                format!("{}</p><p>{}", &caps[1], &caps[2])
            }
        })
        .into_owned()
}

fn unwrap_paragraph_headings(input: &str) -> String {
    RE_PARAGRAPH_HEADING.replace_all(input, "<h").into_owned()
}

// ── Pass 6: Code fences ─────────────────────────────────────────────────────

static RE_LEADING_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\A```[^\n]*\n").unwrap());

static RE_TRAILING_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n```\z").unwrap());

fn strip_code_fences(input: &str) -> String {
    let s = RE_LEADING_FENCE.replace(input, "");
    RE_TRAILING_FENCE.replace(&s, "").into_owned()
}

// ── Pass 7: Line-anchored block rewrites ────────────────────────────────────
//
// Each rewrite is independent and applies to every matching line. Later
// rewrites see the output of earlier ones, so a line turned into `<h3>`
// no longer starts with a digit and is left alone by the `<h4>` rule.

static RE_DASH_BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^- ([^\n]+)").unwrap());

static RE_NUMBERED_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(\d{1,2}\.[^\S\n]+.+)$").unwrap());

static RE_SUB_NUMBERED_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(\d{1,2}[-.]\d{1,2}\.[^\S\n]+.+)$").unwrap());

static RE_PARENTHESIZED_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\((\d+)\)[^\S\n]+(.+)$").unwrap());

/// `- apple` → `<ul><li>apple</li></ul>`, one list per bullet line.
fn rewrite_dash_bullets(input: &str) -> String {
    RE_DASH_BULLET
        .replace_all(input, "<ul><li>$1</li></ul>")
        .into_owned()
}

/// `3. Overview` → `<h3>3. Overview</h3>`
fn rewrite_numbered_headings(input: &str) -> String {
    RE_NUMBERED_HEADING
        .replace_all(input, "<h3>$1</h3>")
        .into_owned()
}

/// `3.2. Details` (or `3-2. Details`) → `<h4>3.2. Details</h4>`
fn rewrite_sub_numbered_headings(input: &str) -> String {
    RE_SUB_NUMBERED_HEADING
        .replace_all(input, "<h4>$1</h4>")
        .into_owned()
}

/// `(1) Note` → `<h4>(1) Note</h4>`
fn rewrite_parenthesized_headings(input: &str) -> String {
    RE_PARENTHESIZED_HEADING
        .replace_all(input, "<h4>($1) $2</h4>")
        .into_owned()
}

// ── Pass 8: Line split ──────────────────────────────────────────────────────

fn split_lines(input: &str) -> Vec<&str> {
    input
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::classify::{DIAGRAM_CLOSE, DIAGRAM_OPEN};

    #[test]
    fn test_strip_carriage_returns() {
        assert_eq!(strip_carriage_returns("  a\r\nb\u{200B}c  \r\n"), "a\nbc");
    }

    #[test]
    fn test_remove_empty_paragraphs() {
        assert_eq!(remove_empty_paragraphs("<p> </p>x<p>\n</p>"), "x");
        assert_eq!(remove_empty_paragraphs("<p>a</p>"), "<p>a</p>");
    }

    #[test]
    fn test_unwrap_paragraph_diagram() {
        let input = r#"<p> <svg width="10"><rect/></svg> </p>"#;
        assert_eq!(unwrap_paragraph_diagrams(input), r#"<svg width="10"><rect/></svg>"#);
    }

    #[test]
    fn test_unwrap_dangling_diagram_opener() {
        assert_eq!(unwrap_paragraph_diagrams("<p><SVG viewBox=\"0 0 1 1\">"), "<svg viewBox=\"0 0 1 1\">");
    }

    #[test]
    fn test_strip_namespace_tags() {
        assert_eq!(
            strip_namespace_tags("<mjx-container jax=\"CHTML\">x</mjx-container>< / MJX-math>"),
            "x"
        );
    }

    #[test]
    fn test_collapse_line_breaks() {
        assert_eq!(collapse_line_breaks("a<br><br/> <br />b"), "a</p><p>b");
        assert_eq!(collapse_line_breaks("a<br>b"), "a<br>b");
    }

    #[test]
    fn test_split_sentences() {
        assert_eq!(split_sentences("One. Two"), "One.</p><p>Two");
        assert_eq!(split_sentences("Why? 42 is why"), "Why?</p><p>42 is why");
        assert_eq!(split_sentences("끝. 다음 문장"), "끝.</p><p>다음 문장");
    }

    #[test]
    fn test_split_sentences_needs_uppercase_or_digit() {
        assert_eq!(split_sentences("e.g. something"), "e.g. something");
        assert_eq!(split_sentences("end.No space"), "end.No space");
    }

    #[test]
    fn test_split_sentences_spares_line_enumerators() {
        assert_eq!(split_sentences("3. Overview"), "3. Overview");
        assert_eq!(split_sentences("intro\n3.2. Details"), "intro\n3.2. Details");
        // Not at the start of the line: an ordinary sentence end.
        assert_eq!(split_sentences("See 3. Overview"), "See 3.</p><p>Overview");
    }

    #[test]
    fn test_split_sentences_crosses_newlines() {
        assert_eq!(split_sentences("Done.\nNext"), "Done.</p><p>Next");
    }

    #[test]
    fn test_split_sentences_keeps_break_before_enumerated_line() {
        assert_eq!(split_sentences("Intro text.\n3. Overview"), "Intro text.\n3. Overview");
        assert_eq!(split_sentences("Intro.\n3.2. Details"), "Intro.\n3.2. Details");
    }

    #[test]
    fn labelled_diagram_stays_in_one_container() {
        let raw = "<rect x=\"0\" y=\"0\"/>\n<text x=\"5\" y=\"5\">A</text>\n<line x1=\"0\" y1=\"0\"/>";
        assert_eq!(
            normalize(raw),
            format!(
                "{DIAGRAM_OPEN}\n<rect x=\"0\" y=\"0\"/>\n<text x=\"5\" y=\"5\">A</text>\n<line x1=\"0\" y1=\"0\"/>\n{DIAGRAM_CLOSE}"
            )
        );
    }

    #[test]
    fn section_after_sentence_still_becomes_heading() {
        assert_eq!(
            normalize("Intro text.\n3. Overview"),
            "<p>Intro text.</p>\n<h3>3. Overview</h3>"
        );
    }

    #[test]
    fn test_unwrap_paragraph_headings() {
        assert_eq!(unwrap_paragraph_headings("<p> <h2>T</h2>"), "<h2>T</h2>");
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```html\n<h1>T</h1>\n```"), "<h1>T</h1>");
        assert_eq!(strip_code_fences("```\nx"), "x");
        assert_eq!(strip_code_fences("a ```\nb"), "a ```\nb");
    }

    #[test]
    fn test_rewrite_dash_bullets() {
        assert_eq!(rewrite_dash_bullets("- a\n- b"), "<ul><li>a</li></ul>\n<ul><li>b</li></ul>");
        assert_eq!(rewrite_dash_bullets("  - indented"), "  - indented");
        assert_eq!(rewrite_dash_bullets("-no space"), "-no space");
    }

    #[test]
    fn test_heading_rewrites_stay_on_their_line() {
        assert_eq!(rewrite_numbered_headings("3.\nfoo"), "3.\nfoo");
        assert_eq!(rewrite_numbered_headings("12. Twelve"), "<h3>12. Twelve</h3>");
        assert_eq!(rewrite_numbered_headings("123. Too long"), "123. Too long");
        assert_eq!(rewrite_sub_numbered_headings("3-2. Dash form"), "<h4>3-2. Dash form</h4>");
    }

    #[test]
    fn dash_bullet_becomes_single_item_list() {
        assert_eq!(normalize("- apple"), "<ul><li>apple</li></ul>");
    }

    #[test]
    fn numbered_line_becomes_h3() {
        assert_eq!(normalize("3. Overview"), "<h3>3. Overview</h3>");
    }

    #[test]
    fn sub_numbered_line_becomes_h4() {
        assert_eq!(normalize("3.2. Details"), "<h4>3.2. Details</h4>");
    }

    #[test]
    fn parenthesized_line_becomes_h4() {
        assert_eq!(normalize("(1) Note"), "<h4>(1) Note</h4>");
    }

    #[test]
    fn prose_is_split_into_paragraph_blocks() {
        assert_eq!(
            normalize("First thought. Second thought"),
            "<p>First thought.</p><p>Second thought</p>"
        );
    }

    #[test]
    fn fenced_html_is_unwrapped() {
        let raw = "```html\n<h1>Lecture 3</h1>\n<p>kinetic energy</p>\n```";
        assert_eq!(normalize(raw), "<h1>Lecture 3</h1>\n<p>kinetic energy</p>");
    }

    #[test]
    fn loose_primitives_are_wrapped_in_one_diagram() {
        let raw = "<h2>Setup</h2>\n<line x1=\"0\" y1=\"0\" x2=\"50\" y2=\"0\"/>\n\n<circle cx=\"5\" cy=\"5\" r=\"3\"/>\nForces act here";
        let expected = format!(
            "<h2>Setup</h2>\n{DIAGRAM_OPEN}\n<line x1=\"0\" y1=\"0\" x2=\"50\" y2=\"0\"/>\n<circle cx=\"5\" cy=\"5\" r=\"3\"/>\n{DIAGRAM_CLOSE}\n<p>Forces act here</p>"
        );
        assert_eq!(normalize(raw), expected);
    }

    #[test]
    fn blocks_report_diagrams() {
        let blocks = normalize_blocks("<rect/>\n<rect/>\ntext\n<path d=\"M0 0\"/>");
        assert_eq!(blocks.iter().filter(|b| b.is_diagram()).count(), 2);
        assert_eq!(blocks.len(), 3);
    }

    #[test]
    fn stray_artifacts_are_removed() {
        let raw = "<p></p>\n<mjx-container>E = mc^2</mjx-container>";
        assert_eq!(normalize(raw), "<p>E = mc^2</p>");
    }

    #[test]
    fn math_delimiters_pass_through_untouched() {
        assert_eq!(normalize("$$x=1$$"), "<p>$$x=1$$</p>");
    }

    #[test]
    fn blank_and_empty_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("  \r\n\n \t "), "");
    }

    #[test]
    fn malformed_input_does_not_panic() {
        for raw in ["```", "<p>", "</p></p>", "<svg", "1.", "(", "- ", "<br><br>", "가. 나"] {
            let _ = normalize(raw);
        }
    }

    #[test]
    fn no_empty_paragraph_blocks() {
        let out = normalize("<p> </p>\n\n\nText\n<p></p>");
        assert!(!out.contains("<p></p>"), "got: {out}");
        assert_eq!(out, "<p>Text</p>");
    }
}
