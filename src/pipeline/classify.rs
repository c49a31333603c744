//! Line classification and vector-diagram collection.
//!
//! The last stage of normalisation sees the document as a sequence of
//! trimmed, non-empty lines and turns each one into a [`Block`]. Most lines
//! map one-to-one, but models sometimes emit loose SVG primitives
//! (`<line …/>`, `<rect …/>`) without a root element. Consecutive primitive
//! lines are gathered into a [`DiagramCollector`] buffer and emitted as a
//! single fixed-size `<svg>` container as soon as a non-primitive line (or
//! the end of input) is reached.
//!
//! ## States
//!
//! ```text
//!            primitive                 primitive
//!   Idle ───────────────▶ Collecting ◀──────────┐
//!    ▲                       │  └───────────────┘
//!    │   other line:         │
//!    └── flush diagram, ─────┘
//!        then classify the line
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::mem;

/// Opening tag of the container wrapped around collected primitives.
pub const DIAGRAM_OPEN: &str =
    r#"<svg width="600" height="400" xmlns="http://www.w3.org/2000/svg">"#;

/// Closing tag of the diagram container.
pub const DIAGRAM_CLOSE: &str = "</svg>";

/// A bare drawing element: an opening or self-closing tag, a labelled
/// `<text …>label</text>`, or the `</text>` closing a multi-line label.
static RE_VECTOR_PRIMITIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:<(?:line|rect|path|circle|polyline|polygon|ellipse|text)\b[^>]*/?>|<text\b[^>]*>[^<]*</text\s*>|</text\s*>)$",
    )
    .unwrap()
});

static RE_STRUCTURED_OPENER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:<h[1-6][\s>]|<p[\s>]|<svg[\s>]|<table[\s>]|<ul[\s>]|<ol[\s>]|<li[\s>])").unwrap()
});

/// What a single line of markup is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// A lone SVG drawing element that must live inside a diagram container.
    VectorPrimitive,
    /// A line carrying an `<img` reference; kept verbatim.
    Image,
    /// Already a block element (heading, paragraph, svg root, table, list,
    /// list item).
    Structured,
    /// Anything else; wrapped in a paragraph.
    Prose,
}

/// Classify one trimmed line. Checks run in priority order.
pub fn classify(line: &str) -> LineKind {
    if RE_VECTOR_PRIMITIVE.is_match(line) {
        LineKind::VectorPrimitive
    } else if line.contains("<img") {
        LineKind::Image
    } else if RE_STRUCTURED_OPENER.is_match(line) {
        LineKind::Structured
    } else {
        LineKind::Prose
    }
}

/// One block of the normalized document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// One or more primitives wrapped in a fixed-size `<svg>` container.
    Diagram(Vec<String>),
    /// An image line, emitted as-is.
    Image(String),
    /// A line that already starts with block markup, emitted as-is.
    Structured(String),
    /// A prose line, wrapped in `<p>…</p>`.
    Paragraph(String),
}

impl Block {
    pub fn is_diagram(&self) -> bool {
        matches!(self, Block::Diagram(_))
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Block::Diagram(primitives) => write!(
                f,
                "{DIAGRAM_OPEN}\n{}\n{DIAGRAM_CLOSE}",
                primitives.join("\n")
            ),
            Block::Image(line) | Block::Structured(line) => f.write_str(line),
            Block::Paragraph(line) => write!(f, "<p>{line}</p>"),
        }
    }
}

#[derive(Debug, Default)]
enum CollectorState {
    #[default]
    Idle,
    Collecting(Vec<String>),
}

/// Turns a line sequence into blocks, merging runs of vector primitives.
#[derive(Debug, Default)]
pub struct DiagramCollector {
    state: CollectorState,
    blocks: Vec<Block>,
}

impl DiagramCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether primitives are currently being buffered.
    pub fn is_collecting(&self) -> bool {
        matches!(self.state, CollectorState::Collecting(_))
    }

    /// Feed the next trimmed, non-empty line.
    pub fn push(&mut self, line: &str) {
        let block = match classify(line) {
            LineKind::VectorPrimitive => {
                match &mut self.state {
                    CollectorState::Collecting(buffer) => buffer.push(line.to_string()),
                    CollectorState::Idle => {
                        self.state = CollectorState::Collecting(vec![line.to_string()]);
                    }
                }
                return;
            }
            LineKind::Image => Block::Image(line.to_string()),
            LineKind::Structured => Block::Structured(line.to_string()),
            LineKind::Prose => Block::Paragraph(line.to_string()),
        };

        self.flush();
        self.blocks.push(block);
    }

    /// Emit any buffered primitives as one diagram and return to idle.
    /// An empty buffer emits nothing.
    fn flush(&mut self) {
        if let CollectorState::Collecting(buffer) = mem::take(&mut self.state) {
            if !buffer.is_empty() {
                self.blocks.push(Block::Diagram(buffer));
            }
        }
    }

    /// End of input: flush a trailing diagram and hand back all blocks.
    pub fn finish(mut self) -> Vec<Block> {
        self.flush();
        self.blocks
    }
}

/// Run every line through a fresh [`DiagramCollector`].
pub fn collect_blocks<I, S>(lines: I) -> Vec<Block>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut collector = DiagramCollector::new();
    for line in lines {
        collector.push(line.as_ref());
    }
    collector.finish()
}
