//! Prompts for VLM-based handwritten-note transcription.
//!
//! Every prompt lives here so that changing what the model is asked to do
//! touches exactly one place, and so tests can inspect the prompt without a
//! live provider.
//!
//! Callers can override the default via [`crate::config::ConversionConfig::system_prompt`].

/// Default instruction sent alongside the note images.
///
/// The model is asked for an HTML body fragment; whatever it actually
/// returns is cleaned up afterwards by [`crate::pipeline::normalize`].
pub const DEFAULT_TRANSCRIPTION_PROMPT: &str = r#"You are a document reconstruction engine.
Convert the handwritten or unstructured notes in the attached images into one clean, readable HTML document.

Goal
- Rebuild all of the content as a single continuous document, in the order the images were given.
- Preserve the original flow, hierarchy and relationships between ideas, whatever the subject.

Structure rules
1. HEADINGS
   - Use <h1> for the main title or top section.
   - Use <h2> and <h3> for subsections or important topics.

2. LISTS
   - Convert bullets (•, -, ⚫), numbers or dashes into <ul><li> or <ol><li>.
   - Preserve nesting.

3. PARAGRAPHS
   - Combine related lines into <p> blocks.
   - Do not split short related lines unnecessarily.

4. TABLES
   - Comparisons, attributes or categories become <table> with <tr><td>.

5. FORMULAS
   - Write mathematics as LaTeX: $inline$ and $$display$$.

6. VISUALS AND DIAGRAMS
   - Do NOT draw images or diagrams.
   - Describe their contents in text, using lists or tables.

7. OUTPUT
   - Return only the HTML body content (no <html>, <head> or <body> tags).
   - Do not wrap the answer in ``` fences and do not add commentary."#;
