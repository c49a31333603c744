//! Pipeline stages for note-to-PDF conversion.
//!
//! Each submodule implements one step, so each can be tested on its own and
//! the render backend can be swapped without touching the text stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ encode ──▶ llm ──▶ normalize ──▶ template ──▶ render ──▶ job
//! (batch)   (base64)   (VLM)   (+classify)   (wrapper)   (browser)  (files)
//! ```
//!
//! 1. [`input`]     validate the batch; delete uploads afterwards
//! 2. [`encode`]    read and base64-wrap each image for the request body
//! 3. [`llm`]       the single VLM call; the only stage with network I/O
//! 4. [`normalize`] deterministic regex passes over the raw answer, ending
//!    in [`classify`]'s line classifier and diagram collector
//! 5. [`template`]  embed the body in a page with KaTeX and the readiness script
//! 6. [`render`]    load, wait (see [`wait`]), print; behind engine traits
//! 7. [`job`]       timestamped artifact names and the atomic PDF write

pub mod classify;
pub mod encode;
pub mod input;
pub mod job;
pub mod llm;
pub mod normalize;
pub mod render;
pub mod template;
pub mod wait;
