//! Pipeline stages for resume-to-LaTeX conversion.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested on its own and swapped without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ structure ──▶ render
//! (path/URL/  (pdfium /   (model call,   (LaTeX AST)
//!  bytes)      quick-xml)  response, retry)
//! ```
//!
//! 1. [`input`]     resolve the document and detect its format
//! 2. [`extract`]   pull plain text out; runs in `spawn_blocking`
//! 3. [`structure`] drive the structuring service with retry/backoff; the
//!    only stage with network I/O
//! 4. [`response`]  deterministic cleanup of the raw model body before decode
//! 5. [`render`]    serialise the record to LaTeX

pub mod extract;
pub mod input;
pub mod render;
pub mod response;
pub mod structure;
