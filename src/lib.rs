//! # resume2tex
//!
//! Turn a PDF or DOCX resume into a structured record and an ATS-friendly
//! one-page LaTeX document, using a generative model for the structuring.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / DOCX
//!  │
//!  ├─ 1. Input      resolve local file, URL or uploaded bytes
//!  ├─ 2. Extract    pdfium (PDF) or zip + quick-xml (DOCX), spawn_blocking
//!  ├─ 3. Structure  one model call per attempt, 1s/2s/4s backoff on overload
//!  ├─ 4. Render     record → LaTeX through an escaping AST
//!  └─ 5. Persist    last successful record + LaTeX, for restore on restart
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use resume2tex::{convert, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // API key read from GEMINI_API_KEY
//!     let config = PipelineConfig::default();
//!     let output = convert("resume.pdf", &config).await?;
//!     println!("{}", output.latex);
//!     eprintln!("structured in {} attempt(s)", output.stats.attempts);
//!     Ok(())
//! }
//! ```
//!
//! ## Keeping the last result
//!
//! ```rust,no_run
//! use resume2tex::{Pipeline, PipelineConfig, ResumeCache};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), resume2tex::ResumeError> {
//! let pipeline = Pipeline::new(PipelineConfig::default())?
//!     .with_store(Arc::new(ResumeCache::on_disk()));
//!
//! if let Some((record, latex)) = pipeline.restore() {
//!     println!("{}: {} bytes of LaTeX", record.name, latex.as_str().len());
//! } else {
//!     pipeline.run_path("resume.docx").await?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `resume2tex` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! resume2tex = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod cache;
pub mod config;
pub mod convert;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod record;
pub mod service;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use cache::{FileStore, KeyValueStore, MemoryStore, ResumeCache, ResumeStore};
pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use convert::{
    convert, convert_from_bytes, convert_sync, convert_to_file, Pipeline, PipelineOutput,
    PipelineStats, PipelineStatus,
};
pub use error::{ResumeError, ServiceError};
pub use pipeline::input::{DocumentInput, DocumentKind};
pub use pipeline::render::{escape_latex, render};
pub use pipeline::structure::RetryPolicy;
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback, Stage};
pub use record::{
    DecodeError, EducationEntry, ExperienceEntry, LatexDocument, ProjectEntry, ResumeRecord,
    Skills,
};
pub use service::{GeminiService, ProviderService, StructuringRequest, StructuringService};
