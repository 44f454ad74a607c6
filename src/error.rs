//! Error types for the resume2tex library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ResumeError`] is **fatal**: the current pipeline run cannot produce a
//!   record (bad input file, unsupported format, structuring service gave up).
//!   Returned as `Err(ResumeError)` from [`crate::convert::Pipeline::run`] and
//!   the `convert*` helpers. A failed run persists nothing.
//!
//! * [`ServiceError`] is **per attempt**: one call to the structuring service
//!   failed. The retry loop in [`crate::pipeline::structure`] inspects it to
//!   decide between backing off and aborting; only the last one survives,
//!   folded into [`ResumeError::Transform`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the resume2tex library.
#[derive(Debug, Error)]
pub enum ResumeError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Resume file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// Neither a PDF (by MIME type) nor a DOCX (by file name).
    #[error("Unsupported file format: '{file_name}' ({mime_type})\nUpload a PDF or a .docx file.")]
    UnsupportedFormat { file_name: String, mime_type: String },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// The document could not be decoded (corrupt, encrypted, wrong magic bytes).
    #[error("Failed to parse {format} file: {detail}\nPlease ensure it's a valid document.")]
    Extraction { format: &'static str, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
PDF extraction needs the pdfium shared library. You can:\n\
  • Place libpdfium next to the binary or in the working directory.\n\
  • Set PDFIUM_LIB_PATH=/path/to/dir/containing/libpdfium.\n\
  • Install pdfium system-wide (see bblanchon/pdfium-binaries).\n"
    )]
    PdfiumBindingFailed(String),

    // ── Structuring errors ────────────────────────────────────────────────
    /// The configured structuring backend is not usable (missing API key etc.).
    #[error("Structuring provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Retries exhausted, non-retryable service failure, or unusable output.
    #[error("{message}")]
    Transform { attempts: u32, message: String },

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// A run is already in flight on this pipeline.
    #[error("A resume is already being processed; wait for it to finish")]
    PipelineBusy,

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not persist the record or LaTeX to the cache.
    #[error("Failed to write cache entry '{key}': {source}")]
    CacheWriteFailed {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// HTTP status the structuring service uses to signal overload.
pub const UNAVAILABLE_CODE: u16 = 503;

/// Status marker the structuring service uses to signal overload.
pub const UNAVAILABLE_STATUS: &str = "UNAVAILABLE";

/// A single failed call to the structuring service.
///
/// Mirrors the service's own error envelope (`{code, status, message}`) so the
/// transient/terminal decision can look at all three signals.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
#[error("{message}")]
pub struct ServiceError {
    /// Numeric status code, when the service or transport reported one.
    pub code: Option<u16>,
    /// Symbolic status such as `UNAVAILABLE` or `INVALID_ARGUMENT`.
    pub status: Option<String>,
    /// Human-readable message, surfaced to the user as-is.
    pub message: String,
}

impl ServiceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            status: None,
            message: message.into(),
        }
    }

    pub fn with_code(mut self, code: u16) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// The service's "temporarily unavailable" signal.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(message)
            .with_code(UNAVAILABLE_CODE)
            .with_status(UNAVAILABLE_STATUS)
    }

    /// Whether the failure is an overload/unavailability condition worth
    /// retrying: code 503, status `UNAVAILABLE`, or a demand-throttling message.
    pub fn is_transient(&self) -> bool {
        self.code == Some(UNAVAILABLE_CODE)
            || self.status.as_deref() == Some(UNAVAILABLE_STATUS)
            || self.message.contains("demand")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_format_display() {
        let e = ResumeError::UnsupportedFormat {
            file_name: "notes.txt".into(),
            mime_type: "text/plain".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("notes.txt"), "got: {msg}");
        assert!(msg.contains("text/plain"), "got: {msg}");
    }

    #[test]
    fn transform_display_is_the_underlying_message() {
        let e = ResumeError::Transform {
            attempts: 4,
            message: "The model is overloaded".into(),
        };
        assert_eq!(e.to_string(), "The model is overloaded");
    }

    #[test]
    fn extraction_display_names_format() {
        let e = ResumeError::Extraction {
            format: "PDF",
            detail: "bad xref".into(),
        };
        assert!(e.to_string().starts_with("Failed to parse PDF file: bad xref"));
    }

    #[test]
    fn transient_by_code() {
        assert!(ServiceError::new("busy").with_code(503).is_transient());
        assert!(!ServiceError::new("busy").with_code(500).is_transient());
    }

    #[test]
    fn transient_by_status_marker() {
        assert!(ServiceError::new("x").with_status("UNAVAILABLE").is_transient());
        assert!(!ServiceError::new("x")
            .with_status("INVALID_ARGUMENT")
            .is_transient());
    }

    #[test]
    fn transient_by_demand_message() {
        assert!(ServiceError::new("This model is currently experiencing high demand").is_transient());
        assert!(!ServiceError::new("API key not valid").with_code(400).is_transient());
    }

    #[test]
    fn unavailable_helper_sets_both_signals() {
        let e = ServiceError::unavailable("overloaded");
        assert_eq!(e.code, Some(503));
        assert_eq!(e.status.as_deref(), Some("UNAVAILABLE"));
        assert!(e.is_transient());
    }
}
