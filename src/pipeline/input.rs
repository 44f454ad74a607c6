//! Input resolution: turn a path, URL or in-memory upload into a
//! [`DocumentInput`], and decide which extraction backend it belongs to.
//!
//! Both backends work on byte buffers (pdfium loads from a slice, DOCX is a
//! zip read through a cursor), so downloads stay in memory and no temporary
//! files are involved.
//!
//! Format detection deliberately mirrors how browsers report uploads: PDFs
//! are recognised by MIME type, DOCX files by extension, since many platforms
//! report DOCX uploads with an empty or generic MIME type.

use crate::error::ResumeError;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// MIME type that selects the PDF backend.
pub const PDF_MIME: &str = "application/pdf";

/// MIME type of WordprocessingML documents.
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Fallback MIME type for unknown extensions.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// An uploaded document: raw bytes plus the name and MIME type it came with.
#[derive(Clone, PartialEq, Eq)]
pub struct DocumentInput {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
}

impl fmt::Debug for DocumentInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentInput")
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

/// Which extraction backend handles a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
}

impl DocumentKind {
    /// PDF iff the MIME type is `application/pdf`; DOCX iff the file name
    /// ends in `.docx`. MIME parameters (`; charset=…`) are ignored.
    pub fn detect(file_name: &str, mime_type: &str) -> Option<Self> {
        let essence = mime_type.split(';').next().unwrap_or_default().trim();
        if essence.eq_ignore_ascii_case(PDF_MIME) {
            Some(DocumentKind::Pdf)
        } else if file_name.to_ascii_lowercase().ends_with(".docx") {
            Some(DocumentKind::Docx)
        } else {
            None
        }
    }

    /// Short format label used in error messages.
    pub fn label(self) -> &'static str {
        match self {
            DocumentKind::Pdf => "PDF",
            DocumentKind::Docx => "DOCX",
        }
    }
}

impl DocumentInput {
    pub fn new(
        bytes: impl Into<Vec<u8>>,
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            bytes: bytes.into(),
            file_name: file_name.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Build from bytes, deriving the MIME type from the file name.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>, file_name: impl Into<String>) -> Self {
        let file_name = file_name.into();
        let mime = mime_for_name(&file_name);
        Self::new(bytes, file_name, mime)
    }

    /// The backend for this document, or `UnsupportedFormat`.
    pub fn kind(&self) -> Result<DocumentKind, ResumeError> {
        DocumentKind::detect(&self.file_name, &self.mime_type).ok_or_else(|| {
            ResumeError::UnsupportedFormat {
                file_name: self.file_name.clone(),
                mime_type: if self.mime_type.is_empty() {
                    "unknown type".to_string()
                } else {
                    self.mime_type.clone()
                },
            }
        })
    }
}

/// MIME type implied by a file name's extension.
pub fn mime_for_name(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("pdf") => PDF_MIME,
        Some("docx") => DOCX_MIME,
        _ => OCTET_STREAM,
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve a path or URL to a [`DocumentInput`].
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<DocumentInput, ResumeError> {
    if input.trim().is_empty() {
        return Err(ResumeError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(Path::new(input)).await
    }
}

/// Read a local file, mapping I/O failures to input errors.
pub async fn read_local(path: &Path) -> Result<DocumentInput, ResumeError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => ResumeError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => ResumeError::FileNotFound {
            path: path.to_path_buf(),
        },
    })?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    debug!("Read {} bytes from {}", bytes.len(), path.display());
    Ok(DocumentInput::from_bytes(bytes, file_name))
}

/// Download a URL into memory. The MIME type comes from `Content-Type`,
/// falling back to the URL's extension.
async fn download_url(url: &str, timeout_secs: u64) -> Result<DocumentInput, ResumeError> {
    info!("Downloading resume from: {}", url);

    let parsed = reqwest::Url::parse(url).map_err(|_| ResumeError::InvalidInput {
        input: url.to_string(),
    })?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ResumeError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(parsed.clone()).send().await.map_err(|e| {
        if e.is_timeout() {
            ResumeError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            ResumeError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(ResumeError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ResumeError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let file_name = file_name_from_url(&parsed);
    let mime_type = content_type
        .filter(|ct| !ct.trim().is_empty() && !ct.starts_with(OCTET_STREAM))
        .unwrap_or_else(|| mime_for_name(&file_name).to_string());

    info!("Downloaded {} bytes ({})", bytes.len(), mime_type);
    Ok(DocumentInput::new(bytes.to_vec(), file_name, mime_type))
}

/// Last path segment of a URL, or `resume` when there is none.
fn file_name_from_url(url: &reqwest::Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back().map(str::to_string))
        .filter(|last| !last.is_empty())
        .unwrap_or_else(|| "resume".to_string())
}
