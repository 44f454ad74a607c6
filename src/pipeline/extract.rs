//! Text extraction: PDF via pdfium, DOCX via zip + quick-xml.
//!
//! ## Why spawn_blocking?
//!
//! Both backends are synchronous and CPU-bound. pdfium in particular wraps a
//! C++ library with global state that must not run on a Tokio worker thread,
//! so every extraction is moved onto the blocking pool.
//!
//! ## Text shape
//!
//! PDF: each page's text is split into lines, blank lines are dropped and the
//! remaining trimmed lines are joined with single spaces; pages are joined
//! with `\n` in document order. Layout is discarded on purpose, the
//! structuring model only needs the words in reading order.
//!
//! DOCX: text runs (`w:t`) in document order, `w:tab` as a tab, `w:br` /
//! `w:cr` as a newline, and a newline after every paragraph.

use crate::config::PipelineConfig;
use crate::error::ResumeError;
use crate::pipeline::input::{DocumentInput, DocumentKind};
use pdfium_render::prelude::*;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming a directory that contains libpdfium.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Extract plain text from a document, choosing the backend by format.
///
/// Fails with `UnsupportedFormat` before any backend runs when the document
/// is neither a PDF nor a DOCX.
pub async fn extract(input: &DocumentInput, config: &PipelineConfig) -> Result<String, ResumeError> {
    let kind = input.kind()?;
    info!(
        "Extracting text from '{}' ({}, {} bytes)",
        input.file_name,
        kind.label(),
        input.bytes.len()
    );

    let bytes = input.bytes.clone();
    let text = match kind {
        DocumentKind::Pdf => {
            let library_path = config.pdfium_library_path.clone();
            tokio::task::spawn_blocking(move || extract_pdf_blocking(&bytes, library_path.as_deref()))
                .await
                .map_err(|e| ResumeError::Internal(format!("PDF extraction task panicked: {e}")))??
        }
        DocumentKind::Docx => tokio::task::spawn_blocking(move || extract_docx_blocking(&bytes))
            .await
            .map_err(|e| ResumeError::Internal(format!("DOCX extraction task panicked: {e}")))??,
    };

    debug!("Extracted {} chars", text.len());
    Ok(text)
}

// ── PDF ──────────────────────────────────────────────────────────────────────

fn pdf_error(detail: impl Into<String>) -> ResumeError {
    ResumeError::Extraction {
        format: "PDF",
        detail: detail.into(),
    }
}

/// Bind to pdfium: explicit directory, then `PDFIUM_LIB_PATH`, then the
/// working directory, then the system library.
pub fn bind_pdfium(library_dir: Option<&Path>) -> Result<Pdfium, ResumeError> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(dir) = library_dir {
        candidates.push(dir.to_path_buf());
    }
    if let Some(dir) = std::env::var_os(PDFIUM_LIB_PATH_ENV) {
        candidates.push(PathBuf::from(dir));
    }
    candidates.push(PathBuf::from("./"));

    let mut last_err = None;
    for dir in &candidates {
        let lib = Pdfium::pdfium_platform_library_name_at_path(dir);
        match Pdfium::bind_to_library(&lib) {
            Ok(bindings) => {
                debug!("Bound pdfium from {:?}", lib);
                return Ok(Pdfium::new(bindings));
            }
            Err(e) => last_err = Some(format!("{lib:?}: {e}")),
        }
    }

    Pdfium::bind_to_system_library()
        .map(Pdfium::new)
        .map_err(|e| {
            let tried = last_err.unwrap_or_default();
            ResumeError::PdfiumBindingFailed(format!("{e:?} (last tried {tried})"))
        })
}

fn extract_pdf_blocking(bytes: &[u8], library_dir: Option<&Path>) -> Result<String, ResumeError> {
    if !bytes.starts_with(b"%PDF") {
        return Err(pdf_error("missing %PDF header"));
    }

    let pdfium = bind_pdfium(library_dir)?;
    let document = pdfium.load_pdf_from_byte_slice(bytes, None).map_err(|e| {
        let detail = format!("{e:?}");
        if detail.contains("Password") {
            pdf_error("document is password-protected")
        } else {
            pdf_error(detail)
        }
    })?;

    let pages = document.pages();
    info!("PDF loaded: {} pages", pages.len());

    let mut page_texts = Vec::with_capacity(pages.len() as usize);
    for (idx, page) in pages.iter().enumerate() {
        let text = page
            .text()
            .map_err(|e| pdf_error(format!("page {}: {e:?}", idx + 1)))?
            .all();
        page_texts.push(text);
    }

    Ok(join_pages(&page_texts))
}

/// Collapse each page to its non-empty trimmed lines joined by spaces, then
/// join pages with newlines.
pub fn join_pages<S: AsRef<str>>(pages: &[S]) -> String {
    pages
        .iter()
        .map(|page| {
            page.as_ref()
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ── DOCX ─────────────────────────────────────────────────────────────────────

fn docx_error(detail: impl Into<String>) -> ResumeError {
    ResumeError::Extraction {
        format: "DOCX",
        detail: detail.into(),
    }
}

fn extract_docx_blocking(bytes: &[u8]) -> Result<String, ResumeError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| docx_error(format!("not a zip package: {e}")))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| docx_error(format!("cannot find word/document.xml: {e}")))?
        .read_to_string(&mut xml)
        .map_err(|e| docx_error(format!("cannot read word/document.xml: {e}")))?;

    document_xml_text(&xml)
}

/// Text content of a WordprocessingML `document.xml`.
pub fn document_xml_text(xml: &str) -> Result<String, ResumeError> {
    let mut reader = Reader::from_str(xml);

    let mut out = String::new();
    let mut in_text = false;
    // `w:tab` inside `w:tabs` is a tab-stop definition, not content.
    let mut tabs_depth = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"w:t" => in_text = true,
                b"w:tabs" => tabs_depth += 1,
                _ => {}
            },
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:tabs" => tabs_depth = tabs_depth.saturating_sub(1),
                b"w:p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:tab" if tabs_depth == 0 => out.push('\t'),
                b"w:br" | b"w:cr" => out.push('\n'),
                b"w:p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Text(e)) if in_text => {
                let text = e
                    .unescape()
                    .map_err(|e| docx_error(format!("bad text run: {e}")))?;
                out.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(docx_error(format!(
                    "XML error at position {}: {e}",
                    reader.buffer_position()
                )))
            }
            _ => {}
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const NS: &str = r#"xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main""#;

    fn docx_with_body(body: &str) -> Vec<u8> {
        let xml = format!(r#"<?xml version="1.0" encoding="UTF-8"?><w:document {NS}><w:body>{body}</w:body></w:document>"#);
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            let options = zip::write::SimpleFileOptions::default();
            zip.start_file("word/document.xml", options).unwrap();
            zip.write_all(xml.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        buf.into_inner()
    }

    #[test]
    fn pages_are_collapsed_and_joined() {
        let pages = ["Jane Doe\n\n  jane@example.com  \n", "Experience\nAcme"];
        assert_eq!(join_pages(&pages), "Jane Doe jane@example.com\nExperience Acme");
    }

    #[test]
    fn empty_page_yields_empty_line() {
        let pages = ["a", "   ", "b"];
        assert_eq!(join_pages(&pages), "a\n\nb");
    }

    #[test]
    fn paragraphs_runs_tabs_and_breaks() {
        let xml = format!(
            r#"<w:document {NS}><w:body>
                <w:p><w:r><w:t>Jane</w:t></w:r><w:r><w:t xml:space="preserve"> Doe</w:t></w:r></w:p>
                <w:p><w:r><w:t>Rust</w:t><w:tab/><w:t>Go</w:t><w:br/><w:t>C &amp; C++</w:t></w:r></w:p>
            </w:body></w:document>"#
        );
        assert_eq!(document_xml_text(&xml).unwrap(), "Jane Doe\nRust\tGo\nC & C++\n");
    }

    #[test]
    fn tab_stop_definitions_are_not_content() {
        let xml = format!(
            r#"<w:document {NS}><w:body><w:p><w:pPr><w:tabs><w:tab w:val="right" w:pos="9000"/></w:tabs></w:pPr><w:r><w:t>x</w:t></w:r></w:p></w:body></w:document>"#
        );
        assert_eq!(document_xml_text(&xml).unwrap(), "x\n");
    }

    #[test]
    fn text_outside_runs_is_ignored() {
        let xml = format!(r#"<w:document {NS}><w:body><w:p><w:instr>IGNORED</w:instr><w:r><w:t>kept</w:t></w:r></w:p></w:body></w:document>"#);
        assert_eq!(document_xml_text(&xml).unwrap(), "kept\n");
    }

    #[test]
    fn malformed_xml_is_an_extraction_error() {
        let err = document_xml_text("<w:p><w:t>x</w:p>").unwrap_err();
        assert!(matches!(err, ResumeError::Extraction { format: "DOCX", .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn docx_package_round_trip() {
        let bytes = docx_with_body("<w:p><w:r><w:t>Jane Doe</w:t></w:r></w:p><w:p><w:r><w:t>Engineer</w:t></w:r></w:p>");
        let input = DocumentInput::from_bytes(bytes, "cv.docx");
        let text = extract(&input, &PipelineConfig::default()).await.unwrap();
        assert_eq!(text, "Jane Doe\nEngineer\n");
    }

    #[tokio::test]
    async fn docx_without_document_xml_fails() {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            zip.start_file("other.txt", zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(b"hi").unwrap();
            zip.finish().unwrap();
        }
        let input = DocumentInput::from_bytes(buf.into_inner(), "cv.docx");
        let err = extract(&input, &PipelineConfig::default()).await.unwrap_err();
        assert!(err.to_string().contains("word/document.xml"), "got {err}");
    }

    #[tokio::test]
    async fn non_zip_docx_fails() {
        let input = DocumentInput::from_bytes(b"plain text".to_vec(), "cv.docx");
        let err = extract(&input, &PipelineConfig::default()).await.unwrap_err();
        assert!(matches!(err, ResumeError::Extraction { format: "DOCX", .. }));
    }

    #[tokio::test]
    async fn pdf_without_magic_fails_before_binding() {
        let input = DocumentInput::from_bytes(b"PK\x03\x04 not a pdf".to_vec(), "cv.pdf");
        let err = extract(&input, &PipelineConfig::default()).await.unwrap_err();
        assert!(
            matches!(err, ResumeError::Extraction { format: "PDF", .. }),
            "got {err:?}"
        );
    }

    #[tokio::test]
    async fn unsupported_format_never_reaches_a_backend() {
        let input = DocumentInput::new(b"%PDF-1.7".to_vec(), "cv.pdf", "text/plain");
        let err = extract(&input, &PipelineConfig::default()).await.unwrap_err();
        assert!(matches!(err, ResumeError::UnsupportedFormat { .. }));
    }
}
