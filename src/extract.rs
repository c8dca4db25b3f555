//! Text extraction for uploaded documents.
//!
//! PDFs are the primary input. Extraction is best-effort: `pdf-extract`
//! handles the whole document first; if it fails or finds no text, a
//! page-by-page pass over the raw `lopdf` document keeps every page that can
//! still be decoded. Plain text and Markdown uploads are read as UTF-8.
//!
//! Extraction is CPU-bound and synchronous; callers run it on the blocking
//! pool.

use std::path::Path;

use tracing::{debug, warn};

use crate::error::{RagError, Result};

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_TEXT: &str = "text/plain";
pub const MIME_MARKDOWN: &str = "text/markdown";

/// Decide the content type of an upload.
///
/// Magic bytes win over the declared type, which wins over the file extension.
/// Anything unrecognised is treated as PDF, the service's native format, so
/// the PDF parser produces the error message.
pub fn detect_content_type(filename: &str, declared: Option<&str>, bytes: &[u8]) -> &'static str {
    if bytes.starts_with(b"%PDF") {
        return MIME_PDF;
    }

    let declared = declared
        .map(|d| d.split(';').next().unwrap_or(d).trim().to_ascii_lowercase())
        .unwrap_or_default();
    match declared.as_str() {
        MIME_PDF => return MIME_PDF,
        MIME_TEXT => return MIME_TEXT,
        MIME_MARKDOWN => return MIME_MARKDOWN,
        _ => {}
    }

    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "txt" => MIME_TEXT,
        "md" | "markdown" => MIME_MARKDOWN,
        _ => MIME_PDF,
    }
}

/// Read a staged file and extract its text.
pub fn extract_file(path: &Path, content_type: &str) -> Result<String> {
    let bytes = std::fs::read(path)
        .map_err(|e| RagError::ExtractionFailed(format!("cannot read {}: {}", path.display(), e)))?;
    extract_text(&bytes, content_type)
}

/// Extract plain text from document bytes.
pub fn extract_text(bytes: &[u8], content_type: &str) -> Result<String> {
    match content_type {
        MIME_PDF => extract_pdf(bytes),
        MIME_TEXT | MIME_MARKDOWN => String::from_utf8(bytes.to_vec())
            .map_err(|_| RagError::ExtractionFailed("text file is not valid UTF-8".to_string())),
        other => Err(RagError::ExtractionFailed(format!(
            "unsupported content-type: {}",
            other
        ))),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String> {
    match pdf_extract::extract_text_from_mem(bytes) {
        Ok(text) if !text.trim().is_empty() => Ok(text),
        Ok(_) => {
            // Some simple-font PDFs decode to nothing here but work per page.
            debug!("whole-document PDF extraction returned no text, trying page by page");
            Ok(extract_pdf_by_page(bytes).unwrap_or_default())
        }
        Err(primary) => {
            debug!(error = %primary, "whole-document PDF extraction failed, trying page by page");
            extract_pdf_by_page(bytes)
                .map_err(|_| RagError::ExtractionFailed(format!("unreadable PDF: {}", primary)))
        }
    }
}

/// Concatenate the text of every page lopdf can decode.
fn extract_pdf_by_page(bytes: &[u8]) -> Result<String> {
    let doc = lopdf::Document::load_mem(bytes)
        .map_err(|e| RagError::ExtractionFailed(e.to_string()))?;

    let pages = doc.get_pages();
    let mut out = String::new();
    let mut skipped = 0usize;

    for page_number in pages.keys() {
        match doc.extract_text(&[*page_number]) {
            Ok(text) => out.push_str(&text),
            Err(e) => {
                skipped += 1;
                debug!(page = page_number, error = %e, "skipping unreadable PDF page");
            }
        }
    }

    if skipped == pages.len() {
        return Err(RagError::ExtractionFailed("no decodable pages".to_string()));
    }
    if skipped > 0 {
        warn!(
            skipped,
            total = pages.len(),
            "PDF partially extracted; unreadable pages dropped"
        );
    }

    Ok(out)
}
