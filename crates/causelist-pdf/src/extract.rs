//! Flat text extraction from a downloaded cause list
//!
//! Produces a single lowercase-normalized string spanning all pages in
//! reading order. Pages that yield no text (scanned image pages are common
//! on some days) contribute an empty string rather than an error; matching
//! simply sees less text for those days.

use pdf_extract::extract_text_from_mem;
use tracing::debug;

use crate::error::PdfError;

/// Text content of a cause list, flattened for matching.
#[derive(Debug, Clone)]
pub struct ExtractedText {
    /// Lowercase concatenation of all pages, page order preserved.
    pub text: String,
    /// Per-page text in original case, split on form-feed boundaries.
    pub pages: Vec<String>,
}

impl ExtractedText {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Extract and normalize the document's text.
///
/// Only a malformed document is an error; a well-formed document with no
/// extractable text returns an empty `text`.
pub fn extract_text(pdf_bytes: &[u8]) -> Result<ExtractedText, PdfError> {
    let raw = extract_text_from_mem(pdf_bytes).map_err(|e| PdfError::Extraction(e.to_string()))?;
    let extracted = normalize(&raw);
    debug!(
        pages = extracted.page_count(),
        chars = extracted.text.len(),
        "extracted cause list text"
    );
    Ok(extracted)
}

/// Split raw extractor output into pages and build the lowercase
/// concatenation used for matching.
///
/// The extractor emits a form feed between pages; a document without any
/// form feed is treated as a single page. Empty pages are kept so page
/// numbering stays aligned with the source document.
fn normalize(raw: &str) -> ExtractedText {
    let pages: Vec<String> = raw.split('\x0C').map(str::to_string).collect();
    let text = pages
        .iter()
        .map(|p| p.to_lowercase())
        .collect::<Vec<_>>()
        .join("");
    ExtractedText { text, pages }
}
