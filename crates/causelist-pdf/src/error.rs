use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfError {
    #[error("Failed to parse PDF: {0}")]
    Parse(String),

    #[error("Text extraction failed: {0}")]
    Extraction(String),

    #[error("Failed to write annotated PDF: {0}")]
    Save(String),
}
