//! PDF text extraction and occurrence highlighting for cause lists
//!
//! Two halves: [`extract`] flattens a downloaded list into lowercase text
//! for watchlist matching, and [`annotate`] produces a marked copy with a
//! rectangle around every located occurrence of each matched identifier.

pub mod annotate;
pub mod error;
pub mod extract;

pub use annotate::{annotate_occurrences, AnnotatedDocument};
pub use error::PdfError;
pub use extract::{extract_text, ExtractedText};
