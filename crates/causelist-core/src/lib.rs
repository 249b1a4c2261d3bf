//! Core domain logic for the cause-list watcher
//!
//! This crate holds the pure parts of the pipeline: resolving which day's
//! list to check and matching a watchlist of case identifiers against
//! extracted document text. No I/O happens here.

pub mod dates;
pub mod matcher;

pub use dates::{DateSelection, ListingLocator, TargetDate};
pub use matcher::find_matches;
