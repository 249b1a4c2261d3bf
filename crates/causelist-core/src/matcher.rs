//! Watchlist matching against extracted document text
//!
//! Matching is case-insensitive substring containment over the whole
//! concatenated text. Occurrence positions are recomputed later by the
//! annotator against the paginated document, so none are tracked here.

/// Return the watchlist entries present anywhere in `text`, preserving
/// watchlist order. Pure function; comparison is case-insensitive.
pub fn find_matches(text: &str, watchlist: &[String]) -> Vec<String> {
    let haystack = text.to_lowercase();
    watchlist
        .iter()
        .filter(|case_id| haystack.contains(&case_id.to_lowercase()))
        .cloned()
        .collect()
}
