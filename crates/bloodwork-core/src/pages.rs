use std::sync::LazyLock;

use regex::Regex;

use crate::models::PageText;

/// Page boundary written by the text extraction step. The embedded number is
/// ignored; pages are numbered by their position in the text.
static PAGE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"--- Page \d+ ---").expect("valid page marker regex"));

/// Split extracted report text into pages.
///
/// Segments are trimmed, empty segments (text before the first marker that
/// is only whitespace, or two markers back to back) are dropped, and the
/// survivors are numbered 1, 2, 3, ... in source order.
pub fn split_pages(raw_text: &str) -> Vec<PageText> {
    let pages: Vec<PageText> = PAGE_MARKER
        .split(raw_text)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .enumerate()
        .map(|(idx, segment)| PageText::new(idx + 1, segment))
        .collect();

    tracing::info!(pages = pages.len(), "Split document into pages");
    pages
}
