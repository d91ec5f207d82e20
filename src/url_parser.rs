//! Turning Drive links into entry ids.
//!
//! Every command that takes an id also accepts the link Drive shows in the
//! browser for that entry.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{DriveError, Result};

/// Link shapes that carry an entry id in their first capture group.
static LINK_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^https?://drive\.google\.com/drive/(?:u/\d+/)?folders/([a-zA-Z0-9_-]+)",
        r"^https?://drive\.google\.com/file/d/([a-zA-Z0-9_-]+)",
        r"^https?://drive\.google\.com/open\?id=([a-zA-Z0-9_-]+)",
        r"^https?://docs\.google\.com/(?:document|spreadsheets|presentation|drawings)/d/([a-zA-Z0-9_-]+)",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("link pattern is valid"))
    .collect()
});

static ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("id pattern is valid"));

/// Extract a Drive id from a link, or validate a raw id.
///
/// Supports the following forms:
/// - `https://drive.google.com/drive/folders/<ID>` (optionally `u/<n>/`)
/// - `https://drive.google.com/file/d/<ID>/view`
/// - `https://drive.google.com/open?id=<ID>`
/// - `https://docs.google.com/document/d/<ID>/edit` and the sheet, slide and drawing variants
/// - a raw id, including the `root` alias
///
/// # Examples
///
/// ```
/// use gdrive_cli::url_parser::extract_id;
///
/// let id = extract_id("https://drive.google.com/drive/folders/1abc123").unwrap();
/// assert_eq!(id, "1abc123");
///
/// let id = extract_id("root").unwrap();
/// assert_eq!(id, "root");
/// ```
pub fn extract_id(url_or_id: &str) -> Result<String> {
    let trimmed = url_or_id.trim().trim_end_matches('/');

    let linked = LINK_PATTERNS
        .iter()
        .find_map(|pattern| pattern.captures(trimmed).and_then(|c| c.get(1)));
    if let Some(id) = linked {
        return Ok(id.as_str().to_string());
    }

    if ID_REGEX.is_match(trimmed) {
        return Ok(trimmed.to_string());
    }

    Err(DriveError::InvalidUrlOrId(url_or_id.to_string()))
}

/// Normalize every argument, failing on the first one that is not an id.
pub fn extract_ids<S: AsRef<str>>(values: &[S]) -> Result<Vec<String>> {
    values.iter().map(|v| extract_id(v.as_ref())).collect()
}
