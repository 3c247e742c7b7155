//! # Text Policy
//!
//! Length checks, markup stripping and hashtag extraction for user-supplied text.

use regex::Regex;
use std::sync::LazyLock;

use crate::domain::error::{BoardError, Result};

static SCRIPT_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<\s*(script|style|iframe)\b[^>]*>.*?<\s*/\s*(script|style|iframe)\s*>")
        .expect("valid script regex")
});
static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)</?[a-zA-Z!][^>]*>").expect("valid tag regex"));
static SCRIPT_URI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(javascript|vbscript|data)\s*:").expect("valid uri regex")
});
static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid blank-line regex"));
static HASHTAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#[\p{L}\p{N}_]+").expect("valid hashtag regex"));

/// Length in characters, ignoring surrounding whitespace.
pub fn char_len(text: &str) -> usize {
    text.trim().chars().count()
}

/// Fails with `Validation` unless `min <= len <= max`.
pub fn check_length(text: &str, min: usize, max: usize, what: &str) -> Result<()> {
    let len = char_len(text);
    if len < min {
        return Err(BoardError::Validation(format!(
            "{what} is too short ({len} characters, minimum {min})"
        )));
    }
    if len > max {
        return Err(BoardError::Validation(format!(
            "{what} is too long ({len} characters, maximum {max})"
        )));
    }
    Ok(())
}

/// Removes script blocks, markup tags and script URIs, and collapses runs of blank lines.
pub fn sanitize(text: &str) -> String {
    let text = SCRIPT_BLOCK.replace_all(text, "");
    let text = TAG.replace_all(&text, "");
    let text = SCRIPT_URI.replace_all(&text, "");
    let text = BLANK_LINES.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Hashtags in order of first appearance, deduplicated case-insensitively.
/// Pure numbers (`#8`) are post references, not tags.
pub fn hashtags(text: &str) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    let mut tags = Vec::new();
    for m in HASHTAG.find_iter(text) {
        let tag = m.as_str();
        if tag[1..].chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        let folded = tag.to_lowercase();
        if !seen.contains(&folded) {
            seen.push(folded);
            tags.push(tag.to_string());
        }
    }
    tags
}
