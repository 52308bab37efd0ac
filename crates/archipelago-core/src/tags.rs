//! Tag name normalization and validation.
//!
//! Tags are deduplicated by their normalized name, so every path that creates,
//! renames or suggests a tag goes through [`normalize_tag_name`] first.

use crate::defaults::{SUGGESTED_TAG_MIN_LEN, TAG_NAME_MAX_LEN};
use crate::{Error, Result};

/// Normalize a raw tag name.
///
/// Trims surrounding whitespace, drops every character that is not a Unicode
/// letter or digit (emoji, punctuation, inner whitespace), and lowercases the
/// rest. Non-Latin scripts are kept: `" Лимон 🍋 "` becomes `"лимон"`.
///
/// The result may be empty; use [`validate_tag_name`] or
/// [`normalize_and_validate`] before storing it.
pub fn normalize_tag_name(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Validate an already-normalized tag name.
pub fn validate_tag_name(name: &str) -> std::result::Result<(), String> {
    if name.is_empty() {
        return Err("Tag name cannot be empty after normalization".to_string());
    }
    if name.chars().count() > TAG_NAME_MAX_LEN {
        return Err(format!(
            "Tag name must be {} characters or less",
            TAG_NAME_MAX_LEN
        ));
    }
    Ok(())
}

/// Normalize `raw` and reject names that end up empty or too long.
pub fn normalize_and_validate(raw: &str) -> Result<String> {
    let name = normalize_tag_name(raw);
    validate_tag_name(&name).map_err(Error::InvalidInput)?;
    Ok(name)
}

/// Whether a normalized model answer is usable as a suggested tag.
///
/// Suggestions are held to a stricter bar than user input: single-character
/// answers are almost always refusals or noise.
pub fn is_acceptable_suggestion(name: &str) -> bool {
    let len = name.chars().count();
    (SUGGESTED_TAG_MIN_LEN..=TAG_NAME_MAX_LEN).contains(&len)
}
