//! Core domain entities and rules for Jotbook.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors returned by core validation and domain rules.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Returned when a validation rule is violated.
    #[error("validation error: {0}")]
    Validation(String),
    /// Returned when reading configuration or imported entries fails.
    #[error("storage error: {0}")]
    Storage(String),
}

/// A label used to group or filter entries.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct Tag {
    value: String,
}

impl Tag {
    /// Create a new tag, rejecting empty or whitespace-only values.
    pub fn new(value: impl Into<String>) -> CoreResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(CoreError::Validation("tag cannot be empty".into()));
        }
        Ok(Self { value })
    }

    /// Access the tag value.
    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.value)
    }
}

/// A single journal item.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Entry {
    /// Human-readable name, matched by name filter lines.
    pub name: String,
    /// Tags in display order; duplicates are kept.
    pub tags: Vec<Tag>,
    /// When the entry was created.
    pub timestamp: DateTime<Utc>,
}

impl Entry {
    /// Create a new entry, rejecting an empty name.
    pub fn new(name: impl Into<String>, tags: Vec<Tag>, timestamp: DateTime<Utc>) -> CoreResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CoreError::Validation("name cannot be empty".into()));
        }
        Ok(Self {
            name,
            tags,
            timestamp,
        })
    }

    /// Tags joined with single spaces, as shown in the entry list.
    pub fn tags_label(&self) -> String {
        self.tags
            .iter()
            .map(Tag::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Check a name typed into the entry form.
///
/// Only ASCII letters, digits, `.` and `-` are accepted, so names stay usable
/// as file names.
pub fn validate_entry_name(name: &str) -> CoreResult<()> {
    if name.is_empty() {
        return Err(CoreError::Validation("name cannot be empty".into()));
    }
    if let Some(bad) = name
        .chars()
        .find(|ch| !(ch.is_ascii_alphanumeric() || *ch == '.' || *ch == '-'))
    {
        return Err(CoreError::Validation(format!(
            "name contains unsupported character {bad:?}"
        )));
    }
    Ok(())
}

/// Parse a comma separated tag list, skipping blank items.
pub fn parse_tag_list(input: &str) -> Vec<Tag> {
    input
        .split(',')
        .filter_map(|tag| Tag::new(tag.trim()).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_rejects_empty() {
        let result = Tag::new("   ");
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    #[test]
    fn entry_requires_name() {
        let result = Entry::new(" ", Vec::new(), Utc::now());
        assert!(matches!(result, Err(CoreError::Validation(_))));

        let entry = Entry::new(
            "scenarios.yml",
            vec![Tag::new("general-reference/wealthdraft").unwrap()],
            Utc::now(),
        );
        assert!(entry.is_ok());
    }

    #[test]
    fn form_names_are_restricted() {
        assert!(validate_entry_name("projections.yml").is_ok());
        assert!(validate_entry_name("2023-notes").is_ok());
        assert!(validate_entry_name("").is_err());
        assert!(validate_entry_name("has space").is_err());
        assert!(validate_entry_name("slash/name").is_err());
    }

    #[test]
    fn tag_list_skips_blanks() {
        let tags = parse_tag_list(" work, ,personal ,");
        let values: Vec<_> = tags.iter().map(Tag::as_str).collect();
        assert_eq!(values, vec!["work", "personal"]);
    }

    #[test]
    fn tags_label_keeps_order_and_duplicates() {
        let entry = Entry::new(
            "a",
            vec![
                Tag::new("b").unwrap(),
                Tag::new("a").unwrap(),
                Tag::new("b").unwrap(),
            ],
            Utc::now(),
        )
        .unwrap();
        assert_eq!(entry.tags_label(), "b a b");
    }
}
