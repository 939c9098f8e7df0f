//! Configuration and read-only entry import for Jotbook.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use jb_core::{CoreError, CoreResult, Entry, Tag};

/// Directory name used under the platform config and data directories.
pub const APP_DIR_NAME: &str = "jotbook";

const CONFIG_FILE_NAME: &str = "config.yaml";

/// Overrides the config file location.
pub const CONFIG_ENV: &str = "JOTBOOK_CONFIG";

/// Overrides the entries file location.
pub const ENTRIES_ENV: &str = "JOTBOOK_ENTRIES";

/// User configuration, read from `config.yaml`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct JournalConfig {
    /// YAML file with entries to load at startup.
    pub entries_path: Option<String>,
    /// Default tracing filter, e.g. `info` or `jb_list=debug`.
    pub log_level: Option<String>,
}

/// Location of the config file.
pub fn config_path() -> CoreResult<PathBuf> {
    if let Ok(value) = std::env::var(CONFIG_ENV) {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value));
        }
    }
    if let Some(dir) = dirs::config_dir() {
        return Ok(dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME));
    }
    Err(CoreError::Storage(
        "unable to determine config directory".into(),
    ))
}

/// Load the config file, falling back to defaults when it does not exist.
pub fn load_config() -> CoreResult<JournalConfig> {
    load_config_from(&config_path()?)
}

/// Load a config file from an explicit path.
pub fn load_config_from(path: &Path) -> CoreResult<JournalConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "no config file, using defaults");
        return Ok(JournalConfig::default());
    }
    let contents = fs::read_to_string(path)
        .map_err(|err| CoreError::Storage(err.to_string()))?;
    serde_yaml::from_str(&contents).map_err(|err| CoreError::Storage(err.to_string()))
}

/// Pick the entries file: explicit argument, then `JOTBOOK_ENTRIES`, then the
/// config file. `None` means no file is configured.
pub fn resolve_entries_path(explicit: Option<&Path>, config: &JournalConfig) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Ok(value) = std::env::var(ENTRIES_ENV) {
        if !value.trim().is_empty() {
            return Some(expand_home(&value));
        }
    }
    config
        .entries_path
        .as_deref()
        .filter(|path| !path.trim().is_empty())
        .map(expand_home)
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Directory for rolling log files.
pub fn log_dir() -> CoreResult<PathBuf> {
    if let Some(dir) = dirs::data_local_dir() {
        return Ok(dir.join(APP_DIR_NAME).join("logs"));
    }
    Err(CoreError::Storage(
        "unable to determine data directory".into(),
    ))
}

#[derive(Debug, Deserialize)]
struct EntryRecord {
    name: String,
    #[serde(default)]
    tags: Vec<String>,
    timestamp: DateTime<Utc>,
}

/// Read entries from a YAML list of `{name, tags, timestamp}` records.
///
/// File order becomes original-index order.
pub fn load_entries(path: &Path) -> CoreResult<Vec<Entry>> {
    let contents = fs::read_to_string(path)
        .map_err(|err| CoreError::Storage(format!("{}: {err}", path.display())))?;
    parse_entries(&contents)
}

/// Parse the YAML entries format.
pub fn parse_entries(contents: &str) -> CoreResult<Vec<Entry>> {
    if contents.trim().is_empty() {
        return Ok(Vec::new());
    }
    let records: Vec<EntryRecord> =
        serde_yaml::from_str(contents).map_err(|err| CoreError::Storage(err.to_string()))?;
    records
        .into_iter()
        .map(|record| {
            let tags = record
                .tags
                .into_iter()
                .map(Tag::new)
                .collect::<CoreResult<Vec<_>>>()?;
            Entry::new(record.name, tags, record.timestamp)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = "\
- name: scenarios.yml
  tags: [general-reference/wealthdraft]
  timestamp: 2023-01-05T10:00:00Z
- name: projections.yml
  tags:
    - project-support/wealthdraft
    - finance
  timestamp: 2023-01-06T08:30:00Z
- name: untagged.md
  timestamp: 2023-02-01T00:00:00Z
";

    #[test]
    fn loads_entries_in_file_order() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("entries.yaml");
        fs::write(&path, SAMPLE).expect("write entries");

        let entries = load_entries(&path).expect("load entries");
        let names: Vec<_> = entries.iter().map(|entry| entry.name.as_str()).collect();
        assert_eq!(names, vec!["scenarios.yml", "projections.yml", "untagged.md"]);
        assert_eq!(entries[1].tags_label(), "project-support/wealthdraft finance");
        assert!(entries[2].tags.is_empty());
    }

    #[test]
    fn rejects_invalid_records() {
        let blank_name = "- name: ' '\n  timestamp: 2023-01-05T10:00:00Z\n";
        assert!(matches!(parse_entries(blank_name), Err(CoreError::Validation(_))));

        let bad_yaml = "- name: [unterminated\n";
        assert!(matches!(parse_entries(bad_yaml), Err(CoreError::Storage(_))));

        let missing = Path::new("/definitely/not/here.yaml");
        assert!(matches!(load_entries(missing), Err(CoreError::Storage(_))));
    }

    #[test]
    fn empty_file_has_no_entries() {
        assert!(parse_entries("\n").expect("parse").is_empty());
    }

    #[test]
    fn missing_config_uses_defaults() {
        let temp = TempDir::new().expect("temp dir");
        let config = load_config_from(&temp.path().join("config.yaml")).expect("config");
        assert_eq!(config, JournalConfig::default());
    }

    #[test]
    fn reads_config_file() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("config.yaml");
        fs::write(&path, "entries_path: /tmp/journal.yaml\nlog_level: debug\n").expect("write");
        let config = load_config_from(&path).expect("config");
        assert_eq!(config.entries_path.as_deref(), Some("/tmp/journal.yaml"));
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn explicit_entries_path_wins() {
        let config = JournalConfig {
            entries_path: Some("/from/config.yaml".into()),
            log_level: None,
        };
        let explicit = PathBuf::from("/from/cli.yaml");
        assert_eq!(
            resolve_entries_path(Some(&explicit), &config),
            Some(explicit.clone())
        );
    }
}
