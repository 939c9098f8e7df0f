use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

use jb_core::{CoreResult, Entry, Tag};
use jb_filter::EntryBrowser;
use jb_fs::{load_config, load_entries, log_dir, resolve_entries_path, JournalConfig};
use jb_utils::TIMESTAMP_FORMAT;

const LOG_ENV: &str = "JOTBOOK_LOG";
const LOG_FILE_NAME: &str = "jotbook.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

// Shown when no entries file is configured.
const SAMPLE_ENTRIES: &[(&str, &[&str], &str)] = &[
    (
        "scenarios.yml",
        &["general-reference/wealthdraft"],
        "2023-01-05T10:00:00Z",
    ),
    (
        "projections.yml",
        &["project-support/wealthdraft"],
        "2023-01-06T08:30:00Z",
    ),
    ("budget-2023.md", &["finance", "planning"], "2023-01-09T19:12:00Z"),
    ("reading-list.md", &["personal"], "2023-02-02T21:45:00Z"),
    ("standup-notes.md", &["work", "meetings"], "2023-02-14T09:05:00Z"),
    ("tax-return.pdf", &["finance", "personal"], "2023-03-30T17:20:00Z"),
];

#[derive(Parser)]
#[command(
    name = "jotbook",
    version,
    about = "Browse, filter and select journal entries"
)]
struct Cli {
    /// YAML file with entries to load.
    #[arg(long, global = true)]
    entries: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print entries matching the filter lines.
    List {
        /// One line of filter text; start it with `#` to match tags.
        #[arg(long)]
        filter: Vec<String>,
    },
    /// Print every tag in use.
    Tags,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config().context("failed to load config")?;
    init_tracing(&config, cli.command.is_none());
    let entries = load_startup_entries(cli.entries.as_deref(), &config)?;

    match cli.command {
        None => jb_tui::run(entries),
        Some(Command::List { filter }) => {
            for line in render_list(entries, &filter)? {
                println!("{line}");
            }
            Ok(())
        }
        Some(Command::Tags) => {
            for tag in EntryBrowser::new(entries).tags().tags() {
                println!("{tag}");
            }
            Ok(())
        }
    }
}

/// Log to a daily rolling file. When the file cannot be opened, commands log
/// to stderr instead and the browser runs without logging, since it owns the
/// terminal.
fn init_tracing(config: &JournalConfig, interactive: bool) {
    let filter = log_filter(config);
    let writer = log_dir()
        .context("failed to resolve log directory")
        .and_then(|dir| file_writer(&dir));
    match writer {
        Ok(writer) => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(writer)
                .try_init();
        }
        Err(err) if interactive => eprintln!("jotbook: logging disabled: {err:#}"),
        Err(err) => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init();
            warn!(error = %format!("{err:#}"), "file logging unavailable");
        }
    }
}

fn file_writer(dir: &Path) -> Result<NonBlocking> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_NAME)
        .build(dir)
        .with_context(|| format!("failed to open log file in {}", dir.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = LOG_GUARD.set(guard);
    Ok(writer)
}

fn log_filter(config: &JournalConfig) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(config.log_level.as_deref().unwrap_or("info")))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

fn load_startup_entries(explicit: Option<&Path>, config: &JournalConfig) -> Result<Vec<Entry>> {
    let Some(path) = resolve_entries_path(explicit, config) else {
        info!("no entries file configured, using sample entries");
        return sample_entries();
    };
    let entries = load_entries(&path)
        .with_context(|| format!("failed to load entries from {}", path.display()))?;
    info!(path = %path.display(), count = entries.len(), "loaded entries file");
    Ok(entries)
}

fn sample_entries() -> Result<Vec<Entry>> {
    SAMPLE_ENTRIES
        .iter()
        .map(|(name, tags, timestamp)| -> Result<Entry> {
            let timestamp = DateTime::parse_from_rfc3339(timestamp)?.with_timezone(&Utc);
            let tags = tags
                .iter()
                .map(|tag| Tag::new(*tag))
                .collect::<CoreResult<Vec<_>>>()?;
            Ok(Entry::new(*name, tags, timestamp)?)
        })
        .collect()
}

/// One `index\ttimestamp\tname\ttags` line per entry passing `filters`.
fn render_list(entries: Vec<Entry>, filters: &[String]) -> Result<Vec<String>> {
    let mut browser = EntryBrowser::new(entries);
    browser
        .apply_filter_text(&filters.join("\n"))
        .context("invalid filter")?;
    Ok(browser
        .filtered_indices()
        .iter()
        .map(|&index| {
            let entry = &browser.entries()[index];
            format!(
                "{index}\t{}\t{}\t{}",
                entry.timestamp.format(TIMESTAMP_FORMAT),
                entry.name,
                entry.tags_label()
            )
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn help_lists_commands() {
        let mut cmd = Cli::command();
        let mut buffer = Vec::new();
        cmd.write_long_help(&mut buffer).expect("help output");
        let help = String::from_utf8(buffer).expect("utf8 help");
        assert!(help.contains("Browse, filter and select journal entries"));
        assert!(help.contains("list"));
        assert!(help.contains("tags"));
        assert!(help.contains("--entries"));
    }

    #[test]
    fn parses_list_filters() {
        let cli = Cli::try_parse_from([
            "jotbook",
            "list",
            "--entries",
            "journal.yaml",
            "--filter",
            "scen",
            "--filter",
            "#wealth",
        ])
        .expect("parse");
        assert_eq!(cli.entries, Some(PathBuf::from("journal.yaml")));
        match cli.command {
            Some(Command::List { filter }) => assert_eq!(filter, vec!["scen", "#wealth"]),
            _ => panic!("expected list command"),
        }
    }

    #[test]
    fn no_command_starts_browser() {
        let cli = Cli::try_parse_from(["jotbook"]).expect("parse");
        assert!(cli.command.is_none());
        assert!(cli.entries.is_none());
    }

    #[test]
    fn unwritable_log_dir_is_an_error_not_a_panic() {
        let temp = tempfile::TempDir::new().expect("temp dir");
        let blocker = temp.path().join("not-a-dir");
        std::fs::write(&blocker, "").expect("write file");
        let err = file_writer(&blocker.join("logs")).expect_err("log dir under a file");
        assert!(format!("{err:#}").contains("failed to create"));
    }

    #[test]
    fn sample_entries_are_valid() {
        let entries = sample_entries().expect("samples");
        assert_eq!(entries.len(), SAMPLE_ENTRIES.len());
        assert_eq!(entries[0].name, "scenarios.yml");
    }

    #[test]
    fn list_prints_matching_entries() {
        let entries = sample_entries().expect("samples");
        let lines = render_list(entries, &["#wealthdraft".to_string()]).expect("list");
        assert_eq!(
            lines,
            vec![
                "0\t2023-01-05 10:00:00\tscenarios.yml\tgeneral-reference/wealthdraft",
                "1\t2023-01-06 08:30:00\tprojections.yml\tproject-support/wealthdraft",
            ]
        );
    }

    #[test]
    fn list_without_filters_prints_everything() {
        let entries = sample_entries().expect("samples");
        let lines = render_list(entries, &[]).expect("list");
        assert_eq!(lines.len(), SAMPLE_ENTRIES.len());
        assert!(lines[5].starts_with("5\t"));
    }

    #[test]
    fn explicit_entries_file_is_loaded() {
        let temp = tempfile::TempDir::new().expect("temp dir");
        let path = temp.path().join("entries.yaml");
        std::fs::write(
            &path,
            "- name: only.md\n  tags: [solo]\n  timestamp: 2024-05-01T12:00:00Z\n",
        )
        .expect("write entries");
        let entries =
            load_startup_entries(Some(&path), &JournalConfig::default()).expect("entries");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].tags_label(), "solo");
    }
}
