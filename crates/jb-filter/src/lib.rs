//! Filter text compilation and the entry browsing session.
//!
//! Filter text is multi-line. Every non-blank line is an ordered list of
//! terms that must all appear, in order and case-insensitively, somewhere in
//! the text being tested. Lines starting with [`TAG_FILTER_LEADER`] are
//! tested against tags, all other lines against the entry name.

use std::collections::{BTreeSet, HashSet};
use std::ops::Range;

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use regex::{Regex, RegexBuilder};
use thiserror::Error;
use tracing::{debug, info};

use jb_core::{Entry, Tag};
use jb_list::Checklist;

/// Marks a filter line as a tag filter.
pub const TAG_FILTER_LEADER: char = '#';

/// Result type for filter compilation.
pub type FilterResult<T> = Result<T, FilterError>;

/// Errors returned while compiling filter text.
#[derive(Debug, Error)]
pub enum FilterError {
    /// Terms are escaped before compiling, so this only happens when the
    /// pattern exceeds the regex size limits.
    #[error("cannot compile filter line {line:?}: {source}")]
    Compile {
        line: String,
        #[source]
        source: regex::Error,
    },
}

/// Split raw filter text into `(name_lines, tag_lines)`.
///
/// Lines are trimmed; the tag leader is stripped from tag lines and blank
/// lines are dropped.
pub fn split_filter_lines(text: &str) -> (Vec<String>, Vec<String>) {
    let mut name_lines = Vec::new();
    let mut tag_lines = Vec::new();
    for raw in text.split('\n') {
        let line = raw.trim();
        if let Some(tag_line) = line.strip_prefix(TAG_FILTER_LEADER) {
            let tag_line = tag_line.trim();
            if !tag_line.is_empty() {
                tag_lines.push(tag_line.to_string());
            }
        } else if !line.is_empty() {
            name_lines.push(line.to_string());
        }
    }
    (name_lines, tag_lines)
}

/// The filter line under the editor cursor, trimmed, and whether it is a tag
/// line. The tag leader is not included in the returned text.
pub fn current_filter_line(text: &str, row: usize) -> (String, bool) {
    let line = text.split('\n').nth(row).unwrap_or_default().trim();
    match line.strip_prefix(TAG_FILTER_LEADER) {
        Some(rest) => (rest.to_string(), true),
        None => (line.to_string(), false),
    }
}

/// Inverse of [`current_filter_line`].
pub fn render_filter_line(text: &str, is_tag: bool) -> String {
    if is_tag {
        format!("{TAG_FILTER_LEADER}{text}")
    } else {
        text.to_string()
    }
}

/// Compile one filter line into a case-insensitive matcher.
///
/// Terms are matched literally, in order, with anything in between. A line
/// without terms matches everything.
pub fn compile_line(line: &str) -> FilterResult<Regex> {
    let pattern = line
        .split_whitespace()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .map_err(|source| FilterError::Compile {
            line: line.to_string(),
            source,
        })
}

fn compile_lines(lines: &[String]) -> FilterResult<Vec<Regex>> {
    lines.iter().map(|line| compile_line(line)).collect()
}

/// Compiled name and tag matchers.
#[derive(Debug, Clone, Default)]
pub struct FilterSpec {
    name_matchers: Vec<Regex>,
    tag_matchers: Vec<Regex>,
}

impl FilterSpec {
    /// Compile multi-line filter text.
    pub fn parse(text: &str) -> FilterResult<Self> {
        let (name_lines, tag_lines) = split_filter_lines(text);
        Self::from_lines(&name_lines, &tag_lines)
    }

    /// Compile already separated name and tag lines (without tag leaders).
    pub fn from_lines(name_lines: &[String], tag_lines: &[String]) -> FilterResult<Self> {
        Ok(Self {
            name_matchers: compile_lines(name_lines)?,
            tag_matchers: compile_lines(tag_lines)?,
        })
    }

    /// True when the filter accepts everything.
    pub fn is_empty(&self) -> bool {
        self.name_matchers.is_empty() && self.tag_matchers.is_empty()
    }

    /// Pattern sources, name lines first.
    pub fn patterns(&self) -> Vec<&str> {
        self.name_matchers
            .iter()
            .chain(&self.tag_matchers)
            .map(Regex::as_str)
            .collect()
    }

    /// Run an entry through the filter.
    ///
    /// The name has to match every name line. When there are tag lines, at
    /// least one tag has to match all of them on its own.
    pub fn matches(&self, entry: &Entry) -> bool {
        if !self
            .name_matchers
            .iter()
            .all(|matcher| matcher.is_match(&entry.name))
        {
            return false;
        }

        if self.tag_matchers.is_empty() {
            return true;
        }

        entry.tags.iter().any(|tag| {
            self.tag_matchers
                .iter()
                .all(|matcher| matcher.is_match(tag.as_str()))
        })
    }
}

/// Sorted, deduplicated tags offered for completion on tag filter lines.
#[derive(Debug, Clone, Default)]
pub struct TagCompleter {
    tags: Vec<String>,
}

impl TagCompleter {
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a Entry>) -> Self {
        let tags: BTreeSet<&str> = entries
            .into_iter()
            .flat_map(|entry| entry.tags.iter().map(Tag::as_str))
            .collect();
        Self {
            tags: tags.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Every tag for an empty query, otherwise fuzzy matches best first.
    pub fn complete(&self, query: &str) -> Vec<String> {
        if query.is_empty() {
            return self.tags.clone();
        }
        let matcher = SkimMatcherV2::default();
        let mut scored: Vec<(i64, &String)> = self
            .tags
            .iter()
            .filter_map(|tag| matcher.fuzzy_match(tag, query).map(|score| (score, tag)))
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
        scored.into_iter().map(|(_, tag)| tag.clone()).collect()
    }
}

/// One browsing session over a set of entries.
///
/// Owns the entries, the filtered view with its highlight, the selection and
/// the tag completion corpus. Everything runs on the caller's thread, one
/// event at a time.
#[derive(Debug, Default)]
pub struct EntryBrowser {
    checklist: Checklist<Entry>,
    completer: TagCompleter,
    filter_text: String,
}

impl EntryBrowser {
    pub fn new(entries: Vec<Entry>) -> Self {
        let mut browser = Self::default();
        browser.set_items(entries);
        browser
    }

    /// Replace every entry; the filter, highlight and selection reset.
    pub fn set_items(&mut self, entries: Vec<Entry>) {
        self.completer = TagCompleter::from_entries(&entries);
        self.filter_text.clear();
        self.checklist.set_items(entries);
        info!(count = self.checklist.list().items().len(), "loaded entries");
    }

    /// Append a new entry and return its original index.
    pub fn add_entry(&mut self, entry: Entry) -> usize {
        let known: HashSet<&str> = self.completer.tags().iter().map(String::as_str).collect();
        let has_new_tags = entry.tags.iter().any(|tag| !known.contains(tag.as_str()));
        let name = entry.name.clone();
        let index = self.checklist.push(entry);
        if has_new_tags {
            self.completer = TagCompleter::from_entries(self.checklist.list().items());
        }
        info!(index, name = %name, "added entry");
        index
    }

    /// Apply separate name and tag filter text.
    ///
    /// Each text may hold several lines; tag lines do not need the leader.
    /// Lines in `name_text` that start with the leader are tag lines too.
    pub fn update_filter(&mut self, name_text: &str, tag_text: &str) -> FilterResult<()> {
        let (name_lines, mut tag_lines) = split_filter_lines(name_text);
        tag_lines.extend(
            tag_text
                .split('\n')
                .map(|line| {
                    let line = line.trim();
                    line.strip_prefix(TAG_FILTER_LEADER).unwrap_or(line).trim().to_string()
                })
                .filter(|line| !line.is_empty()),
        );
        let spec = FilterSpec::from_lines(&name_lines, &tag_lines)?;
        self.filter_text = name_lines
            .iter()
            .cloned()
            .chain(tag_lines.iter().map(|line| render_filter_line(line, true)))
            .collect::<Vec<_>>()
            .join("\n");
        self.apply_spec(spec);
        Ok(())
    }

    /// Apply raw multi-line filter text as typed in the filter editor.
    pub fn apply_filter_text(&mut self, text: &str) -> FilterResult<()> {
        let spec = FilterSpec::parse(text)?;
        self.filter_text = text.to_string();
        self.apply_spec(spec);
        Ok(())
    }

    /// Show every entry again, keeping the highlight.
    pub fn clear_filter(&mut self) {
        self.filter_text.clear();
        self.apply_spec(FilterSpec::default());
    }

    fn apply_spec(&mut self, spec: FilterSpec) {
        debug!(patterns = ?spec.patterns(), "applying filter");
        self.checklist.update_filter(move |_, entry| spec.matches(entry));
    }

    /// The filter text last applied.
    pub fn filter_text(&self) -> &str {
        &self.filter_text
    }

    pub fn scroll(&mut self, delta: isize) {
        self.checklist.scroll(delta);
    }

    pub fn page_down(&mut self) {
        self.checklist.page_down();
    }

    pub fn page_up(&mut self) {
        self.checklist.page_up();
    }

    pub fn scroll_to_first(&mut self) {
        self.checklist.scroll_to_first();
    }

    pub fn scroll_to_last(&mut self) {
        self.checklist.scroll_to_last();
    }

    pub fn toggle_highlighted(&mut self) {
        self.checklist.toggle_highlighted();
    }

    pub fn set_highlighted_selection(&mut self, selected: bool) {
        self.checklist.set_highlighted_selection(selected);
    }

    pub fn set_all_visible_selection(&mut self, selected: bool) {
        self.checklist.set_all_visible_selection(selected);
    }

    pub fn set_all_items_selection(&mut self, selected: bool) {
        self.checklist.set_all_items_selection(selected);
    }

    /// Only the height changes scrolling behaviour.
    pub fn resize(&mut self, width: usize, height: usize) {
        self.checklist.resize(width, height);
    }

    pub fn entries(&self) -> &[Entry] {
        self.checklist.list().items()
    }

    pub fn checklist(&self) -> &Checklist<Entry> {
        &self.checklist
    }

    pub fn filtered_indices(&self) -> &[usize] {
        self.checklist.list().filtered_indices()
    }

    pub fn highlighted_position(&self) -> usize {
        self.checklist.list().highlighted_position()
    }

    pub fn highlighted_entry(&self) -> Option<&Entry> {
        self.checklist.list().highlighted_item()
    }

    pub fn selected_indices(&self) -> &BTreeSet<usize> {
        self.checklist.selected_indices()
    }

    pub fn visible_range(&self) -> Range<usize> {
        self.checklist.list().visible_range()
    }

    /// Tag completion corpus.
    pub fn tags(&self) -> &TagCompleter {
        &self.completer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn entry(name: &str, tags: &[&str]) -> Entry {
        Entry::new(
            name,
            tags.iter().map(|tag| Tag::new(*tag).unwrap()).collect(),
            Utc.with_ymd_and_hms(2023, 1, 5, 10, 0, 0).unwrap(),
        )
        .unwrap()
    }

    fn wealthdraft() -> Vec<Entry> {
        vec![
            entry("scenarios.yml", &["general-reference/wealthdraft"]),
            entry("projections.yml", &["project-support/wealthdraft"]),
        ]
    }

    #[test]
    fn splits_name_and_tag_lines() {
        let (names, tags) = split_filter_lines("  scen  \n\n#wealth draft\n   \n#\nfoo bar");
        assert_eq!(names, vec!["scen", "foo bar"]);
        assert_eq!(tags, vec!["wealth draft"]);
    }

    #[test]
    fn compiled_patterns() {
        let spec = FilterSpec::parse("scen yml\na.b\n#wealth (draft)").unwrap();
        insta::assert_debug_snapshot!("compiled_patterns", spec.patterns());
    }

    #[test]
    fn terms_match_in_order_anywhere() {
        let matcher = compile_line("scen yml").unwrap();
        assert!(matcher.is_match("scenarios.yml"));
        assert!(matcher.is_match("SCENARIOS.YML"));
        assert!(!matcher.is_match("yml-scen"));
    }

    #[test]
    fn terms_are_literal() {
        let matcher = compile_line("a.b").unwrap();
        assert!(matcher.is_match("xa.by"));
        assert!(!matcher.is_match("axb"));
        assert!(compile_line("(").is_ok());
    }

    #[test]
    fn empty_line_matches_everything() {
        let matcher = compile_line("   ").unwrap();
        assert!(matcher.is_match(""));
        assert!(matcher.is_match("anything"));
        assert!(FilterSpec::parse("\n  \n").unwrap().is_empty());
    }

    #[test]
    fn one_tag_must_pass_every_tag_line() {
        let spec = FilterSpec::parse("#work\n#2023").unwrap();
        assert!(spec.matches(&entry("a", &["work-2023"])));
        assert!(!spec.matches(&entry("b", &["work", "2023"])));
        assert!(!spec.matches(&entry("c", &[])));
    }

    #[test]
    fn every_name_line_must_match() {
        let spec = FilterSpec::parse("proj\nyml").unwrap();
        assert!(spec.matches(&entry("projections.yml", &[])));
        assert!(!spec.matches(&entry("projections.txt", &[])));
    }

    #[test]
    fn name_filter_scenario() {
        let mut browser = EntryBrowser::new(wealthdraft());
        browser.update_filter("scen", "").unwrap();
        assert_eq!(browser.filtered_indices(), &[0]);
    }

    #[test]
    fn tag_filter_scenario() {
        let mut browser = EntryBrowser::new(wealthdraft());
        browser.apply_filter_text("#wealthdraft").unwrap();
        assert_eq!(browser.filtered_indices(), &[0, 1]);

        browser.update_filter("", "wealthdraft").unwrap();
        assert_eq!(browser.filtered_indices(), &[0, 1]);
        assert_eq!(browser.filter_text(), "#wealthdraft");
    }

    #[test]
    fn lost_highlight_moves_to_first_match() {
        let mut browser = EntryBrowser::new(wealthdraft());
        assert_eq!(browser.highlighted_entry().unwrap().name, "scenarios.yml");

        browser.apply_filter_text("proj").unwrap();
        assert_eq!(browser.filtered_indices(), &[1]);
        assert_eq!(browser.highlighted_position(), 0);
        assert_eq!(browser.highlighted_entry().unwrap().name, "projections.yml");
    }

    #[test]
    fn selection_survives_excluding_filter() {
        let mut browser = EntryBrowser::new(wealthdraft());
        browser.set_all_items_selection(true);
        browser.apply_filter_text("scen").unwrap();
        assert!(browser.selected_indices().contains(&1));
        assert_eq!(browser.filtered_indices(), &[0]);
    }

    #[test]
    fn viewport_scenario() {
        let entries = (0..20).map(|i| entry(&format!("entry-{i}"), &[])).collect();
        let mut browser = EntryBrowser::new(entries);
        browser.resize(80, 5);
        browser.scroll(10);
        assert_eq!(browser.visible_range(), 8..13);
    }

    #[test]
    fn extra_name_lines_only_narrow() {
        let entries = vec![
            entry("alpha-notes", &["a"]),
            entry("alpha-draft", &["b"]),
            entry("beta-notes", &["a"]),
            entry("gamma", &[]),
        ];
        let mut browser = EntryBrowser::new(entries);
        let mut text = String::new();
        let mut previous = browser.filtered_indices().len();
        for line in ["a", "notes", "alpha", "zzz"] {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(line);
            browser.apply_filter_text(&text).unwrap();
            let current = browser.filtered_indices().len();
            assert!(current <= previous, "{text:?} grew the view");
            assert!(browser
                .filtered_indices()
                .iter()
                .all(|index| browser.entries()[*index].name.contains(line)));
            previous = current;
        }
        assert_eq!(previous, 0);
    }

    #[test]
    fn clear_filter_keeps_highlight() {
        let mut browser = EntryBrowser::new(wealthdraft());
        browser.apply_filter_text("proj").unwrap();
        browser.clear_filter();
        assert_eq!(browser.filtered_indices(), &[0, 1]);
        assert_eq!(browser.highlighted_position(), 1);
        assert_eq!(browser.filter_text(), "");
    }

    #[test]
    fn added_entries_follow_filter_and_feed_completion() {
        let mut browser = EntryBrowser::new(wealthdraft());
        browser.apply_filter_text("#wealthdraft").unwrap();
        let index = browser.add_entry(entry("journal.md", &["personal"]));
        assert_eq!(index, 2);
        assert_eq!(browser.filtered_indices(), &[0, 1]);
        assert!(browser.tags().tags().contains(&"personal".to_string()));

        browser.clear_filter();
        assert_eq!(browser.filtered_indices(), &[0, 1, 2]);
    }

    #[test]
    fn completion_lists_or_ranks_tags() {
        let completer = TagCompleter::from_entries(&[
            entry("a", &["work", "personal"]),
            entry("b", &["work", "project-support/wealthdraft"]),
        ]);
        assert_eq!(
            completer.complete(""),
            vec!["personal", "project-support/wealthdraft", "work"]
        );
        let matches = completer.complete("wd");
        assert_eq!(matches.first().map(String::as_str), Some("project-support/wealthdraft"));
        assert!(!matches.contains(&"personal".to_string()));
        assert!(completer.complete("zzz").is_empty());
    }

    #[test]
    fn current_line_reports_tag_lines() {
        let text = "scen\n  #wealth \nlast";
        assert_eq!(current_filter_line(text, 0), ("scen".to_string(), false));
        assert_eq!(current_filter_line(text, 1), ("wealth".to_string(), true));
        assert_eq!(current_filter_line(text, 9), (String::new(), false));
        assert_eq!(render_filter_line("wealth", true), "#wealth");
    }

    #[test]
    fn tag_lines_in_name_text_filter_tags() {
        let mut split = EntryBrowser::new(wealthdraft());
        split.update_filter("#general", "").unwrap();
        assert_eq!(split.filtered_indices(), &[0]);
        assert_eq!(split.filter_text(), "#general");

        let mut raw = EntryBrowser::new(wealthdraft());
        raw.apply_filter_text("#general").unwrap();
        assert_eq!(raw.filtered_indices(), split.filtered_indices());

        split.update_filter("proj\n#wealth", "support").unwrap();
        assert_eq!(split.filtered_indices(), &[1]);
        assert_eq!(split.filter_text(), "proj\n#wealth\n#support");
    }
}
