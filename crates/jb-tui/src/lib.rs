use anyhow::{Context, Result};
use chrono::Utc;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use std::io::{self, Stdout};
use std::time::Duration;
use tracing::{info, warn};

use jb_core::{parse_tag_list, validate_entry_name, CoreResult, Entry};
use jb_filter::{current_filter_line, render_filter_line, EntryBrowser};
use jb_list::FilterableList;
use jb_utils::{pads_for_size, row_layout, truncate_with_ellipsis, TIMESTAMP_FORMAT};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

const FILTER_PANE_HEIGHT: u16 = 6;
const MAX_FORM_WIDTH: u16 = 50;
const FORM_HEIGHT: u16 = 9;

const CHECKMARK: char = '•';

const FOCUSED_BACKGROUND: Color = Color::Rgb(0x28, 0x28, 0x28);
const RED: Color = Color::Rgb(0xc8, 0x55, 0x3d);
const ORANGE: Color = Color::Rgb(0xf2, 0x8f, 0x3b);
const CYAN: Color = Color::Rgb(0x58, 0x8b, 0x8b);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    List,
    Filter,
    Form,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EditorMode {
    Normal,
    Insert,
}

#[derive(Debug, Default, Clone)]
struct TextInput {
    content: String,
    // In chars, not bytes.
    cursor: usize,
}

impl TextInput {
    fn insert(&mut self, c: char) {
        insert_char_at(&mut self.content, self.cursor, c);
        self.cursor += 1;
    }

    fn delete_back(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            remove_char_at(&mut self.content, self.cursor);
        }
    }

    fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    fn move_right(&mut self) {
        if self.cursor < char_len(&self.content) {
            self.cursor += 1;
        }
    }

    fn move_home(&mut self) {
        self.cursor = 0;
    }

    fn move_end(&mut self) {
        self.cursor = char_len(&self.content);
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('a') => self.move_home(),
                KeyCode::Char('e') => self.move_end(),
                _ => {}
            }
            return;
        }
        match key.code {
            KeyCode::Char(c) => self.insert(c),
            KeyCode::Backspace => self.delete_back(),
            KeyCode::Left => self.move_left(),
            KeyCode::Right => self.move_right(),
            KeyCode::Home => self.move_home(),
            KeyCode::End => self.move_end(),
            _ => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct EditorSnapshot {
    lines: Vec<String>,
    row: usize,
    col: usize,
}

/// Multi-line filter editor with vim-style normal and insert modes.
#[derive(Debug, Clone)]
struct FilterEditor {
    lines: Vec<String>,
    row: usize,
    col: usize,
    mode: EditorMode,
    history: Vec<EditorSnapshot>,
    // First `d` of `dd` seen.
    pending_delete: bool,
}

impl FilterEditor {
    fn new() -> Self {
        Self {
            lines: vec![String::new()],
            row: 0,
            col: 0,
            mode: EditorMode::Normal,
            history: Vec::new(),
            pending_delete: false,
        }
    }

    fn value(&self) -> String {
        self.lines.join("\n")
    }

    fn clear(&mut self) {
        self.checkpoint();
        self.lines = vec![String::new()];
        self.row = 0;
        self.col = 0;
    }

    fn snapshot(&self) -> EditorSnapshot {
        EditorSnapshot {
            lines: self.lines.clone(),
            row: self.row,
            col: self.col,
        }
    }

    /// Record the current text so `u` can return to it.
    fn checkpoint(&mut self) {
        let snapshot = self.snapshot();
        if self.history.last() != Some(&snapshot) {
            self.history.push(snapshot);
        }
    }

    fn undo(&mut self) {
        while let Some(snapshot) = self.history.pop() {
            if snapshot.lines != self.lines {
                self.lines = snapshot.lines;
                self.row = snapshot.row.min(self.lines.len() - 1);
                self.col = snapshot.col.min(char_len(&self.lines[self.row]));
                return;
            }
        }
    }

    fn set_mode(&mut self, mode: EditorMode) {
        if mode == EditorMode::Insert && self.mode != EditorMode::Insert {
            self.checkpoint();
        }
        self.mode = mode;
        self.pending_delete = false;
    }

    fn replace_current_line(&mut self, text: String) {
        self.checkpoint();
        self.lines[self.row] = text;
        self.col = char_len(&self.lines[self.row]);
    }

    fn current_len(&self) -> usize {
        char_len(&self.lines[self.row])
    }

    fn handle_key(&mut self, key: KeyEvent) {
        match self.mode {
            EditorMode::Normal => self.handle_normal_key(key),
            EditorMode::Insert => self.handle_insert_key(key),
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) {
        let pending_delete = std::mem::take(&mut self.pending_delete);
        match key.code {
            KeyCode::Char('i') => self.set_mode(EditorMode::Insert),
            KeyCode::Char('a') => {
                self.col = (self.col + 1).min(self.current_len());
                self.set_mode(EditorMode::Insert);
            }
            KeyCode::Char('I') => {
                self.col = 0;
                self.set_mode(EditorMode::Insert);
            }
            KeyCode::Char('A') => {
                self.col = self.current_len();
                self.set_mode(EditorMode::Insert);
            }
            KeyCode::Char('o') => self.open_line(self.row + 1),
            KeyCode::Char('O') => self.open_line(self.row),
            KeyCode::Char('x') | KeyCode::Delete => {
                if self.col < self.current_len() {
                    self.checkpoint();
                    remove_char_at(&mut self.lines[self.row], self.col);
                    self.col = self.col.min(self.current_len());
                }
            }
            KeyCode::Char('d') if pending_delete => self.delete_line(),
            KeyCode::Char('d') => self.pending_delete = true,
            KeyCode::Char('u') => self.undo(),
            KeyCode::Char('h') | KeyCode::Left => self.col = self.col.saturating_sub(1),
            KeyCode::Char('l') | KeyCode::Right => {
                self.col = (self.col + 1).min(self.current_len());
            }
            KeyCode::Char('j') | KeyCode::Down => {
                if self.row + 1 < self.lines.len() {
                    self.row += 1;
                    self.col = self.col.min(self.current_len());
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                if self.row > 0 {
                    self.row -= 1;
                    self.col = self.col.min(self.current_len());
                }
            }
            KeyCode::Char('0') | KeyCode::Home => self.col = 0,
            KeyCode::Char('$') | KeyCode::End => self.col = self.current_len(),
            _ => {}
        }
    }

    fn open_line(&mut self, row: usize) {
        self.checkpoint();
        self.lines.insert(row, String::new());
        self.row = row;
        self.col = 0;
        self.mode = EditorMode::Insert;
    }

    fn delete_line(&mut self) {
        self.checkpoint();
        if self.lines.len() == 1 {
            self.lines[0].clear();
        } else {
            self.lines.remove(self.row);
            self.row = self.row.min(self.lines.len() - 1);
        }
        self.col = 0;
    }

    fn handle_insert_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return;
        }
        if key.code == KeyCode::Esc {
            self.set_mode(EditorMode::Normal);
            return;
        }
        let (lines, row, col) = (&mut self.lines, &mut self.row, &mut self.col);
        match key.code {
            KeyCode::Left => {
                if *col > 0 {
                    *col -= 1;
                } else if *row > 0 {
                    *row -= 1;
                    *col = char_len(&lines[*row]);
                }
            }
            KeyCode::Right => {
                if *col < char_len(&lines[*row]) {
                    *col += 1;
                } else if *row + 1 < lines.len() {
                    *row += 1;
                    *col = 0;
                }
            }
            KeyCode::Up => {
                if *row > 0 {
                    *row -= 1;
                    *col = (*col).min(char_len(&lines[*row]));
                }
            }
            KeyCode::Down => {
                if *row + 1 < lines.len() {
                    *row += 1;
                    *col = (*col).min(char_len(&lines[*row]));
                }
            }
            KeyCode::Home => *col = 0,
            KeyCode::End => *col = char_len(&lines[*row]),
            KeyCode::Enter => {
                let split_at = byte_index_at_char(&lines[*row], *col);
                let tail = lines[*row].split_off(split_at);
                *row += 1;
                *col = 0;
                lines.insert(*row, tail);
            }
            KeyCode::Backspace => {
                if *col > 0 {
                    *col -= 1;
                    remove_char_at(&mut lines[*row], *col);
                } else if *row > 0 {
                    let current = lines.remove(*row);
                    *row -= 1;
                    *col = char_len(&lines[*row]);
                    lines[*row].push_str(&current);
                }
            }
            KeyCode::Delete => {
                if *col < char_len(&lines[*row]) {
                    remove_char_at(&mut lines[*row], *col);
                } else if *row + 1 < lines.len() {
                    let next = lines.remove(*row + 1);
                    lines[*row].push_str(&next);
                }
            }
            KeyCode::Char(c) => {
                insert_char_at(&mut lines[*row], *col, c);
                *col += 1;
            }
            _ => {}
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum FormField {
    #[default]
    Name,
    Tags,
}

#[derive(Debug, Default, Clone)]
struct EntryForm {
    name: TextInput,
    tags: TextInput,
    field: FormField,
}

impl EntryForm {
    fn clear(&mut self) {
        *self = Self::default();
    }

    fn name_is_valid(&self) -> bool {
        validate_entry_name(&self.name.content).is_ok()
    }

    fn next_field(&mut self) {
        self.field = match self.field {
            FormField::Name => FormField::Tags,
            FormField::Tags => FormField::Name,
        };
    }

    fn active_input(&mut self) -> &mut TextInput {
        match self.field {
            FormField::Name => &mut self.name,
            FormField::Tags => &mut self.tags,
        }
    }

    fn build_entry(&self) -> CoreResult<Entry> {
        validate_entry_name(&self.name.content)?;
        Entry::new(
            self.name.content.clone(),
            parse_tag_list(&self.tags.content),
            Utc::now(),
        )
    }
}

/// Interactive browser state: the session plus the shell components around it.
#[derive(Debug)]
pub struct App {
    browser: EntryBrowser,
    focus: Focus,
    editor: FilterEditor,
    completions: FilterableList<String>,
    form: EntryForm,
    status: Option<String>,
    show_help: bool,
}

impl App {
    pub fn new(entries: Vec<Entry>) -> Self {
        Self {
            browser: EntryBrowser::new(entries),
            focus: Focus::List,
            editor: FilterEditor::new(),
            completions: FilterableList::new(),
            form: EntryForm::default(),
            status: None,
            show_help: false,
        }
    }

    /// Recompute pane sizes for a terminal of `width` x `height` cells.
    pub fn resize(&mut self, width: u16, height: u16) {
        let layout = screen_layout(Rect::new(0, 0, width, height));
        self.browser
            .resize(usize::from(layout.list.width), usize::from(layout.list.height));
        self.completions.resize(
            usize::from(layout.completions.width.saturating_sub(2)),
            usize::from(layout.completions.height.saturating_sub(2)),
        );
    }

    fn apply_filter(&mut self) {
        let text = self.editor.value();
        if text == self.browser.filter_text() {
            return;
        }
        if let Err(err) = self.browser.apply_filter_text(&text) {
            warn!(error = %err, "rejected filter text");
            self.status = Some(err.to_string());
        }
    }

    fn refresh_completions(&mut self) {
        let (query, is_tag) = current_filter_line(&self.editor.value(), self.editor.row);
        let items = if is_tag {
            self.browser.tags().complete(&query)
        } else {
            Vec::new()
        };
        self.completions.set_items(items);
    }

    fn set_focus(&mut self, focus: Focus) {
        self.focus = focus;
        self.show_help = false;
    }

    fn focus_filter(&mut self) {
        self.set_focus(Focus::Filter);
        self.editor.set_mode(EditorMode::Insert);
        self.refresh_completions();
    }

    fn focus_list(&mut self) {
        self.editor.checkpoint();
        self.set_focus(Focus::List);
    }

    fn open_form(&mut self) {
        self.form.clear();
        self.set_focus(Focus::Form);
    }
}

pub fn run(entries: Vec<Entry>) -> Result<()> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(entries);
    let size = terminal.size()?;
    app.resize(size.width, size.height);
    info!(
        entries = app.browser.entries().len(),
        width = size.width,
        height = size.height,
        "browser started"
    );

    let result = event_loop(&mut terminal, &mut app);
    restore_terminal(terminal)?;
    result
}

fn event_loop(
    terminal: &mut Terminal<ratatui::backend::CrosstermBackend<Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        terminal.draw(|frame| render_app(frame, app))?;

        if event::poll(POLL_INTERVAL)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if handle_key(app, key)? {
                        return Ok(());
                    }
                }
                Event::Resize(width, height) => app.resize(width, height),
                _ => {}
            }
        }
    }
}

/// Route a key to the focused component. Returns `true` when the user quits.
pub fn handle_key(app: &mut App, key: KeyEvent) -> Result<bool> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Ok(true);
    }
    if key.code == KeyCode::F(1) {
        app.show_help = !app.show_help;
        return Ok(false);
    }
    match app.focus {
        Focus::List => Ok(handle_list_key(app, key)),
        Focus::Filter => {
            handle_filter_key(app, key);
            Ok(false)
        }
        Focus::Form => {
            handle_form_key(app, key)?;
            Ok(false)
        }
    }
}

fn handle_list_key(app: &mut App, key: KeyEvent) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('u') => app.browser.page_up(),
            KeyCode::Char('d') => app.browser.page_down(),
            _ => {}
        }
        return false;
    }

    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Char('?') => app.show_help = !app.show_help,
        KeyCode::Esc => app.show_help = false,
        KeyCode::Char('j') | KeyCode::Down => app.browser.scroll(1),
        KeyCode::Char('k') | KeyCode::Up => app.browser.scroll(-1),
        KeyCode::Char('J') | KeyCode::PageDown => app.browser.page_down(),
        KeyCode::Char('K') | KeyCode::PageUp => app.browser.page_up(),
        KeyCode::Char('g') | KeyCode::Home => app.browser.scroll_to_first(),
        KeyCode::Char('G') | KeyCode::End => app.browser.scroll_to_last(),
        KeyCode::Char('x' | ' ') => app.browser.toggle_highlighted(),
        KeyCode::Char('S') => app.browser.set_all_visible_selection(true),
        KeyCode::Char('D') => app.browser.set_all_visible_selection(false),
        KeyCode::Char('a') => app.browser.set_all_items_selection(true),
        KeyCode::Char('u') => app.browser.set_all_items_selection(false),
        KeyCode::Char('\\') => app.focus_filter(),
        KeyCode::Char('c') => {
            app.editor.clear();
            app.browser.clear_filter();
            app.completions.set_items(Vec::new());
            app.status = Some("Cleared filters".into());
        }
        KeyCode::Char('n') => app.open_form(),
        _ => {}
    }
    false
}

fn handle_filter_key(app: &mut App, key: KeyEvent) {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('j') => app.completions.scroll(1),
            KeyCode::Char('k') => app.completions.scroll(-1),
            _ => {}
        }
        return;
    }

    if app.editor.mode == EditorMode::Normal {
        match key.code {
            KeyCode::Char('?') => {
                app.show_help = !app.show_help;
                return;
            }
            KeyCode::Esc if app.show_help => {
                app.show_help = false;
                return;
            }
            _ => {}
        }
    }

    match key.code {
        KeyCode::Char('\\') => {
            app.focus_list();
            return;
        }
        KeyCode::Tab => {
            if let Some(tag) = app.completions.highlighted_item().cloned() {
                app.editor.replace_current_line(render_filter_line(&tag, true));
            }
        }
        _ => app.editor.handle_key(key),
    }

    app.apply_filter();
    app.refresh_completions();
}

fn handle_form_key(app: &mut App, key: KeyEvent) -> Result<()> {
    match key.code {
        KeyCode::Esc => {
            app.form.clear();
            app.set_focus(Focus::List);
            app.status = Some("Entry creation cancelled".into());
        }
        KeyCode::Enter => {
            if !app.form.name_is_valid() {
                warn!(name = %app.form.name.content, "rejected entry name");
                app.status = Some("Names may only use letters, digits, '.' and '-'".into());
                return Ok(());
            }
            let entry = app.form.build_entry().context("failed to build entry")?;
            let name = entry.name.clone();
            app.browser.add_entry(entry);
            app.form.clear();
            app.set_focus(Focus::List);
            app.status = Some(format!("Created {name}"));
        }
        KeyCode::Tab | KeyCode::BackTab => app.form.next_field(),
        _ => app.form.active_input().handle_key(key),
    }
    Ok(())
}

struct ScreenLayout {
    list: Rect,
    footer: Rect,
    label: Rect,
    filter: Rect,
    completions: Rect,
}

fn screen_layout(area: Rect) -> ScreenLayout {
    let (horizontal_pad, vertical_pad) =
        pads_for_size(usize::from(area.width), usize::from(area.height));
    let horizontal_pad = u16::try_from(horizontal_pad).unwrap_or(0);
    let vertical_pad = u16::try_from(vertical_pad).unwrap_or(0);
    let inner = Rect::new(
        area.x + horizontal_pad,
        area.y + vertical_pad,
        area.width.saturating_sub(2 * horizontal_pad),
        area.height.saturating_sub(2 * vertical_pad),
    );

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(FILTER_PANE_HEIGHT),
        ])
        .split(inner);

    let filter_row = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[3]);

    ScreenLayout {
        list: rows[0],
        footer: rows[1],
        label: rows[2],
        filter: filter_row[0],
        completions: filter_row[1],
    }
}

fn render_app(frame: &mut Frame, app: &App) {
    let size = frame.size();
    let layout = screen_layout(size);

    render_entry_list(frame, layout.list, app);
    render_footer(frame, layout.footer, app);
    render_filter_label(frame, layout.label, app);
    render_filter_pane(frame, layout.filter, app);
    render_completions(frame, layout.completions, app);

    if app.focus == Focus::Form {
        render_form_popup(frame, size, app);
    }

    if app.show_help {
        render_help_popup(frame, size, &help_text(app.focus));
    }
}

fn render_entry_list(frame: &mut Frame, area: Rect, app: &App) {
    let list = app.browser.checklist().list();
    if list.filtered_indices().is_empty() {
        let empty = Paragraph::new("No items")
            .alignment(Alignment::Center)
            .style(Style::default().add_modifier(Modifier::DIM));
        frame.render_widget(empty, area);
        return;
    }

    let focused = app.focus == Focus::List;
    let lines = list
        .visible_rows()
        .into_iter()
        .map(|row| {
            entry_line(
                row.item,
                app.browser.checklist().is_selected(row.original_index),
                focused && row.highlighted,
                list.width(),
            )
        })
        .collect::<Vec<_>>();
    frame.render_widget(Paragraph::new(lines), area);
}

fn entry_line(entry: &Entry, selected: bool, highlighted: bool, width: usize) -> Line<'static> {
    let layout = row_layout(width);
    let base = if highlighted {
        Style::default()
            .bg(FOCUSED_BACKGROUND)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };

    let mark = if selected { CHECKMARK } else { ' ' };
    let mut spans = vec![Span::styled(
        format!("{mark:^width$}", width = layout.checkmark),
        base.fg(ORANGE),
    )];
    if layout.timestamp > 0 {
        let stamp = entry.timestamp.format(TIMESTAMP_FORMAT).to_string();
        spans.push(Span::styled(
            format!("{stamp:<width$}", width = layout.timestamp),
            base.fg(CYAN),
        ));
    }
    if layout.name > 0 {
        let name = truncate_with_ellipsis(&entry.name, layout.name);
        spans.push(Span::styled(
            format!("{name:<width$}", width = layout.name),
            base.fg(Color::White),
        ));
    }
    if layout.tags > 0 {
        let tags = truncate_with_ellipsis(&entry.tags_label(), layout.tags);
        spans.push(Span::styled(
            format!("{tags:<width$}", width = layout.tags),
            base.fg(RED),
        ));
    }

    let used = layout.checkmark + layout.timestamp + layout.name + layout.tags;
    if width > used {
        spans.push(Span::styled(" ".repeat(width - used), base));
    }
    Line::from(spans)
}

fn render_footer(frame: &mut Frame, area: Rect, app: &App) {
    let count = app.browser.selected_indices().len();
    if count == 0 {
        return;
    }
    let footer = Paragraph::new(Line::from(vec![
        Span::styled(count.to_string(), Style::default().fg(ORANGE)),
        Span::styled(" items selected", Style::default().fg(Color::White)),
    ]))
    .alignment(Alignment::Center);
    frame.render_widget(footer, area);
}

fn render_filter_label(frame: &mut Frame, area: Rect, app: &App) {
    let label = Paragraph::new("FILTERS")
        .style(Style::default().fg(CYAN).add_modifier(Modifier::BOLD));
    frame.render_widget(label, area);

    if let Some(status) = &app.status {
        let status = Paragraph::new(status.as_str())
            .alignment(Alignment::Right)
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(status, area);
    }
}

fn render_filter_pane(frame: &mut Frame, area: Rect, app: &App) {
    let editor = &app.editor;
    let (placard, placard_style) = match editor.mode {
        EditorMode::Normal => (" NORMAL ", Style::default().bg(CYAN).fg(Color::Black)),
        EditorMode::Insert => (" INSERT ", Style::default().bg(ORANGE).fg(Color::Black)),
    };
    let focused = app.focus == Focus::Filter;
    let block = Block::default()
        .borders(Borders::ALL)
        .title(Line::from(vec![
            Span::styled(placard, placard_style),
            Span::raw(" name / #tag "),
        ]))
        .border_style(if focused {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        });

    let inner_height = area.height.saturating_sub(2);
    let row = u16::try_from(editor.row).unwrap_or(u16::MAX);
    let offset = row.saturating_sub(inner_height.saturating_sub(1));
    let lines = editor
        .lines
        .iter()
        .map(|line| Line::from(line.as_str()))
        .collect::<Vec<_>>();
    let text = Paragraph::new(lines).block(block).scroll((offset, 0));
    frame.render_widget(text, area);

    if focused && area.width > 2 && area.height > 2 {
        let col = u16::try_from(editor.col).unwrap_or(u16::MAX);
        let cx = area.x + 1 + col.min(area.width - 3);
        let cy = area.y + 1 + (row - offset).min(inner_height.saturating_sub(1));
        frame.set_cursor(cx, cy);
    }
}

fn render_completions(frame: &mut Frame, area: Rect, app: &App) {
    let focused = app.focus == Focus::Filter;
    let width = usize::from(area.width.saturating_sub(2));
    let lines = app
        .completions
        .visible_rows()
        .into_iter()
        .map(|row| {
            let style = if focused && row.highlighted {
                Style::default()
                    .bg(FOCUSED_BACKGROUND)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(RED)
            };
            let tag = truncate_with_ellipsis(row.item, width);
            Line::from(Span::styled(format!("{tag:<width$}"), style))
        })
        .collect::<Vec<_>>();
    let block = Block::default().borders(Borders::ALL).title("Tags");
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_form_popup(frame: &mut Frame, area: Rect, app: &App) {
    let popup_area = overlay_rect(MAX_FORM_WIDTH.min(area.width), FORM_HEIGHT.min(area.height), area);
    frame.render_widget(Clear, popup_area);
    let block = Block::default().borders(Borders::ALL).title("Create Entry");

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .margin(1)
        .split(popup_area);

    let form = &app.form;
    let field_border = |field: FormField| {
        if form.field == field {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        }
    };

    let name_style = if form.name_is_valid() {
        Style::default().fg(Color::White)
    } else {
        Style::default().fg(RED)
    };
    let name = Paragraph::new(form.name.content.as_str())
        .style(name_style)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Name")
                .border_style(field_border(FormField::Name)),
        );
    frame.render_widget(name, chunks[0]);

    let tags = Paragraph::new(form.tags.content.as_str()).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Tags (comma separated)")
            .border_style(field_border(FormField::Tags)),
    );
    frame.render_widget(tags, chunks[1]);

    let help = Paragraph::new("Enter: Create | Tab: Next field | Esc: Cancel")
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, chunks[2]);

    let (input, input_area) = match form.field {
        FormField::Name => (&form.name, chunks[0]),
        FormField::Tags => (&form.tags, chunks[1]),
    };
    if input_area.width > 3 {
        let cursor = u16::try_from(input.cursor).unwrap_or(u16::MAX);
        let cx = input_area.x + 1 + cursor.min(input_area.width - 3);
        frame.set_cursor(cx, input_area.y + 1);
    }

    frame.render_widget(block, popup_area);
}

fn render_help_popup(frame: &mut Frame, area: Rect, content: &str) {
    let popup_area = centered_rect(60, 60, area);
    frame.render_widget(Clear, popup_area);
    let block = Block::default().borders(Borders::ALL).title("Help");
    let help = Paragraph::new(content).block(block).wrap(Wrap { trim: true });
    frame.render_widget(help, popup_area);
}

/// A `width` x `height` rect centred horizontally; vertically centred too,
/// but never starting below 30% of the screen height.
fn overlay_rect(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let centred = r.height.saturating_sub(height) / 2;
    let y = r.y + centred.min(r.height / 10 * 3);
    Rect::new(x, y, width, height)
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ]
            .as_ref(),
        )
        .split(r);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ]
            .as_ref(),
        )
        .split(popup_layout[1])[1]
}

fn restore_terminal(mut terminal: Terminal<ratatui::backend::CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn help_text(focus: Focus) -> String {
    match focus {
        Focus::List => {
            "j/k: move\nJ/K: page\ng/G: first/last\nx/space: toggle selection\nS/D: select/deselect visible\na/u: select/deselect all\n\\: edit filters\nc: clear filters\nn: new entry\n?: close help\nq: quit".into()
        }
        Focus::Filter => {
            "name lines: match entry names\n#lines: match tags\nesc: normal mode\ni/a/o: insert mode\ndd: delete line\nu: undo\ntab: complete tag\nctrl+j/k: move completion\n\\: back to list\n?/F1: close help".into()
        }
        Focus::Form => "tab: switch field\nenter: create\nesc: cancel\nF1: close help".into(),
    }
}

fn char_len(value: &str) -> usize {
    value.chars().count()
}

fn byte_index_at_char(value: &str, char_idx: usize) -> usize {
    value
        .char_indices()
        .nth(char_idx)
        .map_or(value.len(), |(idx, _)| idx)
}

fn insert_char_at(value: &mut String, char_idx: usize, ch: char) {
    let idx = byte_index_at_char(value, char_idx);
    value.insert(idx, ch);
}

fn remove_char_at(value: &mut String, char_idx: usize) {
    if char_idx >= char_len(value) {
        return;
    }
    let start = byte_index_at_char(value, char_idx);
    let end = byte_index_at_char(value, char_idx + 1);
    value.replace_range(start..end, "");
}
