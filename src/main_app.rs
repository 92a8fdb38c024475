use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use ratatui::{
    Frame, Terminal,
    backend::Backend,
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
};

use crate::error::NoterResult;
use crate::event_source::{Event, EventSource, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crate::notification::{NotificationLevel, NotificationManager};
use crate::org::OrgDocument;
use crate::prompt::Prompter;
use crate::session::SessionId;
use crate::settings::{NotesSide, Settings};
use crate::sync::{Noter, StartMode};
use crate::theme::current_theme;
use crate::workspace::SurfaceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusedPanel {
    Notes,
    Viewer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppAction {
    Quit,
}

pub struct App {
    pub noter: Noter,
    /// Surface on the notes file as opened from the command line.
    pub notes_surface: SurfaceId,
    pub focused_panel: FocusedPanel,
    pub notifications: NotificationManager,
}

impl App {
    pub fn new(document: OrgDocument) -> Self {
        Self::with_noter(Noter::new(), document)
    }

    pub fn with_settings(document: OrgDocument, settings: Settings) -> Self {
        Self::with_noter(Noter::with_settings(settings), document)
    }

    fn with_noter(mut noter: Noter, document: OrgDocument) -> Self {
        let notes_surface = noter.open_notes(document);
        noter.workspace_mut().select(notes_surface);
        Self {
            noter,
            notes_surface,
            focused_panel: FocusedPanel::Notes,
            notifications: NotificationManager::new(),
        }
    }

    pub fn open(path: &Path) -> Result<Self> {
        let document = OrgDocument::open(path)
            .with_context(|| format!("Failed to open notes file {}", path.display()))?;
        info!("Opened notes file {path:?}");
        Ok(Self::new(document))
    }

    /// Puts the point on the first heading titled `title`.
    pub fn goto_heading(&mut self, title: &str) -> bool {
        let Some(surface) = self.noter.workspace_mut().notes_mut(self.notes_surface) else {
            return false;
        };
        let begin = surface
            .document()
            .borrow()
            .headlines()
            .into_iter()
            .find(|h| h.title.trim() == title.trim())
            .map(|h| h.begin);
        match begin {
            Some(begin) => {
                surface.set_point(begin);
                surface.set_scroll_anchor(begin);
                true
            }
            None => false,
        }
    }

    /// The session shown on screen: the one owning the selected surface,
    /// else the most recent one.
    pub fn active_session(&self) -> Option<SessionId> {
        let sessions = self.noter.sessions();
        self.noter
            .workspace()
            .selected()
            .and_then(|surface| sessions.find_by_surface(surface))
            .or_else(|| sessions.iter().next().map(|s| s.id))
    }

    fn focused_notes_surface(&self) -> SurfaceId {
        self.active_session()
            .and_then(|id| self.noter.sessions().get(id))
            .map(|s| s.notes)
            .unwrap_or(self.notes_surface)
    }

    fn viewer_surface(&self) -> Option<SurfaceId> {
        self.active_session()
            .and_then(|id| self.noter.sessions().get(id))
            .map(|s| s.viewer)
    }

    pub fn save(&mut self) -> Result<()> {
        let Some(surface) = self.noter.workspace().notes(self.notes_surface) else {
            return Ok(());
        };
        let document = surface.document().clone();
        let mut doc = document.borrow_mut();
        if doc.path().is_none() || !doc.is_modified() {
            return Ok(());
        }
        doc.save().context("Failed to save notes")?;
        self.notifications.info("Notes saved");
        Ok(())
    }

    fn save_and_report(&mut self) {
        if let Err(e) = self.save() {
            warn!("{e:#}");
            self.notifications.error(format!("{e:#}"));
        }
    }

    /// Keeps the focused pane in line with the selected surface.
    fn sync_focus(&mut self) {
        let workspace = self.noter.workspace();
        self.focused_panel = match workspace.selected() {
            Some(id) if workspace.viewer(id).is_some() => FocusedPanel::Viewer,
            _ => FocusedPanel::Notes,
        };
        if workspace.selected().is_none() {
            let main = self.notes_surface;
            self.noter.workspace_mut().select(main);
        }
    }

    pub fn handle_key_event(
        &mut self,
        key: KeyEvent,
        prompter: &mut dyn Prompter,
    ) -> Option<AppAction> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        match key.code {
            KeyCode::Char('q') if !ctrl => {
                self.save_and_report();
                return Some(AppAction::Quit);
            }
            KeyCode::Char('s') if ctrl => {
                self.save_and_report();
                return None;
            }
            KeyCode::Tab => {
                self.switch_focus();
                return None;
            }
            _ => {}
        }

        let result = match self.focused_panel {
            FocusedPanel::Notes => self.handle_notes_key(key, ctrl, prompter),
            FocusedPanel::Viewer => self.handle_viewer_key(key, ctrl, prompter),
        };
        if let Err(e) = result {
            self.notifications.report(&e);
        }
        self.sync_focus();
        None
    }

    fn switch_focus(&mut self) {
        let Some(session) = self.active_session().and_then(|id| self.noter.sessions().get(id))
        else {
            return;
        };
        let target = match self.focused_panel {
            FocusedPanel::Notes => session.viewer,
            FocusedPanel::Viewer => session.notes,
        };
        self.noter.workspace_mut().select(target);
        self.sync_focus();
    }

    fn handle_notes_key(
        &mut self,
        key: KeyEvent,
        ctrl: bool,
        prompter: &mut dyn Prompter,
    ) -> NoterResult<()> {
        let surface = self.focused_notes_surface();
        match key.code {
            KeyCode::Char('k') if ctrl => self.kill(Some(surface), true, prompter),
            KeyCode::Char('j') | KeyCode::Down => {
                self.move_point(surface, 1);
                Ok(())
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.move_point(surface, -1);
                Ok(())
            }
            KeyCode::Char('n') => self.start(surface, StartMode::SearchAncestors, prompter),
            KeyCode::Char('N') => self.start(surface, StartMode::CurrentHeadingOnly, prompter),
            KeyCode::Char('i') => self.noter.insert_note(surface, false, prompter),
            KeyCode::Char('I') => self.noter.insert_note(surface, true, prompter),
            KeyCode::Char('[') => self.noter.sync_to_previous(surface, prompter),
            KeyCode::Char('.') => self.noter.sync_to_current(surface, prompter),
            KeyCode::Char(']') => self.noter.sync_to_next(surface, prompter),
            KeyCode::Char('K') => self.kill(Some(surface), false, prompter),
            _ => Ok(()),
        }
    }

    fn handle_viewer_key(
        &mut self,
        key: KeyEvent,
        ctrl: bool,
        prompter: &mut dyn Prompter,
    ) -> NoterResult<()> {
        let Some(viewer) = self.viewer_surface() else {
            return Ok(());
        };
        let Some((page, count)) = self
            .noter
            .workspace()
            .viewer(viewer)
            .map(|v| (v.current_page(), v.page_count()))
        else {
            return Ok(());
        };

        let target = match key.code {
            KeyCode::Char('k') if ctrl => return self.kill(Some(viewer), true, prompter),
            KeyCode::Char('j') | KeyCode::Char(' ') | KeyCode::PageDown | KeyCode::Down => page + 1,
            KeyCode::Char('k') | KeyCode::PageUp | KeyCode::Up => page.saturating_sub(1).max(1),
            KeyCode::Char('g') => 1,
            KeyCode::Char('G') => count,
            KeyCode::Char('i') => return self.noter.insert_note(viewer, false, prompter),
            KeyCode::Char('I') => return self.noter.insert_note(viewer, true, prompter),
            KeyCode::Char('K') => return self.kill(Some(viewer), false, prompter),
            _ => return Ok(()),
        };
        debug!("Viewer page {page} -> {target}");
        self.noter.goto_page(viewer, target);
        Ok(())
    }

    fn move_point(&mut self, surface: SurfaceId, delta: isize) {
        if let Some(notes) = self.noter.workspace_mut().notes_mut(surface) {
            notes.move_lines(delta);
        }
    }

    fn start(
        &mut self,
        surface: SurfaceId,
        mode: StartMode,
        prompter: &mut dyn Prompter,
    ) -> NoterResult<()> {
        let id = self.noter.start(surface, mode, prompter)?;
        if let Some(session) = self.noter.sessions().get(id) {
            let label = session.label();
            self.notifications.info(label);
        }
        Ok(())
    }

    fn kill(
        &mut self,
        surface: Option<SurfaceId>,
        disambiguate: bool,
        prompter: &mut dyn Prompter,
    ) -> NoterResult<()> {
        self.noter.kill_session(surface, disambiguate, prompter)?;
        self.notifications.info("Session killed");
        Ok(())
    }

    pub fn draw(&self, f: &mut Frame) {
        let theme = current_theme();
        f.render_widget(
            Block::default().style(Style::default().bg(theme.background)),
            f.area(),
        );

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(3), Constraint::Length(1)])
            .split(f.area());

        let session = self
            .active_session()
            .and_then(|id| self.noter.sessions().get(id));
        match session {
            Some(session) => {
                let settings = self.noter.settings();
                let notes_percent = settings.notes_split_percent;
                let viewer_constraint = Constraint::Percentage(100 - notes_percent);
                let notes_constraint = Constraint::Percentage(notes_percent);
                let (constraints, notes_idx) = match settings.notes_side {
                    NotesSide::Left => ([notes_constraint, viewer_constraint], 0),
                    NotesSide::Right => ([viewer_constraint, notes_constraint], 1),
                };
                let panes = Layout::default()
                    .direction(Direction::Horizontal)
                    .constraints(constraints)
                    .split(rows[0]);

                self.render_viewer(
                    f,
                    panes[1 - notes_idx],
                    session.viewer,
                    self.focused_panel == FocusedPanel::Viewer,
                );
                self.render_notes(
                    f,
                    panes[notes_idx],
                    session.notes,
                    self.focused_panel == FocusedPanel::Notes,
                );
            }
            None => self.render_notes(f, rows[0], self.notes_surface, true),
        }

        self.render_status(f, rows[1]);
    }

    fn pane_block(title: String, focused: bool) -> Block<'static> {
        let theme = current_theme();
        let border = if focused {
            theme.focused_border
        } else {
            theme.muted
        };
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .title(title)
    }

    fn render_viewer(&self, f: &mut Frame, area: Rect, surface: SurfaceId, focused: bool) {
        let Some(viewer) = self.noter.workspace().viewer(surface) else {
            return;
        };
        let name = viewer
            .path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let title = format!(
            " {name} page {}/{} ",
            viewer.current_page(),
            viewer.page_count()
        );
        let lines: Vec<Line> = viewer.page_lines().into_iter().map(Line::from).collect();
        let paragraph = Paragraph::new(lines)
            .style(Style::default().fg(current_theme().foreground))
            .block(Self::pane_block(title, focused));
        f.render_widget(paragraph, area);
    }

    fn render_notes(&self, f: &mut Frame, area: Rect, surface: SurfaceId, focused: bool) {
        let theme = current_theme();
        let Some(notes) = self.noter.workspace().notes(surface) else {
            return;
        };
        let doc = notes.document().borrow();
        let text = doc.text();
        let point = notes.point();
        let anchor = notes.scroll_anchor();

        let name = doc
            .path()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "notes".to_string());
        let modified = if doc.is_modified() { " [+]" } else { "" };
        let block = Self::pane_block(format!(" {name}{modified} "), focused);

        let height = area.height.saturating_sub(2) as usize;
        let top = visible_start(text, point, anchor, height);

        let mut lines = Vec::with_capacity(height);
        let mut line_start = top;
        for raw in text[top..].split('\n').take(height) {
            let line_end = line_start + raw.len();
            let mut style = Style::default().fg(theme.foreground);
            if raw.starts_with('*') {
                let color = if notes.is_expanded(line_start) {
                    theme.revealed
                } else {
                    theme.heading
                };
                style = style.fg(color).add_modifier(Modifier::BOLD);
            }
            if doc.read_only_len(line_start..line_end.max(line_start + 1)) > 0 {
                style = style.fg(theme.muted).add_modifier(Modifier::ITALIC);
            }

            if focused && (line_start..=line_end).contains(&point) {
                let (before, rest) = raw.split_at(point - line_start);
                let mut chars = rest.chars();
                let cursor = chars.next().map(String::from).unwrap_or_else(|| " ".into());
                lines.push(Line::from(vec![
                    Span::styled(before.to_string(), style),
                    Span::styled(cursor, style.add_modifier(Modifier::REVERSED)),
                    Span::styled(chars.as_str().to_string(), style),
                ]));
            } else {
                lines.push(Line::from(Span::styled(raw.to_string(), style)));
            }
            line_start = line_end + 1;
        }

        f.render_widget(Paragraph::new(lines).block(block), area);
    }

    fn render_status(&self, f: &mut Frame, area: Rect) {
        let theme = current_theme();
        let line = match self.notifications.current() {
            Some(notification) => {
                let color = match notification.level {
                    NotificationLevel::Info => theme.info,
                    NotificationLevel::Warning => theme.warning,
                    NotificationLevel::Error => theme.error,
                };
                Line::from(Span::styled(
                    notification.message.clone(),
                    Style::default().fg(color),
                ))
            }
            None => {
                let help = match self.focused_panel {
                    FocusedPanel::Notes => {
                        "n/N:start  i/I:insert note  [ . ]:prev/current/next  K:kill  Tab:switch  q:quit"
                    }
                    FocusedPanel::Viewer => {
                        "j/k:page  g/G:first/last  i/I:insert note  K:kill  Tab:switch  q:quit"
                    }
                };
                Line::from(Span::styled(help, Style::default().fg(theme.muted)))
            }
        };
        f.render_widget(Paragraph::new(line), area);
    }
}

fn line_start_of(text: &str, pos: usize) -> usize {
    text[..pos].rfind('\n').map_or(0, |i| i + 1)
}

/// Offset of the first line shown in a notes pane `height` lines tall.
///
/// Scrolling starts at the anchor's line while the point is on screen from
/// there; otherwise the point's line is centred. Only the lines between the
/// two are scanned.
fn visible_start(text: &str, point: usize, anchor: usize, height: usize) -> usize {
    let top = line_start_of(text, anchor);
    let on_screen = point >= top
        && text[top..point]
            .bytes()
            .filter(|b| *b == b'\n')
            .nth(height.max(1) - 1)
            .is_none();
    if on_screen {
        return top;
    }

    let mut start = line_start_of(text, point);
    for _ in 0..height / 2 {
        if start == 0 {
            break;
        }
        start = line_start_of(text, start - 1);
    }
    start
}

/// Blocking prompts drawn over the last rendered frame.
pub struct TerminalPrompter<'a, B: Backend> {
    terminal: &'a mut Terminal<B>,
    events: &'a mut dyn EventSource,
    backdrop: Buffer,
}

impl<'a, B: Backend> TerminalPrompter<'a, B> {
    pub fn new(terminal: &'a mut Terminal<B>, events: &'a mut dyn EventSource, backdrop: Buffer) -> Self {
        Self {
            terminal,
            events,
            backdrop,
        }
    }

    fn render(&mut self, lines: Vec<Line<'static>>) {
        let backdrop = &self.backdrop;
        let result = self.terminal.draw(|f| {
            *f.buffer_mut() = backdrop.clone();
            let full = f.area();
            let height = (lines.len() as u16 + 2).min(full.height);
            let area = Rect::new(full.x, full.bottom().saturating_sub(height), full.width, height);
            f.render_widget(Clear, area);
            let block = Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(current_theme().focused_border))
                .style(Style::default().bg(current_theme().background));
            f.render_widget(Paragraph::new(lines).block(block), area);
        });
        if result.is_err() {
            warn!("Failed to draw prompt");
        }
    }

    /// Next key press; `None` when input has run out or failed.
    fn next_key(&mut self) -> Option<KeyEvent> {
        loop {
            if self.events.is_exhausted() {
                return None;
            }
            if !self.events.poll(Duration::from_millis(250)).ok()? {
                continue;
            }
            if let Event::Key(key) = self.events.read().ok()? {
                if key.kind == KeyEventKind::Press {
                    return Some(key);
                }
            }
        }
    }

    fn read_line(&mut self, prompt: &str) -> Option<String> {
        let mut input = String::new();
        loop {
            self.render(vec![Line::from(vec![
                Span::styled(prompt.to_string(), Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(input.clone()),
                Span::styled(" ", Style::default().add_modifier(Modifier::REVERSED)),
            ])]);
            let key = self.next_key()?;
            match key.code {
                KeyCode::Enter => return Some(input),
                KeyCode::Esc => return None,
                KeyCode::Char('g') if key.modifiers.contains(KeyModifiers::CONTROL) => return None,
                KeyCode::Backspace => {
                    input.pop();
                }
                KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => input.push(c),
                _ => {}
            }
        }
    }
}

impl<B: Backend> Prompter for TerminalPrompter<'_, B> {
    fn choose(&mut self, prompt: &str, choices: &[String], default: Option<usize>) -> Option<usize> {
        if choices.is_empty() {
            return None;
        }
        let mut selected = default.unwrap_or(0).min(choices.len() - 1);
        loop {
            let theme = current_theme();
            let mut lines = vec![Line::from(Span::styled(
                prompt.to_string(),
                Style::default().add_modifier(Modifier::BOLD),
            ))];
            lines.extend(choices.iter().enumerate().map(|(idx, choice)| {
                let style = if idx == selected {
                    Style::default().bg(theme.selection).fg(theme.foreground)
                } else {
                    Style::default().fg(theme.foreground)
                };
                Line::from(Span::styled(format!("  {choice}"), style))
            }));
            self.render(lines);

            let key = self.next_key()?;
            match key.code {
                KeyCode::Enter => return Some(selected),
                KeyCode::Esc | KeyCode::Char('q') => return None,
                KeyCode::Char('j') | KeyCode::Down => {
                    selected = (selected + 1).min(choices.len() - 1);
                }
                KeyCode::Char('k') | KeyCode::Up => selected = selected.saturating_sub(1),
                _ => {}
            }
        }
    }

    fn read_string(&mut self, prompt: &str) -> Option<String> {
        self.read_line(prompt)
    }

    fn confirm(&mut self, prompt: &str) -> bool {
        loop {
            self.render(vec![Line::from(format!("{prompt}(y/n)"))]);
            match self.next_key().map(|key| key.code) {
                Some(KeyCode::Char('y')) | Some(KeyCode::Char('Y')) => return true,
                Some(KeyCode::Char('n')) | Some(KeyCode::Char('N')) | Some(KeyCode::Esc) | None => {
                    return false;
                }
                _ => {}
            }
        }
    }

    fn read_file_path(&mut self, prompt: &str, start_dir: Option<&Path>) -> Option<PathBuf> {
        let prompt = match start_dir {
            Some(dir) => format!("{prompt}({}) ", dir.display()),
            None => prompt.to_string(),
        };
        let input = self.read_line(&prompt)?;
        let input = input.trim();
        (!input.is_empty()).then(|| PathBuf::from(input))
    }
}

pub fn run_app_with_event_source<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    event_source: &mut dyn EventSource,
) -> Result<()>
where
    B::Error: Send + Sync + 'static,
{
    let tick_rate = Duration::from_millis(100);
    let mut backdrop = terminal.draw(|f| app.draw(f))?.buffer.clone();

    loop {
        let mut needs_redraw = false;

        if event_source.poll(tick_rate)? {
            if let Event::Key(key) = event_source.read()? {
                let action = {
                    let mut prompter =
                        TerminalPrompter::new(terminal, event_source, backdrop.clone());
                    app.handle_key_event(key, &mut prompter)
                };
                if action == Some(AppAction::Quit) {
                    info!("Quitting");
                    return Ok(());
                }
            }
            needs_redraw = true;
        } else if event_source.is_exhausted() {
            return Ok(());
        }

        if app.notifications.update() {
            needs_redraw = true;
        }
        if needs_redraw {
            backdrop = terminal.draw(|f| app.draw(f))?.buffer.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered_lines(count: usize) -> String {
        (0..count).map(|n| format!("line {n}\n")).collect()
    }

    #[test]
    fn test_visible_start_keeps_anchor_while_point_on_screen() {
        let text = numbered_lines(100);
        let anchor = text.find("line 20").unwrap();
        let point = text.find("line 29").unwrap();
        assert_eq!(visible_start(&text, point, anchor + 2, 10), anchor);
    }

    #[test]
    fn test_visible_start_centres_point_off_screen() {
        let text = numbered_lines(100);
        let anchor = text.find("line 20").unwrap();

        let below = text.find("line 30").unwrap();
        assert_eq!(visible_start(&text, below, anchor, 10), text.find("line 25").unwrap());

        let above = text.find("line 3\n").unwrap();
        assert_eq!(visible_start(&text, above, anchor, 10), 0);
    }
}
