//! Full-screen browse mode.
//!
//! Two focus states share one screen: the search field (typing feeds the
//! debounced suggestion search) and the chart (arrows, paging and the mouse
//! wheel move the visible window). Loads run on their own tasks so input
//! keeps flowing while a request is out.

use std::io::{self, Stdout};

use anyhow::Result;
use crossterm::{
    event::{
        DisableMouseCapture, EnableMouseCapture, Event, EventStream, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use deichwetter_core::{Config, Dashboard, LoadOutcome, PendingLoad, ScrollKey, SuggestionFeed, SuggestionUpdate};
use futures::StreamExt;
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Position, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::render;

/// One wheel notch, in the units the wheel handler expects.
const WHEEL_NOTCH: f64 = 100.0;
const MAX_SUGGESTIONS_SHOWN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Search,
    Chart,
}

/// What a key press asks the browse loop to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    None,
    Quit,
    Focus(Focus),
    Scroll(ScrollKey),
    Relocate,
    TypeChar(char),
    Backspace,
    HighlightPrev,
    HighlightNext,
    Select,
}

fn map_key(focus: Focus, key: KeyEvent) -> Action {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Action::Quit;
    }

    match focus {
        Focus::Search => match key.code {
            KeyCode::Esc | KeyCode::Tab => Action::Focus(Focus::Chart),
            KeyCode::Enter => Action::Select,
            KeyCode::Up => Action::HighlightPrev,
            KeyCode::Down => Action::HighlightNext,
            KeyCode::Backspace => Action::Backspace,
            KeyCode::Char(c) => Action::TypeChar(c),
            _ => Action::None,
        },
        Focus::Chart => match key.code {
            KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
            KeyCode::Char('/') | KeyCode::Char('s') | KeyCode::Tab => Action::Focus(Focus::Search),
            KeyCode::Char('l') => Action::Relocate,
            KeyCode::Left => Action::Scroll(ScrollKey::StepBack),
            KeyCode::Right => Action::Scroll(ScrollKey::StepForward),
            KeyCode::PageUp => Action::Scroll(ScrollKey::PageBack),
            KeyCode::PageDown | KeyCode::Char(' ') => Action::Scroll(ScrollKey::PageForward),
            KeyCode::Home => Action::Scroll(ScrollKey::Start),
            KeyCode::End => Action::Scroll(ScrollKey::End),
            _ => Action::None,
        },
    }
}

/// Whether the screen needs drawing after an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Quit,
    Redraw,
    Idle,
}

/// Owns the terminal and restores it even when the loop bails out with an error.
struct Tui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl Tui {
    fn enter() -> Result<Self> {
        terminal::enable_raw_mode()?;
        let mut out = io::stdout();
        execute!(out, EnterAlternateScreen, EnableMouseCapture)?;
        let mut terminal = Terminal::new(CrosstermBackend::new(out))?;
        terminal.clear()?;
        Ok(Self { terminal })
    }
}

impl Drop for Tui {
    fn drop(&mut self) {
        let _ = execute!(self.terminal.backend_mut(), DisableMouseCapture, LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
        let _ = self.terminal.show_cursor();
    }
}

struct Browser {
    dashboard: Dashboard,
    focus: Focus,
    feed: SuggestionFeed,
    loads: UnboundedSender<LoadOutcome>,
    chart_area: Rect,
}

pub async fn run(dashboard: Dashboard, config: &Config, initial: PendingLoad) -> Result<()> {
    let (feed, updates) = SuggestionFeed::spawn(dashboard.geocoder(), config.chart.debounce());
    let (loads, outcomes) = mpsc::unbounded_channel();

    let mut browser = Browser { dashboard, focus: Focus::Chart, feed, loads, chart_area: Rect::default() };
    browser.spawn_load(initial);

    let mut tui = Tui::enter()?;
    browser.event_loop(&mut tui, updates, outcomes).await
}

impl Browser {
    async fn event_loop(
        &mut self,
        tui: &mut Tui,
        mut updates: UnboundedReceiver<SuggestionUpdate>,
        mut outcomes: UnboundedReceiver<LoadOutcome>,
    ) -> Result<()> {
        let mut events = EventStream::new();
        let mut dirty = true;

        loop {
            if dirty {
                tui.terminal.draw(|f| self.chart_area = draw(f, &self.dashboard, self.focus))?;
                dirty = false;
            }

            tokio::select! {
                Some(update) = updates.recv() => {
                    dirty = self.dashboard.search_box_mut().apply(update);
                }
                Some(outcome) = outcomes.recv() => {
                    self.finish_load(outcome);
                    dirty = true;
                }
                event = events.next() => match event {
                    Some(Ok(event)) => match self.handle_event(event) {
                        Step::Quit => return Ok(()),
                        Step::Redraw => dirty = true,
                        Step::Idle => {}
                    },
                    Some(Err(e)) => return Err(e.into()),
                    None => return Ok(()),
                },
            }
        }
    }

    fn spawn_load(&self, pending: PendingLoad) {
        let loads = self.loads.clone();
        tokio::spawn(async move {
            if loads.send(pending.run().await).is_err() {
                tracing::debug!("browse screen closed before the load finished");
            }
        });
    }

    fn finish_load(&mut self, outcome: LoadOutcome) {
        self.dashboard.apply(outcome);
        // Nothing to look at: let the user search instead.
        if !self.dashboard.is_loading() && self.dashboard.location().is_none() {
            self.focus = Focus::Search;
        }
    }

    fn handle_event(&mut self, event: Event) -> Step {
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => self.handle_key(key),
            Event::Mouse(mouse) => self.handle_mouse(mouse),
            Event::Resize(..) => Step::Redraw,
            _ => Step::Idle,
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Step {
        match map_key(self.focus, key) {
            Action::None => return Step::Idle,
            Action::Quit => return Step::Quit,
            Action::Focus(next) => self.focus = next,
            Action::Scroll(k) => {
                self.dashboard.scroll_key(k);
            }
            Action::Relocate => {
                let pending = self.dashboard.start_locate();
                self.spawn_load(pending);
            }
            Action::TypeChar(c) => {
                self.dashboard.search_box_mut().push_char(c);
                self.feed.push(self.dashboard.search_box().text());
            }
            Action::Backspace => {
                if self.dashboard.search_box_mut().pop_char() {
                    self.feed.push(self.dashboard.search_box().text());
                }
            }
            Action::HighlightPrev => self.dashboard.search_box_mut().highlight_prev(),
            Action::HighlightNext => self.dashboard.search_box_mut().highlight_next(),
            Action::Select => {
                let Some(index) = self.dashboard.search_box().highlighted() else {
                    return Step::Idle;
                };
                if let Some(pending) = self.dashboard.start_select(index) {
                    self.feed.reset();
                    self.spawn_load(pending);
                    self.focus = Focus::Chart;
                }
            }
        }
        Step::Redraw
    }

    fn handle_mouse(&mut self, MouseEvent { kind, column, row, .. }: MouseEvent) -> Step {
        self.dashboard.set_pointer_over_chart(self.chart_area.contains(Position::new(column, row)));

        let before = self.dashboard.viewport();
        match kind {
            MouseEventKind::ScrollDown => {
                self.dashboard.scroll_wheel(WHEEL_NOTCH);
            }
            MouseEventKind::ScrollUp => {
                self.dashboard.scroll_wheel(-WHEEL_NOTCH);
            }
            _ => return Step::Idle,
        }

        if self.dashboard.viewport() != before { Step::Redraw } else { Step::Idle }
    }
}

fn border_style(focused: bool) -> Style {
    if focused { Style::default().fg(Color::Cyan) } else { Style::default().fg(Color::DarkGray) }
}

/// Draw the whole screen and return the area the chart occupies.
fn draw(f: &mut Frame, dashboard: &Dashboard, focus: Focus) -> Rect {
    let search = dashboard.search_box();
    let shown = search.suggestions().len().min(MAX_SUGGESTIONS_SHOWN) as u16;
    let list_height = if shown == 0 { 0 } else { shown + 2 };

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(list_height),
            Constraint::Length(5),
            Constraint::Min(8),
            Constraint::Length(1),
        ])
        .split(f.area());

    let search_field = Paragraph::new(search.text()).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Search ")
            .border_style(border_style(focus == Focus::Search)),
    );
    f.render_widget(search_field, rows[0]);
    if focus == Focus::Search {
        let x = rows[0].x + 1 + search.text().chars().count() as u16;
        f.set_cursor_position(Position::new(x.min(rows[0].right().saturating_sub(2)), rows[0].y + 1));
    }

    if shown > 0 {
        let items: Vec<ListItem> = search
            .suggestions()
            .iter()
            .take(MAX_SUGGESTIONS_SHOWN)
            .map(|c| ListItem::new(c.display_name.as_str()))
            .collect();
        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).border_style(border_style(focus == Focus::Search)))
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .highlight_symbol("› ");
        let mut state = ListState::default().with_selected(search.highlighted());
        f.render_stateful_widget(list, rows[1], &mut state);
    }

    let now = render::current_paragraph(dashboard.location(), dashboard.current())
        .block(Block::default().borders(Borders::ALL).title(" Now "));
    f.render_widget(now, rows[2]);

    let chart_block = Block::default()
        .borders(Borders::ALL)
        .title(" Hourly forecast ")
        .border_style(border_style(focus == Focus::Chart));
    match dashboard.frame() {
        Some(frame) => render::render_chart(&frame, rows[3], f.buffer_mut(), chart_block),
        None => f.render_widget(Paragraph::new("No hourly forecast loaded.").block(chart_block), rows[3]),
    }

    let mut footer = Vec::new();
    if dashboard.is_loading() {
        footer.push(Span::styled(" Loading… ", Style::default().add_modifier(Modifier::REVERSED)));
        footer.push(Span::raw(" "));
    }
    footer.push(Span::styled(
        match focus {
            Focus::Search => "type to search · ↑/↓ choose · enter select · tab/esc chart · ctrl-c quit",
            Focus::Chart => "←/→ step · pgup/pgdn page · home/end · wheel scroll · / search · l locate · q quit",
        },
        Style::default().fg(Color::Gray),
    ));
    f.render_widget(Paragraph::new(Line::from(footer)), rows[4]);

    rows[3]
}
