use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use pagemark_engine::NoteLink;
use pagemark_engine::editing::Annotator;
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
};
use std::io::{Stdout, stdout};

use crate::render::{RenderedPage, TextPane};

struct App {
    title: String,
    annotator: Annotator,
    pane: TextPane,
    links: Vec<NoteLink>,
    link_list_state: ListState,
}

impl App {
    fn new(title: String, mut annotator: Annotator) -> Self {
        let links = annotator.note_links().to_vec();
        let pane = TextPane::new(RenderedPage::from_tree(annotator.tree()));
        let mut link_list_state = ListState::default();
        if !links.is_empty() {
            link_list_state.select(Some(0));
        }

        Self {
            title,
            annotator,
            pane,
            links,
            link_list_state,
        }
    }

    fn next_link(&mut self) {
        if self.links.is_empty() {
            return;
        }
        let i = match self.link_list_state.selected() {
            Some(i) => (i + 1) % self.links.len(),
            None => 0,
        };
        self.link_list_state.select(Some(i));
    }

    fn previous_link(&mut self) {
        if self.links.is_empty() {
            return;
        }
        let i = match self.link_list_state.selected() {
            Some(0) | None => self.links.len() - 1,
            Some(i) => i - 1,
        };
        self.link_list_state.select(Some(i));
    }

    fn go_to_selected_note(&mut self) {
        if let Some(index) = self.link_list_state.selected()
            && let Some(link) = self.links.get(index)
            && !self.annotator.go_to_note(link.id, &mut self.pane)
        {
            log::warn!("note {} is no longer on the page", link.id);
        }
    }
}

/// Open the terminal viewer on an annotated page until the user quits.
pub fn run_viewer(title: String, annotator: Annotator) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(title, annotator);
    let res = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    res
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Down | KeyCode::Char('j') => app.next_link(),
                KeyCode::Up | KeyCode::Char('k') => app.previous_link(),
                KeyCode::Enter | KeyCode::Char(' ') => app.go_to_selected_note(),
                KeyCode::PageDown | KeyCode::Char('d') => app.pane.scroll_by(10),
                KeyCode::PageUp | KeyCode::Char('u') => app.pane.scroll_by(-10),
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)].as_ref())
        .split(f.area());
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(70), Constraint::Percentage(30)].as_ref())
        .split(rows[0]);

    // Page text
    let scroll = u16::try_from(app.pane.scroll()).unwrap_or(u16::MAX);
    let content = Paragraph::new(app.pane.rendered().lines().to_vec())
        .block(Block::default().borders(Borders::ALL).title(app.title.as_str()))
        .wrap(ratatui::widgets::Wrap { trim: true })
        .scroll((scroll, 0));
    f.render_widget(content, chunks[0]);

    // Note links
    let link_items: Vec<ListItem> = app
        .links
        .iter()
        .map(|link| ListItem::new(Line::from(Span::raw(link.text.clone()))))
        .collect();
    let links = List::new(link_items)
        .block(Block::default().borders(Borders::ALL).title("Notes"))
        .highlight_style(Style::default().bg(Color::Yellow).fg(Color::Black));
    f.render_stateful_widget(links, chunks[1], &mut app.link_list_state);

    let help = Paragraph::new(Line::from(vec![
        Span::raw("q: Quit | "),
        Span::raw("↑/k ↓/j: Select note | "),
        Span::raw("Enter: Go to note | "),
        Span::raw("PgUp/u PgDn/d: Scroll"),
    ]));
    f.render_widget(help, rows[1]);
}
