use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;
use std::sync::Arc;

use chrono::NaiveDate;
use redemption_tracker::{period_id, Card, CardRepository, Redemption};

/// One table line: a redemption and the card that owns it
#[derive(Debug, Clone)]
pub struct RedemptionRow {
    pub card_id: String,
    pub card_name: String,
    pub redemption: Redemption,
}

pub struct App {
    repo: Arc<CardRepository>,
    pub cards: Vec<Card>,
    pub rows: Vec<RedemptionRow>,
    pub state: TableState,
    pub show_detail: bool,
    pub message: Option<String>,
    pub total_this_year: f64,
    /// Date used for the Period column, read from the repository's clock
    pub today: NaiveDate,
}

impl App {
    pub fn new(repo: Arc<CardRepository>) -> Self {
        let today = repo.today();
        let mut app = Self {
            repo,
            cards: Vec::new(),
            rows: Vec::new(),
            state: TableState::default(),
            show_detail: false,
            message: None,
            total_this_year: 0.0,
            today,
        };
        app.refresh();
        if !app.rows.is_empty() {
            app.state.select(Some(0));
        }
        app
    }

    /// Reload cards from the repository, keeping the selection in range
    pub fn refresh(&mut self) {
        self.today = self.repo.today();
        self.cards = self.repo.list_cards();
        self.total_this_year = self.repo.current_year_reimbursement_total();
        self.rows = self
            .cards
            .iter()
            .flat_map(|card| {
                card.redemptions.iter().map(move |r| RedemptionRow {
                    card_id: card.id.clone(),
                    card_name: card.name.clone(),
                    redemption: r.clone(),
                })
            })
            .collect();

        match self.state.selected() {
            _ if self.rows.is_empty() => self.state.select(None),
            Some(i) if i >= self.rows.len() => self.state.select(Some(self.rows.len() - 1)),
            None => self.state.select(Some(0)),
            Some(_) => {}
        }
    }

    pub fn selected_row(&self) -> Option<&RedemptionRow> {
        self.state.selected().and_then(|i| self.rows.get(i))
    }

    pub fn selected_card(&self) -> Option<&Card> {
        let row = self.selected_row()?;
        self.cards.iter().find(|c| c.id == row.card_id)
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    /// Flip the checked state of the selected redemption
    pub fn toggle_selected(&mut self) {
        let Some(row) = self.selected_row().cloned() else {
            return;
        };
        let want = !row.redemption.checked;

        self.message = match self
            .repo
            .set_redemption_checked(&row.card_id, &row.redemption.id, want)
        {
            Some(r) => Some(format!(
                "{} {}",
                if r.checked { "Checked" } else { "Unchecked" },
                r.name
            )),
            None => Some("Redemption no longer exists".to_string()),
        };
        self.refresh();
    }

    pub fn run_reset(&mut self) {
        let outcome = self.repo.run_reset();
        self.message = Some(if outcome.changed {
            format!("Reset: {} unchecked", outcome.unchecked)
        } else {
            "Nothing to reset".to_string()
        });
        self.refresh();
    }

    pub fn next(&mut self) {
        let len = self.rows.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i >= len - 1 => 0,
            Some(i) => i + 1,
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.rows.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Enter => app.toggle_detail(),
                KeyCode::Char(' ') | KeyCode::Char('x') => app.toggle_selected(),
                KeyCode::Char('r') => app.run_reset(),
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::Home => {
                    if !app.rows.is_empty() {
                        app.state.select(Some(0));
                    }
                }
                KeyCode::End => {
                    if !app.rows.is_empty() {
                        app.state.select(Some(app.rows.len() - 1));
                    }
                }
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with totals
            Constraint::Min(0),    // Redemptions
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    if app.show_detail {
        let content_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(chunks[1]);

        render_table(f, content_chunks[0], app);
        render_detail_panel(f, content_chunks[1], app);
    } else {
        render_table(f, chunks[1], app);
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let checked = app.rows.iter().filter(|r| r.redemption.checked).count();

    let spans = vec![
        Span::styled(
            "Credit Card Redemption Tracker",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  |  "),
        Span::styled(
            format!("Cards: {}", app.cards.len()),
            Style::default().fg(Color::White),
        ),
        Span::raw("  |  "),
        Span::styled(
            format!("Checked: {}/{}", checked, app.rows.len()),
            Style::default().fg(Color::Cyan),
        ),
        Span::raw("  |  "),
        Span::styled(
            format!("This year: ${:.2}", app.total_this_year),
            Style::default().fg(Color::Green),
        ),
    ];

    let header = Paragraph::new(vec![Line::from(spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    f.render_widget(header, area);
}

fn render_table(f: &mut Frame, area: Rect, app: &mut App) {
    let today = app.today;

    let header_cells = ["", "Card", "Redemption", "Amount", "Frequency", "Period", "Claimed"]
        .iter()
        .map(|h| {
            Cell::from(*h).style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
        });

    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows = app.rows.iter().map(|row| {
        let r = &row.redemption;
        let (mark, color) = if r.checked {
            ("[x]", Color::Green)
        } else {
            ("[ ]", Color::White)
        };

        let cells = vec![
            Cell::from(mark).style(Style::default().fg(color)),
            Cell::from(truncate(&row.card_name, 20)),
            Cell::from(truncate(&r.name, 28)),
            Cell::from(format!("{:.2}", r.amount)),
            Cell::from(r.frequency.as_str()),
            Cell::from(period_id(today, r.frequency)),
            Cell::from(format!("{}x", r.completed_count())),
        ];

        Row::new(cells).height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(4),
            Constraint::Length(22),
            Constraint::Length(30),
            Constraint::Length(10),
            Constraint::Length(11),
            Constraint::Length(10),
            Constraint::Length(8),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Redemptions "),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let selected = app.state.selected().map(|i| i + 1).unwrap_or(0);

    let mut spans = vec![Span::styled(
        format!(" Row: {}/{} ", selected, app.rows.len()),
        Style::default().fg(Color::Cyan),
    )];

    if let Some(message) = &app.message {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(message.clone(), Style::default().fg(Color::Green)));
    }

    for (key, label, color) in [
        ("Space", " Toggle", Color::Yellow),
        ("Enter", " Details", Color::Yellow),
        ("r", " Reset", Color::Yellow),
        ("↑/↓", " Nav", Color::Yellow),
        ("q", " Quit", Color::Red),
    ] {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(key, Style::default().fg(color)));
        spans.push(Span::raw(label));
    }

    let status_bar = Paragraph::new(vec![Line::from(spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Card Details ");

    let (Some(card), Some(row)) = (app.selected_card(), app.selected_row()) else {
        f.render_widget(Paragraph::new("No redemption selected").block(block), area);
        return;
    };

    let label = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let section = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD | Modifier::UNDERLINED);

    let mut content = vec![
        Line::from(""),
        Line::from(vec![Span::styled("  Card: ", label), Span::raw(&card.name)]),
        Line::from(vec![
            Span::styled("  Description: ", label),
            Span::raw(&card.description),
        ]),
        Line::from(vec![
            Span::styled("  This year: ", label),
            Span::styled(
                format!("${:.2}", card.current_year_total),
                Style::default().fg(Color::Green),
            ),
        ]),
        Line::from(""),
        Line::from(vec![Span::styled("  PAST YEARS", section)]),
        Line::from(""),
    ];

    if card.yearly_reimbursement_summaries.is_empty() {
        content.push(Line::from(Span::styled(
            "  (none archived yet)",
            Style::default().fg(Color::DarkGray),
        )));
    }
    for (year, total) in card.yearly_reimbursement_summaries.iter().rev() {
        content.push(Line::from(vec![
            Span::styled(format!("  {}: ", year), label),
            Span::raw(format!("${:.2}", total)),
        ]));
    }

    let r = &row.redemption;
    let last_checked = r
        .last_checked_date
        .map(|d| d.to_string())
        .unwrap_or_else(|| "-".to_string());
    let periods: Vec<&str> = r
        .completed_periods_this_year
        .iter()
        .map(String::as_str)
        .collect();

    content.extend([
        Line::from(""),
        Line::from(vec![Span::styled("  REDEMPTION", section)]),
        Line::from(""),
        Line::from(vec![Span::styled("  Name: ", label), Span::raw(&r.name)]),
        Line::from(vec![
            Span::styled("  Last checked: ", label),
            Span::raw(last_checked),
        ]),
        Line::from(vec![
            Span::styled("  Claimed periods: ", label),
            Span::raw(if periods.is_empty() {
                "-".to_string()
            } else {
                periods.join(", ")
            }),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            "  Press Enter to close",
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        )),
    ]);

    f.render_widget(Paragraph::new(content).block(block), area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len - 3).collect();
        format!("{}...", cut)
    }
}
