use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use expense_tracker::{
    parse_submission, DashboardView, Expense, SqliteStore, SubmissionPipeline, TrackerError,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputField {
    Amount,
    Description,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Browse,
    Adding {
        field: InputField,
        amount: String,
        description: String,
    },
}

/// Status line: latest outcome and whether it deserves attention
#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub text: String,
    pub alert: bool,
}

pub struct App {
    pipeline: SubmissionPipeline<SqliteStore>,
    pub view: DashboardView,
    pub state: TableState,
    pub mode: Mode,
    pub status: Option<StatusMessage>,
}

impl App {
    pub fn new(pipeline: SubmissionPipeline<SqliteStore>) -> Result<Self> {
        let view = pipeline.dashboard(None)?;

        let mut state = TableState::default();
        if !view.expenses.is_empty() {
            state.select(Some(0));
        }

        Ok(Self {
            pipeline,
            view,
            state,
            mode: Mode::Browse,
            status: None,
        })
    }

    pub fn selected_expense(&self) -> Option<&Expense> {
        self.state.selected().and_then(|i| self.view.expenses.get(i))
    }

    fn refresh(&mut self) -> Result<()> {
        self.view = self.pipeline.dashboard(None)?;

        let len = self.view.expenses.len();
        match self.state.selected() {
            _ if len == 0 => self.state.select(None),
            Some(i) if i >= len => self.state.select(Some(len - 1)),
            None => self.state.select(Some(0)),
            _ => {}
        }
        Ok(())
    }

    pub fn start_adding(&mut self) {
        self.mode = Mode::Adding {
            field: InputField::Amount,
            amount: String::new(),
            description: String::new(),
        };
    }

    pub fn cancel_adding(&mut self) {
        self.mode = Mode::Browse;
    }

    /// Validate the form and run it through the pipeline.
    /// Validation problems keep the form open; storage failures bubble up.
    pub fn submit_form(&mut self) -> Result<()> {
        let Mode::Adding {
            amount,
            description,
            ..
        } = &self.mode
        else {
            return Ok(());
        };

        let submission = match parse_submission(amount, description) {
            Ok(submission) => submission,
            Err(e) => {
                self.status = Some(StatusMessage {
                    text: e.to_string(),
                    alert: true,
                });
                return Ok(());
            }
        };

        let outcome = self
            .pipeline
            .handle_submission(submission.amount, &submission.description)?;

        self.status = Some(StatusMessage {
            alert: outcome.budget.is_breach() || outcome.anomaly.is_anomalous(),
            text: outcome.message,
        });
        self.mode = Mode::Browse;
        self.refresh()?;

        // Newest first: the new entry is on top
        if !self.view.expenses.is_empty() {
            self.state.select(Some(0));
        }
        Ok(())
    }

    pub fn delete_selected(&mut self) -> Result<()> {
        let Some(id) = self.selected_expense().map(|e| e.id) else {
            return Ok(());
        };

        match self.pipeline.delete_expense(id) {
            Ok(()) => {
                self.status = Some(StatusMessage {
                    text: format!("deleted expense #{}", id),
                    alert: false,
                });
            }
            Err(TrackerError::NotFound(id)) => {
                self.status = Some(StatusMessage {
                    text: format!("expense #{} no longer exists", id),
                    alert: true,
                });
            }
            Err(e) => return Err(e.into()),
        }

        self.refresh()
    }

    fn handle_input_key(&mut self, code: KeyCode) -> Result<()> {
        if code == KeyCode::Enter {
            return self.submit_form();
        }
        if code == KeyCode::Esc {
            self.cancel_adding();
            return Ok(());
        }

        if let Mode::Adding {
            field,
            amount,
            description,
        } = &mut self.mode
        {
            let target = match field {
                InputField::Amount => amount,
                InputField::Description => description,
            };
            match code {
                KeyCode::Tab | KeyCode::BackTab => {
                    *field = match field {
                        InputField::Amount => InputField::Description,
                        InputField::Description => InputField::Amount,
                    };
                }
                KeyCode::Backspace => {
                    target.pop();
                }
                KeyCode::Char(c) => target.push(c),
                _ => {}
            }
        }
        Ok(())
    }

    pub fn next(&mut self) {
        let len = self.view.expenses.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i + 1 < len => i + 1,
            Some(_) => 0,
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.view.expenses.len();
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

    res
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        if matches!(app.mode, Mode::Adding { .. }) {
            app.handle_input_key(key.code)?;
            continue;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
            KeyCode::Char('a') => app.start_adding(),
            KeyCode::Char('d') | KeyCode::Delete => app.delete_selected()?,
            KeyCode::Char('r') => app.refresh()?,
            KeyCode::Down | KeyCode::Char('j') => app.next(),
            KeyCode::Up | KeyCode::Char('k') => app.previous(),
            KeyCode::Home => {
                if !app.view.expenses.is_empty() {
                    app.state.select(Some(0));
                }
            }
            KeyCode::End => {
                if !app.view.expenses.is_empty() {
                    app.state.select(Some(app.view.expenses.len() - 1));
                }
            }
            _ => {}
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5), // Totals vs budgets
            Constraint::Min(0),    // Expense table
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_totals(f, chunks[0], &app.view);
    render_table(f, chunks[1], app);
    render_status_bar(f, chunks[2], app);

    if let Mode::Adding {
        field,
        amount,
        description,
    } = &app.mode
    {
        render_form(f, *field, amount, description);
    }
}

fn render_totals(f: &mut Frame, area: Rect, view: &DashboardView) {
    let rows = [
        ("Today", view.daily_total, view.thresholds.daily),
        ("This week", view.weekly_total, view.thresholds.weekly),
        ("This month", view.monthly_total, view.thresholds.monthly),
    ];

    let lines: Vec<Line> = rows
        .iter()
        .map(|(label, total, budget)| {
            let color = if total > budget { Color::Red } else { Color::Green };
            Line::from(vec![
                Span::styled(format!(" {:<11}", label), Style::default().fg(Color::White)),
                Span::styled(
                    format!("{:>10.2}", total),
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                ),
                Span::styled(format!(" / {:.2}", budget), Style::default().fg(Color::DarkGray)),
            ])
        })
        .collect();

    let totals = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" Spend vs Budget "),
    );

    f.render_widget(totals, area);
}

fn render_table(f: &mut Frame, area: Rect, app: &mut App) {
    let header_cells = ["#", "Date", "Amount", "Description"].iter().map(|h| {
        Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    });

    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows = app.view.expenses.iter().map(|expense| {
        let cells = vec![
            Cell::from(expense.id.to_string()),
            Cell::from(expense.created_at.format("%Y-%m-%d %H:%M").to_string()),
            Cell::from(format!("{:.2}", expense.amount)).style(Style::default().fg(Color::Red)),
            Cell::from(truncate(&expense.description, 60)),
        ];

        Row::new(cells).height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(7),
            Constraint::Length(18),
            Constraint::Length(12),
            Constraint::Min(20),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(format!(" Expenses ({}) ", app.view.expenses.len())),
    )
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let mut status_spans = Vec::new();

    if let Some(status) = &app.status {
        let color = if status.alert { Color::Red } else { Color::Green };
        status_spans.push(Span::styled(
            format!(" {} ", status.text),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ));
        status_spans.push(Span::raw("|"));
    }

    status_spans.push(Span::styled(" a", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Add | "));
    status_spans.push(Span::styled("d", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Delete | "));
    status_spans.push(Span::styled("↑/↓", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Nav | "));
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(Line::from(status_spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn render_form(f: &mut Frame, field: InputField, amount: &str, description: &str) {
    let area = centered_rect(60, 7, f.size());

    let field_style = |active: bool| {
        if active {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::White)
        }
    };

    let lines = vec![
        Line::from(vec![
            Span::styled(" Amount:      ", field_style(field == InputField::Amount)),
            Span::raw(amount.to_string()),
        ]),
        Line::from(vec![
            Span::styled(" Description: ", field_style(field == InputField::Description)),
            Span::raw(description.to_string()),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            " Tab switch field | Enter save | Esc cancel",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let form = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(" New Expense "),
    );

    f.render_widget(Clear, area);
    f.render_widget(form, area);
}

fn centered_rect(percent_x: u16, height: u16, r: Rect) -> Rect {
    let width = r.width * percent_x / 100;
    Rect {
        x: r.x + (r.width.saturating_sub(width)) / 2,
        y: r.y + (r.height.saturating_sub(height)) / 2,
        width,
        height: height.min(r.height),
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}
