use std::{io, time::Duration};

use chrono::{DateTime, Days, NaiveDate, Utc};
use color_eyre::Result;
use crossterm::{
    event::{self, DisableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use daybook_core::{
    schedule::{DaySchedule, ScheduledEntry},
    session::{
        format_duration, ActiveSession, CompletedTask, HistoryArchive, SessionState, SessionStore,
    },
    tasks::{TaskStatus, TaskStore},
    Tracker,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, List, ListItem, Paragraph},
    Frame, Terminal,
};

use crate::{
    config::DayView,
    tasks::{status_label, worked_span},
};

/// How often the screen redraws, so the running timer ticks once a second.
const TICK: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Continue,
    Reload,
    Quit,
}

/// View state: which day is shown and how.
#[derive(Debug, Clone, PartialEq, Eq)]
struct App {
    date: NaiveDate,
    today: NaiveDate,
    view: DayView,
}

impl App {
    fn new(date: NaiveDate, today: NaiveDate, view: DayView) -> Self {
        Self { date, today, view }
    }

    fn on_key(&mut self, code: KeyCode) -> Action {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
            KeyCode::Left | KeyCode::Char('h') => self.move_to(self.date.checked_sub_days(Days::new(1))),
            KeyCode::Right | KeyCode::Char('l') => self.move_to(self.date.checked_add_days(Days::new(1))),
            KeyCode::Char('t') => self.move_to(Some(self.today)),
            KeyCode::Char('g') => {
                self.view = match self.view {
                    DayView::Grid => DayView::Timeline,
                    DayView::Timeline => DayView::Grid,
                };
                Action::Continue
            }
            KeyCode::Char('r') => Action::Reload,
            _ => Action::Continue,
        }
    }

    fn move_to(&mut self, date: Option<NaiveDate>) -> Action {
        match date {
            Some(date) if date != self.date => {
                self.date = date;
                Action::Reload
            }
            _ => Action::Continue,
        }
    }
}

/// Timeline for one day. Arrows move between days, `t` jumps to today,
/// `g` toggles grid/timeline, `r` reloads. Press `q` or `Esc` to exit.
pub async fn launch<T, H, S>(
    tracker: &Tracker<T, H, S>,
    date: Option<NaiveDate>,
    view: DayView,
) -> Result<()>
where
    T: TaskStore,
    H: HistoryArchive,
    S: SessionStore,
{
    let today = tracker.clock().today();
    let mut app = App::new(date.unwrap_or(today), today, view);
    let mut schedule = tracker.schedule_for(app.date).await?;
    let mut session = tracker.session_state().await?;

    // Guard restores the terminal even if we early-return.
    let guard = TerminalGuard::enter()?;
    let mut terminal = guard.terminal()?;

    loop {
        draw(&mut terminal, &app, &schedule, &session, tracker.clock().now())?;

        if event::poll(TICK)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match app.on_key(key.code) {
                    Action::Quit => break,
                    Action::Reload => {
                        schedule = tracker.schedule_for(app.date).await?;
                        session = tracker.session_state().await?;
                    }
                    Action::Continue => {}
                }
            }
        }
    }

    Ok(())
}

fn draw<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &App,
    schedule: &DaySchedule,
    session: &SessionState,
    now: DateTime<Utc>,
) -> Result<()> {
    let timer = session
        .active
        .as_ref()
        .map(|active| (active, active.elapsed_secs(now)));
    terminal.draw(|frame| render(frame, app, schedule, timer, &session.completed))?;
    Ok(())
}

fn render(
    frame: &mut Frame,
    app: &App,
    schedule: &DaySchedule,
    timer: Option<(&ActiveSession, u64)>,
    completed: &[CompletedTask],
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let mut title = vec![Span::styled(
        schedule.date.format("%A %Y-%m-%d").to_string(),
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    )];
    if app.date == app.today {
        title.push(Span::raw(" (today)"));
    }
    let timer_line = match timer {
        Some((session, secs)) => Span::styled(
            format!("  {} {}", session.task.name, format_duration(secs)),
            Style::default().fg(Color::Yellow),
        ),
        None => Span::styled("  no timer running", Style::default().fg(Color::DarkGray)),
    };
    title.push(timer_line);
    let header = Paragraph::new(Line::from(title)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .title(Span::styled(
                "Daybook",
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD | Modifier::ITALIC),
            )),
    );
    frame.render_widget(header, chunks[0]);

    let items = match app.view {
        DayView::Grid => schedule.grid().iter().map(entry_item).collect::<Vec<_>>(),
        DayView::Timeline => timeline_items(schedule),
    };
    let body_title = match app.view {
        DayView::Grid => "Grid",
        DayView::Timeline => "Timeline",
    };
    let items = if items.is_empty() {
        vec![ListItem::new("Nothing scheduled.")]
    } else {
        items
    };
    let panes = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(chunks[1]);
    let body = List::new(items).block(Block::default().borders(Borders::ALL).title(body_title));
    frame.render_widget(body, panes[0]);
    frame.render_widget(completed_list(completed), panes[1]);

    let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Cyan));
    let footer = Paragraph::new(Line::from(vec![
        key("←/→"),
        Span::raw(" day  "),
        key("t"),
        Span::raw(" today  "),
        key("g"),
        Span::raw(" grid/timeline  "),
        key("r"),
        Span::raw(" reload  "),
        key("q"),
        Span::raw(" quit"),
    ]))
    .block(Block::default().borders(Borders::ALL).title("Controls"));
    frame.render_widget(footer, chunks[2]);
}

fn completed_list(completed: &[CompletedTask]) -> List<'static> {
    let total: u64 = completed.iter().map(|done| done.duration).sum();
    let title = format!("Completed ({}, {})", completed.len(), format_duration(total));
    let items = if completed.is_empty() {
        vec![ListItem::new(Span::styled(
            "Nothing completed yet.",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        completed
            .iter()
            .map(|done| {
                ListItem::new(Line::from(vec![
                    Span::styled(
                        done.task.name.clone(),
                        Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
                    ),
                    Span::raw(format!("  {}  ", worked_span(done))),
                    Span::styled(format_duration(done.duration), Style::default().fg(Color::Yellow)),
                ]))
            })
            .collect()
    };
    List::new(items).block(Block::default().borders(Borders::ALL).title(title))
}

fn timeline_items(schedule: &DaySchedule) -> Vec<ListItem<'static>> {
    let mut items = Vec::new();
    for (hour, entries) in schedule.timeline() {
        items.push(ListItem::new(Line::from(Span::styled(
            format!("{hour:02}:00"),
            Style::default().add_modifier(Modifier::BOLD),
        ))));
        items.extend(entries.into_iter().map(|entry| {
            let mut item = entry_spans(entry);
            item.insert(0, Span::raw("  │ "));
            ListItem::new(Line::from(item))
        }));
    }
    items
}

fn entry_item(entry: &ScheduledEntry) -> ListItem<'static> {
    ListItem::new(Line::from(entry_spans(entry)))
}

fn entry_spans(entry: &ScheduledEntry) -> Vec<Span<'static>> {
    let task = &entry.occurrence.task;
    let mut spans = vec![
        Span::raw(format!(
            "{}-{} ",
            entry.occurrence.start_at.format("%H:%M"),
            entry.occurrence.end_at.format("%H:%M")
        )),
        Span::styled(
            status_label(entry.status),
            Style::default()
                .fg(status_color(entry.status))
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled(task.name.clone(), Style::default().add_modifier(Modifier::BOLD)),
    ];
    if entry.recurring {
        spans.push(Span::styled(" (repeats)", Style::default().fg(Color::DarkGray)));
    }
    spans
}

fn status_color(status: TaskStatus) -> Color {
    match status {
        TaskStatus::Pending => Color::Yellow,
        TaskStatus::InProgress => Color::Cyan,
        TaskStatus::Completed => Color::Green,
    }
}

struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> Result<Self> {
        enable_raw_mode()?;
        // Enter alternate screen to avoid polluting the shell buffer.
        execute!(io::stdout(), EnterAlternateScreen)?;
        Ok(Self)
    }

    fn terminal(&self) -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
        let backend = CrosstermBackend::new(io::stdout());
        Ok(Terminal::new(backend)?)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        // Errors are reported but not propagated from Drop.
        if let Err(err) = disable_raw_mode() {
            eprintln!("failed to disable raw mode: {err}");
        }
        if let Err(err) = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture) {
            eprintln!("failed to restore terminal: {err}");
        }
    }
}
