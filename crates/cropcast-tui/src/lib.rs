// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use cropcast_app::{
    CascadeField, FormField, LookupOutcome, LookupRequest, LookupTicket, PredictionFormInput,
    PredictionOutcome, PredictionPhase, PredictionTicket, Session, SessionCommand, SessionEvent,
    format_iso_date,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use std::io::{self, Stdout};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use time::{Date, Month, OffsetDateTime};
use tracing::{debug, warn};

const SUBMIT_ROW: usize = FormField::ALL.len();
const LOADING_LABEL: &str = "loading…";
const SUBMIT_LABEL: &str = "Predict Price";
const PENDING_LABEL: &str = "Analyzing Market Data...";

/// Executes the service calls a session asks for.
///
/// `spawn_*` must not block the UI thread for long; the defaults run the call
/// inline and report through `tx`, which is what tests rely on.
pub trait AppRuntime {
    fn fetch_options(&mut self, request: &LookupRequest) -> LookupOutcome;
    fn fetch_prediction(&mut self, input: &PredictionFormInput) -> PredictionOutcome;
    fn spawn_lookup(&mut self, request: LookupRequest, tx: Sender<InternalEvent>) -> Result<()> {
        let outcome = self.fetch_options(&request);
        tx.send(InternalEvent::LookupFinished {
            ticket: request.ticket,
            field: request.field,
            outcome,
        })
        .map_err(|_| anyhow!("lookup event channel closed"))?;
        Ok(())
    }
    fn spawn_prediction(
        &mut self,
        ticket: PredictionTicket,
        input: PredictionFormInput,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let outcome = self.fetch_prediction(&input);
        tx.send(InternalEvent::PredictionFinished { ticket, outcome })
            .map_err(|_| anyhow!("prediction event channel closed"))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiOptions {
    pub currency_symbol: String,
}

impl Default for UiOptions {
    fn default() -> Self {
        Self {
            currency_symbol: "₹".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InternalEvent {
    ClearStatus {
        token: u64,
    },
    LookupFinished {
        ticket: LookupTicket,
        field: CascadeField,
        outcome: LookupOutcome,
    },
    PredictionFinished {
        ticket: PredictionTicket,
        outcome: PredictionOutcome,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct OptionPickerUiState {
    visible: bool,
    field: Option<CascadeField>,
    query: String,
    matches: Vec<String>,
    cursor: usize,
}

#[derive(Debug, Clone, PartialEq, Default)]
struct DatePickerUiState {
    visible: bool,
    original: Option<Date>,
    selected: Option<Date>,
}

#[derive(Debug, Clone, PartialEq, Default)]
struct ViewData {
    cursor: usize,
    option_picker: OptionPickerUiState,
    date_picker: DatePickerUiState,
    help_visible: bool,
    status_token: u64,
    options: UiOptions,
}

pub fn run_app<R: AppRuntime>(
    session: &mut Session,
    runtime: &mut R,
    options: &UiOptions,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut terminal = setup_or_undo(enter_terminal, || {
        let _ = disable_raw_mode();
    })?;

    let mut view_data = ViewData {
        options: options.clone(),
        ..ViewData::default()
    };
    let (internal_tx, internal_rx) = mpsc::channel();

    dispatch_and_run(
        session,
        runtime,
        &mut view_data,
        &internal_tx,
        SessionCommand::Start,
    );

    let mut result = Ok(());
    loop {
        process_internal_events(session, &mut view_data, &internal_tx, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, session, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = match event::poll(Duration::from_millis(120)).context("poll event") {
            Ok(has_event) => has_event,
            Err(error) => {
                result = Err(error);
                break;
            }
        };
        if has_event {
            match event::read().context("read event") {
                Ok(Event::Key(key)) => {
                    if handle_key_event(session, runtime, &mut view_data, &internal_tx, key) {
                        break;
                    }
                }
                Ok(_) => {}
                Err(error) => {
                    result = Err(error);
                    break;
                }
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn enter_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    execute!(io::stdout(), terminal::EnterAlternateScreen).context("enter alternate screen")?;
    setup_or_undo(
        || Terminal::new(CrosstermBackend::new(io::stdout())).context("create terminal"),
        || {
            let _ = execute!(io::stdout(), terminal::LeaveAlternateScreen);
        },
    )
}

/// Runs a terminal setup step, undoing the previous step when it fails.
fn setup_or_undo<T>(setup: impl FnOnce() -> Result<T>, undo: impl FnOnce()) -> Result<T> {
    setup().inspect_err(|_| undo())
}

fn process_internal_events(
    session: &mut Session,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        let command = match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                SessionCommand::ClearStatus
            }
            InternalEvent::ClearStatus { .. } => continue,
            InternalEvent::LookupFinished {
                ticket,
                field,
                outcome,
            } => SessionCommand::LookupFinished {
                ticket,
                field,
                outcome,
            },
            InternalEvent::PredictionFinished { ticket, outcome } => {
                SessionCommand::PredictionFinished { ticket, outcome }
            }
        };

        for event in session.dispatch(command) {
            if let SessionEvent::StatusUpdated(_) = event {
                bump_status_token(view_data, tx);
            }
        }
    }
}

/// Dispatches `command` and starts whatever service calls it produced.
fn dispatch_and_run<R: AppRuntime>(
    session: &mut Session,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    command: SessionCommand,
) {
    for event in session.dispatch(command) {
        match event {
            SessionEvent::LookupRequested(request) => {
                let endpoint = request.field.endpoint();
                if let Err(error) = runtime.spawn_lookup(request, internal_tx.clone()) {
                    warn!(endpoint, %error, "lookup could not start");
                    emit_status(
                        session,
                        view_data,
                        internal_tx,
                        format!("{endpoint} lookup could not start: {error}"),
                    );
                }
            }
            SessionEvent::PredictionRequested { ticket, input } => {
                if let Err(error) = runtime.spawn_prediction(ticket, input, internal_tx.clone()) {
                    warn!(%ticket, %error, "prediction could not start");
                    emit_status(
                        session,
                        view_data,
                        internal_tx,
                        format!("prediction could not start: {error}"),
                    );
                }
            }
            SessionEvent::StatusUpdated(_) => bump_status_token(view_data, internal_tx),
            _ => {}
        }
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_secs(4));
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn bump_status_token(view_data: &mut ViewData, internal_tx: &Sender<InternalEvent>) {
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

fn emit_status(
    session: &mut Session,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    session.dispatch(SessionCommand::SetStatus(message.into()));
    bump_status_token(view_data, internal_tx);
}

fn handle_key_event<R: AppRuntime>(
    session: &mut Session,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.code == KeyCode::Char('q') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    if view_data.help_visible {
        if key.code == KeyCode::Esc || key.code == KeyCode::Char('?') {
            view_data.help_visible = false;
            emit_status(session, view_data, internal_tx, "help hidden");
        }
        return false;
    }

    if view_data.option_picker.visible {
        handle_option_picker_key(session, runtime, view_data, internal_tx, key);
        return false;
    }

    if view_data.date_picker.visible {
        handle_date_picker_key(session, view_data, internal_tx, key);
        return false;
    }

    match (key.code, key.modifiers) {
        (KeyCode::Char('s'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
            submit(session, runtime, view_data, internal_tx);
        }
        (KeyCode::Char('r'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
            if session.load_error().is_some() {
                dispatch_and_run(
                    session,
                    runtime,
                    view_data,
                    internal_tx,
                    SessionCommand::Start,
                );
                emit_status(session, view_data, internal_tx, "reloading states");
            } else {
                emit_status(session, view_data, internal_tx, "states already loaded");
            }
        }
        (KeyCode::Char('j'), KeyModifiers::NONE) | (KeyCode::Down, _) | (KeyCode::Tab, _) => {
            view_data.cursor = (view_data.cursor + 1).min(SUBMIT_ROW);
        }
        (KeyCode::Char('k'), KeyModifiers::NONE) | (KeyCode::Up, _) | (KeyCode::BackTab, _) => {
            view_data.cursor = view_data.cursor.saturating_sub(1);
        }
        (KeyCode::Char('g'), KeyModifiers::NONE) | (KeyCode::Home, _) => view_data.cursor = 0,
        (KeyCode::Char('G'), _) | (KeyCode::End, _) => view_data.cursor = SUBMIT_ROW,
        (KeyCode::Enter, _) => match focused_field(view_data) {
            Some(FormField::Cascade(field)) => {
                open_option_picker(session, view_data, internal_tx, field);
            }
            Some(FormField::Date) => open_date_picker(session, view_data, internal_tx),
            None => submit(session, runtime, view_data, internal_tx),
        },
        (KeyCode::Char('x'), KeyModifiers::NONE) | (KeyCode::Backspace, _) => {
            clear_focused_field(session, runtime, view_data, internal_tx);
        }
        (KeyCode::Char('?'), _) => {
            view_data.help_visible = true;
        }
        _ => {}
    }
    false
}

fn focused_field(view_data: &ViewData) -> Option<FormField> {
    FormField::ALL.get(view_data.cursor).copied()
}

fn submit<R: AppRuntime>(
    session: &mut Session,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    dispatch_and_run(
        session,
        runtime,
        view_data,
        internal_tx,
        SessionCommand::Submit,
    );
}

fn clear_focused_field<R: AppRuntime>(
    session: &mut Session,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let command = match focused_field(view_data) {
        Some(FormField::Cascade(field)) => {
            if session.selection().get(field).is_none() {
                return;
            }
            SessionCommand::Select { field, value: None }
        }
        Some(FormField::Date) => {
            if session.selection().date().is_none() {
                return;
            }
            SessionCommand::SetDate(None)
        }
        None => return,
    };
    dispatch_and_run(session, runtime, view_data, internal_tx, command);
}

fn open_option_picker(
    session: &mut Session,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    field: CascadeField,
) {
    if let Some(ancestor) = field
        .ancestors()
        .iter()
        .find(|ancestor| session.selection().get(**ancestor).is_none())
    {
        let name = ancestor.label().to_ascii_lowercase();
        emit_status(
            session,
            view_data,
            internal_tx,
            format!("choose a {name} first"),
        );
        return;
    }
    if session.catalog().is_loading(field) {
        let name = field.endpoint();
        emit_status(
            session,
            view_data,
            internal_tx,
            format!("{name} still loading"),
        );
        return;
    }

    let options = session.catalog().options(field);
    if options.is_empty() {
        let name = field.label().to_ascii_lowercase();
        emit_status(
            session,
            view_data,
            internal_tx,
            format!("no {name} options available"),
        );
        return;
    }

    let cursor = session
        .selection()
        .get(field)
        .and_then(|current| options.iter().position(|option| option == current))
        .unwrap_or(0);
    view_data.option_picker = OptionPickerUiState {
        visible: true,
        field: Some(field),
        query: String::new(),
        matches: options.to_vec(),
        cursor,
    };
}

fn handle_option_picker_key<R: AppRuntime>(
    session: &mut Session,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let Some(field) = view_data.option_picker.field else {
        view_data.option_picker = OptionPickerUiState::default();
        return;
    };

    match (key.code, key.modifiers) {
        (KeyCode::Esc, _) => {
            view_data.option_picker = OptionPickerUiState::default();
        }
        (KeyCode::Up, _) => {
            view_data.option_picker.cursor = view_data.option_picker.cursor.saturating_sub(1);
        }
        (KeyCode::Char('p'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
            view_data.option_picker.cursor = view_data.option_picker.cursor.saturating_sub(1);
        }
        (KeyCode::Down, _) => {
            let max = view_data.option_picker.matches.len().saturating_sub(1);
            view_data.option_picker.cursor = (view_data.option_picker.cursor + 1).min(max);
        }
        (KeyCode::Char('n'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
            let max = view_data.option_picker.matches.len().saturating_sub(1);
            view_data.option_picker.cursor = (view_data.option_picker.cursor + 1).min(max);
        }
        (KeyCode::Enter, _) => {
            let Some(value) = view_data
                .option_picker
                .matches
                .get(view_data.option_picker.cursor)
                .cloned()
            else {
                emit_status(session, view_data, internal_tx, "no match to select");
                return;
            };
            view_data.option_picker = OptionPickerUiState::default();
            debug!(field = field.param(), %value, "option picked");
            dispatch_and_run(
                session,
                runtime,
                view_data,
                internal_tx,
                SessionCommand::Select {
                    field,
                    value: Some(value),
                },
            );
            view_data.cursor = (field.position() + 1).min(SUBMIT_ROW);
        }
        (KeyCode::Backspace, _) => {
            view_data.option_picker.query.pop();
            refresh_option_picker(session, view_data, field);
        }
        (KeyCode::Char(ch), modifiers) if !modifiers.contains(KeyModifiers::CONTROL) => {
            view_data.option_picker.query.push(ch);
            refresh_option_picker(session, view_data, field);
        }
        _ => {}
    }
}

fn refresh_option_picker(session: &Session, view_data: &mut ViewData, field: CascadeField) {
    let query = view_data.option_picker.query.trim();
    let mut matches: Vec<String> = session
        .catalog()
        .options(field)
        .iter()
        .filter(|option| option_matches_query(option, query))
        .cloned()
        .collect();
    // An exact name always wins the first slot.
    if let Some(index) = matches
        .iter()
        .position(|option| option.eq_ignore_ascii_case(query))
    {
        let exact = matches.remove(index);
        matches.insert(0, exact);
    }
    view_data.option_picker.matches = matches;
    view_data.option_picker.cursor = 0;
}

fn option_matches_query(option: &str, query: &str) -> bool {
    if query.is_empty() {
        return true;
    }

    let option_lc = option.to_lowercase();
    let query_lc = query.to_lowercase();
    if option_lc.contains(&query_lc) {
        return true;
    }

    let mut query_chars = query_lc.chars();
    let mut current = query_chars.next();
    for ch in option_lc.chars() {
        let Some(needle) = current else {
            return true;
        };
        if ch == needle {
            current = query_chars.next();
        }
    }
    current.is_none()
}

fn open_date_picker(
    session: &mut Session,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let original = session.selection().date();
    let selected = original.unwrap_or_else(|| OffsetDateTime::now_utc().date());
    view_data.date_picker = DatePickerUiState {
        visible: true,
        original,
        selected: Some(selected),
    };
    emit_status(session, view_data, internal_tx, "date picker open");
}

fn handle_date_picker_key(
    session: &mut Session,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let Some(current) = view_data.date_picker.selected else {
        view_data.date_picker = DatePickerUiState::default();
        return;
    };

    let next = match (key.code, key.modifiers) {
        (KeyCode::Esc, _) => {
            view_data.date_picker = DatePickerUiState::default();
            emit_status(session, view_data, internal_tx, "date edit canceled");
            return;
        }
        (KeyCode::Enter, _) => {
            view_data.date_picker = DatePickerUiState::default();
            session.dispatch(SessionCommand::SetDate(Some(current)));
            view_data.cursor = SUBMIT_ROW;
            emit_status(
                session,
                view_data,
                internal_tx,
                format!("date set {}", format_iso_date(current)),
            );
            return;
        }
        (KeyCode::Char('h'), _) | (KeyCode::Left, _) => shift_date_by_days(current, -1),
        (KeyCode::Char('l'), _) | (KeyCode::Right, _) => shift_date_by_days(current, 1),
        (KeyCode::Char('j'), _) | (KeyCode::Down, _) => shift_date_by_days(current, 7),
        (KeyCode::Char('k'), _) | (KeyCode::Up, _) => shift_date_by_days(current, -7),
        (KeyCode::Char('H'), _) => shift_date_by_months(current, -1),
        (KeyCode::Char('L'), _) => shift_date_by_months(current, 1),
        (KeyCode::Char('['), _) => shift_date_by_years(current, -1),
        (KeyCode::Char(']'), _) => shift_date_by_years(current, 1),
        _ => None,
    };

    if let Some(date) = next {
        view_data.date_picker.selected = Some(date);
    }
}

fn shift_date_by_days(date: Date, days: i64) -> Option<Date> {
    date.checked_add(time::Duration::days(days))
}

fn shift_date_by_years(date: Date, years: i32) -> Option<Date> {
    shift_date_by_months(date, years.saturating_mul(12))
}

fn shift_date_by_months(date: Date, months: i32) -> Option<Date> {
    let base_month = i32::from(date.month() as u8);
    let total_month = base_month - 1 + months;
    let year = date.year() + total_month.div_euclid(12);
    let month_number = (total_month.rem_euclid(12) + 1) as u8;
    let month = Month::try_from(month_number).ok()?;
    let max_day = last_day_of_month(year, month)?;
    Date::from_calendar_date(year, month, date.day().min(max_day)).ok()
}

fn last_day_of_month(year: i32, month: Month) -> Option<u8> {
    let (next_year, next_month) = if month == Month::December {
        (year + 1, Month::January)
    } else {
        (year, month.next())
    };

    let first_next_month = Date::from_calendar_date(next_year, next_month, 1).ok()?;
    let last = first_next_month - time::Duration::days(1);
    Some(last.day())
}

fn render(frame: &mut ratatui::Frame<'_>, session: &Session, view_data: &ViewData) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(2),
        ])
        .split(frame.area());

    let header = Paragraph::new(header_text(session)).block(
        Block::default()
            .title("cropcast")
            .borders(Borders::ALL)
            .style(Style::default().fg(Color::White)),
    );
    frame.render_widget(header, layout[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(layout[1]);

    let form = Paragraph::new(form_text(session, view_data))
        .block(Block::default().title("market").borders(Borders::ALL));
    frame.render_widget(form, body[0]);

    let (panel_title, panel_style) = match session.prediction() {
        PredictionPhase::Failed(_) => ("error", Style::default().fg(Color::Red)),
        PredictionPhase::Succeeded(_) => ("estimate", Style::default().fg(Color::Green)),
        _ => ("estimate", Style::default()),
    };
    let panel = Paragraph::new(result_panel_text(session, &view_data.options))
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .title(panel_title)
                .borders(Borders::ALL)
                .style(panel_style),
        );
    frame.render_widget(panel, body[1]);

    let status_widget = Paragraph::new(status_text(session, view_data))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(status_widget, layout[2]);

    if view_data.option_picker.visible {
        let area = centered_rect(50, 60, frame.area());
        frame.render_widget(Clear, area);
        let title = view_data
            .option_picker
            .field
            .map(|field| field.label().to_ascii_lowercase())
            .unwrap_or_default();
        let picker = Paragraph::new(render_option_picker_text(&view_data.option_picker))
            .block(Block::default().title(title).borders(Borders::ALL));
        frame.render_widget(picker, area);
    }

    if view_data.date_picker.visible {
        let area = centered_rect(48, 30, frame.area());
        frame.render_widget(Clear, area);
        let picker = Paragraph::new(render_date_picker_overlay_text(&view_data.date_picker))
            .block(Block::default().title("date").borders(Borders::ALL));
        frame.render_widget(picker, area);
    }

    if view_data.help_visible {
        let area = centered_rect(70, 50, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_overlay_text())
            .block(Block::default().title("help").borders(Borders::ALL));
        frame.render_widget(help, area);
    }
}

fn header_text(session: &Session) -> Line<'static> {
    match session.load_error() {
        Some(error) => Line::from(vec![
            Span::styled(error.to_owned(), Style::default().fg(Color::Red)),
            Span::raw(" | ctrl+r retry"),
        ]),
        None => Line::from("Crop price estimate"),
    }
}

fn form_text(session: &Session, view_data: &ViewData) -> Text<'static> {
    let label_width = FormField::ALL
        .iter()
        .map(|field| field.label().len())
        .max()
        .unwrap_or(0);
    let dim = Style::default()
        .fg(Color::DarkGray)
        .add_modifier(Modifier::DIM);
    let focus = Style::default()
        .fg(Color::Cyan)
        .add_modifier(Modifier::BOLD);

    let mut lines = Vec::with_capacity(SUBMIT_ROW + 2);
    for (index, field) in FormField::ALL.into_iter().enumerate() {
        let marker = if index == view_data.cursor { ">" } else { " " };
        let style = if index == view_data.cursor {
            focus
        } else if row_is_blocked(session, field) {
            dim
        } else {
            Style::default()
        };
        lines.push(Line::from(vec![
            Span::styled(
                format!("{marker} {:<label_width$}  ", field.label()),
                style,
            ),
            Span::styled(form_row_value(session, field), style),
        ]));
    }

    lines.push(Line::from(""));
    let marker = if view_data.cursor == SUBMIT_ROW {
        ">"
    } else {
        " "
    };
    let (label, style) = if session.is_pending() {
        (PENDING_LABEL, dim)
    } else if !session.can_submit() {
        (SUBMIT_LABEL, dim)
    } else if view_data.cursor == SUBMIT_ROW {
        (SUBMIT_LABEL, focus)
    } else {
        (SUBMIT_LABEL, Style::default().add_modifier(Modifier::BOLD))
    };
    lines.push(Line::from(Span::styled(format!("{marker} [ {label} ]"), style)));
    Text::from(lines)
}

fn row_is_blocked(session: &Session, field: FormField) -> bool {
    match field {
        FormField::Cascade(field) => session.selection().scope_for(field).is_none(),
        FormField::Date => false,
    }
}

fn form_row_value(session: &Session, field: FormField) -> String {
    match field {
        FormField::Cascade(field) => {
            if let Some(value) = session.selection().get(field) {
                return value.to_owned();
            }
            if session.catalog().is_loading(field) {
                return LOADING_LABEL.to_owned();
            }
            let count = session.catalog().options(field).len();
            if count == 0 {
                format!("Select {}", field.label())
            } else {
                format!("Select {} ({count})", field.label())
            }
        }
        FormField::Date => session
            .selection()
            .date()
            .map(format_iso_date)
            .unwrap_or_else(|| "Select Date".to_owned()),
    }
}

fn result_panel_text(session: &Session, options: &UiOptions) -> String {
    let currency = &options.currency_symbol;
    match session.prediction() {
        PredictionPhase::Idle => [
            "Fill in every field, then press enter on".to_owned(),
            format!("[ {SUBMIT_LABEL} ] or ctrl+s."),
        ]
        .join("\n"),
        PredictionPhase::Pending { .. } => PENDING_LABEL.to_owned(),
        PredictionPhase::Failed(message) => ["Prediction Error".to_owned(), message.clone()].join("\n"),
        PredictionPhase::Succeeded(result) => {
            let method = result.provenance.label();
            [
                "Per Quintal".to_owned(),
                format!("{currency}{}", result.per_bulk_unit_display()),
                "(100 kg)".to_owned(),
                String::new(),
                "Per Kilogram".to_owned(),
                format!("{currency}{}", result.per_unit_display()),
                "(1 kg)".to_owned(),
                String::new(),
                "Conversion: 1 Quintal = 100 Kilograms".to_owned(),
                format!("Method: {method}"),
                format!("Date: {}", format_iso_date(result.date)),
            ]
            .join("\n")
        }
    }
}

fn render_option_picker_text(picker: &OptionPickerUiState) -> String {
    let mut lines = vec![format!("filter: {}", picker.query), String::new()];
    if picker.matches.is_empty() {
        lines.push("(no matches)".to_owned());
    }
    for (index, option) in picker.matches.iter().enumerate() {
        let marker = if index == picker.cursor { ">" } else { " " };
        lines.push(format!("{marker} {option}"));
    }
    lines.push(String::new());
    lines.push("type filter | up/down | enter pick | esc cancel".to_owned());
    lines.join("\n")
}

fn render_date_picker_overlay_text(date_picker: &DatePickerUiState) -> String {
    let selected = date_picker
        .selected
        .map(format_iso_date)
        .unwrap_or_else(|| "-".to_owned());
    let original = date_picker
        .original
        .map(format_iso_date)
        .unwrap_or_else(|| "(empty)".to_owned());

    [
        format!("orig: {original}"),
        format!("pick: {selected}"),
        String::new(),
        "h/l day | j/k week | H/L month | [/] year".to_owned(),
        "enter pick | esc cancel".to_owned(),
    ]
    .join("\n")
}

fn help_overlay_text() -> &'static str {
    "global: ctrl+q quit | ctrl+s predict | ctrl+r reload states | ? help\n\
form: j/k or up/down move | g/G first/last | enter choose | x/backspace clear\n\
picker: type filter | up/down or ctrl+p/ctrl+n | enter pick | esc cancel\n\
date picker: h/l day j/k week H/L month [/] year enter pick esc cancel\n\
changing a field clears every field below it"
}

fn status_text(session: &Session, view_data: &ViewData) -> String {
    if view_data.help_visible || view_data.option_picker.visible || view_data.date_picker.visible
    {
        return String::new();
    }

    let hints = "j/k move | enter choose | x clear | ctrl+s predict | ? help | ctrl+q quit";
    match session.status_line() {
        Some(status) => format!("{status} | {hints}"),
        None => hints.to_owned(),
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
