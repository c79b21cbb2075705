use std::io;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::{Local, TimeZone};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Bar, BarChart, BarGroup, Block, Borders, Clear, Paragraph, Wrap};

use matchcast::config::{self, Config};
use matchcast::connectivity::HealthStatus;
use matchcast::logging;
use matchcast::model::PredictionResult;
use matchcast::predictor::{DataSource, Predictor};
use matchcast::state::{
    AppState, Delta, FormField, MessageKind, ProviderCommand, Screen, apply_delta,
};
use matchcast::worker;

const SETUP_STEPS: [&str; 5] = [
    "Start the prediction server (Flask app on port 5000, or behind an ngrok tunnel).",
    "Copy the public URL it prints, e.g. https://abc123.ngrok.io.",
    "Paste it below; \"/api\" is appended when missing.",
    "Press Enter to save. The connection is tested right away.",
    "Keep the server running; when it sleeps the app switches to sample data.",
];

const TROUBLESHOOTING: [&str; 4] = [
    "Connection failed: check the server is still running, then save the URL again.",
    "Tunnel expired: free ngrok sessions end after a few hours; paste the new URL.",
    "Wrong URL: it must point at the server root or its /api path.",
    "Slow responses: sample data keeps the dashboard usable while the model warms up.",
];

struct App {
    state: AppState,
    should_quit: bool,
    cmd_tx: mpsc::Sender<ProviderCommand>,
    refresh_every: Duration,
    last_refresh: Instant,
}

impl App {
    fn new(cmd_tx: mpsc::Sender<ProviderCommand>, refresh_every: Duration) -> Self {
        Self {
            state: AppState::new(),
            should_quit: false,
            cmd_tx,
            refresh_every,
            last_refresh: Instant::now(),
        }
    }

    fn send(&mut self, cmd: ProviderCommand) {
        if self.cmd_tx.send(cmd).is_err() {
            self.state.push_log("[WARN] Provider thread is gone");
        }
    }

    fn refresh(&mut self) {
        let cmd = self.state.refresh_command();
        self.send(cmd);
        self.last_refresh = Instant::now();
    }

    fn maybe_refresh(&mut self) {
        if self.last_refresh.elapsed() >= self.refresh_every {
            self.refresh();
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }
        match key.code {
            KeyCode::Tab => {
                self.state.screen = self.state.screen.next();
                return;
            }
            KeyCode::BackTab => {
                self.state.screen = self.state.screen.prev();
                return;
            }
            KeyCode::F(1) => {
                self.state.help_overlay = !self.state.help_overlay;
                return;
            }
            KeyCode::Esc => {
                if self.state.help_overlay {
                    self.state.help_overlay = false;
                } else {
                    self.should_quit = true;
                }
                return;
            }
            _ => {}
        }

        match self.state.screen {
            Screen::Home => self.on_home_key(key),
            Screen::Predict => self.on_predict_key(key),
            Screen::Settings => self.on_settings_key(key),
        }
    }

    fn on_home_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('r') => {
                self.state.push_log("[INFO] Refresh requested");
                self.refresh();
            }
            KeyCode::Char('p') | KeyCode::Enter => self.state.screen = Screen::Predict,
            KeyCode::Char('s') => self.state.screen = Screen::Settings,
            _ => {}
        }
    }

    fn on_predict_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Up => self.state.focus_prev(),
            KeyCode::Down => self.state.focus_next(),
            KeyCode::Left | KeyCode::Right => {
                let forward = key.code == KeyCode::Right;
                if let Some(league) = self.state.cycle_focused(forward) {
                    self.state.teams.clear();
                    self.send(ProviderCommand::LoadTeams { league });
                }
            }
            KeyCode::Backspace if self.state.form.focus == FormField::Date => {
                self.state.edit_date(None)
            }
            KeyCode::Char(c) if self.state.form.focus == FormField::Date => {
                self.state.edit_date(Some(c))
            }
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Enter => match self.state.begin_prediction() {
                Ok((request_id, request)) => {
                    self.state
                        .push_log(format!("[INFO] Prediction #{request_id} requested"));
                    self.send(ProviderCommand::Predict {
                        request_id,
                        request,
                    });
                }
                Err(err) => self.state.push_log(format!("[WARN] {err}")),
            },
            _ => {}
        }
    }

    fn on_settings_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter => {
                let url = self.state.settings_input.trim().to_string();
                if url.is_empty() {
                    self.state.settings_message = Some((
                        MessageKind::Error,
                        "Please enter a valid API URL".to_string(),
                    ));
                    return;
                }
                self.send(ProviderCommand::SaveEndpoint { url });
            }
            KeyCode::F(5) => self.send(ProviderCommand::TestConnection),
            KeyCode::Backspace => {
                self.state.settings_input.pop();
            }
            KeyCode::Char(c) => self.state.settings_input.push(c),
            _ => {}
        }
    }

    fn on_delta(&mut self, delta: Delta) {
        let endpoint_changed = matches!(delta, Delta::EndpointSaved { .. });
        apply_delta(&mut self.state, delta);
        if endpoint_changed {
            self.refresh();
        }
    }
}

fn main() -> anyhow::Result<()> {
    config::load_dotenv();
    let config = Config::from_env();
    let log_path = logging::init().unwrap_or_else(|err| {
        eprintln!("logging disabled: {err:#}");
        None
    });

    let predictor = Predictor::from_config(&config).context("failed to start predictor")?;

    let (tx, rx) = mpsc::channel();
    let (cmd_tx, cmd_rx) = mpsc::channel();
    let _provider = worker::spawn_provider(predictor, config.upcoming_days, tx, cmd_rx);

    let mut app = App::new(cmd_tx, config.health_ttl);
    if let Some(path) = log_path {
        app.state
            .push_log(format!("[INFO] Logging to {}", path.display()));
    }
    app.refresh();

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app, rx);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("error: {err}");
    }
    Ok(())
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    rx: mpsc::Receiver<Delta>,
) -> io::Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
        while let Ok(delta) = rx.try_recv() {
            app.on_delta(delta);
        }
        app.maybe_refresh();

        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            app.on_key(key);
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn ui(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(6),
            Constraint::Length(1),
        ])
        .split(frame.size());

    let header = Paragraph::new(header_text(&app.state))
        .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    match app.state.screen {
        Screen::Home => render_home(frame, chunks[1], &app.state),
        Screen::Predict => render_predict(frame, chunks[1], &app.state),
        Screen::Settings => render_settings(frame, chunks[1], &app.state),
    }

    render_logs(frame, chunks[2], &app.state);

    let footer =
        Paragraph::new(footer_text(&app.state)).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(footer, chunks[3]);

    if app.state.help_overlay {
        render_help_overlay(frame, frame.size());
    }
}

fn header_text(state: &AppState) -> Line<'static> {
    let screen = match state.screen {
        Screen::Home => "HOME",
        Screen::Predict => "PREDICT",
        Screen::Settings => "SETTINGS",
    };
    let (label, color) = status_label(state.api_status);
    Line::from(vec![
        Span::styled(
            format!(" MATCHCAST | {screen} | API: "),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::styled(label, Style::default().fg(color)),
        Span::raw(format!(
            " | {}",
            state.endpoint.as_deref().unwrap_or("no endpoint")
        )),
    ])
}

fn status_label(status: HealthStatus) -> (&'static str, Color) {
    match status {
        HealthStatus::Healthy => ("connected", Color::Green),
        HealthStatus::Unhealthy => ("unavailable (sample data)", Color::Yellow),
        HealthStatus::Unknown => ("checking...", Color::DarkGray),
    }
}

fn footer_text(state: &AppState) -> String {
    match state.screen {
        Screen::Home => {
            "Tab Screen | p Predict | s Settings | r Refresh | F1 Help | q Quit".to_string()
        }
        Screen::Predict => {
            "Tab Screen | ↑/↓ Field | ←/→ Choose | type Date | Enter Predict | F1 Help | q Quit"
                .to_string()
        }
        Screen::Settings => {
            "Tab Screen | type URL | Enter Save | F5 Test connection | F1 Help | Esc Quit"
                .to_string()
        }
    }
}

fn source_tag(source: Option<DataSource>) -> Span<'static> {
    match source {
        Some(DataSource::Fallback) => {
            Span::styled(" [sample data]", Style::default().fg(Color::Yellow))
        }
        Some(DataSource::Remote) => Span::styled(" [live]", Style::default().fg(Color::Green)),
        None => Span::styled(" [loading]", Style::default().fg(Color::DarkGray)),
    }
}

fn render_home(frame: &mut Frame, area: Rect, state: &AppState) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let mut upcoming = Vec::new();
    if state.upcoming.is_empty() {
        upcoming.push(Line::styled(
            "No upcoming matches",
            Style::default().fg(Color::DarkGray),
        ));
    }
    for m in &state.upcoming {
        upcoming.push(Line::from(format!(
            "{} {:<5} {:<3} {} vs {}",
            m.date,
            m.time.as_deref().unwrap_or(""),
            m.league,
            m.home_team,
            m.away_team
        )));
    }
    let title = Line::from(vec![
        Span::raw("Upcoming matches"),
        source_tag(state.upcoming_source),
    ]);
    frame.render_widget(
        Paragraph::new(upcoming).block(Block::default().borders(Borders::ALL).title(title)),
        cols[0],
    );

    let mut history = Vec::new();
    if state.history.is_empty() {
        history.push(Line::styled(
            "No predictions yet",
            Style::default().fg(Color::DarkGray),
        ));
    }
    for p in state.history.iter().take(usize::from(cols[1].height)) {
        history.push(history_line(p));
    }
    let title = Line::from(vec![
        Span::raw("Recent predictions"),
        source_tag(state.history_source),
    ]);
    frame.render_widget(
        Paragraph::new(history).block(Block::default().borders(Borders::ALL).title(title)),
        cols[1],
    );
}

fn history_line(p: &PredictionResult) -> Line<'static> {
    let mut spans = vec![Span::raw(format!(
        "{} {}-{} {} ({}, {:.0}%)",
        p.home_team,
        p.predicted_score.home,
        p.predicted_score.away,
        p.away_team,
        p.predicted_result.label(),
        p.confidence * 100.0
    ))];
    if p.is_mock {
        spans.push(Span::styled(" sample", Style::default().fg(Color::Yellow)));
    }
    Line::from(spans)
}

fn render_predict(frame: &mut Frame, area: Rect, state: &AppState) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(area);

    let field = |label: &str, value: String, focus: FormField| {
        let style = if state.form.focus == focus {
            Style::default().fg(Color::Black).bg(Color::Cyan)
        } else {
            Style::default()
        };
        Line::from(vec![
            Span::styled(format!("{label:<8}"), Style::default().add_modifier(Modifier::BOLD)),
            Span::styled(format!(" {value} "), style),
        ])
    };
    let choose = "< choose >".to_string();
    let mut form = vec![
        field(
            "League",
            state
                .selected_league()
                .map(|l| l.name.clone())
                .unwrap_or_else(|| "loading...".to_string()),
            FormField::League,
        ),
        field(
            "Home",
            state
                .home_team()
                .map(|t| t.name.clone())
                .unwrap_or_else(|| choose.clone()),
            FormField::Home,
        ),
        field(
            "Away",
            state
                .away_team()
                .map(|t| t.name.clone())
                .unwrap_or_else(|| choose.clone()),
            FormField::Away,
        ),
        field("Date", state.form.date.clone(), FormField::Date),
        Line::raw(""),
    ];
    if state.loading {
        form.push(Line::styled(
            "Predicting...",
            Style::default().fg(Color::Cyan),
        ));
    }
    if let Some(err) = &state.predict_error {
        form.push(Line::styled(err.clone(), Style::default().fg(Color::Red)));
    }
    let title = Line::from(vec![Span::raw("Match"), source_tag(state.leagues_source)]);
    frame.render_widget(
        Paragraph::new(form)
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title(title)),
        cols[0],
    );

    let block = Block::default().borders(Borders::ALL).title("Prediction");
    let Some(sourced) = &state.prediction else {
        frame.render_widget(
            Paragraph::new("Pick a league and two teams, then press Enter.")
                .style(Style::default().fg(Color::DarkGray))
                .block(block),
            cols[1],
        );
        return;
    };
    let inner = block.inner(cols[1]);
    frame.render_widget(block, cols[1]);
    render_prediction(frame, inner, &sourced.value);
}

fn render_prediction(frame: &mut Frame, area: Rect, p: &PredictionResult) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Length(5), Constraint::Min(1)])
        .split(area);

    let mut summary = vec![Line::from(vec![
        Span::styled(
            format!(
                "{} {} - {} {}",
                p.home_team, p.predicted_score.home, p.predicted_score.away, p.away_team
            ),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(
            "  {} | confidence {:.1}%",
            p.predicted_result.label(),
            p.confidence * 100.0
        )),
    ])];
    if p.is_mock {
        summary.push(Line::styled(
            "Sample data: the prediction API was not used for this result.",
            Style::default().fg(Color::Yellow),
        ));
    }
    frame.render_widget(Paragraph::new(summary), rows[0]);
    frame.render_widget(probability_chart(p), rows[1]);

    let mut notes = vec![Line::styled(
        "Insights",
        Style::default().add_modifier(Modifier::BOLD),
    )];
    notes.extend(p.insights.iter().map(|s| Line::raw(format!("• {s}"))));
    notes.push(Line::styled(
        "Key factors",
        Style::default().add_modifier(Modifier::BOLD),
    ));
    notes.push(Line::raw(p.key_factors.join(" · ")));
    frame.render_widget(Paragraph::new(notes).wrap(Wrap { trim: true }), rows[2]);
}

fn probability_chart(p: &PredictionResult) -> BarChart<'static> {
    let pct = |v: f64| (v * 100.0).round().clamp(0.0, 100.0) as u64;
    let bars = [
        ("Home", p.probabilities.home_win, Color::Green),
        ("Draw", p.probabilities.draw, Color::Yellow),
        ("Away", p.probabilities.away_win, Color::Red),
    ]
    .into_iter()
    .map(|(label, value, color)| {
        Bar::default()
            .label(Line::from(label))
            .value(pct(value))
            .text_value(format!("{}%", pct(value)))
            .style(Style::default().fg(color))
    })
    .collect::<Vec<_>>();

    BarChart::default()
        .data(BarGroup::default().bars(&bars))
        .bar_width(6)
        .bar_gap(2)
        .max(100)
}

fn render_settings(frame: &mut Frame, area: Rect, state: &AppState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(5), Constraint::Min(1)])
        .split(area);

    let checked = state
        .checked_at_millis
        .and_then(|ms| Local.timestamp_millis_opt(ms).single())
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "never".to_string());
    let mut lines = vec![
        Line::from(vec![
            Span::styled("API URL ", Style::default().add_modifier(Modifier::BOLD)),
            Span::styled(
                format!("{}_", state.settings_input),
                Style::default().fg(Color::Cyan),
            ),
        ]),
        Line::raw(format!("Last checked: {checked}")),
    ];
    if let Some((kind, text)) = &state.settings_message {
        let color = match kind {
            MessageKind::Info => Color::Cyan,
            MessageKind::Success => Color::Green,
            MessageKind::Warning => Color::Yellow,
            MessageKind::Error => Color::Red,
        };
        lines.push(Line::styled(text.clone(), Style::default().fg(color)));
    }
    frame.render_widget(
        Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .title("API connection"),
        ),
        rows[0],
    );

    let mut help = vec![Line::styled(
        "Setup",
        Style::default().add_modifier(Modifier::BOLD),
    )];
    help.extend(
        SETUP_STEPS
            .iter()
            .enumerate()
            .map(|(i, step)| Line::raw(format!("{}. {step}", i + 1))),
    );
    help.push(Line::raw(""));
    help.push(Line::styled(
        "Troubleshooting",
        Style::default().add_modifier(Modifier::BOLD),
    ));
    help.extend(TROUBLESHOOTING.iter().map(|tip| Line::raw(format!("• {tip}"))));
    frame.render_widget(
        Paragraph::new(help)
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL)),
        rows[1],
    );
}

fn render_logs(frame: &mut Frame, area: Rect, state: &AppState) {
    let visible = usize::from(area.height.saturating_sub(2));
    let skip = state.logs.len().saturating_sub(visible);
    let lines = state
        .logs
        .iter()
        .skip(skip)
        .map(|line| {
            let color = if line.starts_with("[WARN]") {
                Color::Yellow
            } else {
                Color::DarkGray
            };
            Line::styled(line.clone(), Style::default().fg(color))
        })
        .collect::<Vec<_>>();
    frame.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Log")),
        area,
    );
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let width = area.width.min(64);
    let height = area.height.min(12);
    let popup = Rect {
        x: area.x + (area.width.saturating_sub(width)) / 2,
        y: area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    };
    let text = vec![
        Line::raw("Tab / Shift-Tab   switch screen"),
        Line::raw("Home: r refresh, p predict, s settings"),
        Line::raw("Predict: ↑/↓ field, ←/→ choose, Enter submit"),
        Line::raw("Settings: type URL, Enter save, F5 test"),
        Line::raw(""),
        Line::raw("When the API is unreachable, results are sample data"),
        Line::raw("and are marked as such."),
        Line::raw(""),
        Line::raw("Esc close | Ctrl-C quit"),
    ];
    frame.render_widget(Clear, popup);
    frame.render_widget(
        Paragraph::new(text).block(Block::default().borders(Borders::ALL).title("Help")),
        popup,
    );
}
