use std::collections::VecDeque;

use chrono::Local;

use crate::connectivity::HealthStatus;
use crate::error::ApiError;
use crate::model::{League, MatchRequest, PredictionResult, Team, UpcomingMatch};
use crate::predictor::{DataSource, Sourced, validate_request};

const MAX_LOGS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Home,
    Predict,
    Settings,
}

impl Screen {
    pub fn next(self) -> Self {
        match self {
            Screen::Home => Screen::Predict,
            Screen::Predict => Screen::Settings,
            Screen::Settings => Screen::Home,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            Screen::Home => Screen::Settings,
            Screen::Predict => Screen::Home,
            Screen::Settings => Screen::Predict,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    League,
    Home,
    Away,
    Date,
}

impl FormField {
    fn next(self) -> Self {
        match self {
            FormField::League => FormField::Home,
            FormField::Home => FormField::Away,
            FormField::Away => FormField::Date,
            FormField::Date => FormField::League,
        }
    }

    fn prev(self) -> Self {
        match self {
            FormField::League => FormField::Date,
            FormField::Home => FormField::League,
            FormField::Away => FormField::Home,
            FormField::Date => FormField::Away,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct PredictForm {
    pub focus: FormField,
    pub league: usize,
    pub home: Option<usize>,
    pub away: Option<usize>,
    pub date: String,
}

impl PredictForm {
    fn new() -> Self {
        Self {
            focus: FormField::League,
            league: 0,
            home: None,
            away: None,
            date: Local::now().format("%Y-%m-%d").to_string(),
        }
    }
}

/// Work for the provider thread.
#[derive(Debug, Clone)]
pub enum ProviderCommand {
    /// Reloads everything. Teams are loaded for `league` when the catalog
    /// still has it, otherwise for the first league.
    Refresh { league: Option<String> },
    LoadTeams { league: String },
    Predict { request_id: u64, request: MatchRequest },
    SaveEndpoint { url: String },
    TestConnection,
}

/// Results flowing back from the provider thread.
#[derive(Debug, Clone)]
pub enum Delta {
    SetStatus {
        status: HealthStatus,
        endpoint: Option<String>,
        checked_at_millis: Option<i64>,
    },
    SetLeagues(Sourced<Vec<League>>),
    SetTeams {
        league: String,
        teams: Sourced<Vec<Team>>,
    },
    SetUpcoming(Sourced<Vec<UpcomingMatch>>),
    SetHistory(Sourced<Vec<PredictionResult>>),
    PredictionReady {
        request_id: u64,
        result: Sourced<PredictionResult>,
    },
    PredictionFailed {
        request_id: u64,
        message: String,
    },
    EndpointSaved {
        url: String,
    },
    SettingsMessage {
        kind: MessageKind,
        text: String,
    },
    Log(String),
}

pub struct AppState {
    pub screen: Screen,
    pub help_overlay: bool,
    pub api_status: HealthStatus,
    pub endpoint: Option<String>,
    pub checked_at_millis: Option<i64>,
    pub leagues: Vec<League>,
    pub leagues_source: Option<DataSource>,
    pub teams: Vec<Team>,
    pub teams_league: Option<String>,
    pub upcoming: Vec<UpcomingMatch>,
    pub upcoming_source: Option<DataSource>,
    pub history: Vec<PredictionResult>,
    pub history_source: Option<DataSource>,
    pub form: PredictForm,
    pub prediction: Option<Sourced<PredictionResult>>,
    pub predict_error: Option<String>,
    pub loading: bool,
    pub pending_request: Option<u64>,
    next_request_id: u64,
    pub settings_input: String,
    pub settings_message: Option<(MessageKind, String)>,
    pub logs: VecDeque<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self {
            screen: Screen::Home,
            help_overlay: false,
            api_status: HealthStatus::Unknown,
            endpoint: None,
            checked_at_millis: None,
            leagues: Vec::new(),
            leagues_source: None,
            teams: Vec::new(),
            teams_league: None,
            upcoming: Vec::new(),
            upcoming_source: None,
            history: Vec::new(),
            history_source: None,
            form: PredictForm::new(),
            prediction: None,
            predict_error: None,
            loading: false,
            pending_request: None,
            next_request_id: 1,
            settings_input: String::new(),
            settings_message: None,
            logs: VecDeque::new(),
        }
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        self.logs.push_back(msg.into());
        while self.logs.len() > MAX_LOGS {
            self.logs.pop_front();
        }
    }

    pub fn selected_league(&self) -> Option<&League> {
        self.leagues.get(self.form.league)
    }

    pub fn home_team(&self) -> Option<&Team> {
        self.form.home.and_then(|idx| self.teams.get(idx))
    }

    pub fn away_team(&self) -> Option<&Team> {
        self.form.away.and_then(|idx| self.teams.get(idx))
    }

    pub fn focus_next(&mut self) {
        self.form.focus = self.form.focus.next();
    }

    pub fn focus_prev(&mut self) {
        self.form.focus = self.form.focus.prev();
    }

    /// Steps the focused selector. Returns the newly selected league id when
    /// the league changed, so the caller can load its teams.
    pub fn cycle_focused(&mut self, forward: bool) -> Option<String> {
        match self.form.focus {
            FormField::League => {
                if self.leagues.is_empty() {
                    return None;
                }
                self.form.league = step(Some(self.form.league), self.leagues.len(), forward);
                self.form.home = None;
                self.form.away = None;
                self.selected_league().map(|l| l.id.clone())
            }
            FormField::Home => {
                if !self.teams.is_empty() {
                    self.form.home = Some(step(self.form.home, self.teams.len(), forward));
                }
                None
            }
            FormField::Away => {
                if !self.teams.is_empty() {
                    self.form.away = Some(step(self.form.away, self.teams.len(), forward));
                }
                None
            }
            FormField::Date => None,
        }
    }

    pub fn edit_date(&mut self, ch: Option<char>) {
        match ch {
            Some(c) if (c.is_ascii_digit() || c == '-') && self.form.date.len() < 10 => {
                self.form.date.push(c)
            }
            Some(_) => {}
            None => {
                self.form.date.pop();
            }
        }
    }

    pub fn form_request(&self) -> MatchRequest {
        MatchRequest {
            home_team: self.home_team().map(|t| t.name.clone()).unwrap_or_default(),
            away_team: self.away_team().map(|t| t.name.clone()).unwrap_or_default(),
            league: self
                .selected_league()
                .map(|l| l.id.clone())
                .unwrap_or_default(),
            date: Some(self.form.date.clone()),
        }
    }

    pub fn refresh_command(&self) -> ProviderCommand {
        ProviderCommand::Refresh {
            league: self.selected_league().map(|l| l.id.clone()),
        }
    }

    /// Validates the form and, when it passes, hands out a fresh request id.
    /// A result for any older id is dropped when it arrives.
    pub fn begin_prediction(&mut self) -> Result<(u64, MatchRequest), ApiError> {
        self.prediction = None;
        self.predict_error = None;
        let request = match validate_request(&self.form_request()) {
            Ok(request) => request,
            Err(err) => {
                self.predict_error = Some(err.to_string());
                return Err(err);
            }
        };
        let id = self.next_request_id;
        self.next_request_id += 1;
        self.pending_request = Some(id);
        self.loading = true;
        Ok((id, request))
    }
}

fn step(current: Option<usize>, len: usize, forward: bool) -> usize {
    match (current, forward) {
        (None, true) => 0,
        (None, false) => len - 1,
        (Some(idx), true) => (idx + 1) % len,
        (Some(idx), false) => (idx + len - 1) % len,
    }
}

pub fn apply_delta(state: &mut AppState, delta: Delta) {
    match delta {
        Delta::SetStatus {
            status,
            endpoint,
            checked_at_millis,
        } => {
            state.api_status = status;
            if state.settings_input.is_empty()
                && let Some(url) = endpoint.as_ref()
            {
                state.settings_input = url.clone();
            }
            state.endpoint = endpoint;
            state.checked_at_millis = checked_at_millis;
        }
        Delta::SetLeagues(sourced) => {
            note_source(state, "leagues", &sourced);
            let previous = state.selected_league().map(|l| l.id.clone());
            state.leagues = sourced.value;
            state.leagues_source = Some(sourced.source);
            state.form.league = previous
                .as_deref()
                .and_then(|id| state.leagues.iter().position(|l| l.id == id))
                .unwrap_or(0);
            let current = state.selected_league().map(|l| l.id.as_str());
            if current != state.teams_league.as_deref() {
                state.teams.clear();
                state.teams_league = None;
                state.form.home = None;
                state.form.away = None;
            }
        }
        Delta::SetTeams { league, teams } => {
            // A slow answer for a league the user already left is stale.
            if state.selected_league().map(|l| l.id.as_str()) != Some(league.as_str()) {
                return;
            }
            note_source(state, "teams", &teams);
            let home = state.home_team().map(|t| t.name.clone());
            let away = state.away_team().map(|t| t.name.clone());
            state.teams = teams.value;
            state.teams_league = Some(league);
            state.form.home = position_by_name(&state.teams, home.as_deref());
            state.form.away = position_by_name(&state.teams, away.as_deref());
        }
        Delta::SetUpcoming(sourced) => {
            note_source(state, "upcoming", &sourced);
            state.upcoming = sourced.value;
            state.upcoming_source = Some(sourced.source);
        }
        Delta::SetHistory(sourced) => {
            note_source(state, "history", &sourced);
            state.history = sourced.value;
            state.history_source = Some(sourced.source);
        }
        Delta::PredictionReady { request_id, result } => {
            if state.pending_request != Some(request_id) {
                state.push_log(format!("[INFO] Dropped stale prediction #{request_id}"));
                return;
            }
            state.loading = false;
            state.pending_request = None;
            state.predict_error = result.warning.clone();
            // Live history only lists what the service recorded.
            let live_history = state.history_source == Some(DataSource::Remote);
            if !live_history || result.source == DataSource::Remote {
                state.history.insert(0, result.value.clone());
            }
            state.prediction = Some(result);
        }
        Delta::PredictionFailed {
            request_id,
            message,
        } => {
            if state.pending_request != Some(request_id) {
                return;
            }
            state.loading = false;
            state.pending_request = None;
            state.predict_error = Some(message);
        }
        Delta::EndpointSaved { url } => {
            state.settings_input = url.clone();
            state.endpoint = Some(url);
            state.api_status = HealthStatus::Unknown;
            state.checked_at_millis = None;
        }
        Delta::SettingsMessage { kind, text } => {
            state.settings_message = Some((kind, text));
        }
        Delta::Log(line) => state.push_log(line),
    }
}

fn position_by_name(teams: &[Team], name: Option<&str>) -> Option<usize> {
    let name = name?;
    teams.iter().position(|t| t.name == name)
}

fn note_source<T>(state: &mut AppState, what: &str, sourced: &Sourced<T>) {
    if let Some(warning) = &sourced.warning {
        state.push_log(format!("[WARN] {what}: {warning}"));
    }
}
