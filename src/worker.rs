use std::sync::mpsc::{Receiver, Sender};
use std::thread::{self, JoinHandle};

use crate::api::PredictionApi;
use crate::connectivity::HealthStatus;
use crate::error::ApiError;
use crate::predictor::Predictor;
use crate::state::{Delta, MessageKind, ProviderCommand};
use crate::store::KeyValueStore;

/// Runs the predictor on its own thread, one command at a time, so a health
/// check always settles before the request that depends on it.
pub fn spawn_provider<S, A>(
    predictor: Predictor<S, A>,
    upcoming_days: u32,
    tx: Sender<Delta>,
    cmd_rx: Receiver<ProviderCommand>,
) -> JoinHandle<()>
where
    S: KeyValueStore + Send + 'static,
    A: PredictionApi + Send + 'static,
{
    thread::spawn(move || {
        let mut worker = Worker {
            predictor,
            upcoming_days,
            tx,
        };
        while let Ok(cmd) = cmd_rx.recv() {
            if !worker.handle(cmd) {
                break;
            }
        }
    })
}

struct Worker<S, A> {
    predictor: Predictor<S, A>,
    upcoming_days: u32,
    tx: Sender<Delta>,
}

impl<S: KeyValueStore, A: PredictionApi> Worker<S, A> {
    /// False once the UI side hung up.
    fn handle(&mut self, cmd: ProviderCommand) -> bool {
        match cmd {
            ProviderCommand::Refresh { league } => self.refresh(league),
            ProviderCommand::LoadTeams { league } => {
                let teams = self.predictor.teams_or_fallback(&league);
                self.send(Delta::SetTeams { league, teams })
            }
            ProviderCommand::Predict {
                request_id,
                request,
            } => {
                let delta = match self.predictor.prediction_or_fallback(&request) {
                    Ok(result) => Delta::PredictionReady { request_id, result },
                    Err(err) => Delta::PredictionFailed {
                        request_id,
                        message: err.to_string(),
                    },
                };
                self.send(delta) && self.send_status()
            }
            ProviderCommand::SaveEndpoint { url } => match self.predictor.set_endpoint(&url) {
                Ok(url) => {
                    self.send(Delta::EndpointSaved { url })
                        && self.send(Delta::Log("[INFO] API endpoint saved".to_string()))
                        && self.test_connection()
                }
                Err(err) => {
                    let text = match err.downcast_ref::<ApiError>() {
                        Some(api_err) => api_err.to_string(),
                        None => format!("Failed to save settings: {err:#}"),
                    };
                    self.send(Delta::SettingsMessage {
                        kind: MessageKind::Error,
                        text,
                    })
                }
            },
            ProviderCommand::TestConnection => self.test_connection(),
        }
    }

    fn refresh(&mut self, selected: Option<String>) -> bool {
        if !self.send_status() {
            return false;
        }
        let leagues = self.predictor.leagues_or_fallback();
        let team_league = selected
            .filter(|id| leagues.value.iter().any(|l| &l.id == id))
            .or_else(|| leagues.value.first().map(|l| l.id.clone()));
        if !self.send(Delta::SetLeagues(leagues)) {
            return false;
        }
        if let Some(league) = team_league {
            let teams = self.predictor.teams_or_fallback(&league);
            if !self.send(Delta::SetTeams { league, teams }) {
                return false;
            }
        }
        let upcoming = self
            .predictor
            .upcoming_or_fallback(None, self.upcoming_days);
        if !self.send(Delta::SetUpcoming(upcoming)) {
            return false;
        }
        let history = self.predictor.history_or_fallback();
        self.send(Delta::SetHistory(history))
    }

    fn test_connection(&mut self) -> bool {
        if !self.send(Delta::SettingsMessage {
            kind: MessageKind::Info,
            text: "Checking connection...".to_string(),
        }) {
            return false;
        }
        let status = self.predictor.test_connection();
        let (kind, text) = match status {
            HealthStatus::Healthy => (
                MessageKind::Success,
                "Connected successfully to the prediction API!".to_string(),
            ),
            _ => (
                MessageKind::Warning,
                "API is unreachable or not healthy. Using sample data until it recovers."
                    .to_string(),
            ),
        };
        self.send(Delta::SettingsMessage { kind, text }) && self.send_status()
    }

    fn send_status(&mut self) -> bool {
        let status = self.predictor.availability();
        let record = self.predictor.record();
        self.send(Delta::SetStatus {
            status,
            endpoint: record.remote_base_url,
            checked_at_millis: record.last_checked_at_millis,
        })
    }

    fn send(&self, delta: Delta) -> bool {
        self.tx.send(delta).is_ok()
    }
}
