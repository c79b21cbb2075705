use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{info, warn};

use crate::api::{ApiClient, PredictionApi};
use crate::config::Config;
use crate::connectivity::{
    ConnectivityCache, ConnectivityRecord, HealthStatus, normalize_endpoint, ttl_millis,
};
use crate::error::ApiError;
use crate::fallback;
use crate::history::PredictionLog;
use crate::model::{League, MatchRequest, PredictionResult, Team, UpcomingMatch};
use crate::store::{KeyValueStore, MemoryStore, SqliteStore};

const HISTORY_LIMIT: usize = 50;

pub type Clock = Box<dyn Fn() -> DateTime<Utc> + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Remote,
    Fallback,
}

/// A value plus where it came from. `warning` is set when a live call failed
/// and the value was synthesized instead.
#[derive(Debug, Clone, PartialEq)]
pub struct Sourced<T> {
    pub value: T,
    pub source: DataSource,
    pub warning: Option<String>,
}

impl<T> Sourced<T> {
    fn remote(value: T) -> Self {
        Self {
            value,
            source: DataSource::Remote,
            warning: None,
        }
    }

    fn fallback(value: T, warning: Option<String>) -> Self {
        Self {
            value,
            source: DataSource::Fallback,
            warning,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.source == DataSource::Fallback
    }
}

/// Single decision point between the remote service and local sample data.
pub struct Predictor<S, A> {
    cache: ConnectivityCache<S>,
    api: A,
    rng: StdRng,
    ttl: Duration,
    log: Option<PredictionLog>,
    clock: Clock,
}

impl<S: KeyValueStore, A: PredictionApi> Predictor<S, A> {
    pub fn new(cache: ConnectivityCache<S>, api: A) -> Self {
        Self {
            cache,
            api,
            rng: StdRng::from_entropy(),
            ttl: crate::connectivity::DEFAULT_TTL,
            log: None,
            clock: Box::new(Utc::now),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn with_seed(self, seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => self.with_rng(StdRng::seed_from_u64(seed)),
            None => self,
        }
    }

    pub fn with_log(mut self, log: PredictionLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn cache(&self) -> &ConnectivityCache<S> {
        &self.cache
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn record(&self) -> ConnectivityRecord {
        self.cache.record()
    }

    pub fn set_endpoint(&mut self, url: &str) -> Result<String> {
        self.cache.set_endpoint(url)
    }

    /// Cached when fresh, probed otherwise.
    pub fn availability(&mut self) -> HealthStatus {
        let now = (self.clock)().timestamp_millis();
        self.cache
            .is_available(ttl_millis(self.ttl), now, &self.api)
    }

    /// Settings "test connection": always probes.
    pub fn test_connection(&mut self) -> HealthStatus {
        let now = (self.clock)().timestamp_millis();
        self.cache.force_probe(now, &self.api)
    }

    pub fn prediction_or_fallback(
        &mut self,
        request: &MatchRequest,
    ) -> Result<Sourced<PredictionResult>, ApiError> {
        let request = validate_request(request)?;
        let sourced = match self.usable_endpoint() {
            Some(base) => match self.api.predict(&base, &request) {
                Ok(prediction) => Sourced::remote(prediction),
                Err(err) => {
                    warn!("prediction request failed, using sample data: {err}");
                    let now = (self.clock)();
                    let value = fallback::synthesize_prediction(&mut self.rng, &request, now);
                    Sourced::fallback(value, Some(fallback_warning(&err)))
                }
            },
            None => {
                let now = (self.clock)();
                let value = fallback::synthesize_prediction(&mut self.rng, &request, now);
                Sourced::fallback(value, None)
            }
        };
        self.remember(std::slice::from_ref(&sourced.value));
        Ok(sourced)
    }

    pub fn batch_or_fallback(
        &mut self,
        requests: &[MatchRequest],
    ) -> Result<Sourced<Vec<PredictionResult>>, ApiError> {
        if requests.is_empty() {
            return Err(ApiError::validation("Add at least one match to predict"));
        }
        let requests = requests
            .iter()
            .map(validate_request)
            .collect::<Result<Vec<_>, _>>()?;

        let sourced = match self.usable_endpoint() {
            Some(base) => match self.api.batch_predict(&base, &requests) {
                Ok(predictions) => Sourced::remote(predictions),
                Err(err) => {
                    warn!("batch prediction failed, using sample data: {err}");
                    let now = (self.clock)();
                    let value = fallback::synthesize_batch(&mut self.rng, &requests, now);
                    Sourced::fallback(value, Some(fallback_warning(&err)))
                }
            },
            None => {
                let now = (self.clock)();
                let value = fallback::synthesize_batch(&mut self.rng, &requests, now);
                Sourced::fallback(value, None)
            }
        };
        self.remember(&sourced.value);
        Ok(sourced)
    }

    pub fn leagues_or_fallback(&mut self) -> Sourced<Vec<League>> {
        self.fetch_or_fallback(
            "leagues",
            |api, base| api.leagues(base),
            fallback::leagues,
        )
    }

    pub fn teams_or_fallback(&mut self, league: &str) -> Sourced<Vec<Team>> {
        self.fetch_or_fallback(
            "teams",
            |api, base| api.teams(base, league),
            || fallback::teams(Some(league)),
        )
    }

    pub fn upcoming_or_fallback(
        &mut self,
        league: Option<&str>,
        days: u32,
    ) -> Sourced<Vec<UpcomingMatch>> {
        self.fetch_or_fallback(
            "upcoming matches",
            |api, base| api.upcoming(base, league, days),
            || fallback::upcoming_matches(league),
        )
    }

    /// Remote history when reachable, otherwise what this machine has shown before.
    pub fn history_or_fallback(&mut self) -> Sourced<Vec<PredictionResult>> {
        let local = |log: &Option<PredictionLog>| match log {
            Some(log) => log.recent(HISTORY_LIMIT).unwrap_or_else(|err| {
                warn!("local history read failed: {err:#}");
                Vec::new()
            }),
            None => Vec::new(),
        };

        let Some(base) = self.usable_endpoint() else {
            return Sourced::fallback(local(&self.log), None);
        };
        match self.api.history(&base) {
            Ok(history) => Sourced::remote(history),
            Err(err) => {
                warn!("history request failed, using local history: {err}");
                Sourced::fallback(local(&self.log), Some(fallback_warning(&err)))
            }
        }
    }

    fn fetch_or_fallback<T>(
        &mut self,
        what: &str,
        remote: impl FnOnce(&A, &str) -> Result<T, ApiError>,
        local: impl FnOnce() -> T,
    ) -> Sourced<T> {
        let Some(base) = self.usable_endpoint() else {
            return Sourced::fallback(local(), None);
        };
        match remote(&self.api, &base) {
            Ok(value) => Sourced::remote(value),
            Err(err) => {
                warn!("{what} request failed, using sample data: {err}");
                Sourced::fallback(local(), Some(fallback_warning(&err)))
            }
        }
    }

    /// The endpoint to call, when the availability check says it is usable.
    fn usable_endpoint(&mut self) -> Option<String> {
        if !self.availability().is_healthy() {
            return None;
        }
        self.cache.endpoint()
    }

    fn remember(&self, predictions: &[PredictionResult]) {
        let Some(log) = &self.log else {
            return;
        };
        for prediction in predictions {
            if let Err(err) = log.append(prediction) {
                warn!("failed to record prediction: {err:#}");
            }
        }
        info!(count = predictions.len(), "predictions recorded");
    }
}

/// Rejects incomplete or self-referencing matches before anything touches the network.
pub fn validate_request(request: &MatchRequest) -> Result<MatchRequest, ApiError> {
    let home = request.home_team.trim();
    let away = request.away_team.trim();
    let league = request.league.trim();
    if home.is_empty() || away.is_empty() || league.is_empty() {
        return Err(ApiError::validation(
            "Please select a league, home team, and away team",
        ));
    }
    if home == away {
        return Err(ApiError::validation(
            "Home team and away team cannot be the same",
        ));
    }

    let date = request
        .date
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty());
    if let Some(date) = date
        && NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err()
    {
        return Err(ApiError::validation(format!(
            "Match date must look like YYYY-MM-DD, got {date}"
        )));
    }

    Ok(MatchRequest {
        home_team: home.to_string(),
        away_team: away.to_string(),
        league: league.to_string(),
        date: date.map(str::to_string),
    })
}

fn fallback_warning(err: &ApiError) -> String {
    format!("{err}. Using sample data instead.")
}

impl Predictor<SqliteStore, ApiClient> {
    /// Wires the on-disk store, history log and HTTP client described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = match config.db_path.as_deref() {
            Some(path) => SqliteStore::open(path)
                .with_context(|| format!("open settings store {}", path.display()))?,
            None => {
                warn!("no cache directory; settings will not survive a restart");
                SqliteStore::in_memory()?
            }
        };
        let cache = ConnectivityCache::new(store, config.default_api_url.clone());
        assemble(cache, config)
    }
}

impl Predictor<MemoryStore, ApiClient> {
    /// Targets `endpoint` for this process only. Saved settings are neither
    /// read nor written; predictions still land in the local history log.
    pub fn with_endpoint_override(config: &Config, endpoint: &str) -> Result<Self> {
        let endpoint = normalize_endpoint(endpoint)
            .ok_or_else(|| ApiError::validation("Please enter a valid API URL"))?;
        let cache = ConnectivityCache::new(MemoryStore::new(), Some(endpoint));
        assemble(cache, config)
    }
}

fn assemble<S: KeyValueStore>(
    cache: ConnectivityCache<S>,
    config: &Config,
) -> Result<Predictor<S, ApiClient>> {
    let log = match config.db_path.as_deref() {
        Some(path) => PredictionLog::open(path)?,
        None => PredictionLog::in_memory()?,
    };
    let api = ApiClient::new(config.http_timeout)?;
    Ok(Predictor::new(cache, api)
        .with_ttl(config.health_ttl)
        .with_seed(config.seed)
        .with_log(log))
}
