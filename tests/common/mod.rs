#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};

use matchcast::api::PredictionApi;
use matchcast::connectivity::{ConnectivityCache, HealthProbe};
use matchcast::error::ApiError;
use matchcast::model::{
    HealthResponse, League, MatchRequest, Outcome, PredictedScore, PredictionResult,
    Probabilities, Team, UpcomingMatch,
};
use matchcast::predictor::Predictor;
use matchcast::store::MemoryStore;

pub const NOW_MILLIS: i64 = 1_742_900_000_000;

#[derive(Debug, Default, Clone)]
pub struct Calls {
    pub health: usize,
    pub predict: usize,
    pub batch: usize,
    pub catalog: usize,
    pub history: usize,
}

/// In-process stand-in for the prediction service.
#[derive(Clone)]
pub struct FakeApi {
    pub healthy: bool,
    pub fail_requests: bool,
    pub calls: Arc<Mutex<Calls>>,
}

impl FakeApi {
    pub fn healthy() -> Self {
        Self {
            healthy: true,
            fail_requests: false,
            calls: Arc::default(),
        }
    }

    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            ..Self::healthy()
        }
    }

    pub fn flaky() -> Self {
        Self {
            fail_requests: true,
            ..Self::healthy()
        }
    }

    pub fn calls(&self) -> Calls {
        self.calls.lock().unwrap().clone()
    }

    fn bump(&self, f: impl FnOnce(&mut Calls)) {
        f(&mut self.calls.lock().unwrap());
    }

    fn outage(&self) -> Result<(), ApiError> {
        if self.fail_requests {
            return Err(ApiError::Service {
                status: 500,
                message: "model crashed".to_string(),
            });
        }
        Ok(())
    }
}

pub fn remote_prediction(request: &MatchRequest) -> PredictionResult {
    PredictionResult {
        match_id: Some("remote-1".to_string()),
        home_team: request.home_team.clone(),
        away_team: request.away_team.clone(),
        league: request.league.clone(),
        match_date: request.date.clone(),
        probabilities: Probabilities {
            home_win: 0.2,
            draw: 0.3,
            away_win: 0.5,
        },
        predicted_result: Outcome::AwayWin,
        predicted_score: PredictedScore { home: 0, away: 1 },
        confidence: 0.81,
        insights: vec!["Model says away.".to_string()],
        key_factors: vec!["Recent form".to_string()],
        timestamp: None,
        is_mock: false,
    }
}

impl HealthProbe for FakeApi {
    fn check_health(&self, _base_url: &str) -> Result<HealthResponse, ApiError> {
        self.bump(|c| c.health += 1);
        Ok(HealthResponse {
            status: if self.healthy { "healthy" } else { "unhealthy" }.to_string(),
            model_loaded: Some(self.healthy),
            error: None,
        })
    }
}

impl PredictionApi for FakeApi {
    fn leagues(&self, _base_url: &str) -> Result<Vec<League>, ApiError> {
        self.bump(|c| c.catalog += 1);
        self.outage()?;
        Ok(vec![League {
            id: "MLS".to_string(),
            name: "Major League Soccer".to_string(),
            country: Some("USA".to_string()),
        }])
    }

    fn teams(&self, _base_url: &str, league: &str) -> Result<Vec<Team>, ApiError> {
        self.bump(|c| c.catalog += 1);
        self.outage()?;
        Ok(vec![
            Team {
                id: "1".to_string(),
                name: "LA Galaxy".to_string(),
                league: Some(league.to_string()),
            },
            Team {
                id: "2".to_string(),
                name: "Inter Miami".to_string(),
                league: Some(league.to_string()),
            },
        ])
    }

    fn predict(&self, _base_url: &str, request: &MatchRequest) -> Result<PredictionResult, ApiError> {
        self.bump(|c| c.predict += 1);
        self.outage()?;
        Ok(remote_prediction(request))
    }

    fn batch_predict(
        &self,
        _base_url: &str,
        requests: &[MatchRequest],
    ) -> Result<Vec<PredictionResult>, ApiError> {
        self.bump(|c| c.batch += 1);
        self.outage()?;
        Ok(requests.iter().map(remote_prediction).collect())
    }

    fn upcoming(
        &self,
        _base_url: &str,
        _league: Option<&str>,
        _days: u32,
    ) -> Result<Vec<UpcomingMatch>, ApiError> {
        self.bump(|c| c.catalog += 1);
        self.outage()?;
        Ok(Vec::new())
    }

    fn history(&self, _base_url: &str) -> Result<Vec<PredictionResult>, ApiError> {
        self.bump(|c| c.history += 1);
        self.outage()?;
        Ok(vec![remote_prediction(&MatchRequest::new("A", "B", "MLS", None))])
    }
}

/// A predictor pointed at `https://x.test/api` with a frozen clock.
pub fn predictor(api: FakeApi) -> Predictor<MemoryStore, FakeApi> {
    let cache = ConnectivityCache::new(MemoryStore::new(), Some("https://x.test".to_string()));
    Predictor::new(cache, api)
        .with_seed(Some(11))
        .with_clock(Box::new(|| {
            Utc.timestamp_millis_opt(NOW_MILLIS)
                .single()
                .unwrap_or_else(Utc::now)
        }))
}
