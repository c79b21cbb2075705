use std::time::Duration;

use anyhow::Result;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::connectivity::HealthProbe;
use crate::error::ApiError;
use crate::http_client::build_http_client;
use crate::model::{HealthResponse, League, MatchRequest, PredictionResult, Team, UpcomingMatch};

/// The remote prediction service. Every call names the base URL it targets so
/// one client can follow endpoint changes made in settings.
pub trait PredictionApi: HealthProbe {
    fn leagues(&self, base_url: &str) -> Result<Vec<League>, ApiError>;
    fn teams(&self, base_url: &str, league: &str) -> Result<Vec<Team>, ApiError>;
    fn predict(&self, base_url: &str, request: &MatchRequest)
    -> Result<PredictionResult, ApiError>;
    fn batch_predict(
        &self,
        base_url: &str,
        requests: &[MatchRequest],
    ) -> Result<Vec<PredictionResult>, ApiError>;
    fn upcoming(
        &self,
        base_url: &str,
        league: Option<&str>,
        days: u32,
    ) -> Result<Vec<UpcomingMatch>, ApiError>;
    fn history(&self, base_url: &str) -> Result<Vec<PredictionResult>, ApiError>;
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
}

impl ApiClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_http_client(timeout)?,
        })
    }

    fn get(&self, url: &str, query: &[(&str, &str)]) -> RequestBuilder {
        let builder = self.client.get(url);
        if query.is_empty() {
            builder
        } else {
            builder.query(query)
        }
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
        what: &str,
    ) -> Result<T, ApiError> {
        debug!(url, ?query, "GET");
        let resp = self.get(url, query).send()?;
        read_json(resp, what)
    }

    fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
        what: &str,
    ) -> Result<T, ApiError> {
        debug!(url, "POST");
        let resp = self.client.post(url).json(body).send()?;
        read_json(resp, what)
    }
}

impl HealthProbe for ApiClient {
    fn check_health(&self, base_url: &str) -> Result<HealthResponse, ApiError> {
        let url = format!("{base_url}/health");
        let resp = self.client.get(&url).send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::Service {
                status: status.as_u16(),
                message: "API returned non-200 status".to_string(),
            });
        }
        let body = resp.text()?;
        parse_json(&body, "health response")
    }
}

impl PredictionApi for ApiClient {
    fn leagues(&self, base_url: &str) -> Result<Vec<League>, ApiError> {
        self.get_json(
            &format!("{base_url}/leagues"),
            &[],
            "Failed to fetch leagues",
        )
    }

    fn teams(&self, base_url: &str, league: &str) -> Result<Vec<Team>, ApiError> {
        self.get_json(
            &format!("{base_url}/teams"),
            &[("league", league.trim())],
            "Failed to fetch teams",
        )
    }

    fn predict(
        &self,
        base_url: &str,
        request: &MatchRequest,
    ) -> Result<PredictionResult, ApiError> {
        self.post_json(
            &format!("{base_url}/predict"),
            request,
            "Failed to make prediction",
        )
    }

    fn batch_predict(
        &self,
        base_url: &str,
        requests: &[MatchRequest],
    ) -> Result<Vec<PredictionResult>, ApiError> {
        let body = BatchBody { matches: requests };
        self.post_json(
            &format!("{base_url}/batch-predict"),
            &body,
            "Failed to make batch predictions",
        )
    }

    fn upcoming(
        &self,
        base_url: &str,
        league: Option<&str>,
        days: u32,
    ) -> Result<Vec<UpcomingMatch>, ApiError> {
        let days = days.to_string();
        self.get_json(
            &format!("{base_url}/upcoming"),
            &upcoming_query(&days, league),
            "Failed to fetch upcoming matches",
        )
    }

    fn history(&self, base_url: &str) -> Result<Vec<PredictionResult>, ApiError> {
        self.get_json(
            &format!("{base_url}/history"),
            &[],
            "Failed to fetch prediction history",
        )
    }
}

#[derive(Serialize)]
struct BatchBody<'a> {
    matches: &'a [MatchRequest],
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    error: Option<String>,
}

fn read_json<T: DeserializeOwned>(resp: Response, what: &str) -> Result<T, ApiError> {
    let status = resp.status();
    let body = resp.text()?;
    if !status.is_success() {
        let err = service_error(status.as_u16(), &body, what);
        warn!("{err}");
        return Err(err);
    }
    parse_json(&body, what)
}

/// Decodes a success body; anything undecodable is the service's fault.
pub fn parse_json<T: DeserializeOwned>(body: &str, what: &str) -> Result<T, ApiError> {
    serde_json::from_str::<T>(body).map_err(|err| ApiError::Service {
        status: 200,
        message: format!("{what}: invalid json ({err})"),
    })
}

/// Builds the error for a non-success response, preferring the `{error}` payload.
pub fn service_error(status: u16, body: &str, fallback: &str) -> ApiError {
    let message = serde_json::from_str::<ErrorPayload>(body)
        .ok()
        .and_then(|payload| payload.error)
        .filter(|msg| !msg.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string());
    ApiError::Service { status, message }
}

/// `days` always, `league` only when one is selected.
fn upcoming_query<'a>(days: &'a str, league: Option<&'a str>) -> Vec<(&'static str, &'a str)> {
    let mut query = vec![("days", days)];
    if let Some(league) = league.map(str::trim).filter(|l| !l.is_empty()) {
        query.push(("league", league));
    }
    query
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{ApiClient, upcoming_query};

    fn client() -> ApiClient {
        ApiClient::new(Duration::from_secs(1)).expect("http client")
    }

    #[test]
    fn team_query_is_url_encoded() {
        let req = client()
            .get("http://x.test/api/teams", &[("league", "La Liga&x=1")])
            .build()
            .expect("request");
        assert_eq!(req.url().path(), "/api/teams");
        assert_eq!(req.url().query(), Some("league=La+Liga%26x%3D1"));
    }

    #[test]
    fn upcoming_query_skips_blank_league() {
        assert_eq!(upcoming_query("7", None), vec![("days", "7")]);
        assert_eq!(upcoming_query("7", Some("  ")), vec![("days", "7")]);
        assert_eq!(
            upcoming_query("3", Some("PL")),
            vec![("days", "3"), ("league", "PL")]
        );

        let req = client()
            .get("http://x.test/api/upcoming", &upcoming_query("3", Some("PL")))
            .build()
            .expect("request");
        assert_eq!(req.url().query(), Some("days=3&league=PL"));
    }

    #[test]
    fn empty_query_leaves_url_untouched() {
        let req = client()
            .get("http://x.test/api/leagues", &[])
            .build()
            .expect("request");
        assert_eq!(req.url().as_str(), "http://x.test/api/leagues");
    }
}
