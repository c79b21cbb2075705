use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::model::HealthResponse;
use crate::store::KeyValueStore;

pub const API_URL_KEY: &str = "soccer_prediction_api_url";
pub const API_HEALTH_KEY: &str = "soccer_prediction_api_health";
pub const API_LAST_CHECK_KEY: &str = "soccer_prediction_api_last_check";

pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);
const API_SUFFIX: &str = "/api";

/// Anything able to ask a base URL whether it is ready to serve predictions.
pub trait HealthProbe {
    fn check_health(&self, base_url: &str) -> Result<HealthResponse, ApiError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Unknown,
    Healthy,
    Unhealthy,
}

impl HealthStatus {
    pub fn is_healthy(self) -> bool {
        self == HealthStatus::Healthy
    }

    fn as_stored(self) -> Option<&'static str> {
        match self {
            HealthStatus::Healthy => Some("healthy"),
            HealthStatus::Unhealthy => Some("unhealthy"),
            HealthStatus::Unknown => None,
        }
    }

    fn from_stored(raw: &str) -> Option<Self> {
        match raw {
            "healthy" => Some(HealthStatus::Healthy),
            "unhealthy" => Some(HealthStatus::Unhealthy),
            _ => None,
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            HealthStatus::Unknown => "unknown",
            HealthStatus::Healthy => "healthy",
            HealthStatus::Unhealthy => "unhealthy",
        };
        f.write_str(label)
    }
}

/// Snapshot of the persisted connectivity state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectivityRecord {
    pub remote_base_url: Option<String>,
    pub last_status: HealthStatus,
    pub last_checked_at_millis: Option<i64>,
}

impl ConnectivityRecord {
    fn cached_verdict(&self, ttl_millis: i64, now_millis: i64) -> Option<HealthStatus> {
        let checked_at = self.last_checked_at_millis?;
        if self.last_status == HealthStatus::Unknown {
            return None;
        }
        let age = now_millis.checked_sub(checked_at)?;
        // A clock that moved backwards makes the verdict's age meaningless.
        if age < 0 || age >= ttl_millis {
            return None;
        }
        Some(self.last_status)
    }
}

/// Remembers which prediction service to talk to and whether it answered
/// healthy recently, so callers don't probe on every request.
pub struct ConnectivityCache<S> {
    store: S,
    default_endpoint: Option<String>,
}

impl<S: KeyValueStore> ConnectivityCache<S> {
    pub fn new(store: S, default_endpoint: Option<String>) -> Self {
        Self {
            store,
            default_endpoint: default_endpoint.and_then(|url| normalize_endpoint(&url)),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// The saved endpoint, or the configured default when nothing was saved.
    pub fn endpoint(&self) -> Option<String> {
        self.stored(API_URL_KEY)
            .or_else(|| self.default_endpoint.clone())
    }

    pub fn record(&self) -> ConnectivityRecord {
        let status = self
            .stored(API_HEALTH_KEY)
            .and_then(|raw| HealthStatus::from_stored(&raw));
        let checked_at = self
            .stored(API_LAST_CHECK_KEY)
            .and_then(|raw| raw.trim().parse::<i64>().ok());

        // Status and timestamp are only meaningful as a pair.
        let (last_status, last_checked_at_millis) = match (status, checked_at) {
            (Some(status), Some(at)) => (status, Some(at)),
            _ => (HealthStatus::Unknown, None),
        };
        ConnectivityRecord {
            remote_base_url: self.endpoint(),
            last_status,
            last_checked_at_millis,
        }
    }

    /// Saves a new endpoint and forgets the verdict recorded for the old one.
    pub fn set_endpoint(&mut self, url: &str) -> Result<String> {
        let normalized = normalize_endpoint(url)
            .ok_or_else(|| ApiError::validation("Please enter a valid API URL"))?;
        self.store
            .write_batch(&[
                (API_URL_KEY, Some(normalized.as_str())),
                (API_HEALTH_KEY, None),
                (API_LAST_CHECK_KEY, None),
            ])
            .context("persist api endpoint")?;
        info!(endpoint = %normalized, "api endpoint saved");
        Ok(normalized)
    }

    /// Healthy or unhealthy; never fails. Reuses a verdict younger than `ttl_millis`.
    pub fn is_available(
        &mut self,
        ttl_millis: i64,
        now_millis: i64,
        probe: &dyn HealthProbe,
    ) -> HealthStatus {
        let record = self.record();
        let Some(base_url) = record.remote_base_url.clone() else {
            debug!("no api endpoint configured");
            return HealthStatus::Unhealthy;
        };
        if let Some(cached) = record.cached_verdict(ttl_millis, now_millis) {
            debug!(status = %cached, "health cache hit");
            return cached;
        }
        self.probe_and_record(&base_url, now_millis, probe)
    }

    /// Probes regardless of cache age, recording the outcome.
    pub fn force_probe(&mut self, now_millis: i64, probe: &dyn HealthProbe) -> HealthStatus {
        let Some(base_url) = self.endpoint() else {
            return HealthStatus::Unhealthy;
        };
        self.probe_and_record(&base_url, now_millis, probe)
    }

    fn probe_and_record(
        &mut self,
        base_url: &str,
        now_millis: i64,
        probe: &dyn HealthProbe,
    ) -> HealthStatus {
        let status = match probe.check_health(base_url) {
            Ok(health) if health.is_healthy() => HealthStatus::Healthy,
            Ok(health) => {
                info!(
                    status = %health.status,
                    error = health.error.as_deref().unwrap_or(""),
                    "api reported not healthy"
                );
                HealthStatus::Unhealthy
            }
            Err(err) => {
                warn!("api health check failed: {err}");
                HealthStatus::Unhealthy
            }
        };

        let checked_at = now_millis.to_string();
        let written = self.store.write_batch(&[
            (API_HEALTH_KEY, status.as_stored()),
            (API_LAST_CHECK_KEY, Some(checked_at.as_str())),
        ]);
        if let Err(err) = written {
            warn!("failed to persist health verdict: {err}");
        }
        status
    }

    fn stored(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value.filter(|v| !v.trim().is_empty()),
            Err(err) => {
                warn!(key, "settings read failed: {err}");
                None
            }
        }
    }
}

/// Trims the URL and makes sure it ends in `/api`. Empty input yields `None`.
pub fn normalize_endpoint(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.ends_with(API_SUFFIX) {
        Some(trimmed.to_string())
    } else {
        Some(format!("{trimmed}{API_SUFFIX}"))
    }
}

pub fn ttl_millis(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)
}
