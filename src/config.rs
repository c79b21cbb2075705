use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::http_client::DEFAULT_TIMEOUT_SECS;
use crate::store::default_db_path;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5000/api";

#[derive(Debug, Clone)]
pub struct Config {
    /// Used until an endpoint is saved in settings. `None` when explicitly blanked.
    pub default_api_url: Option<String>,
    pub health_ttl: Duration,
    pub http_timeout: Duration,
    pub upcoming_days: u32,
    pub db_path: Option<PathBuf>,
    pub seed: Option<u64>,
}

impl Config {
    pub fn from_env() -> Self {
        let default_api_url = match env::var("PREDICT_API_URL") {
            Ok(raw) => Some(raw.trim().to_string()).filter(|s| !s.is_empty()),
            Err(_) => Some(DEFAULT_API_URL.to_string()),
        };
        let health_ttl_secs = env_u64("HEALTH_CACHE_SECS", 300).clamp(5, 86_400);
        let http_timeout_secs = env_u64("HTTP_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS).clamp(1, 120);
        let upcoming_days = env_u64("UPCOMING_DAYS", 7).clamp(1, 30) as u32;
        let db_path = env::var("MATCHCAST_DB")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .or_else(default_db_path);
        let seed = env::var("MATCHCAST_SEED")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            default_api_url,
            health_ttl: Duration::from_secs(health_ttl_secs),
            http_timeout: Duration::from_secs(http_timeout_secs),
            upcoming_days,
            db_path,
            seed,
        }
    }
}

/// Reads `.env.local` then `.env`; values already in the environment win.
pub fn load_dotenv() {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|val| val.trim().parse::<u64>().ok())
        .unwrap_or(default)
}
