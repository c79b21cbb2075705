use anyhow::{Context, Result, bail};

use matchcast::api::PredictionApi;
use matchcast::config::{self, Config};
use matchcast::logging;
use matchcast::model::MatchRequest;
use matchcast::predictor::Predictor;
use matchcast::store::KeyValueStore;

const USAGE: &str =
    "usage: predict_once --home <team> --away <team> --league <id> [--date YYYY-MM-DD] [--api <url>]\n\
     --api targets <url> for this run without touching the saved endpoint";

fn main() -> Result<()> {
    config::load_dotenv();
    let config = Config::from_env();
    let _ = logging::init();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let (Some(home), Some(away), Some(league)) = (
        arg_value(&args, "home"),
        arg_value(&args, "away"),
        arg_value(&args, "league"),
    ) else {
        bail!(USAGE);
    };
    let date = arg_value(&args, "date");

    let request = MatchRequest::new(home, away, league, date.as_deref());
    match arg_value(&args, "api") {
        Some(url) => {
            let predictor = Predictor::with_endpoint_override(&config, &url)?;
            if let Some(endpoint) = predictor.cache().endpoint() {
                eprintln!("API endpoint (this run only): {endpoint}");
            }
            run(predictor, &request)
        }
        None => run(Predictor::from_config(&config)?, &request),
    }
}

fn run<S: KeyValueStore, A: PredictionApi>(
    mut predictor: Predictor<S, A>,
    request: &MatchRequest,
) -> Result<()> {
    let status = predictor.availability();
    eprintln!("API status: {status}");

    let sourced = predictor.prediction_or_fallback(request)?;
    if let Some(warning) = &sourced.warning {
        eprintln!("warning: {warning}");
    }
    if sourced.is_fallback() {
        eprintln!("Using sample data.");
    }

    let json = serde_json::to_string_pretty(&sourced.value).context("serialize prediction")?;
    println!("{json}");
    Ok(())
}

/// Accepts both `--name value` and `--name=value`.
fn arg_value(args: &[String], name: &str) -> Option<String> {
    let flag = format!("--{name}");
    let prefix = format!("--{name}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if *arg == flag {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(next.trim().to_string());
            }
        }
    }
    None
}
