use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct League {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    #[serde(deserialize_with = "de_id_string")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub league: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpcomingMatch {
    #[serde(deserialize_with = "de_id_string")]
    pub id: String,
    pub home_team: String,
    pub away_team: String,
    pub league: String,
    pub date: String,
    #[serde(default)]
    pub time: Option<String>,
}

/// Input to a single prediction. Serializes to the `/predict` request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRequest {
    pub home_team: String,
    pub away_team: String,
    pub league: String,
    #[serde(default)]
    pub date: Option<String>,
}

impl MatchRequest {
    pub fn new(
        home_team: impl Into<String>,
        away_team: impl Into<String>,
        league: impl Into<String>,
        date: Option<&str>,
    ) -> Self {
        Self {
            home_team: home_team.into(),
            away_team: away_team.into(),
            league: league.into(),
            date: date.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    HomeWin,
    Draw,
    AwayWin,
}

impl Outcome {
    /// Picks the most likely outcome. Ties resolve toward home, then draw.
    pub fn from_probabilities(p: &Probabilities) -> Self {
        if p.home_win >= p.draw && p.home_win >= p.away_win {
            Outcome::HomeWin
        } else if p.draw >= p.away_win {
            Outcome::Draw
        } else {
            Outcome::AwayWin
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Outcome::HomeWin => "Home win",
            Outcome::Draw => "Draw",
            Outcome::AwayWin => "Away win",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Probabilities {
    #[serde(deserialize_with = "de_f64_lenient")]
    pub home_win: f64,
    #[serde(deserialize_with = "de_f64_lenient")]
    pub draw: f64,
    #[serde(deserialize_with = "de_f64_lenient")]
    pub away_win: f64,
}

impl Probabilities {
    pub fn sum(&self) -> f64 {
        self.home_win + self.draw + self.away_win
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictedScore {
    pub home: u8,
    pub away: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    #[serde(default, deserialize_with = "de_opt_id_string")]
    pub match_id: Option<String>,
    pub home_team: String,
    pub away_team: String,
    pub league: String,
    #[serde(default)]
    pub match_date: Option<String>,
    pub probabilities: Probabilities,
    pub predicted_result: Outcome,
    pub predicted_score: PredictedScore,
    #[serde(deserialize_with = "de_f64_lenient")]
    pub confidence: f64,
    #[serde(default)]
    pub insights: Vec<String>,
    #[serde(default)]
    pub key_factors: Vec<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub is_mock: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub model_loaded: Option<bool>,
    #[serde(default)]
    pub error: Option<String>,
}

impl HealthResponse {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

fn de_f64_lenient<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    as_f64_any(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("expected number, got {value}")))
}

fn de_id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    as_id_string(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("expected id, got {value}")))
}

fn de_opt_id_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(as_id_string(&value))
}

fn as_f64_any(v: &Value) -> Option<f64> {
    if let Some(n) = v.as_f64() {
        return Some(n);
    }
    v.as_str()?.trim().parse::<f64>().ok()
}

fn as_id_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
