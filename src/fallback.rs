use chrono::{DateTime, Utc};
use rand::Rng;

use crate::model::{
    League, MatchRequest, Outcome, PredictedScore, PredictionResult, Probabilities, Team,
    UpcomingMatch,
};

const HOME_WIN_BASE: f64 = 0.25;
const HOME_WIN_SPAN: f64 = 0.5;
const DRAW_BASE: f64 = 0.15;
const DRAW_SPAN: f64 = 0.3;
const CONFIDENCE_BASE: f64 = 0.6;
const CONFIDENCE_SPAN: f64 = 0.3;
const MAX_GOALS: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogKind {
    Leagues,
    Teams,
    UpcomingMatches,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Catalog {
    Leagues(Vec<League>),
    Teams(Vec<Team>),
    UpcomingMatches(Vec<UpcomingMatch>),
}

/// Built-in reference data, identical on every call.
pub fn catalog(kind: CatalogKind) -> Catalog {
    match kind {
        CatalogKind::Leagues => Catalog::Leagues(seed_leagues()),
        CatalogKind::Teams => Catalog::Teams(seed_teams()),
        CatalogKind::UpcomingMatches => Catalog::UpcomingMatches(seed_upcoming()),
    }
}

pub fn leagues() -> Vec<League> {
    seed_leagues()
}

pub fn teams(league: Option<&str>) -> Vec<Team> {
    let mut teams = seed_teams();
    if let Some(league) = league {
        teams.retain(|t| t.league.as_deref() == Some(league));
    }
    teams
}

pub fn upcoming_matches(league: Option<&str>) -> Vec<UpcomingMatch> {
    let mut matches = seed_upcoming();
    if let Some(league) = league.filter(|l| !l.trim().is_empty()) {
        matches.retain(|m| m.league == league);
    }
    matches
}

/// A plausible prediction generated without the remote model.
pub fn synthesize_prediction(
    rng: &mut impl Rng,
    request: &MatchRequest,
    now: DateTime<Utc>,
) -> PredictionResult {
    let home_win = HOME_WIN_BASE + rng.r#gen::<f64>() * HOME_WIN_SPAN;
    let draw = DRAW_BASE + rng.r#gen::<f64>() * DRAW_SPAN;
    let probabilities = complete_triple(home_win, draw);
    let predicted_result = Outcome::from_probabilities(&probabilities);

    let predicted_score = PredictedScore {
        home: rng.gen_range(0..=MAX_GOALS),
        away: rng.gen_range(0..=MAX_GOALS),
    };
    let confidence = round4(CONFIDENCE_BASE + rng.r#gen::<f64>() * CONFIDENCE_SPAN);

    let home = request.home_team.as_str();
    let away = request.away_team.as_str();
    PredictionResult {
        match_id: Some(format!("mock-{}", now.timestamp_millis())),
        home_team: home.to_string(),
        away_team: away.to_string(),
        league: request.league.clone(),
        match_date: request
            .date
            .clone()
            .or_else(|| Some(now.format("%Y-%m-%d").to_string())),
        probabilities,
        predicted_result,
        predicted_score,
        confidence,
        insights: vec![
            format!("{home} has strong home form recently."),
            format!("{away} has struggled in away matches this season."),
            "Historical head-to-head matches favor the home team.".to_string(),
            "Weather conditions are favorable for high-scoring game.".to_string(),
        ],
        key_factors: vec![
            "Recent form".to_string(),
            "Home advantage".to_string(),
            "Head-to-head record".to_string(),
            "Squad availability".to_string(),
        ],
        timestamp: Some(now.to_rfc3339()),
        is_mock: true,
    }
}

pub fn synthesize_batch(
    rng: &mut impl Rng,
    requests: &[MatchRequest],
    now: DateTime<Utc>,
) -> Vec<PredictionResult> {
    requests
        .iter()
        .map(|req| synthesize_prediction(rng, req, now))
        .collect()
}

/// Derives the away probability as the remainder. When the two draws already
/// exceed one, the away share is clipped to zero and the pair rescaled.
fn complete_triple(home_win: f64, draw: f64) -> Probabilities {
    let home_win = home_win.max(0.0);
    let draw = draw.max(0.0);
    let (home_win, draw) = if home_win + draw > 1.0 {
        let sum = home_win + draw;
        (home_win / sum, draw / sum)
    } else {
        (home_win, draw)
    };
    let away_win = (1.0 - home_win - draw).max(0.0);
    Probabilities {
        home_win,
        draw,
        away_win,
    }
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

fn seed_leagues() -> Vec<League> {
    [
        ("PL", "Premier League", "England"),
        ("LL", "La Liga", "Spain"),
        ("BL", "Bundesliga", "Germany"),
        ("SA", "Serie A", "Italy"),
        ("L1", "Ligue 1", "France"),
    ]
    .into_iter()
    .map(|(id, name, country)| League {
        id: id.to_string(),
        name: name.to_string(),
        country: Some(country.to_string()),
    })
    .collect()
}

fn seed_teams() -> Vec<Team> {
    const TEAMS: [(&str, [&str; 5]); 5] = [
        (
            "PL",
            [
                "Manchester United",
                "Liverpool",
                "Arsenal",
                "Chelsea",
                "Manchester City",
            ],
        ),
        (
            "LL",
            [
                "Real Madrid",
                "Barcelona",
                "Atletico Madrid",
                "Sevilla",
                "Valencia",
            ],
        ),
        (
            "BL",
            [
                "Bayern Munich",
                "Borussia Dortmund",
                "RB Leipzig",
                "Bayer Leverkusen",
                "Wolfsburg",
            ],
        ),
        (
            "SA",
            ["Juventus", "Inter Milan", "AC Milan", "Roma", "Napoli"],
        ),
        ("L1", ["PSG", "Lyon", "Marseille", "Lille", "Monaco"]),
    ];

    let mut out = Vec::with_capacity(25);
    for (league, names) in TEAMS {
        for name in names {
            out.push(Team {
                id: (out.len() + 1).to_string(),
                name: name.to_string(),
                league: Some(league.to_string()),
            });
        }
    }
    out
}

fn seed_upcoming() -> Vec<UpcomingMatch> {
    vec![
        fixture("1", "Manchester United", "Liverpool", "PL", "2025-03-25", "15:00"),
        fixture("2", "Arsenal", "Chelsea", "PL", "2025-03-26", "19:45"),
        fixture("3", "Barcelona", "Real Madrid", "LL", "2025-03-27", "20:00"),
    ]
}

fn fixture(id: &str, home: &str, away: &str, league: &str, date: &str, time: &str) -> UpcomingMatch {
    UpcomingMatch {
        id: id.to_string(),
        home_team: home.to_string(),
        away_team: away.to_string(),
        league: league.to_string(),
        date: date.to_string(),
        time: Some(time.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_triple_clips_negative_remainder() {
        let p = complete_triple(0.74, 0.44);
        assert!(p.away_win >= 0.0);
        assert!((p.sum() - 1.0).abs() < 1e-9);
        assert!(p.home_win > p.draw);
    }

    #[test]
    fn complete_triple_keeps_valid_draws() {
        let p = complete_triple(0.5, 0.3);
        assert!((p.home_win - 0.5).abs() < 1e-12);
        assert!((p.draw - 0.3).abs() < 1e-12);
        assert!((p.away_win - 0.2).abs() < 1e-12);
    }

    #[test]
    fn team_ids_are_sequential_across_leagues() {
        let teams = seed_teams();
        assert_eq!(teams.len(), 25);
        assert_eq!(teams[0].id, "1");
        assert_eq!(teams[5].name, "Real Madrid");
        assert_eq!(teams[5].id, "6");
        assert_eq!(teams[24].id, "25");
    }
}
