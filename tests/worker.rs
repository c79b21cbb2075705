mod common;

use std::sync::mpsc;
use std::time::Duration;

use matchcast::connectivity::HealthStatus;
use matchcast::model::MatchRequest;
use matchcast::state::{Delta, MessageKind, ProviderCommand};
use matchcast::worker::spawn_provider;

use common::{FakeApi, predictor};

const WAIT: Duration = Duration::from_secs(5);

fn collect(rx: &mpsc::Receiver<Delta>, n: usize) -> Vec<Delta> {
    (0..n)
        .map(|_| rx.recv_timeout(WAIT).expect("delta from worker"))
        .collect()
}

#[test]
fn refresh_sends_status_then_catalogs() {
    let (tx, rx) = mpsc::channel();
    let (cmd_tx, cmd_rx) = mpsc::channel();
    let handle = spawn_provider(predictor(FakeApi::unhealthy()), 7, tx, cmd_rx);

    cmd_tx.send(ProviderCommand::Refresh { league: None }).unwrap();
    let deltas = collect(&rx, 5);

    assert!(matches!(
        deltas[0],
        Delta::SetStatus {
            status: HealthStatus::Unhealthy,
            ..
        }
    ));
    match &deltas[1] {
        Delta::SetLeagues(leagues) => assert_eq!(leagues.value.len(), 5),
        other => panic!("expected leagues, got {other:?}"),
    }
    match &deltas[2] {
        Delta::SetTeams { league, teams } => {
            assert_eq!(league, "PL");
            assert_eq!(teams.value.len(), 5);
        }
        other => panic!("expected teams, got {other:?}"),
    }
    assert!(matches!(deltas[3], Delta::SetUpcoming(_)));
    assert!(matches!(deltas[4], Delta::SetHistory(_)));

    drop(cmd_tx);
    handle.join().unwrap();
}

#[test]
fn refresh_loads_teams_for_the_selected_league() {
    let (tx, rx) = mpsc::channel();
    let (cmd_tx, cmd_rx) = mpsc::channel();
    let handle = spawn_provider(predictor(FakeApi::unhealthy()), 7, tx, cmd_rx);

    for (selected, expected) in [(Some("LL"), "LL"), (Some("MLS"), "PL")] {
        cmd_tx
            .send(ProviderCommand::Refresh {
                league: selected.map(str::to_string),
            })
            .unwrap();
        let deltas = collect(&rx, 5);
        match &deltas[2] {
            Delta::SetTeams { league, teams } => {
                assert_eq!(league, expected);
                assert!(
                    teams
                        .value
                        .iter()
                        .all(|t| t.league.as_deref() == Some(expected))
                );
            }
            other => panic!("expected teams, got {other:?}"),
        }
    }

    drop(cmd_tx);
    handle.join().unwrap();
}

#[test]
fn predict_answers_with_request_id() {
    let (tx, rx) = mpsc::channel();
    let (cmd_tx, cmd_rx) = mpsc::channel();
    let handle = spawn_provider(predictor(FakeApi::healthy()), 7, tx, cmd_rx);

    cmd_tx
        .send(ProviderCommand::Predict {
            request_id: 3,
            request: MatchRequest::new("Arsenal", "Chelsea", "PL", None),
        })
        .unwrap();
    cmd_tx
        .send(ProviderCommand::Predict {
            request_id: 4,
            request: MatchRequest::new("Arsenal", "Arsenal", "PL", None),
        })
        .unwrap();
    let deltas = collect(&rx, 4);

    match &deltas[0] {
        Delta::PredictionReady { request_id, result } => {
            assert_eq!(*request_id, 3);
            assert!(!result.is_fallback());
        }
        other => panic!("expected prediction, got {other:?}"),
    }
    assert!(matches!(deltas[1], Delta::SetStatus { .. }));
    match &deltas[2] {
        Delta::PredictionFailed { request_id, message } => {
            assert_eq!(*request_id, 4);
            assert_eq!(message, "Home team and away team cannot be the same");
        }
        other => panic!("expected failure, got {other:?}"),
    }

    drop(cmd_tx);
    handle.join().unwrap();
}

#[test]
fn saving_endpoint_tests_the_connection() {
    let api = FakeApi::healthy();
    let (tx, rx) = mpsc::channel();
    let (cmd_tx, cmd_rx) = mpsc::channel();
    let handle = spawn_provider(predictor(api.clone()), 7, tx, cmd_rx);

    cmd_tx
        .send(ProviderCommand::SaveEndpoint {
            url: "https://abc.ngrok.app".to_string(),
        })
        .unwrap();
    let deltas = collect(&rx, 5);

    match &deltas[0] {
        Delta::EndpointSaved { url } => assert_eq!(url, "https://abc.ngrok.app/api"),
        other => panic!("expected saved endpoint, got {other:?}"),
    }
    assert!(matches!(deltas[1], Delta::Log(_)));
    assert!(matches!(
        deltas[2],
        Delta::SettingsMessage {
            kind: MessageKind::Info,
            ..
        }
    ));
    assert!(matches!(
        deltas[3],
        Delta::SettingsMessage {
            kind: MessageKind::Success,
            ..
        }
    ));
    assert!(matches!(
        deltas[4],
        Delta::SetStatus {
            status: HealthStatus::Healthy,
            ..
        }
    ));
    // The forced probe leaves a fresh verdict for the status read that follows.
    assert_eq!(api.calls().health, 1);

    cmd_tx
        .send(ProviderCommand::SaveEndpoint {
            url: "  ".to_string(),
        })
        .unwrap();
    match rx.recv_timeout(WAIT).expect("delta") {
        Delta::SettingsMessage { kind, text } => {
            assert_eq!(kind, MessageKind::Error);
            assert_eq!(text, "Please enter a valid API URL");
        }
        other => panic!("expected error message, got {other:?}"),
    }

    drop(cmd_tx);
    handle.join().unwrap();
}
