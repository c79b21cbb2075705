use std::cell::RefCell;
use std::collections::VecDeque;

use matchcast::connectivity::{
    API_HEALTH_KEY, API_LAST_CHECK_KEY, API_URL_KEY, ConnectivityCache, HealthProbe, HealthStatus,
};
use matchcast::error::ApiError;
use matchcast::model::HealthResponse;
use matchcast::store::{KeyValueStore, MemoryStore};

const TTL: i64 = 5 * 60 * 1000;

/// Answers probes from a script and remembers which URLs were asked.
#[derive(Default)]
struct ScriptedProbe {
    answers: RefCell<VecDeque<Result<HealthResponse, ApiError>>>,
    calls: RefCell<Vec<String>>,
}

impl ScriptedProbe {
    fn always_healthy(n: usize) -> Self {
        let probe = Self::default();
        for _ in 0..n {
            probe.push(Ok(health("healthy")));
        }
        probe
    }

    fn push(&self, answer: Result<HealthResponse, ApiError>) {
        self.answers.borrow_mut().push_back(answer);
    }

    fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl HealthProbe for ScriptedProbe {
    fn check_health(&self, base_url: &str) -> Result<HealthResponse, ApiError> {
        self.calls.borrow_mut().push(base_url.to_string());
        self.answers
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::Transport("script exhausted".to_string())))
    }
}

fn health(status: &str) -> HealthResponse {
    HealthResponse {
        status: status.to_string(),
        model_loaded: Some(true),
        error: None,
    }
}

fn cache_with(url: &str) -> ConnectivityCache<MemoryStore> {
    let mut cache = ConnectivityCache::new(MemoryStore::new(), None);
    cache.set_endpoint(url).expect("valid url");
    cache
}

#[test]
fn first_check_normalizes_and_persists_verdict() {
    let mut cache = cache_with("https://x.test");
    let probe = ScriptedProbe::always_healthy(1);

    let status = cache.is_available(TTL, 1_000, &probe);

    assert_eq!(status, HealthStatus::Healthy);
    assert_eq!(*probe.calls.borrow(), vec!["https://x.test/api".to_string()]);
    let store = cache.store();
    assert_eq!(
        store.get(API_URL_KEY).unwrap().as_deref(),
        Some("https://x.test/api")
    );
    assert_eq!(store.get(API_HEALTH_KEY).unwrap().as_deref(), Some("healthy"));
    assert_eq!(store.get(API_LAST_CHECK_KEY).unwrap().as_deref(), Some("1000"));
}

#[test]
fn fresh_verdict_is_reused_until_ttl_elapses() {
    let mut cache = cache_with("https://x.test");
    let probe = ScriptedProbe::always_healthy(2);

    assert_eq!(cache.is_available(TTL, 1_000, &probe), HealthStatus::Healthy);
    assert_eq!(
        cache.is_available(TTL, 1_000 + TTL - 1, &probe),
        HealthStatus::Healthy
    );
    assert_eq!(probe.call_count(), 1);

    assert_eq!(
        cache.is_available(TTL, 1_000 + TTL, &probe),
        HealthStatus::Healthy
    );
    assert_eq!(probe.call_count(), 2);
    assert_eq!(
        cache.record().last_checked_at_millis,
        Some(1_000 + TTL)
    );
}

#[test]
fn unhealthy_verdict_is_cached_too() {
    let mut cache = cache_with("https://x.test");
    let probe = ScriptedProbe::default();
    probe.push(Ok(health("unhealthy")));

    assert_eq!(cache.is_available(TTL, 0, &probe), HealthStatus::Unhealthy);
    assert_eq!(cache.is_available(TTL, 10, &probe), HealthStatus::Unhealthy);
    assert_eq!(probe.call_count(), 1);
    assert_eq!(
        cache.store().get(API_HEALTH_KEY).unwrap().as_deref(),
        Some("unhealthy")
    );
}

#[test]
fn changing_endpoint_forces_a_new_probe() {
    let mut cache = cache_with("https://old.test");
    let probe = ScriptedProbe::always_healthy(2);
    cache.is_available(TTL, 1_000, &probe);

    cache.set_endpoint("https://new.test/api").expect("valid url");
    let record = cache.record();
    assert_eq!(record.last_status, HealthStatus::Unknown);
    assert_eq!(record.last_checked_at_millis, None);

    cache.is_available(TTL, 1_001, &probe);
    assert_eq!(
        *probe.calls.borrow(),
        vec![
            "https://old.test/api".to_string(),
            "https://new.test/api".to_string()
        ]
    );
}

#[test]
fn transport_error_degrades_to_unhealthy() {
    let mut cache = cache_with("https://x.test");
    let probe = ScriptedProbe::default();
    probe.push(Err(ApiError::Transport("connection refused".to_string())));

    assert_eq!(cache.is_available(TTL, 5, &probe), HealthStatus::Unhealthy);
    let record = cache.record();
    assert_eq!(record.last_status, HealthStatus::Unhealthy);
    assert_eq!(record.last_checked_at_millis, Some(5));
}

#[test]
fn service_error_degrades_to_unhealthy() {
    let mut cache = cache_with("https://x.test");
    let probe = ScriptedProbe::default();
    probe.push(Err(ApiError::Service {
        status: 502,
        message: "bad gateway".to_string(),
    }));
    assert_eq!(cache.is_available(TTL, 5, &probe), HealthStatus::Unhealthy);
}

#[test]
fn missing_endpoint_never_probes() {
    let mut cache = ConnectivityCache::new(MemoryStore::new(), None);
    let probe = ScriptedProbe::always_healthy(1);

    assert_eq!(cache.is_available(TTL, 0, &probe), HealthStatus::Unhealthy);
    assert_eq!(probe.call_count(), 0);
    assert!(cache.store().is_empty());
}

#[test]
fn configured_default_is_used_until_a_url_is_saved() {
    let mut cache =
        ConnectivityCache::new(MemoryStore::new(), Some("http://127.0.0.1:5000".to_string()));
    let probe = ScriptedProbe::always_healthy(1);

    assert_eq!(
        cache.endpoint().as_deref(),
        Some("http://127.0.0.1:5000/api")
    );
    assert_eq!(cache.is_available(TTL, 0, &probe), HealthStatus::Healthy);
    assert_eq!(*probe.calls.borrow(), vec!["http://127.0.0.1:5000/api".to_string()]);
}

#[test]
fn half_written_record_is_not_trusted() {
    let mut store = MemoryStore::new();
    store.set(API_URL_KEY, "https://x.test/api").unwrap();
    store.set(API_HEALTH_KEY, "healthy").unwrap();
    let mut cache = ConnectivityCache::new(store, None);
    assert_eq!(cache.record().last_status, HealthStatus::Unknown);

    let probe = ScriptedProbe::default();
    probe.push(Ok(health("unhealthy")));
    assert_eq!(cache.is_available(TTL, 0, &probe), HealthStatus::Unhealthy);
    assert_eq!(probe.call_count(), 1);
}

#[test]
fn clock_moving_backwards_triggers_probe() {
    let mut cache = cache_with("https://x.test");
    let probe = ScriptedProbe::always_healthy(2);
    cache.is_available(TTL, 10_000, &probe);
    cache.is_available(TTL, 9_000, &probe);
    assert_eq!(probe.call_count(), 2);
}

#[test]
fn force_probe_ignores_fresh_cache() {
    let mut cache = cache_with("https://x.test");
    let probe = ScriptedProbe::always_healthy(1);
    probe.push(Ok(health("unhealthy")));

    assert_eq!(cache.is_available(TTL, 0, &probe), HealthStatus::Healthy);
    assert_eq!(cache.force_probe(1, &probe), HealthStatus::Unhealthy);
    assert_eq!(cache.is_available(TTL, 2, &probe), HealthStatus::Unhealthy);
    assert_eq!(probe.call_count(), 2);
}

#[test]
fn blank_endpoint_is_rejected_as_validation() {
    let mut cache = ConnectivityCache::new(MemoryStore::new(), None);
    let err = cache.set_endpoint("   ").expect_err("blank url");
    let api_err = err.downcast_ref::<ApiError>().expect("validation error");
    assert!(api_err.is_validation());
    assert!(cache.store().is_empty());
}
