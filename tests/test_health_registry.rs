//! Circuit breaker lifecycle through the public registry API

use std::sync::Arc;
use std::time::Duration;

use relay::{CircuitState, HealthRegistry, HealthSettings, ProviderAdapter};
use relay_llm::ScriptedAdapter;

fn registry() -> HealthRegistry {
    HealthRegistry::new(HealthSettings {
        cooldown: Duration::from_secs(15),
        failure_threshold: 3,
        latency_window: 100,
    })
}

fn fail(registry: &HealthRegistry, id: &str) -> CircuitState {
    let permit = registry.before_call(id).unwrap();
    registry.after_call(permit, Duration::from_millis(50), false, false)
}

fn succeed(registry: &HealthRegistry, id: &str, latency: Duration) -> CircuitState {
    let permit = registry.before_call(id).unwrap();
    registry.after_call(permit, latency, true, true)
}

#[tokio::test(start_paused = true)]
async fn test_circuit_opens_after_more_than_threshold_failures() {
    let registry = registry();
    for _ in 0..3 {
        assert_eq!(fail(&registry, "p"), CircuitState::Closed);
    }
    assert_eq!(fail(&registry, "p"), CircuitState::Open);

    let rejection = registry.before_call("p").unwrap_err();
    assert_eq!(rejection.provider, "p");
    assert_eq!(rejection.state, CircuitState::Open);
    assert!(!registry.is_admissible("p"));
}

#[tokio::test(start_paused = true)]
async fn test_cooldown_admits_one_probe_and_success_closes() {
    let registry = registry();
    for _ in 0..4 {
        fail(&registry, "p");
    }

    tokio::time::advance(Duration::from_secs(14)).await;
    assert!(registry.before_call("p").is_err());

    tokio::time::advance(Duration::from_secs(1)).await;
    assert!(registry.is_admissible("p"));
    let probe = registry.before_call("p").unwrap();
    assert!(probe.is_probe());
    assert_eq!(probe.state_before(), CircuitState::Open);
    assert_eq!(registry.state("p"), CircuitState::HalfOpen);

    // Only one probe at a time
    let second = registry.before_call("p").unwrap_err();
    assert_eq!(second.state, CircuitState::HalfOpen);

    let state = registry.after_call(probe, Duration::from_millis(80), true, true);
    assert_eq!(state, CircuitState::Closed);
    let snapshot = registry.snapshot("p");
    assert_eq!(snapshot.open_for_ms, None);
    assert_eq!(snapshot.window_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_probe_reopens_immediately() {
    let registry = registry();
    for _ in 0..4 {
        fail(&registry, "p");
    }
    tokio::time::advance(Duration::from_secs(15)).await;

    assert_eq!(fail(&registry, "p"), CircuitState::Open);
    assert!(registry.before_call("p").is_err());
    assert_eq!(registry.snapshot("p").open_for_ms, Some(0));
}

#[tokio::test(start_paused = true)]
async fn test_dropped_probe_permit_frees_the_slot() {
    let registry = registry();
    for _ in 0..4 {
        fail(&registry, "p");
    }
    tokio::time::advance(Duration::from_secs(15)).await;

    let probe = registry.before_call("p").unwrap();
    drop(probe);

    assert_eq!(registry.state("p"), CircuitState::HalfOpen);
    assert!(registry.before_call("p").unwrap().is_probe());
}

#[tokio::test(start_paused = true)]
async fn test_malformed_replies_do_not_open_the_circuit() {
    let registry = registry();
    for _ in 0..10 {
        let permit = registry.before_call("p").unwrap();
        let state = registry.after_call(permit, Duration::from_millis(30), true, false);
        assert_eq!(state, CircuitState::Closed);
    }
    let snapshot = registry.snapshot("p");
    assert_eq!(snapshot.ok_count, 10);
    assert_eq!(snapshot.json_ok_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_best_order_prefers_healthier_and_skips_disabled() {
    let registry = registry();
    let slow: Arc<dyn ProviderAdapter> = Arc::new(ScriptedAdapter::new("slow"));
    let fast: Arc<dyn ProviderAdapter> = Arc::new(ScriptedAdapter::new("fast"));
    let off: Arc<dyn ProviderAdapter> = Arc::new(ScriptedAdapter::new("off").disabled());

    for _ in 0..5 {
        succeed(&registry, "slow", Duration::from_millis(5_000));
        succeed(&registry, "fast", Duration::from_millis(300));
    }

    let order = registry.best_order(&[slow, fast, off]);
    let ids: Vec<&str> = order.iter().map(|p| p.id()).collect();
    assert_eq!(ids, vec!["fast", "slow"]);
}

#[tokio::test(start_paused = true)]
async fn test_fresh_providers_keep_configured_order() {
    let registry = registry();
    let providers: Vec<Arc<dyn ProviderAdapter>> = ["c", "a", "b"]
        .into_iter()
        .map(|id| Arc::new(ScriptedAdapter::new(id)) as Arc<dyn ProviderAdapter>)
        .collect();

    let ids: Vec<String> = registry
        .best_order(&providers)
        .iter()
        .map(|p| p.id().to_string())
        .collect();
    assert_eq!(ids, vec!["c", "a", "b"]);
    assert!((registry.health_score("c") - 0.7).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn test_reset_forgets_everything() {
    let registry = registry();
    for _ in 0..4 {
        fail(&registry, "p");
    }
    registry.reset();
    assert_eq!(registry.state("p"), CircuitState::Closed);
    assert_eq!(registry.snapshot("p").fail_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_failures_between_successes_open_the_circuit() {
    let registry = registry();
    for _ in 0..3 {
        fail(&registry, "p");
    }
    succeed(&registry, "p", Duration::from_millis(80));

    assert_eq!(fail(&registry, "p"), CircuitState::Open);
    let snapshot = registry.snapshot("p");
    assert_eq!(snapshot.fail_count, 4);
    assert_eq!(snapshot.ok_count, 1);
    assert_eq!(snapshot.window_failures, 4);
    assert!(registry.before_call("p").is_err());
}
