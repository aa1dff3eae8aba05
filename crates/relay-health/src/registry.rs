//! Health registry: per-provider circuit breaker and scoring

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use relay_config::{
    Config, DEFAULT_COOLDOWN_SECS, DEFAULT_FAILURE_THRESHOLD, DEFAULT_LATENCY_WINDOW,
};
use relay_llm::ProviderAdapter;
use relay_utils::CircuitState;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::metric::{HealthMetric, HealthSnapshot};

/// Tunables for the circuit breaker and latency window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthSettings {
    /// How long an open circuit rejects calls before admitting a probe
    pub cooldown: Duration,
    /// Consecutive failures tolerated before the circuit opens
    pub failure_threshold: u32,
    /// Number of latency samples retained per provider
    pub latency_window: usize,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(DEFAULT_COOLDOWN_SECS),
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            latency_window: DEFAULT_LATENCY_WINDOW,
        }
    }
}

impl HealthSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            cooldown: config.cooldown(),
            failure_threshold: config.failure_threshold(),
            latency_window: config.latency_window(),
        }
    }
}

/// Rejection returned by [`HealthRegistry::before_call`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Circuit {state} for provider '{provider}'")]
pub struct CircuitOpen {
    pub provider: String,
    pub state: CircuitState,
}

/// Admission ticket for one provider call.
///
/// Hand it back through [`HealthRegistry::after_call`] once the outcome is known.
/// Dropping it unrecorded (a cancelled call) frees the half-open probe slot and
/// leaves the counters untouched.
#[derive(Debug)]
pub struct CallPermit {
    provider: String,
    metric: Arc<Mutex<HealthMetric>>,
    probe: bool,
    state_before: CircuitState,
}

impl CallPermit {
    #[must_use]
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Circuit state observed when the call was admitted
    #[must_use]
    pub fn state_before(&self) -> CircuitState {
        self.state_before
    }

    /// Whether this call is the single half-open recovery probe
    #[must_use]
    pub fn is_probe(&self) -> bool {
        self.probe
    }
}

impl Drop for CallPermit {
    fn drop(&mut self) {
        if self.probe {
            let mut metric = lock(&self.metric);
            metric.probe_in_flight = false;
            debug!(provider = %self.provider, "Released unrecorded probe");
        }
    }
}

fn lock(metric: &Mutex<HealthMetric>) -> MutexGuard<'_, HealthMetric> {
    metric.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Process-wide record of provider health.
///
/// Share it as `Arc<HealthRegistry>`. Each provider's metric sits behind its own
/// mutex, and no lock is ever held across an await point.
#[derive(Debug, Default)]
pub struct HealthRegistry {
    settings: HealthSettings,
    metrics: RwLock<HashMap<String, Arc<Mutex<HealthMetric>>>>,
}

impl HealthRegistry {
    #[must_use]
    pub fn new(settings: HealthSettings) -> Self {
        Self {
            settings,
            metrics: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(HealthSettings::from_config(config))
    }

    #[must_use]
    pub fn settings(&self) -> &HealthSettings {
        &self.settings
    }

    fn metric(&self, id: &str) -> Arc<Mutex<HealthMetric>> {
        {
            let metrics = self.metrics.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(metric) = metrics.get(id) {
                return Arc::clone(metric);
            }
        }
        let mut metrics = self.metrics.write().unwrap_or_else(PoisonError::into_inner);
        let metric = metrics.entry(id.to_string()).or_insert_with(|| {
            Arc::new(Mutex::new(HealthMetric::new(
                self.settings.latency_window,
                self.settings.failure_threshold,
            )))
        });
        Arc::clone(metric)
    }

    /// Ask to call a provider.
    ///
    /// An open circuit rejects until the cooldown has elapsed, then moves to
    /// half-open and admits exactly one probe. A half-open circuit rejects while its
    /// probe is in flight.
    ///
    /// # Errors
    ///
    /// Returns [`CircuitOpen`] when the circuit does not admit the call.
    pub fn before_call(&self, id: &str) -> Result<CallPermit, CircuitOpen> {
        let metric = self.metric(id);
        let (probe, state_before) = {
            let mut m = lock(&metric);
            let state_before = m.state;
            let probe = match m.state {
                CircuitState::Closed => false,
                CircuitState::Open => {
                    let cooled = m
                        .opened_at
                        .is_none_or(|opened| opened.elapsed() >= self.settings.cooldown);
                    if !cooled {
                        return Err(CircuitOpen {
                            provider: id.to_string(),
                            state: CircuitState::Open,
                        });
                    }
                    m.state = CircuitState::HalfOpen;
                    m.probe_in_flight = true;
                    info!(provider = %id, "Circuit half-open, admitting probe");
                    true
                }
                CircuitState::HalfOpen => {
                    if m.probe_in_flight {
                        return Err(CircuitOpen {
                            provider: id.to_string(),
                            state: CircuitState::HalfOpen,
                        });
                    }
                    m.probe_in_flight = true;
                    true
                }
            };
            (probe, state_before)
        };

        Ok(CallPermit {
            provider: id.to_string(),
            metric,
            probe,
            state_before,
        })
    }

    /// Record the outcome of an admitted call and return the resulting state.
    ///
    /// `ok` means the provider produced a reply; `json_valid` means that reply
    /// passed validation. Only `ok = false` counts toward opening the circuit.
    pub fn after_call(
        &self,
        mut permit: CallPermit,
        latency: Duration,
        ok: bool,
        json_valid: bool,
    ) -> CircuitState {
        let id = permit.provider.clone();
        let mut m = lock(&permit.metric);

        if ok {
            m.ok_count += 1;
            if json_valid {
                m.json_ok_count += 1;
            }
        } else {
            m.fail_count += 1;
        }
        m.latencies_ms.push(latency.as_millis() as u64);

        if permit.probe {
            m.probe_in_flight = false;
            permit.probe = false;
        }

        m.outcomes.push(!ok);

        if ok {
            if m.state != CircuitState::Closed {
                info!(provider = %id, from = %m.state, "Circuit closed");
                m.state = CircuitState::Closed;
                m.opened_at = None;
                m.outcomes.clear();
            }
        } else {
            let failures = m.window_failures();
            let trips =
                m.state == CircuitState::HalfOpen || failures > self.settings.failure_threshold;
            if trips && m.state != CircuitState::Open {
                info!(provider = %id, from = %m.state, failures, "Circuit opened");
                m.state = CircuitState::Open;
                m.opened_at = Some(Instant::now());
            }
        }

        m.state
    }

    /// Whether `before_call` would currently admit a call, without mutating state
    #[must_use]
    pub fn is_admissible(&self, id: &str) -> bool {
        let metric = self.metric(id);
        let m = lock(&metric);
        match m.state {
            CircuitState::Closed => true,
            CircuitState::Open => m
                .opened_at
                .is_none_or(|opened| opened.elapsed() >= self.settings.cooldown),
            CircuitState::HalfOpen => !m.probe_in_flight,
        }
    }

    #[must_use]
    pub fn health_score(&self, id: &str) -> f64 {
        lock(&self.metric(id)).score()
    }

    #[must_use]
    pub fn state(&self, id: &str) -> CircuitState {
        lock(&self.metric(id)).state
    }

    /// Enabled, admissible candidates sorted by descending health score.
    ///
    /// Ties keep the caller's order.
    #[must_use]
    pub fn best_order(
        &self,
        candidates: &[Arc<dyn ProviderAdapter>],
    ) -> Vec<Arc<dyn ProviderAdapter>> {
        let mut scored: Vec<(Arc<dyn ProviderAdapter>, f64)> = candidates
            .iter()
            .filter(|c| c.identity().enabled)
            .filter(|c| self.is_admissible(c.id()))
            .map(|c| (Arc::clone(c), self.health_score(c.id())))
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        debug!(
            order = ?scored.iter().map(|(c, s)| format!("{}={s:.3}", c.id())).collect::<Vec<_>>(),
            "Ranked providers"
        );

        scored.into_iter().map(|(c, _)| c).collect()
    }

    #[must_use]
    pub fn snapshot(&self, id: &str) -> HealthSnapshot {
        lock(&self.metric(id)).snapshot(id)
    }

    /// Snapshots of every provider seen so far, sorted by id
    #[must_use]
    pub fn snapshots(&self) -> Vec<HealthSnapshot> {
        let metrics = self.metrics.read().unwrap_or_else(PoisonError::into_inner);
        let mut snapshots: Vec<HealthSnapshot> = metrics
            .iter()
            .map(|(id, metric)| lock(metric).snapshot(id))
            .collect();
        snapshots.sort_by(|a, b| a.provider.cmp(&b.provider));
        snapshots
    }

    /// Forget all recorded health
    pub fn reset(&self) {
        self.metrics
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    // Test seam; not part of public API stability guarantees.
    #[doc(hidden)]
    pub fn force_open_at(&self, id: &str, opened_at: Instant) {
        let metric = self.metric(id);
        let mut m = lock(&metric);
        m.state = CircuitState::Open;
        m.opened_at = Some(opened_at);
        m.probe_in_flight = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_llm::ScriptedAdapter;

    fn registry() -> HealthRegistry {
        HealthRegistry::new(HealthSettings::default())
    }

    fn fail(registry: &HealthRegistry, id: &str) -> CircuitState {
        let permit = registry.before_call(id).unwrap();
        registry.after_call(permit, Duration::from_millis(100), false, false)
    }

    fn succeed(registry: &HealthRegistry, id: &str, latency_ms: u64) -> CircuitState {
        let permit = registry.before_call(id).unwrap();
        registry.after_call(permit, Duration::from_millis(latency_ms), true, true)
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_after_more_than_threshold_failures() {
        let r = registry();
        for _ in 0..3 {
            assert_eq!(fail(&r, "a"), CircuitState::Closed);
        }
        assert_eq!(fail(&r, "a"), CircuitState::Open);

        let err = r.before_call("a").unwrap_err();
        assert_eq!(err.state, CircuitState::Open);
        assert!(!r.is_admissible("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_does_not_reset_failure_window() {
        let r = registry();
        fail(&r, "a");
        fail(&r, "a");
        fail(&r, "a");
        succeed(&r, "a", 50);
        assert_eq!(r.snapshot("a").window_failures, 3);

        assert_eq!(fail(&r, "a"), CircuitState::Open);
        assert_eq!(r.snapshot("a").window_failures, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interleaved_failures_open_the_circuit() {
        let r = registry();
        let mut state = CircuitState::Closed;
        for _ in 0..4 {
            assert_eq!(state, CircuitState::Closed);
            state = fail(&r, "a");
            if state == CircuitState::Closed {
                succeed(&r, "a", 50);
            }
        }
        assert_eq!(state, CircuitState::Open);
        let snapshot = r.snapshot("a");
        assert_eq!(snapshot.fail_count, 4);
        assert_eq!(snapshot.ok_count, 3);
        assert!(r.before_call("a").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_outside_the_window_are_forgotten() {
        let r = HealthRegistry::new(HealthSettings {
            latency_window: 10,
            ..HealthSettings::default()
        });
        for _ in 0..3 {
            fail(&r, "a");
        }
        for _ in 0..10 {
            succeed(&r, "a", 50);
        }
        assert_eq!(r.snapshot("a").window_failures, 0);
        assert_eq!(fail(&r, "a"), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovery_starts_a_fresh_window() {
        let r = registry();
        for _ in 0..4 {
            fail(&r, "a");
        }
        tokio::time::advance(Duration::from_secs(15)).await;
        assert_eq!(succeed(&r, "a", 50), CircuitState::Closed);
        assert_eq!(r.snapshot("a").window_failures, 0);
        assert_eq!(fail(&r, "a"), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_admits_single_probe() {
        let r = registry();
        for _ in 0..4 {
            fail(&r, "a");
        }

        tokio::time::advance(Duration::from_secs(14)).await;
        assert!(r.before_call("a").is_err());

        tokio::time::advance(Duration::from_secs(1)).await;
        let probe = r.before_call("a").unwrap();
        assert!(probe.is_probe());
        assert_eq!(probe.state_before(), CircuitState::Open);
        assert_eq!(r.state("a"), CircuitState::HalfOpen);

        let second = r.before_call("a").unwrap_err();
        assert_eq!(second.state, CircuitState::HalfOpen);

        assert_eq!(
            r.after_call(probe, Duration::from_millis(80), true, true),
            CircuitState::Closed
        );
        assert_eq!(r.snapshot("a").open_for_ms, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_probe_reopens() {
        let r = registry();
        for _ in 0..4 {
            fail(&r, "a");
        }
        tokio::time::advance(Duration::from_secs(15)).await;

        let probe = r.before_call("a").unwrap();
        assert_eq!(
            r.after_call(probe, Duration::from_millis(80), false, false),
            CircuitState::Open
        );
        assert!(r.before_call("a").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_probe_frees_slot_without_counting() {
        let r = registry();
        for _ in 0..4 {
            fail(&r, "a");
        }
        tokio::time::advance(Duration::from_secs(15)).await;

        let probe = r.before_call("a").unwrap();
        drop(probe);

        let snapshot = r.snapshot("a");
        assert_eq!(snapshot.state, CircuitState::HalfOpen);
        assert!(!snapshot.probe_in_flight);
        assert_eq!(snapshot.fail_count, 4);
        assert!(r.before_call("a").is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_best_order_excludes_open_and_disabled() {
        let r = registry();
        let a: Arc<dyn ProviderAdapter> = Arc::new(ScriptedAdapter::new("a"));
        let b: Arc<dyn ProviderAdapter> = Arc::new(ScriptedAdapter::new("b"));
        let c: Arc<dyn ProviderAdapter> = Arc::new(ScriptedAdapter::new("c").disabled());

        r.force_open_at("a", Instant::now() - Duration::from_secs(5));

        let order = r.best_order(&[a, b, c]);
        let ids: Vec<&str> = order.iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec!["b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_best_order_sorts_by_score_and_keeps_ties_stable() {
        let r = registry();
        let ids = ["a", "b", "c", "d"];
        let adapters: Vec<Arc<dyn ProviderAdapter>> = ids
            .iter()
            .map(|id| Arc::new(ScriptedAdapter::new(*id)) as Arc<dyn ProviderAdapter>)
            .collect();

        // a slow, b fast, c and d untouched (tie)
        succeed(&r, "a", 6_000);
        succeed(&r, "b", 200);

        let order: Vec<String> = r
            .best_order(&adapters)
            .iter()
            .map(|p| p.id().to_string())
            .collect();
        assert_eq!(order, vec!["b", "a", "c", "d"]);
    }

    #[test]
    fn test_reset_clears_metrics() {
        let r = registry();
        let permit = r.before_call("a").unwrap();
        r.after_call(permit, Duration::from_millis(10), true, true);
        assert_eq!(r.snapshots().len(), 1);

        r.reset();
        assert!(r.snapshots().is_empty());
        assert_eq!(r.snapshot("a").ok_count, 0);
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = Config::minimal_for_testing();
        config.health.cooldown_secs = Some(30);
        config.health.failure_threshold = Some(5);
        let settings = HealthSettings::from_config(&config);
        assert_eq!(settings.cooldown, Duration::from_secs(30));
        assert_eq!(settings.failure_threshold, 5);
    }
}
