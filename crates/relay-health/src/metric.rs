//! Rolling health metrics for one provider

use relay_utils::{CircuitState, RingBuffer};
use serde::Serialize;
use tokio::time::Instant;

/// p95 below this earns the full latency bonus
const FAST_P95_MS: u64 = 1_500;
/// p95 below this earns the reduced latency bonus
const ACCEPTABLE_P95_MS: u64 = 4_000;

/// Counters, latency samples and circuit state of a single provider.
///
/// Owned by [`crate::HealthRegistry`]; mutated only through `before_call` and
/// `after_call`.
#[derive(Debug, Clone)]
pub struct HealthMetric {
    pub(crate) ok_count: u64,
    pub(crate) fail_count: u64,
    pub(crate) json_ok_count: u64,
    pub(crate) latencies_ms: RingBuffer<u64>,
    pub(crate) state: CircuitState,
    pub(crate) opened_at: Option<Instant>,
    /// Recent call outcomes, `true` for a failure. Cleared when the circuit recovers.
    pub(crate) outcomes: RingBuffer<bool>,
    pub(crate) probe_in_flight: bool,
}

impl HealthMetric {
    /// The outcome window is the latency window, widened so that it can hold
    /// more than `failure_threshold` failures.
    pub(crate) fn new(latency_window: usize, failure_threshold: u32) -> Self {
        let outcome_window = latency_window.max((failure_threshold as usize).saturating_add(1));
        Self {
            ok_count: 0,
            fail_count: 0,
            json_ok_count: 0,
            latencies_ms: RingBuffer::new(latency_window),
            state: CircuitState::Closed,
            opened_at: None,
            outcomes: RingBuffer::new(outcome_window),
            probe_in_flight: false,
        }
    }

    /// Failures among the recent outcomes
    #[must_use]
    pub fn window_failures(&self) -> u32 {
        self.outcomes.iter().filter(|failed| **failed).count() as u32
    }

    /// `ok / (ok + fail)`, or 1.0 before any call was recorded
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        let total = self.ok_count + self.fail_count;
        if total == 0 {
            1.0
        } else {
            self.ok_count as f64 / total as f64
        }
    }

    /// `json_ok / max(1, ok)`
    #[must_use]
    pub fn json_rate(&self) -> f64 {
        self.json_ok_count as f64 / self.ok_count.max(1) as f64
    }

    /// 95th percentile latency in milliseconds; 0 when no samples exist
    #[must_use]
    pub fn p95_ms(&self) -> u64 {
        let sorted = self.latencies_ms.sorted();
        if sorted.is_empty() {
            return 0;
        }
        let index = ((sorted.len() as f64 * 0.95).floor() as usize).saturating_sub(1);
        sorted[index]
    }

    #[must_use]
    pub fn latency_bonus(&self) -> f64 {
        match self.p95_ms() {
            p if p < FAST_P95_MS => 0.2,
            p if p < ACCEPTABLE_P95_MS => 0.1,
            _ => 0.0,
        }
    }

    /// `success_rate*0.5 + json_rate*0.3 + latency_bonus`
    #[must_use]
    pub fn score(&self) -> f64 {
        self.success_rate() * 0.5 + self.json_rate() * 0.3 + self.latency_bonus()
    }

    pub(crate) fn snapshot(&self, provider: &str) -> HealthSnapshot {
        HealthSnapshot {
            provider: provider.to_string(),
            ok_count: self.ok_count,
            fail_count: self.fail_count,
            json_ok_count: self.json_ok_count,
            samples: self.latencies_ms.len(),
            p95_ms: self.p95_ms(),
            score: self.score(),
            state: self.state,
            open_for_ms: self.opened_at.map(|t| t.elapsed().as_millis() as u64),
            window_failures: self.window_failures(),
            probe_in_flight: self.probe_in_flight,
        }
    }
}

/// Point-in-time copy of a provider's health, safe to log or serialize
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    pub provider: String,
    pub ok_count: u64,
    pub fail_count: u64,
    pub json_ok_count: u64,
    pub samples: usize,
    pub p95_ms: u64,
    pub score: f64,
    pub state: CircuitState,
    /// Time since the circuit opened, when it is not closed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_for_ms: Option<u64>,
    pub window_failures: u32,
    pub probe_in_flight: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric_with(ok: u64, fail: u64, json_ok: u64, samples: &[u64]) -> HealthMetric {
        let mut m = HealthMetric::new(100, 3);
        m.ok_count = ok;
        m.fail_count = fail;
        m.json_ok_count = json_ok;
        for s in samples {
            m.latencies_ms.push(*s);
        }
        m
    }

    #[test]
    fn test_fresh_metric_score() {
        let m = HealthMetric::new(100, 3);
        assert_eq!(m.success_rate(), 1.0);
        assert_eq!(m.json_rate(), 0.0);
        assert_eq!(m.p95_ms(), 0);
        assert!((m.score() - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn test_p95_index() {
        // 20 samples: floor(20*0.95)-1 = 18
        let samples: Vec<u64> = (1..=20).map(|i| i * 100).collect();
        assert_eq!(metric_with(0, 0, 0, &samples).p95_ms(), 1_900);

        // 1 sample: floor(0.95)-1 clamps to 0
        assert_eq!(metric_with(0, 0, 0, &[4_200]).p95_ms(), 4_200);
    }

    #[test]
    fn test_latency_bonus_bands() {
        assert_eq!(metric_with(0, 0, 0, &[1_499]).latency_bonus(), 0.2);
        assert_eq!(metric_with(0, 0, 0, &[1_500]).latency_bonus(), 0.1);
        assert_eq!(metric_with(0, 0, 0, &[3_999]).latency_bonus(), 0.1);
        assert_eq!(metric_with(0, 0, 0, &[4_000]).latency_bonus(), 0.0);
    }

    #[test]
    fn test_score_formula() {
        // success 3/4, json 3/3, p95 under 1500 ms
        let m = metric_with(3, 1, 3, &[900, 800, 700, 600]);
        let expected = 0.75 * 0.5 + 1.0 * 0.3 + 0.2;
        assert!((m.score() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_outcome_window_holds_more_than_threshold() {
        let mut m = HealthMetric::new(2, 3);
        for _ in 0..5 {
            m.outcomes.push(true);
        }
        assert_eq!(m.window_failures(), 4);
        assert_eq!(m.latencies_ms.len(), 0);
    }

    #[test]
    fn test_lower_latency_scores_at_least_as_high() {
        let fast = metric_with(10, 2, 9, &[300; 12]);
        let slow = metric_with(10, 2, 9, &[5_000; 12]);
        assert!(fast.score() >= slow.score());
    }
}
