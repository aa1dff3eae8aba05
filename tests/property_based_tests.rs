//! Property-based tests for relay
//!
//! Invariants of the latency window, the health counters and the score.
//!
//! ## Configuration
//!
//! - `PROPTEST_CASES`: number of test cases per property (default: 64)
//! - `PROPTEST_MAX_SHRINK_ITERS`: max shrinking iterations on failure (default: 1000)

use std::env;
use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use relay::{HealthRegistry, HealthSettings, ProviderAdapter};
use relay_llm::ScriptedAdapter;
use relay_utils::RingBuffer;
use relay_validation::extract_json_object;

/// Default number of test cases per property.
const DEFAULT_PROPTEST_CASES: u32 = 64;

/// Default max shrink iterations.
const DEFAULT_MAX_SHRINK_ITERS: u32 = 1000;

/// Creates a ProptestConfig that respects environment variables.
fn proptest_config(max_cases: Option<u32>) -> ProptestConfig {
    let env_cases = env::var("PROPTEST_CASES")
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(DEFAULT_PROPTEST_CASES);

    let env_shrink_iters = env::var("PROPTEST_MAX_SHRINK_ITERS")
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(DEFAULT_MAX_SHRINK_ITERS);

    let cases = match max_cases {
        Some(max) => env_cases.min(max),
        None => env_cases,
    };

    ProptestConfig {
        cases,
        max_shrink_iters: env_shrink_iters,
        max_shrink_time: 30000,
        ..ProptestConfig::default()
    }
}

/// One recorded call: (latency ms, produced a reply, reply was valid JSON)
fn arb_outcome() -> impl Strategy<Value = (u64, bool, bool)> {
    (0u64..10_000, any::<bool>(), any::<bool>())
}

fn registry(latency_window: usize, failure_threshold: u32) -> HealthRegistry {
    HealthRegistry::new(HealthSettings {
        cooldown: Duration::from_secs(15),
        failure_threshold,
        latency_window,
    })
}

proptest! {
    #![proptest_config(proptest_config(None))]

    #[test]
    fn prop_ring_buffer_never_exceeds_capacity(
        capacity in 0usize..64,
        values in prop::collection::vec(any::<u64>(), 0..256),
    ) {
        let mut buffer = RingBuffer::new(capacity);
        for (i, value) in values.iter().enumerate() {
            buffer.push(*value);
            prop_assert!(buffer.len() <= capacity);
            prop_assert_eq!(buffer.total_pushed(), i as u64 + 1);
        }
        prop_assert_eq!(buffer.len(), values.len().min(capacity));
    }

    #[test]
    fn prop_ring_buffer_keeps_most_recent(
        capacity in 1usize..32,
        values in prop::collection::vec(any::<u64>(), 1..128),
    ) {
        let mut buffer = RingBuffer::new(capacity);
        for value in &values {
            buffer.push(*value);
        }
        let kept: Vec<u64> = buffer.iter().copied().collect();
        let expected = &values[values.len().saturating_sub(capacity)..];
        prop_assert_eq!(kept.as_slice(), expected);
    }

    #[test]
    fn prop_health_counters_are_monotonic(
        window in 1usize..50,
        outcomes in prop::collection::vec(arb_outcome(), 1..200),
    ) {
        // High threshold keeps the circuit closed so every call is admitted
        let registry = registry(window, u32::MAX);
        let mut previous = registry.snapshot("p");

        for (latency_ms, ok, json_valid) in outcomes {
            let permit = registry.before_call("p").unwrap();
            registry.after_call(permit, Duration::from_millis(latency_ms), ok, ok && json_valid);

            let current = registry.snapshot("p");
            prop_assert!(current.ok_count >= previous.ok_count);
            prop_assert!(current.fail_count >= previous.fail_count);
            prop_assert!(current.json_ok_count >= previous.json_ok_count);
            prop_assert_eq!(
                current.ok_count + current.fail_count,
                previous.ok_count + previous.fail_count + 1
            );
            prop_assert!(current.json_ok_count <= current.ok_count);
            prop_assert!(current.samples <= window);
            previous = current;
        }
    }

    #[test]
    fn prop_score_is_bounded(
        outcomes in prop::collection::vec(arb_outcome(), 0..100),
    ) {
        let registry = registry(100, u32::MAX);
        for (latency_ms, ok, json_valid) in outcomes {
            let permit = registry.before_call("p").unwrap();
            registry.after_call(permit, Duration::from_millis(latency_ms), ok, ok && json_valid);
        }
        let score = registry.health_score("p");
        prop_assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn prop_lower_latency_never_scores_lower(
        fast_ms in 0u64..5_000,
        extra_ms in 0u64..5_000,
        calls in 1usize..30,
    ) {
        let registry = registry(100, u32::MAX);
        for _ in 0..calls {
            let permit = registry.before_call("fast").unwrap();
            registry.after_call(permit, Duration::from_millis(fast_ms), true, true);
            let permit = registry.before_call("slow").unwrap();
            registry.after_call(permit, Duration::from_millis(fast_ms + extra_ms), true, true);
        }
        prop_assert!(registry.health_score("fast") >= registry.health_score("slow"));
    }

    #[test]
    fn prop_best_order_is_sorted_by_score(
        failures in prop::collection::vec(0u32..3, 1..6),
    ) {
        let registry = registry(100, u32::MAX);
        let adapters: Vec<Arc<dyn ProviderAdapter>> = failures
            .iter()
            .enumerate()
            .map(|(i, _)| Arc::new(ScriptedAdapter::new(format!("p{i}"))) as Arc<dyn ProviderAdapter>)
            .collect();

        for (i, fail_count) in failures.iter().enumerate() {
            let id = format!("p{i}");
            let permit = registry.before_call(&id).unwrap();
            registry.after_call(permit, Duration::from_millis(100), true, true);
            for _ in 0..*fail_count {
                let permit = registry.before_call(&id).unwrap();
                registry.after_call(permit, Duration::from_millis(100), false, false);
            }
        }

        let order = registry.best_order(&adapters);
        prop_assert_eq!(order.len(), adapters.len());
        let scores: Vec<f64> = order.iter().map(|a| registry.health_score(a.id())).collect();
        prop_assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn prop_extracted_object_is_brace_delimited(text in ".{0,200}") {
        if let Some(candidate) = extract_json_object(&text) {
            prop_assert!(candidate.starts_with('{'), "candidate must start with an opening brace");
            prop_assert!(candidate.ends_with('}'), "candidate must end with a closing brace");
            prop_assert!(text.contains(candidate), "candidate must be a substring of the reply");
        }
    }
}
