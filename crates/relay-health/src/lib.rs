//! Provider health tracking for relay
//!
//! A [`HealthRegistry`] keeps one [`HealthMetric`] per provider: success and
//! JSON-validity counters, a bounded window of latency samples, and a circuit
//! breaker (closed, open, half-open). The orchestrator ranks candidates with
//! [`HealthRegistry::best_order`] and brackets every call with `before_call` and
//! `after_call`.

mod metric;
mod registry;

pub use metric::{HealthMetric, HealthSnapshot};
pub use registry::{CallPermit, CircuitOpen, HealthRegistry, HealthSettings};
pub use relay_utils::CircuitState;
