//! Time budget of a single run

use std::time::Duration;

use relay_config::BudgetEnforcement;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
pub(crate) struct Budget {
    started: Instant,
    deadline: Instant,
    start_buffer: Duration,
    enforcement: BudgetEnforcement,
}

impl Budget {
    pub(crate) fn new(
        started: Instant,
        deadline: Instant,
        start_buffer: Duration,
        enforcement: BudgetEnforcement,
    ) -> Self {
        Self {
            started,
            deadline,
            start_buffer,
            enforcement,
        }
    }

    pub(crate) fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// A new attempt may start only while more than the start buffer remains
    pub(crate) fn can_start(&self) -> bool {
        self.remaining() > self.start_buffer
    }

    /// Timeout handed to the adapter for one call
    pub(crate) fn call_timeout(&self, provider_timeout: Duration) -> Duration {
        match self.enforcement {
            BudgetEnforcement::Advisory => provider_timeout,
            BudgetEnforcement::Strict => provider_timeout.min(self.remaining()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn budget(total: Duration, enforcement: BudgetEnforcement) -> Budget {
        let now = Instant::now();
        Budget::new(now, now + total, Duration::from_secs(2), enforcement)
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_buffer_is_exclusive() {
        let b = budget(Duration::from_secs(5), BudgetEnforcement::Advisory);
        assert!(b.can_start());

        tokio::time::advance(Duration::from_secs(3)).await;
        assert!(!b.can_start());
        assert_eq!(b.remaining(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_passed_deadline_has_nothing_remaining() {
        let now = Instant::now();
        let b = Budget::new(
            now,
            now - Duration::from_secs(1),
            Duration::from_secs(2),
            BudgetEnforcement::Advisory,
        );
        assert_eq!(b.remaining(), Duration::ZERO);
        assert!(!b.can_start());
    }

    #[tokio::test(start_paused = true)]
    async fn test_strict_mode_clips_call_timeout() {
        let advisory = budget(Duration::from_secs(10), BudgetEnforcement::Advisory);
        let strict = budget(Duration::from_secs(10), BudgetEnforcement::Strict);

        assert_eq!(
            advisory.call_timeout(Duration::from_secs(20)),
            Duration::from_secs(20)
        );
        assert_eq!(
            strict.call_timeout(Duration::from_secs(20)),
            Duration::from_secs(10)
        );
        assert_eq!(
            strict.call_timeout(Duration::from_secs(4)),
            Duration::from_secs(4)
        );
    }
}
