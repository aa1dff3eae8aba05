//! Sequential fallback round

use std::collections::HashSet;
use std::sync::Arc;

use relay_llm::ProviderAdapter;
use relay_telemetry::Round;
use relay_utils::ErrorKind;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::attempt::{Failure, ProviderOutcome, RunContext, Win};

#[derive(Default)]
pub(crate) struct SequentialReport {
    pub win: Option<Win>,
    pub abandoned: u32,
    pub attempted_any: bool,
    pub budget_exhausted: bool,
    pub last_failure: Option<Failure>,
    pub last_rejection: Option<Failure>,
}

/// Try each provider in order, skipping those the hedge round already called.
///
/// `abandoned_before` is the number of providers given up on earlier in the run.
pub(crate) async fn sequential_round(
    ctx: &RunContext,
    ordered: &[Arc<dyn ProviderAdapter>],
    skip: &HashSet<String>,
    abandoned_before: u32,
) -> SequentialReport {
    // Nothing cancels sequential attempts; the token only satisfies the adapter contract
    let token = CancellationToken::new();
    let mut report = SequentialReport::default();

    for provider in ordered {
        if skip.contains(provider.id()) {
            continue;
        }
        if !ctx.budget.can_start() {
            warn!(
                provider = %provider.id(),
                remaining_ms = ctx.budget.remaining().as_millis() as u64,
                "Budget exhausted, stopping sequential round"
            );
            report.budget_exhausted = true;
            break;
        }

        let retries = abandoned_before + report.abandoned;
        match ctx
            .run_provider(provider.as_ref(), Round::Sequential, retries, &token)
            .await
        {
            ProviderOutcome::Won(win) => {
                report.win = Some(win);
                return report;
            }
            ProviderOutcome::Lost {
                failure,
                attempted: true,
            } => {
                report.attempted_any = true;
                report.abandoned += 1;
                report.last_failure = Some(failure);
            }
            ProviderOutcome::Lost {
                failure,
                attempted: false,
            } => {
                if failure.error == ErrorKind::BudgetExceeded {
                    report.budget_exhausted = true;
                    break;
                }
                debug!(provider = %failure.provider, error = %failure.error, "Provider skipped");
                report.last_rejection = Some(failure);
            }
            ProviderOutcome::Cancelled { attempted } => {
                report.attempted_any |= attempted;
            }
        }
    }

    report
}
