//! Concurrent hedge round
//!
//! The top candidates race. The first validator-passing reply wins and the round
//! token is cancelled so every loser abandons its in-flight call. Losers keep
//! running in a detached task until they observe cancellation, so their attempts
//! are still recorded.

use std::collections::HashSet;
use std::sync::Arc;

use relay_llm::ProviderAdapter;
use relay_telemetry::Round;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, warn};

use crate::attempt::{Failure, ProviderOutcome, RunContext, Win};

#[derive(Default)]
pub(crate) struct HedgeReport {
    pub win: Option<Win>,
    /// Providers that made at least one call
    pub attempted: HashSet<String>,
    /// Candidates that failed both prompts before a winner was found
    pub abandoned: u32,
    pub last_failure: Option<Failure>,
    /// Failure of a candidate that never got to call (circuit or budget)
    pub last_rejection: Option<Failure>,
}

pub(crate) async fn hedge_round(
    ctx: Arc<RunContext>,
    candidates: &[Arc<dyn ProviderAdapter>],
) -> HedgeReport {
    let round_token = CancellationToken::new();
    let mut set = JoinSet::new();

    for provider in candidates {
        let ctx = Arc::clone(&ctx);
        let provider = Arc::clone(provider);
        let token = round_token.child_token();
        set.spawn(
            async move {
                let outcome = ctx
                    .run_provider(provider.as_ref(), Round::Hedge, 0, &token)
                    .await;
                (provider.id().to_string(), outcome)
            }
            .in_current_span(),
        );
    }

    let mut report = HedgeReport::default();
    while let Some(joined) = set.join_next().await {
        let (id, outcome) = match joined {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "Hedge candidate task failed");
                continue;
            }
        };

        match outcome {
            ProviderOutcome::Won(win) => {
                report.attempted.insert(id);
                round_token.cancel();
                if !set.is_empty() {
                    debug!(losers = set.len(), winner = %win.provider, "Cancelling hedge losers");
                    tokio::spawn(
                        async move { while set.join_next().await.is_some() {} }.in_current_span(),
                    );
                }
                report.win = Some(win);
                return report;
            }
            ProviderOutcome::Lost { failure, attempted } => {
                if attempted {
                    report.attempted.insert(id);
                    report.abandoned += 1;
                    report.last_failure = Some(failure);
                } else {
                    report.last_rejection = Some(failure);
                }
            }
            ProviderOutcome::Cancelled { attempted } => {
                if attempted {
                    report.attempted.insert(id);
                }
            }
        }
    }

    report
}
