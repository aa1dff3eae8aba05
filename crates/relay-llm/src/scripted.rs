//! Scripted in-process adapter for tests
//!
//! Replays a fixed sequence of replies and failures with optional delays. Delays
//! honour both the per-call timeout and the cancellation token, so hedge and
//! timeout behaviour can be exercised under `tokio::time::pause`.

use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::LlmError;
use crate::types::{ProviderAdapter, ProviderIdentity, ProviderReply};

#[derive(Debug, Clone)]
struct ScriptedCall {
    delay: Duration,
    outcome: Result<String, LlmError>,
}

/// Provider adapter that answers from a script instead of the network
#[derive(Debug)]
pub struct ScriptedAdapter {
    identity: ProviderIdentity,
    script: Mutex<VecDeque<ScriptedCall>>,
    /// Answer used once the script is exhausted
    repeat: Option<ScriptedCall>,
    calls: AtomicU32,
    cancelled: AtomicBool,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedAdapter {
    /// Enabled adapter with a 20 s call timeout and an empty script
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            identity: ProviderIdentity::new(id, Duration::from_secs(20)),
            script: Mutex::new(VecDeque::new()),
            repeat: None,
            calls: AtomicU32::new(0),
            cancelled: AtomicBool::new(false),
            prompts: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.identity.timeout = timeout;
        self
    }

    /// Mark the provider as disabled (as if credentials were missing)
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.identity.enabled = false;
        self
    }

    #[must_use]
    pub fn reply(self, text: impl Into<String>) -> Self {
        self.reply_after(Duration::ZERO, text)
    }

    #[must_use]
    pub fn reply_after(self, delay: Duration, text: impl Into<String>) -> Self {
        self.push(delay, Ok(text.into()))
    }

    #[must_use]
    pub fn fail(self, error: LlmError) -> Self {
        self.fail_after(Duration::ZERO, error)
    }

    #[must_use]
    pub fn fail_after(self, delay: Duration, error: LlmError) -> Self {
        self.push(delay, Err(error))
    }

    /// Answer every call past the end of the script with `text`
    #[must_use]
    pub fn always_reply(mut self, text: impl Into<String>) -> Self {
        self.repeat = Some(ScriptedCall {
            delay: Duration::ZERO,
            outcome: Ok(text.into()),
        });
        self
    }

    /// Fail every call past the end of the script with `error`
    #[must_use]
    pub fn always_fail(mut self, error: LlmError) -> Self {
        self.repeat = Some(ScriptedCall {
            delay: Duration::ZERO,
            outcome: Err(error),
        });
        self
    }

    /// Sleep `delay` on every call past the end of the script, then reply
    #[must_use]
    pub fn always_reply_after(mut self, delay: Duration, text: impl Into<String>) -> Self {
        self.repeat = Some(ScriptedCall {
            delay,
            outcome: Ok(text.into()),
        });
        self
    }

    fn push(self, delay: Duration, outcome: Result<String, LlmError>) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(ScriptedCall { delay, outcome });
        }
        self
    }

    /// Number of calls started
    #[must_use]
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Whether any call observed its cancellation token firing
    #[must_use]
    pub fn was_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Prompts received, in call order
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    fn next_call(&self) -> ScriptedCall {
        let scripted = self
            .script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front());
        scripted.or_else(|| self.repeat.clone()).unwrap_or(ScriptedCall {
            delay: Duration::ZERO,
            outcome: Err(LlmError::Internal(format!(
                "{}: script exhausted",
                self.identity.id
            ))),
        })
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn identity(&self) -> &ProviderIdentity {
        &self.identity
    }

    async fn call(
        &self,
        prompt: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<ProviderReply, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        let step = self.next_call();
        let timed_out = step.delay > timeout;
        let wait = step.delay.min(timeout);

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                self.cancelled.store(true, Ordering::SeqCst);
                return Err(LlmError::Cancelled);
            }
            () = tokio::time::sleep(wait) => {}
        }

        if timed_out {
            return Err(LlmError::Timeout { duration: timeout });
        }

        step.outcome.map(|text| {
            let raw = json!({ "provider": self.identity.id, "text": text });
            ProviderReply::new(text, raw)
        })
    }
}
