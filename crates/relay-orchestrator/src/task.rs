//! Extraction tasks and per-run options

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use relay_validation::ResponseSchema;
use tokio::time::Instant;

/// One structured-extraction request: which template to render and what shape
/// the reply must have
#[derive(Clone)]
pub struct Task {
    pub id: String,
    /// Prompt template name, resolved through the orchestrator's `PromptSource`
    pub template: String,
    pub schema: Arc<dyn ResponseSchema>,
}

impl Task {
    pub fn new<S>(id: impl Into<String>, template: impl Into<String>, schema: S) -> Self
    where
        S: ResponseSchema + 'static,
    {
        Self::with_shared_schema(id, template, Arc::new(schema))
    }

    pub fn with_shared_schema(
        id: impl Into<String>,
        template: impl Into<String>,
        schema: Arc<dyn ResponseSchema>,
    ) -> Self {
        Self {
            id: id.into(),
            template: template.into(),
            schema,
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("template", &self.template)
            .finish_non_exhaustive()
    }
}

/// Per-run overrides
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Restrict the run to these provider ids, in this order of preference
    pub providers: Option<Vec<String>>,
    /// Replace the configured budget for this run
    pub budget: Option<Duration>,
    /// Absolute deadline; wins over `budget` when both are set
    pub deadline: Option<Instant>,
}

impl RunOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_providers<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.providers = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = Some(budget);
        self
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }
}
