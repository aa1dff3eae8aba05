//! relay: resilient multi-provider structured extraction
//!
//! Ask several text-generation providers for a JSON reply, race the healthiest
//! ones, retry each once with a stricter prompt, and return the first reply that
//! passes schema validation within a wall-clock budget.
//!
//! This crate is a facade over the workspace crates plus the `relay` CLI.
//!
//! ```no_run
//! use std::sync::Arc;
//! use relay::{Config, CliArgs, DirectoryPromptSource, JsonSchema, Orchestrator, RunOptions, Task, Vars};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::discover(&CliArgs::default())?;
//! let orchestrator = Orchestrator::from_config(&config, Arc::new(DirectoryPromptSource::new("prompts")))?;
//! let schema = JsonSchema::from_file(std::path::Path::new("schemas/invoice.json"))?;
//! let task = Task::new("invoice-42", "invoice", schema);
//! let extraction = orchestrator.run(&task, &Vars::new(), RunOptions::new()).await?;
//! println!("{}", extraction.parsed_data);
//! # Ok(())
//! # }
//! ```

pub mod cli;

// Configuration
pub use relay_config::{
    BudgetEnforcement, CliArgs, Config, ConfigBuilder, ProviderConfig, ProviderKind,
    TelemetrySinkKind,
};

// Orchestration
pub use relay_orchestrator::{
    Extraction, FailureReport, GUARD_INSTRUCTION, OrchestrationError, OrchestrationResult,
    Orchestrator, OrchestratorBuilder, OrchestratorSettings, RunOptions, RunReport, SetupError,
    SuccessReport, Task, guard_prompt,
};

// Health
pub use relay_health::{CallPermit, CircuitOpen, HealthRegistry, HealthSettings, HealthSnapshot};

// Providers
pub use relay_llm::{
    LlmError, Message, ProviderAdapter, ProviderIdentity, ProviderReply, Role,
    adapters_from_config,
};

#[cfg(any(test, feature = "test-utils"))]
pub use relay_llm::ScriptedAdapter;

// Prompts
pub use relay_prompt_template::{
    DirectoryPromptSource, InMemoryPromptSource, PromptError, PromptSource, Vars,
};

// Validation
pub use relay_validation::{
    AnySchema, FnSchema, JsonSchema, ResponseSchema, SchemaError, Validated, ValidationFailure,
    validate_response,
};

// Telemetry
pub use relay_telemetry::{
    AttemptEvent, AttemptKind, FanoutSink, JsonlSink, MemorySink, NullSink, Round,
    TelemetrySink, TracingSink,
};

// Shared types
pub use relay_utils::{
    CircuitState, ConfigError, ErrorCategory, ErrorKind, ExitCode, UserFriendlyError,
};
