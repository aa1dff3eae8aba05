//! Hedged, budgeted multi-provider orchestration for relay
//!
//! Given a [`Task`] and its variables, the [`Orchestrator`] asks several
//! text-generation providers for a structured reply, races the healthiest ones,
//! retries each once with a stricter prompt, and returns the first reply that
//! passes validation, all within a wall-clock budget.
//!
//! ```no_run
//! use std::sync::Arc;
//! use relay_orchestrator::{Orchestrator, RunOptions, Task};
//! use relay_prompt_template::{DirectoryPromptSource, Vars};
//! use relay_validation::AnySchema;
//!
//! # async fn example(config: relay_config::Config) -> Result<(), Box<dyn std::error::Error>> {
//! let prompts = Arc::new(DirectoryPromptSource::new("prompts"));
//! let orchestrator = Orchestrator::from_config(&config, prompts)?;
//! let task = Task::new("invoice", "invoice", AnySchema);
//! let extraction = orchestrator.run(&task, &Vars::new(), RunOptions::new()).await?;
//! println!("{} answered: {}", extraction.provider, extraction.parsed_data);
//! # Ok(())
//! # }
//! ```

mod attempt;
mod budget;
mod guard;
mod hedge;
mod orchestrator;
mod result;
mod sequential;
mod task;

pub use guard::{GUARD_INSTRUCTION, guard_prompt};
pub use orchestrator::{Orchestrator, OrchestratorBuilder, OrchestratorSettings, SetupError};
pub use result::{
    Extraction, FailureReport, OrchestrationError, OrchestrationResult, RunReport, SuccessReport,
};
pub use task::{RunOptions, Task};
