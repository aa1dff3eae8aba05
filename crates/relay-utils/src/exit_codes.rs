//! Exit code constants and error kind mapping for the relay CLI.
//!
//! | Code | Constant | Description |
//! |------|----------|-------------|
//! | 0 | `SUCCESS` | Extraction succeeded |
//! | 1 | `INTERNAL` | General/internal failure |
//! | 2 | `CLI_ARGS` | Invalid CLI arguments or configuration |
//! | 3 | `NO_PROVIDER` | No provider is enabled |
//! | 4 | `BUDGET_EXCEEDED` | Time budget ran out before any call |
//! | 5 | `ALL_PROVIDERS_FAILED` | Every admissible provider failed |
//! | 6 | `PROMPT_UNAVAILABLE` | Prompt template could not be loaded |

use crate::types::ErrorKind;

/// Process exit code.
///
/// The numeric values are part of the CLI contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);

    /// Internal error - general failure
    pub const INTERNAL: ExitCode = ExitCode(1);

    /// Invalid or missing command-line arguments, or invalid configuration
    pub const CLI_ARGS: ExitCode = ExitCode(2);

    /// No provider is enabled - an operator needs to configure credentials
    pub const NO_PROVIDER: ExitCode = ExitCode(3);

    /// The time budget was exhausted before any provider call started
    pub const BUDGET_EXCEEDED: ExitCode = ExitCode(4);

    /// Every admissible provider failed - usually transient, retryable
    pub const ALL_PROVIDERS_FAILED: ExitCode = ExitCode(5);

    /// The prompt template could not be loaded
    pub const PROMPT_UNAVAILABLE: ExitCode = ExitCode(6);

    /// Get the numeric exit code value for `std::process::exit()`.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    #[must_use]
    pub const fn from_i32(code: i32) -> Self {
        ExitCode(code)
    }
}

impl From<i32> for ExitCode {
    fn from(code: i32) -> Self {
        ExitCode(code)
    }
}

impl From<ErrorKind> for ExitCode {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::NoProviderConfigured => Self::NO_PROVIDER,
            ErrorKind::BudgetExceeded => Self::BUDGET_EXCEEDED,
            ErrorKind::AllProvidersFailed => Self::ALL_PROVIDERS_FAILED,
            ErrorKind::PromptUnavailable => Self::PROMPT_UNAVAILABLE,
            // Per-attempt kinds never terminate a run on their own
            _ => Self::INTERNAL,
        }
    }
}
