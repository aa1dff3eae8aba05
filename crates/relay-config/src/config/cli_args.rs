use std::path::PathBuf;

/// CLI overrides applied on top of environment, file and defaults.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    /// Explicit config file path (`--config`)
    pub config_path: Option<PathBuf>,
    pub budget_ms: Option<u64>,
    pub hedge_width: Option<usize>,
    pub prompts_dir: Option<PathBuf>,
}
