//! CLI flag wiring and exit codes
//!
//! Definition checks go through `build_cli()`. Behavior checks run the real
//! binary in a temporary project that has its own `.relay/config.toml`.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const ENV_OVERRIDES: &[&str] = &["RELAY_CONFIG", "RELAY_BUDGET_MS", "RELAY_HEDGE_WIDTH"];

/// Temporary project root with a `.git` marker so discovery stops there
fn project(config: &str) -> TempDir {
    let temp = TempDir::new().unwrap();
    fs::create_dir(temp.path().join(".git")).unwrap();
    fs::create_dir(temp.path().join(".relay")).unwrap();
    fs::write(temp.path().join(".relay").join("config.toml"), config).unwrap();
    fs::write(
        temp.path().join("schema.json"),
        r#"{"type": "object", "required": ["total"]}"#,
    )
    .unwrap();
    temp
}

fn relay(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("relay").unwrap();
    cmd.current_dir(dir);
    for key in ENV_OVERRIDES {
        cmd.env_remove(key);
    }
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_global_flags_defined() {
    let cli = relay::cli::build_cli();
    let names: Vec<_> = cli.get_arguments().filter_map(|arg| arg.get_long()).collect();

    for flag in ["config", "budget-ms", "hedge-width", "prompts-dir", "verbose"] {
        assert!(
            names.contains(&flag),
            "Global flag --{flag} is not defined in CLI"
        );
    }
}

#[test]
fn test_subcommands_defined() {
    let cli = relay::cli::build_cli();
    let names: Vec<_> = cli
        .get_subcommands()
        .map(|c| c.get_name())
        .filter(|name| *name != "help")
        .collect();
    assert_eq!(names, vec!["run", "providers", "config"]);
}

#[test]
fn test_help_mentions_precedence() {
    let temp = TempDir::new().unwrap();
    relay(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("CLI flags > environment > config file > defaults"));
}

#[test]
fn test_malformed_var_is_a_usage_error() {
    let temp = project("");
    relay(temp.path())
        .args(["run", "t1", "--template", "invoice", "--schema", "schema.json"])
        .args(["--var", "novalue"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("KEY=VALUE"));
}

#[test]
fn test_run_without_providers_exits_with_no_provider_code() {
    let temp = project("");
    relay(temp.path())
        .args(["run", "t1", "--template", "invoice", "--schema", "schema.json"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Suggestions:"));
}

#[test]
fn test_run_with_only_keyless_providers_exits_with_no_provider_code() {
    let temp = project(
        r#"
[providers.openai]
kind = "openai-compatible"
model = "gpt-4o-mini"
api_key_env = "RELAY_CLI_TEST_KEY_THAT_IS_NEVER_SET"
"#,
    );
    relay(temp.path())
        .env_remove("RELAY_CLI_TEST_KEY_THAT_IS_NEVER_SET")
        .args(["run", "t1", "--template", "invoice", "--schema", "schema.json"])
        .assert()
        .code(3);
}

#[test]
fn test_run_json_report_on_failure() {
    let temp = project("");
    let output = relay(temp.path())
        .args(["run", "t1", "--template", "invoice", "--schema", "schema.json", "--json"])
        .assert()
        .code(3)
        .get_output()
        .stdout
        .clone();

    let report: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(report["task"], "t1");
    assert_eq!(report["ok"], false);
    assert_eq!(report["errorKind"], "no-provider-configured");
}

#[test]
fn test_missing_schema_file_is_a_usage_error() {
    let temp = project("");
    relay(temp.path())
        .args(["run", "t1", "--template", "invoice", "--schema", "nope.json"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("nope.json"));
}

#[test]
fn test_invalid_config_is_a_usage_error() {
    let temp = project("[orchestrator]\nhedge_width = 0\n");
    relay(temp.path())
        .arg("config")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("hedge_width"));
}

#[test]
fn test_config_command_shows_sources() {
    let temp = project("[orchestrator]\nbudget_ms = 20000\n");
    relay(temp.path())
        .args(["config", "--hedge-width", "4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("budget_ms = 20000  (config)"))
        .stdout(predicate::str::contains("hedge_width = 4  (cli)"))
        .stdout(predicate::str::contains("No providers configured."));
}

#[test]
fn test_env_override_is_attributed() {
    let temp = project("[orchestrator]\nbudget_ms = 20000\n");
    relay(temp.path())
        .env("RELAY_BUDGET_MS", "9000")
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("budget_ms = 9000  (env)"));
}

#[test]
fn test_providers_command_lists_enabled_state() {
    let temp = project(
        r#"
[providers.local]
kind = "openai-compatible"
model = "llama3"
base_url = "http://127.0.0.1:9/v1"
api_key_env = "RELAY_CLI_TEST_LOCAL_KEY"
timeout_secs = 7

[providers.claude]
kind = "anthropic"
model = "claude-3-5-haiku-latest"
api_key_env = "RELAY_CLI_TEST_KEY_THAT_IS_NEVER_SET"
"#,
    );
    let output = relay(temp.path())
        .env("RELAY_CLI_TEST_LOCAL_KEY", "sk-local")
        .env_remove("RELAY_CLI_TEST_KEY_THAT_IS_NEVER_SET")
        .args(["providers", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let listings: serde_json::Value = serde_json::from_slice(&output).unwrap();
    let listings = listings.as_array().unwrap();
    assert_eq!(listings.len(), 2);

    let local = listings.iter().find(|l| l["id"] == "local").unwrap();
    assert_eq!(local["enabled"], true);
    assert_eq!(local["timeoutMs"], 7000);

    let claude = listings.iter().find(|l| l["id"] == "claude").unwrap();
    assert_eq!(claude["enabled"], false);
}
