//! Prompt sources for relay
//!
//! A [`PromptSource`] resolves a template name to its text; [`render`] fills in
//! `{{variable}}` placeholders. Template authoring lives outside relay.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use relay_utils::error::{ErrorCategory, UserFriendlyError};

/// Variables substituted into a template
pub type Vars = BTreeMap<String, Value>;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_.-]*)\s*\}\}").expect("placeholder regex is valid")
});

static TEMPLATE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.-]*$").expect("template name regex is valid")
});

/// Errors from loading a prompt template
#[derive(Error, Debug)]
pub enum PromptError {
    #[error("Prompt template '{name}' not found")]
    NotFound { name: String },

    #[error("Invalid prompt template name '{0}'")]
    InvalidName(String),

    #[error("Failed to read prompt template '{name}': {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

impl UserFriendlyError for PromptError {
    fn user_message(&self) -> String {
        match self {
            Self::NotFound { name } => format!("Prompt template '{name}' does not exist"),
            Self::InvalidName(name) => format!("'{name}' is not a valid prompt template name"),
            Self::Io { name, source } => format!("Could not read prompt template '{name}': {source}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::NotFound { .. } => Some(
                "Templates are looked up as <dir>/<name>.txt or <dir>/<name>.md.".to_string(),
            ),
            Self::InvalidName(_) => Some(
                "Template names may contain letters, digits, '_', '-' and '.' only.".to_string(),
            ),
            Self::Io { .. } => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::NotFound { .. } => vec![
                "Check [prompts] dir in .relay/config.toml".to_string(),
                "Check the --template name for typos".to_string(),
            ],
            Self::InvalidName(_) => vec!["Use the bare template name without a path".to_string()],
            Self::Io { .. } => vec!["Check file permissions on the prompts directory".to_string()],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

/// Resolves prompt templates by name
pub trait PromptSource: Send + Sync {
    /// Load the raw template text for `name`
    fn load(&self, name: &str) -> Result<String, PromptError>;

    /// Substitute `vars` into `template`
    fn render(&self, template: &str, vars: &Vars) -> String {
        render(template, vars)
    }
}

/// Replace every `{{name}}` placeholder with its variable.
///
/// Strings are inserted verbatim; other JSON values as compact JSON. Placeholders
/// without a matching variable are left untouched.
#[must_use]
pub fn render(template: &str, vars: &Vars) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures<'_>| {
            let key = &caps[1];
            match vars.get(key) {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => {
                    debug!(variable = %key, "Prompt variable not provided");
                    caps[0].to_string()
                }
            }
        })
        .into_owned()
}

fn check_name(name: &str) -> Result<(), PromptError> {
    if TEMPLATE_NAME.is_match(name) && !name.contains("..") {
        Ok(())
    } else {
        Err(PromptError::InvalidName(name.to_string()))
    }
}

/// Templates held in memory, keyed by name
#[derive(Debug, Clone, Default)]
pub struct InMemoryPromptSource {
    templates: HashMap<String, String>,
}

impl InMemoryPromptSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_template(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.templates.insert(name.into(), text.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.templates.insert(name.into(), text.into());
    }
}

impl PromptSource for InMemoryPromptSource {
    fn load(&self, name: &str) -> Result<String, PromptError> {
        self.templates
            .get(name)
            .cloned()
            .ok_or_else(|| PromptError::NotFound {
                name: name.to_string(),
            })
    }
}

/// Templates stored as `<dir>/<name>.txt` or `<dir>/<name>.md`
#[derive(Debug, Clone)]
pub struct DirectoryPromptSource {
    dir: PathBuf,
}

impl DirectoryPromptSource {
    const EXTENSIONS: [&'static str; 2] = ["txt", "md"];

    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl PromptSource for DirectoryPromptSource {
    fn load(&self, name: &str) -> Result<String, PromptError> {
        check_name(name)?;

        for ext in Self::EXTENSIONS {
            let path = self.dir.join(format!("{name}.{ext}"));
            match std::fs::read_to_string(&path) {
                Ok(text) => {
                    debug!(template = %name, path = %path.display(), "Loaded prompt template");
                    return Ok(text);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(source) => {
                    return Err(PromptError::Io {
                        name: name.to_string(),
                        source,
                    });
                }
            }
        }

        Err(PromptError::NotFound {
            name: name.to_string(),
        })
    }
}
