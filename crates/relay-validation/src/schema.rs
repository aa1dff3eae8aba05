//! Response schemas

use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Shape check applied to a parsed reply
pub trait ResponseSchema: Send + Sync {
    /// # Errors
    ///
    /// Returns one message per violation.
    fn validate(&self, value: &Value) -> Result<(), Vec<String>>;
}

/// Errors while loading or compiling a schema document
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Failed to read schema {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Schema {path} is not valid JSON: {source}")]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid JSON Schema: {0}")]
    InvalidSchema(String),
}

/// A JSON Schema document compiled once and reused for every reply
pub struct JsonSchema {
    document: Value,
    validator: jsonschema::Validator,
}

impl JsonSchema {
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidSchema`] if the document does not compile.
    pub fn new(document: Value) -> Result<Self, SchemaError> {
        let validator = jsonschema::validator_for(&document)
            .map_err(|e| SchemaError::InvalidSchema(e.to_string()))?;
        Ok(Self {
            document,
            validator,
        })
    }

    /// Load and compile a schema file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or compiled.
    pub fn from_file(path: &Path) -> Result<Self, SchemaError> {
        let content = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let document: Value =
            serde_json::from_str(&content).map_err(|source| SchemaError::InvalidJson {
                path: path.to_path_buf(),
                source,
            })?;
        Self::new(document)
    }

    #[must_use]
    pub fn document(&self) -> &Value {
        &self.document
    }
}

impl fmt::Debug for JsonSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonSchema")
            .field("document", &self.document)
            .finish_non_exhaustive()
    }
}

impl ResponseSchema for JsonSchema {
    fn validate(&self, value: &Value) -> Result<(), Vec<String>> {
        let errors: Vec<String> = self
            .validator
            .iter_errors(value)
            .map(|e| e.to_string())
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Schema backed by a closure
pub struct FnSchema<F>(pub F);

impl<F> ResponseSchema for FnSchema<F>
where
    F: Fn(&Value) -> Result<(), Vec<String>> + Send + Sync,
{
    fn validate(&self, value: &Value) -> Result<(), Vec<String>> {
        (self.0)(value)
    }
}

/// Accepts any JSON value
#[derive(Debug, Clone, Copy, Default)]
pub struct AnySchema;

impl ResponseSchema for AnySchema {
    fn validate(&self, _value: &Value) -> Result<(), Vec<String>> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn invoice_schema() -> JsonSchema {
        JsonSchema::new(json!({
            "type": "object",
            "required": ["vendor", "total"],
            "properties": {
                "vendor": {"type": "string"},
                "total": {"type": "number"}
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_json_schema_accepts_matching_value() {
        let schema = invoice_schema();
        assert!(schema.validate(&json!({"vendor": "ACME", "total": 12.5})).is_ok());
    }

    #[test]
    fn test_json_schema_reports_each_violation() {
        let schema = invoice_schema();
        let errors = schema.validate(&json!({"total": "twelve"})).unwrap_err();
        assert_eq!(errors.len(), 2, "{errors:?}");
    }

    #[test]
    fn test_invalid_schema_document_rejected() {
        let result = JsonSchema::new(json!({"type": "not-a-type"}));
        assert!(matches!(result, Err(SchemaError::InvalidSchema(_))));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.json");
        std::fs::write(&path, r#"{"type": "object", "required": ["id"]}"#).unwrap();

        let schema = JsonSchema::from_file(&path).unwrap();
        assert!(schema.validate(&json!({"id": 1})).is_ok());
        assert!(schema.validate(&json!({})).is_err());

        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            JsonSchema::from_file(&path),
            Err(SchemaError::InvalidJson { .. })
        ));
        assert!(matches!(
            JsonSchema::from_file(&dir.path().join("missing.json")),
            Err(SchemaError::Io { .. })
        ));
    }

    #[test]
    fn test_fn_schema() {
        let schema = FnSchema(|v: &Value| {
            if v.get("ok").is_some() {
                Ok(())
            } else {
                Err(vec!["missing 'ok'".to_string()])
            }
        });
        assert!(schema.validate(&json!({"ok": true})).is_ok());
        assert_eq!(
            schema.validate(&json!({})).unwrap_err(),
            vec!["missing 'ok'".to_string()]
        );
    }
}
