//! Error taxonomy for the validate -> render -> evaluate pipeline.
//!
//! Every failure the core can produce is a `VaultError`. The orchestrator
//! flattens these into `TestResult::error` strings; the CLI wraps them in
//! `anyhow` for reporting.

use crate::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    /// Spec failed structural or field validation.
    #[error("invalid prompt spec: {}", .violations.join("; "))]
    Schema { violations: Vec<String> },

    /// A dataset line was not valid JSON or not a valid row.
    #[error("Invalid dataset on line {line}: {detail}")]
    Dataset { line: usize, detail: String },

    #[error("Missing required vars: {}", format_names(.names))]
    MissingVariables { names: Vec<String> },

    #[error("Unexpected vars (strict mode): {}", format_names(.names))]
    UnexpectedVariables { names: Vec<String> },

    /// Template referenced a name that the binding does not define.
    #[error("undefined template reference in messages[{message}]: {name}")]
    UndefinedReference { message: usize, name: String },

    #[error("template error in messages[{message}]: {detail}")]
    Template { message: usize, detail: String },

    #[error("secret detected in {location}: {}", .labels.join(", "))]
    SecretDetected { location: String, labels: Vec<String> },

    #[error("{}", .findings.join("; "))]
    PolicyViolation { findings: Vec<String> },

    /// Policy could not be loaded or a hook failed to run.
    #[error("policy error: {0}")]
    PolicyConfig(String),

    #[error("assertion error: {0}")]
    Assertion(String),

    #[error("bundle error: {0}")]
    Bundle(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl VaultError {
    pub(crate) fn schema(violation: impl Into<String>) -> Self {
        VaultError::Schema {
            violations: vec![violation.into()],
        }
    }

    /// First human-readable reason, for one-line summaries.
    pub fn first_reason(&self) -> String {
        match self {
            VaultError::Schema { violations } => violations
                .first()
                .cloned()
                .unwrap_or_else(|| "invalid prompt spec".to_string()),
            VaultError::PolicyViolation { findings } => findings
                .first()
                .cloned()
                .unwrap_or_else(|| "policy violation".to_string()),
            other => other.to_string(),
        }
    }
}

pub type VaultResult<T> = Result<T, VaultError>;

fn format_names(names: &[String]) -> String {
    let quoted: Vec<String> = names.iter().map(|name| format!("'{name}'")).collect();
    format!("[{}]", quoted.join(", "))
}
