//! Variable contract checks and secret scanning around rendering.
//!
//! `render_safely` runs the whole guard sequence:
//! - **Required vars**: every declared required name must be bound.
//! - **Strict vars** (opt-in): every bound name must be declared.
//! - **Input scan** (`safe` without `redact`): string values in vars must not
//!   look like credentials.
//! - **Render**, then **output scan** (`safe`): rendered content is either
//!   rejected or redacted in place when `redact` is set.
use crate::error::{VaultError, VaultResult};
use crate::render::{render_messages, RenderedMessage};
use crate::spec::PromptSpec;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::LazyLock;

pub const REDACTION_PLACEHOLDER: &str = "[REDACTED]";

/// Toggles for the guard sequence. All off by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SafetyOptions {
    #[serde(default)]
    pub safe: bool,
    #[serde(default)]
    pub redact: bool,
    #[serde(default)]
    pub strict_vars: bool,
}

impl SafetyOptions {
    /// Flags set on either side stay set.
    pub fn union(self, other: SafetyOptions) -> SafetyOptions {
        SafetyOptions {
            safe: self.safe || other.safe,
            redact: self.redact || other.redact,
            strict_vars: self.strict_vars || other.strict_vars,
        }
    }
}

struct SecretPattern {
    label: &'static str,
    regex: Regex,
}

const SECRET_PATTERN_SOURCES: &[(&str, &str)] = &[
    ("anthropic_api_key", r"\bsk-ant-[A-Za-z0-9_\-]{20,}"),
    ("openai_api_key", r"\bsk-(?:proj-)?[A-Za-z0-9]{20,}"),
    ("aws_access_key_id", r"\bAKIA[0-9A-Z]{16}\b"),
    ("github_token", r"\bgh[pousr]_[A-Za-z0-9]{20,}"),
    ("npm_token", r"\bnpm_[A-Za-z0-9]{20,}"),
    ("pypi_token", r"\bpypi-[A-Za-z0-9_\-]{20,}"),
    (
        "generic_secret",
        r#"(?i)\b(?:api|token|secret)(?:[_-]?key)?\s*[:=]\s*["']?[A-Za-z0-9\-]{16,}"#,
    ),
];

static SECRET_PATTERNS: LazyLock<Vec<SecretPattern>> = LazyLock::new(|| {
    SECRET_PATTERN_SOURCES
        .iter()
        .map(|&(label, source)| SecretPattern {
            label,
            regex: Regex::new(source).expect("secret pattern compiles"),
        })
        .collect()
});

/// Labels of every secret pattern that matches `text`, in table order.
pub fn scan_text(text: &str) -> Vec<&'static str> {
    SECRET_PATTERNS
        .iter()
        .filter(|pattern| pattern.regex.is_match(text))
        .map(|pattern| pattern.label)
        .collect()
}

/// Replace every matched span with the placeholder. Idempotent.
pub fn redact_text(text: &str) -> String {
    let mut redacted = text.to_string();
    for pattern in SECRET_PATTERNS.iter() {
        if pattern.regex.is_match(&redacted) {
            redacted = pattern
                .regex
                .replace_all(&redacted, REDACTION_PLACEHOLDER)
                .into_owned();
        }
    }
    redacted
}

pub fn check_required_vars(spec: &PromptSpec, vars: &Map<String, Value>) -> VaultResult<()> {
    let missing: Vec<String> = spec
        .variables
        .required
        .iter()
        .filter(|name| !vars.contains_key(name.as_str()))
        .cloned()
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(VaultError::MissingVariables { names: missing })
    }
}

pub fn check_strict_vars(spec: &PromptSpec, vars: &Map<String, Value>) -> VaultResult<()> {
    let unexpected: Vec<String> = vars
        .keys()
        .filter(|name| !spec.declares(name))
        .cloned()
        .collect();
    if unexpected.is_empty() {
        Ok(())
    } else {
        Err(VaultError::UnexpectedVariables { names: unexpected })
    }
}

/// Scan every string reachable from `vars`, including nested values.
pub fn scan_vars(vars: &Map<String, Value>) -> VaultResult<()> {
    let mut locations = Vec::new();
    let mut labels: Vec<&'static str> = Vec::new();
    for (key, value) in vars {
        scan_value(value, &format!("vars.{key}"), &mut locations, &mut labels);
    }
    if labels.is_empty() {
        return Ok(());
    }
    Err(VaultError::SecretDetected {
        location: locations.join(", "),
        labels: ordered_labels(&labels),
    })
}

/// Run the guard sequence and render.
pub fn render_safely(
    spec: &PromptSpec,
    vars: &Map<String, Value>,
    options: SafetyOptions,
) -> VaultResult<Vec<RenderedMessage>> {
    check_required_vars(spec, vars)?;
    if options.strict_vars {
        check_strict_vars(spec, vars)?;
    }
    if options.safe && !options.redact {
        scan_vars(vars)?;
    }
    let mut messages = render_messages(spec, vars)?;
    if !options.safe {
        return Ok(messages);
    }
    if options.redact {
        let mut redacted = 0usize;
        for message in &mut messages {
            let cleaned = redact_text(&message.content);
            if cleaned != message.content {
                redacted += 1;
                message.content = cleaned;
            }
        }
        if redacted > 0 {
            tracing::debug!(prompt = %spec.name, messages = redacted, "redacted rendered content");
        }
        return Ok(messages);
    }
    let mut locations = Vec::new();
    let mut labels = Vec::new();
    for (idx, message) in messages.iter().enumerate() {
        let found = scan_text(&message.content);
        if !found.is_empty() {
            locations.push(format!("messages[{idx}]"));
            labels.extend(found);
        }
    }
    if labels.is_empty() {
        Ok(messages)
    } else {
        Err(VaultError::SecretDetected {
            location: format!("rendered {}", locations.join(", ")),
            labels: ordered_labels(&labels),
        })
    }
}

fn scan_value(
    value: &Value,
    path: &str,
    locations: &mut Vec<String>,
    labels: &mut Vec<&'static str>,
) {
    match value {
        Value::String(text) => {
            let found = scan_text(text);
            if !found.is_empty() {
                locations.push(path.to_string());
                labels.extend(found);
            }
        }
        Value::Array(items) => {
            for (idx, item) in items.iter().enumerate() {
                scan_value(item, &format!("{path}[{idx}]"), locations, labels);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                scan_value(item, &format!("{path}.{key}"), locations, labels);
            }
        }
        _ => {}
    }
}

/// Deduplicate labels, keeping pattern table order.
fn ordered_labels(found: &[&'static str]) -> Vec<String> {
    SECRET_PATTERN_SOURCES
        .iter()
        .map(|(label, _)| *label)
        .filter(|label| found.contains(label))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
#[path = "safety_tests.rs"]
mod tests;
