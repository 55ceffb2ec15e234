use anyhow::{anyhow, Context, Result};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

pub fn display_path(path: &Path, base: Option<&Path>) -> String {
    if let Some(base) = base {
        if let Ok(relative) = path.strip_prefix(base) {
            return relative.display().to_string();
        }
    }
    path.display().to_string()
}

/// Parse a variable binding; it must be a JSON object.
pub fn parse_vars(raw: &str) -> Result<Map<String, Value>> {
    let value: Value = serde_json::from_str(raw).context("parse vars JSON")?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(anyhow!(
            "vars must be a JSON object (got {})",
            json_kind(&other)
        )),
    }
}

pub fn load_vars_file(path: &Path) -> Result<Map<String, Value>> {
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    parse_vars(&text).with_context(|| format!("vars file {}", path.display()))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
