//! Prompt spec model and load-time validation.
//!
//! Specs arrive as YAML or JSON text. Loading happens in two passes: wire
//! aliases are folded onto canonical field names through the alias tables
//! below, then each section is decoded into its typed shape. Every violation
//! is recorded with the path of the offending field so a single load reports
//! all broken sections at once.
use crate::assertions;
use crate::error::{VaultError, VaultResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub const DEFAULT_SPEC_VERSION: &str = "1.0";

/// Wire aliases accepted at the top level of a spec document.
pub const TOP_LEVEL_ALIASES: &[(&str, &str)] = &[
    ("specVersion", "spec_version"),
    ("modelParameters", "model_defaults"),
    ("model_parameters", "model_defaults"),
    ("modelDefaults", "model_defaults"),
];

/// Wire aliases accepted inside an `assert` block.
pub const ASSERT_ALIASES: &[(&str, &str)] = &[
    ("containsAny", "contains_any"),
    ("containsAll", "contains_all"),
    ("notContains", "not_contains"),
    ("notMatches", "not_matches"),
    ("jsonSchema", "json_schema"),
];

const TOP_LEVEL_FIELDS: &[&str] = &[
    "spec_version",
    "name",
    "description",
    "model_defaults",
    "variables",
    "messages",
    "tests",
];

/// Whether a spec without inline tests is acceptable.
///
/// Only bundle collection loads with `AllowNoTests`; validate/eval always
/// require at least one test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    RequireTests,
    AllowNoTests,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message template; `content` is expanded by the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariableSpec {
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub optional: Vec<String>,
}

/// Declarative checks run against rendered text. All present criteria must
/// hold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssertSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contains_any: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contains_all: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_contains: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matches: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_matches: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_schema: Option<Value>,
}

impl AssertSpec {
    /// True when no criterion carries anything to check.
    pub fn is_empty(&self) -> bool {
        let lists = [
            &self.contains_any,
            &self.contains_all,
            &self.not_contains,
            &self.matches,
            &self.not_matches,
        ];
        let no_lists = lists
            .iter()
            .all(|list| list.as_deref().unwrap_or_default().is_empty());
        let no_schema = matches!(self.json_schema, None | Some(Value::Null));
        no_lists && no_schema
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PromptTest {
    pub name: String,
    #[serde(default)]
    pub vars: Map<String, Value>,
    #[serde(rename = "assert")]
    pub assert_spec: AssertSpec,
}

/// One JSON Lines dataset entry; named `dataset_row_N` at evaluation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetRow {
    #[serde(default)]
    pub vars: Map<String, Value>,
    #[serde(rename = "assert")]
    pub assert_spec: AssertSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptSpec {
    pub spec_version: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub model_defaults: BTreeMap<String, Value>,
    pub variables: VariableSpec,
    pub messages: Vec<PromptMessage>,
    pub tests: Vec<PromptTest>,
}

impl PromptSpec {
    /// Build a spec from an already-parsed document.
    pub fn from_value(raw: &Value, mode: LoadMode) -> VaultResult<PromptSpec> {
        let mut violations = Vec::new();
        let doc = match raw {
            Value::Object(map) => fold_aliases(map, TOP_LEVEL_ALIASES, "", &mut violations),
            Value::Null => Map::new(),
            other => {
                return Err(VaultError::schema(format!(
                    "spec must be a mapping, got {}",
                    type_name(other)
                )))
            }
        };
        for key in doc.keys() {
            if !TOP_LEVEL_FIELDS.contains(&key.as_str()) {
                violations.push(format!("{key}: unknown field"));
            }
        }

        let spec_version = match doc.get("spec_version") {
            None | Some(Value::Null) => Some(DEFAULT_SPEC_VERSION.to_string()),
            Some(value) => decode::<String>(value, "spec_version", &mut violations),
        };

        let name = match doc.get("name") {
            None => {
                violations.push("name: field required".to_string());
                None
            }
            Some(value) => decode::<String>(value, "name", &mut violations),
        };
        if let Some(name) = &name {
            if name.trim().is_empty() {
                violations.push("name: must not be blank".to_string());
            }
        }

        let description = match doc.get("description") {
            None | Some(Value::Null) => None,
            Some(value) => decode::<String>(value, "description", &mut violations),
        };

        let model_defaults = match doc.get("model_defaults") {
            None | Some(Value::Null) => BTreeMap::new(),
            Some(Value::Object(map)) => map
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
            Some(other) => {
                violations.push(format!(
                    "model_defaults: expected a mapping, got {}",
                    type_name(other)
                ));
                BTreeMap::new()
            }
        };

        let variables = match doc.get("variables") {
            None | Some(Value::Null) => VariableSpec::default(),
            Some(value) => decode::<VariableSpec>(value, "variables", &mut violations)
                .unwrap_or_default(),
        };
        check_unique(&variables.required, "variables.required", &mut violations);
        check_unique(&variables.optional, "variables.optional", &mut violations);

        let messages = match doc.get("messages") {
            None => {
                violations.push("messages: field required".to_string());
                Vec::new()
            }
            Some(value) => decode_messages(value, &mut violations),
        };
        if doc.contains_key("messages")
            && messages.is_empty()
            && !has_field_violation(&violations, "messages")
        {
            violations.push("messages: at least one message is required".to_string());
        }

        let tests = match doc.get("tests") {
            None | Some(Value::Null) => Vec::new(),
            Some(value) => decode_tests(value, &mut violations),
        };
        if mode == LoadMode::RequireTests
            && tests.is_empty()
            && !has_field_violation(&violations, "tests")
        {
            violations.push("tests: at least one test is required".to_string());
        }

        if !violations.is_empty() {
            return Err(VaultError::Schema { violations });
        }
        match (spec_version, name) {
            (Some(spec_version), Some(name)) => Ok(PromptSpec {
                spec_version,
                name,
                description,
                model_defaults,
                variables,
                messages,
                tests,
            }),
            _ => Err(VaultError::schema("spec is missing spec_version or name")),
        }
    }

    /// True when `name` is listed as required or optional.
    pub fn declares(&self, name: &str) -> bool {
        self.variables.required.iter().any(|item| item == name)
            || self.variables.optional.iter().any(|item| item == name)
    }
}

impl DatasetRow {
    pub fn from_value(raw: &Value) -> VaultResult<DatasetRow> {
        let mut violations = Vec::new();
        if !raw.is_object() {
            return Err(VaultError::schema(format!(
                "row must be an object, got {}",
                type_name(raw)
            )));
        }
        let folded = fold_case_aliases(raw, "", &mut violations);
        let row = decode::<DatasetRow>(&folded, "row", &mut violations);
        if let Some(row) = &row {
            check_assert(&row.assert_spec, "assert", &mut violations);
        }
        match row {
            Some(row) if violations.is_empty() => Ok(row),
            _ => Err(VaultError::Schema { violations }),
        }
    }
}

/// Parse spec text into a raw document, detecting JSON vs YAML.
///
/// Text whose trimmed form starts with `{` or `[` is JSON; anything else is
/// YAML. Empty input yields `Value::Null`, which then fails field checks.
pub fn parse_spec_text(text: &str) -> VaultResult<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Value::Null);
    }
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return serde_json::from_str(trimmed)
            .map_err(|err| VaultError::schema(format!("invalid JSON: {err}")));
    }
    serde_yaml::from_str(text).map_err(|err| VaultError::schema(format!("invalid YAML: {err}")))
}

pub fn load_prompt_spec(text: &str, mode: LoadMode) -> VaultResult<PromptSpec> {
    let raw = parse_spec_text(text)?;
    PromptSpec::from_value(&raw, mode)
}

/// Load a JSON Lines dataset. Blank lines are skipped; errors cite the
/// 1-based line number.
pub fn load_dataset_jsonl(text: &str) -> VaultResult<Vec<DatasetRow>> {
    let mut rows = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(line).map_err(|err| VaultError::Dataset {
            line: line_no,
            detail: format!("invalid JSON: {err}"),
        })?;
        let row = DatasetRow::from_value(&value).map_err(|err| VaultError::Dataset {
            line: line_no,
            detail: match err {
                VaultError::Schema { violations } => violations.join("; "),
                other => other.to_string(),
            },
        })?;
        rows.push(row);
    }
    Ok(rows)
}

fn decode_messages(value: &Value, violations: &mut Vec<String>) -> Vec<PromptMessage> {
    let Value::Array(items) = value else {
        violations.push(format!("messages: expected a list, got {}", type_name(value)));
        return Vec::new();
    };
    items
        .iter()
        .enumerate()
        .filter_map(|(idx, item)| decode(item, &format!("messages[{idx}]"), violations))
        .collect()
}

fn decode_tests(value: &Value, violations: &mut Vec<String>) -> Vec<PromptTest> {
    let Value::Array(items) = value else {
        violations.push(format!("tests: expected a list, got {}", type_name(value)));
        return Vec::new();
    };
    let mut tests = Vec::new();
    for (idx, item) in items.iter().enumerate() {
        let path = format!("tests[{idx}]");
        let folded = fold_case_aliases(item, &path, violations);
        let Some(test) = decode::<PromptTest>(&folded, &path, violations) else {
            continue;
        };
        check_assert(&test.assert_spec, &format!("{path}.assert"), violations);
        tests.push(test);
    }
    tests
}

/// Fold assert-block aliases inside a test case or dataset row.
fn fold_case_aliases(value: &Value, path: &str, violations: &mut Vec<String>) -> Value {
    let Value::Object(map) = value else {
        return value.clone();
    };
    let mut folded = map.clone();
    if let Some(Value::Object(assert_map)) = map.get("assert") {
        let assert_path = join_path(path, "assert");
        let canonical = fold_aliases(assert_map, ASSERT_ALIASES, &assert_path, violations);
        folded.insert("assert".to_string(), Value::Object(canonical));
    }
    Value::Object(folded)
}

fn fold_aliases(
    map: &Map<String, Value>,
    aliases: &[(&str, &str)],
    path: &str,
    violations: &mut Vec<String>,
) -> Map<String, Value> {
    let mut folded = Map::new();
    for (key, value) in map {
        let canonical = aliases
            .iter()
            .find(|(alias, _)| alias == key)
            .map(|(_, canonical)| *canonical)
            .unwrap_or(key.as_str());
        if folded.contains_key(canonical) {
            violations.push(format!(
                "{}: given more than once (via `{key}`)",
                join_path(path, canonical)
            ));
            continue;
        }
        folded.insert(canonical.to_string(), value.clone());
    }
    folded
}

fn check_assert(assert_spec: &AssertSpec, path: &str, violations: &mut Vec<String>) {
    if assert_spec.is_empty() {
        violations.push(format!(
            "{path}: at least one of contains_any, contains_all, not_contains, matches, \
             not_matches, json_schema is required"
        ));
        return;
    }
    for problem in assertions::compile_problems(assert_spec) {
        violations.push(format!("{path}.{problem}"));
    }
}

fn check_unique(names: &[String], path: &str, violations: &mut Vec<String>) {
    let mut seen = BTreeSet::new();
    for name in names {
        if !seen.insert(name.as_str()) {
            violations.push(format!("{path}: duplicate name `{name}`"));
        }
    }
}

fn decode<T: DeserializeOwned>(
    value: &Value,
    path: &str,
    violations: &mut Vec<String>,
) -> Option<T> {
    match serde_json::from_value(value.clone()) {
        Ok(decoded) => Some(decoded),
        Err(err) => {
            violations.push(format!("{path}: {err}"));
            None
        }
    }
}

/// True when a violation was already recorded for `field` or one of its items.
fn has_field_violation(violations: &[String], field: &str) -> bool {
    violations.iter().any(|violation| {
        violation
            .strip_prefix(field)
            .is_some_and(|rest| rest.starts_with(':') || rest.starts_with('['))
    })
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}

#[cfg(test)]
#[path = "spec_tests.rs"]
mod tests;
