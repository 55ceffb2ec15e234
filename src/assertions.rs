//! Assertion evaluation against rendered prompt text.
//!
//! Substring criteria compare lower-cased text; regex criteria run against
//! the original text. A `json_schema` criterion parses the text as JSON and
//! reduces both parse failures and schema violations to a failed check. Only
//! an assertion that cannot be compiled is an error.
use crate::error::{VaultError, VaultResult};
use crate::spec::AssertSpec;
use regex::Regex;
use serde_json::Value;

/// Evaluate every present criterion; true only when all of them hold.
pub fn evaluate(assert_spec: &AssertSpec, text: &str) -> VaultResult<bool> {
    Ok(explain(assert_spec, text)?.is_empty())
}

/// List the criteria that failed against `text`, one line per criterion.
///
/// An empty list means the assertion passed.
pub fn explain(assert_spec: &AssertSpec, text: &str) -> VaultResult<Vec<String>> {
    let lowered = text.to_lowercase();
    let mut failures = Vec::new();

    if let Some(needles) = non_empty(&assert_spec.contains_any) {
        if !needles
            .iter()
            .any(|needle| lowered.contains(&needle.to_lowercase()))
        {
            failures.push(format!("contains_any: none of {needles:?} found"));
        }
    }
    if let Some(needles) = non_empty(&assert_spec.contains_all) {
        let missing: Vec<&String> = needles
            .iter()
            .filter(|needle| !lowered.contains(&needle.to_lowercase()))
            .collect();
        if !missing.is_empty() {
            failures.push(format!("contains_all: missing {missing:?}"));
        }
    }
    if let Some(needles) = non_empty(&assert_spec.not_contains) {
        let present: Vec<&String> = needles
            .iter()
            .filter(|needle| lowered.contains(&needle.to_lowercase()))
            .collect();
        if !present.is_empty() {
            failures.push(format!("not_contains: found {present:?}"));
        }
    }
    if let Some(patterns) = non_empty(&assert_spec.matches) {
        for pattern in patterns {
            if !compile(pattern)?.is_match(text) {
                failures.push(format!("matches: no match for /{pattern}/"));
            }
        }
    }
    if let Some(patterns) = non_empty(&assert_spec.not_matches) {
        for pattern in patterns {
            if compile(pattern)?.is_match(text) {
                failures.push(format!("not_matches: unexpected match for /{pattern}/"));
            }
        }
    }
    if let Some(schema) = assert_spec.json_schema.as_ref().filter(|s| !s.is_null()) {
        if let Some(failure) = check_json_schema(schema, text)? {
            failures.push(failure);
        }
    }
    Ok(failures)
}

/// Problems that make an assertion impossible to evaluate, relative to the
/// assert block (e.g. `matches[1]: invalid regex: ...`).
pub fn compile_problems(assert_spec: &AssertSpec) -> Vec<String> {
    let mut problems = Vec::new();
    for (field, patterns) in [
        ("matches", &assert_spec.matches),
        ("not_matches", &assert_spec.not_matches),
    ] {
        for (idx, pattern) in patterns.iter().flatten().enumerate() {
            if let Err(err) = Regex::new(pattern) {
                problems.push(format!("{field}[{idx}]: invalid regex: {err}"));
            }
        }
    }
    if let Some(schema) = assert_spec.json_schema.as_ref().filter(|s| !s.is_null()) {
        if let Err(err) = jsonschema::validator_for(schema) {
            problems.push(format!("json_schema: invalid schema: {err}"));
        }
    }
    problems
}

fn check_json_schema(schema: &Value, text: &str) -> VaultResult<Option<String>> {
    let validator = jsonschema::validator_for(schema)
        .map_err(|err| VaultError::Assertion(format!("invalid json_schema: {err}")))?;
    let instance: Value = match serde_json::from_str(text) {
        Ok(instance) => instance,
        Err(_) => return Ok(Some("json_schema: text is not valid JSON".to_string())),
    };
    let errors: Vec<String> = validator
        .iter_errors(&instance)
        .map(|err| err.to_string())
        .collect();
    if errors.is_empty() {
        Ok(None)
    } else {
        Ok(Some(format!("json_schema: {}", errors.join("; "))))
    }
}

fn compile(pattern: &str) -> VaultResult<Regex> {
    Regex::new(pattern)
        .map_err(|err| VaultError::Assertion(format!("invalid regex /{pattern}/: {err}")))
}

fn non_empty(list: &Option<Vec<String>>) -> Option<&[String]> {
    list.as_deref().filter(|items| !items.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn strings(items: &[&str]) -> Option<Vec<String>> {
        Some(items.iter().map(|item| item.to_string()).collect())
    }

    #[test]
    fn contains_any_ignores_case() {
        let spec = AssertSpec {
            contains_any: strings(&["Ava"]),
            ..Default::default()
        };
        assert!(evaluate(&spec, "say hi to ava").expect("evaluate"));
        assert!(!evaluate(&spec, "say hi to bob").expect("evaluate"));
    }

    #[test]
    fn criteria_are_conjunctive() {
        let spec = AssertSpec {
            contains_all: strings(&["alpha", "beta"]),
            not_contains: strings(&["gamma"]),
            ..Default::default()
        };
        assert!(evaluate(&spec, "ALPHA and Beta").expect("evaluate"));
        assert!(!evaluate(&spec, "alpha only").expect("evaluate"));
        assert!(!evaluate(&spec, "alpha beta GAMMA").expect("evaluate"));
    }

    #[test]
    fn regex_criteria_use_original_case() {
        let spec = AssertSpec {
            matches: strings(&[r"hello\s+\d+"]),
            ..Default::default()
        };
        assert!(evaluate(&spec, "hello 123").expect("evaluate"));
        assert!(!evaluate(&spec, "HELLO 123").expect("evaluate"));

        let spec = AssertSpec {
            not_matches: strings(&["goodbye"]),
            ..Default::default()
        };
        assert!(evaluate(&spec, "hello 123").expect("evaluate"));
        assert!(!evaluate(&spec, "goodbye 123").expect("evaluate"));
    }

    #[test]
    fn json_schema_on_non_json_text_is_false() {
        let spec = AssertSpec {
            json_schema: Some(json!({"type": "object"})),
            ..Default::default()
        };
        assert!(!evaluate(&spec, "hello 123").expect("evaluate"));
        assert!(evaluate(&spec, r#"{"a": 1}"#).expect("evaluate"));
    }

    #[test]
    fn json_schema_violation_is_false_and_explained() {
        let spec = AssertSpec {
            json_schema: Some(json!({
                "type": "object",
                "required": ["answer"]
            })),
            ..Default::default()
        };
        let failures = explain(&spec, r#"{"other": true}"#).expect("explain");
        assert_eq!(failures.len(), 1);
        assert!(failures[0].starts_with("json_schema:"), "{failures:?}");
    }

    #[test]
    fn invalid_regex_is_an_error_not_a_failure() {
        let spec = AssertSpec {
            matches: strings(&["("]),
            ..Default::default()
        };
        assert!(matches!(
            evaluate(&spec, "text"),
            Err(VaultError::Assertion(_))
        ));
        let problems = compile_problems(&spec);
        assert_eq!(problems.len(), 1);
        assert!(problems[0].starts_with("matches[0]: invalid regex"));
    }

    #[test]
    fn empty_lists_are_skipped() {
        let spec = AssertSpec {
            contains_any: Some(Vec::new()),
            not_contains: strings(&["x"]),
            ..Default::default()
        };
        assert!(evaluate(&spec, "anything").expect("evaluate"));
    }
}
