//! Compiled-in policies selectable as `builtin:<name>`.
use super::{Policy, RenderContext};
use crate::error::{VaultError, VaultResult};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

pub const BUILTIN_POLICIES: &[&str] = &["pii", "forbidden-phrases"];

const RESERVED_NAME_PREFIX: &str = "unsafe_";

const PII_PATTERN_SOURCES: &[(&str, &str)] = &[
    ("email", r"\b[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}\b"),
    ("ssn", r"\b\d{3}-\d{2}-\d{4}\b"),
    ("credit card", r"\b(?:\d[ \-]?){13,16}\b"),
];

const PII_PHRASES: &[&str] = &["password", "credit card", "ssn"];
const FORBIDDEN_PHRASES: &[&str] = &["ssn", "credit card", "password"];

static PII_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    PII_PATTERN_SOURCES
        .iter()
        .map(|&(label, source)| (label, Regex::new(source).expect("pii pattern compiles")))
        .collect()
});

pub(super) fn by_name(name: &str) -> VaultResult<Box<dyn Policy>> {
    match name {
        "pii" => Ok(Box::new(PiiPolicy)),
        "forbidden-phrases" => Ok(Box::new(ForbiddenPhrasePolicy)),
        other => Err(VaultError::PolicyConfig(format!(
            "unknown builtin policy `{other}` (available: {})",
            BUILTIN_POLICIES.join(", ")
        ))),
    }
}

/// Flags emails, SSNs and card numbers in rendered output.
struct PiiPolicy;

impl Policy for PiiPolicy {
    fn name(&self) -> &str {
        "pii"
    }

    fn check_spec(&self, spec: &Value) -> VaultResult<Vec<String>> {
        Ok(reserved_name_findings(spec))
    }

    fn check_render(&self, text: &str, _context: &RenderContext) -> VaultResult<Vec<String>> {
        let mut findings: Vec<String> = PII_PATTERNS
            .iter()
            .filter(|(_, regex)| regex.is_match(text))
            .map(|(label, _)| format!("PII detected: {label}"))
            .collect();
        let lowered = text.to_lowercase();
        if PII_PHRASES.iter().any(|phrase| lowered.contains(phrase)) {
            findings.push("forbidden phrase detected".to_string());
        }
        Ok(findings)
    }
}

/// Rejects rendered output mentioning sensitive-data phrases.
struct ForbiddenPhrasePolicy;

impl Policy for ForbiddenPhrasePolicy {
    fn name(&self) -> &str {
        "forbidden-phrases"
    }

    fn check_spec(&self, spec: &Value) -> VaultResult<Vec<String>> {
        Ok(reserved_name_findings(spec))
    }

    fn check_render(&self, text: &str, _context: &RenderContext) -> VaultResult<Vec<String>> {
        let lowered = text.to_lowercase();
        Ok(FORBIDDEN_PHRASES
            .iter()
            .filter(|phrase| lowered.contains(*phrase))
            .map(|phrase| format!("rendered output contains forbidden phrase: {phrase}"))
            .collect())
    }
}

fn reserved_name_findings(spec: &Value) -> Vec<String> {
    match spec.get("name").and_then(Value::as_str) {
        Some(name) if name.starts_with(RESERVED_NAME_PREFIX) => vec![format!(
            "prompt name `{name}` must not start with `{RESERVED_NAME_PREFIX}`"
        )],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::CaseKind;
    use serde_json::json;

    fn context() -> RenderContext {
        RenderContext {
            prompt: "support".to_string(),
            test: "t1".to_string(),
            kind: CaseKind::Inline,
        }
    }

    #[test]
    fn pii_flags_each_kind_once() {
        let policy = PiiPolicy;
        let findings = policy
            .check_render(
                "mail ava@example.com, ssn 123-45-6789, card 4111 1111 1111 1111",
                &context(),
            )
            .expect("check render");
        assert_eq!(
            findings,
            vec![
                "PII detected: email",
                "PII detected: ssn",
                "PII detected: credit card",
                "forbidden phrase detected",
            ]
        );
    }

    #[test]
    fn pii_passes_clean_text() {
        let findings = PiiPolicy
            .check_render("user: Say hello to Ava.", &context())
            .expect("check render");
        assert!(findings.is_empty());
    }

    #[test]
    fn forbidden_phrases_are_case_insensitive() {
        let findings = ForbiddenPhrasePolicy
            .check_render("Please share your PASSWORD", &context())
            .expect("check render");
        assert_eq!(
            findings,
            vec!["rendered output contains forbidden phrase: password"]
        );
    }

    #[test]
    fn reserved_prefix_fails_spec_check() {
        let findings = ForbiddenPhrasePolicy
            .check_spec(&json!({"name": "unsafe_demo"}))
            .expect("check spec");
        assert_eq!(findings.len(), 1);
        assert!(findings[0].contains("unsafe_demo"));
        assert!(PiiPolicy
            .check_spec(&json!({"name": "demo"}))
            .expect("check spec")
            .is_empty());
    }
}
