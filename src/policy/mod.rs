//! Policy hooks run at spec load time and after each render.
//!
//! A policy exposes two optional capabilities, `check_spec` and
//! `check_render`; each returns human-readable findings and any finding fails
//! the associated validation or test. Policies are either compiled in and
//! selected by name (`builtin:<name>`) or an external command that speaks
//! JSON over stdin/stdout.
mod builtin;
mod process;

pub use builtin::BUILTIN_POLICIES;
pub use process::ProcessPolicy;

use crate::error::{VaultError, VaultResult};
use crate::spec::{parse_spec_text, LoadMode, PromptSpec};
use serde::Serialize;
use serde_json::Value;

const BUILTIN_PREFIX: &str = "builtin:";

/// Whether a render came from an inline spec test or a dataset row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseKind {
    Inline,
    Dataset,
}

/// Identifies the rendered text handed to `check_render`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderContext {
    pub prompt: String,
    pub test: String,
    pub kind: CaseKind,
}

pub trait Policy {
    /// Label used in logs.
    fn name(&self) -> &str;

    fn check_spec(&self, _spec: &Value) -> VaultResult<Vec<String>> {
        Ok(Vec::new())
    }

    fn check_render(&self, _text: &str, _context: &RenderContext) -> VaultResult<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Holds the configured policy, if any. No policy means every check passes.
#[derive(Default)]
pub struct PolicyRunner {
    policy: Option<Box<dyn Policy>>,
}

impl PolicyRunner {
    pub fn none() -> Self {
        Self { policy: None }
    }

    pub fn new(policy: Box<dyn Policy>) -> Self {
        Self {
            policy: Some(policy),
        }
    }

    /// Load from an optional selector string (see `load_policy`).
    pub fn from_selector(selector: Option<&str>) -> VaultResult<Self> {
        match selector {
            Some(selector) => Ok(Self::new(load_policy(selector)?)),
            None => Ok(Self::none()),
        }
    }

    pub fn policy_name(&self) -> Option<&str> {
        self.policy.as_deref().map(|policy| policy.name())
    }

    pub fn check_spec(&self, raw: &Value) -> VaultResult<()> {
        let Some(policy) = self.policy.as_deref() else {
            return Ok(());
        };
        into_result(policy.check_spec(raw)?)
    }

    pub fn check_render(&self, text: &str, context: &RenderContext) -> VaultResult<()> {
        let Some(policy) = self.policy.as_deref() else {
            return Ok(());
        };
        into_result(policy.check_render(text, context)?)
    }
}

/// Resolve a policy selector.
///
/// `builtin:<name>` picks a compiled-in policy. Anything else is a command
/// line, split shell-style, whose program must be resolvable.
pub fn load_policy(selector: &str) -> VaultResult<Box<dyn Policy>> {
    let selector = selector.trim();
    if selector.is_empty() {
        return Err(VaultError::PolicyConfig(
            "policy selector is empty".to_string(),
        ));
    }
    if let Some(name) = selector.strip_prefix(BUILTIN_PREFIX) {
        return builtin::by_name(name.trim());
    }
    Ok(Box::new(ProcessPolicy::from_command_line(selector)?))
}

/// Schema validation followed by the spec policy hook.
pub fn validate_spec(
    text: &str,
    mode: LoadMode,
    runner: &PolicyRunner,
) -> VaultResult<PromptSpec> {
    let raw = parse_spec_text(text)?;
    let spec = PromptSpec::from_value(&raw, mode)?;
    runner.check_spec(&raw)?;
    Ok(spec)
}

fn into_result(findings: Vec<String>) -> VaultResult<()> {
    let findings: Vec<String> = findings
        .into_iter()
        .filter(|finding| !finding.trim().is_empty())
        .collect();
    if findings.is_empty() {
        Ok(())
    } else {
        Err(VaultError::PolicyViolation { findings })
    }
}
