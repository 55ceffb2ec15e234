//! Runs spec tests and dataset rows through render, policy and assertions.
//!
//! Every case is isolated: a failure in one case is recorded as a failed
//! `TestResult` and the remaining cases still run.
use crate::assertions;
use crate::error::VaultResult;
use crate::policy::{CaseKind, PolicyRunner, RenderContext};
use crate::render::join_messages;
use crate::safety::{render_safely, SafetyOptions};
use crate::spec::{AssertSpec, DatasetRow, PromptSpec};
use crate::store::ref_label;
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestResult {
    #[serde(rename = "test")]
    pub name: String,
    #[serde(rename = "pass")]
    pub passed: bool,
    pub error: Option<String>,
}

impl TestResult {
    fn pass(name: String) -> Self {
        Self {
            name,
            passed: true,
            error: None,
        }
    }
}

/// Guards and hooks applied to every case.
#[derive(Clone, Copy)]
pub struct EvalOptions<'a> {
    pub safety: SafetyOptions,
    pub policy: &'a PolicyRunner,
}

/// Outcome of one `eval` invocation.
#[derive(Debug, Clone, Serialize)]
pub struct EvalReport {
    pub prompt: String,
    #[serde(rename = "ref")]
    pub reference: String,
    pub pass: bool,
    pub results: Vec<TestResult>,
}

impl EvalReport {
    pub fn new(spec: &PromptSpec, reference: Option<&str>, results: Vec<TestResult>) -> Self {
        Self {
            prompt: spec.name.clone(),
            reference: ref_label(reference).to_string(),
            pass: results.iter().all(|result| result.passed),
            results,
        }
    }
}

pub fn run_inline_tests(spec: &PromptSpec, options: EvalOptions<'_>) -> (bool, Vec<TestResult>) {
    let results: Vec<TestResult> = spec
        .tests
        .iter()
        .map(|test| {
            evaluate_case(
                spec,
                &test.name,
                CaseKind::Inline,
                &test.vars,
                &test.assert_spec,
                options,
            )
        })
        .collect();
    summarize(spec, results)
}

/// Rows are named `dataset_row_N`, counting from 1 in file order.
pub fn run_dataset(
    spec: &PromptSpec,
    rows: &[DatasetRow],
    options: EvalOptions<'_>,
) -> (bool, Vec<TestResult>) {
    let results: Vec<TestResult> = rows
        .iter()
        .enumerate()
        .map(|(idx, row)| {
            let name = format!("dataset_row_{}", idx + 1);
            evaluate_case(
                spec,
                &name,
                CaseKind::Dataset,
                &row.vars,
                &row.assert_spec,
                options,
            )
        })
        .collect();
    summarize(spec, results)
}

/// Evaluate a single case; errors become a failed result carrying the message.
pub fn evaluate_case(
    spec: &PromptSpec,
    name: &str,
    kind: CaseKind,
    vars: &Map<String, Value>,
    assert_spec: &AssertSpec,
    options: EvalOptions<'_>,
) -> TestResult {
    match check_case(spec, name, kind, vars, assert_spec, options) {
        Ok(true) => TestResult::pass(name.to_string()),
        Ok(false) => TestResult {
            name: name.to_string(),
            passed: false,
            error: None,
        },
        Err(err) => {
            tracing::debug!(prompt = %spec.name, test = name, error = %err, "case errored");
            TestResult {
                name: name.to_string(),
                passed: false,
                error: Some(err.to_string()),
            }
        }
    }
}

fn check_case(
    spec: &PromptSpec,
    name: &str,
    kind: CaseKind,
    vars: &Map<String, Value>,
    assert_spec: &AssertSpec,
    options: EvalOptions<'_>,
) -> VaultResult<bool> {
    let messages = render_safely(spec, vars, options.safety)?;
    let text = join_messages(&messages);
    let context = RenderContext {
        prompt: spec.name.clone(),
        test: name.to_string(),
        kind,
    };
    options.policy.check_render(&text, &context)?;
    let failures = assertions::explain(assert_spec, &text)?;
    if !failures.is_empty() {
        tracing::debug!(prompt = %spec.name, test = name, failures = ?failures, "criteria not met");
    }
    Ok(failures.is_empty())
}

fn summarize(spec: &PromptSpec, results: Vec<TestResult>) -> (bool, Vec<TestResult>) {
    let passed = results.iter().filter(|result| result.passed).count();
    tracing::info!(
        prompt = %spec.name,
        passed,
        failed = results.len() - passed,
        "evaluated cases"
    );
    (passed == results.len(), results)
}

#[cfg(test)]
#[path = "eval_tests.rs"]
mod tests;
