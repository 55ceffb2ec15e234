//! External policy process speaking JSON over stdin/stdout.
//!
//! Each hook call spawns the command once, writes a single request object
//! and reads a single response object:
//!
//! ```text
//! {"hook": "check_spec", "spec": {...}}
//! {"hook": "check_render", "text": "...", "context": {...}}
//!   -> {"findings": ["..."]}
//! ```
//!
//! A response without `findings`, or no output at all, means the process
//! does not implement that hook.
use super::{Policy, RenderContext};
use crate::error::{VaultError, VaultResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};
use std::time::Instant;

#[derive(Serialize)]
#[serde(tag = "hook", rename_all = "snake_case")]
enum HookRequest<'a> {
    CheckSpec {
        spec: &'a Value,
    },
    CheckRender {
        text: &'a str,
        context: &'a RenderContext,
    },
}

impl HookRequest<'_> {
    fn label(&self) -> &'static str {
        match self {
            HookRequest::CheckSpec { .. } => "check_spec",
            HookRequest::CheckRender { .. } => "check_render",
        }
    }
}

#[derive(Deserialize)]
struct HookResponse {
    #[serde(default)]
    findings: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ProcessPolicy {
    argv: Vec<String>,
    label: String,
}

impl ProcessPolicy {
    /// Split a shell-style command line and check that its program resolves.
    pub fn from_command_line(command_line: &str) -> VaultResult<Self> {
        let argv = shell_words::split(command_line).map_err(|err| {
            VaultError::PolicyConfig(format!("parse policy command `{command_line}`: {err}"))
        })?;
        Self::from_argv(argv)
    }

    pub fn from_argv(argv: Vec<String>) -> VaultResult<Self> {
        let Some(program) = argv.first() else {
            return Err(VaultError::PolicyConfig(
                "policy command is empty".to_string(),
            ));
        };
        if which::which(program).is_err() {
            return Err(VaultError::PolicyConfig(format!(
                "policy command not found: {program}"
            )));
        }
        let label = format!("process:{program}");
        Ok(Self { argv, label })
    }

    fn invoke(&self, request: &HookRequest<'_>) -> VaultResult<Vec<String>> {
        let payload = serde_json::to_vec(request).map_err(|err| {
            VaultError::PolicyConfig(format!("serialize {} request: {err}", request.label()))
        })?;
        let (program, args) = self
            .argv
            .split_first()
            .ok_or_else(|| VaultError::PolicyConfig("policy command is empty".to_string()))?;

        let started = Instant::now();
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| hook_failure(request, format!("spawn {program}: {err}")))?;
        if let Some(mut stdin) = child.stdin.take() {
            // A process that exits without reading its request still answers.
            match stdin.write_all(&payload) {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::BrokenPipe => {
                    tracing::debug!(policy = %self.label, "policy closed stdin early");
                }
                Err(err) => return Err(hook_failure(request, format!("write request: {err}"))),
            }
        }
        let output = child
            .wait_with_output()
            .map_err(|err| hook_failure(request, format!("wait for output: {err}")))?;
        tracing::info!(
            policy = %self.label,
            hook = request.label(),
            elapsed_ms = started.elapsed().as_millis(),
            "policy hook finished"
        );
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(hook_failure(
                request,
                format!("exited with {}: {}", output.status, stderr.trim()),
            ));
        }
        parse_response(&output.stdout).map_err(|detail| hook_failure(request, detail))
    }
}

impl Policy for ProcessPolicy {
    fn name(&self) -> &str {
        &self.label
    }

    fn check_spec(&self, spec: &Value) -> VaultResult<Vec<String>> {
        self.invoke(&HookRequest::CheckSpec { spec })
    }

    fn check_render(&self, text: &str, context: &RenderContext) -> VaultResult<Vec<String>> {
        self.invoke(&HookRequest::CheckRender { text, context })
    }
}

fn parse_response(stdout: &[u8]) -> Result<Vec<String>, String> {
    let text = String::from_utf8_lossy(stdout);
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let response: HookResponse = serde_json::from_str(text.trim())
        .map_err(|err| format!("response JSON failed to parse: {err}"))?;
    Ok(response.findings)
}

fn hook_failure(request: &HookRequest<'_>, detail: String) -> VaultError {
    VaultError::PolicyConfig(format!("{} hook failed: {detail}", request.label()))
}
