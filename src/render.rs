//! Template expansion for prompt messages.
//!
//! Message content is a Jinja template rendered with `minijinja` in strict
//! undefined mode: a reference to anything the binding does not define fails
//! the render instead of expanding to an empty string. Rendering does no I/O
//! and gives the same output for the same spec and vars.
use crate::error::{VaultError, VaultResult};
use crate::spec::{PromptSpec, Role};
use minijinja::{Environment, ErrorKind, Template, UndefinedBehavior};
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedMessage {
    pub role: Role,
    pub content: String,
}

/// Render every message in spec order.
pub fn render_messages(
    spec: &PromptSpec,
    vars: &Map<String, Value>,
) -> VaultResult<Vec<RenderedMessage>> {
    let env = environment();
    let mut rendered = Vec::with_capacity(spec.messages.len());
    for (idx, message) in spec.messages.iter().enumerate() {
        let content = render_template(&env, idx, &message.content, vars)?;
        rendered.push(RenderedMessage {
            role: message.role,
            content,
        });
    }
    Ok(rendered)
}

/// Render and join as `"{role}: {content}"` blocks separated by a blank line.
pub fn render_joined_text(spec: &PromptSpec, vars: &Map<String, Value>) -> VaultResult<String> {
    Ok(join_messages(&render_messages(spec, vars)?))
}

pub fn join_messages(messages: &[RenderedMessage]) -> String {
    messages
        .iter()
        .map(|message| format!("{}: {}", message.role, message.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn environment() -> Environment<'static> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    // Literal content must survive rendering byte for byte.
    env.set_keep_trailing_newline(true);
    env
}

fn render_template(
    env: &Environment<'_>,
    idx: usize,
    source: &str,
    vars: &Map<String, Value>,
) -> VaultResult<String> {
    let template = env
        .template_from_str(source)
        .map_err(|err| VaultError::Template {
            message: idx,
            detail: err.to_string(),
        })?;
    template.render(vars).map_err(|err| {
        if err.kind() == ErrorKind::UndefinedError {
            let name = missing_reference(&template, vars).unwrap_or_else(|| {
                err.detail()
                    .map(str::to_string)
                    .unwrap_or_else(|| err.to_string())
            });
            VaultError::UndefinedReference { message: idx, name }
        } else {
            VaultError::Template {
                message: idx,
                detail: err.to_string(),
            }
        }
    })
}

/// Find the first referenced path the binding cannot satisfy.
///
/// Returns the path truncated at the first missing segment, so
/// `{{ user.nmae }}` reports `user.nmae` while `{{ ghost.name }}` reports
/// `ghost`.
fn missing_reference(template: &Template<'_, '_>, vars: &Map<String, Value>) -> Option<String> {
    let mut paths: Vec<String> = template.undeclared_variables(true).into_iter().collect();
    paths.sort();
    paths.iter().find_map(|path| unresolved_prefix(path, vars))
}

fn unresolved_prefix(path: &str, vars: &Map<String, Value>) -> Option<String> {
    let mut segments = path.split('.');
    let root = segments.next()?;
    let mut current = match vars.get(root) {
        Some(value) => value,
        None => return Some(root.to_string()),
    };
    let mut resolved = root.to_string();
    for segment in segments {
        resolved.push('.');
        resolved.push_str(segment);
        let next = match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment
                .parse::<usize>()
                .ok()
                .and_then(|index| items.get(index)),
            _ => None,
        };
        match next {
            Some(value) => current = value,
            None => return Some(resolved),
        }
    }
    None
}
