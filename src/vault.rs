//! Runtime access to prompts from a repository checkout or a bundle file.
use crate::bundle::Bundle;
use crate::error::VaultResult;
use crate::render::RenderedMessage;
use crate::safety::{render_safely, SafetyOptions};
use crate::spec::{load_prompt_spec, LoadMode, PromptSpec};
use crate::store::{GitStore, PromptStore, StoreError};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

enum Source {
    Repo(GitStore),
    Bundle(Bundle),
}

pub struct PromptVault {
    source: Source,
}

impl PromptVault {
    pub fn from_repo(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            source: Source::Repo(GitStore::new(repo_root)),
        }
    }

    pub fn from_bundle(bundle: Bundle) -> Self {
        Self {
            source: Source::Bundle(bundle),
        }
    }

    pub fn from_bundle_file(path: &Path) -> VaultResult<Self> {
        let text = fs::read_to_string(path)?;
        Ok(Self::from_bundle(Bundle::from_json(&text)?))
    }

    /// Load a prompt by repository-relative path.
    ///
    /// Bundles are frozen at one ref, so `reference` only applies to
    /// repository sources.
    pub fn load_prompt(
        &self,
        prompt_path: &str,
        reference: Option<&str>,
    ) -> VaultResult<PromptSpec> {
        match &self.source {
            Source::Repo(store) => {
                let text = store.read_text(prompt_path, reference)?;
                load_prompt_spec(&text, LoadMode::RequireTests)
            }
            Source::Bundle(bundle) => bundle.find(prompt_path).cloned().ok_or_else(|| {
                StoreError::NotFound {
                    path: prompt_path.to_string(),
                    reference: bundle.reference.clone(),
                }
                .into()
            }),
        }
    }

    pub fn render(
        &self,
        prompt_path: &str,
        vars: &Map<String, Value>,
        reference: Option<&str>,
        options: SafetyOptions,
    ) -> VaultResult<Vec<RenderedMessage>> {
        let spec = self.load_prompt(prompt_path, reference)?;
        render_safely(&spec, vars, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::write_bundle;
    use crate::error::VaultError;
    use serde_json::json;

    const PROMPT: &str = r#"
name: support
variables:
  required: [customer]
messages:
  - role: user
    content: "Help {{ customer }}"
tests:
  - name: t
    vars: { customer: "Ava" }
    assert: { contains_any: ["Ava"] }
"#;

    fn vars(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("vars must be an object"),
        }
    }

    fn seeded_repo() -> tempfile::TempDir {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("prompts/support.prompt.yml");
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, PROMPT).expect("write");
        temp
    }

    #[test]
    fn repo_and_bundle_render_the_same() {
        let temp = seeded_repo();
        let bundle_path = temp.path().join("out/bundle.json");
        write_bundle(&bundle_path, &GitStore::new(temp.path()), "prompts", None)
            .expect("write bundle");

        let bound = vars(json!({"customer": "Bo"}));
        let from_repo = PromptVault::from_repo(temp.path())
            .render("prompts/support.prompt.yml", &bound, None, SafetyOptions::default())
            .expect("render from repo");
        let from_bundle = PromptVault::from_bundle_file(&bundle_path)
            .expect("open bundle")
            .render("prompts/support.prompt.yml", &bound, None, SafetyOptions::default())
            .expect("render from bundle");
        assert_eq!(from_repo, from_bundle);
        assert_eq!(from_repo[0].content, "Help Bo");
    }

    #[test]
    fn bundle_lookup_miss_is_not_found() {
        let temp = seeded_repo();
        let bundle_path = temp.path().join("bundle.json");
        write_bundle(&bundle_path, &GitStore::new(temp.path()), "prompts", None)
            .expect("write bundle");
        let vault = PromptVault::from_bundle_file(&bundle_path).expect("open bundle");
        assert!(matches!(
            vault.load_prompt("prompts/other.prompt.yml", None),
            Err(VaultError::Store(StoreError::NotFound { .. }))
        ));
    }

    #[test]
    fn render_enforces_required_vars() {
        let temp = seeded_repo();
        let err = PromptVault::from_repo(temp.path())
            .render("prompts/support.prompt.yml", &Map::new(), None, SafetyOptions::default())
            .expect_err("missing var");
        assert_eq!(err.to_string(), "Missing required vars: ['customer']");
    }
}
