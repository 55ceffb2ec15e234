//! Prompt bundles: every spec under a prompts directory, frozen into one
//! JSON file for runtime use without a git checkout.
use crate::error::{VaultError, VaultResult};
use crate::spec::{load_prompt_spec, LoadMode, PromptSpec};
use crate::store::{is_prompt_file, ref_label, PromptStore};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::Path;

pub const BUNDLE_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BundlePrompt {
    pub path: String,
    pub spec: PromptSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bundle {
    pub bundle_version: String,
    #[serde(rename = "ref")]
    pub reference: String,
    pub prompts: Vec<BundlePrompt>,
}

impl Bundle {
    /// Parse bundle JSON, re-validating every embedded spec.
    pub fn from_json(text: &str) -> VaultResult<Bundle> {
        let raw: Value = serde_json::from_str(text)
            .map_err(|err| VaultError::Bundle(format!("invalid bundle JSON: {err}")))?;
        let version = raw
            .get("bundle_version")
            .and_then(Value::as_str)
            .ok_or_else(|| VaultError::Bundle("bundle_version missing".to_string()))?;
        if version != BUNDLE_VERSION {
            return Err(VaultError::Bundle(format!(
                "unsupported bundle_version {version} (expected {BUNDLE_VERSION})"
            )));
        }
        let reference = raw
            .get("ref")
            .and_then(Value::as_str)
            .unwrap_or(ref_label(None))
            .to_string();
        let entries = match raw.get("prompts") {
            Some(Value::Array(entries)) => entries.as_slice(),
            None => &[],
            Some(_) => return Err(VaultError::Bundle("prompts must be a list".to_string())),
        };
        let mut prompts = Vec::with_capacity(entries.len());
        for (idx, entry) in entries.iter().enumerate() {
            let path = entry
                .get("path")
                .and_then(Value::as_str)
                .ok_or_else(|| VaultError::Bundle(format!("prompts[{idx}]: path missing")))?;
            let spec_value = entry
                .get("spec")
                .ok_or_else(|| VaultError::Bundle(format!("{path}: spec missing")))?;
            let spec = PromptSpec::from_value(spec_value, LoadMode::AllowNoTests)
                .map_err(|err| VaultError::Bundle(format!("{path}: {err}")))?;
            prompts.push(BundlePrompt {
                path: path.to_string(),
                spec,
            });
        }
        Ok(Bundle {
            bundle_version: version.to_string(),
            reference,
            prompts,
        })
    }

    pub fn find(&self, path: &str) -> Option<&PromptSpec> {
        self.prompts
            .iter()
            .find(|prompt| prompt.path == path)
            .map(|prompt| &prompt.spec)
    }
}

/// Load every prompt file under `prompts_dir`, sorted by path.
///
/// Specs without tests are accepted. Any unreadable or invalid spec aborts
/// the collection with an error naming its path.
pub fn collect_prompts(
    store: &dyn PromptStore,
    prompts_dir: &str,
    reference: Option<&str>,
) -> VaultResult<Vec<BundlePrompt>> {
    let mut prompts = Vec::new();
    for path in store.list_files(prompts_dir, reference)? {
        if !is_prompt_file(&path) {
            continue;
        }
        let text = store.read_text(&path, reference)?;
        let spec = load_prompt_spec(&text, LoadMode::AllowNoTests)
            .map_err(|err| VaultError::Bundle(format!("{path}: {err}")))?;
        prompts.push(BundlePrompt { path, spec });
    }
    if prompts.is_empty() {
        return Err(VaultError::Bundle(format!(
            "no prompt files found in {prompts_dir} at {}",
            ref_label(reference)
        )));
    }
    prompts.sort_by(|left, right| left.path.cmp(&right.path));
    Ok(prompts)
}

pub fn build_bundle(
    store: &dyn PromptStore,
    prompts_dir: &str,
    reference: Option<&str>,
) -> VaultResult<Bundle> {
    Ok(Bundle {
        bundle_version: BUNDLE_VERSION.to_string(),
        reference: ref_label(reference).to_string(),
        prompts: collect_prompts(store, prompts_dir, reference)?,
    })
}

/// Collect prompts and write the bundle to `out_path`, creating parents.
pub fn write_bundle(
    out_path: &Path,
    store: &dyn PromptStore,
    prompts_dir: &str,
    reference: Option<&str>,
) -> VaultResult<Bundle> {
    let bundle = build_bundle(store, prompts_dir, reference)?;
    let bytes = serde_json::to_vec_pretty(&bundle)
        .map_err(|err| VaultError::Bundle(format!("serialize bundle: {err}")))?;
    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(out_path, bytes)?;
    tracing::info!(
        path = %out_path.display(),
        prompts = bundle.prompts.len(),
        "wrote bundle"
    );
    Ok(bundle)
}
