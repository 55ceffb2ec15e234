//! Repository configuration helpers.
//!
//! The optional `.pvault/config.json` holds repository defaults: where prompt
//! files live, which policy to apply, and which safety guards are always on.
//! A missing file means defaults.
use crate::safety::SafetyOptions;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Component, Path, PathBuf};

pub const CONFIG_SCHEMA_VERSION: u32 = 1;
pub const CONFIG_REL: &str = ".pvault/config.json";
pub const DEFAULT_PROMPTS_DIR: &str = "prompts";
/// Policy selector used when neither the CLI nor the config names one.
pub const POLICY_ENV: &str = "PVAULT_POLICY";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VaultConfig {
    pub schema_version: u32,
    #[serde(default = "default_prompts_dir")]
    pub prompts_dir: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
    #[serde(default)]
    pub safety: SafetyOptions,
}

fn default_prompts_dir() -> String {
    DEFAULT_PROMPTS_DIR.to_string()
}

pub fn default_config() -> VaultConfig {
    VaultConfig {
        schema_version: CONFIG_SCHEMA_VERSION,
        prompts_dir: default_prompts_dir(),
        policy: None,
        safety: SafetyOptions::default(),
    }
}

/// Pretty JSON config written by `init`.
pub fn config_path(repo_root: &Path) -> PathBuf {
    repo_root.join(CONFIG_REL)
}

/// Load and validate `.pvault/config.json`, falling back to defaults when
/// the file does not exist.
pub fn load_config(repo_root: &Path) -> Result<VaultConfig> {
    let path = config_path(repo_root);
    if !path.exists() {
        return Ok(default_config());
    }
    let bytes = fs::read(&path).with_context(|| format!("read config {}", path.display()))?;
    let config: VaultConfig = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse config {}", path.display()))?;
    validate_config(&config)?;
    Ok(config)
}

pub fn write_config(repo_root: &Path, config: &VaultConfig) -> Result<()> {
    let path = config_path(repo_root);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("create .pvault dir")?;
    }
    let text = serde_json::to_string_pretty(config).context("serialize config")?;
    fs::write(&path, text.as_bytes()).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

pub fn validate_config(config: &VaultConfig) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported config schema_version {}",
            config.schema_version
        ));
    }
    if config.prompts_dir.trim().is_empty() {
        return Err(anyhow!("prompts_dir must be non-empty"));
    }
    let prompts_dir = Path::new(&config.prompts_dir);
    if prompts_dir.is_absolute()
        || prompts_dir
            .components()
            .any(|component| matches!(component, Component::ParentDir))
    {
        return Err(anyhow!(
            "prompts_dir must be a relative path without '..' (got {:?})",
            config.prompts_dir
        ));
    }
    if let Some(policy) = config.policy.as_deref() {
        if policy.trim().is_empty() {
            return Err(anyhow!("policy must be non-empty when set"));
        }
    }
    Ok(())
}

/// Pick the policy selector: CLI flag, then config, then `PVAULT_POLICY`.
pub fn policy_selector(cli: Option<&str>, config: &VaultConfig) -> Option<String> {
    choose_policy(cli, config, env::var(POLICY_ENV).ok())
}

fn choose_policy(
    cli: Option<&str>,
    config: &VaultConfig,
    from_env: Option<String>,
) -> Option<String> {
    cli.map(str::to_string)
        .or_else(|| config.policy.clone())
        .or_else(|| from_env.filter(|value| !value.trim().is_empty()))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
