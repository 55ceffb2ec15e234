//! Starter files for a new prompt repository.
use crate::config::{config_path, default_config, write_config};
use crate::templates;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const SAMPLE_PROMPT_REL: &str = "prompts/hello_world.prompt.yml";
pub const DATASETS_REL: &str = "datasets";
pub const WORKFLOW_REL: &str = ".github/workflows/pvault.yml";

/// Which starter files were written and which already existed.
#[derive(Debug, Default)]
pub struct ScaffoldSummary {
    pub written: Vec<PathBuf>,
    pub kept: Vec<PathBuf>,
}

/// Create `prompts/`, `datasets/`, the CI workflow and the repository config.
///
/// Existing files are left alone unless `force` is set.
pub fn init_repo(repo_root: &Path, force: bool) -> Result<ScaffoldSummary> {
    let datasets = repo_root.join(DATASETS_REL);
    fs::create_dir_all(&datasets).with_context(|| format!("create {}", datasets.display()))?;

    let mut summary = ScaffoldSummary::default();
    let files = [
        (repo_root.join(SAMPLE_PROMPT_REL), templates::HELLO_WORLD_PROMPT_YML),
        (repo_root.join(WORKFLOW_REL), templates::PROMPTS_WORKFLOW_YML),
    ];
    for (path, contents) in files {
        if path.exists() && !force {
            summary.kept.push(path);
            continue;
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(&path, contents.as_bytes())
            .with_context(|| format!("write {}", path.display()))?;
        summary.written.push(path);
    }

    let config = config_path(repo_root);
    if config.exists() && !force {
        summary.kept.push(config);
    } else {
        write_config(repo_root, &default_config())?;
        summary.written.push(config);
    }
    Ok(summary)
}
