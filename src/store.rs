//! Prompt file retrieval from a git repository or its working tree.
//!
//! Paths are repository-relative with `/` separators. A `None` ref reads the
//! working tree directly; any other ref is resolved to a commit first, so an
//! unknown ref surfaces as `UnresolvedRef` rather than a missing file.
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::Instant;
use thiserror::Error;

/// File suffixes recognised as prompt specs.
pub const PROMPT_FILE_SUFFIXES: &[&str] = &[".prompt.yml", ".prompt.yaml", ".prompt.json"];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("file not found: {path} (ref: {reference})")]
    NotFound { path: String, reference: String },

    #[error("unresolved ref `{reference}`: {detail}")]
    UnresolvedRef { reference: String, detail: String },

    #[error("git error: {0}")]
    Git(String),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub trait PromptStore {
    /// Read a file at `reference`, or from the working tree when `None`.
    fn read_text(&self, rel_path: &str, reference: Option<&str>) -> Result<String, StoreError>;

    /// Resolve a ref to a full commit id.
    fn resolve_ref(&self, reference: &str) -> Result<String, StoreError>;

    /// Every file under `rel_dir`, sorted.
    fn list_files(&self, rel_dir: &str, reference: Option<&str>)
        -> Result<Vec<String>, StoreError>;

    /// Unified diff of one file between two refs.
    fn diff(&self, rel_path: &str, ref1: &str, ref2: &str) -> Result<String, StoreError>;
}

/// Suffix match ignores ASCII case, so `Greeting.Prompt.YML` counts.
pub fn is_prompt_file(path: &str) -> bool {
    let lowered = path.to_ascii_lowercase();
    PROMPT_FILE_SUFFIXES
        .iter()
        .any(|suffix| lowered.ends_with(suffix))
}

/// Label used for the working tree in reports.
pub fn ref_label(reference: Option<&str>) -> &str {
    reference.unwrap_or("WORKTREE")
}

#[derive(Debug, Clone)]
pub struct GitStore {
    root: PathBuf,
}

impl GitStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn git(&self, args: &[&str]) -> Result<Output, StoreError> {
        let started = Instant::now();
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.root)
            .args(args)
            .output()
            .map_err(|err| StoreError::Git(format!("run git {}: {err}", args.join(" "))))?;
        tracing::debug!(
            args = ?args,
            success = output.status.success(),
            elapsed_ms = started.elapsed().as_millis(),
            "git finished"
        );
        Ok(output)
    }

    fn git_stdout(&self, args: &[&str]) -> Result<String, StoreError> {
        let output = self.git(args)?;
        if !output.status.success() {
            return Err(StoreError::Git(format!(
                "git {} failed: {}",
                args.join(" "),
                stderr_text(&output)
            )));
        }
        String::from_utf8(output.stdout)
            .map_err(|err| StoreError::Git(format!("git {} output is not UTF-8: {err}", args[0])))
    }

    fn read_worktree(&self, rel_path: &str) -> Result<String, StoreError> {
        let path = self.root.join(rel_path);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(text),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(StoreError::NotFound {
                path: rel_path.to_string(),
                reference: ref_label(None).to_string(),
            }),
            Err(err) => Err(StoreError::Io(err)),
        }
    }

    fn list_worktree(&self, rel_dir: &str) -> Result<Vec<String>, StoreError> {
        let dir = self.root.join(rel_dir);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        collect_files_recursive(&dir, &mut files)?;
        let mut relative: Vec<String> = files
            .iter()
            .filter_map(|path| path.strip_prefix(&self.root).ok())
            .map(|path| {
                path.components()
                    .map(|part| part.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .collect();
        relative.sort();
        Ok(relative)
    }
}

impl PromptStore for GitStore {
    fn read_text(&self, rel_path: &str, reference: Option<&str>) -> Result<String, StoreError> {
        let rel_path = normalize_rel(rel_path);
        let Some(reference) = reference else {
            return self.read_worktree(&rel_path);
        };
        let commit = self.resolve_ref(reference)?;
        let spec = format!("{commit}:{rel_path}");
        let output = self.git(&["show", &spec])?;
        if !output.status.success() {
            return Err(StoreError::NotFound {
                path: rel_path,
                reference: reference.to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn resolve_ref(&self, reference: &str) -> Result<String, StoreError> {
        let target = format!("{reference}^{{commit}}");
        let output = self.git(&["rev-parse", "--verify", "--quiet", &target])?;
        if !output.status.success() {
            let detail = stderr_text(&output);
            return Err(StoreError::UnresolvedRef {
                reference: reference.to_string(),
                detail: if detail.is_empty() {
                    "no such commit".to_string()
                } else {
                    detail
                },
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn list_files(
        &self,
        rel_dir: &str,
        reference: Option<&str>,
    ) -> Result<Vec<String>, StoreError> {
        let rel_dir = normalize_rel(rel_dir);
        let Some(reference) = reference else {
            return self.list_worktree(&rel_dir);
        };
        let commit = self.resolve_ref(reference)?;
        let mut args = vec!["ls-tree", "-r", "--name-only", commit.as_str()];
        if !rel_dir.is_empty() {
            args.push("--");
            args.push(rel_dir.as_str());
        }
        let stdout = self.git_stdout(&args)?;
        let mut files: Vec<String> = stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        files.sort();
        Ok(files)
    }

    fn diff(&self, rel_path: &str, ref1: &str, ref2: &str) -> Result<String, StoreError> {
        let rel_path = normalize_rel(rel_path);
        let from = self.resolve_ref(ref1)?;
        let to = self.resolve_ref(ref2)?;
        self.git_stdout(&["diff", "--no-color", &from, &to, "--", &rel_path])
    }
}

fn normalize_rel(path: &str) -> String {
    let path = path.replace('\\', "/");
    let trimmed = path.trim_start_matches("./").trim_end_matches('/');
    if trimmed == "." {
        String::new()
    } else {
        trimmed.to_string()
    }
}

fn stderr_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

fn collect_files_recursive(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), StoreError> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.file_name().is_some_and(|name| name == ".git") {
            continue;
        }
        if path.is_dir() {
            collect_files_recursive(&path, files)?;
        } else {
            files.push(path);
        }
    }
    Ok(())
}
