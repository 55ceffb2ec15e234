//! Shared test infrastructure for integration tests.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

pub const HELLO_PROMPT: &str = r#"spec_version: "1.0"
name: hello_world
variables:
  required: [name]
messages:
  - role: system
    content: "You are a helpful assistant."
  - role: user
    content: "Say hello to {{ name }}."
tests:
  - name: includes_name
    vars: { name: "Ava" }
    assert: { contains_any: ["Ava"] }
"#;

pub fn find_in_path(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

/// A scratch prompt repository driven through the `pvault` binary.
pub struct Repo {
    pub dir: TempDir,
}

impl Repo {
    pub fn scratch() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, rel: &str, contents: &str) -> PathBuf {
        let path = self.root().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent directory");
        }
        fs::write(&path, contents).expect("write file");
        path
    }

    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.root().join(rel)).expect("read file")
    }

    /// Run `pvault` with the repo as working directory.
    pub fn pvault(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_pvault"))
            .args(args)
            .current_dir(self.root())
            .env_remove("PVAULT_POLICY")
            .env_remove("PVAULT_LOG")
            .output()
            .expect("run pvault")
    }

    pub fn git(&self, args: &[&str]) {
        let status = Command::new("git")
            .arg("-C")
            .arg(self.root())
            .args([
                "-c",
                "user.name=Test",
                "-c",
                "user.email=test@example.com",
                "-c",
                "commit.gpgsign=false",
            ])
            .args(args)
            .status()
            .expect("run git");
        assert!(status.success(), "git {args:?} failed");
    }

    pub fn commit_all(&self, message: &str) {
        self.git(&["add", "-A"]);
        self.git(&["commit", "-q", "-m", message]);
    }
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

pub fn stdout_json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|err| {
        panic!(
            "stdout is not JSON ({err}): {}\nstderr: {}",
            stdout(output),
            stderr(output)
        )
    })
}
