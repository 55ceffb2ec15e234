//! Report files and stdout emission for CLI commands.
//!
//! Machine-readable output goes to stdout; progress notes go to stderr so
//! `--json` output stays parseable.
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;

pub fn write_text(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(path, text.as_bytes()).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("serialize report JSON")?;
    write_text(path, &text)
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string(value).context("serialize JSON output")?;
    println!("{text}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn creates_parent_directories() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("out/nested/report.json");
        write_json(&path, &json!({"pass": true})).expect("write json");
        let text = fs::read_to_string(&path).expect("read");
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&text).expect("parse"),
            json!({"pass": true})
        );
    }
}
