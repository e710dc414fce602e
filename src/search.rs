//! Wrapper around an external full-text search tool (ripgrep semantics),
//! used to answer `imported_by` queries and probed at startup like any
//! other external tool dependency.

use crate::error::{OtterError, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

pub struct SearchMatch {
    pub file: PathBuf,
    pub line: usize,
    pub text: String,
}

fn search_binary() -> String {
    std::env::var("OTTER_SEARCH_BIN").unwrap_or_else(|_| "rg".to_string())
}

pub fn is_available() -> bool {
    Command::new(search_binary()).arg("--version").output().map(|o| o.status.success()).unwrap_or(false)
}

/// Search `root` for `pattern` (a literal module/file stem, not a regex)
/// across known source extensions, skipping the same noise directories as
/// project scanning.
pub fn search_literal(root: &Path, pattern: &str) -> Result<Vec<SearchMatch>> {
    let binary = search_binary();
    let output = Command::new(&binary)
        .arg("--line-number")
        .arg("--no-heading")
        .arg("--fixed-strings")
        .args(["--glob", "!.git"])
        .args(["--glob", "!node_modules"])
        .args(["--glob", "!__pycache__"])
        .arg(pattern)
        .arg(root)
        .output()
        .map_err(|e| OtterError::dependency_missing(&binary, "install ripgrep (`rg`) and ensure it is on PATH").with_suggestion(e.to_string()))?;

    // rg exits 1 when there are no matches; that's a legal empty result,
    // not a failure.
    if !output.status.success() && output.status.code() != Some(1) {
        return Err(OtterError::dependency_missing(&binary, "install ripgrep (`rg`) and ensure it is on PATH"));
    }

    let text = String::from_utf8_lossy(&output.stdout);
    Ok(text
        .lines()
        .filter_map(|line| {
            let mut parts = line.splitn(3, ':');
            let file = parts.next()?;
            let lineno: usize = parts.next()?.parse().ok()?;
            let text = parts.next().unwrap_or("").to_string();
            Some(SearchMatch { file: PathBuf::from(file), line: lineno, text })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rg_output_format() {
        // exercised indirectly via search_literal in integration tests;
        // this unit test only checks the line-parsing contract shape.
        let line = "src/main.rs:12:use otter::lsp;";
        let mut parts = line.splitn(3, ':');
        assert_eq!(parts.next(), Some("src/main.rs"));
        assert_eq!(parts.next(), Some("12"));
        assert_eq!(parts.next(), Some("use otter::lsp;"));
    }
}
