//! Path handling shared across every tool: every request path may be
//! absolute or workspace-relative; every response path is absolute with
//! symlinks resolved, so `/var` vs `/private/var`-style host quirks never
//! produce false mismatches.

use crate::error::{ErrorKind, OtterError};
use std::path::{Path, PathBuf};

pub fn resolve(project_root: &Path, input: &str) -> Result<PathBuf, OtterError> {
    let candidate = Path::new(input);
    let absolute = if candidate.is_absolute() { candidate.to_path_buf() } else { project_root.join(candidate) };
    absolute.canonicalize().map_err(|e| {
        OtterError::new(ErrorKind::NotOpenOrNotAttached, format!("cannot resolve path `{input}`: {e}"))
    })
}

/// Canonicalize a path that is expected to already exist, for inclusion in
/// a response (Testable Property 1).
pub fn canonical_or_self(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn relative_path_resolves_under_project_root() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.rs"), "").unwrap();
        let resolved = resolve(dir.path(), "a.rs").unwrap();
        assert_eq!(resolved, dir.path().canonicalize().unwrap().join("a.rs"));
    }

    #[test]
    fn missing_path_is_error() {
        let dir = TempDir::new().unwrap();
        let err = resolve(dir.path(), "missing.rs").unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotOpenOrNotAttached);
    }
}
