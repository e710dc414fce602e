//! Project structure walker backing `get_project_structure`: a directory
//! tree skipping the same noise directories the language scan skips.

use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize)]
pub struct TreeEntry {
    pub path: PathBuf,
    pub is_dir: bool,
    pub language: Option<String>,
    pub children: Vec<TreeEntry>,
}

pub fn walk(root: &Path, max_depth: usize) -> TreeEntry {
    build(root, root, max_depth, 0)
}

fn build(root: &Path, path: &Path, max_depth: usize, depth: usize) -> TreeEntry {
    let is_dir = path.is_dir();
    let language = if is_dir { None } else { crate::language::detect_language(&path.display().to_string()).map(str::to_string) };

    let mut children = Vec::new();
    if is_dir && depth < max_depth {
        if let Ok(entries) = std::fs::read_dir(path) {
            let mut sorted: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
            sorted.sort();
            for child in sorted {
                if child.is_dir() && crate::config::is_skipped_path(&child) {
                    continue;
                }
                children.push(build(root, &child, max_depth, depth + 1));
            }
        }
    }

    TreeEntry { path: crate::paths::canonical_or_self(path), is_dir, language, children }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn walk_skips_noise_directories() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("main.rs"), "").unwrap();
        std::fs::create_dir_all(dir.path().join("target/debug")).unwrap();
        std::fs::write(dir.path().join("target/debug/ignored"), "").unwrap();

        let tree = walk(dir.path(), 4);
        let names: Vec<String> = tree.children.iter().map(|c| c.path.file_name().unwrap().to_string_lossy().to_string()).collect();
        assert!(names.contains(&"main.rs".to_string()));
        assert!(!names.contains(&"target".to_string()));
    }

    #[test]
    fn respects_max_depth() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("a/b/c")).unwrap();
        std::fs::write(dir.path().join("a/b/c/deep.rs"), "").unwrap();

        let tree = walk(dir.path(), 1);
        let a = tree.children.iter().find(|c| c.path.ends_with("a")).unwrap();
        assert!(a.children.is_empty());
    }
}
