//! Editing surface: operations on open buffers (plus disk reads), per
//! component 6 of the system overview.

use crate::buffer::Buffer;
use crate::error::{ErrorKind, OtterError, Result};
use dashmap::DashMap;
use serde::Serialize;
use std::path::{Path, PathBuf};

pub struct BufferStore {
    buffers: DashMap<PathBuf, Buffer>,
}

impl BufferStore {
    pub fn new() -> Self {
        Self { buffers: DashMap::new() }
    }

    /// Opens the file as a buffer if not already open. Idempotent.
    pub fn ensure_open(&self, path: &Path) -> Result<()> {
        if self.buffers.contains_key(path) {
            return Ok(());
        }
        let buffer = Buffer::open_from_disk(path)
            .map_err(|e| OtterError::new(ErrorKind::NotOpenOrNotAttached, format!("cannot open {}: {e}", path.display())))?;
        self.buffers.insert(path.to_path_buf(), buffer);
        Ok(())
    }

    pub fn is_open(&self, path: &Path) -> bool {
        self.buffers.contains_key(path)
    }

    fn require_open(&self, path: &Path) -> Result<()> {
        if self.is_open(path) {
            Ok(())
        } else {
            Err(OtterError::not_open_or_not_attached(&path.display().to_string()))
        }
    }

    pub fn buffer_info(&self, path: &Path) -> Result<BufferInfo> {
        self.require_open(path)?;
        let buf = self.buffers.get(path).unwrap();
        Ok(BufferInfo {
            is_open: true,
            is_modified: buf.modified,
            line_count: buf.line_count(),
            language: buf.language.map(str::to_string),
        })
    }

    /// Reads from disk, not buffer state, per the editing surface contract.
    pub fn read_file(&self, path: &Path, line_range: Option<(usize, usize)>) -> Result<ReadFileResult> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| OtterError::new(ErrorKind::NotOpenOrNotAttached, format!("cannot read {}: {e}", path.display())))?;
        let lines: Vec<&str> = content.lines().collect();
        let total_lines = lines.len();
        let language = crate::language::detect_language(&path.display().to_string()).map(str::to_string);

        let selected = match line_range {
            None => lines.clone(),
            Some((start, end)) => {
                validate_line_range(start, end, total_lines)?;
                let capped_end = end.min(total_lines);
                lines[(start - 1)..capped_end].to_vec()
            }
        };

        let offset = line_range.map(|(s, _)| s).unwrap_or(1);
        let formatted = selected
            .iter()
            .enumerate()
            .map(|(i, line)| format!("{}|{}", offset + i, line))
            .collect::<Vec<_>>()
            .join("\n");

        Ok(ReadFileResult { content: formatted, total_lines, language })
    }

    pub fn edit_buffer(
        &self,
        path: &Path,
        edits: &[LineEdit],
        preview: bool,
        save: bool,
    ) -> Result<EditResult> {
        self.require_open(path)?;
        let mut buf = self.buffers.get_mut(path).unwrap();
        let before = buf.content.clone();

        for edit in edits {
            validate_line_range(edit.line_start, edit.line_end, buf.line_count())?;
        }

        if preview {
            let mut preview_buf = buf.clone();
            for edit in edits {
                preview_buf.replace_lines(edit.line_start, edit.line_end, &edit.new_text);
            }
            return Ok(EditResult { diff: unified_diff(&before, &preview_buf.content), applied: false });
        }

        for edit in edits {
            buf.replace_lines(edit.line_start, edit.line_end, &edit.new_text);
        }
        let diff = unified_diff(&before, &buf.content);
        if save {
            buf.save_to_disk().map_err(|e| OtterError::new(ErrorKind::NotOpenOrNotAttached, e.to_string()))?;
        }
        Ok(EditResult { diff, applied: true })
    }

    pub fn find_and_replace(&self, path: &Path, old: &str, new: &str, scope: ReplaceScope, preview: bool) -> Result<EditResult> {
        self.require_open(path)?;
        let mut buf = self.buffers.get_mut(path).unwrap();
        let before = buf.content.clone();

        let after = match scope {
            ReplaceScope::All => before.replace(old, new),
            ReplaceScope::First => before.replacen(old, new, 1),
            ReplaceScope::Nth(n) => replace_nth(&before, old, new, n),
        };

        if preview {
            return Ok(EditResult { diff: unified_diff(&before, &after), applied: false });
        }

        buf.content = after.clone();
        buf.modified = true;
        Ok(EditResult { diff: unified_diff(&before, &after), applied: true })
    }

    pub fn save_buffer(&self, path: &Path) -> Result<()> {
        self.require_open(path)?;
        let mut buf = self.buffers.get_mut(path).unwrap();
        buf.save_to_disk().map_err(|e| OtterError::new(ErrorKind::NotOpenOrNotAttached, e.to_string()))
    }

    pub fn discard_buffer(&self, path: &Path) -> Result<()> {
        self.require_open(path)?;
        let mut buf = self.buffers.get_mut(path).unwrap();
        buf.discard().map_err(|e| OtterError::new(ErrorKind::NotOpenOrNotAttached, e.to_string()))
    }

    pub fn buffer_diff(&self, path: &Path) -> Result<BufferDiff> {
        self.require_open(path)?;
        let buf = self.buffers.get(path).unwrap();
        let disk = std::fs::read_to_string(path).unwrap_or_default();
        let diff = unified_diff(&disk, &buf.content);
        Ok(BufferDiff { has_changes: disk != buf.content, diff })
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ReplaceScope {
    All,
    First,
    Nth(usize),
}

#[derive(Debug, Clone)]
pub struct LineEdit {
    pub line_start: usize,
    pub line_end: usize,
    pub new_text: String,
}

#[derive(Debug, Serialize)]
pub struct BufferInfo {
    pub is_open: bool,
    pub is_modified: bool,
    pub line_count: usize,
    pub language: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReadFileResult {
    pub content: String,
    pub total_lines: usize,
    pub language: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EditResult {
    pub diff: String,
    pub applied: bool,
}

#[derive(Debug, Serialize)]
pub struct BufferDiff {
    pub has_changes: bool,
    pub diff: String,
}

/// Validates a 1-indexed inclusive line range against a known total line
/// count (Testable Scenario S6): `start < 1`, `start > end`, and
/// `start > total_lines` are errors; `end > total_lines` silently caps.
pub fn validate_line_range(start: usize, end: usize, total_lines: usize) -> Result<()> {
    if start < 1 {
        return Err(OtterError::invalid_range(format!("line start {start} is less than 1")));
    }
    if start > end {
        return Err(OtterError::invalid_range(format!("line start {start} is after end {end}")));
    }
    if start > total_lines {
        return Err(OtterError::invalid_range(format!("line start {start} exceeds file length {total_lines}")));
    }
    Ok(())
}

fn replace_nth(haystack: &str, old: &str, new: &str, n: usize) -> String {
    if old.is_empty() || n == 0 {
        return haystack.to_string();
    }
    let mut result = String::with_capacity(haystack.len());
    let mut remaining = haystack;
    let mut count = 0;
    while let Some(idx) = remaining.find(old) {
        count += 1;
        if count == n {
            result.push_str(&remaining[..idx]);
            result.push_str(new);
            result.push_str(&remaining[idx + old.len()..]);
            return result;
        }
        result.push_str(&remaining[..idx + old.len()]);
        remaining = &remaining[idx + old.len()..];
    }
    result.push_str(remaining);
    result
}

/// A minimal line-based unified diff, sufficient for preview/apply
/// responses; not a general-purpose diff library.
fn unified_diff(before: &str, after: &str) -> String {
    if before == after {
        return String::new();
    }
    let before_lines: Vec<&str> = before.lines().collect();
    let after_lines: Vec<&str> = after.lines().collect();
    let mut out = String::new();
    let max = before_lines.len().max(after_lines.len());
    for i in 0..max {
        let b = before_lines.get(i);
        let a = after_lines.get(i);
        if b != a {
            if let Some(b) = b {
                out.push_str(&format!("-{b}\n"));
            }
            if let Some(a) = a {
                out.push_str(&format!("+{a}\n"));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn store_with_open_file(content: &str) -> (BufferStore, PathBuf) {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), content).unwrap();
        let store = BufferStore::new();
        store.ensure_open(file.path()).unwrap();
        (store, file.path().to_path_buf())
    }

    #[test]
    fn read_file_validates_ranges() {
        let (store, path) = store_with_open_file("1\n2\n3\n4\n5\n6\n7\n8\n");
        assert_eq!(store.read_file(&path, Some((1, 5))).unwrap().content.lines().count(), 5);
        assert_eq!(store.read_file(&path, Some((1, 100))).unwrap().total_lines, 8);
        assert!(store.read_file(&path, Some((100, 200))).is_err());
        assert!(store.read_file(&path, Some((5, 3))).is_err());
    }

    #[test]
    fn edit_buffer_preview_does_not_mutate() {
        let (store, path) = store_with_open_file("a\nb\nc\n");
        let edits = vec![LineEdit { line_start: 2, line_end: 2, new_text: "B".to_string() }];
        let result = store.edit_buffer(&path, &edits, true, false).unwrap();
        assert!(!result.applied);
        let info = store.buffer_info(&path).unwrap();
        assert!(!info.is_modified);
    }

    #[test]
    fn discard_then_diff_has_no_changes() {
        let (store, path) = store_with_open_file("a\nb\n");
        store.find_and_replace(&path, "a", "A", ReplaceScope::All, false).unwrap();
        assert!(store.buffer_diff(&path).unwrap().has_changes);
        store.discard_buffer(&path).unwrap();
        assert!(!store.buffer_diff(&path).unwrap().has_changes);
    }

    #[test]
    fn operations_on_unopened_file_are_rejected() {
        let store = BufferStore::new();
        let err = store.buffer_info(Path::new("/tmp/never-opened.rs")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotOpenOrNotAttached);
    }
}
