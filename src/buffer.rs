//! Buffer: the in-memory editing unit, identified by absolute file path.

use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Buffer {
    pub path: PathBuf,
    pub language: Option<&'static str>,
    pub content: String,
    pub modified: bool,
}

impl Buffer {
    pub fn open_from_disk(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let language = crate::language::detect_language(&path.display().to_string());
        Ok(Self { path: path.to_path_buf(), language, content, modified: false })
    }

    pub fn line_count(&self) -> usize {
        if self.content.is_empty() {
            0
        } else {
            self.content.lines().count()
        }
    }

    /// Replace the inclusive 1-indexed line range `[start, end]` with
    /// `new_text`. Marks the buffer modified. Callers validate the range
    /// first via `crate::editing::validate_line_range`.
    pub fn replace_lines(&mut self, start: usize, end: usize, new_text: &str) {
        let mut lines: Vec<&str> = self.content.lines().collect();
        let start_idx = start - 1;
        let end_idx = end.min(lines.len());
        let replacement: Vec<&str> = new_text.lines().collect();
        lines.splice(start_idx..end_idx, replacement);
        self.content = lines.join("\n");
        if !self.content.is_empty() {
            self.content.push('\n');
        }
        self.modified = true;
    }

    pub fn save_to_disk(&mut self) -> std::io::Result<()> {
        std::fs::write(&self.path, &self.content)?;
        self.modified = false;
        Ok(())
    }

    pub fn discard(&mut self) -> std::io::Result<()> {
        self.content = std::fs::read_to_string(&self.path)?;
        self.modified = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn replace_lines_preserves_trailing_newline() {
        let mut buf = Buffer {
            path: PathBuf::from("/tmp/x.rs"),
            language: Some("rust"),
            content: "a\nb\nc\n".to_string(),
            modified: false,
        };
        buf.replace_lines(2, 2, "B");
        assert_eq!(buf.content, "a\nB\nc\n");
        assert!(buf.modified);
    }

    #[test]
    fn discard_reloads_disk_content() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "original\n").unwrap();
        let mut buf = Buffer::open_from_disk(file.path()).unwrap();
        buf.content = "edited\n".to_string();
        buf.modified = true;
        buf.discard().unwrap();
        assert_eq!(buf.content, "original\n");
        assert!(!buf.modified);
    }
}
