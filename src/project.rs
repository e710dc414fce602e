//! Project: root directory, configuration, Editor Host, and Debug
//! Sessions. Created at process start, torn down at process exit.

use crate::config::Config;
use crate::dap::DapBroker;
use crate::editing::BufferStore;
use crate::editor_host::EditorHost;
use crate::error::Result;
use crate::lsp::LspSurface;
use crate::runtime::RuntimeResolver;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub struct Project {
    pub config: Config,
    pub resolver: RuntimeResolver,
    pub editor_host: EditorHost,
    pub lsp: LspSurface,
    pub dap: Arc<DapBroker>,
    pub buffers: BufferStore,
}

impl Project {
    pub async fn open(config: Config) -> Result<Self> {
        let languages = enumerate_enabled_languages(&config);
        let resolver = RuntimeResolver::new();
        let editor_host = EditorHost::start(&config, &resolver, &languages).await?;
        let lsp = LspSurface::new(config.toml.performance.max_lsp_clients);
        let dap = DapBroker::new(config.toml.performance.max_dap_sessions);
        info!(project = %config.project_root.display(), languages = ?languages, "project opened");
        Ok(Self { config, resolver, editor_host, lsp, dap, buffers: BufferStore::new() })
    }

    pub async fn close(&self) {
        self.editor_host.shutdown().await;
        info!(project = %self.config.project_root.display(), "project closed");
    }
}

/// Step 1 of the Editor Host startup sequence: explicit config wins,
/// otherwise scan the project tree for known extensions, skipping noise
/// directories.
fn enumerate_enabled_languages(config: &Config) -> Vec<String> {
    if !config.toml.lsp.languages.is_empty() {
        return config
            .toml
            .lsp
            .languages
            .iter()
            .filter(|l| !config.toml.lsp.disabled_languages.contains(l))
            .cloned()
            .collect();
    }

    let mut found = std::collections::BTreeSet::new();
    scan_dir(&config.project_root, &mut found, 0);
    found.into_iter().filter(|l| !config.toml.lsp.disabled_languages.contains(l)).collect()
}

fn scan_dir(dir: &Path, found: &mut std::collections::BTreeSet<String>, depth: usize) {
    if depth > 8 {
        return;
    }
    let Ok(entries) = std::fs::read_dir(dir) else { return };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if crate::config::is_skipped_path(&path) {
                continue;
            }
            scan_dir(&path, found, depth + 1);
        } else if let Some(lang) = crate::language::detect_language(&path.display().to_string()) {
            found.insert(lang.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn empty_config(root: &Path) -> Config {
        Config {
            project_root: root.to_path_buf(),
            log_level: "info".into(),
            test_mode: true,
            readiness_timeout_secs: 1,
            toml: Default::default(),
        }
    }

    #[test]
    fn scan_finds_languages_and_skips_noise_dirs() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("main.py"), "").unwrap();
        std::fs::create_dir_all(dir.path().join("node_modules")).unwrap();
        std::fs::write(dir.path().join("node_modules/ignored.js"), "").unwrap();

        let config = empty_config(dir.path());
        let languages = enumerate_enabled_languages(&config);
        assert!(languages.contains(&"python".to_string()));
        assert!(!languages.contains(&"javascript".to_string()));
    }

    #[test]
    fn explicit_config_languages_take_precedence() {
        let dir = TempDir::new().unwrap();
        let mut config = empty_config(dir.path());
        config.toml.lsp.languages = vec!["rust".to_string(), "go".to_string()];
        config.toml.lsp.disabled_languages = vec!["go".to_string()];
        let languages = enumerate_enabled_languages(&config);
        assert_eq!(languages, vec!["rust".to_string()]);
    }
}
