//! Configuration: CLI flags, `.otter.toml`, and environment variables,
//! folded into one [`Config`] value before any service is constructed.

use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug, Clone)]
#[command(name = "otter")]
#[command(about = "Headless IDE broker exposing LSP/DAP to AI agents over MCP", long_about = None)]
#[command(version)]
pub struct CliArgs {
    /// Absolute project root. Falls back to IDE_PROJECT_PATH if unset.
    #[arg(long)]
    pub project: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace). Overridden by LSP_VERBOSE.
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Explicit path to the project's .otter.toml, overriding the default
    /// `<project>/.otter.toml` lookup.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable test-mode optimizations (immediate server setup instead of
    /// lazy attachment). Mirrors OTTER_TEST_MODE.
    #[arg(long)]
    pub test_mode: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OtterToml {
    #[serde(default)]
    pub lsp: LspSection,
    #[serde(default)]
    pub dap: DapSection,
    #[serde(default)]
    pub performance: PerformanceSection,
    #[serde(default)]
    pub plugins: PluginsSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LspSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub auto_detect: bool,
    #[serde(default)]
    pub disabled_languages: Vec<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default = "default_true")]
    pub lazy_load: bool,
    #[serde(default)]
    pub auto_install: bool,
    #[serde(default, flatten)]
    pub per_language: HashMap<String, LanguageLspConfig>,
}

impl Default for LspSection {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_detect: true,
            disabled_languages: Vec::new(),
            languages: Vec::new(),
            lazy_load: true,
            auto_install: false,
            per_language: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LanguageLspConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub server: Option<String>,
    /// `<runtime>_path`, e.g. `python_path`, `node_path`. Captured as a
    /// flat map since the key name is language-dependent.
    #[serde(default, flatten)]
    pub runtime_paths: HashMap<String, String>,
    #[serde(default)]
    pub settings: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DapSection {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub auto_install: bool,
    #[serde(default, flatten)]
    pub per_language: HashMap<String, LanguageDapConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LanguageDapConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub adapter: Option<String>,
    #[serde(default, flatten)]
    pub runtime_paths: HashMap<String, String>,
    #[serde(default)]
    pub configurations: Vec<serde_json::Value>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceSection {
    #[serde(default = "default_max_lsp_clients")]
    pub max_lsp_clients: usize,
    #[serde(default = "default_max_dap_sessions")]
    pub max_dap_sessions: usize,
    #[serde(default = "default_debounce_ms")]
    pub file_change_debounce_ms: u64,
}

impl Default for PerformanceSection {
    fn default() -> Self {
        Self {
            max_lsp_clients: default_max_lsp_clients(),
            max_dap_sessions: default_max_dap_sessions(),
            file_change_debounce_ms: default_debounce_ms(),
        }
    }
}

fn default_max_lsp_clients() -> usize { 8 }
fn default_max_dap_sessions() -> usize { 4 }
fn default_debounce_ms() -> u64 { 300 }
fn default_true() -> bool { true }

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PluginsSection {
    #[serde(default)]
    pub treesitter: TreesitterSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TreesitterSection {
    #[serde(default)]
    pub ensure_installed: Vec<String>,
    #[serde(default)]
    pub auto_install: bool,
}

/// Fully resolved configuration: CLI + environment + `.otter.toml`.
#[derive(Debug, Clone)]
pub struct Config {
    pub project_root: PathBuf,
    pub log_level: String,
    pub test_mode: bool,
    pub readiness_timeout_secs: u64,
    pub toml: OtterToml,
}

impl Config {
    pub fn load(args: CliArgs) -> Result<Self> {
        let project_root = args
            .project
            .or_else(|| std::env::var_os("IDE_PROJECT_PATH").map(PathBuf::from))
            .context("project root not given: pass --project or set IDE_PROJECT_PATH")?;
        let project_root = project_root
            .canonicalize()
            .with_context(|| format!("project root does not exist: {}", project_root.display()))?;

        let test_mode = args.test_mode || env_flag("OTTER_TEST_MODE");

        let log_level = if env_flag("LSP_VERBOSE") { "debug".to_string() } else { args.log_level };

        let readiness_timeout_secs = std::env::var("LSP_READINESS_TIMEOUT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(15);

        let config_path = args.config.unwrap_or_else(|| project_root.join(".otter.toml"));
        let toml = if config_path.exists() {
            let text = std::fs::read_to_string(&config_path)
                .with_context(|| format!("reading {}", config_path.display()))?;
            toml::from_str(&text).with_context(|| format!("parsing {}", config_path.display()))?
        } else {
            OtterToml::default()
        };

        Ok(Self { project_root, log_level, test_mode, readiness_timeout_secs, toml })
    }

    /// Expand `${PROJECT_ROOT}` and `${VENV}` template variables in a path
    /// string. `${VENV}` expands to the first existing venv-like directory
    /// under the project root (`.venv`, `venv`, `env`).
    pub fn expand_template(&self, template: &str) -> String {
        let mut out = template.replace("${PROJECT_ROOT}", &self.project_root.display().to_string());
        if out.contains("${VENV}") {
            let venv = self.first_venv_dir().unwrap_or_else(|| self.project_root.join(".venv"));
            out = out.replace("${VENV}", &venv.display().to_string());
        }
        out
    }

    fn first_venv_dir(&self) -> Option<PathBuf> {
        for candidate in [".venv", "venv", "env"] {
            let path = self.project_root.join(candidate);
            if path.is_dir() {
                return Some(path);
            }
        }
        None
    }
}

fn env_flag(name: &str) -> bool {
    matches!(
        std::env::var(name).ok().as_deref(),
        Some("1") | Some("true") | Some("TRUE") | Some("yes")
    )
}

/// Returns true if `dir` should be skipped while scanning a project, per
/// `crate::language::is_skipped_dir`, applied to a path's file name.
pub fn is_skipped_path(dir: &Path) -> bool {
    dir.file_name()
        .and_then(|n| n.to_str())
        .map(crate::language::is_skipped_dir)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_recognized_sections() {
        let text = r#"
            [lsp]
            auto_install = true
            disabled_languages = ["php"]

            [lsp.python]
            server = "pyright"
            python_path = "${VENV}/bin/python"

            [dap.python]
            adapter = "debugpy"

            [performance]
            max_lsp_clients = 4

            [plugins.treesitter]
            ensure_installed = ["python", "rust"]
        "#;
        let parsed: OtterToml = toml::from_str(text).unwrap();
        assert!(parsed.lsp.auto_install);
        assert_eq!(parsed.lsp.disabled_languages, vec!["php"]);
        assert_eq!(parsed.performance.max_lsp_clients, 4);
        assert_eq!(parsed.plugins.treesitter.ensure_installed.len(), 2);
        let py = parsed.lsp.per_language.get("python").unwrap();
        assert_eq!(py.server.as_deref(), Some("pyright"));
    }

    #[test]
    fn round_trip_preserves_keys() {
        let text = "[performance]\nmax_lsp_clients = 12\nmax_dap_sessions = 3\nfile_change_debounce_ms = 50\n";
        let parsed: OtterToml = toml::from_str(text).unwrap();
        let back = toml::to_string(&parsed).unwrap();
        let reparsed: OtterToml = toml::from_str(&back).unwrap();
        assert_eq!(parsed.performance.max_lsp_clients, reparsed.performance.max_lsp_clients);
        assert_eq!(parsed.performance.max_dap_sessions, reparsed.performance.max_dap_sessions);
    }

    #[test]
    fn defaults_when_no_file() {
        let toml = OtterToml::default();
        assert!(toml.lsp.enabled);
        assert!(toml.lsp.auto_detect);
        assert!(!toml.dap.enabled);
    }
}
