//! Runtime resolver & bootstrap: data-driven resolution of a language's
//! interpreter/toolchain, and on-demand install of LSP/DAP adapters.
//!
//! Everything language-specific here lives in the static tables below, not
//! in Rust control flow — adding a language means adding a table row.

use crate::config::Config;
use crate::error::{OtterError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeSource {
    ExplicitConfig,
    AutoDetectVenv,
    AutoDetectVersionManager,
    AutoDetectToolchainFile,
    AutoDetectVersionFile,
    System,
}

impl RuntimeSource {
    pub fn label(self) -> &'static str {
        match self {
            RuntimeSource::ExplicitConfig => "explicit_config",
            RuntimeSource::AutoDetectVenv => "auto_detect_venv",
            RuntimeSource::AutoDetectVersionManager => "auto_detect_version_manager",
            RuntimeSource::AutoDetectToolchainFile => "auto_detect_toolchain_file",
            RuntimeSource::AutoDetectVersionFile => "auto_detect_version_file",
            RuntimeSource::System => "system",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedRuntime {
    pub language: String,
    pub path: PathBuf,
    pub source: RuntimeSource,
    pub version: Option<String>,
}

#[derive(Debug, Clone)]
pub enum AutoDetectRule {
    /// Try each directory pattern under the project root; if it exists,
    /// check `executable_path` inside it.
    Venv { patterns: &'static [&'static str], executable_path: &'static str },
    /// Read a version file (e.g. `.nvmrc`), substitute into a path
    /// template and verify existence.
    VersionManager { version_file: &'static str, path_template: &'static str },
    /// Read a TOML/plain file for a channel/version and build an
    /// invocation template (may not be a bare path, e.g. `rustup run`).
    ToolchainFile { file: &'static str, invocation_template: &'static str },
    /// Read a file and extract a version via regex; yields a version hint
    /// only, never a path.
    VersionFile { file: &'static str, regex: &'static str },
}

#[derive(Debug, Clone)]
pub struct VersionCheck {
    pub args: &'static [&'static str],
    pub parse_regex: &'static str,
}

#[derive(Debug, Clone)]
pub struct LanguageRuntimeSpec {
    pub display_name: &'static str,
    pub executable_name: &'static str,
    pub config_key: &'static str,
    pub auto_detect: &'static [AutoDetectRule],
    pub system_commands: &'static [&'static str],
    pub version_check: Option<VersionCheck>,
}

pub static RUNTIME_SPECS: Lazy<HashMap<&'static str, LanguageRuntimeSpec>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert(
        "python",
        LanguageRuntimeSpec {
            display_name: "Python",
            executable_name: "python3",
            config_key: "python_path",
            auto_detect: &[
                AutoDetectRule::Venv { patterns: &[".venv", "venv", "env"], executable_path: "bin/python" },
            ],
            system_commands: &["python3", "python"],
            version_check: Some(VersionCheck { args: &["--version"], parse_regex: r"Python (\d+\.\d+\.\d+)" }),
        },
    );
    m.insert(
        "javascript",
        LanguageRuntimeSpec {
            display_name: "Node.js",
            executable_name: "node",
            config_key: "node_path",
            auto_detect: &[AutoDetectRule::VersionManager { version_file: ".nvmrc", path_template: "$HOME/.nvm/versions/node/v${VERSION}/bin/node" }],
            system_commands: &["node"],
            version_check: Some(VersionCheck { args: &["--version"], parse_regex: r"v(\d+\.\d+\.\d+)" }),
        },
    );
    m.insert(
        "typescript",
        LanguageRuntimeSpec {
            display_name: "Node.js",
            executable_name: "node",
            config_key: "node_path",
            auto_detect: &[AutoDetectRule::VersionManager { version_file: ".nvmrc", path_template: "$HOME/.nvm/versions/node/v${VERSION}/bin/node" }],
            system_commands: &["node"],
            version_check: Some(VersionCheck { args: &["--version"], parse_regex: r"v(\d+\.\d+\.\d+)" }),
        },
    );
    m.insert(
        "rust",
        LanguageRuntimeSpec {
            display_name: "Rust",
            executable_name: "rustc",
            config_key: "rust_path",
            auto_detect: &[AutoDetectRule::ToolchainFile { file: "rust-toolchain.toml", invocation_template: "rustup run ${CHANNEL} rustc" }],
            system_commands: &["rustc"],
            version_check: Some(VersionCheck { args: &["--version"], parse_regex: r"rustc (\d+\.\d+\.\d+)" }),
        },
    );
    m.insert(
        "go",
        LanguageRuntimeSpec {
            display_name: "Go",
            executable_name: "go",
            config_key: "go_path",
            auto_detect: &[AutoDetectRule::VersionFile { file: "go.mod", regex: r"^go (\d+\.\d+)" }],
            system_commands: &["go"],
            version_check: Some(VersionCheck { args: &["version"], parse_regex: r"go(\d+\.\d+\.\d+)" }),
        },
    );
    m
});

pub struct RuntimeResolver {
    cache: dashmap::DashMap<(PathBuf, String), ResolvedRuntime>,
}

impl RuntimeResolver {
    pub fn new() -> Self {
        Self { cache: dashmap::DashMap::new() }
    }

    /// Resolve the runtime for `language` in `config`'s project, memoized
    /// per (project, language) so LSP and DAP never diverge.
    pub fn resolve(&self, config: &Config, language: &str) -> Result<ResolvedRuntime> {
        let key = (config.project_root.clone(), language.to_string());
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached.clone());
        }
        let resolved = self.resolve_uncached(config, language)?;
        self.cache.insert(key, resolved.clone());
        Ok(resolved)
    }

    fn resolve_uncached(&self, config: &Config, language: &str) -> Result<ResolvedRuntime> {
        let spec = RUNTIME_SPECS
            .get(language)
            .ok_or_else(|| OtterError::runtime_not_resolved(language, &["no runtime spec registered".to_string()]))?;

        let mut attempted = Vec::new();

        // 1. explicit config
        if let Some(lsp_cfg) = config.toml.lsp.per_language.get(language) {
            if let Some(explicit) = lsp_cfg.runtime_paths.get(spec.config_key) {
                let expanded = config.expand_template(explicit);
                attempted.push(format!("explicit_config:{expanded}"));
                let path = PathBuf::from(&expanded);
                if path.exists() {
                    let version = probe_version(&path, spec);
                    return Ok(ResolvedRuntime { language: language.to_string(), path, source: RuntimeSource::ExplicitConfig, version });
                }
            }
        }

        // 2. auto_detect rules, in declared order
        for rule in spec.auto_detect {
            attempted.push(format!("auto_detect:{rule:?}"));
            if let Some((path, source)) = apply_auto_detect_rule(&config.project_root, rule) {
                let version = probe_version(&path, spec);
                return Ok(ResolvedRuntime { language: language.to_string(), path, source, version });
            }
        }

        // 3. system PATH
        for candidate in spec.system_commands {
            attempted.push(format!("system:{candidate}"));
            if let Some(path) = which(candidate) {
                let version = probe_version(&path, spec);
                return Ok(ResolvedRuntime { language: language.to_string(), path, source: RuntimeSource::System, version });
            }
        }

        Err(OtterError::runtime_not_resolved(spec.display_name, &attempted))
    }
}

fn apply_auto_detect_rule(project_root: &Path, rule: &AutoDetectRule) -> Option<(PathBuf, RuntimeSource)> {
    match rule {
        AutoDetectRule::Venv { patterns, executable_path } => {
            for pattern in *patterns {
                let candidate = project_root.join(pattern);
                if candidate.is_dir() {
                    let exe = candidate.join(executable_path);
                    if exe.exists() {
                        return Some((exe, RuntimeSource::AutoDetectVenv));
                    }
                }
            }
            None
        }
        AutoDetectRule::VersionManager { version_file, path_template } => {
            let version = std::fs::read_to_string(project_root.join(version_file)).ok()?.trim().to_string();
            let expanded = path_template.replace("${VERSION}", &version).replace(
                "$HOME",
                &std::env::var("HOME").unwrap_or_default(),
            );
            let path = PathBuf::from(expanded);
            path.exists().then_some((path, RuntimeSource::AutoDetectVersionManager))
        }
        AutoDetectRule::ToolchainFile { file, invocation_template: _ } => {
            let text = std::fs::read_to_string(project_root.join(file)).ok()?;
            let channel = text.lines().find_map(|l| {
                let l = l.trim();
                l.strip_prefix("channel").map(|rest| rest.trim_start_matches(['=', ' ', '"']).trim_matches('"').to_string())
            })?;
            which(&format!("rustc+{channel}")).or_else(|| which("rustc")).map(|p| (p, RuntimeSource::AutoDetectToolchainFile))
        }
        AutoDetectRule::VersionFile { file, regex } => {
            let text = std::fs::read_to_string(project_root.join(file)).ok()?;
            let re = Regex::new(regex).ok()?;
            re.captures(&text)?;
            // a version_file rule yields only a hint, never a path; fall through to system PATH
            None
        }
    }
}

fn which(executable: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var).map(|dir| dir.join(executable)).find(|candidate| candidate.is_file())
}

fn probe_version(path: &Path, spec: &LanguageRuntimeSpec) -> Option<String> {
    let check = spec.version_check.as_ref()?;
    let output = Command::new(path).args(check.args).output().ok()?;
    let text = String::from_utf8_lossy(&output.stdout).to_string() + &String::from_utf8_lossy(&output.stderr);
    let re = Regex::new(check.parse_regex).ok()?;
    re.captures(&text).and_then(|c| c.get(1)).map(|m| m.as_str().to_string())
}

/// Bootstrap table: how to check for and install an LSP server or DAP
/// adapter for a given language.
#[derive(Debug, Clone)]
pub struct AdapterSpec {
    pub check_cmd: &'static str,
    pub install_cmd: &'static str,
    pub prerequisites: &'static [&'static str],
}

pub static LSP_ADAPTERS: Lazy<HashMap<&'static str, AdapterSpec>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert("python", AdapterSpec { check_cmd: "pyright", install_cmd: "pip install pyright", prerequisites: &["pip"] });
    m.insert("javascript", AdapterSpec { check_cmd: "typescript-language-server", install_cmd: "npm i -g typescript-language-server typescript", prerequisites: &["npm"] });
    m.insert("typescript", AdapterSpec { check_cmd: "typescript-language-server", install_cmd: "npm i -g typescript-language-server typescript", prerequisites: &["npm"] });
    m.insert("rust", AdapterSpec { check_cmd: "rust-analyzer", install_cmd: "rustup component add rust-analyzer", prerequisites: &["rustup"] });
    m.insert("go", AdapterSpec { check_cmd: "gopls", install_cmd: "go install golang.org/x/tools/gopls@latest", prerequisites: &["go"] });
    m
});

pub static DAP_ADAPTERS: Lazy<HashMap<&'static str, AdapterSpec>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert("python", AdapterSpec { check_cmd: "debugpy", install_cmd: "pip install debugpy", prerequisites: &["pip"] });
    m.insert("javascript", AdapterSpec { check_cmd: "vscode-js-debug", install_cmd: "npm i -g vscode-js-debug", prerequisites: &["npm"] });
    m.insert("rust", AdapterSpec { check_cmd: "lldb-dap", install_cmd: "install lldb via your system package manager", prerequisites: &["lldb"] });
    m
});

/// Verify (and, if `auto_install` is set, install) the LSP or DAP adapter
/// for `language`. Missing prerequisites surface as a dedicated error
/// naming the exact remedial command, never a generic failure.
pub fn ensure_adapter(table: &HashMap<&'static str, AdapterSpec>, language: &str, auto_install: bool) -> Result<()> {
    let spec = table
        .get(language)
        .ok_or_else(|| OtterError::adapter_unavailable(language, "no adapter registered for this language"))?;

    if which(spec.check_cmd).is_some() {
        return Ok(());
    }

    for prereq in spec.prerequisites {
        if which(prereq).is_none() {
            return Err(OtterError::dependency_missing(prereq, spec.install_cmd));
        }
    }

    if !auto_install {
        return Err(OtterError::adapter_unavailable(language, spec.install_cmd));
    }

    warn!(language, cmd = spec.install_cmd, "auto-installing adapter");
    let parts: Vec<&str> = spec.install_cmd.split_whitespace().collect();
    let (program, args) = parts.split_first().ok_or_else(|| OtterError::adapter_unavailable(language, spec.install_cmd))?;
    let status = Command::new(program)
        .args(args)
        .status()
        .map_err(|e| OtterError::adapter_unavailable(language, spec.install_cmd).with_suggestion(e.to_string()))?;
    if !status.success() {
        return Err(OtterError::adapter_unavailable(language, spec.install_cmd));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn venv_rule_finds_interpreter() {
        let dir = TempDir::new().unwrap();
        let venv_bin = dir.path().join(".venv/bin");
        std::fs::create_dir_all(&venv_bin).unwrap();
        std::fs::write(venv_bin.join("python"), "#!/bin/sh\n").unwrap();

        let rule = AutoDetectRule::Venv { patterns: &[".venv"], executable_path: "bin/python" };
        let (path, source) = apply_auto_detect_rule(dir.path(), &rule).unwrap();
        assert_eq!(path, venv_bin.join("python"));
        assert_eq!(source, RuntimeSource::AutoDetectVenv);
    }

    #[test]
    fn unregistered_language_is_runtime_not_resolved() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            project_root: dir.path().to_path_buf(),
            log_level: "info".into(),
            test_mode: false,
            readiness_timeout_secs: 15,
            toml: Default::default(),
        };
        let resolver = RuntimeResolver::new();
        let err = resolver.resolve(&config, "cobol").unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::RuntimeNotResolved);
    }

    #[test]
    fn resolution_is_memoized() {
        let dir = TempDir::new().unwrap();
        let venv_bin = dir.path().join(".venv/bin");
        std::fs::create_dir_all(&venv_bin).unwrap();
        std::fs::write(venv_bin.join("python"), "#!/bin/sh\n").unwrap();

        let config = Config {
            project_root: dir.path().to_path_buf(),
            log_level: "info".into(),
            test_mode: false,
            readiness_timeout_secs: 15,
            toml: Default::default(),
        };
        let resolver = RuntimeResolver::new();
        let first = resolver.resolve(&config, "python").unwrap();
        let second = resolver.resolve(&config, "python").unwrap();
        assert_eq!(first.path, second.path);
    }
}
