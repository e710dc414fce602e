//! The headless editor host: owns the one child editor process and its
//! single RPC connection for the lifetime of the project.

pub mod protocol;
pub mod rpc;

use crate::config::Config;
use crate::error::{ErrorKind, OtterError, Result};
use crate::runtime::RuntimeResolver;
use anyhow::Context;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

fn editor_binary() -> String {
    std::env::var("OTTER_EDITOR_BIN").unwrap_or_else(|_| "otter-editor".to_string())
}

/// The configuration file written to disk before the child spawns
/// (Editor Host invariant (a)). Plain textual JSON so the child's
/// bootstrap script can read it before any plugin loads.
#[derive(Debug, Serialize)]
struct RuntimeConfigFile {
    enabled_languages: HashMap<String, LanguageRuntimeEntry>,
    test_mode: bool,
}

#[derive(Debug, Serialize)]
struct LanguageRuntimeEntry {
    lsp_server: Option<String>,
    lsp_settings: Value,
    dap_adapter: Option<String>,
    interpreter_path: Option<String>,
}

pub struct EditorHost {
    bridge: rpc::RpcBridge,
    pub socket_path: PathBuf,
    pub runtime_config_path: PathBuf,
}

impl EditorHost {
    /// Runs the strict startup sequence from the component design:
    /// enumerate languages, bootstrap adapters, write the runtime config
    /// file, spawn the child, then wait for it to signal readiness.
    pub async fn start(
        config: &Config,
        resolver: &RuntimeResolver,
        enabled_languages: &[String],
    ) -> Result<Self> {
        let mut runtimes = HashMap::new();
        for language in enabled_languages {
            match resolver.resolve(config, language) {
                Ok(runtime) => {
                    runtimes.insert(language.clone(), runtime);
                }
                Err(err) => {
                    info!(language, error = %err.message, "skipping language with no resolved runtime");
                }
            }
        }

        let state_dir = config.project_root.join(".otter");
        std::fs::create_dir_all(&state_dir)
            .map_err(|e| OtterError::new(ErrorKind::DependencyMissing, format!("cannot create {}: {e}", state_dir.display())))?;
        let runtime_config_path = state_dir.join("runtime_config.json");

        let entries: HashMap<String, LanguageRuntimeEntry> = runtimes
            .iter()
            .map(|(lang, rt)| {
                let lsp_cfg = config.toml.lsp.per_language.get(lang);
                let dap_cfg = config.toml.dap.per_language.get(lang);
                (
                    lang.clone(),
                    LanguageRuntimeEntry {
                        lsp_server: lsp_cfg.and_then(|c| c.server.clone()),
                        lsp_settings: lsp_cfg.map(|c| c.settings.clone()).unwrap_or(Value::Null),
                        dap_adapter: dap_cfg.and_then(|c| c.adapter.clone()),
                        interpreter_path: Some(rt.path.display().to_string()),
                    },
                )
            })
            .collect();

        let file = RuntimeConfigFile { enabled_languages: entries, test_mode: config.test_mode };
        let json = serde_json::to_string_pretty(&file).context("serializing runtime config")?;
        std::fs::write(&runtime_config_path, json)
            .map_err(|e| OtterError::new(ErrorKind::DependencyMissing, format!("writing {}: {e}", runtime_config_path.display())))?;
        debug!(path = %runtime_config_path.display(), "wrote runtime configuration file before spawning editor child");

        let socket_path = std::env::temp_dir().join(format!("otter-{}.sock", uuid::Uuid::new_v4()));
        let _ = std::fs::remove_file(&socket_path);

        let mut command = Command::new(editor_binary());
        command
            .arg("--headless")
            .arg("--clean")
            .arg("--socket")
            .arg(&socket_path)
            .arg("--runtime-config")
            .arg(&runtime_config_path)
            .current_dir(&config.project_root);

        let bridge = rpc::RpcBridge::spawn(command).map_err(|e| {
            OtterError::dependency_missing(&editor_binary(), "install the headless editor binary and ensure it is on PATH")
                .with_suggestion(e.to_string())
        })?;

        let host = Self { bridge, socket_path, runtime_config_path };
        host.wait_for_config_loaded(config.readiness_timeout_secs).await?;
        info!(languages = ?runtimes.keys().collect::<Vec<_>>(), "editor host ready");
        Ok(host)
    }

    async fn wait_for_config_loaded(&self, timeout_secs: u64) -> Result<()> {
        let deadline = Duration::from_secs(timeout_secs);
        let start = std::time::Instant::now();
        loop {
            match self.bridge.request("otter/configLoaded", None, Duration::from_secs(1)).await {
                Ok(_) => return Ok(()),
                Err(_) if start.elapsed() < deadline => {
                    tokio::time::sleep(rpc::READINESS_POLL_INTERVAL).await;
                }
                Err(_) => return Err(OtterError::timeout("editor child configuration load", start.elapsed())),
            }
        }
    }

    pub async fn request(&self, method: &str, params: Option<Value>, timeout: Duration) -> Result<Value> {
        self.bridge.request(method, params, timeout).await
    }

    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        self.bridge.notify(method, params).await.map_err(OtterError::from)
    }

    pub async fn shutdown(&self) {
        self.bridge.shutdown().await;
        let _ = std::fs::remove_file(&self.runtime_config_path);
        let _ = std::fs::remove_file(&self.socket_path);
    }
}
