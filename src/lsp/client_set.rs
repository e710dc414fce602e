//! Per-project set of attached LSP clients. Readiness is determined by
//! issuing a real request and checking for a non-empty answer, never by a
//! fixed sleep.

use crate::editor_host::EditorHost;
use crate::error::Result;
use dashmap::DashMap;
use serde_json::json;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientStatus {
    Starting,
    Ready,
    Failed,
}

pub struct LspClientSet {
    status: DashMap<String, ClientStatus>,
    max_clients: usize,
}

impl LspClientSet {
    pub fn new(max_clients: usize) -> Self {
        Self { status: DashMap::new(), max_clients }
    }

    pub fn status(&self, language: &str) -> ClientStatus {
        self.status.get(language).map(|s| *s).unwrap_or(ClientStatus::Starting)
    }

    /// Attaches a buffer's language client if needed, then polls
    /// readiness by issuing a document-symbols request with a bounded
    /// timeout and non-empty-response check.
    pub async fn ensure_ready(&self, host: &EditorHost, language: &str, file_uri: &str, timeout: Duration) -> Result<()> {
        if self.status(language) == ClientStatus::Ready {
            return Ok(());
        }
        if self.status.len() >= self.max_clients && !self.status.contains_key(language) {
            return Err(crate::error::OtterError::new(
                crate::error::ErrorKind::NotOpenOrNotAttached,
                format!("max concurrent LSP clients ({}) reached", self.max_clients),
            ));
        }
        self.status.insert(language.to_string(), ClientStatus::Starting);

        let deadline = std::time::Instant::now() + timeout;
        loop {
            let attempt = host
                .request(
                    "textDocument/documentSymbol",
                    Some(json!({ "textDocument": { "uri": file_uri } })),
                    Duration::from_secs(2),
                )
                .await;
            match attempt {
                Ok(value) if !value.is_null() => {
                    self.status.insert(language.to_string(), ClientStatus::Ready);
                    return Ok(());
                }
                _ if std::time::Instant::now() < deadline => {
                    tokio::time::sleep(crate::editor_host::rpc::READINESS_POLL_INTERVAL).await;
                }
                Err(err) => {
                    self.status.insert(language.to_string(), ClientStatus::Failed);
                    return Err(err);
                }
                Ok(_) => {
                    self.status.insert(language.to_string(), ClientStatus::Failed);
                    return Err(crate::error::OtterError::timeout(
                        "LSP readiness polling",
                        timeout,
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_language_starts_as_starting() {
        let set = LspClientSet::new(8);
        assert_eq!(set.status("python"), ClientStatus::Starting);
    }
}
