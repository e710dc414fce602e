//! The RPC bridge to the headless editor child.
//!
//! The child's RPC channel is single-threaded: exactly one request may be
//! in flight at a time (Editor Host invariant (b); Testable Property 6).
//! `RpcBridge` enforces this with one `conn` mutex guarding *both* ends of
//! the pipe, held for the entire write-then-read round trip. A second
//! tool call that arrives while a round trip is in progress blocks on
//! that same lock until the first's response has been read, so requests
//! against the child never overlap in time and `read_message` is always
//! reading the response that belongs to the request this call just wrote
//! (the JSON-RPC `id` is checked as a second line of defense, not the
//! primary ordering guarantee).

use crate::editor_host::protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use crate::error::OtterError;
use anyhow::{Context, Result};
use serde_json::Value;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::sync::Mutex;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);
pub const READINESS_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Both halves of the pipe to the editor child, behind one lock so a
/// round trip can never be split across two concurrent callers.
struct Connection {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

pub struct RpcBridge {
    child: Mutex<Child>,
    conn: Mutex<Connection>,
}

impl RpcBridge {
    pub fn spawn(mut command: tokio::process::Command) -> Result<Self> {
        command.stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::piped());
        let mut child = command.spawn().context("failed to spawn headless editor child")?;
        let stdin = child.stdin.take().context("editor child has no stdin")?;
        let stdout = child.stdout.take().context("editor child has no stdout")?;
        Ok(Self { child: Mutex::new(child), conn: Mutex::new(Connection { stdin, stdout: BufReader::new(stdout) }) })
    }

    /// Send a request and await its response, bounded by `timeout`. Holds
    /// the single `conn` lock for the whole round trip (write, then
    /// read), which is what enforces single-flight semantics: no other
    /// call can write its own request until this one's response has been
    /// read off the pipe.
    pub async fn request(&self, method: &str, params: Option<Value>, timeout: Duration) -> crate::error::Result<Value> {
        let req = JsonRpcRequest::new(method, params);
        let started = Instant::now();
        let outcome = tokio::time::timeout(timeout, self.round_trip(&req)).await;
        match outcome {
            Ok(Ok(response)) => match (response.result, response.error) {
                (Some(value), None) => Ok(value),
                (_, Some(err)) => Err(OtterError::lsp_failed(method, started.elapsed(), err.message)),
                (None, None) => Ok(Value::Null),
            },
            Ok(Err(err)) => Err(OtterError::lsp_failed(method, started.elapsed(), err.to_string())),
            Err(_) => Err(OtterError::timeout(method, started.elapsed())),
        }
    }

    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        let req = JsonRpcRequest::notification(method, params);
        let mut conn = self.conn.lock().await;
        Self::write_message(&mut conn.stdin, &req).await
    }

    /// The entire round trip runs under one `conn` guard: the write and
    /// the matching read happen back to back with no opportunity for
    /// another caller's request to land on the wire in between.
    async fn round_trip(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse> {
        let mut conn = self.conn.lock().await;
        Self::write_message(&mut conn.stdin, req).await?;
        let response = Self::read_message(&mut conn.stdout).await?;
        if let Some(expected) = &req.id {
            if response.id.as_ref() != Some(expected) {
                anyhow::bail!(
                    "editor child response id {:?} did not match request id {:?} (single-flight invariant violated)",
                    response.id,
                    req.id
                );
            }
        }
        Ok(response)
    }

    async fn write_message<T: serde::Serialize>(stdin: &mut ChildStdin, message: &T) -> Result<()> {
        let body = serde_json::to_string(message)?;
        let framed = format!("Content-Length: {}\r\n\r\n{}", body.len(), body);
        stdin.write_all(framed.as_bytes()).await.context("writing to editor child")?;
        stdin.flush().await.context("flushing editor child stdin")?;
        Ok(())
    }

    async fn read_message(reader: &mut BufReader<ChildStdout>) -> Result<JsonRpcResponse> {
        let mut content_length = None;
        loop {
            let mut line = String::new();
            let n = reader.read_line(&mut line).await.context("reading editor child headers")?;
            if n == 0 {
                anyhow::bail!("editor child closed its stdout while reading headers");
            }
            if line == "\r\n" || line == "\n" {
                break;
            }
            if let Some(rest) = line.strip_prefix("Content-Length:") {
                content_length = Some(rest.trim().parse::<usize>().context("invalid Content-Length header")?);
            }
        }
        let content_length = content_length.context("editor child response missing Content-Length")?;
        let mut body = vec![0u8; content_length];
        reader.read_exact(&mut body).await.context("reading editor child response body")?;
        serde_json::from_slice(&body).context("parsing editor child JSON-RPC response")
    }

    /// Graceful shutdown: ask the child to quit, then force-kill after a
    /// short grace period if it hasn't exited.
    pub async fn shutdown(&self) {
        let _ = self.notify("shutdown", None).await;
        let mut child = self.child.lock().await;
        let wait = tokio::time::timeout(Duration::from_secs(2), child.wait()).await;
        if wait.is_err() {
            let _ = child.start_kill();
            let _ = child.wait().await;
        }
    }

    pub async fn child_id(&self) -> Option<u32> {
        self.child.lock().await.id()
    }
}

pub fn method_not_found_error(method: &str) -> JsonRpcError {
    JsonRpcError { code: JsonRpcError::METHOD_NOT_FOUND, message: format!("method not found: {method}"), data: None }
}
