//! DAP session broker: starts debug sessions, manages breakpoints, steps,
//! captures output, and retains post-termination state for diagnosis.

pub mod session;

use crate::editor_host::EditorHost;
use crate::error::{ErrorKind, OtterError, Result};
use crate::runtime::{self, RuntimeResolver};
use dashmap::DashMap;
use serde::Serialize;
use serde_json::{json, Value};
use session::{DebugSession, LaunchSpec, LaunchTarget, SessionStatus, StackFrame, Variable};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

const DAP_TIMEOUT: Duration = Duration::from_secs(5);
const SWEEPER_INTERVAL: Duration = Duration::from_secs(10);

pub struct DapBroker {
    sessions: Arc<DashMap<String, Arc<Mutex<DebugSession>>>>,
    max_sessions: usize,
}

#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub status: SessionStatus,
    pub exit_code: Option<i32>,
    pub crash_reason: Option<String>,
    pub uptime_seconds: f64,
    pub stdout: String,
    pub stderr: String,
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InspectResult {
    pub stack_frames: Vec<StackFrame>,
    pub variables: Vec<Variable>,
    pub evaluation: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub enum ExecutionAction {
    StepOver,
    StepInto,
    StepOut,
    Continue,
    Pause,
    Stop,
}

impl ExecutionAction {
    fn dap_request(self) -> &'static str {
        match self {
            ExecutionAction::StepOver => "next",
            ExecutionAction::StepInto => "stepIn",
            ExecutionAction::StepOut => "stepOut",
            ExecutionAction::Continue => "continue",
            ExecutionAction::Pause => "pause",
            ExecutionAction::Stop => "terminate",
        }
    }
}

impl DapBroker {
    pub fn new(max_sessions: usize) -> Arc<Self> {
        let broker = Arc::new(Self { sessions: Arc::new(DashMap::new()), max_sessions });
        broker.clone().spawn_sweeper();
        broker
    }

    fn spawn_sweeper(self: Arc<Self>) {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(SWEEPER_INTERVAL).await;
                self.sweep_expired().await;
            }
        });
    }

    async fn sweep_expired(&self) {
        let mut expired = Vec::new();
        for entry in self.sessions.iter() {
            if entry.value().lock().await.is_expired() {
                expired.push(entry.key().clone());
            }
        }
        for id in expired {
            self.sessions.remove(&id);
            info!(session_id = %id, "evicted expired debug session");
        }
    }

    /// Starts a session following the critical breakpoint workflow: if any
    /// breakpoints are given, force `stop_on_entry`, wait for the initial
    /// stop, set breakpoints, settle, then resume unless the caller really
    /// wanted `stop_on_entry`.
    pub async fn start_session(
        &self,
        host: &EditorHost,
        resolver: &RuntimeResolver,
        config: &crate::config::Config,
        mut spec: LaunchSpec,
    ) -> Result<String> {
        if self.sessions.len() >= self.max_sessions {
            return Err(OtterError::new(ErrorKind::DapFailed, format!("max concurrent debug sessions ({}) reached", self.max_sessions)));
        }

        let _runtime = resolver.resolve(config, &spec.language)?;
        runtime::ensure_adapter(&runtime::DAP_ADAPTERS, &spec.language, config.toml.dap.auto_install)?;

        let caller_wanted_stop_on_entry = spec.stop_on_entry;
        let has_breakpoints = !spec.breakpoints.is_empty();
        if has_breakpoints {
            spec.stop_on_entry = true;
        }

        let session_id = uuid::Uuid::new_v4().to_string();
        let session = Arc::new(Mutex::new(DebugSession::new(session_id.clone(), spec.clone())));
        self.sessions.insert(session_id.clone(), session.clone());

        let launch_params = json!({
            "sessionId": session_id,
            "program": match &spec.target {
                LaunchTarget::File(f) => f.clone(),
                LaunchTarget::Module(m) => m.clone(),
            },
            "isModule": matches!(spec.target, LaunchTarget::Module(_)),
            "args": spec.args,
            "env": spec.env,
            "cwd": spec.cwd,
            "stopOnEntry": spec.stop_on_entry,
            "justMyCode": spec.just_my_code,
        });
        let launch_result = host.request("dap/launch", Some(launch_params), DAP_TIMEOUT).await;
        if let Err(err) = launch_result {
            self.sessions.remove(&session_id);
            return Err(err);
        }
        {
            let mut s = session.lock().await;
            s.pid = launch_result.ok().and_then(|v| v.get("pid").and_then(Value::as_u64)).map(|p| p as u32);
            s.paused = spec.stop_on_entry;
        }

        if has_breakpoints {
            self.wait_for_stopped(&session_id, DAP_TIMEOUT).await?;
            if let LaunchTarget::File(file) = &spec.target {
                self.set_breakpoints(host, &session_id, file, &spec.breakpoints).await?;
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
            if !caller_wanted_stop_on_entry {
                self.control_execution(host, &session_id, ExecutionAction::Continue).await?;
            }
        }

        Ok(session_id)
    }

    async fn wait_for_stopped(&self, session_id: &str, timeout: Duration) -> Result<()> {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            if let Some(session) = self.sessions.get(session_id) {
                if session.lock().await.paused {
                    return Ok(());
                }
            }
            if std::time::Instant::now() >= deadline {
                return Err(OtterError::timeout("waiting for initial stopped event", timeout));
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    pub async fn set_breakpoints(&self, host: &EditorHost, session_id: &str, file: &str, lines: &[u32]) -> Result<()> {
        self.require_live(session_id).await?;
        let params = json!({ "sessionId": session_id, "source": { "path": file }, "breakpoints": lines });
        host.request("dap/setBreakpoints", Some(params), DAP_TIMEOUT).await?;
        Ok(())
    }

    pub async fn control_execution(&self, host: &EditorHost, session_id: &str, action: ExecutionAction) -> Result<SessionStatus> {
        self.require_live(session_id).await?;
        let params = json!({ "sessionId": session_id });
        let started = std::time::Instant::now();
        let result = host.request(&format!("dap/{}", action.dap_request()), Some(params), DAP_TIMEOUT).await;
        match result {
            Ok(value) => {
                let session = self.sessions.get(session_id).unwrap().clone();
                let mut s = session.lock().await;
                match action {
                    ExecutionAction::Stop => s.mark_terminated(None),
                    _ => {
                        s.paused = value.get("stopped").and_then(Value::as_bool).unwrap_or(matches!(action, ExecutionAction::Pause));
                        if let Some(exit_code) = value.get("exitCode").and_then(Value::as_i64) {
                            s.mark_exited(exit_code as i32);
                        }
                    }
                }
                Ok(s.status())
            }
            Err(err) => Err(OtterError::dap_failed(action.dap_request(), started.elapsed(), err.message)),
        }
    }

    pub async fn inspect_state(&self, host: &EditorHost, session_id: &str, expression: Option<&str>, frame_id: Option<i64>) -> Result<InspectResult> {
        let session = self.require_live(session_id).await?;
        {
            let s = session.lock().await;
            if s.status() != SessionStatus::Paused {
                return Err(OtterError::new(ErrorKind::DapFailed, "inspect_state requires a paused session"));
            }
        }

        let stack_result = host
            .request("dap/stackTrace", Some(json!({ "sessionId": session_id })), DAP_TIMEOUT)
            .await?;
        let frames: Vec<StackFrame> = stack_result
            .get("stackFrames")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
            .iter()
            .filter_map(parse_stack_frame)
            .collect();

        if frames.is_empty() {
            return Err(OtterError::new(
                ErrorKind::DapFailed,
                "session reports paused but stackTrace returned zero frames",
            ));
        }

        {
            let mut s = session.lock().await;
            s.last_stack_frames = frames.clone();
        }

        let variables = if let Some(frame) = frame_id.or_else(|| frames.first().map(|f| f.id)) {
            let result = host.request("dap/variables", Some(json!({ "sessionId": session_id, "frameId": frame })), DAP_TIMEOUT).await?;
            result.as_array().cloned().unwrap_or_default().iter().filter_map(parse_variable).collect()
        } else {
            Vec::new()
        };

        let evaluation = if let Some(expr) = expression {
            let result = host
                .request("dap/evaluate", Some(json!({ "sessionId": session_id, "expression": expr, "frameId": frame_id })), DAP_TIMEOUT)
                .await?;
            result.get("result").and_then(Value::as_str).map(String::from)
        } else {
            None
        };

        Ok(InspectResult { stack_frames: frames, variables, evaluation })
    }

    pub async fn get_debug_session_info(&self, session_id: &str) -> SessionInfo {
        match self.sessions.get(session_id) {
            None => SessionInfo {
                session_id: session_id.to_string(),
                status: SessionStatus::NoSession,
                exit_code: None,
                crash_reason: None,
                uptime_seconds: 0.0,
                stdout: String::new(),
                stderr: String::new(),
                message: Some("unknown or evicted debug session".to_string()),
            },
            Some(session) => {
                let s = session.lock().await;
                SessionInfo {
                    session_id: session_id.to_string(),
                    status: s.status(),
                    exit_code: s.termination.as_ref().and_then(|t| t.exit_code),
                    crash_reason: s.termination.as_ref().map(|t| t.crash_reason.clone()),
                    uptime_seconds: s.uptime().as_secs_f64(),
                    stdout: String::from_utf8_lossy(&s.output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&s.output.stderr).to_string(),
                    message: None,
                }
            }
        }
    }

    /// Called by the editor host's event listener plumbing when a DAP
    /// `output` event arrives for a session still owned by the registry.
    pub async fn record_output(&self, session_id: &str, category: &str, bytes: &[u8]) {
        if let Some(session) = self.sessions.get(session_id) {
            session.lock().await.output.append(category, bytes);
        }
    }

    pub async fn record_exit(&self, session_id: &str, exit_code: i32) {
        if let Some(session) = self.sessions.get(session_id) {
            session.lock().await.mark_exited(exit_code);
        }
    }

    pub async fn record_terminated(&self, session_id: &str, exit_code: Option<i32>) {
        if let Some(session) = self.sessions.get(session_id) {
            let mut s = session.lock().await;
            s.mark_terminated(exit_code);
            warn!(session_id, "debug session terminated");
        }
    }

    async fn require_live(&self, session_id: &str) -> Result<Arc<Mutex<DebugSession>>> {
        let session = self.sessions.get(session_id).map(|e| e.clone()).ok_or_else(|| OtterError::session_not_found(session_id))?;
        let status = session.lock().await.status();
        if matches!(status, SessionStatus::Terminated | SessionStatus::Exited) {
            return Err(OtterError::new(ErrorKind::DapFailed, format!("session `{session_id}` is terminated; cannot issue further control actions")));
        }
        Ok(session)
    }
}

fn parse_stack_frame(value: &Value) -> Option<StackFrame> {
    Some(StackFrame {
        id: value.get("id").and_then(Value::as_i64)?,
        name: value.get("name").and_then(Value::as_str).unwrap_or_default().to_string(),
        file: value.get("source").and_then(|s| s.get("path")).and_then(Value::as_str).unwrap_or_default().to_string(),
        line: value.get("line").and_then(Value::as_u64).unwrap_or(0) as u32,
        column: value.get("column").and_then(Value::as_u64).unwrap_or(0) as u32,
    })
}

fn parse_variable(value: &Value) -> Option<Variable> {
    Some(Variable {
        name: value.get("name").and_then(Value::as_str)?.to_string(),
        value: value.get("value").and_then(Value::as_str).unwrap_or_default().to_string(),
        type_: value.get("type").and_then(Value::as_str).map(String::from),
        variables_reference: value.get("variablesReference").and_then(Value::as_i64).unwrap_or(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_action_maps_to_dap_request_names() {
        assert_eq!(ExecutionAction::StepOver.dap_request(), "next");
        assert_eq!(ExecutionAction::StepInto.dap_request(), "stepIn");
        assert_eq!(ExecutionAction::Continue.dap_request(), "continue");
    }

    #[tokio::test]
    async fn unknown_session_id_reports_no_session() {
        let broker = DapBroker::new(4);
        let info = broker.get_debug_session_info("does-not-exist").await;
        assert_eq!(info.status, SessionStatus::NoSession);
        assert!(info.message.is_some());
    }
}
