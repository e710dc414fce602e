//! Debug Session data model: the central entity of the DAP broker. The
//! broker generates the session ID and owns its identity; the editor
//! child's adapter-event listeners append data under that ID. This
//! inversion is what lets a crashed session's state outlive the process.

use serde::Serialize;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Running,
    Paused,
    Terminated,
    Exited,
    NoSession,
}

#[derive(Debug, Clone)]
pub enum LaunchTarget {
    File(String),
    Module(String),
}

#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub target: LaunchTarget,
    pub args: Vec<String>,
    pub env: std::collections::HashMap<String, String>,
    pub cwd: String,
    pub stop_on_entry: bool,
    pub just_my_code: bool,
    pub breakpoints: Vec<u32>,
    pub language: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StackFrame {
    pub id: i64,
    pub name: String,
    pub file: String,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Variable {
    pub name: String,
    pub value: String,
    #[serde(rename = "type")]
    pub type_: Option<String>,
    pub variables_reference: i64,
}

#[derive(Debug, Clone, Default)]
pub struct OutputStreams {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl OutputStreams {
    pub fn append(&mut self, category: &str, bytes: &[u8]) {
        match category {
            "stderr" => self.stderr.extend_from_slice(bytes),
            _ => self.stdout.extend_from_slice(bytes),
        }
    }

    /// Backward-compatible combined view; new consumers should read
    /// `stdout`/`stderr` separately instead.
    pub fn combined(&self) -> String {
        format!("{}{}", String::from_utf8_lossy(&self.stdout), String::from_utf8_lossy(&self.stderr))
    }
}

#[derive(Debug, Clone)]
pub struct Termination {
    pub exit_code: Option<i32>,
    pub terminated_at: Instant,
    pub crash_reason: String,
}

pub struct DebugSession {
    pub id: String,
    pub spec: LaunchSpec,
    pub adapter_session_id: Option<String>,
    pub pid: Option<u32>,
    pub start_time: Instant,
    pub live: bool,
    pub paused: bool,
    pub output: OutputStreams,
    pub termination: Option<Termination>,
    pub last_stack_frames: Vec<StackFrame>,
}

impl DebugSession {
    pub fn new(id: String, spec: LaunchSpec) -> Self {
        Self {
            id,
            spec,
            adapter_session_id: None,
            pid: None,
            start_time: Instant::now(),
            live: true,
            paused: false,
            output: OutputStreams::default(),
            termination: None,
            last_stack_frames: Vec::new(),
        }
    }

    pub fn status(&self) -> SessionStatus {
        match &self.termination {
            Some(_) => {
                if self.termination.as_ref().map(|t| t.exit_code).unwrap_or(None).is_some() {
                    SessionStatus::Exited
                } else {
                    SessionStatus::Terminated
                }
            }
            None if self.paused => SessionStatus::Paused,
            None => SessionStatus::Running,
        }
    }

    pub fn uptime(&self) -> Duration {
        match &self.termination {
            Some(t) => t.terminated_at.duration_since(self.start_time),
            None => self.start_time.elapsed(),
        }
    }

    pub fn mark_exited(&mut self, exit_code: i32) {
        if self.termination.is_none() {
            let uptime = self.start_time.elapsed();
            let crash_reason = crash_reason_for(Some(exit_code), uptime);
            self.termination = Some(Termination { exit_code: Some(exit_code), terminated_at: Instant::now(), crash_reason });
        }
        self.live = false;
    }

    pub fn mark_terminated(&mut self, exit_code: Option<i32>) {
        if self.termination.is_none() {
            let uptime = self.start_time.elapsed();
            let crash_reason = crash_reason_for(exit_code, uptime);
            self.termination = Some(Termination { exit_code, terminated_at: Instant::now(), crash_reason });
        }
        self.live = false;
    }

    /// Retention window per the termination policy: 5 minutes on crash,
    /// 30 seconds on clean exit, indefinite while running.
    pub fn retention_window(&self) -> Option<Duration> {
        match &self.termination {
            None => None,
            Some(t) if t.exit_code == Some(0) => Some(Duration::from_secs(30)),
            Some(_) => Some(Duration::from_secs(5 * 60)),
        }
    }

    pub fn is_expired(&self) -> bool {
        match (&self.termination, self.retention_window()) {
            (Some(t), Some(window)) => t.terminated_at.elapsed() > window,
            _ => false,
        }
    }
}

fn crash_reason_for(exit_code: Option<i32>, uptime: Duration) -> String {
    match exit_code {
        Some(0) => "Process exited cleanly (code 0)".to_string(),
        _ if uptime < Duration::from_secs(2) => "Process terminated during startup".to_string(),
        Some(n) => format!("Process exited with code {n}"),
        None => "Process terminated unexpectedly".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> LaunchSpec {
        LaunchSpec {
            target: LaunchTarget::File("t.py".into()),
            args: vec![],
            env: Default::default(),
            cwd: "/tmp".into(),
            stop_on_entry: false,
            just_my_code: true,
            breakpoints: vec![],
            language: "python".into(),
        }
    }

    #[test]
    fn status_transitions_running_paused_terminated() {
        let mut session = DebugSession::new("s1".into(), spec());
        assert_eq!(session.status(), SessionStatus::Running);
        session.paused = true;
        assert_eq!(session.status(), SessionStatus::Paused);
        session.mark_terminated(None);
        assert_eq!(session.status(), SessionStatus::Terminated);
    }

    #[test]
    fn clean_exit_crash_reason() {
        let mut session = DebugSession::new("s1".into(), spec());
        session.mark_exited(0);
        assert_eq!(session.termination.unwrap().crash_reason, "Process exited cleanly (code 0)");
    }

    #[test]
    fn immediate_nonzero_exit_is_reported_as_startup_crash() {
        let mut session = DebugSession::new("s1".into(), spec());
        session.mark_exited(1);
        assert_eq!(session.termination.unwrap().crash_reason, "Process terminated during startup");
    }

    #[test]
    fn nonzero_exit_after_running_a_while_crash_reason() {
        let mut session = DebugSession::new("s1".into(), spec());
        session.start_time = Instant::now() - Duration::from_secs(5);
        session.mark_exited(1);
        assert_eq!(session.termination.unwrap().crash_reason, "Process exited with code 1");
    }

    #[test]
    fn retention_window_depends_on_exit_code() {
        let mut clean = DebugSession::new("a".into(), spec());
        clean.mark_exited(0);
        assert_eq!(clean.retention_window(), Some(Duration::from_secs(30)));

        let mut crashed = DebugSession::new("b".into(), spec());
        crashed.mark_exited(1);
        assert_eq!(crashed.retention_window(), Some(Duration::from_secs(5 * 60)));

        let running = DebugSession::new("c".into(), spec());
        assert_eq!(running.retention_window(), None);
    }

    #[test]
    fn output_streams_never_mix_categories() {
        let mut output = OutputStreams::default();
        output.append("stdout", b"out");
        output.append("stderr", b"err");
        assert_eq!(output.stdout, b"out");
        assert_eq!(output.stderr, b"err");
    }
}
