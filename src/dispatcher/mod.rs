//! Tool dispatcher: the single MCP-facing surface. Each tool method
//! resolves its path argument, delegates to the LSP surface, DAP broker,
//! or editing surface, and serializes the result (or an [`OtterError`])
//! as JSON text content.

use crate::dap::session::{LaunchSpec, LaunchTarget};
use crate::dap::ExecutionAction;
use crate::editing::{LineEdit, ReplaceScope};
use crate::error::OtterError;
use crate::lsp::DependencyDirection;
use crate::project::Project;
use rmcp::model::ServerInfo;
use rmcp::{tool, ServerHandler};
use schemars::JsonSchema;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;

fn ok_json(value: &impl serde::Serialize) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| format!("{{\"kind\":\"lsp_failed\",\"message\":\"{e}\"}}"))
}

fn err_json(err: OtterError) -> String {
    serde_json::to_string(&err).unwrap_or_else(|_| format!("{{\"kind\":\"{:?}\",\"message\":\"{}\"}}", err.kind, err.message))
}

macro_rules! respond {
    ($result:expr) => {
        match $result {
            Ok(value) => ok_json(&value),
            Err(err) => err_json(err),
        }
    };
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FindDefinitionRequest {
    #[schemars(description = "File path, absolute or workspace-relative")]
    pub file: String,
    #[schemars(description = "1-indexed line number")]
    pub line: usize,
    #[schemars(description = "0-indexed column; omit to resolve by symbol name")]
    pub column: Option<usize>,
    #[schemars(description = "Symbol name, used when column is omitted")]
    pub symbol: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FindReferencesRequest {
    pub file: String,
    #[schemars(description = "1-indexed line number; used as a disambiguation hint when symbol is given")]
    pub line: usize,
    #[schemars(description = "Symbol name to resolve references for, in place of a cursor position")]
    pub symbol: Option<String>,
    #[schemars(description = "Exclude the declaration site from results")]
    #[serde(default)]
    pub exclude_definition: bool,
    #[schemars(description = "file|package|project")]
    #[serde(default = "default_reference_scope")]
    pub scope: String,
}

fn default_reference_scope() -> String {
    "project".to_string()
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct HoverRequest {
    pub file: String,
    #[schemars(description = "1-indexed line number; omit when resolving by symbol name")]
    pub line: Option<usize>,
    #[schemars(description = "0-indexed column; omit when resolving by symbol name")]
    pub column: Option<usize>,
    #[schemars(description = "Symbol name, used when line/column are omitted")]
    pub symbol: Option<String>,
    #[schemars(description = "Line hint to disambiguate duplicate symbol names")]
    pub line_hint: Option<usize>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CompletionsRequest {
    pub file: String,
    pub line: usize,
    pub column: usize,
    #[serde(default = "default_max_completions")]
    pub max_results: usize,
}

fn default_max_completions() -> usize {
    50
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DocumentSymbolsRequest {
    pub file: String,
    pub kind_filter: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DiagnosticsRequest {
    pub file: Option<String>,
    pub severity_filter: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RenameSymbolRequest {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub new_name: String,
    #[serde(default)]
    pub preview: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ApplyCodeActionRequest {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub kind_filter: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AnalyzeDependenciesRequest {
    pub file: String,
    #[serde(default = "default_direction")]
    pub direction: String,
}

fn default_direction() -> String {
    "imports".to_string()
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetProjectStructureRequest {
    #[serde(default)]
    pub max_depth: Option<usize>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct StartDebugSessionRequest {
    pub language: String,
    pub file: Option<String>,
    #[serde(rename = "module")]
    pub module_target: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: std::collections::HashMap<String, String>,
    pub cwd: Option<String>,
    #[serde(default)]
    pub stop_on_entry: bool,
    #[serde(default = "default_true")]
    pub just_my_code: bool,
    #[serde(default)]
    pub breakpoints: Vec<u32>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ControlExecutionRequest {
    pub session_id: String,
    #[schemars(description = "One of: step_over, step_into, step_out, continue, pause, stop")]
    pub action: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct InspectStateRequest {
    pub session_id: String,
    pub expression: Option<String>,
    pub frame_id: Option<i64>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SetBreakpointsRequest {
    pub session_id: String,
    pub file: String,
    pub lines: Vec<u32>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetDebugSessionInfoRequest {
    pub session_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReadFileRequest {
    pub file: String,
    pub line_start: Option<usize>,
    pub line_end: Option<usize>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct EditBufferRequest {
    pub file: String,
    pub edits: Vec<EditSpec>,
    #[serde(default)]
    pub preview: bool,
    #[serde(default)]
    pub save: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct EditSpec {
    pub line_start: usize,
    pub line_end: usize,
    pub new_text: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FindAndReplaceRequest {
    pub file: String,
    pub old: String,
    pub new: String,
    #[schemars(description = "One of: all, first, or an occurrence index")]
    #[serde(default = "default_scope")]
    pub scope: String,
    #[serde(default)]
    pub preview: bool,
}

fn default_scope() -> String {
    "all".to_string()
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SaveBufferRequest {
    pub file: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DiscardBufferRequest {
    pub file: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct BufferDiffRequest {
    pub file: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetBufferInfoRequest {
    pub file: String,
}

/// The MCP-facing service. Holds the one [`Project`] live for this
/// process; every tool call borrows it to reach the editor host, LSP
/// surface, DAP broker, or buffer store.
#[derive(Clone)]
pub struct OtterDispatcher {
    project: Arc<Project>,
}

impl OtterDispatcher {
    pub fn new(project: Arc<Project>) -> Self {
        Self { project }
    }

    fn resolve_path(&self, input: &str) -> Result<PathBuf, OtterError> {
        crate::paths::resolve(&self.project.config.project_root, input)
    }

    fn parse_execution_action(action: &str) -> Result<ExecutionAction, OtterError> {
        match action {
            "step_over" => Ok(ExecutionAction::StepOver),
            "step_into" => Ok(ExecutionAction::StepInto),
            "step_out" => Ok(ExecutionAction::StepOut),
            "continue" => Ok(ExecutionAction::Continue),
            "pause" => Ok(ExecutionAction::Pause),
            "stop" => Ok(ExecutionAction::Stop),
            other => Err(OtterError::not_implemented(&format!("execution action `{other}`"))),
        }
    }

    fn parse_replace_scope(scope: &str) -> ReplaceScope {
        match scope {
            "first" => ReplaceScope::First,
            "all" => ReplaceScope::All,
            n => n.parse::<usize>().map(ReplaceScope::Nth).unwrap_or(ReplaceScope::All),
        }
    }
}

#[tool(tool_box)]
impl OtterDispatcher {
    #[tool(description = "Find where a symbol is defined")]
    async fn find_definition(&self, #[tool(aggr)] request: FindDefinitionRequest) -> String {
        let outcome = async {
            let path = self.resolve_path(&request.file)?;
            self.project
                .lsp
                .find_definition(&self.project.editor_host, &self.project.buffers, &path, request.line, request.column, request.symbol.as_deref())
                .await
        }
        .await;
        respond!(outcome)
    }

    #[tool(description = "Find all references to the symbol at a line, or by name")]
    async fn find_references(&self, #[tool(aggr)] request: FindReferencesRequest) -> String {
        let outcome = async {
            let path = self.resolve_path(&request.file)?;
            let scope: crate::lsp::ReferenceScope = request.scope.parse()?;
            self.project
                .lsp
                .find_references(
                    &self.project.editor_host,
                    &self.project.buffers,
                    &path,
                    request.line,
                    request.symbol.as_deref(),
                    scope,
                    request.exclude_definition,
                )
                .await
        }
        .await;
        respond!(outcome)
    }

    #[tool(description = "Get hover documentation at a position, or for a named symbol")]
    async fn hover(&self, #[tool(aggr)] request: HoverRequest) -> String {
        let outcome = async {
            let path = self.resolve_path(&request.file)?;
            self.project
                .lsp
                .hover(
                    &self.project.editor_host,
                    &self.project.buffers,
                    &path,
                    request.line,
                    request.column,
                    request.symbol.as_deref(),
                    request.line_hint,
                )
                .await
        }
        .await;
        respond!(outcome)
    }

    #[tool(description = "Get completion suggestions at a position")]
    async fn get_completions(&self, #[tool(aggr)] request: CompletionsRequest) -> String {
        let outcome = async {
            let path = self.resolve_path(&request.file)?;
            self.project
                .lsp
                .completions(&self.project.editor_host, &self.project.buffers, &path, request.line, request.column, request.max_results)
                .await
        }
        .await;
        respond!(outcome)
    }

    #[tool(description = "List the symbols declared in a file")]
    async fn get_document_symbols(&self, #[tool(aggr)] request: DocumentSymbolsRequest) -> String {
        let outcome = async {
            let path = self.resolve_path(&request.file)?;
            self.project.lsp.document_symbols(&self.project.editor_host, &self.project.buffers, &path, request.kind_filter.as_deref()).await
        }
        .await;
        respond!(outcome)
    }

    #[tool(description = "Get diagnostics for one file or the whole project")]
    async fn get_diagnostics(&self, #[tool(aggr)] request: DiagnosticsRequest) -> String {
        let outcome = async {
            let path = match &request.file {
                Some(f) => Some(self.resolve_path(f)?),
                None => None,
            };
            self.project
                .lsp
                .diagnostics(&self.project.editor_host, &self.project.buffers, path.as_deref(), request.severity_filter.as_deref())
                .await
        }
        .await;
        respond!(outcome)
    }

    #[tool(description = "Rename the symbol at a position across the project")]
    async fn rename_symbol(&self, #[tool(aggr)] request: RenameSymbolRequest) -> String {
        let outcome = async {
            let path = self.resolve_path(&request.file)?;
            self.project
                .lsp
                .rename_symbol(&self.project.editor_host, &self.project.buffers, &path, request.line, request.column, &request.new_name, request.preview)
                .await
        }
        .await;
        respond!(outcome)
    }

    #[tool(description = "Apply or list code actions available at a position")]
    async fn apply_code_action(&self, #[tool(aggr)] request: ApplyCodeActionRequest) -> String {
        let outcome = async {
            let path = self.resolve_path(&request.file)?;
            self.project
                .lsp
                .code_actions(&self.project.editor_host, &self.project.buffers, &path, request.line, request.column, request.kind_filter.as_deref())
                .await
        }
        .await;
        respond!(outcome)
    }

    #[tool(description = "Analyze a file's imports and/or importers")]
    async fn analyze_dependencies(&self, #[tool(aggr)] request: AnalyzeDependenciesRequest) -> String {
        let outcome = async {
            let path = self.resolve_path(&request.file)?;
            let direction = match request.direction.as_str() {
                "imported_by" => DependencyDirection::ImportedBy,
                "both" => DependencyDirection::Both,
                _ => DependencyDirection::Imports,
            };
            self.project.lsp.analyze_dependencies(&self.project.config.project_root, &path, direction).await
        }
        .await;
        respond!(outcome)
    }

    #[tool(description = "Walk the project tree, skipping build/vendor noise directories")]
    async fn get_project_structure(&self, #[tool(aggr)] request: GetProjectStructureRequest) -> String {
        let structure = crate::project_structure::walk(&self.project.config.project_root, request.max_depth.unwrap_or(6));
        ok_json(&structure)
    }

    #[tool(description = "Launch a debug session, optionally stopping at breakpoints before running")]
    async fn start_debug_session(&self, #[tool(aggr)] request: StartDebugSessionRequest) -> String {
        let outcome = async {
            let target = match (&request.file, &request.module_target) {
                (Some(f), _) => LaunchTarget::File(self.resolve_path(f)?.display().to_string()),
                (None, Some(m)) => LaunchTarget::Module(m.clone()),
                (None, None) => {
                    return Err(OtterError::not_implemented("start_debug_session requires `file` or `module`"));
                }
            };
            let cwd = request.cwd.unwrap_or_else(|| self.project.config.project_root.display().to_string());
            let spec = LaunchSpec {
                target,
                args: request.args,
                env: request.env,
                cwd,
                stop_on_entry: request.stop_on_entry,
                just_my_code: request.just_my_code,
                breakpoints: request.breakpoints,
                language: request.language,
            };
            self.project
                .dap
                .start_session(&self.project.editor_host, &self.project.resolver, &self.project.config, spec)
                .await
        }
        .await;
        match outcome {
            Ok(session_id) => ok_json(&serde_json::json!({ "session_id": session_id })),
            Err(err) => err_json(err),
        }
    }

    #[tool(description = "Step, continue, pause, or stop a running debug session")]
    async fn control_execution(&self, #[tool(aggr)] request: ControlExecutionRequest) -> String {
        let outcome = async {
            let action = Self::parse_execution_action(&request.action)?;
            self.project.dap.control_execution(&self.project.editor_host, &request.session_id, action).await
        }
        .await;
        match outcome {
            Ok(status) => ok_json(&serde_json::json!({ "status": status })),
            Err(err) => err_json(err),
        }
    }

    #[tool(description = "Inspect the call stack, variables, and evaluate an expression in a paused session")]
    async fn inspect_state(&self, #[tool(aggr)] request: InspectStateRequest) -> String {
        let outcome = self
            .project
            .dap
            .inspect_state(&self.project.editor_host, &request.session_id, request.expression.as_deref(), request.frame_id)
            .await;
        respond!(outcome)
    }

    #[tool(description = "Set breakpoints on a file in a running debug session")]
    async fn set_breakpoints(&self, #[tool(aggr)] request: SetBreakpointsRequest) -> String {
        let outcome = async {
            let path = self.resolve_path(&request.file)?;
            self.project.dap.set_breakpoints(&self.project.editor_host, &request.session_id, &path.display().to_string(), &request.lines).await
        }
        .await;
        match outcome {
            Ok(()) => ok_json(&serde_json::json!({ "applied": true })),
            Err(err) => err_json(err),
        }
    }

    #[tool(description = "Get status, exit code, and captured output for a debug session, live or retained")]
    async fn get_debug_session_info(&self, #[tool(aggr)] request: GetDebugSessionInfoRequest) -> String {
        ok_json(&self.project.dap.get_debug_session_info(&request.session_id).await)
    }

    #[tool(description = "Read a file from disk, optionally a line range, 1-indexed and line-numbered")]
    async fn read_file(&self, #[tool(aggr)] request: ReadFileRequest) -> String {
        let outcome = async {
            let path = self.resolve_path(&request.file)?;
            let range = match (request.line_start, request.line_end) {
                (Some(s), Some(e)) => Some((s, e)),
                _ => None,
            };
            self.project.buffers.read_file(&path, range)
        }
        .await;
        respond!(outcome)
    }

    #[tool(description = "Apply line-range edits to an open buffer")]
    async fn edit_buffer(&self, #[tool(aggr)] request: EditBufferRequest) -> String {
        let outcome = async {
            let path = self.resolve_path(&request.file)?;
            self.project.buffers.ensure_open(&path)?;
            let edits: Vec<LineEdit> = request
                .edits
                .into_iter()
                .map(|e| LineEdit { line_start: e.line_start, line_end: e.line_end, new_text: e.new_text })
                .collect();
            self.project.buffers.edit_buffer(&path, &edits, request.preview, request.save)
        }
        .await;
        respond!(outcome)
    }

    #[tool(description = "Replace text occurrences in an open buffer")]
    async fn find_and_replace(&self, #[tool(aggr)] request: FindAndReplaceRequest) -> String {
        let outcome = async {
            let path = self.resolve_path(&request.file)?;
            self.project.buffers.ensure_open(&path)?;
            let scope = Self::parse_replace_scope(&request.scope);
            self.project.buffers.find_and_replace(&path, &request.old, &request.new, scope, request.preview)
        }
        .await;
        respond!(outcome)
    }

    #[tool(description = "Write an open buffer's contents to disk")]
    async fn save_buffer(&self, #[tool(aggr)] request: SaveBufferRequest) -> String {
        let outcome = async {
            let path = self.resolve_path(&request.file)?;
            self.project.buffers.save_buffer(&path)
        }
        .await;
        match outcome {
            Ok(()) => ok_json(&serde_json::json!({ "saved": true })),
            Err(err) => err_json(err),
        }
    }

    #[tool(description = "Discard an open buffer's unsaved changes, reloading from disk")]
    async fn discard_buffer(&self, #[tool(aggr)] request: DiscardBufferRequest) -> String {
        let outcome = async {
            let path = self.resolve_path(&request.file)?;
            self.project.buffers.discard_buffer(&path)
        }
        .await;
        match outcome {
            Ok(()) => ok_json(&serde_json::json!({ "discarded": true })),
            Err(err) => err_json(err),
        }
    }

    #[tool(description = "Diff an open buffer's in-memory content against disk")]
    async fn buffer_diff(&self, #[tool(aggr)] request: BufferDiffRequest) -> String {
        let outcome = async {
            let path = self.resolve_path(&request.file)?;
            self.project.buffers.buffer_diff(&path)
        }
        .await;
        respond!(outcome)
    }

    #[tool(description = "Get open/modified status, line count, and language for a buffer")]
    async fn get_buffer_info(&self, #[tool(aggr)] request: GetBufferInfoRequest) -> String {
        let outcome = async {
            let path = self.resolve_path(&request.file)?;
            self.project.buffers.buffer_info(&path)
        }
        .await;
        respond!(outcome)
    }
}

#[tool(tool_box)]
impl ServerHandler for OtterDispatcher {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Otter exposes LSP code intelligence and DAP debugging for this project's headless editor to MCP clients. \
                 File arguments accept absolute or workspace-relative paths; response paths are always absolute with symlinks resolved."
                    .to_string(),
            ),
            ..Default::default()
        }
    }
}
