//! LSP service surface: navigation, hover, completions, diagnostics,
//! symbols, references, rename, code actions, dependency extraction.
//!
//! Every capability here delegates to exactly one LSP method issued
//! through the editor host's built-in client; there is no local
//! reimplementation of LSP semantics. Lines are 1-indexed in every public
//! signature and converted to LSP's 0-indexed convention at the call
//! boundary; columns are 0-indexed throughout, matching LSP.

pub mod client_set;

use crate::editing::BufferStore;
use crate::editor_host::EditorHost;
use crate::error::{ErrorKind, OtterError, Result};
use crate::search;
use crate::structural_queries;
use client_set::LspClientSet;
use lsp_types::Position;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

fn file_uri(path: &Path) -> String {
    format!("file://{}", path.display())
}

/// Converts from the 1-indexed lines used at every public boundary to
/// LSP's 0-indexed `Position`, serialized the same way `lsp_types` itself
/// would put it on the wire.
fn lsp_position(line_1indexed: usize, column_0indexed: usize) -> Value {
    let position = Position::new((line_1indexed.saturating_sub(1)) as u32, column_0indexed as u32);
    serde_json::to_value(position).expect("Position always serializes")
}

#[derive(Debug, Serialize)]
pub struct Definition {
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
    pub symbol_kind: String,
    pub signature: Option<String>,
    pub docstring: Option<String>,
    pub source_file: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct ReferenceItem {
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
    pub context: String,
    pub is_definition: bool,
    pub reference_type: String,
}

#[derive(Debug, Serialize)]
pub struct GroupedFile {
    pub file: PathBuf,
    pub count: usize,
    pub references: Vec<ReferenceItem>,
}

#[derive(Debug, Serialize)]
pub struct ReferencesResult {
    pub references: Vec<ReferenceItem>,
    pub total_count: usize,
    pub grouped_by_file: Vec<GroupedFile>,
}

#[derive(Debug, Serialize)]
pub struct HoverResult {
    pub symbol: String,
    #[serde(rename = "type")]
    pub type_: Option<String>,
    pub docstring: Option<String>,
    pub source_file: PathBuf,
    pub line: usize,
    pub column: usize,
}

fn parse_hover_result(result: &Value, file: &Path, line: usize, column: usize) -> HoverResult {
    HoverResult {
        symbol: result.get("symbol").and_then(Value::as_str).unwrap_or_default().to_string(),
        type_: result.get("type").and_then(Value::as_str).map(String::from),
        docstring: result.get("docstring").and_then(Value::as_str).map(String::from),
        source_file: file.to_path_buf(),
        line,
        column,
    }
}

/// How far `find_references` should look: the current file only, the
/// enclosing package (not yet implemented), or the whole project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceScope {
    File,
    Package,
    Project,
}

impl std::str::FromStr for ReferenceScope {
    type Err = OtterError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "file" => Ok(ReferenceScope::File),
            "package" => Ok(ReferenceScope::Package),
            "project" => Ok(ReferenceScope::Project),
            other => Err(OtterError::invalid_range(format!("unknown reference scope `{other}`, expected file|package|project"))),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Completion {
    pub text: String,
    pub kind: Option<String>,
    pub detail: Option<String>,
    pub documentation: Option<String>,
    pub sort_text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CompletionsResult {
    pub completions: Vec<Completion>,
    pub total_count: usize,
    pub returned_count: usize,
    pub truncated: bool,
}

#[derive(Debug, Serialize, Clone)]
pub struct Symbol {
    pub name: String,
    pub kind: String,
    pub line: usize,
    pub column: usize,
    pub signature: Option<String>,
    pub detail: Option<String>,
    pub children: Vec<Symbol>,
}

#[derive(Debug, Serialize)]
pub struct DocumentSymbolsResult {
    pub symbols: Vec<Symbol>,
    pub file: PathBuf,
    pub total_count: usize,
    pub language: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
pub struct Diagnostic {
    pub severity: String,
    pub message: String,
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
    pub source: Option<String>,
    pub optional_fix: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DiagnosticsResult {
    pub diagnostics: Vec<Diagnostic>,
    pub total_count: usize,
    pub file: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct RenameResult {
    pub diff: Option<String>,
    pub applied: bool,
    pub affected_files: Vec<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct CodeAction {
    pub title: String,
    pub kind: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CodeActionsResult {
    pub actions: Vec<CodeAction>,
    pub applied: bool,
}

#[derive(Debug, Serialize)]
pub struct DependencyResult {
    pub file: PathBuf,
    pub imports: Vec<String>,
    pub imported_by: Vec<PathBuf>,
}

pub struct LspSurface {
    pub clients: LspClientSet,
}

impl LspSurface {
    pub fn new(max_clients: usize) -> Self {
        Self { clients: LspClientSet::new(max_clients) }
    }

    async fn prepare(&self, host: &EditorHost, buffers: &BufferStore, file: &Path, timeout: Duration) -> Result<String> {
        buffers.ensure_open(file).map_err(|_| OtterError::not_open_or_not_attached(&file.display().to_string()))?;
        let language = crate::language::detect_language(&file.display().to_string())
            .ok_or_else(|| OtterError::not_open_or_not_attached(&file.display().to_string()))?;
        self.clients.ensure_ready(host, language, &file_uri(file), timeout).await?;
        Ok(language.to_string())
    }

    pub async fn find_definition(
        &self,
        host: &EditorHost,
        buffers: &BufferStore,
        file: &Path,
        line: usize,
        column: Option<usize>,
        symbol: Option<&str>,
    ) -> Result<Definition> {
        self.prepare(host, buffers, file, DEFAULT_TIMEOUT).await?;

        let position = if let Some(col) = column {
            lsp_position(line, col)
        } else if let Some(name) = symbol {
            let (sym_line, sym_column) = self.locate_symbol_position(host, buffers, file, name, line).await?;
            lsp_position(sym_line, sym_column)
        } else {
            lsp_position(line, 0)
        };

        let params = json!({ "textDocument": { "uri": file_uri(file) }, "position": position });
        let result = host.request("textDocument/definition", Some(params), DEFAULT_TIMEOUT).await?;
        let location = first_location(&result)
            .ok_or_else(|| OtterError::not_open_or_not_attached("no definition found at this position"))?;

        Ok(Definition {
            file: location.file,
            line: location.line,
            column: location.column,
            symbol_kind: result.get("symbolKind").and_then(Value::as_str).unwrap_or("unknown").to_string(),
            signature: result.get("signature").and_then(Value::as_str).map(String::from),
            docstring: result.get("docstring").and_then(Value::as_str).map(String::from),
            source_file: None,
        })
    }

    /// Resolves a symbol name (plus an optional line hint to disambiguate
    /// duplicates) to a concrete `(line, column)` via document symbols.
    async fn locate_symbol_position(&self, host: &EditorHost, buffers: &BufferStore, file: &Path, symbol: &str, line_hint: usize) -> Result<(usize, usize)> {
        let symbols = self.document_symbols(host, buffers, file, None).await?;
        let matches: Vec<&Symbol> = symbols.symbols.iter().filter(|s| s.name == symbol).collect();
        match matches.len() {
            0 => Err(OtterError::not_open_or_not_attached(&format!("symbol `{symbol}` not found in {}", file.display()))),
            1 => Ok((matches[0].line, matches[0].column)),
            _ => {
                if let Some(closest) = matches.iter().min_by_key(|s| (s.line as i64 - line_hint as i64).abs()) {
                    Ok((closest.line, closest.column))
                } else {
                    Err(OtterError::ambiguous_symbol(symbol, matches.len()))
                }
            }
        }
    }

    pub async fn find_references(
        &self,
        host: &EditorHost,
        buffers: &BufferStore,
        file: &Path,
        line: usize,
        symbol: Option<&str>,
        scope: ReferenceScope,
        exclude_definition: bool,
    ) -> Result<ReferencesResult> {
        self.prepare(host, buffers, file, DEFAULT_TIMEOUT).await?;

        if matches!(scope, ReferenceScope::Package) {
            return Err(OtterError::not_implemented("find_references scope=package"));
        }

        let position = if let Some(name) = symbol {
            let (sym_line, sym_column) = self.locate_symbol_position(host, buffers, file, name, line).await?;
            lsp_position(sym_line, sym_column)
        } else {
            lsp_position(line, 0)
        };

        let params = json!({
            "textDocument": { "uri": file_uri(file) },
            "position": position,
            "context": { "includeDeclaration": !exclude_definition },
        });
        let result = host.request("textDocument/references", Some(params), DEFAULT_TIMEOUT).await?;
        let locations = result.as_array().cloned().unwrap_or_default();

        let mut references = Vec::new();
        for loc in &locations {
            if let Some(l) = parse_location(loc) {
                if matches!(scope, ReferenceScope::File) && l.file.as_path() != file {
                    continue;
                }
                references.push(ReferenceItem {
                    file: l.file,
                    line: l.line,
                    column: l.column,
                    context: loc.get("context").and_then(Value::as_str).unwrap_or_default().to_string(),
                    is_definition: loc.get("isDefinition").and_then(Value::as_bool).unwrap_or(false),
                    reference_type: loc.get("referenceType").and_then(Value::as_str).unwrap_or("usage").to_string(),
                });
            }
        }

        let mut grouped: Vec<GroupedFile> = Vec::new();
        for reference in &references {
            if let Some(group) = grouped.iter_mut().find(|g| g.file == reference.file) {
                group.count += 1;
                group.references.push(clone_reference(reference));
            } else {
                grouped.push(GroupedFile { file: reference.file.clone(), count: 1, references: vec![clone_reference(reference)] });
            }
        }

        Ok(ReferencesResult { total_count: references.len(), references, grouped_by_file: grouped })
    }

    /// `(file, line, column)` for an exact cursor position, or
    /// `(file, symbol, line_hint?)` to look a symbol up by name. The
    /// symbol-name form does a nearby-column scan (±3) around the
    /// symbol's declared column, since the declaration site's column
    /// isn't always where a hover-worthy token starts.
    pub async fn hover(
        &self,
        host: &EditorHost,
        buffers: &BufferStore,
        file: &Path,
        line: Option<usize>,
        column: Option<usize>,
        symbol: Option<&str>,
        line_hint: Option<usize>,
    ) -> Result<HoverResult> {
        self.prepare(host, buffers, file, DEFAULT_TIMEOUT).await?;

        match (line, column) {
            (Some(l), Some(c)) => {
                let result = self.hover_at(host, file, l, c).await?;
                Ok(parse_hover_result(&result, file, l, c))
            }
            _ => {
                let name = symbol.ok_or_else(|| {
                    OtterError::invalid_range("hover requires either (line, column) or (symbol[, line_hint])")
                })?;
                let hint = line_hint.or(line).unwrap_or(1);
                let (sym_line, sym_column) = self.locate_symbol_position(host, buffers, file, name, hint).await?;
                self.hover_near(host, file, sym_line, sym_column).await
            }
        }
    }

    async fn hover_at(&self, host: &EditorHost, file: &Path, line: usize, column: usize) -> Result<Value> {
        let params = json!({ "textDocument": { "uri": file_uri(file) }, "position": lsp_position(line, column) });
        host.request("textDocument/hover", Some(params), DEFAULT_TIMEOUT).await
    }

    /// Tries the exact column first, then ±1, ±2, ±3, returning the first
    /// non-empty hover answer found.
    async fn hover_near(&self, host: &EditorHost, file: &Path, line: usize, column: usize) -> Result<HoverResult> {
        for delta in [0i64, 1, -1, 2, -2, 3, -3] {
            let candidate_column = (column as i64 + delta).max(0) as usize;
            if let Ok(result) = self.hover_at(host, file, line, candidate_column).await {
                if result.get("symbol").and_then(Value::as_str).map(|s| !s.is_empty()).unwrap_or(false) {
                    return Ok(parse_hover_result(&result, file, line, candidate_column));
                }
            }
        }
        Err(OtterError::not_open_or_not_attached(&format!("no hover information near line {line} in {}", file.display())))
    }

    pub async fn completions(&self, host: &EditorHost, buffers: &BufferStore, file: &Path, line: usize, column: usize, max_results: usize) -> Result<CompletionsResult> {
        self.prepare(host, buffers, file, DEFAULT_TIMEOUT).await?;
        let params = json!({ "textDocument": { "uri": file_uri(file) }, "position": lsp_position(line, column) });
        let result = host.request("textDocument/completion", Some(params), DEFAULT_TIMEOUT).await?;
        let mut items: Vec<Completion> = result
            .get("items")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|item| Completion {
                text: item.get("label").and_then(Value::as_str).unwrap_or_default().to_string(),
                kind: item.get("kind").and_then(Value::as_str).map(String::from),
                detail: item.get("detail").and_then(Value::as_str).map(String::from),
                documentation: item.get("documentation").and_then(Value::as_str).map(String::from),
                sort_text: item.get("sortText").and_then(Value::as_str).map(String::from),
            })
            .collect();
        items.sort_by(|a, b| a.sort_text.cmp(&b.sort_text));

        let total_count = items.len();
        let truncated = max_results != 0 && total_count > max_results;
        if max_results != 0 {
            items.truncate(max_results);
        }
        let returned_count = items.len();
        Ok(CompletionsResult { completions: items, total_count, returned_count, truncated })
    }

    pub async fn document_symbols(&self, host: &EditorHost, buffers: &BufferStore, file: &Path, kind_filter: Option<&str>) -> Result<DocumentSymbolsResult> {
        let language = self.prepare(host, buffers, file, DEFAULT_TIMEOUT).await?;
        let params = json!({ "textDocument": { "uri": file_uri(file) } });
        let result = host.request("textDocument/documentSymbol", Some(params), DEFAULT_TIMEOUT).await?;
        let mut symbols: Vec<Symbol> = result.as_array().cloned().unwrap_or_default().iter().map(parse_symbol).collect();
        if let Some(kind) = kind_filter {
            symbols.retain(|s| s.kind == kind);
        }
        let total_count = symbols.len();
        Ok(DocumentSymbolsResult { symbols, file: file.to_path_buf(), total_count, language: Some(language) })
    }

    pub async fn diagnostics(&self, host: &EditorHost, buffers: &BufferStore, file: Option<&Path>, severity_filter: Option<&str>) -> Result<DiagnosticsResult> {
        let params = match file {
            Some(f) => {
                self.prepare(host, buffers, f, DEFAULT_TIMEOUT).await?;
                json!({ "textDocument": { "uri": file_uri(f) } })
            }
            None => json!({}),
        };
        let result = host.request("textDocument/diagnostic", Some(params), DEFAULT_TIMEOUT).await?;
        let mut diagnostics: Vec<Diagnostic> = result.as_array().cloned().unwrap_or_default().iter().filter_map(parse_diagnostic).collect();
        if let Some(sev) = severity_filter {
            diagnostics.retain(|d| d.severity == sev);
        }
        Ok(DiagnosticsResult { total_count: diagnostics.len(), diagnostics, file: file.map(Path::to_path_buf) })
    }

    pub async fn rename_symbol(&self, host: &EditorHost, buffers: &BufferStore, file: &Path, line: usize, column: usize, new_name: &str, preview: bool) -> Result<RenameResult> {
        self.prepare(host, buffers, file, DEFAULT_TIMEOUT).await?;
        let params = json!({
            "textDocument": { "uri": file_uri(file) },
            "position": lsp_position(line, column),
            "newName": new_name,
        });
        let method = if preview { "textDocument/prepareRename" } else { "textDocument/rename" };
        let result = host.request(method, Some(params), DEFAULT_TIMEOUT).await?;
        let affected_files: Vec<PathBuf> = result
            .get("changes")
            .and_then(Value::as_object)
            .map(|m| m.keys().map(|k| PathBuf::from(k.trim_start_matches("file://"))).collect())
            .unwrap_or_default();
        Ok(RenameResult {
            diff: result.get("diff").and_then(Value::as_str).map(String::from),
            applied: !preview,
            affected_files,
        })
    }

    pub async fn code_actions(&self, host: &EditorHost, buffers: &BufferStore, file: &Path, line: usize, column: usize, kind_filter: Option<&str>) -> Result<CodeActionsResult> {
        self.prepare(host, buffers, file, DEFAULT_TIMEOUT).await?;
        let params = json!({
            "textDocument": { "uri": file_uri(file) },
            "range": { "start": lsp_position(line, column), "end": lsp_position(line, column) },
        });
        let result = host.request("textDocument/codeAction", Some(params), DEFAULT_TIMEOUT).await?;
        let mut actions: Vec<CodeAction> = result
            .as_array()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|a| CodeAction {
                title: a.get("title").and_then(Value::as_str).unwrap_or_default().to_string(),
                kind: a.get("kind").and_then(Value::as_str).map(String::from),
            })
            .collect();
        if let Some(kind) = kind_filter {
            actions.retain(|a| a.kind.as_deref() == Some(kind));
        }
        let applied = actions.len() == 1;
        Ok(CodeActionsResult { actions, applied })
    }

    pub async fn analyze_dependencies(&self, project_root: &Path, file: &Path, direction: DependencyDirection) -> Result<DependencyResult> {
        let language = crate::language::detect_language(&file.display().to_string())
            .ok_or_else(|| OtterError::not_open_or_not_attached(&file.display().to_string()))?;

        let source = std::fs::read_to_string(file)
            .map_err(|e| OtterError::new(ErrorKind::NotOpenOrNotAttached, format!("cannot read {}: {e}", file.display())))?;

        let imports = if matches!(direction, DependencyDirection::Imports | DependencyDirection::Both) {
            structural_queries::imports_for_language(language, &source)
                .ok_or_else(|| OtterError::not_implemented(&format!("dependency extraction for {language}")))?
        } else {
            Vec::new()
        };

        let imported_by = if matches!(direction, DependencyDirection::ImportedBy | DependencyDirection::Both) {
            let stem = file.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
            search::search_literal(project_root, stem)?.into_iter().map(|m| m.file).collect()
        } else {
            Vec::new()
        };

        Ok(DependencyResult { file: file.to_path_buf(), imports, imported_by })
    }
}

#[derive(Debug, Clone, Copy)]
pub enum DependencyDirection {
    Imports,
    ImportedBy,
    Both,
}

struct ParsedLocation {
    file: PathBuf,
    line: usize,
    column: usize,
}

fn parse_location(value: &Value) -> Option<ParsedLocation> {
    let uri = value.get("uri").and_then(Value::as_str)?;
    let range = value.get("range")?;
    let start = range.get("start")?;
    let line = start.get("line").and_then(Value::as_u64)? as usize + 1;
    let column = start.get("character").and_then(Value::as_u64)? as usize;
    Some(ParsedLocation { file: PathBuf::from(uri.trim_start_matches("file://")), line, column })
}

fn first_location(value: &Value) -> Option<ParsedLocation> {
    if let Some(array) = value.as_array() {
        array.first().and_then(parse_location)
    } else {
        parse_location(value)
    }
}

fn clone_reference(r: &ReferenceItem) -> ReferenceItem {
    ReferenceItem {
        file: r.file.clone(),
        line: r.line,
        column: r.column,
        context: r.context.clone(),
        is_definition: r.is_definition,
        reference_type: r.reference_type.clone(),
    }
}

fn parse_symbol(value: &Value) -> Symbol {
    let range = value.get("range").or_else(|| value.get("selectionRange"));
    let (line, column) = range
        .and_then(|r| r.get("start"))
        .map(|start| {
            (
                start.get("line").and_then(Value::as_u64).unwrap_or(0) as usize + 1,
                start.get("character").and_then(Value::as_u64).unwrap_or(0) as usize,
            )
        })
        .unwrap_or((1, 0));
    let children = value
        .get("children")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
        .iter()
        .map(parse_symbol)
        .collect();
    Symbol {
        name: value.get("name").and_then(Value::as_str).unwrap_or_default().to_string(),
        kind: symbol_kind_name(value.get("kind").and_then(Value::as_u64).unwrap_or(0)),
        line,
        column,
        signature: value.get("detail").and_then(Value::as_str).map(String::from),
        detail: value.get("detail").and_then(Value::as_str).map(String::from),
        children,
    }
}

/// Maps the closed LSP SymbolKind enum to a language-agnostic vocabulary.
fn symbol_kind_name(kind: u64) -> String {
    match kind {
        5 => "class",
        6 => "method",
        8 => "field",
        9 => "constructor",
        11 => "interface",
        12 => "function",
        13 => "variable",
        14 => "constant",
        23 => "struct",
        10 => "enum",
        _ => "unknown",
    }
    .to_string()
}

fn parse_diagnostic(value: &Value) -> Option<Diagnostic> {
    let range = value.get("range")?;
    let start = range.get("start")?;
    let line = start.get("line").and_then(Value::as_u64)? as usize + 1;
    let column = start.get("character").and_then(Value::as_u64)? as usize;
    let severity = match value.get("severity").and_then(Value::as_u64) {
        Some(1) => "error",
        Some(2) => "warning",
        Some(3) => "info",
        Some(4) => "hint",
        _ => "error",
    };
    Some(Diagnostic {
        severity: severity.to_string(),
        message: value.get("message").and_then(Value::as_str).unwrap_or_default().to_string(),
        file: value.get("file").and_then(Value::as_str).map(PathBuf::from).unwrap_or_default(),
        line,
        column,
        source: value.get("source").and_then(Value::as_str).map(String::from),
        optional_fix: value.get("fix").and_then(Value::as_str).map(String::from),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completions_sort_and_truncate() {
        let mut items = vec![
            Completion { text: "c".into(), kind: None, detail: None, documentation: None, sort_text: Some("3".into()) },
            Completion { text: "a".into(), kind: None, detail: None, documentation: None, sort_text: Some("1".into()) },
            Completion { text: "b".into(), kind: None, detail: None, documentation: None, sort_text: Some("2".into()) },
        ];
        items.sort_by(|a, b| a.sort_text.cmp(&b.sort_text));
        assert_eq!(items[0].text, "a");
        assert_eq!(items[2].text, "c");
    }

    #[test]
    fn symbol_kind_maps_to_closed_vocabulary() {
        assert_eq!(symbol_kind_name(5), "class");
        assert_eq!(symbol_kind_name(23), "struct");
        assert_eq!(symbol_kind_name(999), "unknown");
    }

    #[test]
    fn parse_location_strips_file_scheme() {
        let value = json!({ "uri": "file:///tmp/a.rs", "range": { "start": { "line": 4, "character": 2 } } });
        let loc = parse_location(&value).unwrap();
        assert_eq!(loc.file, PathBuf::from("/tmp/a.rs"));
        assert_eq!(loc.line, 5);
        assert_eq!(loc.column, 2);
    }
}
