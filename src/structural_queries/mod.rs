//! Structural queries: the one place per-language logic is allowed to
//! live outside the runtime resolver's spec table. Each language gets a
//! tree-sitter query source string with a named capture for import module
//! names; downstream processing is a uniform "strip surrounding quotes",
//! never a per-language regex.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use tree_sitter::{Language as TsLanguage, Query, QueryCursor};

pub struct ImportQuery {
    language: TsLanguage,
    query: Query,
    capture_index: u32,
}

impl ImportQuery {
    fn compile(language: TsLanguage, source: &str, capture_name: &str) -> Self {
        let query = Query::new(language, source).expect("structural query source must be valid");
        let capture_index = query
            .capture_index_for_name(capture_name)
            .unwrap_or_else(|| panic!("capture `{capture_name}` not found in query"));
        Self { language, query, capture_index }
    }

    pub fn ts_language(&self) -> TsLanguage {
        self.language
    }

    /// Runs the query against `source`, returning the captured module name
    /// nodes' text with surrounding quotes stripped.
    pub fn extract_module_names(&self, source: &str) -> Vec<String> {
        let mut parser = tree_sitter::Parser::new();
        if parser.set_language(self.language).is_err() {
            return Vec::new();
        }
        let Some(tree) = parser.parse(source, None) else { return Vec::new() };
        let mut cursor = QueryCursor::new();
        let bytes = source.as_bytes();
        cursor
            .matches(&self.query, tree.root_node(), bytes)
            .flat_map(|m| m.captures.iter())
            .filter(|c| c.index == self.capture_index)
            .filter_map(|c| c.node.utf8_text(bytes).ok())
            .map(strip_quotes)
            .collect()
    }
}

fn strip_quotes(text: &str) -> String {
    text.trim_matches(|c| c == '"' || c == '\'' || c == '`').to_string()
}

pub static IMPORT_QUERIES: Lazy<HashMap<&'static str, ImportQuery>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert(
        "python",
        ImportQuery::compile(
            tree_sitter_python::language(),
            r#"
            (import_statement name: (dotted_name) @module)
            (import_from_statement module_name: (dotted_name) @module)
            (import_from_statement module_name: (relative_import) @module)
            "#,
            "module",
        ),
    );
    m.insert(
        "rust",
        ImportQuery::compile(
            tree_sitter_rust::language(),
            r#"
            (use_declaration argument: (scoped_identifier) @module)
            (use_declaration argument: (identifier) @module)
            (use_declaration argument: (use_as_clause path: (scoped_identifier) @module))
            "#,
            "module",
        ),
    );
    m.insert(
        "javascript",
        ImportQuery::compile(
            tree_sitter_javascript::language(),
            r#"
            (import_statement source: (string) @module)
            (call_expression
                function: (identifier) @fn
                arguments: (arguments (string) @module)
                (#eq? @fn "require"))
            "#,
            "module",
        ),
    );
    m.insert(
        "typescript",
        ImportQuery::compile(
            tree_sitter_typescript::language_typescript(),
            r#"
            (import_statement source: (string) @module)
            "#,
            "module",
        ),
    );
    m.insert(
        "go",
        ImportQuery::compile(
            tree_sitter_go::language(),
            r#"
            (import_spec path: (interpreted_string_literal) @module)
            "#,
            "module",
        ),
    );
    m
});

pub fn imports_for_language(language: &str, source: &str) -> Option<Vec<String>> {
    IMPORT_QUERIES.get(language).map(|q| q.extract_module_names(source))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn python_imports_are_extracted() {
        let imports = imports_for_language("python", "import os\nfrom collections import OrderedDict\n").unwrap();
        assert!(imports.iter().any(|m| m == "os"));
        assert!(imports.iter().any(|m| m == "collections"));
    }

    #[test]
    fn rust_use_declarations_are_extracted() {
        let imports = imports_for_language("rust", "use std::collections::HashMap;\nuse anyhow::Result;\n").unwrap();
        assert!(imports.iter().any(|m| m.contains("HashMap") || m.contains("collections")));
    }

    #[test]
    fn javascript_import_and_require_are_extracted() {
        let imports = imports_for_language(
            "javascript",
            "import fs from 'fs';\nconst path = require('path');\n",
        )
        .unwrap();
        assert!(imports.iter().any(|m| m == "fs"));
        assert!(imports.iter().any(|m| m == "path"));
    }

    #[test]
    fn unknown_language_returns_none() {
        assert!(imports_for_language("cobol", "").is_none());
    }
}
