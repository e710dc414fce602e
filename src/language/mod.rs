//! Extension-based language detection.
//!
//! This table is deliberately "dumb": a language name plus the file
//! extensions that map to it. No keyword lists, no per-language parsing
//! logic lives here. Anything that needs to reason about a language's
//! syntax belongs in `structural_queries` (tree-sitter query strings) or
//! `runtime` (the resolver's declarative spec table) instead.

use once_cell::sync::Lazy;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
pub struct Language {
    pub name: &'static str,
    pub extensions: &'static [&'static str],
}

pub static LANGUAGES: Lazy<Vec<Language>> = Lazy::new(|| {
    vec![
        Language { name: "c", extensions: &["c", "h"] },
        Language { name: "cpp", extensions: &["cpp", "hpp", "cc", "cxx", "hxx"] },
        Language { name: "rust", extensions: &["rs"] },
        Language { name: "go", extensions: &["go"] },
        Language { name: "zig", extensions: &["zig"] },
        Language { name: "javascript", extensions: &["js", "mjs", "cjs", "jsx"] },
        Language { name: "typescript", extensions: &["ts", "tsx"] },
        Language { name: "html", extensions: &["html", "htm"] },
        Language { name: "css", extensions: &["css"] },
        Language { name: "scss", extensions: &["scss"] },
        Language { name: "sass", extensions: &["sass"] },
        Language { name: "less", extensions: &["less"] },
        Language { name: "python", extensions: &["py", "pyi"] },
        Language { name: "ruby", extensions: &["rb"] },
        Language { name: "php", extensions: &["php"] },
        Language { name: "java", extensions: &["java"] },
        Language { name: "kotlin", extensions: &["kt", "kts"] },
        Language { name: "scala", extensions: &["scala"] },
        Language { name: "csharp", extensions: &["cs"] },
        Language { name: "swift", extensions: &["swift"] },
        Language { name: "bash", extensions: &["sh", "bash"] },
        Language { name: "json", extensions: &["json"] },
        Language { name: "yaml", extensions: &["yaml", "yml"] },
        Language { name: "toml", extensions: &["toml"] },
        Language { name: "sql", extensions: &["sql"] },
        Language { name: "lua", extensions: &["lua"] },
        Language { name: "elixir", extensions: &["ex", "exs"] },
        Language { name: "erlang", extensions: &["erl"] },
        Language { name: "haskell", extensions: &["hs"] },
        Language { name: "ocaml", extensions: &["ml", "mli"] },
        Language { name: "dart", extensions: &["dart"] },
        Language { name: "julia", extensions: &["jl"] },
        Language { name: "r", extensions: &["r"] },
        Language { name: "perl", extensions: &["pl", "pm"] },
        Language { name: "nim", extensions: &["nim"] },
        Language { name: "terraform", extensions: &["tf"] },
        Language { name: "markdown", extensions: &["md", "markdown"] },
    ]
});

static EXT_MAP: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for lang in LANGUAGES.iter() {
        for ext in lang.extensions {
            map.insert(*ext, lang.name);
        }
    }
    map
});

/// Directory names always skipped while scanning a project for enabled
/// languages or while searching for `imported_by` references.
pub const SKIPPED_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "__pycache__",
    ".venv",
    "venv",
    "target",
    ".otter",
    "dist",
    "build",
];

/// Detect a language from a file path by extension. Returns `None` for
/// unrecognized extensions rather than a placeholder string, so callers
/// must handle "this file has no known language" explicitly.
pub fn detect_language(path: &str) -> Option<&'static str> {
    let ext = path.rsplit('.').next()?.to_ascii_lowercase();
    EXT_MAP.get(ext.as_str()).copied()
}

/// True if `dir_name` should be skipped during a project scan.
pub fn is_skipped_dir(dir_name: &str) -> bool {
    SKIPPED_DIRS.contains(&dir_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_known_extensions() {
        assert_eq!(detect_language("main.rs"), Some("rust"));
        assert_eq!(detect_language("app.js"), Some("javascript"));
        assert_eq!(detect_language("server.py"), Some("python"));
        assert_eq!(detect_language("Main.java"), Some("java"));
    }

    #[test]
    fn unknown_extension_is_none() {
        assert_eq!(detect_language("unknown.xyz"), None);
        assert_eq!(detect_language("no_extension"), None);
    }

    #[test]
    fn skip_list_covers_common_noise_dirs() {
        assert!(is_skipped_dir(".git"));
        assert!(is_skipped_dir("node_modules"));
        assert!(!is_skipped_dir("src"));
    }

    #[test]
    fn every_language_has_extensions() {
        for lang in LANGUAGES.iter() {
            assert!(!lang.extensions.is_empty(), "{} has no extensions", lang.name);
        }
    }
}
