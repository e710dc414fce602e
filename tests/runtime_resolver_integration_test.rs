use otter::config::{CliArgs, Config};
use otter::error::ErrorKind;
use otter::runtime::RuntimeResolver;
use tempfile::TempDir;

fn config_for(dir: &std::path::Path) -> Config {
    Config::load(CliArgs { project: Some(dir.to_path_buf()), log_level: "info".to_string(), config: None, test_mode: true }).unwrap()
}

#[test]
fn explicit_config_path_wins_over_venv_auto_detect() {
    let dir = TempDir::new().unwrap();
    let venv_bin = dir.path().join(".venv/bin");
    std::fs::create_dir_all(&venv_bin).unwrap();
    std::fs::write(venv_bin.join("python"), "#!/bin/sh\n").unwrap();

    let explicit_bin = dir.path().join("explicit_python");
    std::fs::write(&explicit_bin, "#!/bin/sh\n").unwrap();

    std::fs::write(
        dir.path().join(".otter.toml"),
        format!("[lsp.python]\npython_path = \"{}\"\n", explicit_bin.display()),
    )
    .unwrap();

    let config = config_for(dir.path());
    let resolver = RuntimeResolver::new();
    let resolved = resolver.resolve(&config, "python").unwrap();
    assert_eq!(resolved.path, explicit_bin);
    assert_eq!(resolved.source.label(), "explicit_config");
}

#[test]
fn falls_through_to_venv_when_no_explicit_config() {
    let dir = TempDir::new().unwrap();
    let venv_bin = dir.path().join(".venv/bin");
    std::fs::create_dir_all(&venv_bin).unwrap();
    std::fs::write(venv_bin.join("python"), "#!/bin/sh\n").unwrap();

    let config = config_for(dir.path());
    let resolver = RuntimeResolver::new();
    let resolved = resolver.resolve(&config, "python").unwrap();
    assert_eq!(resolved.path, venv_bin.join("python"));
    assert_eq!(resolved.source.label(), "auto_detect_venv");
}

#[test]
fn unregistered_language_reports_runtime_not_resolved() {
    let dir = TempDir::new().unwrap();
    let config = config_for(dir.path());
    let resolver = RuntimeResolver::new();
    let err = resolver.resolve(&config, "haskell").unwrap_err();
    assert_eq!(err.kind, ErrorKind::RuntimeNotResolved);
}

#[test]
fn two_languages_in_the_same_project_resolve_independently_and_cache() {
    let dir = TempDir::new().unwrap();
    let venv_bin = dir.path().join(".venv/bin");
    std::fs::create_dir_all(&venv_bin).unwrap();
    std::fs::write(venv_bin.join("python"), "#!/bin/sh\n").unwrap();

    let config = config_for(dir.path());
    let resolver = RuntimeResolver::new();
    let python_first = resolver.resolve(&config, "python").unwrap();
    let python_second = resolver.resolve(&config, "python").unwrap();
    assert_eq!(python_first.path, python_second.path);

    let rust_err = resolver.resolve(&config, "haskell");
    assert!(rust_err.is_err());
}
