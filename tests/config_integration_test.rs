use otter::config::{CliArgs, Config};
use tempfile::TempDir;

fn write_otter_toml(dir: &std::path::Path, contents: &str) {
    std::fs::write(dir.join(".otter.toml"), contents).unwrap();
}

#[test]
fn loads_defaults_when_no_toml_present() {
    let dir = TempDir::new().unwrap();
    let config = Config::load(CliArgs {
        project: Some(dir.path().to_path_buf()),
        log_level: "info".to_string(),
        config: None,
        test_mode: false,
    })
    .unwrap();

    assert!(config.toml.lsp.enabled);
    assert!(!config.toml.dap.enabled);
    assert_eq!(config.toml.performance.max_lsp_clients, 8);
}

#[test]
fn project_relative_toml_is_picked_up_automatically() {
    let dir = TempDir::new().unwrap();
    write_otter_toml(
        dir.path(),
        r#"
        [lsp]
        languages = ["python", "rust"]
        disabled_languages = ["rust"]

        [performance]
        max_dap_sessions = 2
        "#,
    );

    let config = Config::load(CliArgs {
        project: Some(dir.path().to_path_buf()),
        log_level: "info".to_string(),
        config: None,
        test_mode: false,
    })
    .unwrap();

    assert_eq!(config.toml.lsp.languages, vec!["python".to_string(), "rust".to_string()]);
    assert_eq!(config.toml.lsp.disabled_languages, vec!["rust".to_string()]);
    assert_eq!(config.toml.performance.max_dap_sessions, 2);
}

#[test]
fn explicit_config_path_overrides_default_lookup() {
    let dir = TempDir::new().unwrap();
    let alt_path = dir.path().join("alt.toml");
    std::fs::write(&alt_path, "[lsp]\nauto_install = true\n").unwrap();

    let config = Config::load(CliArgs {
        project: Some(dir.path().to_path_buf()),
        log_level: "info".to_string(),
        config: Some(alt_path),
        test_mode: false,
    })
    .unwrap();

    assert!(config.toml.lsp.auto_install);
}

#[test]
fn nonexistent_project_root_is_an_error() {
    let result = Config::load(CliArgs {
        project: Some(std::path::PathBuf::from("/does/not/exist/ever")),
        log_level: "info".to_string(),
        config: None,
        test_mode: false,
    });
    assert!(result.is_err());
}
