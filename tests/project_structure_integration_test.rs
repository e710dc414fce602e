use otter::project_structure::walk;
use tempfile::TempDir;

#[test]
fn walk_reports_absolute_canonicalized_paths() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("a.py"), "").unwrap();
    let tree = walk(dir.path(), 4);
    assert!(tree.path.is_absolute());
    let child = tree.children.iter().find(|c| c.path.file_name().unwrap() == "a.py").unwrap();
    assert_eq!(child.language.as_deref(), Some("python"));
}

#[test]
fn nested_noise_directories_are_excluded_at_any_depth() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("src/vendor/.git")).unwrap();
    std::fs::write(dir.path().join("src/vendor/.git/HEAD"), "").unwrap();
    std::fs::write(dir.path().join("src/main.rs"), "").unwrap();

    let tree = walk(dir.path(), 8);
    let src = tree.children.iter().find(|c| c.path.ends_with("src")).unwrap();
    let vendor = src.children.iter().find(|c| c.path.ends_with("vendor")).unwrap();
    assert!(vendor.children.iter().all(|c| c.path.file_name().unwrap() != ".git"));
    assert!(src.children.iter().any(|c| c.path.file_name().unwrap() == "main.rs"));
}
