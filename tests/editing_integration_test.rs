use otter::editing::{BufferStore, LineEdit, ReplaceScope};
use tempfile::TempDir;

fn project_with_file(name: &str, content: &str) -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    (dir, path)
}

#[test]
fn full_edit_save_discard_round_trip() {
    let (_dir, path) = project_with_file("main.py", "def f():\n    return 1\n");
    let store = BufferStore::new();
    store.ensure_open(&path).unwrap();

    let edits = vec![LineEdit { line_start: 2, line_end: 2, new_text: "    return 2".to_string() }];
    let edit_result = store.edit_buffer(&path, &edits, false, true).unwrap();
    assert!(edit_result.applied);
    assert!(!edit_result.diff.is_empty());

    let on_disk = std::fs::read_to_string(&path).unwrap();
    assert!(on_disk.contains("return 2"));

    store.find_and_replace(&path, "return 2", "return 3", ReplaceScope::All, false).unwrap();
    assert!(store.buffer_diff(&path).unwrap().has_changes);

    store.discard_buffer(&path).unwrap();
    assert!(!store.buffer_diff(&path).unwrap().has_changes);
}

#[test]
fn read_file_numbers_lines_from_requested_offset() {
    let (_dir, path) = project_with_file("numbers.txt", "a\nb\nc\nd\ne\n");
    let store = BufferStore::new();
    let result = store.read_file(&path, Some((2, 4))).unwrap();
    assert_eq!(result.content, "2|b\n3|c\n4|d");
    assert_eq!(result.total_lines, 5);
}

#[test]
fn preview_edits_never_touch_disk() {
    let (_dir, path) = project_with_file("preview.py", "x = 1\n");
    let store = BufferStore::new();
    store.ensure_open(&path).unwrap();

    let edits = vec![LineEdit { line_start: 1, line_end: 1, new_text: "x = 2".to_string() }];
    let preview = store.edit_buffer(&path, &edits, true, true).unwrap();
    assert!(!preview.applied);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "x = 1\n");
}

#[test]
fn nth_occurrence_replace_only_touches_that_occurrence() {
    let (_dir, path) = project_with_file("repeat.txt", "foo foo foo\n");
    let store = BufferStore::new();
    store.ensure_open(&path).unwrap();
    let result = store.find_and_replace(&path, "foo", "bar", ReplaceScope::Nth(2), false).unwrap();
    assert!(result.applied);
    let info = store.buffer_info(&path).unwrap();
    assert!(info.is_modified);
}
