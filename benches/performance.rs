use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use otter::runtime::RuntimeResolver;
use tempfile::TempDir;

fn project_config(root: &std::path::Path) -> otter::config::Config {
    otter::config::Config::load(otter::config::CliArgs {
        project: Some(root.to_path_buf()),
        log_level: "error".to_string(),
        config: None,
        test_mode: true,
    })
    .expect("temp project root is always valid")
}

fn benchmark_runtime_resolution(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let venv_bin = dir.path().join(".venv/bin");
    std::fs::create_dir_all(&venv_bin).unwrap();
    std::fs::write(venv_bin.join("python"), "#!/bin/sh\n").unwrap();
    let config = project_config(dir.path());

    let mut group = c.benchmark_group("runtime_resolver");
    group.bench_function("cold_resolve", |b| {
        b.iter(|| {
            let resolver = RuntimeResolver::new();
            black_box(resolver.resolve(&config, "python").ok());
        });
    });

    let warm_resolver = RuntimeResolver::new();
    warm_resolver.resolve(&config, "python").unwrap();
    group.bench_function("memoized_resolve", |b| {
        b.iter(|| black_box(warm_resolver.resolve(&config, "python").ok()));
    });
    group.finish();
}

fn benchmark_buffer_line_edits(c: &mut Criterion) {
    let mut group = c.benchmark_group("editing");

    for size in [100, 1_000, 10_000].iter() {
        let content = (0..*size).map(|i| format!("line {i}\n")).collect::<String>();
        group.bench_with_input(BenchmarkId::new("replace_lines", size), size, |b, _| {
            b.iter(|| {
                let mut buf = content.clone();
                let mut lines: Vec<&str> = buf.lines().collect();
                lines.splice(size / 2..size / 2 + 1, vec!["replaced"]);
                buf = lines.join("\n");
                black_box(buf.len());
            });
        });
    }

    group.finish();
}

fn benchmark_import_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("structural_queries");
    let source = "use std::collections::HashMap;\nuse anyhow::Result;\nuse tokio::sync::Mutex;\n".repeat(50);

    group.bench_function("rust_imports", |b| {
        b.iter(|| {
            black_box(otter::structural_queries::imports_for_language("rust", &source));
        });
    });
    group.finish();
}

fn benchmark_project_structure_walk(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    for i in 0..50 {
        std::fs::write(dir.path().join(format!("file_{i}.rs")), "").unwrap();
    }
    std::fs::create_dir_all(dir.path().join("node_modules")).unwrap();
    std::fs::write(dir.path().join("node_modules/ignored.js"), "").unwrap();

    let mut group = c.benchmark_group("project_structure");
    group.bench_function("walk_flat_dir", |b| {
        b.iter(|| black_box(otter::project_structure::walk(dir.path(), 6)));
    });
    group.finish();
}

criterion_group!(
    benches,
    benchmark_runtime_resolution,
    benchmark_buffer_line_edits,
    benchmark_import_extraction,
    benchmark_project_structure_walk
);
criterion_main!(benches);
