use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use flashback::manifest::store::{parse, render};
use flashback::manifest::{Manifest, ManifestEntry};
use flashback::reconcile::Reconciler;
use flashback::utils::hash::hash_file;
use std::fs;
use std::hint::black_box;
use std::path::Path;
use tempfile::tempdir;

/// Manifest over `count` source files; every other file already on the drive
fn create_tree(root: &Path, count: usize) -> Manifest {
    let src = root.join("src");
    let dest = root.join("dest");
    fs::create_dir_all(&src).unwrap();
    fs::create_dir_all(&dest).unwrap();

    let mut manifest = Manifest::new();
    for i in 0..count {
        let name = format!("file_{i}.txt");
        let path = src.join(&name);
        fs::write(&path, format!("content of file {i}\n").repeat(64)).unwrap();
        if i % 2 == 0 {
            fs::copy(&path, dest.join(&name)).unwrap();
        }
        manifest.add(ManifestEntry::from_source(&path).unwrap()).unwrap();
    }
    manifest
}

fn benchmark_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");

    for count in [10, 100, 1000] {
        let dir = tempdir().unwrap();
        let manifest = create_tree(dir.path(), count);
        let dest = dir.path().join("dest");

        group.bench_with_input(BenchmarkId::new("mtime_only", count), &count, |b, _| {
            let reconciler = Reconciler::new().with_hash_verification(false);
            b.iter(|| reconciler.classify(black_box(&manifest), black_box(&dest)));
        });
        group.bench_with_input(BenchmarkId::new("with_hash", count), &count, |b, _| {
            let reconciler = Reconciler::new();
            b.iter(|| reconciler.classify(black_box(&manifest), black_box(&dest)));
        });
    }

    group.finish();
}

fn benchmark_manifest_text(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let manifest = create_tree(dir.path(), 500);
    let text = render(&manifest);

    let mut group = c.benchmark_group("manifest_text");
    group.bench_function("render_500", |b| b.iter(|| render(black_box(&manifest))));
    group.bench_function("parse_500", |b| b.iter(|| parse(black_box(&text))));
    group.finish();
}

fn benchmark_hash_file(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("big.bin");
    let data: Vec<u8> = (0..8 * 1024 * 1024).map(|i| (i % 251) as u8).collect();
    fs::write(&path, data).unwrap();

    c.bench_function("hash_file_8mib", |b| b.iter(|| hash_file(black_box(&path))));
}

criterion_group!(
    benches,
    benchmark_classify,
    benchmark_manifest_text,
    benchmark_hash_file
);
criterion_main!(benches);
