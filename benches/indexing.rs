use cgidx::graph::SqliteGraphStore;
use cgidx::indexer::{IndexOptions, Indexer};
use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Writes `modules` Python files, each calling into its predecessor.
fn synthetic_repo(modules: usize) -> TempDir {
    let repo = TempDir::new().unwrap();
    let pkg = repo.path().join("pkg");
    std::fs::create_dir_all(&pkg).unwrap();
    std::fs::write(pkg.join("__init__.py"), "").unwrap();
    for i in 0..modules {
        let mut text = String::new();
        if i > 0 {
            text.push_str(&format!("from pkg.mod{} import Service{}\n\n", i - 1, i - 1));
        }
        text.push_str(&format!(
            "class Service{i}:\n    def run(self, value):\n        return self.step(value)\n\n    def step(self, value):\n        return value + {i}\n\n"
        ));
        text.push_str(&format!("def entry{i}():\n"));
        if i > 0 {
            text.push_str(&format!("    Service{}().run({i})\n", i - 1));
        }
        text.push_str(&format!("    return Service{i}().run({i})\n"));
        std::fs::write(pkg.join(format!("mod{i}.py")), text).unwrap();
    }
    repo
}

fn indexer(repo: &Path, db: &Path) -> Indexer {
    let store = Arc::new(SqliteGraphStore::open(db).unwrap());
    Indexer::new(IndexOptions::new(repo).with_project("bench"), store).unwrap()
}

fn bench_full_index(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_index");
    group.sample_size(10);
    for modules in [50usize, 200] {
        let repo = synthetic_repo(modules);
        group.bench_function(format!("modules_{modules}"), |b| {
            b.iter_batched(
                || {
                    let db = TempDir::new().unwrap();
                    let path = db.path().join("graph.db");
                    (db, path)
                },
                |(_db, path)| {
                    let mut indexer = indexer(repo.path(), &path);
                    black_box(indexer.index_all().unwrap())
                },
                BatchSize::PerIteration,
            )
        });
    }
    group.finish();
}

fn bench_incremental_update(c: &mut Criterion) {
    let repo = synthetic_repo(200);
    let db = TempDir::new().unwrap();
    let mut indexer = indexer(repo.path(), &db.path().join("graph.db"));
    indexer.index_all().unwrap();
    let target: PathBuf = repo.path().join("pkg").join("mod100.py");
    let original = std::fs::read_to_string(&target).unwrap();
    let mut toggle = false;

    c.bench_function("incremental_single_file", |b| {
        b.iter(|| {
            toggle = !toggle;
            let text = if toggle {
                format!("{original}\ndef extra():\n    return entry100()\n")
            } else {
                original.clone()
            };
            std::fs::write(&target, text).unwrap();
            black_box(indexer.apply_changes(std::slice::from_ref(&target)).unwrap())
        })
    });
}

criterion_group!(benches, bench_full_index, bench_incremental_update);
criterion_main!(benches);
