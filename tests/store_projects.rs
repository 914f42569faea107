use cgidx::IndexError;
use cgidx::graph::{GraphStore, SqliteGraphStore};
use cgidx::indexer::{IndexOptions, Indexer};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, text: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, text).unwrap();
}

fn sample_repo() -> TempDir {
    let repo = TempDir::new().unwrap();
    write(repo.path(), "package.json", r#"{"dependencies": {"left-pad": "^1.3.0"}}"#);
    write(
        repo.path(),
        "src/shapes.ts",
        "export interface Shape { area(): number; }\nexport class Square implements Shape {\n  area(): number { return 4; }\n}\n",
    );
    write(
        repo.path(),
        "src/main.ts",
        "import { Square } from './shapes';\n\nexport function main() {\n  const s = new Square();\n  return s.area();\n}\n",
    );
    repo
}

fn index(repo: &Path, store: Arc<SqliteGraphStore>, project: &str) -> Indexer {
    let mut indexer =
        Indexer::new(IndexOptions::new(repo).with_project(project), store).unwrap();
    indexer.index_all().unwrap();
    indexer
}

#[test]
fn export_then_import_reproduces_the_graph() {
    let repo = sample_repo();
    let db = TempDir::new().unwrap();
    let store = Arc::new(SqliteGraphStore::open(&db.path().join("graph.db")).unwrap());
    index(repo.path(), store.clone(), "web");
    let exported = store.export("web").unwrap();
    assert_eq!(exported.metadata.project, "web");
    assert_eq!(exported.metadata.node_count, exported.nodes.len());

    let text = serde_json::to_string(&exported).unwrap();
    let parsed = serde_json::from_str(&text).unwrap();
    let other_db = TempDir::new().unwrap();
    let target = SqliteGraphStore::open(&other_db.path().join("graph.db")).unwrap();
    target.import("web", &parsed).unwrap();

    assert_eq!(target.export("web").unwrap().content(), exported.content());
    assert_eq!(target.stats("web").unwrap(), store.stats("web").unwrap());
}

#[test]
fn projects_share_a_store_without_touching_each_other() {
    let repo = sample_repo();
    let db = TempDir::new().unwrap();
    let store = Arc::new(SqliteGraphStore::open(&db.path().join("graph.db")).unwrap());
    index(repo.path(), store.clone(), "alpha");
    let before = store.export("alpha").unwrap().content();

    let mut beta = index(repo.path(), store.clone(), "beta");
    assert_eq!(store.export("alpha").unwrap().content(), before);

    beta.index_all().unwrap();
    store.clean("beta").unwrap();
    assert!(store.stats("beta").unwrap().nodes.is_empty());
    assert_eq!(store.export("alpha").unwrap().content(), before);
}

#[test]
fn stats_count_labels_and_relationship_types() {
    let repo = sample_repo();
    let db = TempDir::new().unwrap();
    let store = Arc::new(SqliteGraphStore::open(&db.path().join("graph.db")).unwrap());
    index(repo.path(), store.clone(), "web");
    let stats = store.stats("web").unwrap();

    assert_eq!(stats.nodes.get("Project"), Some(&1));
    assert_eq!(stats.nodes.get("File"), Some(&2));
    assert_eq!(stats.nodes.get("Interface"), Some(&1));
    assert_eq!(stats.nodes.get("ExternalPackage"), Some(&1));
    assert_eq!(stats.relationships.get("IMPLEMENTS"), Some(&1));
    assert_eq!(stats.relationships.get("DEPENDS_ON_EXTERNAL"), Some(&1));
}

#[test]
fn missing_root_is_an_io_error() {
    let db = TempDir::new().unwrap();
    let store = Arc::new(SqliteGraphStore::open(&db.path().join("graph.db")).unwrap());
    let missing = db.path().join("nowhere");
    let result = Indexer::new(IndexOptions::new(&missing).with_project("x"), store)
        .and_then(|mut indexer| indexer.index_all());
    assert!(matches!(result, Err(IndexError::Io { .. })));
}
