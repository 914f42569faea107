use cgidx::graph::{ExportDocument, SqliteGraphStore};
use cgidx::indexer::{IndexOptions, Indexer};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

struct TempRepo {
    repo: TempDir,
    db: TempDir,
}

impl TempRepo {
    fn new() -> Self {
        Self {
            repo: TempDir::new().unwrap(),
            db: TempDir::new().unwrap(),
        }
    }

    fn root(&self) -> &Path {
        self.repo.path()
    }

    fn write(&self, rel: &str, text: &str) -> PathBuf {
        let path = self.root().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, text).unwrap();
        path
    }

    fn indexer(&self) -> Indexer {
        let store = Arc::new(SqliteGraphStore::open(&self.db.path().join("graph.db")).unwrap());
        Indexer::new(IndexOptions::new(self.root()).with_project("demo"), store).unwrap()
    }
}

fn node_key(node: &cgidx::graph::ExportNode) -> String {
    ["qualified_name", "path", "name"]
        .iter()
        .find_map(|key| node.properties.get(*key).and_then(|v| v.as_str()))
        .unwrap_or_default()
        .to_string()
}

fn edges(doc: &ExportDocument, kind: &str) -> Vec<(String, String)> {
    let keys: HashMap<u64, String> = doc.nodes.iter().map(|n| (n.id, node_key(n))).collect();
    let mut out: Vec<(String, String)> = doc
        .relationships
        .iter()
        .filter(|rel| rel.kind == kind)
        .map(|rel| (keys[&rel.source_id].clone(), keys[&rel.target_id].clone()))
        .collect();
    out.sort();
    out
}

fn has_node(doc: &ExportDocument, label: &str, key: &str) -> bool {
    doc.nodes
        .iter()
        .any(|node| node.labels.iter().any(|l| l == label) && node_key(node) == key)
}

fn pair(a: &str, b: &str) -> (String, String) {
    (a.to_string(), b.to_string())
}

#[test]
fn call_across_files_yields_one_calls_edge() {
    let repo = TempRepo::new();
    repo.write("a.py", "def helper():\n    return 1\n");
    repo.write("b.py", "from a import helper\n\ndef main():\n    helper()\n");
    let mut indexer = repo.indexer();
    let report = indexer.index_all().unwrap();

    assert_eq!(report.files_processed, 2);
    assert_eq!(report.calls_resolved, 1);
    assert_eq!(report.calls_unresolved, 0);
    assert!(report.files_skipped.is_empty());

    let doc = indexer.store().export("demo").unwrap();
    assert_eq!(edges(&doc, "CALLS"), vec![pair("demo.b.main", "demo.a.helper")]);
    assert_eq!(edges(&doc, "IMPORTS"), vec![pair("demo.b", "demo.a")]);
    assert!(edges(&doc, "DEFINES").contains(&pair("demo.a", "demo.a.helper")));
    assert!(has_node(&doc, "Project", "demo"));
    assert!(has_node(&doc, "File", "a.py"));
}

#[test]
fn deleted_file_takes_its_nodes_and_edges_with_it() {
    let repo = TempRepo::new();
    let a = repo.write("a.py", "def helper():\n    return 1\n");
    repo.write("b.py", "from a import helper\n\ndef main():\n    helper()\n");
    let mut indexer = repo.indexer();
    indexer.index_all().unwrap();

    std::fs::remove_file(&a).unwrap();
    indexer.apply_changes(&[a]).unwrap();

    let doc = indexer.store().export("demo").unwrap();
    assert!(!has_node(&doc, "Function", "demo.a.helper"));
    assert!(!has_node(&doc, "File", "a.py"));
    assert!(has_node(&doc, "Function", "demo.b.main"));
    assert!(edges(&doc, "CALLS").is_empty());
}

#[test]
fn file_with_syntax_error_is_skipped_and_reported() {
    let repo = TempRepo::new();
    repo.write("good.py", "def one():\n    pass\n\ndef two():\n    one()\n");
    repo.write("bad.py", "def broken(:\n    pass\n");
    let mut indexer = repo.indexer();
    let report = indexer.index_all().unwrap();

    assert_eq!(report.files_processed, 1);
    assert_eq!(report.files_skipped.len(), 1);
    assert_eq!(report.files_skipped[0].path, "bad.py");
    assert!(report.files_skipped[0].reason.starts_with("parse_error"));

    let doc = indexer.store().export("demo").unwrap();
    assert!(has_node(&doc, "Function", "demo.good.one"));
    assert!(has_node(&doc, "Function", "demo.good.two"));
    assert!(!has_node(&doc, "Module", "demo.bad"));
    assert_eq!(edges(&doc, "CALLS"), vec![pair("demo.good.two", "demo.good.one")]);
}

#[test]
fn reindexing_is_idempotent() {
    let repo = TempRepo::new();
    repo.write("pkg/__init__.py", "");
    repo.write(
        "pkg/shapes.py",
        "class Shape:\n    def area(self):\n        return 0\n\nclass Square(Shape):\n    def area(self):\n        return 4\n",
    );
    repo.write("main.py", "from pkg.shapes import Square\n\ndef run():\n    Square().area()\n");
    let mut indexer = repo.indexer();
    let first = indexer.index_all().unwrap();
    let before = indexer.store().export("demo").unwrap();
    let second = indexer.index_all().unwrap();
    let after = indexer.store().export("demo").unwrap();

    assert_eq!(before.content(), after.content());
    assert_eq!(first.declarations, second.declarations);
    assert_eq!(first.calls_resolved, second.calls_resolved);
    assert_eq!(
        indexer.store().stats("demo").unwrap().nodes.values().sum::<i64>() as usize,
        after.nodes.len()
    );
}

#[test]
fn two_fresh_runs_produce_the_same_graph() {
    let repo = TempRepo::new();
    repo.write("a.py", "def run():\n    pass\n");
    repo.write("b.py", "def run():\n    pass\n");
    repo.write("c.py", "def main():\n    run()\n");
    let mut first = repo.indexer();
    let other_db = TempDir::new().unwrap();
    let store = Arc::new(SqliteGraphStore::open(&other_db.path().join("graph.db")).unwrap());
    let mut second = Indexer::new(IndexOptions::new(repo.root()).with_project("demo"), store).unwrap();

    first.index_all().unwrap();
    second.index_all().unwrap();
    let a = first.store().export("demo").unwrap();
    let b = second.store().export("demo").unwrap();
    assert_eq!(a.content(), b.content());
    assert_eq!(
        edges(&a, "CALLS"),
        vec![pair("demo.c.main", "demo.a.run"), pair("demo.c.main", "demo.b.run")]
    );
}

#[test]
fn structure_and_manifests_are_recorded() {
    let repo = TempRepo::new();
    repo.write("requirements.txt", "requests>=2.31\n# tooling\npytest==8.0\n");
    repo.write("pkg/__init__.py", "");
    repo.write("pkg/sub/__init__.py", "");
    repo.write("pkg/sub/mod.py", "def f():\n    pass\n");
    repo.write("docs/readme.py", "def g():\n    pass\n");
    let mut indexer = repo.indexer();
    indexer.index_all().unwrap();
    let doc = indexer.store().export("demo").unwrap();

    assert!(has_node(&doc, "Package", "demo.pkg"));
    assert!(has_node(&doc, "Package", "demo.pkg.sub"));
    assert!(has_node(&doc, "Folder", "docs"));
    assert!(edges(&doc, "CONTAINS_PACKAGE").contains(&pair("demo", "demo.pkg")));
    assert!(edges(&doc, "CONTAINS_SUBPACKAGE").contains(&pair("demo.pkg", "demo.pkg.sub")));
    assert!(edges(&doc, "CONTAINS_FOLDER").contains(&pair("demo", "docs")));
    assert!(edges(&doc, "CONTAINS_FILE").contains(&pair("demo.pkg.sub", "pkg/sub/mod.py")));
    assert!(edges(&doc, "CONTAINS_MODULE").contains(&pair("demo.pkg.sub", "demo.pkg.sub.mod")));
    assert_eq!(
        edges(&doc, "DEPENDS_ON_EXTERNAL"),
        vec![pair("demo", "pytest"), pair("demo", "requests")]
    );
}

#[test]
fn ignored_directories_are_not_indexed() {
    let repo = TempRepo::new();
    repo.write("node_modules/lib/index.js", "function vendored() {}\n");
    repo.write("generated/out.py", "def generated():\n    pass\n");
    repo.write(".cgidxignore", "# local\ngenerated/\n");
    repo.write("app.py", "def app():\n    pass\n");
    let mut indexer = repo.indexer();
    let report = indexer.index_all().unwrap();

    assert_eq!(report.files_processed, 1);
    let doc = indexer.store().export("demo").unwrap();
    assert!(has_node(&doc, "Function", "demo.app.app"));
    assert!(!doc.nodes.iter().any(|node| node_key(node).contains("generated")));
    assert!(!doc.nodes.iter().any(|node| node_key(node).contains("vendored")));
}
