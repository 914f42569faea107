use cgidx::graph::{ExportDocument, ExportNode, SqliteGraphStore};
use cgidx::indexer::{IndexOptions, Indexer};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, text: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, text).unwrap();
}

fn index(files: &[(&str, &str)]) -> ExportDocument {
    let repo = TempDir::new().unwrap();
    let db = TempDir::new().unwrap();
    for (rel, text) in files {
        write(repo.path(), rel, text);
    }
    let store = Arc::new(SqliteGraphStore::open(&db.path().join("graph.db")).unwrap());
    let mut indexer =
        Indexer::new(IndexOptions::new(repo.path()).with_project("demo"), store).unwrap();
    let report = indexer.index_all().unwrap();
    assert!(report.files_skipped.is_empty(), "{:?}", report.files_skipped);
    indexer.store().export("demo").unwrap()
}

/// `(source name, target name)` pairs of one relationship type, by simple name.
fn named_edges(doc: &ExportDocument, kind: &str) -> Vec<(String, String)> {
    let names: HashMap<u64, String> = doc
        .nodes
        .iter()
        .map(|node| {
            let name = node.properties.get("name").and_then(|v| v.as_str()).unwrap_or_default();
            (node.id, name.to_string())
        })
        .collect();
    let mut out: Vec<(String, String)> = doc
        .relationships
        .iter()
        .filter(|rel| rel.kind == kind)
        .map(|rel| (names[&rel.source_id].clone(), names[&rel.target_id].clone()))
        .collect();
    out.sort();
    out
}

fn pair(a: &str, b: &str) -> (String, String) {
    (a.to_string(), b.to_string())
}

fn property<'a>(node: &'a ExportNode, key: &str) -> &'a str {
    node.properties.get(key).and_then(|v| v.as_str()).unwrap_or_default()
}

/// Qualified names of the targets `source_qn` has edges of `kind` to.
fn targets_of(doc: &ExportDocument, kind: &str, source_qn: &str) -> BTreeSet<String> {
    let qns: HashMap<u64, &str> = doc
        .nodes
        .iter()
        .map(|node| (node.id, property(node, "qualified_name")))
        .collect();
    doc.relationships
        .iter()
        .filter(|rel| rel.kind == kind && qns[&rel.source_id] == source_qn)
        .map(|rel| qns[&rel.target_id].to_string())
        .collect()
}

fn labels_of(doc: &ExportDocument, name: &str) -> Vec<String> {
    doc.nodes
        .iter()
        .filter(|node| property(node, "name") == name)
        .flat_map(|node| node.labels.clone())
        .collect()
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|item| item.to_string()).collect()
}

#[test]
fn javascript_require_alias_resolves_member_calls() {
    let doc = index(&[
        (
            "lib/util.js",
            "function helper() {\n  return 1;\n}\nmodule.exports = { helper };\n",
        ),
        (
            "app.js",
            "const util = require('./lib/util');\n\nfunction main() {\n  return util.helper();\n}\n",
        ),
    ]);
    assert_eq!(named_edges(&doc, "CALLS"), vec![pair("main", "helper")]);
    assert_eq!(named_edges(&doc, "IMPORTS"), vec![pair("app", "util")]);
}

#[test]
fn csharp_interfaces_and_overriding_methods() {
    let doc = index(&[(
        "Shop/Repo.cs",
        "namespace Shop {\n    public interface IRepo {\n        void Save();\n    }\n\n    public class Repo : IRepo {\n        public void Save() {}\n\n        public void Flush() {\n            Save();\n        }\n    }\n}\n",
    )]);
    assert_eq!(named_edges(&doc, "IMPLEMENTS"), vec![pair("Repo", "IRepo")]);
    assert!(named_edges(&doc, "INHERITS").is_empty());
    assert_eq!(named_edges(&doc, "OVERRIDES"), vec![pair("Save", "Save")]);
    assert!(named_edges(&doc, "CALLS").contains(&pair("Flush", "Save")));
}

#[test]
fn csharp_var_takes_the_type_of_its_initializer() {
    let doc = index(&[(
        "App.cs",
        "namespace Shop {\n    public class Repo {\n        public void Save() {}\n    }\n\n    public class Other {\n        public void Save() {}\n    }\n\n    public class App {\n        public static void Main() {\n            var r = new Repo();\n            r.Save();\n        }\n    }\n}\n",
    )]);
    assert_eq!(
        targets_of(&doc, "CALLS", "demo.App.Shop.App.Main"),
        set(&["demo.App.Shop.Repo.Save"])
    );
}

#[test]
fn java_types_bindings_and_annotations() {
    let doc = index(&[(
        "shop/App.java",
        r#"package shop;

interface Store {
    void save();
}

enum Color { RED, GREEN }

class Repo implements Store {
    public void save() {}
}

class Other {
    public void save() {}
}

public class App {
    private Repo repo;

    public App() {
        this.repo = new Repo();
    }

    @Override
    public String toString() {
        return "app";
    }

    public void run(Other other) {
        var r = new Repo();
        r.save();
        other.save();
        this.repo.save();
    }

    static void helper() {}
}
"#,
    )]);
    assert_eq!(named_edges(&doc, "IMPLEMENTS"), vec![pair("Repo", "Store")]);
    assert_eq!(named_edges(&doc, "OVERRIDES"), vec![pair("save", "save")]);
    assert!(labels_of(&doc, "Color").contains(&"Enum".to_string()));
    assert!(labels_of(&doc, "Store").contains(&"Interface".to_string()));
    assert_eq!(
        targets_of(&doc, "CALLS", "demo.shop.App.App.run"),
        set(&["demo.shop.App.Other.save", "demo.shop.App.Repo.save"])
    );

    let to_string = doc
        .nodes
        .iter()
        .find(|node| property(node, "name") == "toString")
        .unwrap();
    assert_eq!(to_string.properties["decorators"][0], "Override");
    assert_eq!(to_string.properties["is_exported"], true);
    let helper = doc
        .nodes
        .iter()
        .find(|node| property(node, "name") == "helper")
        .unwrap();
    assert_eq!(helper.properties["is_exported"], false);
}

#[test]
fn cpp_classes_out_of_line_methods_and_auto() {
    let doc = index(&[(
        "src/repo.cpp",
        r#"#include <vector>

namespace shop {

class Base {
public:
    virtual void save() {}
};

class Repo : public Base {
public:
    void save() override;
    void flush() { save(); }
};

class Other {
public:
    void save() {}
};

enum class Color { Red, Green };

void Repo::save() {}

void run(Other& other) {
    auto r = new Repo();
    r->save();
    Repo local;
    local.save();
    other.save();
}

}
"#,
    )]);
    assert_eq!(named_edges(&doc, "INHERITS"), vec![pair("Repo", "Base")]);
    assert_eq!(named_edges(&doc, "OVERRIDES"), vec![pair("save", "save")]);
    assert!(named_edges(&doc, "DEFINES_METHOD").contains(&pair("Repo", "save")));
    assert!(labels_of(&doc, "Color").contains(&"Enum".to_string()));
    assert_eq!(
        targets_of(&doc, "CALLS", "demo.src.repo.shop.Repo.flush"),
        set(&["demo.src.repo.shop.Repo.save"])
    );
    assert_eq!(
        targets_of(&doc, "CALLS", "demo.src.repo.shop.run"),
        set(&["demo.src.repo.shop.Other.save", "demo.src.repo.shop.Repo.save"])
    );
}

#[test]
fn lua_require_alias_and_table_functions() {
    let doc = index(&[
        (
            "util.lua",
            "local M = {}\n\nfunction M.helper()\n  return 1\nend\n\nfunction M:describe()\n  return \"util\"\nend\n\nreturn M\n",
        ),
        (
            "app.lua",
            "local util = require(\"util\")\n\nfunction main()\n  return util.helper()\nend\n",
        ),
    ]);
    assert_eq!(named_edges(&doc, "CALLS"), vec![pair("main", "helper")]);
    assert_eq!(named_edges(&doc, "IMPORTS"), vec![pair("app", "util")]);
    assert!(labels_of(&doc, "describe").contains(&"Function".to_string()));
}
