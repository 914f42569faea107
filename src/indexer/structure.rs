//! Repository structure: the project node, package and folder nodes, file nodes
//! and the containment edges between them.

use crate::indexer::scan::{RepoScan, parent_dir};
use crate::model::{GraphNode, GraphRelationship, NodeLabel, NodeRef, Origin, Properties, RelationshipKind};
use serde_json::json;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct Structure {
    pub nodes: Vec<GraphNode>,
    pub relationships: Vec<GraphRelationship>,
}

pub fn project_node(project: &str) -> GraphNode {
    let mut properties = Properties::new();
    properties.insert("name".to_string(), json!(project));
    GraphNode {
        node: NodeRef::new(NodeLabel::Project, project),
        properties,
        origin: Origin::Project,
        file_path: None,
    }
}

fn package_qn(project: &str, dir: &str) -> String {
    std::iter::once(project)
        .chain(dir.split('/'))
        .collect::<Vec<_>>()
        .join(".")
}

fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Builds structural rows for `scan`. `modules` maps each extracted file to its module name.
pub fn build(project: &str, scan: &RepoScan, modules: &BTreeMap<String, String>) -> Structure {
    let mut out = Structure::default();
    let mut containers: BTreeMap<&str, NodeRef> = BTreeMap::new();
    let project_ref = NodeRef::new(NodeLabel::Project, project);

    // BTreeMap order visits every parent before its children.
    for (dir, &is_package) in &scan.directories {
        let parent = containers
            .get(parent_dir(dir))
            .cloned()
            .unwrap_or_else(|| project_ref.clone());
        let mut properties = Properties::new();
        properties.insert("name".to_string(), json!(base_name(dir)));
        properties.insert("path".to_string(), json!(dir));
        let (node, kind) = if is_package {
            let qn = package_qn(project, dir);
            properties.insert("qualified_name".to_string(), json!(qn));
            let kind = if parent.label == NodeLabel::Package {
                RelationshipKind::ContainsSubpackage
            } else {
                RelationshipKind::ContainsPackage
            };
            (NodeRef::new(NodeLabel::Package, qn), kind)
        } else {
            (
                NodeRef::new(NodeLabel::Folder, dir.as_str()),
                RelationshipKind::ContainsFolder,
            )
        };
        out.nodes.push(GraphNode {
            node: node.clone(),
            properties,
            origin: Origin::Structure,
            file_path: None,
        });
        out.relationships.push(GraphRelationship::new(
            parent,
            kind,
            node.clone(),
            Origin::Structure,
        ));
        containers.insert(dir.as_str(), node);
    }

    for file in &scan.files {
        let parent = containers
            .get(parent_dir(&file.rel_path))
            .cloned()
            .unwrap_or_else(|| project_ref.clone());
        let mut properties = Properties::new();
        let name = base_name(&file.rel_path);
        properties.insert("name".to_string(), json!(name));
        properties.insert("path".to_string(), json!(file.rel_path));
        if let Some((_, ext)) = name.rsplit_once('.') {
            properties.insert("extension".to_string(), json!(format!(".{ext}")));
        }
        properties.insert("language".to_string(), json!(file.language));
        let file_ref = NodeRef::new(NodeLabel::File, file.rel_path.as_str());
        out.nodes.push(GraphNode {
            node: file_ref.clone(),
            properties,
            origin: Origin::Structure,
            file_path: None,
        });
        out.relationships.push(GraphRelationship::new(
            parent.clone(),
            RelationshipKind::ContainsFile,
            file_ref,
            Origin::Structure,
        ));
        if let Some(module) = modules.get(&file.rel_path) {
            out.relationships.push(GraphRelationship::new(
                parent,
                RelationshipKind::ContainsModule,
                NodeRef::new(NodeLabel::Module, module.as_str()),
                Origin::Structure,
            ));
        }
    }
    out
}
