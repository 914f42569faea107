//! Serialized graph document used by `export` and `import`.

use crate::error::{IndexError, Result};
use crate::model::{
    GraphNode, GraphRelationship, NodeLabel, NodeRef, Origin, Properties, RelationshipKind,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub project: String,
    pub node_count: usize,
    pub relationship_count: usize,
    /// Seconds since the Unix epoch.
    pub exported_at: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportNode {
    pub id: u64,
    pub labels: Vec<String>,
    pub properties: Properties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRelationship {
    pub source_id: u64,
    pub target_id: u64,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub metadata: ExportMetadata,
    pub nodes: Vec<ExportNode>,
    pub relationships: Vec<ExportRelationship>,
}

impl ExportDocument {
    /// Builds a document with ids assigned densely in `(label, key)` order.
    pub fn from_graph(
        project: &str,
        mut nodes: Vec<GraphNode>,
        mut relationships: Vec<GraphRelationship>,
        exported_at: u64,
    ) -> Self {
        nodes.sort_by(|a, b| a.node.cmp(&b.node));
        relationships.sort_by(|a, b| a.identity().cmp(&b.identity()));

        let mut ids: HashMap<NodeRef, u64> = HashMap::with_capacity(nodes.len());
        let export_nodes: Vec<ExportNode> = nodes
            .into_iter()
            .enumerate()
            .map(|(idx, node)| {
                let id = idx as u64;
                ids.insert(node.node.clone(), id);
                ExportNode {
                    id,
                    labels: vec![node.node.label.as_str().to_string()],
                    properties: node.properties,
                    origin: Some(node.origin.as_str().to_string()),
                    file_path: node.file_path,
                }
            })
            .collect();
        let export_relationships: Vec<ExportRelationship> = relationships
            .into_iter()
            .filter_map(|rel| {
                let source_id = *ids.get(&rel.source)?;
                let target_id = *ids.get(&rel.target)?;
                Some(ExportRelationship {
                    source_id,
                    target_id,
                    kind: rel.kind.as_str().to_string(),
                    properties: rel.properties,
                    origin: Some(rel.origin.as_str().to_string()),
                    file_path: rel.file_path,
                })
            })
            .collect();

        Self {
            metadata: ExportMetadata {
                project: project.to_string(),
                node_count: export_nodes.len(),
                relationship_count: export_relationships.len(),
                exported_at,
            },
            nodes: export_nodes,
            relationships: export_relationships,
        }
    }

    /// Converts the document back into storable rows, validating references.
    pub fn to_graph(&self) -> Result<(Vec<GraphNode>, Vec<GraphRelationship>)> {
        let mut refs: HashMap<u64, NodeRef> = HashMap::with_capacity(self.nodes.len());
        let mut nodes = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let label_name = node.labels.first().ok_or_else(|| {
                IndexError::InvalidDocument(format!("node {} has no label", node.id))
            })?;
            let label = NodeLabel::parse(label_name).ok_or_else(|| {
                IndexError::InvalidDocument(format!("node {}: unknown label {label_name}", node.id))
            })?;
            let key = node
                .properties
                .get(label.key_property())
                .and_then(|value| value.as_str())
                .ok_or_else(|| {
                    IndexError::InvalidDocument(format!(
                        "node {}: missing {} property",
                        node.id,
                        label.key_property()
                    ))
                })?;
            let node_ref = NodeRef::new(label, key);
            if refs.insert(node.id, node_ref.clone()).is_some() {
                return Err(IndexError::InvalidDocument(format!(
                    "duplicate node id {}",
                    node.id
                )));
            }
            nodes.push(GraphNode {
                node: node_ref,
                properties: node.properties.clone(),
                origin: parse_origin(node.origin.as_deref())?,
                file_path: node.file_path.clone(),
            });
        }

        let mut relationships = Vec::with_capacity(self.relationships.len());
        for rel in &self.relationships {
            let endpoint = |id: u64| {
                refs.get(&id).cloned().ok_or_else(|| {
                    IndexError::InvalidDocument(format!("relationship references unknown node {id}"))
                })
            };
            let kind = RelationshipKind::parse(&rel.kind).ok_or_else(|| {
                IndexError::InvalidDocument(format!("unknown relationship type {}", rel.kind))
            })?;
            relationships.push(GraphRelationship {
                source: endpoint(rel.source_id)?,
                kind,
                target: endpoint(rel.target_id)?,
                properties: rel.properties.clone(),
                origin: parse_origin(rel.origin.as_deref())?,
                file_path: rel.file_path.clone(),
            });
        }
        Ok((nodes, relationships))
    }

    /// Id-independent view for comparing two documents as sets.
    pub fn content(&self) -> (BTreeSet<String>, BTreeSet<String>) {
        let mut by_id: HashMap<u64, String> = HashMap::new();
        let nodes = self
            .nodes
            .iter()
            .map(|node| {
                let text = format!(
                    "{:?}|{}|{:?}|{:?}",
                    node.labels,
                    serde_json::Value::Object(node.properties.clone().into_iter().collect()),
                    node.origin,
                    node.file_path
                );
                by_id.insert(node.id, text.clone());
                text
            })
            .collect();
        let relationships = self
            .relationships
            .iter()
            .map(|rel| {
                format!(
                    "{}|{}|{}|{}|{:?}",
                    by_id.get(&rel.source_id).map(String::as_str).unwrap_or("?"),
                    rel.kind,
                    by_id.get(&rel.target_id).map(String::as_str).unwrap_or("?"),
                    serde_json::Value::Object(rel.properties.clone().into_iter().collect()),
                    rel.origin
                )
            })
            .collect();
        (nodes, relationships)
    }
}

fn parse_origin(origin: Option<&str>) -> Result<Origin> {
    match origin {
        None => Ok(Origin::Declaration),
        Some(text) => Origin::parse(text)
            .ok_or_else(|| IndexError::InvalidDocument(format!("unknown origin {text}"))),
    }
}
