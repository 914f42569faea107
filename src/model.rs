use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;

pub type Properties = BTreeMap<String, Value>;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
pub enum NodeLabel {
    Project,
    Package,
    Folder,
    File,
    Module,
    Class,
    Function,
    Method,
    Interface,
    Enum,
    TypeAlias,
    ExternalPackage,
}

impl NodeLabel {
    pub const ALL: [NodeLabel; 12] = [
        NodeLabel::Project,
        NodeLabel::Package,
        NodeLabel::Folder,
        NodeLabel::File,
        NodeLabel::Module,
        NodeLabel::Class,
        NodeLabel::Function,
        NodeLabel::Method,
        NodeLabel::Interface,
        NodeLabel::Enum,
        NodeLabel::TypeAlias,
        NodeLabel::ExternalPackage,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NodeLabel::Project => "Project",
            NodeLabel::Package => "Package",
            NodeLabel::Folder => "Folder",
            NodeLabel::File => "File",
            NodeLabel::Module => "Module",
            NodeLabel::Class => "Class",
            NodeLabel::Function => "Function",
            NodeLabel::Method => "Method",
            NodeLabel::Interface => "Interface",
            NodeLabel::Enum => "Enum",
            NodeLabel::TypeAlias => "TypeAlias",
            NodeLabel::ExternalPackage => "ExternalPackage",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|label| label.as_str() == value)
    }

    /// Kinds that can own methods and appear as supertypes.
    pub fn is_class_like(self) -> bool {
        matches!(
            self,
            NodeLabel::Class | NodeLabel::Interface | NodeLabel::Enum | NodeLabel::TypeAlias
        )
    }

    pub fn is_callable(self) -> bool {
        matches!(self, NodeLabel::Function | NodeLabel::Method)
    }

    /// Property that carries the node's unique key.
    pub fn key_property(self) -> &'static str {
        match self {
            NodeLabel::File | NodeLabel::Folder => "path",
            NodeLabel::Project | NodeLabel::ExternalPackage => "name",
            _ => "qualified_name",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RelationshipKind {
    ContainsPackage,
    ContainsSubpackage,
    ContainsFolder,
    ContainsFile,
    ContainsModule,
    Defines,
    DefinesMethod,
    Imports,
    Inherits,
    Implements,
    Overrides,
    Calls,
    DependsOnExternal,
}

impl RelationshipKind {
    pub const ALL: [RelationshipKind; 13] = [
        RelationshipKind::ContainsPackage,
        RelationshipKind::ContainsSubpackage,
        RelationshipKind::ContainsFolder,
        RelationshipKind::ContainsFile,
        RelationshipKind::ContainsModule,
        RelationshipKind::Defines,
        RelationshipKind::DefinesMethod,
        RelationshipKind::Imports,
        RelationshipKind::Inherits,
        RelationshipKind::Implements,
        RelationshipKind::Overrides,
        RelationshipKind::Calls,
        RelationshipKind::DependsOnExternal,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RelationshipKind::ContainsPackage => "CONTAINS_PACKAGE",
            RelationshipKind::ContainsSubpackage => "CONTAINS_SUBPACKAGE",
            RelationshipKind::ContainsFolder => "CONTAINS_FOLDER",
            RelationshipKind::ContainsFile => "CONTAINS_FILE",
            RelationshipKind::ContainsModule => "CONTAINS_MODULE",
            RelationshipKind::Defines => "DEFINES",
            RelationshipKind::DefinesMethod => "DEFINES_METHOD",
            RelationshipKind::Imports => "IMPORTS",
            RelationshipKind::Inherits => "INHERITS",
            RelationshipKind::Implements => "IMPLEMENTS",
            RelationshipKind::Overrides => "OVERRIDES",
            RelationshipKind::Calls => "CALLS",
            RelationshipKind::DependsOnExternal => "DEPENDS_ON_EXTERNAL",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }
}

/// Which phase produced a stored row. Incremental updates replace rows by origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Origin {
    Project,
    Structure,
    Declaration,
    Dependency,
    Resolution,
}

impl Origin {
    pub fn as_str(self) -> &'static str {
        match self {
            Origin::Project => "project",
            Origin::Structure => "structure",
            Origin::Declaration => "declaration",
            Origin::Dependency => "dependency",
            Origin::Resolution => "resolution",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "project" => Some(Origin::Project),
            "structure" => Some(Origin::Structure),
            "declaration" => Some(Origin::Declaration),
            "dependency" => Some(Origin::Dependency),
            "resolution" => Some(Origin::Resolution),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Declaration {
    pub kind: NodeLabel,
    pub qualified_name: String,
    pub name: String,
    pub path: String,
    pub language: Option<String>,
    pub start_line: u32,
    pub end_line: u32,
    pub decorators: Vec<String>,
    pub docstring: Option<String>,
    pub is_exported: bool,
    pub signature: Option<String>,
    pub return_type: Option<String>,
    /// Qualified name of the enclosing module or class.
    pub parent: Option<String>,
}

impl Declaration {
    pub fn new(kind: NodeLabel, qualified_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            qualified_name: qualified_name.into(),
            name: name.into(),
            path: String::new(),
            language: None,
            start_line: 0,
            end_line: 0,
            decorators: Vec::new(),
            docstring: None,
            is_exported: false,
            signature: None,
            return_type: None,
            parent: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn key(&self) -> &str {
        match self.kind {
            NodeLabel::File | NodeLabel::Folder => &self.path,
            _ => &self.qualified_name,
        }
    }

    pub fn node_ref(&self) -> NodeRef {
        NodeRef::new(self.kind, self.key())
    }

    pub fn properties(&self) -> Properties {
        let mut props = Properties::new();
        props.insert("name".to_string(), json!(self.name));
        props.insert("qualified_name".to_string(), json!(self.qualified_name));
        if !self.path.is_empty() {
            props.insert("path".to_string(), json!(self.path));
        }
        if let Some(language) = &self.language {
            props.insert("language".to_string(), json!(language));
        }
        if self.start_line > 0 {
            props.insert("start_line".to_string(), json!(self.start_line));
            props.insert("end_line".to_string(), json!(self.end_line));
        }
        if !self.decorators.is_empty() {
            props.insert("decorators".to_string(), json!(self.decorators));
        }
        if let Some(doc) = &self.docstring {
            props.insert("docstring".to_string(), json!(doc));
        }
        if let Some(signature) = &self.signature {
            props.insert("signature".to_string(), json!(signature));
        }
        if let Some(ret) = &self.return_type {
            props.insert("return_type".to_string(), json!(ret));
        }
        if matches!(
            self.kind,
            NodeLabel::Class
                | NodeLabel::Function
                | NodeLabel::Method
                | NodeLabel::Interface
                | NodeLabel::Enum
                | NodeLabel::TypeAlias
        ) {
            props.insert("is_exported".to_string(), json!(self.is_exported));
        }
        props
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeRef {
    pub label: NodeLabel,
    pub key: String,
}

impl NodeRef {
    pub fn new(label: NodeLabel, key: impl Into<String>) -> Self {
        Self {
            label,
            key: key.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    pub node: NodeRef,
    pub properties: Properties,
    pub origin: Origin,
    /// File whose extraction produced the node, for `Origin::Declaration`.
    pub file_path: Option<String>,
}

impl GraphNode {
    pub fn from_declaration(decl: &Declaration, origin: Origin) -> Self {
        let file_path = match origin {
            Origin::Declaration => Some(decl.path.clone()),
            _ => None,
        };
        Self {
            node: decl.node_ref(),
            properties: decl.properties(),
            origin,
            file_path,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphRelationship {
    pub source: NodeRef,
    pub kind: RelationshipKind,
    pub target: NodeRef,
    pub properties: Properties,
    pub origin: Origin,
    pub file_path: Option<String>,
}

impl GraphRelationship {
    pub fn new(source: NodeRef, kind: RelationshipKind, target: NodeRef, origin: Origin) -> Self {
        Self {
            source,
            kind,
            target,
            properties: Properties::new(),
            origin,
            file_path: None,
        }
    }

    pub fn in_file(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn with_property(mut self, key: &str, value: Value) -> Self {
        self.properties.insert(key.to_string(), value);
        self
    }

    /// Deduplication identity: (source, type, target).
    pub fn identity(&self) -> (NodeRef, RelationshipKind, NodeRef) {
        (self.source.clone(), self.kind, self.target.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub path: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub project: String,
    pub files_processed: usize,
    pub files_skipped: Vec<SkippedFile>,
    pub declarations: usize,
    pub relationships: usize,
    pub calls_resolved: usize,
    pub calls_unresolved: usize,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub unresolved_by_file: BTreeMap<String, usize>,
    pub extraction_errors: usize,
    pub name_collisions: usize,
    pub dangling_relationships: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct GraphStats {
    pub nodes: BTreeMap<String, i64>,
    pub relationships: BTreeMap<String, i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_and_kinds_round_trip_through_strings() {
        for label in NodeLabel::ALL {
            assert_eq!(NodeLabel::parse(label.as_str()), Some(label));
        }
        for kind in RelationshipKind::ALL {
            assert_eq!(RelationshipKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(NodeLabel::parse("Struct"), None);
    }

    #[test]
    fn file_nodes_are_keyed_by_path() {
        let file = Declaration::new(NodeLabel::File, "proj.src.a", "a.py").with_path("src/a.py");
        assert_eq!(file.key(), "src/a.py");
        let func = Declaration::new(NodeLabel::Function, "proj.src.a.helper", "helper")
            .with_path("src/a.py");
        assert_eq!(func.key(), "proj.src.a.helper");
        assert_eq!(
            func.properties().get("is_exported"),
            Some(&Value::Bool(false))
        );
    }
}
