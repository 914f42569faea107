//! Dependency manifests: `requirements.txt`, `pyproject.toml`, `package.json`,
//! `Cargo.toml` and `go.mod`.

use crate::error::{IndexError, Result};
use crate::model::{GraphNode, GraphRelationship, NodeLabel, NodeRef, Origin, Properties, RelationshipKind};
use serde_json::json;

/// One external package declared by a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalDependency {
    pub name: String,
    pub version_spec: String,
    /// Optional dependency group (`[project.optional-dependencies]` key).
    pub group: Option<String>,
    pub dev: bool,
    /// Manifest path relative to the repository root.
    pub manifest: String,
}

impl ExternalDependency {
    fn new(name: &str, version_spec: &str, manifest: &str) -> Self {
        Self {
            name: name.to_string(),
            version_spec: version_spec.trim().to_string(),
            group: None,
            dev: false,
            manifest: manifest.to_string(),
        }
    }

    fn dev(mut self) -> Self {
        self.dev = true;
        self
    }

    fn in_group(mut self, group: &str) -> Self {
        self.group = Some(group.to_string());
        self
    }

    pub fn node(&self) -> GraphNode {
        let mut properties = Properties::new();
        properties.insert("name".to_string(), json!(self.name));
        GraphNode {
            node: NodeRef::new(NodeLabel::ExternalPackage, &self.name),
            properties,
            origin: Origin::Dependency,
            file_path: None,
        }
    }

    /// `DEPENDS_ON_EXTERNAL` edge from the project node.
    pub fn relationship(&self, project: &str) -> GraphRelationship {
        let mut rel = GraphRelationship::new(
            NodeRef::new(NodeLabel::Project, project),
            RelationshipKind::DependsOnExternal,
            NodeRef::new(NodeLabel::ExternalPackage, &self.name),
            Origin::Dependency,
        )
        .with_property("version_spec", json!(self.version_spec))
        .with_property("manifest", json!(self.manifest));
        if let Some(group) = &self.group {
            rel = rel.with_property("group", json!(group));
        }
        if self.dev {
            rel = rel.with_property("dev", json!(true));
        }
        rel
    }
}

/// Parses `text` according to the manifest's file name. Unknown names yield nothing.
pub fn parse_manifest(rel_path: &str, text: &str) -> Result<Vec<ExternalDependency>> {
    let file_name = rel_path.rsplit('/').next().unwrap_or(rel_path);
    match file_name {
        "requirements.txt" => Ok(parse_requirements(rel_path, text)),
        "pyproject.toml" => parse_pyproject(rel_path, text),
        "package.json" => parse_package_json(rel_path, text),
        "Cargo.toml" => parse_cargo_toml(rel_path, text),
        "go.mod" => Ok(parse_go_mod(rel_path, text)),
        _ => Ok(Vec::new()),
    }
}

fn manifest_error(rel_path: &str, reason: impl std::fmt::Display) -> IndexError {
    IndexError::Parse {
        path: rel_path.to_string(),
        language: "manifest".to_string(),
        reason: reason.to_string(),
    }
}

/// Splits a PEP 508 requirement into its name and the remaining spec, extras dropped.
fn split_requirement(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    let name_end = line
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')))
        .unwrap_or(line.len());
    if name_end == 0 {
        return None;
    }
    let (name, mut rest) = line.split_at(name_end);
    if rest.starts_with('[') {
        let close = rest.find(']')?;
        rest = &rest[close + 1..];
    }
    Some((name, rest.trim()))
}

fn parse_requirements(rel_path: &str, text: &str) -> Vec<ExternalDependency> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('-'))
        .filter_map(|line| {
            let line = line.split(" #").next().unwrap_or(line);
            let (name, spec) = split_requirement(line)?;
            Some(ExternalDependency::new(name, spec, rel_path))
        })
        .collect()
}

fn parse_pyproject(rel_path: &str, text: &str) -> Result<Vec<ExternalDependency>> {
    let value: toml::Value = toml::from_str(text).map_err(|err| manifest_error(rel_path, err))?;
    let mut deps = Vec::new();

    if let Some(poetry) = value
        .get("tool")
        .and_then(|tool| tool.get("poetry"))
        .and_then(|poetry| poetry.get("dependencies"))
        .and_then(|deps| deps.as_table())
    {
        for (name, spec) in poetry {
            if name.eq_ignore_ascii_case("python") {
                continue;
            }
            deps.push(ExternalDependency::new(name, &toml_spec(spec), rel_path));
        }
    }

    let project = value.get("project");
    if let Some(list) = project
        .and_then(|project| project.get("dependencies"))
        .and_then(|deps| deps.as_array())
    {
        for line in list.iter().filter_map(|item| item.as_str()) {
            if let Some((name, spec)) = split_requirement(line) {
                deps.push(ExternalDependency::new(name, spec, rel_path));
            }
        }
    }
    if let Some(groups) = project
        .and_then(|project| project.get("optional-dependencies"))
        .and_then(|groups| groups.as_table())
    {
        for (group, list) in groups {
            for line in list.as_array().into_iter().flatten().filter_map(|item| item.as_str()) {
                if let Some((name, spec)) = split_requirement(line) {
                    deps.push(ExternalDependency::new(name, spec, rel_path).in_group(group));
                }
            }
        }
    }
    Ok(deps)
}

fn parse_package_json(rel_path: &str, text: &str) -> Result<Vec<ExternalDependency>> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|err| manifest_error(rel_path, err))?;
    let mut deps = Vec::new();
    for (section, dev) in [
        ("dependencies", false),
        ("devDependencies", true),
        ("peerDependencies", false),
    ] {
        let Some(table) = value.get(section).and_then(|table| table.as_object()) else {
            continue;
        };
        for (name, spec) in table {
            let spec = spec.as_str().unwrap_or_default();
            let dep = ExternalDependency::new(name, spec, rel_path);
            deps.push(if dev { dep.dev() } else { dep });
        }
    }
    Ok(deps)
}

fn parse_cargo_toml(rel_path: &str, text: &str) -> Result<Vec<ExternalDependency>> {
    let value: toml::Value = toml::from_str(text).map_err(|err| manifest_error(rel_path, err))?;
    let mut deps = Vec::new();
    for (section, dev) in [("dependencies", false), ("dev-dependencies", true)] {
        let Some(table) = value.get(section).and_then(|table| table.as_table()) else {
            continue;
        };
        for (name, spec) in table {
            let dep = ExternalDependency::new(name, &toml_spec(spec), rel_path);
            deps.push(if dev { dep.dev() } else { dep });
        }
    }
    Ok(deps)
}

/// Handles both `"1.0"` and `{ version = "1.0", ... }` forms.
fn toml_spec(value: &toml::Value) -> String {
    match value {
        toml::Value::String(spec) => spec.clone(),
        toml::Value::Table(table) => table
            .get("version")
            .and_then(|version| version.as_str())
            .unwrap_or_default()
            .to_string(),
        other => other.to_string(),
    }
}

fn parse_go_mod(rel_path: &str, text: &str) -> Vec<ExternalDependency> {
    let mut deps = Vec::new();
    let mut in_block = false;
    for line in text.lines().map(str::trim) {
        if line.starts_with("require (") || line == "require(" {
            in_block = true;
            continue;
        }
        if in_block && line == ")" {
            in_block = false;
            continue;
        }
        let entry = if in_block {
            line
        } else if let Some(rest) = line.strip_prefix("require ") {
            rest.trim()
        } else {
            continue;
        };
        if entry.is_empty() || entry.starts_with("//") {
            continue;
        }
        let mut parts = entry.split_whitespace();
        if let (Some(name), Some(version)) = (parts.next(), parts.next())
            && !version.starts_with("//")
        {
            deps.push(ExternalDependency::new(name, version, rel_path));
        }
    }
    deps
}
