//! Language registry: maps file extensions to data-driven grammar descriptions.
//!
//! Every language is described by sets of grammar node-type names plus a few
//! attachment rules. The extractor never branches on a language name, so adding
//! a language is a YAML change.

use crate::error::{IndexError, Result};
use crate::model::NodeLabel;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

const BUILTIN: &str = include_str!("builtin.yaml");

/// Top-level shape of a language configuration document.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct LanguageFile {
    pub languages: BTreeMap<String, LanguageConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct LanguageConfig {
    #[serde(skip)]
    pub name: String,
    /// Grammar identifier understood by the syntax tree provider.
    pub grammar: String,
    pub extensions: Vec<String>,
    pub module_node_types: Vec<String>,
    #[serde(default)]
    pub class_node_types: Vec<String>,
    pub function_node_types: Vec<String>,
    pub call_node_types: Vec<String>,
    #[serde(default)]
    pub import_node_types: Vec<String>,

    #[serde(default)]
    pub kind_rules: Vec<KindRule>,
    #[serde(default = "default_name_fields")]
    pub name_fields: Vec<String>,
    /// Parents whose `name` field names an otherwise anonymous function.
    #[serde(default)]
    pub assigned_name_parents: Vec<String>,
    #[serde(default = "default_callee_fields")]
    pub callee_fields: Vec<String>,
    /// Receiver of calls that keep it apart from the callee name (Java `object`).
    #[serde(default)]
    pub callee_object_field: Option<String>,
    /// Field followed down to the name of declarations without a name field
    /// (C++ `function_definition -> function_declarator -> identifier`).
    #[serde(default)]
    pub declarator_field: Option<String>,
    #[serde(default)]
    pub constructor_call_node_types: Vec<String>,
    #[serde(default)]
    pub constructor_names: Vec<String>,
    #[serde(default)]
    pub require_functions: Vec<String>,
    #[serde(default = "default_return_type_fields")]
    pub return_type_fields: Vec<String>,

    #[serde(default)]
    pub decorator_node_types: Vec<String>,
    /// Children holding modifiers and annotations of a declaration (Java `modifiers`).
    #[serde(default)]
    pub modifier_node_types: Vec<String>,
    /// Nodes that wrap a declaration (decorated definitions, export statements).
    #[serde(default)]
    pub wrapper_node_types: Vec<String>,
    #[serde(default)]
    pub comment_node_types: Vec<String>,
    #[serde(default)]
    pub docstring: DocstringStyle,
    #[serde(default)]
    pub export_rule: ExportRule,

    #[serde(default)]
    pub base_fields: Vec<String>,
    #[serde(default)]
    pub base_node_types: Vec<String>,
    #[serde(default)]
    pub implements_node_types: Vec<String>,
    #[serde(default)]
    pub impl_node_types: Vec<String>,
    /// Field holding the receiver of a method declared outside its type (Go).
    #[serde(default)]
    pub receiver_field: Option<String>,
    #[serde(default)]
    pub implicit_receiver: bool,
    /// Class-like nodes without a body are type references (C++ `struct stat st;`).
    #[serde(default)]
    pub class_body_required: bool,

    #[serde(default)]
    pub binding_rules: Vec<BindingRule>,
    #[serde(default)]
    pub loop_rules: Vec<LoopRule>,
    #[serde(default)]
    pub inferred_type_keywords: Vec<String>,
    #[serde(default)]
    pub self_names: Vec<String>,
    #[serde(default)]
    pub super_names: Vec<String>,

    #[serde(default)]
    pub import_style: ImportStyle,
    #[serde(default)]
    pub module_index_names: Vec<String>,
    #[serde(default)]
    pub package_indicators: Vec<String>,
}

/// Picks a declaration kind for a class-set node, optionally by inspecting a child.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct KindRule {
    pub node: String,
    pub kind: NodeLabel,
    #[serde(default)]
    pub when_field: Option<String>,
    #[serde(default)]
    pub when_child_kind: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct BindingRule {
    pub node: String,
    /// Defaults to the first named identifier child.
    #[serde(default)]
    pub name_field: Option<String>,
    #[serde(default)]
    pub type_field: Option<String>,
    /// Type taken from the parent's field (C# `Foo a = .., b = ..`).
    #[serde(default)]
    pub parent_type_field: Option<String>,
    #[serde(default)]
    pub value_field: Option<String>,
    /// Right-hand side is the first named child after this token, for grammars
    /// that give it no field (C# `variable_declarator`).
    #[serde(default)]
    pub value_after: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct LoopRule {
    pub node: String,
    pub variable_field: String,
    pub iterable_field: String,
    #[serde(default)]
    pub type_field: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DocstringStyle {
    /// First string statement of the body.
    BodyString,
    /// Contiguous comments directly above the declaration.
    LeadingComment,
    #[default]
    None,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExportRule {
    UnderscorePrivate,
    ExportWrapper,
    VisibilityModifier,
    Capitalized,
    PublicModifier,
    #[default]
    Always,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ImportStyle {
    Python,
    Javascript,
    Rust,
    Go,
    Csharp,
    Java,
    Cpp,
    Lua,
    #[default]
    None,
}

fn default_name_fields() -> Vec<String> {
    vec!["name".to_string()]
}

fn default_callee_fields() -> Vec<String> {
    vec!["function".to_string()]
}

fn default_return_type_fields() -> Vec<String> {
    vec!["return_type".to_string()]
}

fn contains(set: &[String], kind: &str) -> bool {
    set.iter().any(|item| item == kind)
}

impl LanguageConfig {
    pub fn is_module(&self, kind: &str) -> bool {
        contains(&self.module_node_types, kind)
    }

    pub fn is_class(&self, kind: &str) -> bool {
        contains(&self.class_node_types, kind)
    }

    pub fn is_function(&self, kind: &str) -> bool {
        contains(&self.function_node_types, kind)
    }

    pub fn is_call(&self, kind: &str) -> bool {
        contains(&self.call_node_types, kind)
    }

    pub fn is_import(&self, kind: &str) -> bool {
        contains(&self.import_node_types, kind)
    }

    pub fn is_impl(&self, kind: &str) -> bool {
        contains(&self.impl_node_types, kind)
    }

    pub fn is_decorator(&self, kind: &str) -> bool {
        contains(&self.decorator_node_types, kind)
    }

    pub fn is_modifier_holder(&self, kind: &str) -> bool {
        contains(&self.modifier_node_types, kind)
    }

    pub fn is_wrapper(&self, kind: &str) -> bool {
        contains(&self.wrapper_node_types, kind)
    }

    pub fn is_comment(&self, kind: &str) -> bool {
        contains(&self.comment_node_types, kind)
    }

    pub fn is_constructor_call(&self, kind: &str) -> bool {
        contains(&self.constructor_call_node_types, kind)
    }

    pub fn is_base_container(&self, kind: &str) -> bool {
        contains(&self.base_node_types, kind)
    }

    pub fn is_implements_clause(&self, kind: &str) -> bool {
        contains(&self.implements_node_types, kind)
    }

    pub fn is_self_name(&self, text: &str) -> bool {
        contains(&self.self_names, text)
    }

    pub fn is_super_name(&self, text: &str) -> bool {
        contains(&self.super_names, text)
    }

    pub fn is_inferred_type(&self, text: &str) -> bool {
        contains(&self.inferred_type_keywords, text)
    }

    pub fn is_constructor_name(&self, name: &str) -> bool {
        contains(&self.constructor_names, name)
    }

    pub fn is_require(&self, name: &str) -> bool {
        contains(&self.require_functions, name)
    }

    pub fn binding_rule(&self, kind: &str) -> Option<&BindingRule> {
        self.binding_rules.iter().find(|rule| rule.node == kind)
    }

    pub fn loop_rule(&self, kind: &str) -> Option<&LoopRule> {
        self.loop_rules.iter().find(|rule| rule.node == kind)
    }

    /// Every node-type name the configuration refers to, for grammar checks.
    pub fn referenced_node_types(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for set in [
            &self.module_node_types,
            &self.class_node_types,
            &self.function_node_types,
            &self.call_node_types,
            &self.import_node_types,
            &self.decorator_node_types,
            &self.modifier_node_types,
            &self.wrapper_node_types,
            &self.comment_node_types,
            &self.base_node_types,
            &self.implements_node_types,
            &self.impl_node_types,
            &self.constructor_call_node_types,
            &self.assigned_name_parents,
        ] {
            names.extend(set.iter().map(String::as_str));
        }
        names.extend(self.binding_rules.iter().map(|rule| rule.node.as_str()));
        names.extend(self.loop_rules.iter().map(|rule| rule.node.as_str()));
        names.sort_unstable();
        names.dedup();
        names
    }

    fn validate(&self) -> Result<()> {
        let lang = &self.name;
        let Some(grammar) = crate::parser::grammar(&self.grammar) else {
            return Err(IndexError::config(format!(
                "language {lang}: unknown grammar {:?} (available: {})",
                self.grammar,
                crate::parser::GRAMMARS.join(", ")
            )));
        };
        if self.extensions.is_empty() {
            return Err(IndexError::config(format!(
                "language {lang}: no file extensions"
            )));
        }
        for (field, set, required) in [
            ("module_node_types", &self.module_node_types, true),
            ("function_node_types", &self.function_node_types, true),
            ("call_node_types", &self.call_node_types, true),
            ("class_node_types", &self.class_node_types, false),
            ("import_node_types", &self.import_node_types, false),
        ] {
            if required && set.is_empty() {
                return Err(IndexError::config(format!(
                    "language {lang}: {field} must not be empty"
                )));
            }
            let mut seen = HashSet::new();
            for item in set {
                if item.trim().is_empty() || item.contains(char::is_whitespace) {
                    return Err(IndexError::config(format!(
                        "language {lang}: malformed entry {item:?} in {field}"
                    )));
                }
                if !seen.insert(item.as_str()) {
                    return Err(IndexError::config(format!(
                        "language {lang}: duplicate entry {item:?} in {field}"
                    )));
                }
            }
        }
        for rule in &self.kind_rules {
            if !self.is_class(&rule.node) {
                return Err(IndexError::config(format!(
                    "language {lang}: kind rule for {:?} which is not a class node type",
                    rule.node
                )));
            }
            if !rule.kind.is_class_like() {
                return Err(IndexError::config(format!(
                    "language {lang}: kind rule maps {:?} to {}, expected a class-like kind",
                    rule.node,
                    rule.kind.as_str()
                )));
            }
            if rule.when_field.is_some() != rule.when_child_kind.is_some() {
                return Err(IndexError::config(format!(
                    "language {lang}: kind rule for {:?} needs both when_field and when_child_kind",
                    rule.node
                )));
            }
        }
        if self.callee_fields.is_empty() {
            return Err(IndexError::config(format!(
                "language {lang}: callee_fields must not be empty"
            )));
        }
        let unknown = crate::parser::unknown_node_types(&grammar, self);
        if !unknown.is_empty() {
            return Err(IndexError::config(format!(
                "language {lang}: node types not defined by grammar {}: {}",
                self.grammar,
                unknown.join(", ")
            )));
        }
        Ok(())
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_ascii_lowercase()
}

#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    languages: Vec<Arc<LanguageConfig>>,
    by_extension: HashMap<String, usize>,
}

impl LanguageRegistry {
    /// The registry compiled into the binary.
    pub fn builtin() -> Result<Self> {
        Self::from_yaml_str(BUILTIN)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|err| IndexError::io(path, err))?;
        Self::from_yaml_str(&text).map_err(|err| match err {
            IndexError::Configuration(msg) => {
                IndexError::config(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    /// Uses `path` when given, otherwise the built-in configuration.
    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Self::builtin(),
        }
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let file: LanguageFile = serde_yaml_ng::from_str(text)
            .map_err(|err| IndexError::config(format!("invalid language configuration: {err}")))?;
        let configs = file
            .languages
            .into_iter()
            .map(|(name, mut config)| {
                config.name = name;
                config
            })
            .collect();
        Self::from_configs(configs)
    }

    pub fn from_configs(configs: Vec<LanguageConfig>) -> Result<Self> {
        if configs.is_empty() {
            return Err(IndexError::config("no languages configured"));
        }
        let mut languages = Vec::with_capacity(configs.len());
        let mut by_extension: HashMap<String, usize> = HashMap::new();
        for mut config in configs {
            config.validate()?;
            config.extensions = config
                .extensions
                .iter()
                .map(|ext| normalize_extension(ext))
                .collect();
            let idx = languages.len();
            for ext in &config.extensions {
                if ext.is_empty() {
                    return Err(IndexError::config(format!(
                        "language {}: empty file extension",
                        config.name
                    )));
                }
                if let Some(&other) = by_extension.get(ext) {
                    let other: &Arc<LanguageConfig> = &languages[other];
                    return Err(IndexError::config(format!(
                        "extension .{ext} claimed by both {} and {}",
                        other.name, config.name
                    )));
                }
                by_extension.insert(ext.clone(), idx);
            }
            languages.push(Arc::new(config));
        }
        Ok(Self {
            languages,
            by_extension,
        })
    }

    pub fn resolve(&self, extension: &str) -> Option<&Arc<LanguageConfig>> {
        let idx = self.by_extension.get(&normalize_extension(extension))?;
        self.languages.get(*idx)
    }

    pub fn for_path(&self, path: &Path) -> Option<&Arc<LanguageConfig>> {
        let ext = path.extension()?.to_str()?;
        self.resolve(ext)
    }

    pub fn by_name(&self, name: &str) -> Option<&Arc<LanguageConfig>> {
        self.languages.iter().find(|config| config.name == name)
    }

    pub fn languages(&self) -> impl Iterator<Item = &Arc<LanguageConfig>> {
        self.languages.iter()
    }

    /// File names that mark a directory as a package for any registered language.
    pub fn package_indicators(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .languages
            .iter()
            .flat_map(|config| config.package_indicators.iter().map(String::as_str))
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    pub fn json_schema() -> serde_json::Value {
        let schema = schemars::schema_for!(LanguageFile);
        serde_json::to_value(schema).unwrap_or(serde_json::Value::Null)
    }
}
