//! Per-function local bindings: variable name to a best-effort type hint.

use crate::languages::{BindingRule, LanguageConfig, LoopRule};
use crate::parser::node_text;
use std::collections::BTreeMap;
use tree_sitter::Node;

/// What extraction learned about a variable's type. Calls and loops are
/// resolved against the symbol table later, one hop only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeHint {
    Declared(String),
    Call { callee: String },
    Iterates(String),
    Unknown,
}

impl TypeHint {
    pub fn is_unknown(&self) -> bool {
        matches!(self, TypeHint::Unknown)
    }
}

/// Flow-insensitive table. An informative hint is never replaced by `Unknown`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalBindings {
    vars: BTreeMap<String, TypeHint>,
}

impl LocalBindings {
    pub fn bind(&mut self, name: impl Into<String>, hint: TypeHint) {
        let name = name.into();
        match self.vars.get(&name) {
            Some(existing) if hint.is_unknown() && !existing.is_unknown() => {}
            _ => {
                self.vars.insert(name, hint);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&TypeHint> {
        self.vars.get(name)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TypeHint)> {
        self.vars.iter()
    }
}

/// Bindings introduced by a node matching a binding rule.
pub fn from_binding_rule(
    node: Node<'_>,
    rule: &BindingRule,
    config: &LanguageConfig,
    source: &str,
) -> Vec<(String, TypeHint)> {
    let name_node = match &rule.name_field {
        Some(field) => node.child_by_field_name(field),
        None => first_identifier_child(node),
    };
    let Some(name_node) = name_node else {
        return Vec::new();
    };
    let names = binding_names(name_node, config, source);
    if names.is_empty() {
        return Vec::new();
    }

    let declared = rule
        .type_field
        .as_deref()
        .and_then(|field| node.child_by_field_name(field))
        .or_else(|| {
            let field = rule.parent_type_field.as_deref()?;
            node.parent()?.child_by_field_name(field)
        })
        .and_then(|type_node| normalize_type(node_text(type_node, source)))
        .filter(|ty| !config.is_inferred_type(ty));

    let hint = match declared {
        Some(ty) => TypeHint::Declared(ty),
        None => rule
            .value_field
            .as_deref()
            .and_then(|field| node.child_by_field_name(field))
            .or_else(|| child_after_token(node, rule.value_after.as_deref()?))
            .map(|value| hint_from_value(value, config, source))
            .unwrap_or(TypeHint::Unknown),
    };

    let mut out = Vec::with_capacity(names.len());
    let mut names = names.into_iter();
    if let Some(first) = names.next() {
        out.push((first, hint));
    }
    out.extend(names.map(|name| (name, TypeHint::Unknown)));
    out
}

/// Bindings for the variable of an iteration construct.
pub fn from_loop_rule(
    node: Node<'_>,
    rule: &LoopRule,
    config: &LanguageConfig,
    source: &str,
) -> Vec<(String, TypeHint)> {
    let Some(var_node) = node.child_by_field_name(&rule.variable_field) else {
        return Vec::new();
    };
    let names = binding_names(var_node, config, source);
    if names.is_empty() {
        return Vec::new();
    }
    let declared = rule
        .type_field
        .as_deref()
        .and_then(|field| node.child_by_field_name(field))
        .and_then(|type_node| normalize_type(node_text(type_node, source)))
        .filter(|ty| !config.is_inferred_type(ty));
    let hint = match declared {
        Some(ty) => TypeHint::Declared(ty),
        None => match node.child_by_field_name(&rule.iterable_field) {
            Some(iterable) => TypeHint::Iterates(clean_expression(node_text(iterable, source))),
            None => TypeHint::Unknown,
        },
    };
    let mut out = Vec::new();
    let mut names = names.into_iter();
    if let Some(first) = names.next() {
        out.push((first, hint));
    }
    out.extend(names.map(|name| (name, TypeHint::Unknown)));
    out
}

fn hint_from_value(value: Node<'_>, config: &LanguageConfig, source: &str) -> TypeHint {
    let value = unwrap_single(value);
    let kind = value.kind();
    if config.is_constructor_call(kind) {
        return callee_text(value, config, source)
            .and_then(|callee| normalize_type(&callee))
            .map(TypeHint::Declared)
            .unwrap_or(TypeHint::Unknown);
    }
    if config.is_call(kind) {
        return match callee_text(value, config, source) {
            Some(callee) => TypeHint::Call { callee },
            None => TypeHint::Unknown,
        };
    }
    // Go composite literals and `&T{}`.
    if kind == "composite_literal" || kind == "unary_expression" {
        let literal = if kind == "unary_expression" {
            value.child_by_field_name("operand")
        } else {
            Some(value)
        };
        if let Some(ty) = literal
            .filter(|node| node.kind() == "composite_literal")
            .and_then(|node| node.child_by_field_name("type"))
            .and_then(|node| normalize_type(node_text(node, source)))
        {
            return TypeHint::Declared(ty);
        }
    }
    TypeHint::Unknown
}

/// Go wraps right-hand sides in expression lists; `await` wraps calls.
fn unwrap_single(node: Node<'_>) -> Node<'_> {
    match node.kind() {
        "expression_list" | "await_expression" | "parenthesized_expression" => {
            node.named_child(0).map(unwrap_single).unwrap_or(node)
        }
        _ => node,
    }
}

/// First named child following the anonymous `token` child.
fn child_after_token<'t>(node: Node<'t>, token: &str) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    node.children(&mut cursor)
        .skip_while(|child| child.is_named() || child.kind() != token)
        .skip(1)
        .find(|child| child.is_named())
}

pub fn callee_text(call: Node<'_>, config: &LanguageConfig, source: &str) -> Option<String> {
    let callee = config
        .callee_fields
        .iter()
        .find_map(|field| call.child_by_field_name(field))
        .map(|callee| clean_expression(node_text(callee, source)))
        .filter(|text| !text.is_empty())?;
    let object = config
        .callee_object_field
        .as_deref()
        .and_then(|field| call.child_by_field_name(field))
        .map(|object| clean_expression(node_text(object, source)))
        .filter(|text| !text.is_empty());
    Some(match object {
        Some(object) => format!("{object}.{callee}"),
        None => callee,
    })
}

fn first_identifier_child(node: Node<'_>) -> Option<Node<'_>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .find(|child| child.kind() == "identifier")
}

/// Names bound by a pattern: a plain identifier, a receiver attribute such as
/// `self.client`, or the identifiers of a flat list/tuple pattern.
fn binding_names(node: Node<'_>, config: &LanguageConfig, source: &str) -> Vec<String> {
    let kind = node.kind();
    if kind.ends_with("identifier") {
        return vec![node_text(node, source).to_string()];
    }
    // C++ `init_declarator`, `pointer_declarator`
    if kind.ends_with("declarator")
        && let Some(inner) = node.child_by_field_name("declarator")
    {
        return binding_names(inner, config, source);
    }
    if matches!(
        kind,
        "attribute"
            | "member_expression"
            | "field_expression"
            | "member_access_expression"
            | "field_access"
    ) {
        let text = clean_expression(node_text(node, source));
        let is_self_attr = text
            .split_once('.')
            .is_some_and(|(head, tail)| config.is_self_name(head) && is_identifier(tail));
        return if is_self_attr { vec![text] } else { Vec::new() };
    }
    let mut names = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind().ends_with("identifier") {
            names.push(node_text(child, source).to_string());
        } else if matches!(child.kind(), "mut_pattern" | "ref_pattern") {
            if let Some(inner) = first_identifier_child(child) {
                names.push(node_text(inner, source).to_string());
            }
        }
    }
    names
}

pub fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

/// Collapses whitespace and optional-chaining so expression text can be split.
pub fn clean_expression(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if !ch.is_whitespace() {
            out.push(ch);
        }
    }
    out.replace("?.", ".").replace("!.", ".")
}

/// Best-effort normalization of a type annotation to a nameable type.
pub fn normalize_type(text: &str) -> Option<String> {
    let mut ty = text.trim();
    ty = ty.trim_start_matches(':').trim_start_matches("->").trim();
    loop {
        let before = ty;
        for prefix in ["&", "*", "mut ", "ref ", "const ", "readonly ", "dyn ", "impl "] {
            ty = ty.trim_start_matches(prefix).trim_start();
        }
        if ty.starts_with('\'') {
            // lifetime: &'a T
            ty = ty.split_once(' ').map(|(_, rest)| rest).unwrap_or("");
        }
        if ty == before {
            break;
        }
    }
    let ty = ty.trim_end_matches(['?', '!', '&', '*']).trim();
    if let Some(inner) = strip_wrapper(ty, &["Optional[", "Option<"]) {
        return normalize_type(inner);
    }
    if let Some((first, rest)) = ty.split_once('|') {
        let first = first.trim();
        let pick = if matches!(first, "None" | "null" | "undefined") {
            rest.trim()
        } else {
            first
        };
        return normalize_type(pick);
    }
    if ty.is_empty() || ty == "None" || ty == "void" || ty == "()" {
        return None;
    }
    Some(ty.to_string())
}

fn strip_wrapper<'a>(ty: &'a str, prefixes: &[&str]) -> Option<&'a str> {
    for prefix in prefixes {
        if let Some(rest) = ty.strip_prefix(prefix) {
            return rest.strip_suffix([']', '>']);
        }
    }
    None
}

/// `pkg.Foo<T>` and `List[int]` become `Foo` and `List`.
pub fn base_type_name(ty: &str) -> String {
    let head = ty.split(['<', '[', '(', '{']).next().unwrap_or(ty);
    let head = head.trim_end_matches("[]");
    last_segment(head).to_string()
}

pub fn last_segment(path: &str) -> &str {
    path.rsplit(['.', ':']).next().unwrap_or(path)
}

/// Element type of a collection annotation: `list[Foo]`, `Vec<Foo>`, `Foo[]`.
pub fn element_type(ty: &str) -> Option<String> {
    let ty = ty.trim();
    if let Some(stripped) = ty.strip_suffix("[]") {
        return normalize_type(stripped);
    }
    let open = ty.find(['<', '['])?;
    let close = ty.rfind(['>', ']'])?;
    if close <= open + 1 {
        return None;
    }
    let inner = &ty[open + 1..close];
    let mut depth = 0usize;
    let mut end = inner.len();
    for (idx, ch) in inner.char_indices() {
        match ch {
            '<' | '[' | '(' => depth += 1,
            '>' | ']' | ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                end = idx;
                break;
            }
            _ => {}
        }
    }
    normalize_type(&inner[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_never_overwrites_known() {
        let mut bindings = LocalBindings::default();
        bindings.bind("client", TypeHint::Declared("Client".into()));
        bindings.bind("client", TypeHint::Unknown);
        assert_eq!(
            bindings.get("client"),
            Some(&TypeHint::Declared("Client".into()))
        );
        bindings.bind("client", TypeHint::Call {
            callee: "make_client".into(),
        });
        assert!(matches!(bindings.get("client"), Some(TypeHint::Call { .. })));
    }

    #[test]
    fn normalizes_common_annotation_shapes() {
        assert_eq!(normalize_type(": Foo").as_deref(), Some("Foo"));
        assert_eq!(normalize_type("&'a mut Foo").as_deref(), Some("Foo"));
        assert_eq!(normalize_type("*Server").as_deref(), Some("Server"));
        assert_eq!(normalize_type("Optional[Repo]").as_deref(), Some("Repo"));
        assert_eq!(normalize_type("Repo | None").as_deref(), Some("Repo"));
        assert_eq!(normalize_type("None"), None);
        assert_eq!(normalize_type("const Repo&").as_deref(), Some("Repo"));
        assert_eq!(base_type_name("pkg.models.User<T>"), "User");
        assert_eq!(base_type_name("std::vec::Vec<u8>"), "Vec");
    }

    #[test]
    fn element_type_of_collections() {
        assert_eq!(element_type("list[User]").as_deref(), Some("User"));
        assert_eq!(element_type("Vec<Box<Node>>").as_deref(), Some("Box<Node>"));
        assert_eq!(element_type("dict[str, User]").as_deref(), Some("str"));
        assert_eq!(element_type("User[]").as_deref(), Some("User"));
        assert_eq!(element_type("User"), None);
    }

    #[test]
    fn clean_expression_strips_whitespace_and_chaining() {
        assert_eq!(clean_expression("self\n    .repo?.save"), "self.repo.save");
        assert!(is_identifier("save_all"));
        assert!(!is_identifier("items[0]"));
    }
}
