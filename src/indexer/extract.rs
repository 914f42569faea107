//! Declaration extraction: one language-agnostic walk over a syntax tree.

use crate::error::IndexError;
use crate::indexer::bindings::{
    self, LocalBindings, TypeHint, base_type_name, callee_text, clean_expression, is_identifier,
};
use crate::indexer::imports::{self, ImportContext, ImportRef};
use crate::languages::{DocstringStyle, ExportRule, LanguageConfig};
use crate::model::{Declaration, NodeLabel, RelationshipKind};
use crate::parser::{SyntaxTree, line_span, node_text};
use std::collections::{BTreeMap, HashMap};
use tree_sitter::Node;

/// A call expression inside a function body, before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    /// Qualified name of the enclosing function or method.
    pub caller: String,
    pub name: String,
    pub receiver: Option<String>,
    pub constructor: bool,
    pub line: u32,
}

/// A supertype expression attached to a class-like declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseRef {
    /// Qualified name of the subtype as written in this file.
    pub class_qn: String,
    pub base: String,
    pub implements: bool,
    pub line: u32,
}

/// Containment edge between two declarations of the same file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEdge {
    pub source: String,
    pub kind: RelationshipKind,
    pub target: String,
}

#[derive(Debug, Clone, Default)]
pub struct ExtractedFile {
    pub path: String,
    pub language: String,
    pub module_qn: String,
    pub declarations: Vec<Declaration>,
    pub edges: Vec<LocalEdge>,
    pub bases: Vec<BaseRef>,
    pub imports: Vec<ImportRef>,
    pub calls: Vec<CallSite>,
    /// Function or method qualified name to its local bindings.
    pub bindings: BTreeMap<String, LocalBindings>,
    /// Receiver attributes assigned anywhere in a class (`self.repo = Repo()`).
    pub attribute_bindings: BTreeMap<String, LocalBindings>,
    pub errors: Vec<String>,
    pub collisions: usize,
}

/// Qualified name of the module a file defines.
pub fn module_qn(project: &str, rel_path: &str, config: &LanguageConfig) -> String {
    let mut parts: Vec<&str> = vec![project];
    let segments: Vec<&str> = rel_path.split('/').filter(|s| !s.is_empty()).collect();
    if let Some((file, dirs)) = segments.split_last() {
        parts.extend(dirs.iter().copied());
        let stem = file.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(file);
        if !config.module_index_names.iter().any(|name| name == stem) {
            parts.push(stem);
        }
    }
    parts.join(".")
}

pub fn is_index_file(rel_path: &str, config: &LanguageConfig) -> bool {
    let file = rel_path.rsplit('/').next().unwrap_or(rel_path);
    let stem = file.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(file);
    config.module_index_names.iter().any(|name| name == stem)
}

pub fn extract(
    project: &str,
    rel_path: &str,
    tree: &SyntaxTree,
    config: &LanguageConfig,
) -> ExtractedFile {
    let module = module_qn(project, rel_path, config);
    let root = tree.root();
    let mut extractor = Extractor {
        config,
        source: tree.source(),
        project,
        rel_path,
        out: ExtractedFile {
            path: rel_path.to_string(),
            language: config.name.clone(),
            module_qn: module.clone(),
            ..Default::default()
        },
        scopes: Vec::new(),
        seen_names: HashMap::new(),
        is_index: is_index_file(rel_path, config),
    };

    let (start, end) = line_span(root);
    let mut module_decl = Declaration::new(
        NodeLabel::Module,
        module.clone(),
        module.rsplit('.').next().unwrap_or(&module),
    )
    .with_path(rel_path);
    module_decl.language = Some(config.name.clone());
    module_decl.start_line = start;
    module_decl.end_line = end;
    module_decl.is_exported = true;
    module_decl.docstring = extractor.module_docstring(root);
    extractor.out.declarations.push(module_decl);

    extractor.scopes.push(Scope {
        qn: module,
        kind: ScopeKind::Module,
        exported: true,
    });
    extractor.walk_children(root);
    extractor.out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeKind {
    Module,
    Class,
    /// A Rust `impl` block: methods attach to a type that may live elsewhere.
    Impl,
    Function,
}

#[derive(Debug, Clone)]
struct Scope {
    qn: String,
    kind: ScopeKind,
    exported: bool,
}

struct Extractor<'a> {
    config: &'a LanguageConfig,
    source: &'a str,
    project: &'a str,
    rel_path: &'a str,
    out: ExtractedFile,
    scopes: Vec<Scope>,
    seen_names: HashMap<String, usize>,
    is_index: bool,
}

impl<'a> Extractor<'a> {
    fn text(&self, node: Node<'_>) -> &'a str {
        node_text(node, self.source)
    }

    fn walk_children(&mut self, node: Node<'_>) {
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
        for child in children {
            self.walk(child);
        }
    }

    fn walk(&mut self, node: Node<'_>) {
        let kind = node.kind();
        let config = self.config;

        if config.is_import(kind) {
            self.record_import(node);
            let is_scope = config.is_module(kind) && node.child_by_field_name("body").is_some();
            if !is_scope {
                return;
            }
        }
        if config.is_module(kind) {
            self.visit_nested_module(node);
            return;
        }
        if config.is_impl(kind) {
            self.visit_impl(node);
            return;
        }
        if config.is_class(kind)
            && (!config.class_body_required || node.child_by_field_name("body").is_some())
        {
            self.visit_class(node);
            return;
        }
        if config.is_function(kind) {
            self.visit_function(node);
            return;
        }
        if config.is_call(kind) {
            self.record_call(node);
        }
        if let Some(rule) = config.binding_rule(kind) {
            let found = bindings::from_binding_rule(node, rule, config, self.source);
            self.record_bindings(found);
        }
        if let Some(rule) = config.loop_rule(kind) {
            let found = bindings::from_loop_rule(node, rule, config, self.source);
            self.record_bindings(found);
        }
        self.walk_children(node);
    }

    fn current(&self) -> &Scope {
        // The module scope is pushed before the walk starts and never popped.
        &self.scopes[self.scopes.len() - 1]
    }

    fn enclosing_function(&self) -> Option<&Scope> {
        self.scopes
            .iter()
            .rev()
            .find(|scope| scope.kind == ScopeKind::Function)
    }

    /// Nearest module or class scope: the declaring container.
    fn container(&self) -> &Scope {
        self.scopes
            .iter()
            .rev()
            .find(|scope| scope.kind != ScopeKind::Function)
            .unwrap_or(&self.scopes[0])
    }

    fn enclosing_class(&self) -> Option<&Scope> {
        self.scopes
            .iter()
            .rev()
            .find(|scope| matches!(scope.kind, ScopeKind::Class | ScopeKind::Impl))
    }

    /// Appends an ordinal suffix from the second occurrence of a name in one scope.
    fn unique_qn(&mut self, scope_qn: &str, name: &str) -> String {
        let qn = format!("{scope_qn}.{name}");
        let count = self.seen_names.entry(qn.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            qn
        } else {
            self.out.collisions += 1;
            tracing::debug!(path = %self.rel_path, name, "same-scope name collision");
            format!("{qn}#{count}")
        }
    }

    fn declaration_name(&self, node: Node<'_>) -> Option<String> {
        let named = self
            .config
            .name_fields
            .iter()
            .find_map(|field| node.child_by_field_name(field))
            .map(|name| clean_expression(self.text(name)));
        let declarator = || {
            let leaf = self.declarator_chain(node).pop()?;
            Some(clean_expression(self.text(leaf)))
        };
        let name = match named.or_else(declarator) {
            Some(name) => name,
            None => {
                let parent = node.parent()?;
                if !self
                    .config
                    .assigned_name_parents
                    .iter()
                    .any(|kind| kind == parent.kind())
                {
                    return None;
                }
                clean_expression(self.text(parent.child_by_field_name("name")?))
            }
        };
        // `function M.helper()` and `function obj:method()` name the last segment.
        let name = bindings::last_segment(&name).to_string();
        if name.is_empty() { None } else { Some(name) }
    }

    /// Nodes from the declarator field down to the declared name:
    /// `function_declarator -> qualified_identifier` for `Repo::save(..)`.
    fn declarator_chain<'t>(&self, node: Node<'t>) -> Vec<Node<'t>> {
        let mut chain = Vec::new();
        let Some(field) = self.config.declarator_field.as_deref() else {
            return chain;
        };
        let mut next = node.child_by_field_name(field);
        while let Some(current) = next {
            chain.push(current);
            if !current.kind().ends_with("declarator") {
                break;
            }
            next = current
                .child_by_field_name("declarator")
                .or_else(|| current.named_child(0));
        }
        chain
    }

    /// Owner type of an out-of-line definition such as `void Repo::save()`.
    fn declarator_owner(&self, node: Node<'_>) -> Option<String> {
        let leaf = self.declarator_chain(node).pop()?;
        let text = clean_expression(self.text(leaf));
        let (owner, _) = text.rsplit_once("::")?;
        let owner = base_type_name(owner);
        if owner.is_empty() { None } else { Some(owner) }
    }

    fn extraction_error(&mut self, node: Node<'_>, reason: &str) {
        let (start, end) = line_span(node);
        let err = IndexError::Extraction {
            path: self.rel_path.to_string(),
            span: format!("lines {start}-{end}"),
            reason: format!("{reason} ({})", node.kind()),
        };
        tracing::warn!(language = %self.config.name, "{err}");
        self.out.errors.push(err.to_string());
    }

    fn base_declaration(&self, kind: NodeLabel, qn: String, name: String, node: Node<'_>) -> Declaration {
        let (start, end) = line_span(node);
        let mut decl = Declaration::new(kind, qn, name).with_path(self.rel_path);
        decl.language = Some(self.config.name.clone());
        decl.start_line = start;
        decl.end_line = end;
        decl.decorators = self.decorators(node);
        decl.docstring = self.docstring(node);
        decl
    }

    fn visit_nested_module(&mut self, node: Node<'_>) {
        let Some(body) = node.child_by_field_name("body") else {
            return;
        };
        let Some(name) = self.declaration_name(node) else {
            self.walk_children(body);
            return;
        };
        let container = self.container().qn.clone();
        let qn = self.unique_qn(&container, &name);
        let mut decl = self.base_declaration(NodeLabel::Module, qn.clone(), name, node);
        decl.is_exported = self.is_exported(node, &decl.name);
        decl.parent = Some(container);
        self.out.declarations.push(decl);
        self.scopes.push(Scope {
            qn,
            kind: ScopeKind::Module,
            exported: true,
        });
        self.walk_children(body);
        self.scopes.pop();
    }

    fn visit_impl(&mut self, node: Node<'_>) {
        let Some(type_node) = node.child_by_field_name("type") else {
            self.walk_children(node);
            return;
        };
        let owner = base_type_name(self.text(type_node));
        let owner_qn = format!("{}.{owner}", self.container().qn);
        if let Some(trait_node) = node.child_by_field_name("trait") {
            self.out.bases.push(BaseRef {
                class_qn: owner_qn.clone(),
                base: clean_expression(self.text(trait_node)),
                implements: true,
                line: line_span(node).0,
            });
        }
        self.scopes.push(Scope {
            qn: owner_qn,
            kind: ScopeKind::Impl,
            exported: true,
        });
        match node.child_by_field_name("body") {
            Some(body) => self.walk_children(body),
            None => self.walk_children(node),
        }
        self.scopes.pop();
    }

    fn class_kind(&self, node: Node<'_>) -> NodeLabel {
        for rule in &self.config.kind_rules {
            if rule.node != node.kind() {
                continue;
            }
            match (&rule.when_field, &rule.when_child_kind) {
                (Some(field), Some(child_kind)) => {
                    if node
                        .child_by_field_name(field)
                        .is_some_and(|child| child.kind() == child_kind)
                    {
                        return rule.kind;
                    }
                }
                _ => return rule.kind,
            }
        }
        NodeLabel::Class
    }

    fn visit_class(&mut self, node: Node<'_>) {
        let Some(name) = self.declaration_name(node) else {
            self.extraction_error(node, "class-like declaration without a name");
            self.walk_children(node);
            return;
        };
        let kind = self.class_kind(node);
        let container = self.container().qn.clone();
        let qn = self.unique_qn(&container, &name);
        let mut decl = self.base_declaration(kind, qn.clone(), name, node);
        decl.is_exported = self.is_exported(node, &decl.name);
        decl.parent = Some(container.clone());
        let exported = decl.is_exported;
        self.out.declarations.push(decl);
        self.out.edges.push(LocalEdge {
            source: container,
            kind: RelationshipKind::Defines,
            target: qn.clone(),
        });
        self.collect_bases(node, &qn);

        self.scopes.push(Scope {
            qn,
            kind: ScopeKind::Class,
            exported,
        });
        match node.child_by_field_name("body") {
            Some(body) => self.walk_children(body),
            None => self.walk_children(node),
        }
        self.scopes.pop();
    }

    fn collect_bases(&mut self, node: Node<'_>, class_qn: &str) {
        let config = self.config;
        let mut containers = Vec::new();
        for field in &config.base_fields {
            if let Some(child) = node.child_by_field_name(field) {
                containers.push(child);
            }
        }
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if config.is_base_container(child.kind()) {
                containers.push(child);
            }
        }
        let mut found = Vec::new();
        for container in containers {
            let implements = config.is_implements_clause(container.kind());
            self.base_names(container, implements, &mut found);
        }
        for (base, implements, line) in found {
            self.out.bases.push(BaseRef {
                class_qn: class_qn.to_string(),
                base,
                implements,
                line,
            });
        }
    }

    fn base_names(&self, node: Node<'_>, implements: bool, out: &mut Vec<(String, bool, u32)>) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            let kind = child.kind();
            let implements = implements || self.config.is_implements_clause(kind);
            if matches!(kind, "keyword_argument" | "type_arguments" | "template_argument_list") {
                continue;
            }
            if kind.ends_with("identifier")
                || matches!(
                    kind,
                    "attribute"
                        | "member_expression"
                        | "scoped_type_identifier"
                        | "qualified_name"
                        | "nested_type_identifier"
                        | "generic_type"
                        | "generic_name"
                        | "qualified_type"
                        | "qualified_identifier"
                )
            {
                let text = clean_expression(self.text(child));
                let text = text.split(['<', '[', '(']).next().unwrap_or("").to_string();
                if !text.is_empty() {
                    out.push((text, implements, line_span(child).0));
                }
                continue;
            }
            self.base_names(child, implements, out);
        }
    }

    fn visit_function(&mut self, node: Node<'_>) {
        let Some(name) = self.declaration_name(node) else {
            // Anonymous functions are not declarations; their calls belong to the enclosing one.
            self.walk_children(node);
            return;
        };

        let receiver_owner = self
            .config
            .receiver_field
            .as_deref()
            .and_then(|field| node.child_by_field_name(field))
            .and_then(|receiver| self.receiver_type(receiver))
            .or_else(|| self.declarator_owner(node));

        let current_kind = self.current().kind;
        let (kind, container) = match receiver_owner {
            Some(owner) => (
                NodeLabel::Method,
                format!("{}.{owner}", self.container().qn),
            ),
            None if matches!(current_kind, ScopeKind::Class | ScopeKind::Impl) => {
                (NodeLabel::Method, self.current().qn.clone())
            }
            None => (NodeLabel::Function, self.current().qn.clone()),
        };
        let qn = self.unique_qn(&container, &name);
        let mut decl = self.base_declaration(kind, qn.clone(), name, node);
        decl.is_exported = self.is_exported(node, &decl.name);
        decl.signature = self.signature(node);
        decl.return_type = self
            .config
            .return_type_fields
            .iter()
            .find_map(|field| node.child_by_field_name(field))
            .and_then(|ret| bindings::normalize_type(self.text(ret)));
        // Nested functions are defined by the enclosing module or class.
        let definer = match kind {
            NodeLabel::Method => container.clone(),
            _ => self.container().qn.clone(),
        };
        decl.parent = Some(definer.clone());
        self.out.declarations.push(decl);
        self.out.edges.push(LocalEdge {
            source: definer,
            kind: match kind {
                NodeLabel::Method => RelationshipKind::DefinesMethod,
                _ => RelationshipKind::Defines,
            },
            target: qn.clone(),
        });

        self.out.bindings.entry(qn.clone()).or_default();
        self.scopes.push(Scope {
            qn,
            kind: ScopeKind::Function,
            exported: false,
        });
        // Parameters, body and nested declarations are all named children.
        self.walk_children(node);
        self.scopes.pop();
    }

    fn receiver_type(&self, receiver: Node<'_>) -> Option<String> {
        let mut cursor = receiver.walk();
        for param in receiver.named_children(&mut cursor) {
            if let Some(type_node) = param.child_by_field_name("type") {
                let ty = base_type_name(self.text(type_node).trim_start_matches(['*', '&']));
                if !ty.is_empty() {
                    return Some(ty);
                }
            }
        }
        None
    }

    fn signature(&self, node: Node<'_>) -> Option<String> {
        let params = node
            .child_by_field_name("parameters")
            .or_else(|| {
                self.declarator_chain(node)
                    .into_iter()
                    .find_map(|link| link.child_by_field_name("parameters"))
            })
            .map(|n| self.text(n).to_string())?;
        let ret = self
            .config
            .return_type_fields
            .iter()
            .find_map(|field| node.child_by_field_name(field))
            .map(|n| {
                self.text(n)
                    .trim_start_matches(':')
                    .trim_start_matches("->")
                    .trim()
                    .to_string()
            })
            .filter(|ret| !ret.is_empty());
        match ret {
            Some(ret) => Some(format!("{params} -> {ret}")),
            None => Some(params),
        }
    }

    fn record_bindings(&mut self, found: Vec<(String, TypeHint)>) {
        if found.is_empty() {
            return;
        }
        let Some(function) = self.enclosing_function().map(|scope| scope.qn.clone()) else {
            return;
        };
        let class = self.enclosing_class().map(|scope| scope.qn.clone());
        for (name, hint) in found {
            let is_attribute = name.contains('.');
            if is_attribute && let Some(class) = &class {
                self.out
                    .attribute_bindings
                    .entry(class.clone())
                    .or_default()
                    .bind(name.clone(), hint.clone());
            }
            self.out
                .bindings
                .entry(function.clone())
                .or_default()
                .bind(name, hint);
        }
    }

    fn record_call(&mut self, node: Node<'_>) {
        let config = self.config;
        let Some(callee) = callee_text(node, config, self.source) else {
            return;
        };
        let line = line_span(node).0;

        if config.is_require(&callee) {
            self.record_require(node, line);
            return;
        }
        let Some(caller) = self.enclosing_function().map(|scope| scope.qn.clone()) else {
            return;
        };
        let constructor = config.is_constructor_call(node.kind());
        let Some((receiver, name)) = split_callee(&callee, config) else {
            return;
        };
        let name = if constructor {
            base_type_name(&name)
        } else {
            name
        };
        if !is_identifier(&name) || (receiver.is_none() && config.is_super_name(&name)) {
            return;
        }
        self.out.calls.push(CallSite {
            caller,
            name,
            receiver,
            constructor,
            line,
        });
    }

    fn record_require(&mut self, node: Node<'_>, line: u32) {
        let Some(args) = node.child_by_field_name("arguments") else {
            return;
        };
        let Some(specifier) = first_string(args, self.source) else {
            return;
        };
        let alias = self.assigned_name(node);
        let ctx = self.import_context();
        if let Some(import) =
            imports::require_import(self.config.import_style, &specifier, alias, line, &ctx)
        {
            self.out.imports.push(import);
        }
    }

    /// Name of the variable a call result is assigned to, if any.
    fn assigned_name(&self, node: Node<'_>) -> Option<String> {
        let mut current = node.parent();
        for _ in 0..4 {
            let parent = current?;
            if matches!(
                parent.kind(),
                "variable_declarator" | "variable_declaration" | "assignment_statement"
            ) {
                return first_leaf_identifier(parent.named_child(0)?, self.source);
            }
            current = parent.parent();
        }
        None
    }

    fn import_context(&self) -> ImportContext<'_> {
        ImportContext {
            project: self.project,
            rel_path: self.rel_path,
            module_qn: &self.out.module_qn,
            is_index: self.is_index,
        }
    }

    fn record_import(&mut self, node: Node<'_>) {
        let found = {
            let ctx = self.import_context();
            imports::parse_import(self.config.import_style, node, self.source, &ctx)
        };
        self.out.imports.extend(found);
    }

    fn module_docstring(&self, root: Node<'_>) -> Option<String> {
        match self.config.docstring {
            DocstringStyle::BodyString => first_string_statement(root, self.source),
            DocstringStyle::LeadingComment | DocstringStyle::None => None,
        }
    }

    fn docstring(&self, node: Node<'_>) -> Option<String> {
        match self.config.docstring {
            DocstringStyle::BodyString => {
                let body = node.child_by_field_name("body")?;
                first_string_statement(body, self.source)
            }
            DocstringStyle::LeadingComment => self.leading_comment(node),
            DocstringStyle::None => None,
        }
    }

    fn leading_comment(&self, node: Node<'_>) -> Option<String> {
        let anchor = self.outermost_any(node);
        let mut lines: Vec<String> = Vec::new();
        let mut next_row = anchor.start_position().row;
        let mut sibling = anchor.prev_named_sibling();
        while let Some(prev) = sibling {
            let kind = prev.kind();
            if self.config.is_decorator(kind) {
                next_row = prev.start_position().row;
                sibling = prev.prev_named_sibling();
                continue;
            }
            if !self.config.is_comment(kind) || prev.end_position().row + 1 < next_row {
                break;
            }
            lines.push(clean_comment(self.text(prev)));
            next_row = prev.start_position().row;
            sibling = prev.prev_named_sibling();
        }
        lines.reverse();
        let joined = lines
            .into_iter()
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        if joined.is_empty() { None } else { Some(joined) }
    }

    /// The outermost node that starts the declaration: wrappers, assignments
    /// and single-line declaration groups such as Go's `type X struct{}`.
    fn outermost_any<'t>(&self, node: Node<'t>) -> Node<'t> {
        let config = self.config;
        let mut current = node;
        while let Some(parent) = current.parent() {
            let kind = parent.kind();
            if config.is_module(kind) || config.is_class(kind) || config.is_function(kind) {
                break;
            }
            let wraps = config.is_wrapper(kind)
                || config.assigned_name_parents.iter().any(|k| k == kind)
                || parent.start_position().row == current.start_position().row;
            if wraps {
                current = parent;
            } else {
                break;
            }
        }
        current
    }

    fn decorators(&self, node: Node<'_>) -> Vec<String> {
        let config = self.config;
        let mut found: Vec<Node<'_>> = Vec::new();
        let anchor = self.outermost_any(node);

        // Attributes written as preceding siblings.
        let mut preceding = Vec::new();
        let mut sibling = anchor.prev_named_sibling();
        while let Some(prev) = sibling {
            if config.is_decorator(prev.kind()) {
                preceding.push(prev);
            } else if !config.is_comment(prev.kind()) {
                break;
            }
            sibling = prev.prev_named_sibling();
        }
        preceding.reverse();
        found.extend(preceding);

        // Decorators held by a wrapper node, then by the declaration itself.
        let mut holders = Vec::new();
        let mut current = node;
        while let Some(parent) = current.parent() {
            if !config.is_wrapper(parent.kind()) {
                break;
            }
            holders.push(parent);
            current = parent;
        }
        holders.reverse();
        holders.push(node);
        for holder in holders {
            let mut cursor = holder.walk();
            for child in holder.named_children(&mut cursor) {
                if config.is_decorator(child.kind()) {
                    found.push(child);
                } else if config.is_modifier_holder(child.kind()) {
                    let mut inner = child.walk();
                    found.extend(
                        child
                            .named_children(&mut inner)
                            .filter(|modifier| config.is_decorator(modifier.kind())),
                    );
                }
            }
        }

        found
            .into_iter()
            .map(|dec| clean_decorator(self.text(dec)))
            .filter(|dec| !dec.is_empty())
            .collect()
    }

    fn is_exported(&self, node: Node<'_>, name: &str) -> bool {
        let nested_in_function = self.enclosing_function().is_some();
        match self.config.export_rule {
            ExportRule::Always => !nested_in_function,
            ExportRule::UnderscorePrivate => {
                let dunder = name.starts_with("__") && name.ends_with("__");
                !nested_in_function
                    && (dunder || !name.starts_with('_'))
                    && self.current().exported
            }
            ExportRule::Capitalized => name.chars().next().is_some_and(char::is_uppercase),
            ExportRule::ExportWrapper => {
                if nested_in_function {
                    return false;
                }
                if matches!(self.current().kind, ScopeKind::Class) {
                    return self.current().exported && !name.starts_with('#');
                }
                let mut current = node;
                for _ in 0..4 {
                    let Some(parent) = current.parent() else {
                        break;
                    };
                    if self.config.is_wrapper(parent.kind()) {
                        return true;
                    }
                    current = parent;
                }
                false
            }
            ExportRule::VisibilityModifier => {
                let mut cursor = node.walk();
                let has_pub = node
                    .children(&mut cursor)
                    .any(|child| child.kind() == "visibility_modifier");
                // Trait members are public whenever the trait is.
                has_pub || (self.current().kind == ScopeKind::Class && self.current().exported)
            }
            ExportRule::PublicModifier => {
                let mut cursor = node.walk();
                let has_public = node.children(&mut cursor).any(|child| {
                    if child.kind() == "modifier" {
                        return self.text(child).contains("public");
                    }
                    if !self.config.is_modifier_holder(child.kind()) {
                        return false;
                    }
                    let mut inner = child.walk();
                    child.children(&mut inner).any(|m| m.kind() == "public")
                });
                let in_interface = self.out.declarations.iter().any(|decl| {
                    decl.kind == NodeLabel::Interface && decl.qualified_name == self.current().qn
                });
                has_public || (in_interface && self.current().exported)
            }
        }
    }
}

/// Splits callee text into receiver and simple name on the last `.`, `::`, `:` or `->`.
pub fn split_callee(callee: &str, config: &LanguageConfig) -> Option<(Option<String>, String)> {
    let mut text = callee.trim();
    // Turbofish and trailing generic arguments: `parse::<T>`, `make<T>`.
    if text.ends_with('>')
        && let Some(open) = top_level_open_angle(text)
    {
        text = text[..open].trim_end_matches("::");
    }
    let bytes = text.as_bytes();
    let mut depth = 0i32;
    let mut split: Option<(usize, usize)> = None;
    let mut idx = 0;
    while idx < bytes.len() {
        match bytes[idx] {
            b'(' | b'[' | b'{' | b'<' => depth += 1,
            b')' | b']' | b'}' | b'>' if !(bytes[idx] == b'>' && idx > 0 && bytes[idx - 1] == b'-') => {
                depth -= 1
            }
            b'.' if depth == 0 => split = Some((idx, 1)),
            b':' if depth == 0 => {
                if idx + 1 < bytes.len() && bytes[idx + 1] == b':' {
                    split = Some((idx, 2));
                    idx += 1;
                } else {
                    split = Some((idx, 1));
                }
            }
            b'-' if depth == 0 && idx + 1 < bytes.len() && bytes[idx + 1] == b'>' => {
                split = Some((idx, 2));
                idx += 1;
            }
            _ => {}
        }
        idx += 1;
    }
    let (receiver, name) = match split {
        Some((at, len)) => (Some(text[..at].to_string()), text[at + len..].to_string()),
        None => (None, text.to_string()),
    };
    let receiver = receiver.map(|recv| {
        let trimmed = recv.trim_end_matches("()");
        if config.is_super_name(trimmed) {
            trimmed.to_string()
        } else {
            recv
        }
    });
    if name.is_empty() {
        return None;
    }
    Some((receiver.filter(|r| !r.is_empty()), name))
}

fn top_level_open_angle(text: &str) -> Option<usize> {
    let mut depth = 0i32;
    for (idx, ch) in text.char_indices().rev() {
        match ch {
            '>' => depth += 1,
            '<' => {
                depth -= 1;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}

fn first_string_statement(body: Node<'_>, source: &str) -> Option<String> {
    let first = body.named_child(0)?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let expr = first.named_child(0)?;
    if expr.kind() != "string" {
        return None;
    }
    let raw = node_text(expr, source);
    let raw = raw.trim_start_matches(['r', 'R', 'b', 'B', 'u', 'U', 'f', 'F']);
    let doc = imports::unquote(raw);
    let doc = doc.trim();
    if doc.is_empty() {
        None
    } else {
        Some(doc.to_string())
    }
}

fn first_string(node: Node<'_>, source: &str) -> Option<String> {
    let kind = node.kind();
    if kind == "string" || kind == "string_literal" || kind == "template_string" {
        let value = imports::unquote(node_text(node, source));
        return Some(value.trim_start_matches("[[").trim_end_matches("]]").to_string());
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if let Some(found) = first_string(child, source) {
            return Some(found);
        }
    }
    None
}

fn first_leaf_identifier(node: Node<'_>, source: &str) -> Option<String> {
    if node.kind() == "identifier" {
        return Some(node_text(node, source).to_string());
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if let Some(found) = first_leaf_identifier(child, source) {
            return Some(found);
        }
    }
    None
}

fn clean_comment(text: &str) -> String {
    text.lines()
        .map(|line| {
            let line = line.trim();
            let line = line
                .trim_start_matches("/**")
                .trim_start_matches("/*")
                .trim_start_matches("///")
                .trim_start_matches("//!")
                .trim_start_matches("//")
                .trim_start_matches("--")
                .trim_start_matches('#')
                .trim_end_matches("*/");
            line.trim_start_matches('*').trim().to_string()
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn clean_decorator(text: &str) -> String {
    let text = text.trim();
    let text = if let Some(inner) = text.strip_prefix("#[").or_else(|| text.strip_prefix("#![")) {
        inner.strip_suffix(']').unwrap_or(inner)
    } else if let Some(inner) = text.strip_prefix('[') {
        inner.strip_suffix(']').unwrap_or(inner)
    } else {
        text.strip_prefix('@').unwrap_or(text)
    };
    text.trim().to_string()
}
