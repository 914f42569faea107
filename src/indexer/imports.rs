//! Import statements, normalized to dotted module paths.

use crate::languages::ImportStyle;
use crate::parser::{line_span, node_text};
use tree_sitter::Node;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedMember {
    pub name: String,
    pub alias: Option<String>,
}

impl ImportedMember {
    pub fn local_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportRef {
    /// Dotted module path. Project-qualified when `anchored`.
    pub module: String,
    pub anchored: bool,
    /// Local name bound to the module itself (`import a.b`, `import * as ns`).
    pub alias: Option<String>,
    pub members: Vec<ImportedMember>,
    pub wildcard: bool,
    /// Go imports name a directory; every module in it is imported.
    pub directory: bool,
    pub line: u32,
}

impl ImportRef {
    fn new(module: impl Into<String>, anchored: bool, line: u32) -> Self {
        Self {
            module: module.into(),
            anchored,
            alias: None,
            members: Vec::new(),
            wildcard: false,
            directory: false,
            line,
        }
    }
}

/// Where the importing file sits, needed to anchor relative imports.
pub struct ImportContext<'a> {
    pub project: &'a str,
    pub rel_path: &'a str,
    pub module_qn: &'a str,
    /// True when the file is its directory's index module (`__init__.py`, `mod.rs`).
    pub is_index: bool,
}

impl ImportContext<'_> {
    /// Qualified name of the directory holding the file.
    fn package_qn(&self) -> String {
        if self.is_index {
            self.module_qn.to_string()
        } else {
            parent_qn(self.module_qn)
                .unwrap_or(self.project)
                .to_string()
        }
    }
}

fn parent_qn(qn: &str) -> Option<&str> {
    qn.rsplit_once('.').map(|(parent, _)| parent)
}

pub fn parse_import(
    style: ImportStyle,
    node: Node<'_>,
    source: &str,
    ctx: &ImportContext<'_>,
) -> Vec<ImportRef> {
    match style {
        ImportStyle::Python => parse_python(node, source, ctx),
        ImportStyle::Javascript => parse_javascript(node, source, ctx),
        ImportStyle::Rust => parse_rust(node, source, ctx),
        ImportStyle::Go => parse_go(node, source),
        ImportStyle::Csharp => parse_csharp(node, source),
        ImportStyle::Java => parse_java(node, source),
        ImportStyle::Cpp => parse_cpp(node, source, ctx),
        ImportStyle::Lua | ImportStyle::None => Vec::new(),
    }
}

/// `require("x")` style imports, bound to `alias` when assigned.
pub fn require_import(
    style: ImportStyle,
    specifier: &str,
    alias: Option<String>,
    line: u32,
    ctx: &ImportContext<'_>,
) -> Option<ImportRef> {
    let mut import = match style {
        ImportStyle::Javascript => js_module_ref(specifier, ctx, line)?,
        ImportStyle::Lua => ImportRef::new(specifier.replace('/', "."), false, line),
        _ => return None,
    };
    import.alias = alias;
    Some(import)
}

fn line_of(node: Node<'_>) -> u32 {
    line_span(node).0
}

fn parse_python(node: Node<'_>, source: &str, ctx: &ImportContext<'_>) -> Vec<ImportRef> {
    let line = line_of(node);
    let mut out = Vec::new();
    match node.kind() {
        "import_statement" => {
            let mut cursor = node.walk();
            for child in node.children_by_field_name("name", &mut cursor) {
                let (module, alias) = python_name_and_alias(child, source);
                if module.is_empty() {
                    continue;
                }
                let mut import = ImportRef::new(module.clone(), false, line);
                import.alias = Some(alias.unwrap_or(module));
                out.push(import);
            }
        }
        "import_from_statement" => {
            let Some(module_node) = node.child_by_field_name("module_name") else {
                return out;
            };
            let (module, anchored) = if module_node.kind() == "relative_import" {
                let text = node_text(module_node, source);
                let dots = text.chars().take_while(|c| *c == '.').count();
                let rest = text[dots..].trim();
                let mut base = ctx.package_qn();
                for _ in 1..dots {
                    base = parent_qn(&base).unwrap_or(ctx.project).to_string();
                }
                let module = if rest.is_empty() {
                    base
                } else {
                    format!("{base}.{rest}")
                };
                (module, true)
            } else {
                (node_text(module_node, source).to_string(), false)
            };
            let mut import = ImportRef::new(module, anchored, line);
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                if child.kind() == "wildcard_import" {
                    import.wildcard = true;
                }
            }
            let mut cursor = node.walk();
            for child in node.children_by_field_name("name", &mut cursor) {
                let (name, alias) = python_name_and_alias(child, source);
                if !name.is_empty() {
                    import.members.push(ImportedMember { name, alias });
                }
            }
            out.push(import);
        }
        _ => {}
    }
    out
}

fn python_name_and_alias(node: Node<'_>, source: &str) -> (String, Option<String>) {
    if node.kind() == "aliased_import" {
        let name = node
            .child_by_field_name("name")
            .map(|n| node_text(n, source).to_string())
            .unwrap_or_default();
        let alias = node
            .child_by_field_name("alias")
            .map(|n| node_text(n, source).to_string());
        (name, alias)
    } else {
        (node_text(node, source).to_string(), None)
    }
}

fn parse_javascript(node: Node<'_>, source: &str, ctx: &ImportContext<'_>) -> Vec<ImportRef> {
    let line = line_of(node);
    let Some(source_node) = node.child_by_field_name("source") else {
        return Vec::new();
    };
    let specifier = unquote(node_text(source_node, source));
    let Some(mut import) = js_module_ref(&specifier, ctx, line) else {
        return Vec::new();
    };
    let mut cursor = node.walk();
    for clause in node.named_children(&mut cursor) {
        if clause.kind() != "import_clause" {
            continue;
        }
        let mut inner = clause.walk();
        for part in clause.named_children(&mut inner) {
            match part.kind() {
                "identifier" => import.alias = Some(node_text(part, source).to_string()),
                "namespace_import" => {
                    let mut ns_cursor = part.walk();
                    if let Some(ident) = part
                        .named_children(&mut ns_cursor)
                        .find(|n| n.kind() == "identifier")
                    {
                        import.alias = Some(node_text(ident, source).to_string());
                    }
                }
                "named_imports" => {
                    let mut spec_cursor = part.walk();
                    for spec in part.named_children(&mut spec_cursor) {
                        if spec.kind() != "import_specifier" {
                            continue;
                        }
                        let Some(name) = spec.child_by_field_name("name") else {
                            continue;
                        };
                        import.members.push(ImportedMember {
                            name: unquote(node_text(name, source)),
                            alias: spec
                                .child_by_field_name("alias")
                                .map(|n| node_text(n, source).to_string()),
                        });
                    }
                }
                _ => {}
            }
        }
    }
    vec![import]
}

const JS_EXTENSIONS: &[&str] = &[".js", ".jsx", ".ts", ".tsx", ".mjs", ".cjs", ".mts", ".cts"];

fn js_module_ref(specifier: &str, ctx: &ImportContext<'_>, line: u32) -> Option<ImportRef> {
    let mut spec = specifier.trim();
    for ext in JS_EXTENSIONS {
        if let Some(stripped) = spec.strip_suffix(ext) {
            spec = stripped;
            break;
        }
    }
    if spec.is_empty() {
        return None;
    }
    if spec.starts_with('.') {
        let mut parts: Vec<String> = ctx.package_qn().split('.').map(str::to_string).collect();
        for segment in spec.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    if parts.len() > 1 {
                        parts.pop();
                    }
                }
                other => parts.push(other.to_string()),
            }
        }
        if parts.last().is_some_and(|last| last == "index") && parts.len() > 1 {
            parts.pop();
        }
        return Some(ImportRef::new(parts.join("."), true, line));
    }
    let spec = spec.trim_start_matches("@/").trim_start_matches("~/");
    let module = spec
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join(".");
    Some(ImportRef::new(module, false, line))
}

fn parse_rust(node: Node<'_>, source: &str, ctx: &ImportContext<'_>) -> Vec<ImportRef> {
    let line = line_of(node);
    if node.kind() == "mod_item" {
        // `mod foo;` declares a child module file; inline modules are scopes.
        if node.child_by_field_name("body").is_some() {
            return Vec::new();
        }
        let Some(name) = node.child_by_field_name("name") else {
            return Vec::new();
        };
        let stem = ctx
            .rel_path
            .rsplit('/')
            .next()
            .and_then(|file| file.strip_suffix(".rs"))
            .unwrap_or("");
        let base = if matches!(stem, "lib" | "main" | "mod") {
            ctx.package_qn()
        } else {
            ctx.module_qn.to_string()
        };
        return vec![ImportRef::new(
            format!("{base}.{}", node_text(name, source)),
            true,
            line,
        )];
    }
    let Some(argument) = node.child_by_field_name("argument") else {
        return Vec::new();
    };
    let mut paths = Vec::new();
    collect_use_paths(argument, source, &[], &mut paths);

    let mut out = Vec::new();
    for path in paths {
        if path.segments.is_empty() {
            continue;
        }
        let Some((module_segments, anchored)) = anchor_rust_path(&path.segments, ctx) else {
            continue;
        };
        if path.wildcard {
            let mut import = ImportRef::new(module_segments.join("."), anchored, line);
            import.wildcard = true;
            out.push(import);
            continue;
        }
        let Some((last, parent)) = module_segments.split_last() else {
            continue;
        };
        if parent.is_empty() {
            continue;
        }
        let mut import = ImportRef::new(parent.join("."), anchored, line);
        import.members.push(ImportedMember {
            name: last.clone(),
            alias: path.alias,
        });
        out.push(import);
    }
    out
}

struct UsePath {
    segments: Vec<String>,
    alias: Option<String>,
    wildcard: bool,
}

fn split_rust_path(text: &str) -> Vec<String> {
    text.split("::")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn collect_use_paths(node: Node<'_>, source: &str, prefix: &[String], out: &mut Vec<UsePath>) {
    let with_prefix = |text: &str| {
        let mut segments = prefix.to_vec();
        segments.extend(split_rust_path(text));
        segments
    };
    match node.kind() {
        "use_as_clause" => {
            let path = node
                .child_by_field_name("path")
                .map(|n| node_text(n, source))
                .unwrap_or("");
            out.push(UsePath {
                segments: with_prefix(path),
                alias: node
                    .child_by_field_name("alias")
                    .map(|n| node_text(n, source).to_string()),
                wildcard: false,
            });
        }
        "scoped_use_list" => {
            let base = node
                .child_by_field_name("path")
                .map(|n| with_prefix(node_text(n, source)))
                .unwrap_or_else(|| prefix.to_vec());
            if let Some(list) = node.child_by_field_name("list") {
                collect_use_paths(list, source, &base, out);
            }
        }
        "use_list" => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                collect_use_paths(child, source, prefix, out);
            }
        }
        "use_wildcard" => {
            let text = node_text(node, source).trim_end_matches('*').trim_end_matches("::");
            out.push(UsePath {
                segments: with_prefix(text),
                alias: None,
                wildcard: true,
            });
        }
        "self" => {
            // `use a::{self}` imports `a` itself.
            if !prefix.is_empty() {
                out.push(UsePath {
                    segments: prefix.to_vec(),
                    alias: None,
                    wildcard: false,
                });
            }
        }
        _ => {
            out.push(UsePath {
                segments: with_prefix(node_text(node, source)),
                alias: None,
                wildcard: false,
            });
        }
    }
}

/// Maps `crate::`, `self::` and `super::` onto project-qualified names.
fn anchor_rust_path(segments: &[String], ctx: &ImportContext<'_>) -> Option<(Vec<String>, bool)> {
    let first = segments.first()?;
    let mut base: Vec<String> = match first.as_str() {
        "crate" => crate_root(ctx).split('.').map(str::to_string).collect(),
        "self" => ctx.module_qn.split('.').map(str::to_string).collect(),
        "super" => ctx.module_qn.split('.').map(str::to_string).collect(),
        _ => return Some((segments.to_vec(), false)),
    };
    let mut rest = &segments[1..];
    if first == "super" {
        base.pop();
    }
    while rest.first().is_some_and(|s| s == "super") {
        base.pop();
        rest = &rest[1..];
    }
    if base.is_empty() {
        return None;
    }
    base.extend(rest.iter().cloned());
    Some((base, true))
}

/// The `src` directory holding the file, or the project root.
fn crate_root(ctx: &ImportContext<'_>) -> String {
    let dirs: Vec<&str> = ctx.rel_path.split('/').collect();
    let dirs = &dirs[..dirs.len().saturating_sub(1)];
    match dirs.iter().rposition(|d| *d == "src") {
        Some(pos) => {
            let mut parts = vec![ctx.project];
            parts.extend(&dirs[..=pos]);
            parts.join(".")
        }
        None => ctx.project.to_string(),
    }
}

fn parse_go(node: Node<'_>, source: &str) -> Vec<ImportRef> {
    let mut specs = Vec::new();
    collect_kind(node, "import_spec", &mut specs);
    specs
        .into_iter()
        .filter_map(|spec| {
            let path = spec.child_by_field_name("path")?;
            let path = unquote(node_text(path, source));
            let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
            let last = segments.last()?.to_string();
            let mut import = ImportRef::new(segments.join("."), false, line_of(spec));
            import.directory = true;
            let alias = spec
                .child_by_field_name("name")
                .map(|n| node_text(n, source).to_string())
                .filter(|name| name != "_" && name != ".");
            import.alias = Some(alias.unwrap_or(last));
            Some(import)
        })
        .collect()
}

fn parse_csharp(node: Node<'_>, source: &str) -> Vec<ImportRef> {
    let text = node_text(node, source)
        .trim_start_matches("global")
        .trim()
        .trim_start_matches("using")
        .trim()
        .trim_start_matches("static")
        .trim_end_matches(';')
        .trim();
    if text.is_empty() {
        return Vec::new();
    }
    let (alias, namespace) = match text.split_once('=') {
        Some((alias, namespace)) => (Some(alias.trim().to_string()), namespace.trim()),
        None => (None, text),
    };
    let mut import = ImportRef::new(namespace, false, line_of(node));
    import.wildcard = alias.is_none();
    import.alias = alias;
    vec![import]
}

/// `import a.b.C;` names the type `C` in file module `a.b.C`; static imports
/// name a member of such a type.
fn parse_java(node: Node<'_>, source: &str) -> Vec<ImportRef> {
    let text = node_text(node, source)
        .trim_start_matches("import")
        .trim();
    let is_static = text.starts_with("static ");
    let path = text
        .trim_start_matches("static")
        .trim_end_matches(';')
        .trim();
    let path = clean_path(path);
    let line = line_of(node);
    if let Some(package) = path.strip_suffix(".*") {
        let mut import = ImportRef::new(package, false, line);
        import.wildcard = true;
        import.directory = !is_static;
        return vec![import];
    }
    let Some((parent, name)) = path.rsplit_once('.') else {
        return Vec::new();
    };
    let import = if is_static {
        let Some((_, class)) = parent.rsplit_once('.') else {
            return Vec::new();
        };
        let mut import = ImportRef::new(parent, false, line);
        import.members.push(ImportedMember {
            name: format!("{class}.{name}"),
            alias: Some(name.to_string()),
        });
        import
    } else {
        let mut import = ImportRef::new(path.as_str(), false, line);
        import.members.push(ImportedMember {
            name: name.to_string(),
            alias: None,
        });
        import
    };
    vec![import]
}

fn clean_path(text: &str) -> String {
    text.chars().filter(|ch| !ch.is_whitespace()).collect()
}

/// `#include "models/repo.h"` imports every name of the module for that
/// file stem. Quoted `./` and `../` paths are anchored at the includer.
fn parse_cpp(node: Node<'_>, source: &str, ctx: &ImportContext<'_>) -> Vec<ImportRef> {
    let Some(path) = node.child_by_field_name("path") else {
        return Vec::new();
    };
    let raw = unquote(node_text(path, source));
    let raw = raw.trim_start_matches('<').trim_end_matches('>');
    let file = raw.rsplit('/').next().unwrap_or(raw);
    let stem_len = match file.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => raw.len() - file.len() + stem.len(),
        _ => raw.len(),
    };
    let spec = &raw[..stem_len];
    if spec.is_empty() {
        return Vec::new();
    }
    let line = line_of(node);
    let mut import = if spec.starts_with("./") || spec.starts_with("../") {
        let mut parts: Vec<String> = ctx.package_qn().split('.').map(str::to_string).collect();
        for segment in spec.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    if parts.len() > 1 {
                        parts.pop();
                    }
                }
                other => parts.push(other.to_string()),
            }
        }
        ImportRef::new(parts.join("."), true, line)
    } else {
        let module = spec
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>()
            .join(".");
        ImportRef::new(module, false, line)
    };
    import.wildcard = true;
    vec![import]
}

fn collect_kind<'t>(node: Node<'t>, kind: &str, out: &mut Vec<Node<'t>>) {
    if node.kind() == kind {
        out.push(node);
        return;
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        collect_kind(child, kind, out);
    }
}

pub fn unquote(text: &str) -> String {
    let text = text.trim();
    for quote in ["\"\"\"", "'''", "\"", "'", "`"] {
        if text.len() >= 2 * quote.len()
            && let Some(inner) = text.strip_prefix(quote).and_then(|t| t.strip_suffix(quote))
        {
            return inner.to_string();
        }
    }
    text.to_string()
}
