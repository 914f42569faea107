//! Syntax tree provider backed by tree-sitter grammars.

use crate::error::{IndexError, Result};
use crate::languages::LanguageConfig;
use std::cell::RefCell;
use std::collections::HashMap;
use tree_sitter::{Language, Node, Parser, Tree};

thread_local! {
    static PARSERS: RefCell<HashMap<String, Parser>> = RefCell::new(HashMap::new());
}

/// Grammar names accepted in language configuration.
pub const GRAMMARS: &[&str] = &[
    "python",
    "javascript",
    "typescript",
    "tsx",
    "rust",
    "go",
    "c_sharp",
    "java",
    "cpp",
    "lua",
];

pub fn grammar(name: &str) -> Option<Language> {
    let language = match name {
        "python" => tree_sitter_python::LANGUAGE,
        "javascript" => tree_sitter_javascript::LANGUAGE,
        "typescript" => tree_sitter_typescript::LANGUAGE_TYPESCRIPT,
        "tsx" => tree_sitter_typescript::LANGUAGE_TSX,
        "rust" => tree_sitter_rust::LANGUAGE,
        "go" => tree_sitter_go::LANGUAGE,
        "c_sharp" | "csharp" => tree_sitter_c_sharp::LANGUAGE,
        "java" => tree_sitter_java::LANGUAGE,
        "cpp" => tree_sitter_cpp::LANGUAGE,
        "lua" => tree_sitter_lua::LANGUAGE,
        _ => return None,
    };
    Some(language.into())
}

/// A parsed file. Owns its source so node text can be sliced freely.
pub struct SyntaxTree {
    tree: Tree,
    source: String,
}

impl SyntaxTree {
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn text(&self, node: Node<'_>) -> &str {
        node_text(node, &self.source)
    }
}

pub fn node_text<'a>(node: Node<'_>, source: &'a str) -> &'a str {
    source
        .get(node.start_byte()..node.end_byte())
        .unwrap_or("")
        .trim()
}

/// 1-based inclusive line span.
pub fn line_span(node: Node<'_>) -> (u32, u32) {
    (
        node.start_position().row as u32 + 1,
        node.end_position().row as u32 + 1,
    )
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SyntaxTreeProvider;

impl SyntaxTreeProvider {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, config: &LanguageConfig, path: &str, source: &[u8]) -> Result<SyntaxTree> {
        let parse_error = |reason: String| IndexError::Parse {
            path: path.to_string(),
            language: config.name.clone(),
            reason,
        };
        let source = std::str::from_utf8(source)
            .map_err(|err| parse_error(format!("not valid UTF-8: {err}")))?
            .to_string();
        let language = grammar(&config.grammar)
            .ok_or_else(|| parse_error(format!("unknown grammar {}", config.grammar)))?;

        let tree = PARSERS.with(|cell| {
            let mut parsers = cell.borrow_mut();
            if !parsers.contains_key(&config.grammar) {
                let mut parser = Parser::new();
                parser
                    .set_language(&language)
                    .map_err(|err| parse_error(format!("grammar version mismatch: {err}")))?;
                parsers.insert(config.grammar.clone(), parser);
            }
            let parser = parsers
                .get_mut(&config.grammar)
                .ok_or_else(|| parse_error("parser unavailable".to_string()))?;
            parser
                .parse(&source, None)
                .ok_or_else(|| parse_error("parser produced no tree".to_string()))
        })?;

        let root = tree.root_node();
        if root.has_error() {
            let location = first_error(root)
                .map(|node| {
                    let pos = node.start_position();
                    format!("syntax error at line {}, column {}", pos.row + 1, pos.column + 1)
                })
                .unwrap_or_else(|| "syntax error".to_string());
            return Err(parse_error(location));
        }
        Ok(SyntaxTree { tree, source })
    }
}

/// Configured node types the grammar does not define.
pub fn unknown_node_types(language: &Language, config: &LanguageConfig) -> Vec<String> {
    config
        .referenced_node_types()
        .into_iter()
        .filter(|kind| language.id_for_node_kind(kind, true) == 0)
        .map(str::to_string)
        .collect()
}

fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.has_error()
            && let Some(found) = first_error(child)
        {
            return Some(found);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::languages::LanguageRegistry;

    fn python() -> std::sync::Arc<LanguageConfig> {
        LanguageRegistry::builtin()
            .unwrap()
            .by_name("python")
            .unwrap()
            .clone()
    }

    #[test]
    fn parse_exposes_fields_and_spans() {
        let provider = SyntaxTreeProvider::new();
        let source = b"def helper(x) -> int:\n    return x\n";
        let tree = provider.parse(&python(), "a.py", source).unwrap();
        let func = tree.root().named_child(0).unwrap();
        assert_eq!(func.kind(), "function_definition");
        let name = func.child_by_field_name("name").unwrap();
        assert_eq!(tree.text(name), "helper");
        let ret = func.child_by_field_name("return_type").unwrap();
        assert_eq!(tree.text(ret), "int");
        assert_eq!(line_span(func), (1, 2));
    }

    #[test]
    fn syntax_errors_are_parse_errors() {
        let provider = SyntaxTreeProvider::new();
        let err = provider
            .parse(&python(), "bad.py", b"def broken(:\n    pass\n")
            .err()
            .unwrap();
        match err {
            IndexError::Parse { path, language, .. } => {
                assert_eq!(path, "bad.py");
                assert_eq!(language, "python");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn invalid_utf8_is_a_parse_error() {
        let provider = SyntaxTreeProvider::new();
        let err = provider.parse(&python(), "x.py", &[0xff, 0xfe, 0x00]);
        assert!(matches!(err, Err(IndexError::Parse { .. })));
    }

    #[test]
    fn builtin_grammars_are_available() {
        let registry = LanguageRegistry::builtin().unwrap();
        for config in registry.languages() {
            let language = grammar(&config.grammar).unwrap();
            assert!(unknown_node_types(&language, config).is_empty(), "{}", config.name);
        }
    }
}
