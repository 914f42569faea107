//! Resolution phase: imports, supertypes, overrides and call edges.
//!
//! Runs once the symbol table holds every declaration of the generation and
//! always covers the whole project.

use crate::indexer::bindings::{TypeHint, base_type_name, element_type, is_identifier};
use crate::indexer::extract::{CallSite, ExtractedFile, split_callee};
use crate::languages::{LanguageConfig, LanguageRegistry};
use crate::model::{Declaration, GraphRelationship, NodeLabel, Origin, RelationshipKind};
use crate::symbols::{AliasTarget, Candidate, FileImports, SearchScope, SymbolId, SymbolTable};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Default)]
pub struct Resolution {
    pub relationships: Vec<GraphRelationship>,
    pub calls_resolved: usize,
    pub calls_unresolved: usize,
    pub unresolved_by_file: BTreeMap<String, usize>,
}

pub fn resolve_project(
    table: &mut SymbolTable,
    files: &BTreeMap<String, ExtractedFile>,
    registry: &LanguageRegistry,
) -> Resolution {
    let imports: BTreeMap<&str, FileImports> = files
        .iter()
        .map(|(path, file)| (path.as_str(), table.resolve_imports(file)))
        .collect();

    let mut out = Resolution::default();
    let mut seen = BTreeSet::new();
    let mut push = |out: &mut Resolution, rel: GraphRelationship| {
        if seen.insert(rel.identity()) {
            out.relationships.push(rel);
        }
    };

    for (path, file) in files {
        let Some(module) = table.lookup(&file.module_qn) else {
            continue;
        };
        for imported in &imports[path.as_str()].modules {
            if let Some(target) = table.lookup(imported) {
                push(&mut out, edge(module, RelationshipKind::Imports, target, path));
            }
        }
    }

    // Supertypes first: call resolution walks them.
    let mut base_edges = Vec::new();
    for (path, file) in files {
        let file_imports = &imports[path.as_str()];
        for base in &file.bases {
            let Some(sub) = class_id(table, &base.class_qn, &file.path) else {
                continue;
            };
            let resolver = CallResolver::new(table, file, file_imports, registry);
            for sup in resolver.resolve_type_name(&base.base) {
                if sup == sub {
                    continue;
                }
                let kind = if base.implements || table.get(sup).kind == NodeLabel::Interface {
                    RelationshipKind::Implements
                } else {
                    RelationshipKind::Inherits
                };
                base_edges.push((sub, kind, sup, path.clone()));
            }
        }
    }
    for (sub, kind, sup, path) in base_edges {
        table.add_supertype(sub, sup);
        push(&mut out, edge(table.get(sub), kind, table.get(sup), &path));
    }

    for (id, decl) in table.iter() {
        if decl.kind != NodeLabel::Method {
            continue;
        }
        let Some(owner) = table.owner_of(id) else {
            continue;
        };
        // Methods of a type declared elsewhere are defined by that type.
        let owner_decl = table.get(owner);
        if decl.parent.as_deref() != Some(owner_decl.qualified_name.as_str())
            || owner_decl.path != decl.path
        {
            push(
                &mut out,
                edge(owner_decl, RelationshipKind::DefinesMethod, decl, &decl.path),
            );
        }
        for &sup in table.supertypes_of(owner) {
            for overridden in table.methods_named(sup, &decl.name) {
                push(
                    &mut out,
                    edge(decl, RelationshipKind::Overrides, table.get(overridden), &decl.path),
                );
            }
        }
    }

    for (path, file) in files {
        let resolver = CallResolver::new(table, file, &imports[path.as_str()], registry);
        let mut unresolved = 0;
        for call in &file.calls {
            let Some(caller) = table.lookup(&call.caller) else {
                continue;
            };
            let targets = resolver.resolve(call);
            if targets.is_empty() {
                unresolved += 1;
                continue;
            }
            out.calls_resolved += 1;
            for target in targets {
                push(
                    &mut out,
                    edge(caller, RelationshipKind::Calls, table.get(target), path),
                );
            }
        }
        if unresolved > 0 {
            out.calls_unresolved += unresolved;
            out.unresolved_by_file.insert(path.clone(), unresolved);
        }
    }
    out
}

fn edge(
    source: &Declaration,
    kind: RelationshipKind,
    target: &Declaration,
    path: &str,
) -> GraphRelationship {
    GraphRelationship::new(source.node_ref(), kind, target.node_ref(), Origin::Resolution)
        .in_file(path)
}

fn class_id(table: &SymbolTable, qn: &str, path: &str) -> Option<SymbolId> {
    if let Some(id) = table.id_of(qn)
        && table.get(id).kind.is_class_like()
    {
        return Some(id);
    }
    // `impl Trait for Type` names a type that may be declared in another file.
    table.iter().find_map(|(id, decl)| {
        (decl.kind == NodeLabel::Method
            && decl.path == path
            && decl.parent.as_deref() == Some(qn))
        .then(|| table.owner_of(id))
        .flatten()
    })
}

/// Resolves call sites of one file.
pub struct CallResolver<'a> {
    table: &'a SymbolTable,
    file: &'a ExtractedFile,
    imports: &'a FileImports,
    registry: &'a LanguageRegistry,
    config: Option<&'a LanguageConfig>,
}

impl<'a> CallResolver<'a> {
    pub fn new(
        table: &'a SymbolTable,
        file: &'a ExtractedFile,
        imports: &'a FileImports,
        registry: &'a LanguageRegistry,
    ) -> Self {
        let config = registry.by_name(&file.language).map(|config| config.as_ref());
        Self {
            table,
            file,
            imports,
            registry,
            config,
        }
    }

    fn scope(&self) -> SearchScope<'_> {
        SearchScope {
            file: &self.file.path,
            imported_files: &self.imports.files,
        }
    }

    fn is_self(&self, text: &str) -> bool {
        self.config.is_some_and(|config| config.is_self_name(text))
    }

    fn is_super(&self, text: &str) -> bool {
        self.config.is_some_and(|config| config.is_super_name(text))
    }

    /// Zero, one or many targets. Ambiguity inside the winning tier is kept.
    pub fn resolve(&self, call: &CallSite) -> Vec<SymbolId> {
        let enclosing = self.enclosing_class(&call.caller);
        match call.receiver.as_deref() {
            None => self.resolve_unqualified(call, enclosing),
            Some(receiver) => self.resolve_qualified(call, receiver, enclosing),
        }
    }

    fn enclosing_class(&self, caller: &str) -> Option<SymbolId> {
        let id = self.table.id_of(caller)?;
        self.table.owner_of(id)
    }

    fn resolve_unqualified(&self, call: &CallSite, enclosing: Option<SymbolId>) -> Vec<SymbolId> {
        match self.imports.alias(&call.name) {
            Some(AliasTarget::Symbol(id)) => {
                let decl = self.table.get(*id);
                if decl.kind.is_class_like() {
                    return self.constructors_of(*id);
                }
                if decl.kind.is_callable() {
                    return vec![*id];
                }
            }
            Some(AliasTarget::External) => return Vec::new(),
            Some(AliasTarget::Modules(_)) | None => {}
        }

        if !call.constructor
            && let Some(class) = enclosing
            && self.config.is_some_and(|config| config.implicit_receiver)
        {
            let own = self.methods_with_supertypes(class, &call.name);
            if !own.is_empty() {
                return own;
            }
        }

        let constructor = call.constructor;
        let candidates = self.table.lookup_by_simple_name(&call.name, self.scope(), |decl| {
            decl.kind.is_class_like() || (!constructor && decl.kind == NodeLabel::Function)
        });
        self.first_tier(candidates, |id| {
            if self.table.get(id).kind.is_class_like() {
                self.constructors_of(id)
            } else {
                vec![id]
            }
        })
    }

    fn resolve_qualified(
        &self,
        call: &CallSite,
        receiver: &str,
        enclosing: Option<SymbolId>,
    ) -> Vec<SymbolId> {
        if self.is_self(receiver) {
            return enclosing
                .map(|class| self.methods_with_supertypes(class, &call.name))
                .unwrap_or_default();
        }
        if self.is_super(receiver) {
            return enclosing
                .map(|class| {
                    self.table
                        .supertypes_of(class)
                        .iter()
                        .flat_map(|&sup| self.table.methods_named(sup, &call.name))
                        .collect()
                })
                .unwrap_or_default();
        }

        if let Some(hint) = self.binding_for(&call.caller, receiver, enclosing) {
            let types = self.types_of_hint(&hint, &call.caller, enclosing);
            if !types.is_empty() {
                return self.methods_on_types(&types, &call.name);
            }
        }

        match self.imports.alias(receiver) {
            Some(AliasTarget::Modules(modules)) => {
                return modules
                    .iter()
                    .filter_map(|module| self.table.id_of(&format!("{module}.{}", call.name)))
                    .flat_map(|id| self.callable_target(id))
                    .collect();
            }
            Some(AliasTarget::Symbol(id)) if self.table.get(*id).kind.is_class_like() => {
                return self.methods_with_supertypes(*id, &call.name);
            }
            Some(AliasTarget::External) => return Vec::new(),
            _ => {}
        }

        if is_identifier(receiver) {
            let classes = self.class_candidates(receiver);
            if !classes.is_empty() {
                return self.methods_on_types(&classes, &call.name);
            }
        }

        let candidates = self.table.lookup_by_simple_name(&call.name, self.scope(), |decl| {
            decl.kind == NodeLabel::Method
        });
        self.first_tier(candidates, |id| vec![id])
    }

    /// Maps candidates to targets and keeps the first tier that yields any.
    fn first_tier(
        &self,
        candidates: Vec<Candidate>,
        targets: impl Fn(SymbolId) -> Vec<SymbolId>,
    ) -> Vec<SymbolId> {
        let mut winning = None;
        let mut out = Vec::new();
        for candidate in candidates {
            if winning.is_some_and(|tier| tier != candidate.tier) {
                break;
            }
            let found = targets(candidate.id);
            if found.is_empty() {
                continue;
            }
            winning = Some(candidate.tier);
            for id in found {
                if !out.contains(&id) {
                    out.push(id);
                }
            }
        }
        out
    }

    fn callable_target(&self, id: SymbolId) -> Vec<SymbolId> {
        let decl = self.table.get(id);
        if decl.kind.is_class_like() {
            self.constructors_of(id)
        } else if decl.kind.is_callable() {
            vec![id]
        } else {
            Vec::new()
        }
    }

    fn constructors_of(&self, class: SymbolId) -> Vec<SymbolId> {
        let class_decl = self.table.get(class);
        let config = class_decl
            .language
            .as_deref()
            .and_then(|language| self.registry.by_name(language));
        self.table
            .members_of(class)
            .iter()
            .copied()
            .filter(|&id| {
                let name = &self.table.get(id).name;
                name == &class_decl.name
                    || config.is_some_and(|config| config.is_constructor_name(name))
            })
            .collect()
    }

    /// Methods named `name` on `class`, else on its direct supertypes.
    fn methods_with_supertypes(&self, class: SymbolId, name: &str) -> Vec<SymbolId> {
        let own = self.table.methods_named(class, name);
        if !own.is_empty() {
            return own;
        }
        self.table
            .supertypes_of(class)
            .iter()
            .flat_map(|&sup| self.table.methods_named(sup, name))
            .collect()
    }

    fn methods_on_types(&self, types: &[SymbolId], name: &str) -> Vec<SymbolId> {
        let mut out = Vec::new();
        for &ty in types {
            for id in self.methods_with_supertypes(ty, name) {
                if !out.contains(&id) {
                    out.push(id);
                }
            }
        }
        out
    }

    fn binding_for(
        &self,
        caller: &str,
        receiver: &str,
        enclosing: Option<SymbolId>,
    ) -> Option<TypeHint> {
        if let Some(hint) = self
            .file
            .bindings
            .get(caller)
            .and_then(|bindings| bindings.get(receiver))
            .filter(|hint| !hint.is_unknown())
        {
            return Some(hint.clone());
        }
        let (head, _) = receiver.split_once('.')?;
        if !self.is_self(head) {
            return None;
        }
        let class = self.table.get(enclosing?);
        self.file
            .attribute_bindings
            .get(&class.qualified_name)
            .and_then(|bindings| bindings.get(receiver))
            .filter(|hint| !hint.is_unknown())
            .cloned()
    }

    /// Class-like declarations a hint denotes. One hop only.
    fn types_of_hint(
        &self,
        hint: &TypeHint,
        caller: &str,
        enclosing: Option<SymbolId>,
    ) -> Vec<SymbolId> {
        match hint {
            TypeHint::Declared(ty) => self.resolve_type_name(ty),
            TypeHint::Call { callee } => self.types_of_call(callee, enclosing),
            TypeHint::Iterates(iterable) => {
                let declared = match self.binding_for(caller, iterable, enclosing) {
                    Some(TypeHint::Declared(ty)) => Some(ty),
                    Some(TypeHint::Call { callee }) => self.return_type_of_call(&callee, enclosing),
                    _ => None,
                };
                declared
                    .and_then(|ty| element_type(&ty))
                    .map(|ty| self.resolve_type_name(&ty))
                    .unwrap_or_default()
            }
            TypeHint::Unknown => Vec::new(),
        }
    }

    fn types_of_call(&self, callee: &str, enclosing: Option<SymbolId>) -> Vec<SymbolId> {
        let Some(config) = self.config else {
            return Vec::new();
        };
        let Some((receiver, name)) = split_callee(callee, config) else {
            return Vec::new();
        };
        if receiver.is_none() {
            let classes = self.class_candidates(&name);
            if !classes.is_empty() {
                return classes;
            }
        }
        let Some(ret) = self.return_type_of_call(callee, enclosing) else {
            return Vec::new();
        };
        if self.is_self(&ret) {
            // `Foo::new() -> Self`
            return receiver
                .map(|recv| self.class_candidates(&recv))
                .unwrap_or_default();
        }
        self.resolve_type_name(&ret)
    }

    fn return_type_of_call(&self, callee: &str, enclosing: Option<SymbolId>) -> Option<String> {
        let config = self.config?;
        let (receiver, name) = split_callee(callee, config)?;
        let call = CallSite {
            caller: String::new(),
            name,
            receiver,
            constructor: false,
            line: 0,
        };
        let targets = match call.receiver.as_deref() {
            None => self.resolve_unqualified(&call, enclosing),
            Some(receiver) if self.is_self(receiver) => enclosing
                .map(|class| self.methods_with_supertypes(class, &call.name))
                .unwrap_or_default(),
            Some(receiver) => {
                let classes = if is_identifier(receiver) {
                    self.class_candidates(receiver)
                } else {
                    Vec::new()
                };
                self.methods_on_types(&classes, &call.name)
            }
        };
        targets
            .into_iter()
            .find_map(|id| self.table.get(id).return_type.clone())
    }

    /// Class-like declarations for a type expression such as `pkg.Repo<T>`.
    pub fn resolve_type_name(&self, ty: &str) -> Vec<SymbolId> {
        let ty = ty.trim();
        let name = base_type_name(ty);
        if name.is_empty() {
            return Vec::new();
        }
        let head = ty.split(['<', '[', '(']).next().unwrap_or(ty);
        if let Some((qualifier, _)) = head.rsplit_once(['.', ':']) {
            let qualifier = qualifier.trim_end_matches(':');
            if let Some(AliasTarget::Modules(modules)) = self.imports.alias(qualifier) {
                let found: Vec<SymbolId> = modules
                    .iter()
                    .filter_map(|module| self.table.id_of(&format!("{module}.{name}")))
                    .filter(|&id| self.table.get(id).kind.is_class_like())
                    .collect();
                if !found.is_empty() {
                    return found;
                }
            }
        }
        self.class_candidates(&name)
    }

    fn class_candidates(&self, name: &str) -> Vec<SymbolId> {
        if let Some(target) = self.imports.alias(name) {
            match target {
                AliasTarget::Symbol(id) if self.table.get(*id).kind.is_class_like() => {
                    return vec![*id];
                }
                AliasTarget::External => return Vec::new(),
                _ => {}
            }
        }
        let candidates = self
            .table
            .lookup_by_simple_name(name, self.scope(), |decl| decl.kind.is_class_like());
        self.first_tier(candidates, |id| vec![id])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::extract::extract;
    use crate::parser::SyntaxTreeProvider;

    fn index(files: &[(&str, &str)]) -> (SymbolTable, Resolution) {
        let registry = LanguageRegistry::builtin().unwrap();
        let provider = SyntaxTreeProvider::new();
        let mut extracted = BTreeMap::new();
        for (path, code) in files {
            let config = registry
                .for_path(std::path::Path::new(path))
                .unwrap()
                .clone();
            let tree = provider.parse(&config, path, code.as_bytes()).unwrap();
            extracted.insert(path.to_string(), extract("proj", path, &tree, &config));
        }
        let mut table = SymbolTable::build("proj", extracted.values());
        let resolution = resolve_project(&mut table, &extracted, &registry);
        (table, resolution)
    }

    fn edges(resolution: &Resolution, kind: RelationshipKind) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = resolution
            .relationships
            .iter()
            .filter(|rel| rel.kind == kind)
            .map(|rel| (rel.source.key.clone(), rel.target.key.clone()))
            .collect();
        out.sort();
        out
    }

    fn pair(a: &str, b: &str) -> (String, String) {
        (a.to_string(), b.to_string())
    }

    #[test]
    fn imported_function_call_resolves() {
        let (_, resolution) = index(&[
            ("a.py", "def helper():\n    pass\n"),
            ("b.py", "import a\n\ndef main():\n    helper()\n"),
        ]);
        assert_eq!(
            edges(&resolution, RelationshipKind::Calls),
            vec![pair("proj.b.main", "proj.a.helper")]
        );
        assert_eq!(
            edges(&resolution, RelationshipKind::Imports),
            vec![pair("proj.b", "proj.a")]
        );
        assert_eq!(resolution.calls_resolved, 1);
        assert_eq!(resolution.calls_unresolved, 0);
    }

    #[test]
    fn ambiguous_tier_links_every_candidate() {
        let (_, resolution) = index(&[
            ("x.py", "def run():\n    pass\n"),
            ("y.py", "def run():\n    pass\n"),
            ("z.py", "def main():\n    run()\n    missing()\n"),
        ]);
        assert_eq!(
            edges(&resolution, RelationshipKind::Calls),
            vec![pair("proj.z.main", "proj.x.run"), pair("proj.z.main", "proj.y.run")]
        );
        assert_eq!(resolution.calls_unresolved, 1);
        assert_eq!(resolution.unresolved_by_file.get("z.py"), Some(&1));
    }

    #[test]
    fn same_file_tier_shadows_imported_and_project() {
        let (_, resolution) = index(&[
            ("x.py", "def run():\n    pass\n"),
            ("z.py", "import x\n\ndef run():\n    pass\n\ndef main():\n    run()\n"),
        ]);
        assert_eq!(
            edges(&resolution, RelationshipKind::Calls),
            vec![pair("proj.z.main", "proj.z.run")]
        );
    }

    #[test]
    fn typed_receivers_and_inheritance() {
        let (_, resolution) = index(&[
            (
                "models.py",
                "class Base:\n    def save(self):\n        pass\n\nclass Repo(Base):\n    def __init__(self):\n        pass\n\n    def save(self):\n        super().save()\n",
            ),
            (
                "app.py",
                "from models import Repo\n\nclass Other:\n    def save(self):\n        pass\n\ndef main():\n    repo = Repo()\n    repo.save()\n    for item in load():\n        item.save()\n",
            ),
        ]);
        let calls = edges(&resolution, RelationshipKind::Calls);
        assert!(calls.contains(&pair("proj.app.main", "proj.models.Repo.__init__")));
        assert!(calls.contains(&pair("proj.app.main", "proj.models.Repo.save")));
        assert!(calls.contains(&pair("proj.models.Repo.save", "proj.models.Base.save")));
        // `item` has no known type: name-only fallback prefers the same file.
        assert!(calls.contains(&pair("proj.app.main", "proj.app.Other.save")));
        assert!(!calls.contains(&pair("proj.app.main", "proj.models.Base.save")));

        assert_eq!(
            edges(&resolution, RelationshipKind::Inherits),
            vec![pair("proj.models.Repo", "proj.models.Base")]
        );
        assert_eq!(
            edges(&resolution, RelationshipKind::Overrides),
            vec![pair("proj.models.Repo.save", "proj.models.Base.save")]
        );
    }

    #[test]
    fn self_attributes_and_return_types_propagate() {
        let (_, resolution) = index(&[(
            "svc.py",
            "class Client:\n    def send(self):\n        pass\n\ndef make() -> Client:\n    return Client()\n\nclass Service:\n    def __init__(self):\n        self.client = make()\n\n    def run(self):\n        self.client.send()\n",
        )]);
        let calls = edges(&resolution, RelationshipKind::Calls);
        assert!(calls.contains(&pair("proj.svc.Service.run", "proj.svc.Client.send")));
        assert!(calls.contains(&pair("proj.svc.Service.__init__", "proj.svc.make")));
    }

    #[test]
    fn rust_impls_in_other_files_link_to_their_type() {
        let (table, resolution) = index(&[
            ("src/model.rs", "pub struct Store;\npub trait Save { fn save(&self); }\n"),
            (
                "src/ops.rs",
                "use crate::model::{Store, Save};\n\nimpl Save for Store {\n    fn save(&self) {}\n}\n\nimpl Store {\n    pub fn new() -> Self { Store }\n}\n\nfn run() {\n    let store = Store::new();\n    store.save();\n}\n",
            ),
        ]);
        let save = table.id_of("proj.src.ops.Store.save").unwrap();
        assert_eq!(table.owner_of(save), table.id_of("proj.src.model.Store"));
        assert_eq!(
            edges(&resolution, RelationshipKind::Implements),
            vec![pair("proj.src.model.Store", "proj.src.model.Save")]
        );
        let calls = edges(&resolution, RelationshipKind::Calls);
        assert!(calls.contains(&pair("proj.src.ops.run", "proj.src.ops.Store.new")));
        assert!(calls.contains(&pair("proj.src.ops.run", "proj.src.ops.Store.save")));
        assert!(edges(&resolution, RelationshipKind::DefinesMethod)
            .contains(&pair("proj.src.model.Store", "proj.src.ops.Store.save")));
    }

    #[test]
    fn external_module_receivers_do_not_fall_back() {
        let (_, resolution) = index(&[
            ("util.py", "def join():\n    pass\n"),
            ("main.py", "import os.path as osp\n\ndef main():\n    osp.join()\n"),
        ]);
        assert!(edges(&resolution, RelationshipKind::Calls).is_empty());
        assert_eq!(resolution.calls_unresolved, 1);
    }
}
