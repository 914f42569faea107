//! Project-wide symbol table built from per-file extraction results.
//!
//! Declarations live in an arena in insertion order. Files are merged in
//! sorted path order, so every ordering derived from the arena is stable
//! across runs.

use crate::indexer::bindings::base_type_name;
use crate::indexer::extract::ExtractedFile;
use crate::indexer::imports::ImportRef;
use crate::model::{Declaration, NodeLabel};
use std::collections::{BTreeMap, BTreeSet, HashMap};

pub type SymbolId = usize;

/// Priority of a simple-name candidate relative to the calling file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    SameFile,
    Imported,
    Project,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub id: SymbolId,
    pub tier: Tier,
}

/// Where a simple-name lookup originates.
#[derive(Debug, Clone, Copy)]
pub struct SearchScope<'a> {
    pub file: &'a str,
    pub imported_files: &'a BTreeSet<String>,
}

/// What a local import name refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasTarget {
    Modules(Vec<String>),
    Symbol(SymbolId),
    /// Outside the indexed project.
    External,
}

/// Imports of one file resolved against the project's modules.
#[derive(Debug, Clone, Default)]
pub struct FileImports {
    /// In-project modules imported by the file, in first-import order.
    pub modules: Vec<String>,
    pub files: BTreeSet<String>,
    pub aliases: HashMap<String, AliasTarget>,
}

impl FileImports {
    pub fn alias(&self, name: &str) -> Option<&AliasTarget> {
        self.aliases.get(name)
    }
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    project: String,
    symbols: Vec<Declaration>,
    by_qn: HashMap<String, SymbolId>,
    by_name: HashMap<String, Vec<SymbolId>>,
    /// Module qualified name to the file defining it.
    modules: BTreeMap<String, String>,
    /// Owning class of each method, after owner linking.
    owners: HashMap<SymbolId, SymbolId>,
    members: HashMap<SymbolId, Vec<SymbolId>>,
    supertypes: HashMap<SymbolId, Vec<SymbolId>>,
    collisions: usize,
}

impl SymbolTable {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            ..Self::default()
        }
    }

    /// Builds the table from extracted files, visiting them in path order.
    pub fn build<'a>(project: &str, files: impl IntoIterator<Item = &'a ExtractedFile>) -> Self {
        let mut table = Self::new(project);
        for file in files {
            for decl in &file.declarations {
                table.insert(decl.clone());
            }
        }
        table.link_owners();
        table
    }

    /// First writer wins. Returns `None` when the qualified name was already taken.
    pub fn insert(&mut self, decl: Declaration) -> Option<SymbolId> {
        if let Some(&existing) = self.by_qn.get(&decl.qualified_name) {
            let first = &self.symbols[existing];
            if first.path != decl.path {
                self.collisions += 1;
                tracing::warn!(
                    qualified_name = %decl.qualified_name,
                    first = %first.path,
                    second = %decl.path,
                    "qualified name declared in two files, keeping the first"
                );
            }
            return None;
        }
        let id = self.symbols.len();
        if decl.kind == NodeLabel::Module {
            self.modules
                .insert(decl.qualified_name.clone(), decl.path.clone());
        }
        self.by_qn.insert(decl.qualified_name.clone(), id);
        self.by_name.entry(decl.name.clone()).or_default().push(id);
        self.symbols.push(decl);
        Some(id)
    }

    pub fn lookup(&self, qualified_name: &str) -> Option<&Declaration> {
        self.id_of(qualified_name).map(|id| &self.symbols[id])
    }

    pub fn id_of(&self, qualified_name: &str) -> Option<SymbolId> {
        self.by_qn.get(qualified_name).copied()
    }

    pub fn get(&self, id: SymbolId) -> &Declaration {
        &self.symbols[id]
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SymbolId, &Declaration)> {
        self.symbols.iter().enumerate()
    }

    pub fn collisions(&self) -> usize {
        self.collisions
    }

    /// Candidates named `name` accepted by `filter`, ordered by tier and then
    /// insertion order.
    pub fn lookup_by_simple_name(
        &self,
        name: &str,
        scope: SearchScope<'_>,
        filter: impl Fn(&Declaration) -> bool,
    ) -> Vec<Candidate> {
        let Some(ids) = self.by_name.get(name) else {
            return Vec::new();
        };
        let mut candidates: Vec<Candidate> = ids
            .iter()
            .copied()
            .filter(|&id| filter(&self.symbols[id]))
            .map(|id| Candidate {
                id,
                tier: self.tier_of(id, scope),
            })
            .collect();
        // Stable sort keeps insertion order inside a tier.
        candidates.sort_by_key(|candidate| candidate.tier);
        candidates
    }

    fn tier_of(&self, id: SymbolId, scope: SearchScope<'_>) -> Tier {
        let path = self.symbols[id].path.as_str();
        if path == scope.file {
            Tier::SameFile
        } else if scope.imported_files.contains(path) {
            Tier::Imported
        } else {
            Tier::Project
        }
    }

    pub fn module_file(&self, module_qn: &str) -> Option<&str> {
        self.modules.get(module_qn).map(String::as_str)
    }

    pub fn owner_of(&self, method: SymbolId) -> Option<SymbolId> {
        self.owners.get(&method).copied()
    }

    pub fn members_of(&self, class: SymbolId) -> &[SymbolId] {
        self.members.get(&class).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Methods of `class` with the given simple name.
    pub fn methods_named(&self, class: SymbolId, name: &str) -> Vec<SymbolId> {
        self.members_of(class)
            .iter()
            .copied()
            .filter(|&id| self.symbols[id].name == name)
            .collect()
    }

    pub fn add_supertype(&mut self, class: SymbolId, supertype: SymbolId) {
        if class == supertype {
            return;
        }
        let entry = self.supertypes.entry(class).or_default();
        if !entry.contains(&supertype) {
            entry.push(supertype);
        }
    }

    pub fn supertypes_of(&self, class: SymbolId) -> &[SymbolId] {
        self.supertypes.get(&class).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Attaches every method to a class-like declaration.
    ///
    /// A method whose parent is not a declaration (a Rust `impl` or Go
    /// receiver in another file) is linked to a class of the same simple name,
    /// preferring the method's own directory and then the usual tiers.
    fn link_owners(&mut self) {
        let no_imports = BTreeSet::new();
        let mut links = Vec::new();
        for (id, decl) in self.symbols.iter().enumerate() {
            if decl.kind != NodeLabel::Method {
                continue;
            }
            let Some(parent) = decl.parent.as_deref() else {
                continue;
            };
            if let Some(&owner) = self.by_qn.get(parent)
                && self.symbols[owner].kind.is_class_like()
            {
                links.push((id, owner));
                continue;
            }
            let owner_name = base_type_name(parent);
            let file = decl.path.as_str();
            let dir = parent_dir(file);
            let candidates = self.lookup_by_simple_name(
                &owner_name,
                SearchScope {
                    file,
                    imported_files: &no_imports,
                },
                |d| d.kind.is_class_like(),
            );
            let same_dir = candidates.iter().find(|candidate| {
                parent_dir(&self.symbols[candidate.id].path) == dir
            });
            if let Some(owner) = same_dir.or(candidates.first()) {
                links.push((id, owner.id));
            }
        }
        for (method, owner) in links {
            self.owners.insert(method, owner);
            self.members.entry(owner).or_default().push(method);
        }
    }

    /// Resolves a file's imports to in-project modules and local aliases.
    pub fn resolve_imports(&self, file: &ExtractedFile) -> FileImports {
        let mut resolved = FileImports::default();
        for import in &file.imports {
            let modules = self.import_modules(import);
            for module in &modules {
                if module != &file.module_qn && !resolved.modules.contains(module) {
                    resolved.modules.push(module.clone());
                }
                if let Some(path) = self.module_file(module) {
                    resolved.files.insert(path.to_string());
                }
            }

            let whole_module = if modules.is_empty() {
                AliasTarget::External
            } else {
                AliasTarget::Modules(modules.clone())
            };
            if let Some(alias) = &import.alias {
                resolved.aliases.insert(alias.clone(), whole_module.clone());
            } else if import.members.is_empty() && !import.wildcard && !import.anchored {
                // `import a.b` makes `a.b` usable as a receiver.
                resolved
                    .aliases
                    .insert(import.module.clone(), whole_module.clone());
            }

            for member in &import.members {
                let target = match modules.first() {
                    None => AliasTarget::External,
                    Some(module) => {
                        let nested = format!("{module}.{}", member.name);
                        if self.modules.contains_key(&nested) {
                            if let Some(path) = self.module_file(&nested) {
                                resolved.files.insert(path.to_string());
                            }
                            if !resolved.modules.contains(&nested) {
                                resolved.modules.push(nested.clone());
                            }
                            AliasTarget::Modules(vec![nested])
                        } else if let Some(id) = self.id_of(&nested) {
                            AliasTarget::Symbol(id)
                        } else {
                            continue;
                        }
                    }
                };
                resolved
                    .aliases
                    .insert(member.local_name().to_string(), target);
            }
        }
        resolved
    }

    fn import_modules(&self, import: &ImportRef) -> Vec<String> {
        if import.directory {
            return self.directory_modules(&import.module);
        }
        if self.modules.contains_key(&import.module) {
            return vec![import.module.clone()];
        }
        if import.anchored {
            // `use crate::a::b` may name an item inside module `a`.
            return Vec::new();
        }
        let exact = format!("{}.{}", self.project, import.module);
        if self.modules.contains_key(&exact) {
            return vec![exact];
        }
        let suffix = format!(".{}", import.module);
        self.modules
            .keys()
            .find(|qn| qn.ends_with(&suffix))
            .map(|qn| vec![qn.clone()])
            .unwrap_or_default()
    }

    /// Modules in the directory named by an import path, matched by the
    /// longest path suffix that names an indexed directory.
    fn directory_modules(&self, import_path: &str) -> Vec<String> {
        let segments: Vec<&str> = import_path
            .split(['/', '.'])
            .filter(|s| !s.is_empty())
            .collect();
        for start in 0..segments.len() {
            let suffix = segments[start..].join("/");
            let found: Vec<String> = self
                .modules
                .iter()
                .filter(|(_, path)| {
                    let dir = parent_dir(path);
                    dir == suffix || dir.ends_with(&format!("/{suffix}"))
                })
                .map(|(qn, _)| qn.clone())
                .collect();
            if !found.is_empty() {
                return found;
            }
        }
        Vec::new()
    }
}

fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::imports::ImportedMember;

    fn decl(kind: NodeLabel, qn: &str, path: &str) -> Declaration {
        let name = qn.rsplit('.').next().unwrap_or(qn);
        let mut decl = Declaration::new(kind, qn, name).with_path(path);
        decl.parent = qn.rsplit_once('.').map(|(parent, _)| parent.to_string());
        decl
    }

    fn table() -> SymbolTable {
        let mut table = SymbolTable::new("p");
        for (kind, qn, path) in [
            (NodeLabel::Module, "p.a", "a.py"),
            (NodeLabel::Function, "p.a.helper", "a.py"),
            (NodeLabel::Module, "p.b", "b.py"),
            (NodeLabel::Function, "p.b.helper", "b.py"),
            (NodeLabel::Function, "p.b.main", "b.py"),
            (NodeLabel::Module, "p.c", "c.py"),
            (NodeLabel::Function, "p.c.helper", "c.py"),
            (NodeLabel::Class, "p.c.Repo", "c.py"),
            (NodeLabel::Method, "p.c.Repo.save", "c.py"),
        ] {
            table.insert(decl(kind, qn, path));
        }
        table.link_owners();
        table
    }

    #[test]
    fn lookup_returns_inserted_declaration() {
        let table = table();
        for (_, decl) in table.iter() {
            assert_eq!(
                table.lookup(&decl.qualified_name).unwrap().qualified_name,
                decl.qualified_name
            );
        }
        assert!(table.lookup("p.missing").is_none());
    }

    #[test]
    fn first_writer_wins_and_counts_cross_file_collisions() {
        let mut table = table();
        assert!(table.insert(decl(NodeLabel::Function, "p.a.helper", "a.py")).is_none());
        assert_eq!(table.collisions(), 0);
        assert!(table.insert(decl(NodeLabel::Function, "p.a.helper", "z.py")).is_none());
        assert_eq!(table.collisions(), 1);
        assert_eq!(table.lookup("p.a.helper").unwrap().path, "a.py");
    }

    #[test]
    fn simple_name_lookup_is_tiered() {
        let table = table();
        let imported: BTreeSet<String> = ["c.py".to_string()].into_iter().collect();
        let scope = SearchScope {
            file: "b.py",
            imported_files: &imported,
        };
        let found: Vec<(&str, Tier)> = table
            .lookup_by_simple_name("helper", scope, |d| d.kind == NodeLabel::Function)
            .into_iter()
            .map(|c| (table.get(c.id).qualified_name.as_str(), c.tier))
            .collect();
        assert_eq!(
            found,
            vec![
                ("p.b.helper", Tier::SameFile),
                ("p.c.helper", Tier::Imported),
                ("p.a.helper", Tier::Project),
            ]
        );
    }

    #[test]
    fn methods_attach_to_their_class() {
        let table = table();
        let repo = table.id_of("p.c.Repo").unwrap();
        let save = table.id_of("p.c.Repo.save").unwrap();
        assert_eq!(table.owner_of(save), Some(repo));
        assert_eq!(table.methods_named(repo, "save"), vec![save]);
    }

    #[test]
    fn detached_methods_link_to_same_directory_type() {
        let mut table = SymbolTable::new("p");
        table.insert(decl(NodeLabel::Module, "p.other.types", "other/types.go"));
        table.insert(decl(NodeLabel::Class, "p.other.types.Server", "other/types.go"));
        table.insert(decl(NodeLabel::Module, "p.srv.types", "srv/types.go"));
        table.insert(decl(NodeLabel::Class, "p.srv.types.Server", "srv/types.go"));
        table.insert(decl(NodeLabel::Module, "p.srv.run", "srv/run.go"));
        table.insert(decl(NodeLabel::Method, "p.srv.run.Server.Start", "srv/run.go"));
        table.link_owners();
        let start = table.id_of("p.srv.run.Server.Start").unwrap();
        assert_eq!(
            table.owner_of(start),
            table.id_of("p.srv.types.Server")
        );
    }

    #[test]
    fn imports_resolve_to_modules_and_members() {
        let table = table();
        let file = ExtractedFile {
            path: "b.py".into(),
            module_qn: "p.b".into(),
            imports: vec![
                ImportRef {
                    module: "a".into(),
                    ..Default::default()
                },
                ImportRef {
                    module: "c".into(),
                    members: vec![ImportedMember {
                        name: "Repo".into(),
                        alias: Some("R".into()),
                    }],
                    ..Default::default()
                },
                ImportRef {
                    module: "os".into(),
                    alias: Some("system".into()),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let imports = table.resolve_imports(&file);
        assert_eq!(imports.modules, vec!["p.a".to_string(), "p.c".to_string()]);
        assert!(imports.files.contains("a.py") && imports.files.contains("c.py"));
        assert_eq!(
            imports.alias("a"),
            Some(&AliasTarget::Modules(vec!["p.a".into()]))
        );
        assert_eq!(
            imports.alias("R"),
            Some(&AliasTarget::Symbol(table.id_of("p.c.Repo").unwrap()))
        );
        assert_eq!(imports.alias("system"), Some(&AliasTarget::External));
    }

    #[test]
    fn directory_imports_match_dotted_paths() {
        let mut table = SymbolTable::new("p");
        for (kind, qn, path) in [
            (NodeLabel::Module, "p.srv.server", "srv/server.go"),
            (NodeLabel::Module, "p.srv.routes", "srv/routes.go"),
            (NodeLabel::Module, "p.main", "main.go"),
        ] {
            table.insert(decl(kind, qn, path));
        }
        let file = ExtractedFile {
            path: "main.go".into(),
            module_qn: "p.main".into(),
            imports: vec![ImportRef {
                module: "example.com.app.srv".into(),
                alias: Some("srv".into()),
                directory: true,
                ..Default::default()
            }],
            ..Default::default()
        };
        let imports = table.resolve_imports(&file);
        assert_eq!(
            imports.modules,
            vec!["p.srv.routes".to_string(), "p.srv.server".to_string()]
        );
        assert_eq!(
            imports.alias("srv"),
            Some(&AliasTarget::Modules(vec![
                "p.srv.routes".into(),
                "p.srv.server".into()
            ]))
        );
    }
}
