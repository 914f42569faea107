//! Indexing pipeline: scan, parallel extraction, symbol table, resolution and ingestion.

use crate::config::Config;
use crate::error::{IndexError, Result};
use crate::graph::{BatchIngestor, Deletion, GraphStore};
use crate::indexer::extract::ExtractedFile;
use crate::indexer::manifest::ExternalDependency;
use crate::indexer::resolve::Resolution;
use crate::indexer::scan::{IgnoreSet, RepoScan, ScannedFile};
use crate::languages::LanguageRegistry;
use crate::model::{GraphRelationship, NodeRef, Origin, RunReport, SkippedFile};
use crate::parser::SyntaxTreeProvider;
use crate::symbols::SymbolTable;
use crate::util::CancelToken;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

pub mod bindings;
pub mod extract;
pub mod imports;
pub mod manifest;
pub mod resolve;
pub mod scan;
pub mod structure;

/// Per-run inputs supplied by the caller.
#[derive(Debug, Clone)]
pub struct IndexOptions {
    pub project: String,
    pub root: PathBuf,
    /// Extra ignored directory names; `!name` removes a default.
    pub ignore: Vec<String>,
    pub languages: Option<PathBuf>,
}

impl IndexOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            project: crate::util::default_project_name(&root),
            root,
            ignore: Vec::new(),
            languages: None,
        }
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = project.into();
        self
    }

    pub fn with_ignore(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.ignore.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_languages(mut self, path: impl Into<PathBuf>) -> Self {
        self.languages = Some(path.into());
        self
    }
}

/// Re-extracted state waiting for resolution and the write transaction.
#[derive(Debug)]
pub struct PendingUpdate {
    started: Instant,
    report: RunReport,
    affected: BTreeSet<String>,
    removed: usize,
    manifests_changed: bool,
    noop: bool,
    replaced: CacheSnapshot,
}

/// Cache entries an update replaced, restored when its transaction fails.
#[derive(Debug, Default)]
struct CacheSnapshot {
    entries: BTreeMap<String, (Option<String>, Option<ExtractedFile>)>,
}

impl CacheSnapshot {
    fn record(&mut self, path: &str, hash: Option<String>, file: Option<ExtractedFile>) {
        self.entries
            .entry(path.to_string())
            .or_insert((hash, file));
    }
}

impl PendingUpdate {
    /// True when the change set touched nothing indexable.
    pub fn is_noop(&self) -> bool {
        self.noop
    }

    /// Files whose rows will be rewritten.
    pub fn affected(&self) -> impl Iterator<Item = &str> {
        self.affected.iter().map(String::as_str)
    }
}

enum FileOutcome {
    Extracted { hash: String, file: ExtractedFile },
    Skipped(SkippedFile),
}

pub struct Indexer {
    project: String,
    root: PathBuf,
    registry: Arc<LanguageRegistry>,
    provider: SyntaxTreeProvider,
    store: Arc<dyn GraphStore>,
    ignores: IgnoreSet,
    pool: Option<rayon::ThreadPool>,
    cancel: CancelToken,
    files: BTreeMap<String, ExtractedFile>,
    hashes: BTreeMap<String, String>,
    manifests: BTreeMap<String, Vec<ExternalDependency>>,
}

impl Indexer {
    pub fn new(options: IndexOptions, store: Arc<dyn GraphStore>) -> Result<Self> {
        let config = Config::get();
        let root = std::fs::canonicalize(&options.root)
            .map_err(|err| IndexError::io(&options.root, err))?;
        let languages = options
            .languages
            .as_deref()
            .or(config.languages_path.as_deref());
        let registry = LanguageRegistry::load_or_builtin(languages)?;
        let provider = SyntaxTreeProvider::new();
        let ignores = IgnoreSet::load(&root, &options.ignore)?;
        let pool = if config.threads > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(config.threads)
                .build()
                .map_err(|err| IndexError::config(format!("thread pool: {err}")))?;
            Some(pool)
        } else {
            None
        };
        store.ensure_constraints()?;
        Ok(Self {
            project: options.project,
            root,
            registry: Arc::new(registry),
            provider,
            store,
            ignores,
            pool,
            cancel: CancelToken::new(),
            files: BTreeMap::new(),
            hashes: BTreeMap::new(),
            manifests: BTreeMap::new(),
        })
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn registry(&self) -> &LanguageRegistry {
        &self.registry
    }

    pub fn ignores(&self) -> &IgnoreSet {
        &self.ignores
    }

    pub fn store(&self) -> &dyn GraphStore {
        self.store.as_ref()
    }

    /// Extracted files currently cached, keyed by relative path.
    pub fn files(&self) -> &BTreeMap<String, ExtractedFile> {
        &self.files
    }

    /// Root-relative `/`-separated form of `path`, if it lies under the root.
    pub fn relative_path(&self, path: &Path) -> Option<String> {
        crate::util::normalize_rel_path(&self.root, &self.under_root(path))
    }

    /// Rebases `path` onto the canonical root. Deleted files canonicalize through their parent.
    fn under_root(&self, path: &Path) -> PathBuf {
        if path.starts_with(&self.root) {
            return path.to_path_buf();
        }
        if let Ok(canonical) = path.canonicalize() {
            return canonical;
        }
        match (path.parent().map(Path::canonicalize), path.file_name()) {
            (Some(Ok(parent)), Some(name)) => parent.join(name),
            _ => path.to_path_buf(),
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        if !self.root.is_dir() {
            tracing::warn!(root = %self.root.display(), "repository root disappeared, cancelling");
            self.cancel.cancel();
        }
        self.cancel.check()
    }

    /// Full index of the repository. Every row gets a fresh generation and older
    /// rows of the project are swept once all batches are written.
    pub fn index_all(&mut self) -> Result<RunReport> {
        let started = Instant::now();
        self.check_cancelled()?;
        let scan = scan::scan_repo(&self.root, &self.registry, &self.ignores)?;
        tracing::info!(
            project = %self.project,
            files = scan.files.len(),
            "indexing repository"
        );

        let mut report = RunReport {
            project: self.project.clone(),
            ..RunReport::default()
        };
        self.files.clear();
        self.hashes.clear();
        for outcome in self.extract_files(&scan.files)? {
            match outcome {
                FileOutcome::Extracted { hash, file } => {
                    self.hashes.insert(file.path.clone(), hash);
                    self.files.insert(file.path.clone(), file);
                }
                FileOutcome::Skipped(skipped) => report.files_skipped.push(skipped),
            }
        }
        self.manifests = self.parse_manifests(&scan.manifests, &mut report);

        let (table, resolution) = self.resolve();
        self.check_cancelled()?;

        let generation = self.store.next_generation(&self.project)?;
        let store = Arc::clone(&self.store);
        let mut ingestor = BatchIngestor::new(store.as_ref(), self.project.clone(), generation)
            .with_cancel(self.cancel.clone());
        let paths: Vec<String> = self.files.keys().cloned().collect();
        self.write_graph(&mut ingestor, &scan, &paths, &resolution, true)?;
        let summary = ingestor.finish()?;
        let swept = self.store.sweep(&self.project, generation)?;
        tracing::debug!(project = %self.project, swept, "stale rows removed");

        self.fill_report(&mut report, &paths, &table, &resolution);
        report.relationships = summary.relationships_written;
        report.dangling_relationships = summary.dangling;
        report.duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            project = %self.project,
            files = report.files_processed,
            skipped = report.files_skipped.len(),
            declarations = report.declarations,
            calls_resolved = report.calls_resolved,
            calls_unresolved = report.calls_unresolved,
            duration_ms = report.duration_ms,
            "index complete"
        );
        Ok(report)
    }

    /// Applies a set of changed paths in one transaction: the affected files' rows,
    /// every resolved relationship and the structure are deleted and rewritten.
    pub fn apply_changes(&mut self, paths: &[PathBuf]) -> Result<RunReport> {
        let update = self.reextract(paths)?;
        self.commit_update(update)
    }

    /// First half of an incremental update: re-extracts changed files into the cache.
    /// Nothing is written until [`Indexer::commit_update`].
    pub fn reextract(&mut self, paths: &[PathBuf]) -> Result<PendingUpdate> {
        let started = Instant::now();
        self.check_cancelled()?;
        let mut report = RunReport {
            project: self.project.clone(),
            ..RunReport::default()
        };

        let mut structure_changed = false;
        let mut removed: BTreeSet<String> = BTreeSet::new();
        let mut to_extract: Vec<ScannedFile> = Vec::new();
        let mut manifests_changed = false;
        for path in paths {
            let path = &self.under_root(path);
            let Some(rel_path) = crate::util::normalize_rel_path(&self.root, path) else {
                continue;
            };
            if self.ignores.is_ignored_path(&rel_path) {
                continue;
            }
            let file_name = rel_path.rsplit('/').next().unwrap_or(&rel_path);
            if scan::is_manifest(file_name) {
                manifests_changed = true;
            }
            match scan::scan_path(&self.root, path, &self.registry, &self.ignores) {
                Some(scanned) => to_extract.push(scanned),
                None if !path.exists() => {
                    // A removed directory takes every tracked file below it.
                    let prefix = format!("{rel_path}/");
                    for tracked in self.files.keys() {
                        if *tracked == rel_path || tracked.starts_with(&prefix) {
                            removed.insert(tracked.clone());
                        }
                    }
                    structure_changed = true;
                }
                None => structure_changed |= path.is_dir(),
            }
        }

        let previous: HashMap<String, Vec<String>> = to_extract
            .iter()
            .map(|file| file.rel_path.as_str())
            .chain(removed.iter().map(String::as_str))
            .filter_map(|path| {
                self.files.get(path).map(|file| {
                    let qns = file
                        .declarations
                        .iter()
                        .map(|decl| decl.qualified_name.clone())
                        .collect();
                    (path.to_string(), qns)
                })
            })
            .collect();

        let outcomes = self.extract_files(&to_extract)?;
        let mut replaced = CacheSnapshot::default();
        let mut touched: BTreeSet<String> = BTreeSet::new();
        for path in &removed {
            let file = self.files.remove(path);
            replaced.record(path, self.hashes.remove(path), file);
            touched.insert(path.clone());
        }
        for outcome in outcomes {
            match outcome {
                FileOutcome::Extracted { hash, file } => {
                    if self.hashes.get(&file.path) == Some(&hash) {
                        continue;
                    }
                    let path = file.path.clone();
                    let old_hash = self.hashes.insert(path.clone(), hash);
                    let old_file = self.files.insert(path.clone(), file);
                    replaced.record(&path, old_hash, old_file);
                    touched.insert(path);
                }
                FileOutcome::Skipped(skipped) => {
                    if let Some(file) = self.files.remove(&skipped.path) {
                        replaced.record(&skipped.path, self.hashes.remove(&skipped.path), Some(file));
                        touched.insert(skipped.path.clone());
                    }
                    report.files_skipped.push(skipped);
                }
            }
        }
        if touched.is_empty() && !manifests_changed && !structure_changed {
            tracing::debug!(project = %self.project, "no indexable changes");
            return Ok(PendingUpdate {
                started,
                report,
                affected: BTreeSet::new(),
                removed: 0,
                manifests_changed,
                noop: true,
                replaced,
            });
        }

        // Files sharing a qualified name with a touched file are rewritten too, so
        // the first-declared copy keeps winning as it does in a full index.
        let mut affected = touched.clone();
        let mut names: BTreeSet<&str> = BTreeSet::new();
        for path in &touched {
            names.extend(previous.get(path).into_iter().flatten().map(String::as_str));
            if let Some(file) = self.files.get(path) {
                names.extend(file.declarations.iter().map(|d| d.qualified_name.as_str()));
            }
        }
        for (path, file) in &self.files {
            if !affected.contains(path)
                && file
                    .declarations
                    .iter()
                    .any(|decl| names.contains(decl.qualified_name.as_str()))
            {
                affected.insert(path.clone());
            }
        }
        Ok(PendingUpdate {
            started,
            report,
            affected,
            removed: removed.len(),
            manifests_changed,
            noop: false,
            replaced,
        })
    }

    /// Second half of an incremental update: project-wide resolution and one
    /// delete-then-reinsert transaction. On failure the cache is put back as it
    /// was before [`Indexer::reextract`], so the same paths can be applied again.
    pub fn commit_update(&mut self, update: PendingUpdate) -> Result<RunReport> {
        let PendingUpdate {
            started,
            mut report,
            affected,
            removed,
            manifests_changed,
            noop,
            replaced,
        } = update;
        if noop {
            report.duration_ms = started.elapsed().as_millis() as u64;
            return Ok(report);
        }
        let manifests = manifests_changed.then(|| self.manifests.clone());
        if let Err(err) = self.write_update(&mut report, &affected, manifests_changed) {
            tracing::warn!(
                project = %self.project,
                files = replaced.entries.len(),
                "update not committed, restoring cached state: {err}"
            );
            self.restore(replaced, manifests);
            return Err(err);
        }
        report.duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            project = %self.project,
            files = report.files_processed,
            removed,
            calls_resolved = report.calls_resolved,
            duration_ms = report.duration_ms,
            "incremental update applied"
        );
        Ok(report)
    }

    fn restore(
        &mut self,
        replaced: CacheSnapshot,
        manifests: Option<BTreeMap<String, Vec<ExternalDependency>>>,
    ) {
        for (path, (hash, file)) in replaced.entries {
            match hash {
                Some(hash) => self.hashes.insert(path.clone(), hash),
                None => self.hashes.remove(&path),
            };
            match file {
                Some(file) => self.files.insert(path, file),
                None => self.files.remove(&path),
            };
        }
        if let Some(manifests) = manifests {
            self.manifests = manifests;
        }
    }

    fn write_update(
        &mut self,
        report: &mut RunReport,
        affected: &BTreeSet<String>,
        manifests_changed: bool,
    ) -> Result<()> {
        self.check_cancelled()?;
        let scan = scan::scan_repo(&self.root, &self.registry, &self.ignores)?;
        if manifests_changed {
            self.manifests = self.parse_manifests(&scan.manifests, report);
        }
        let (table, resolution) = self.resolve();
        self.check_cancelled()?;

        let generation = self.store.next_generation(&self.project)?;
        let store = Arc::clone(&self.store);
        let mut ingestor = BatchIngestor::new(store.as_ref(), self.project.clone(), generation)
            .single_transaction()
            .with_cancel(self.cancel.clone());
        for path in affected {
            ingestor.delete(Deletion::File(path.clone()));
        }
        ingestor.delete(Deletion::Origin(Origin::Resolution));
        ingestor.delete(Deletion::Origin(Origin::Structure));
        if manifests_changed {
            ingestor.delete(Deletion::Origin(Origin::Dependency));
        }
        let paths: Vec<String> = affected
            .iter()
            .filter(|path| self.files.contains_key(*path))
            .cloned()
            .collect();
        self.write_graph(&mut ingestor, &scan, &paths, &resolution, manifests_changed)?;
        let summary = ingestor.finish()?;

        self.fill_report(report, &paths, &table, &resolution);
        report.relationships = summary.relationships_written;
        report.dangling_relationships = summary.dangling;
        Ok(())
    }

    fn extract_files(&self, files: &[ScannedFile]) -> Result<Vec<FileOutcome>> {
        let run = || {
            files
                .par_iter()
                .map(|file| {
                    self.cancel.check()?;
                    Ok(self.extract_one(file))
                })
                .collect::<Result<Vec<_>>>()
        };
        match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        }
    }

    fn extract_one(&self, scanned: &ScannedFile) -> FileOutcome {
        let skip = |reason: String| {
            tracing::warn!(path = %scanned.rel_path, %reason, "skipping file");
            FileOutcome::Skipped(SkippedFile {
                path: scanned.rel_path.clone(),
                reason,
            })
        };
        let max_bytes = Config::get().max_file_bytes;
        if scanned.size > max_bytes {
            return skip("too_large".to_string());
        }
        let Some(config) = self.registry.by_name(&scanned.language) else {
            return skip(format!("unknown language {}", scanned.language));
        };
        let bytes = match crate::util::read_bytes(&scanned.abs_path) {
            Ok(bytes) => bytes,
            Err(err) => return skip(err.skip_reason()),
        };
        if bytes.len() as u64 > max_bytes {
            return skip("too_large".to_string());
        }
        let hash = crate::util::content_hash(&bytes);
        let tree = match self.provider.parse(config, &scanned.rel_path, &bytes) {
            Ok(tree) => tree,
            Err(err) => return skip(err.skip_reason()),
        };
        let file = extract::extract(&self.project, &scanned.rel_path, &tree, config);
        for error in &file.errors {
            tracing::warn!(path = %file.path, language = %file.language, "{error}");
        }
        tracing::debug!(
            path = %file.path,
            declarations = file.declarations.len(),
            calls = file.calls.len(),
            "file extracted"
        );
        FileOutcome::Extracted { hash, file }
    }

    fn parse_manifests(
        &self,
        manifests: &[String],
        report: &mut RunReport,
    ) -> BTreeMap<String, Vec<ExternalDependency>> {
        let mut parsed = BTreeMap::new();
        for rel_path in manifests {
            let path = self.root.join(rel_path);
            let text = match std::fs::read_to_string(&path) {
                Ok(text) => text,
                Err(err) => {
                    tracing::warn!(path = %rel_path, "unreadable manifest: {err}");
                    continue;
                }
            };
            match manifest::parse_manifest(rel_path, &text) {
                Ok(deps) => {
                    parsed.insert(rel_path.clone(), deps);
                }
                Err(err) => {
                    tracing::warn!(path = %rel_path, "malformed manifest skipped: {err}");
                    report.files_skipped.push(SkippedFile {
                        path: rel_path.clone(),
                        reason: err.skip_reason(),
                    });
                }
            }
        }
        parsed
    }

    /// Symbol table over every cached file, then project-wide resolution.
    fn resolve(&self) -> (SymbolTable, Resolution) {
        let mut table = SymbolTable::build(&self.project, self.files.values());
        let resolution = resolve::resolve_project(&mut table, &self.files, &self.registry);
        (table, resolution)
    }

    /// Queues the project node, structure, declarations of `paths`, dependencies
    /// (when `with_dependencies`) and every resolved relationship.
    fn write_graph(
        &self,
        ingestor: &mut BatchIngestor<'_>,
        scan: &RepoScan,
        paths: &[String],
        resolution: &Resolution,
        with_dependencies: bool,
    ) -> Result<()> {
        ingestor.add_node(structure::project_node(&self.project))?;
        let modules: BTreeMap<String, String> = self
            .files
            .iter()
            .map(|(path, file)| (path.clone(), file.module_qn.clone()))
            .collect();
        let structure = structure::build(&self.project, scan, &modules);
        for node in structure.nodes {
            ingestor.add_node(node)?;
        }

        for path in paths {
            self.check_cancelled()?;
            let Some(file) = self.files.get(path) else {
                continue;
            };
            for decl in &file.declarations {
                ingestor.add_declaration(decl, Origin::Declaration)?;
            }
            for rel in local_relationships(file) {
                ingestor.add_relationship(rel)?;
            }
        }

        for rel in structure.relationships {
            ingestor.add_relationship(rel)?;
        }
        if with_dependencies {
            for dep in self.manifests.values().flatten() {
                ingestor.add_node(dep.node())?;
                ingestor.add_relationship(dep.relationship(&self.project))?;
            }
        }
        for rel in &resolution.relationships {
            ingestor.add_relationship(rel.clone())?;
        }
        Ok(())
    }

    fn fill_report(
        &self,
        report: &mut RunReport,
        paths: &[String],
        table: &SymbolTable,
        resolution: &Resolution,
    ) {
        report.files_processed = paths.len();
        for path in paths {
            if let Some(file) = self.files.get(path) {
                report.declarations += file.declarations.len();
                report.extraction_errors += file.errors.len();
                report.name_collisions += file.collisions;
            }
        }
        report.name_collisions += table.collisions();
        report.calls_resolved = resolution.calls_resolved;
        report.calls_unresolved = resolution.calls_unresolved;
        report.unresolved_by_file = resolution.unresolved_by_file.clone();
    }
}

/// Containment edges of one file, attributed to it.
fn local_relationships(file: &ExtractedFile) -> Vec<GraphRelationship> {
    let labels: HashMap<&str, NodeRef> = file
        .declarations
        .iter()
        .map(|decl| (decl.qualified_name.as_str(), decl.node_ref()))
        .collect();
    file.edges
        .iter()
        .filter_map(|edge| {
            let source = labels.get(edge.source.as_str())?.clone();
            let target = labels.get(edge.target.as_str())?.clone();
            Some(
                GraphRelationship::new(source, edge.kind, target, Origin::Declaration)
                    .in_file(&file.path),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::SqliteGraphStore;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, text: &str) -> PathBuf {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, text).unwrap();
        path
    }

    fn indexer(repo: &TempDir, db: &TempDir) -> Indexer {
        let store = Arc::new(SqliteGraphStore::open(&db.path().join("graph.db")).unwrap());
        Indexer::new(IndexOptions::new(repo.path()).with_project("demo"), store).unwrap()
    }

    #[test]
    fn unchanged_content_is_not_rewritten() {
        let repo = TempDir::new().unwrap();
        let db = TempDir::new().unwrap();
        let path = write(repo.path(), "a.py", "def helper():\n    return 1\n");
        let mut indexer = indexer(&repo, &db);
        indexer.index_all().unwrap();

        let report = indexer.apply_changes(&[path]).unwrap();
        assert_eq!(report.files_processed, 0);
        assert_eq!(report.declarations, 0);
    }

    #[test]
    fn failed_commit_keeps_the_change_for_the_next_attempt() {
        let repo = TempDir::new().unwrap();
        let db = TempDir::new().unwrap();
        let db_path = db.path().join("graph.db");
        let path = write(repo.path(), "a.py", "def helper():\n    return 1\n");
        let retry = crate::graph::RetryPolicy {
            attempts: 2,
            backoff: std::time::Duration::from_millis(1),
            busy_timeout: std::time::Duration::ZERO,
        };
        let store = Arc::new(SqliteGraphStore::open(&db_path).unwrap().with_retry(retry).unwrap());
        let mut indexer =
            Indexer::new(IndexOptions::new(repo.path()).with_project("demo"), store.clone()).unwrap();
        indexer.index_all().unwrap();

        write(
            repo.path(),
            "a.py",
            "def helper():\n    return 1\n\ndef added():\n    return 2\n",
        );
        let locker = rusqlite::Connection::open(&db_path).unwrap();
        locker.execute_batch("BEGIN EXCLUSIVE").unwrap();
        let err = indexer.apply_changes(std::slice::from_ref(&path)).unwrap_err();
        assert!(matches!(err, IndexError::StorageTransient { .. }), "{err:?}");
        locker.execute_batch("COMMIT").unwrap();
        let cached = &indexer.files()["a.py"];
        assert!(!cached.declarations.iter().any(|decl| decl.name == "added"));

        let report = indexer.apply_changes(&[path]).unwrap();
        assert_eq!(report.files_processed, 1);
        assert_eq!(store.stats("demo").unwrap().nodes.get("Function"), Some(&2));
    }

    #[test]
    fn cancelled_run_returns_cancelled() {
        let repo = TempDir::new().unwrap();
        let db = TempDir::new().unwrap();
        write(repo.path(), "a.py", "def helper():\n    return 1\n");
        let mut indexer = indexer(&repo, &db);
        indexer.cancel_token().cancel();
        assert!(matches!(indexer.index_all(), Err(IndexError::Cancelled)));
        assert!(indexer.store().stats("demo").unwrap().nodes.is_empty());
    }

    #[test]
    fn local_edges_resolve_labels_from_the_file() {
        let repo = TempDir::new().unwrap();
        let db = TempDir::new().unwrap();
        write(
            repo.path(),
            "shapes.py",
            "class Square:\n    def area(self):\n        return 4\n",
        );
        let mut indexer = indexer(&repo, &db);
        indexer.index_all().unwrap();
        let file = &indexer.files()["shapes.py"];
        let rels = local_relationships(file);
        assert!(rels.iter().any(|rel| rel.source.key == "demo.shapes.Square"
            && rel.target.key == "demo.shapes.Square.area"
            && rel.file_path.as_deref() == Some("shapes.py")));
    }
}
