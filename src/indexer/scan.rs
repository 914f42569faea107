use crate::error::{IndexError, Result};
use crate::languages::LanguageRegistry;
use ignore::WalkBuilder;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Directory names never descended into.
pub const BUILTIN_IGNORES: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "venv",
    ".venv",
    "env",
    "__pycache__",
    "node_modules",
    "build",
    "dist",
    "target",
    ".eggs",
    ".idea",
    ".vscode",
    ".mypy_cache",
    ".pytest_cache",
    ".tox",
    "vendor",
];

pub const IGNORE_FILE: &str = ".cgidxignore";

/// File names parsed for external dependencies.
pub const MANIFEST_NAMES: &[&str] = &[
    "requirements.txt",
    "pyproject.toml",
    "package.json",
    "Cargo.toml",
    "go.mod",
];

#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub rel_path: String,
    pub abs_path: PathBuf,
    pub size: u64,
    pub language: String,
}

#[derive(Debug, Clone, Default)]
pub struct RepoScan {
    /// Source files with a registered language, sorted by path.
    pub files: Vec<ScannedFile>,
    /// Every non-ignored directory below the root, mapped to whether it is a package.
    pub directories: BTreeMap<String, bool>,
    pub manifests: Vec<String>,
}

/// Exact-match directory names excluded from indexing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreSet {
    names: BTreeSet<String>,
}

impl IgnoreSet {
    /// Built-ins, then `.cgidxignore` under `root`, then caller overrides.
    /// An override written `!name` removes `name` from the merged set.
    pub fn load(root: &Path, overrides: &[String]) -> Result<Self> {
        let mut set = Self::builtin();
        let path = root.join(IGNORE_FILE);
        match fs::read_to_string(&path) {
            Ok(text) => {
                for line in text.lines() {
                    set.apply(line);
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(IndexError::io(path, err)),
        }
        for entry in overrides {
            set.apply(entry);
        }
        Ok(set)
    }

    pub fn builtin() -> Self {
        Self {
            names: BUILTIN_IGNORES.iter().map(|name| name.to_string()).collect(),
        }
    }

    fn apply(&mut self, entry: &str) {
        let entry = entry.trim();
        if entry.is_empty() || entry.starts_with('#') {
            return;
        }
        let entry = entry.trim_end_matches('/');
        match entry.strip_prefix('!') {
            Some(removed) => {
                self.names.remove(removed.trim());
            }
            None => {
                self.names.insert(entry.to_string());
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// True when any directory component of `rel_path` is ignored.
    pub fn is_ignored_path(&self, rel_path: &str) -> bool {
        let mut parts: Vec<&str> = rel_path.split('/').collect();
        parts.pop();
        parts.iter().any(|part| self.contains(part))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

/// Whether `file_name` matches one of the package indicator patterns (`*.csproj` style allowed).
pub fn is_package_indicator(file_name: &str, indicators: &[&str]) -> bool {
    indicators.iter().any(|pattern| match pattern.strip_prefix('*') {
        Some(suffix) => file_name.ends_with(suffix) && file_name.len() > suffix.len(),
        None => *pattern == file_name,
    })
}

pub fn is_manifest(file_name: &str) -> bool {
    MANIFEST_NAMES.contains(&file_name)
}

pub fn scan_repo(
    repo_root: &Path,
    registry: &LanguageRegistry,
    ignores: &IgnoreSet,
) -> Result<RepoScan> {
    if !repo_root.is_dir() {
        return Err(IndexError::io(
            repo_root,
            std::io::Error::new(std::io::ErrorKind::NotFound, "repository root is not a directory"),
        ));
    }
    let indicators = registry.package_indicators();
    let mut scan = RepoScan::default();
    let walker = WalkBuilder::new(repo_root)
        .standard_filters(false)
        .follow_links(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry({
            let ignores = ignores.clone();
            move |entry| {
                let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
                entry.depth() == 0
                    || !is_dir
                    || !ignores.contains(&entry.file_name().to_string_lossy())
            }
        })
        .build();

    for entry in walker {
        let entry = match entry {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("walk error: {err}");
                continue;
            }
        };
        let path = entry.path();
        let Some(rel_path) = crate::util::normalize_rel_path(repo_root, path) else {
            continue;
        };
        let Some(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            if entry.depth() > 0 {
                scan.directories.entry(rel_path).or_insert(false);
            }
            continue;
        }
        if !file_type.is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy();
        let parent = parent_dir(&rel_path);
        if is_package_indicator(&file_name, &indicators) && !parent.is_empty() {
            scan.directories.insert(parent.to_string(), true);
        }
        if is_manifest(&file_name) {
            scan.manifests.push(rel_path.clone());
        }
        let Some(language) = registry.for_path(path) else {
            continue;
        };
        let size = entry.metadata().map(|meta| meta.len()).unwrap_or(0);
        scan.files.push(ScannedFile {
            rel_path,
            abs_path: path.to_path_buf(),
            size,
            language: language.name.clone(),
        });
    }
    scan.files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    scan.manifests.sort();
    tracing::debug!(
        files = scan.files.len(),
        directories = scan.directories.len(),
        manifests = scan.manifests.len(),
        "repository scanned"
    );
    Ok(scan)
}

/// Scans a single path reported by the watcher. `None` for paths that are not indexable.
pub fn scan_path(
    repo_root: &Path,
    path: &Path,
    registry: &LanguageRegistry,
    ignores: &IgnoreSet,
) -> Option<ScannedFile> {
    let rel_path = crate::util::normalize_rel_path(repo_root, path)?;
    if ignores.is_ignored_path(&rel_path) {
        return None;
    }
    let language = registry.for_path(path)?;
    let metadata = fs::metadata(path).ok()?;
    if !metadata.is_file() {
        return None;
    }
    Some(ScannedFile {
        rel_path,
        abs_path: path.to_path_buf(),
        size: metadata.len(),
        language: language.name.clone(),
    })
}

pub fn parent_dir(rel_path: &str) -> &str {
    rel_path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}
