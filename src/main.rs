use anyhow::{Context, Result};
use clap::Parser;
use cgidx::graph::{ExportDocument, GraphStore, SqliteGraphStore};
use cgidx::indexer::{IndexOptions, Indexer};
use cgidx::languages::LanguageRegistry;
use cgidx::{cli, config::Config, logging, watch};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;

const STORE_DIR: &str = ".cgidx";

fn default_db_path(root: &Path) -> PathBuf {
    root.join(STORE_DIR).join("graph.db")
}

fn open_store(db: Option<PathBuf>, root: &Path) -> Result<Arc<SqliteGraphStore>> {
    let db_path = db.unwrap_or_else(|| default_db_path(root));
    let store = SqliteGraphStore::open(&db_path)
        .with_context(|| format!("open graph store {}", db_path.display()))?;
    Ok(Arc::new(store))
}

fn project_name(project: Option<String>, root: &Path) -> String {
    project.unwrap_or_else(|| cgidx::util::default_project_name(root))
}

fn build_indexer(args: cli::IndexArgs) -> Result<Indexer> {
    let store = open_store(args.db, &args.root)?;
    let mut options = IndexOptions::new(&args.root).with_ignore([STORE_DIR]);
    options = options.with_ignore(args.ignore);
    if let Some(project) = args.project {
        options = options.with_project(project);
    }
    if let Some(languages) = args.languages {
        options = options.with_languages(languages);
    }
    Indexer::new(options, store)
        .with_context(|| format!("prepare indexer for {}", args.root.display()))
}

fn main() -> Result<()> {
    let args = cli::Args::parse();
    logging::init(args.verbose);

    match args.command {
        cli::Command::Index { args, clean } => {
            let root = args.root.clone();
            let mut indexer = build_indexer(args)?;
            if clean {
                indexer.store().clean(indexer.project())?;
            }
            let report = indexer
                .index_all()
                .with_context(|| format!("index {}", root.display()))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        cli::Command::Watch { args, debounce_ms } => {
            let mut indexer = build_indexer(args)?;
            let report = indexer.index_all()?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            let debounce = debounce_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| Config::get().debounce());
            let handle = watch::start(indexer, debounce)?;
            let (stop_tx, stop_rx) = mpsc::channel::<()>();
            // Stdin closing (or a line on it) stops watching.
            std::thread::spawn(move || {
                let mut line = String::new();
                let _ = std::io::stdin().read_line(&mut line);
                let _ = stop_tx.send(());
            });
            while !handle.is_finished() {
                if stop_rx.recv_timeout(Duration::from_millis(500)).is_ok() {
                    break;
                }
            }
            handle.stop()?;
            Ok(())
        }
        cli::Command::Export { store, output } => {
            let project = project_name(store.project, &store.root);
            let graph = open_store(store.db, &store.root)?;
            let document = graph.export(&project)?;
            let text = serde_json::to_string_pretty(&document)?;
            match output {
                Some(path) => std::fs::write(&path, text)
                    .with_context(|| format!("write {}", path.display()))?,
                None => println!("{text}"),
            }
            Ok(())
        }
        cli::Command::Import { store, input } => {
            let project = project_name(store.project, &store.root);
            let graph = open_store(store.db, &store.root)?;
            let text = std::fs::read_to_string(&input)
                .with_context(|| format!("read {}", input.display()))?;
            let document: ExportDocument = serde_json::from_str(&text)
                .with_context(|| format!("parse graph document {}", input.display()))?;
            graph.import(&project, &document)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "project": project,
                    "nodes": document.nodes.len(),
                    "relationships": document.relationships.len(),
                }))?
            );
            Ok(())
        }
        cli::Command::Clean { store } => {
            let project = project_name(store.project, &store.root);
            let graph = open_store(store.db, &store.root)?;
            graph.clean(&project)?;
            println!("{}", serde_json::to_string_pretty(&json!({ "cleaned": project }))?);
            Ok(())
        }
        cli::Command::Stats { store } => {
            let project = project_name(store.project, &store.root);
            let graph = open_store(store.db, &store.root)?;
            let stats = graph.stats(&project)?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
        cli::Command::LanguagesSchema => {
            println!(
                "{}",
                serde_json::to_string_pretty(&LanguageRegistry::json_schema())?
            );
            Ok(())
        }
    }
}
