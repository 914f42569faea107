use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "cgidx",
    version,
    about = "Polyglot code graph indexer",
    after_help = r#"Examples:
  cgidx index . --project demo
  cgidx watch . --ignore generated
  cgidx stats --root .
  cgidx export --root . --output graph.json
  cgidx import --root . --input graph.json
  cgidx clean --project demo --db .cgidx/graph.db
"#
)]
pub struct Args {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace). CGIDX_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Command,
}

/// Locates the graph store and the project inside it.
#[derive(ClapArgs, Clone)]
pub struct StoreArgs {
    /// Repository root; names the project and the default store location.
    #[arg(long, default_value = ".")]
    pub root: PathBuf,
    /// Project name, defaults to the root directory's name.
    #[arg(long)]
    pub project: Option<String>,
    /// SQLite database, defaults to <root>/.cgidx/graph.db.
    #[arg(long)]
    pub db: Option<PathBuf>,
}

#[derive(ClapArgs, Clone)]
pub struct IndexArgs {
    #[arg(default_value = ".")]
    pub root: PathBuf,
    #[arg(long)]
    pub project: Option<String>,
    #[arg(long)]
    pub db: Option<PathBuf>,
    /// Directory name to skip; `!name` re-includes a default.
    #[arg(long = "ignore", value_name = "NAME")]
    pub ignore: Vec<String>,
    /// YAML language configuration replacing the built-in one.
    #[arg(long, value_name = "FILE")]
    pub languages: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Index a repository once and print the run report.
    Index {
        #[command(flatten)]
        args: IndexArgs,
        /// Remove the project's existing graph first.
        #[arg(long)]
        clean: bool,
    },
    /// Index, then apply file changes until interrupted.
    Watch {
        #[command(flatten)]
        args: IndexArgs,
        /// Debounce window in milliseconds (CGIDX_DEBOUNCE_MS when omitted).
        #[arg(long)]
        debounce_ms: Option<u64>,
    },
    /// Write the project's graph as JSON.
    Export {
        #[command(flatten)]
        store: StoreArgs,
        /// Output file, stdout when omitted.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Replace the project's graph with an exported document.
    Import {
        #[command(flatten)]
        store: StoreArgs,
        #[arg(long)]
        input: PathBuf,
    },
    /// Remove the project's graph.
    Clean {
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Print node and relationship counts.
    Stats {
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Print the JSON schema of the language configuration file.
    LanguagesSchema,
}
