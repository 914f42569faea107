//! Graph model persistence: the store contract, its SQLite implementation and
//! the batching ingestor in front of it.

pub mod batch;
pub mod export;
mod migrations;
pub mod store;

pub use batch::BatchIngestor;
pub use export::{ExportDocument, ExportMetadata, ExportNode, ExportRelationship};
pub use store::{RetryPolicy, SqliteGraphStore};

use crate::error::Result;
use crate::model::{GraphNode, GraphRelationship, GraphStats, Origin};

/// Rows removed at the start of a batch, inside the same transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deletion {
    /// Declarations and local relationships produced from one file.
    File(String),
    /// Every row a phase produced.
    Origin(Origin),
}

#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    pub deletions: Vec<Deletion>,
    pub nodes: Vec<GraphNode>,
    pub relationships: Vec<GraphRelationship>,
}

impl WriteBatch {
    pub fn is_empty(&self) -> bool {
        self.deletions.is_empty() && self.nodes.is_empty() && self.relationships.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct WriteOutcome {
    pub nodes_written: usize,
    pub relationships_written: usize,
    /// Relationships whose endpoints were not stored yet. Nothing was written for them.
    pub deferred: Vec<GraphRelationship>,
}

/// Persistent property-graph store, namespaced by project.
pub trait GraphStore: Send + Sync {
    fn ensure_constraints(&self) -> Result<()>;

    /// Allocates the generation stamped on every row of the next run.
    fn next_generation(&self, project: &str) -> Result<i64>;

    /// Applies deletions, upserts nodes and then relationships in one transaction.
    fn write_batch(&self, project: &str, generation: i64, batch: &WriteBatch)
    -> Result<WriteOutcome>;

    /// Removes rows older than `generation`. Returns the number of rows removed.
    fn sweep(&self, project: &str, generation: i64) -> Result<usize>;

    fn clean(&self, project: &str) -> Result<()>;

    fn export(&self, project: &str) -> Result<ExportDocument>;

    /// Replaces the project's graph with the document's content.
    fn import(&self, project: &str, document: &ExportDocument) -> Result<()>;

    fn stats(&self, project: &str) -> Result<GraphStats>;
}
