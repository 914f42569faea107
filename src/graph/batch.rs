//! Buffered, deduplicating writer in front of a [`GraphStore`].

use crate::config::Config;
use crate::error::Result;
use crate::graph::{Deletion, GraphStore, WriteBatch};
use crate::model::{Declaration, GraphNode, GraphRelationship, NodeRef, Origin, RelationshipKind};
use crate::util::CancelToken;
use std::collections::HashSet;
use std::time::{Duration, Instant};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    pub nodes_written: usize,
    pub relationships_written: usize,
    pub batches: usize,
    /// Relationships dropped because an endpoint never appeared.
    pub dangling: usize,
}

/// Accumulates nodes and relationships and writes them in transactional batches.
///
/// Nodes precede relationships inside each batch. A relationship whose endpoint
/// is not stored yet is kept and retried on every later flush.
pub struct BatchIngestor<'a> {
    store: &'a dyn GraphStore,
    project: String,
    generation: i64,
    batch_size: usize,
    flush_interval: Option<Duration>,
    pending: WriteBatch,
    deferred: Vec<GraphRelationship>,
    seen_nodes: HashSet<NodeRef>,
    seen_relationships: HashSet<(NodeRef, RelationshipKind, NodeRef)>,
    last_flush: Instant,
    cancel: Option<CancelToken>,
    summary: IngestSummary,
}

impl<'a> BatchIngestor<'a> {
    pub fn new(store: &'a dyn GraphStore, project: impl Into<String>, generation: i64) -> Self {
        let config = Config::get();
        Self {
            store,
            project: project.into(),
            generation,
            batch_size: config.batch_size,
            flush_interval: Some(config.flush_interval()),
            pending: WriteBatch::default(),
            deferred: Vec::new(),
            seen_nodes: HashSet::new(),
            seen_relationships: HashSet::new(),
            last_flush: Instant::now(),
            cancel: None,
            summary: IngestSummary::default(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Everything goes out in one transaction at `finish`.
    pub fn single_transaction(mut self) -> Self {
        self.batch_size = usize::MAX;
        self.flush_interval = None;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Queues a deletion that runs at the start of the next batch.
    pub fn delete(&mut self, deletion: Deletion) {
        self.pending.deletions.push(deletion);
    }

    pub fn add_declaration(&mut self, decl: &Declaration, origin: Origin) -> Result<()> {
        self.add_node(GraphNode::from_declaration(decl, origin))
    }

    pub fn add_node(&mut self, node: GraphNode) -> Result<()> {
        if !self.seen_nodes.insert(node.node.clone()) {
            tracing::trace!(key = %node.node.key, "duplicate node ignored");
            return Ok(());
        }
        self.pending.nodes.push(node);
        self.maybe_flush()
    }

    pub fn add_relationship(&mut self, rel: GraphRelationship) -> Result<()> {
        if !self.seen_relationships.insert(rel.identity()) {
            return Ok(());
        }
        self.pending.relationships.push(rel);
        self.maybe_flush()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.nodes.len() + self.pending.relationships.len()
    }

    fn maybe_flush(&mut self) -> Result<()> {
        let full = self.pending_len() >= self.batch_size;
        let stale = self
            .flush_interval
            .is_some_and(|interval| self.last_flush.elapsed() >= interval);
        if full || stale {
            self.flush()?;
        }
        Ok(())
    }

    /// Writes the buffer plus every deferred relationship in one transaction.
    pub fn flush(&mut self) -> Result<()> {
        if let Some(cancel) = &self.cancel {
            cancel.check()?;
        }
        let mut batch = std::mem::take(&mut self.pending);
        if batch.is_empty() && self.deferred.is_empty() {
            return Ok(());
        }
        let mut relationships = std::mem::take(&mut self.deferred);
        relationships.append(&mut batch.relationships);
        batch.relationships = relationships;

        let outcome = self
            .store
            .write_batch(&self.project, self.generation, &batch)?;
        self.summary.batches += 1;
        self.summary.nodes_written += outcome.nodes_written;
        self.summary.relationships_written += outcome.relationships_written;
        self.deferred = outcome.deferred;
        self.last_flush = Instant::now();
        Ok(())
    }

    pub fn finish(mut self) -> Result<IngestSummary> {
        self.flush()?;
        if !self.deferred.is_empty() {
            for rel in &self.deferred {
                tracing::warn!(
                    source = %rel.source.key,
                    kind = rel.kind.as_str(),
                    target = %rel.target.key,
                    "dropping relationship with a missing endpoint"
                );
            }
            self.summary.dangling = self.deferred.len();
        }
        Ok(self.summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::SqliteGraphStore;
    use crate::model::NodeLabel;
    use tempfile::TempDir;

    fn func(qn: &str) -> Declaration {
        Declaration::new(NodeLabel::Function, qn, qn.rsplit('.').next().unwrap()).with_path("a.py")
    }

    #[test]
    fn forward_references_are_applied_once_the_target_appears() {
        let dir = TempDir::new().unwrap();
        let store = SqliteGraphStore::open(&dir.path().join("g.db")).unwrap();
        let caller = func("p.a.main");
        let callee = func("p.a.helper");
        let mut ingestor = BatchIngestor::new(&store, "p", 1).with_batch_size(2);

        ingestor.add_declaration(&caller, Origin::Declaration).unwrap();
        ingestor
            .add_relationship(GraphRelationship::new(
                caller.node_ref(),
                RelationshipKind::Calls,
                callee.node_ref(),
                Origin::Resolution,
            ))
            .unwrap();
        // Flushed at the threshold with the relationship deferred.
        assert_eq!(ingestor.pending_len(), 0);
        ingestor.add_declaration(&callee, Origin::Declaration).unwrap();
        ingestor.add_declaration(&callee, Origin::Declaration).unwrap();

        let summary = ingestor.finish().unwrap();
        assert_eq!(summary.nodes_written, 2);
        assert_eq!(summary.relationships_written, 1);
        assert_eq!(summary.dangling, 0);
    }

    #[test]
    fn unresolvable_relationships_are_counted() {
        let dir = TempDir::new().unwrap();
        let store = SqliteGraphStore::open(&dir.path().join("g.db")).unwrap();
        let caller = func("p.a.main");
        let mut ingestor = BatchIngestor::new(&store, "p", 1).single_transaction();
        ingestor.add_declaration(&caller, Origin::Declaration).unwrap();
        ingestor
            .add_relationship(GraphRelationship::new(
                caller.node_ref(),
                RelationshipKind::Calls,
                func("p.a.ghost").node_ref(),
                Origin::Resolution,
            ))
            .unwrap();
        let summary = ingestor.finish().unwrap();
        assert_eq!(summary.batches, 1);
        assert_eq!(summary.dangling, 1);
    }

    #[test]
    fn cancelled_flush_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let store = SqliteGraphStore::open(&dir.path().join("g.db")).unwrap();
        let cancel = CancelToken::new();
        let mut ingestor = BatchIngestor::new(&store, "p", 1)
            .single_transaction()
            .with_cancel(cancel.clone());
        ingestor
            .add_declaration(&func("p.a.main"), Origin::Declaration)
            .unwrap();
        cancel.cancel();
        assert!(ingestor.finish().is_err());
        assert!(store.stats("p").unwrap().nodes.is_empty());
    }
}
