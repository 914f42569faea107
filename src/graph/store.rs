use crate::config::Config;
use crate::error::{IndexError, Result};
use crate::graph::export::ExportDocument;
use crate::graph::migrations;
use crate::graph::{Deletion, GraphStore, WriteBatch, WriteOutcome};
use crate::model::{
    GraphNode, GraphRelationship, GraphStats, NodeLabel, NodeRef, Origin, Properties,
    RelationshipKind,
};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, ErrorCode, Transaction, params};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug)]
struct ConnectionCustomizer;

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for ConnectionCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;
        Ok(())
    }

    fn on_release(&self, _conn: Connection) {}
}

/// Bounded retry for write transactions that hit `SQLITE_BUSY`/`SQLITE_LOCKED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    /// Wait before the second attempt, doubled after each failure.
    pub backoff: Duration,
    /// SQLite's own wait on a locked database inside one attempt.
    pub busy_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            attempts: config.retry_attempts.max(1),
            backoff: config.retry_backoff(),
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// SQLite-backed graph store: one serialized writer, pooled readers.
///
/// WAL mode lets readers keep seeing the last committed transaction while a
/// batch is being written.
pub struct SqliteGraphStore {
    db_path: PathBuf,
    write_conn: Arc<Mutex<Connection>>,
    read_pool: Pool<SqliteConnectionManager>,
    retry: RetryPolicy,
}

impl SqliteGraphStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|err| IndexError::io(parent, err))?;
        }
        let config = Config::get();
        let retry = RetryPolicy::from_config(config);

        let write_conn = Connection::open(db_path)?;
        write_conn.busy_timeout(retry.busy_timeout)?;
        write_conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;
        migrations::migrate(&write_conn)?;
        migrations::ensure_constraints(&write_conn)?;

        let manager = SqliteConnectionManager::file(db_path);
        let read_pool = Pool::builder()
            .max_size(config.pool_size.max(1))
            .connection_timeout(Duration::from_secs(30))
            .connection_customizer(Box::new(ConnectionCustomizer))
            .build(manager)?;

        tracing::debug!(path = %db_path.display(), pool_size = config.pool_size, "graph store opened");
        Ok(Self {
            db_path: db_path.to_path_buf(),
            write_conn: Arc::new(Mutex::new(write_conn)),
            read_pool,
            retry,
        })
    }

    /// Replaces the retry policy taken from [`Config`].
    pub fn with_retry(mut self, retry: RetryPolicy) -> Result<Self> {
        self.conn().busy_timeout(retry.busy_timeout)?;
        self.retry = RetryPolicy {
            attempts: retry.attempts.max(1),
            ..retry
        };
        Ok(self)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.write_conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read_conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        Ok(self.read_pool.get()?)
    }

    /// Runs a write operation, retrying busy/locked failures with exponential backoff.
    /// The operation owns its transaction, so a failed attempt leaves nothing behind.
    fn with_write<T>(
        &self,
        mut op: impl FnMut(&mut Connection) -> rusqlite::Result<T>,
    ) -> Result<T> {
        let mut backoff = self.retry.backoff;
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let result = {
                let mut conn = self.conn();
                op(&mut conn)
            };
            match result {
                Ok(value) => return Ok(value),
                Err(err) if is_transient(&err) => {
                    if attempt >= self.retry.attempts {
                        return Err(IndexError::StorageTransient {
                            attempts: attempt,
                            source: err,
                        });
                    }
                    tracing::warn!(attempt, ?backoff, "graph store busy, retrying");
                    std::thread::sleep(backoff);
                    backoff = backoff.saturating_mul(2);
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn read_nodes(&self, project: &str) -> Result<Vec<GraphNode>> {
        let conn = self.read_conn()?;
        let mut stmt = conn.prepare(
            "SELECT label, key, properties, origin, file_path FROM nodes
             WHERE project = ?1 ORDER BY label, key",
        )?;
        let rows = stmt
            .query_map(params![project], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        let mut nodes = Vec::with_capacity(rows.len());
        for (label, key, properties, origin, file_path) in rows {
            let Some(label) = NodeLabel::parse(&label) else {
                tracing::warn!(%label, %key, "skipping node with unknown label");
                continue;
            };
            nodes.push(GraphNode {
                node: NodeRef::new(label, key),
                properties: serde_json::from_str::<Properties>(&properties)?,
                origin: Origin::parse(&origin).unwrap_or(Origin::Declaration),
                file_path,
            });
        }
        Ok(nodes)
    }

    fn read_relationships(&self, project: &str) -> Result<Vec<GraphRelationship>> {
        let conn = self.read_conn()?;
        let mut stmt = conn.prepare(
            "SELECT source_label, source_key, rel_type, target_label, target_key,
                    properties, origin, file_path
             FROM relationships WHERE project = ?1",
        )?;
        let rows = stmt
            .query_map(params![project], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, Option<String>>(7)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        let mut relationships = Vec::with_capacity(rows.len());
        for (source_label, source_key, kind, target_label, target_key, properties, origin, file) in
            rows
        {
            let (Some(source_label), Some(kind), Some(target_label)) = (
                NodeLabel::parse(&source_label),
                RelationshipKind::parse(&kind),
                NodeLabel::parse(&target_label),
            ) else {
                tracing::warn!(%kind, "skipping relationship with unknown label or type");
                continue;
            };
            relationships.push(GraphRelationship {
                source: NodeRef::new(source_label, source_key),
                kind,
                target: NodeRef::new(target_label, target_key),
                properties: serde_json::from_str::<Properties>(&properties)?,
                origin: Origin::parse(&origin).unwrap_or(Origin::Resolution),
                file_path: file,
            });
        }
        Ok(relationships)
    }
}

fn is_transient(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if matches!(failure.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

fn apply_deletion(tx: &Transaction<'_>, project: &str, deletion: &Deletion) -> rusqlite::Result<()> {
    match deletion {
        Deletion::File(path) => {
            let origin = Origin::Declaration.as_str();
            tx.execute(
                "DELETE FROM relationships WHERE project = ?1 AND file_path = ?2 AND origin = ?3",
                params![project, path, origin],
            )?;
            tx.execute(
                "DELETE FROM nodes WHERE project = ?1 AND file_path = ?2 AND origin = ?3",
                params![project, path, origin],
            )?;
        }
        Deletion::Origin(origin) => {
            tx.execute(
                "DELETE FROM relationships WHERE project = ?1 AND origin = ?2",
                params![project, origin.as_str()],
            )?;
            tx.execute(
                "DELETE FROM nodes WHERE project = ?1 AND origin = ?2",
                params![project, origin.as_str()],
            )?;
        }
    }
    Ok(())
}

/// Drops relationships whose source or target node no longer exists.
fn remove_dangling(tx: &Transaction<'_>, project: &str) -> rusqlite::Result<usize> {
    tx.execute(
        "DELETE FROM relationships
         WHERE project = ?1
           AND (NOT EXISTS (SELECT 1 FROM nodes n
                            WHERE n.project = ?1
                              AND n.label = relationships.source_label
                              AND n.key = relationships.source_key)
             OR NOT EXISTS (SELECT 1 FROM nodes n
                            WHERE n.project = ?1
                              AND n.label = relationships.target_label
                              AND n.key = relationships.target_key))",
        params![project],
    )
}

struct EncodedNode<'a> {
    node: &'a GraphNode,
    properties: String,
}

struct EncodedRelationship<'a> {
    rel: &'a GraphRelationship,
    properties: String,
}

fn encode<'a>(
    nodes: &'a [GraphNode],
    relationships: &'a [GraphRelationship],
) -> Result<(Vec<EncodedNode<'a>>, Vec<EncodedRelationship<'a>>)> {
    let nodes = nodes
        .iter()
        .map(|node| {
            Ok(EncodedNode {
                node,
                properties: serde_json::to_string(&node.properties)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let relationships = relationships
        .iter()
        .map(|rel| {
            Ok(EncodedRelationship {
                rel,
                properties: serde_json::to_string(&rel.properties)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok((nodes, relationships))
}

fn write_rows(
    tx: &Transaction<'_>,
    project: &str,
    generation: i64,
    nodes: &[EncodedNode<'_>],
    relationships: &[EncodedRelationship<'_>],
) -> rusqlite::Result<WriteOutcome> {
    let mut outcome = WriteOutcome::default();
    {
        let mut stmt = tx.prepare_cached(
            "INSERT INTO nodes (project, label, key, properties, origin, file_path, generation)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(project, label, key) DO UPDATE SET
                properties = excluded.properties,
                origin = excluded.origin,
                file_path = excluded.file_path,
                generation = excluded.generation",
        )?;
        for encoded in nodes {
            let node = encoded.node;
            stmt.execute(params![
                project,
                node.node.label.as_str(),
                &node.node.key,
                &encoded.properties,
                node.origin.as_str(),
                node.file_path.as_deref(),
                generation,
            ])?;
            outcome.nodes_written += 1;
        }
    }
    {
        let mut exists = tx.prepare_cached(
            "SELECT EXISTS (SELECT 1 FROM nodes WHERE project = ?1 AND label = ?2 AND key = ?3)",
        )?;
        let mut insert = tx.prepare_cached(
            "INSERT INTO relationships
                (project, source_label, source_key, rel_type, target_label, target_key,
                 properties, origin, file_path, generation)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(project, source_label, source_key, rel_type, target_label, target_key)
             DO UPDATE SET
                properties = excluded.properties,
                origin = excluded.origin,
                file_path = excluded.file_path,
                generation = excluded.generation",
        )?;
        for encoded in relationships {
            let rel = encoded.rel;
            let mut present = |node: &NodeRef| -> rusqlite::Result<bool> {
                exists.query_row(params![project, node.label.as_str(), &node.key], |row| {
                    row.get(0)
                })
            };
            if !present(&rel.source)? || !present(&rel.target)? {
                outcome.deferred.push(rel.clone());
                continue;
            }
            insert.execute(params![
                project,
                rel.source.label.as_str(),
                &rel.source.key,
                rel.kind.as_str(),
                rel.target.label.as_str(),
                &rel.target.key,
                &encoded.properties,
                rel.origin.as_str(),
                rel.file_path.as_deref(),
                generation,
            ])?;
            outcome.relationships_written += 1;
        }
    }
    Ok(outcome)
}

fn delete_project(tx: &Transaction<'_>, project: &str) -> rusqlite::Result<()> {
    tx.execute("DELETE FROM relationships WHERE project = ?1", params![project])?;
    tx.execute("DELETE FROM nodes WHERE project = ?1", params![project])?;
    Ok(())
}

impl GraphStore for SqliteGraphStore {
    fn ensure_constraints(&self) -> Result<()> {
        self.with_write(|conn| migrations::ensure_constraints(conn))
    }

    fn next_generation(&self, project: &str) -> Result<i64> {
        self.with_write(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO generations (project, generation) VALUES (?1, 1)
                 ON CONFLICT(project) DO UPDATE SET generation = generation + 1",
                params![project],
            )?;
            let generation: i64 = tx.query_row(
                "SELECT generation FROM generations WHERE project = ?1",
                params![project],
                |row| row.get(0),
            )?;
            tx.commit()?;
            Ok(generation)
        })
    }

    fn write_batch(
        &self,
        project: &str,
        generation: i64,
        batch: &WriteBatch,
    ) -> Result<WriteOutcome> {
        if batch.is_empty() {
            return Ok(WriteOutcome::default());
        }
        let (nodes, relationships) = encode(&batch.nodes, &batch.relationships)?;
        let outcome = self.with_write(|conn| {
            let tx = conn.transaction()?;
            for deletion in &batch.deletions {
                apply_deletion(&tx, project, deletion)?;
            }
            let outcome = write_rows(&tx, project, generation, &nodes, &relationships)?;
            if !batch.deletions.is_empty() {
                remove_dangling(&tx, project)?;
            }
            tx.commit()?;
            Ok(outcome)
        })?;
        tracing::debug!(
            project,
            nodes = outcome.nodes_written,
            relationships = outcome.relationships_written,
            deferred = outcome.deferred.len(),
            "batch committed"
        );
        Ok(outcome)
    }

    fn sweep(&self, project: &str, generation: i64) -> Result<usize> {
        self.with_write(|conn| {
            let tx = conn.transaction()?;
            let mut removed = tx.execute(
                "DELETE FROM relationships WHERE project = ?1 AND generation < ?2",
                params![project, generation],
            )?;
            removed += tx.execute(
                "DELETE FROM nodes WHERE project = ?1 AND generation < ?2",
                params![project, generation],
            )?;
            removed += remove_dangling(&tx, project)?;
            tx.commit()?;
            Ok(removed)
        })
    }

    fn clean(&self, project: &str) -> Result<()> {
        self.with_write(|conn| {
            let tx = conn.transaction()?;
            delete_project(&tx, project)?;
            tx.execute("DELETE FROM generations WHERE project = ?1", params![project])?;
            tx.commit()
        })?;
        tracing::info!(project, "project removed from graph store");
        Ok(())
    }

    fn export(&self, project: &str) -> Result<ExportDocument> {
        let nodes = self.read_nodes(project)?;
        let relationships = self.read_relationships(project)?;
        Ok(ExportDocument::from_graph(
            project,
            nodes,
            relationships,
            now_secs(),
        ))
    }

    fn import(&self, project: &str, document: &ExportDocument) -> Result<()> {
        let (nodes, relationships) = document.to_graph()?;
        let generation = self.next_generation(project)?;
        let (nodes, relationships) = encode(&nodes, &relationships)?;
        let outcome = self.with_write(|conn| {
            let tx = conn.transaction()?;
            delete_project(&tx, project)?;
            let outcome = write_rows(&tx, project, generation, &nodes, &relationships)?;
            tx.commit()?;
            Ok(outcome)
        })?;
        tracing::info!(
            project,
            nodes = outcome.nodes_written,
            relationships = outcome.relationships_written,
            "graph imported"
        );
        Ok(())
    }

    fn stats(&self, project: &str) -> Result<GraphStats> {
        let conn = self.read_conn()?;
        let mut stats = GraphStats::default();
        let mut stmt = conn.prepare(
            "SELECT label, COUNT(*) FROM nodes WHERE project = ?1 GROUP BY label ORDER BY label",
        )?;
        for row in stmt.query_map(params![project], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })? {
            let (label, count) = row?;
            stats.nodes.insert(label, count);
        }
        let mut stmt = conn.prepare(
            "SELECT rel_type, COUNT(*) FROM relationships WHERE project = ?1
             GROUP BY rel_type ORDER BY rel_type",
        )?;
        for row in stmt.query_map(params![project], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })? {
            let (kind, count) = row?;
            stats.relationships.insert(kind, count);
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Declaration;
    use tempfile::TempDir;

    fn store() -> (TempDir, SqliteGraphStore) {
        let dir = TempDir::new().unwrap();
        let store = SqliteGraphStore::open(&dir.path().join("graph.db")).unwrap();
        (dir, store)
    }

    fn function(qn: &str, path: &str) -> Declaration {
        let name = qn.rsplit('.').next().unwrap();
        Declaration::new(NodeLabel::Function, qn, name).with_path(path)
    }

    fn calls(a: &Declaration, b: &Declaration) -> GraphRelationship {
        GraphRelationship::new(a.node_ref(), RelationshipKind::Calls, b.node_ref(), Origin::Resolution)
    }

    #[test]
    fn upserts_are_idempotent() {
        let (_dir, store) = store();
        let helper = function("p.a.helper", "a.py");
        let main = function("p.b.main", "b.py");
        let batch = WriteBatch {
            nodes: vec![
                GraphNode::from_declaration(&helper, Origin::Declaration),
                GraphNode::from_declaration(&main, Origin::Declaration),
            ],
            relationships: vec![calls(&main, &helper)],
            ..Default::default()
        };
        store.write_batch("p", 1, &batch).unwrap();
        store.write_batch("p", 1, &batch).unwrap();
        let stats = store.stats("p").unwrap();
        assert_eq!(stats.nodes.get("Function"), Some(&2));
        assert_eq!(stats.relationships.get("CALLS"), Some(&1));
        store.ensure_constraints().unwrap();
    }

    #[test]
    fn relationships_with_missing_endpoints_are_deferred() {
        let (_dir, store) = store();
        let helper = function("p.a.helper", "a.py");
        let main = function("p.b.main", "b.py");
        let batch = WriteBatch {
            nodes: vec![GraphNode::from_declaration(&main, Origin::Declaration)],
            relationships: vec![calls(&main, &helper)],
            ..Default::default()
        };
        let outcome = store.write_batch("p", 1, &batch).unwrap();
        assert_eq!(outcome.relationships_written, 0);
        assert_eq!(outcome.deferred.len(), 1);
    }

    #[test]
    fn file_deletion_removes_attached_relationships() {
        let (_dir, store) = store();
        let helper = function("p.a.helper", "a.py");
        let main = function("p.b.main", "b.py");
        store
            .write_batch(
                "p",
                1,
                &WriteBatch {
                    nodes: vec![
                        GraphNode::from_declaration(&helper, Origin::Declaration),
                        GraphNode::from_declaration(&main, Origin::Declaration),
                    ],
                    relationships: vec![calls(&main, &helper)],
                    ..Default::default()
                },
            )
            .unwrap();
        store
            .write_batch(
                "p",
                2,
                &WriteBatch {
                    deletions: vec![Deletion::File("a.py".into())],
                    ..Default::default()
                },
            )
            .unwrap();
        let stats = store.stats("p").unwrap();
        assert_eq!(stats.nodes.get("Function"), Some(&1));
        assert!(stats.relationships.is_empty());
    }

    #[test]
    fn sweep_and_clean_are_project_scoped() {
        let (_dir, store) = store();
        let old = function("p.a.old", "a.py");
        let new = function("p.a.new", "a.py");
        let other = function("q.a.old", "a.py");
        let node = |decl: &Declaration| WriteBatch {
            nodes: vec![GraphNode::from_declaration(decl, Origin::Declaration)],
            ..Default::default()
        };
        let first = store.next_generation("p").unwrap();
        let second = store.next_generation("p").unwrap();
        assert_eq!(second, first + 1);
        store.write_batch("p", first, &node(&old)).unwrap();
        store.write_batch("p", second, &node(&new)).unwrap();
        store.write_batch("q", 1, &node(&other)).unwrap();

        assert_eq!(store.sweep("p", second).unwrap(), 1);
        let doc = store.export("p").unwrap();
        assert_eq!(doc.nodes.len(), 1);
        assert_eq!(doc.nodes[0].properties["qualified_name"], "p.a.new");

        store.clean("p").unwrap();
        assert!(store.stats("p").unwrap().nodes.is_empty());
        assert_eq!(store.stats("q").unwrap().nodes.get("Function"), Some(&1));
    }

    fn quick_retry(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            backoff: Duration::from_millis(20),
            busy_timeout: Duration::ZERO,
        }
    }

    fn one_node(decl: &Declaration) -> WriteBatch {
        WriteBatch {
            nodes: vec![GraphNode::from_declaration(decl, Origin::Declaration)],
            ..Default::default()
        }
    }

    #[test]
    fn locked_database_surfaces_transient_error_after_retries() {
        let (dir, store) = store();
        let store = store.with_retry(quick_retry(3)).unwrap();
        let locker = Connection::open(dir.path().join("graph.db")).unwrap();
        locker.execute_batch("BEGIN EXCLUSIVE").unwrap();

        let err = store
            .write_batch("p", 1, &one_node(&function("p.a.helper", "a.py")))
            .unwrap_err();
        assert!(
            matches!(err, IndexError::StorageTransient { attempts: 3, .. }),
            "{err:?}"
        );

        locker.execute_batch("COMMIT").unwrap();
        assert!(store.stats("p").unwrap().nodes.is_empty());
    }

    #[test]
    fn write_succeeds_once_the_lock_is_released() {
        let (dir, store) = store();
        let store = store.with_retry(quick_retry(8)).unwrap();
        let db_path = dir.path().join("graph.db");
        let (locked_tx, locked_rx) = std::sync::mpsc::channel();
        let locker = std::thread::spawn(move || {
            let conn = Connection::open(db_path).unwrap();
            conn.execute_batch("BEGIN EXCLUSIVE").unwrap();
            locked_tx.send(()).unwrap();
            std::thread::sleep(Duration::from_millis(60));
            conn.execute_batch("COMMIT").unwrap();
        });
        locked_rx.recv().unwrap();

        let outcome = store
            .write_batch("p", 1, &one_node(&function("p.a.helper", "a.py")))
            .unwrap();
        locker.join().unwrap();
        assert_eq!(outcome.nodes_written, 1);
        assert_eq!(store.stats("p").unwrap().nodes.get("Function"), Some(&1));
    }

    #[test]
    fn export_import_round_trip() {
        let (_dir, store) = store();
        let helper = function("p.a.helper", "a.py");
        let main = function("p.b.main", "b.py");
        store
            .write_batch(
                "p",
                1,
                &WriteBatch {
                    nodes: vec![
                        GraphNode::from_declaration(&helper, Origin::Declaration),
                        GraphNode::from_declaration(&main, Origin::Declaration),
                    ],
                    relationships: vec![calls(&main, &helper)],
                    ..Default::default()
                },
            )
            .unwrap();
        let exported = store.export("p").unwrap();
        store.import("p", &exported).unwrap();
        let again = store.export("p").unwrap();
        assert_eq!(exported.content(), again.content());
        assert_eq!(again.metadata.relationship_count, 1);
    }
}
