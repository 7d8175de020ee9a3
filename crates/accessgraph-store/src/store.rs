//! SQLite snapshot repository.
//!
//! ## Safety & Concurrency
//!
//! `rusqlite::Connection` is not `Send`/`Sync`. All SQLite I/O runs on a
//! dedicated blocking worker thread that owns the connection; the async
//! methods communicate with it over channels. Commands are processed
//! serially, so writes to one database never interleave. Dropping a pending
//! future abandons the wait, but an in-flight write still commits fully or
//! rolls back on the worker.
//!
//! Rows are stored with JSON-encoded label/prop payloads so new properties
//! never require a schema migration. All read paths order rows, which makes
//! reloaded snapshots byte-stable regardless of insertion order.

use accessgraph::{Edge, Error, Graph, Node, NodeKind, Result};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Default result cap for [`SnapshotStore::search_principals`].
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Snapshot metadata row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub id: String,
    /// Commit time, ISO-8601 UTC with second precision.
    pub created_at: String,
    pub label: Option<String>,
}

/// Commands sent to the SQLite worker thread.
enum WorkerCommand {
    Save {
        id: String,
        label: Option<String>,
        nodes: Vec<Node>,
        edges: Vec<Edge>,
        resp: oneshot::Sender<Result<()>>,
    },
    LoadRows {
        id: String,
        resp: oneshot::Sender<Result<(Vec<Node>, Vec<Edge>)>>,
    },
    List {
        resp: oneshot::Sender<Result<Vec<Snapshot>>>,
    },
    Get {
        id: String,
        resp: oneshot::Sender<Result<Snapshot>>,
    },
    CountNodes {
        id: String,
        resp: oneshot::Sender<Result<u64>>,
    },
    CountEdges {
        id: String,
        resp: oneshot::Sender<Result<u64>>,
    },
    SearchPrincipals {
        id: String,
        query: String,
        limit: usize,
        resp: oneshot::Sender<Result<Vec<Node>>>,
    },
    GetNode {
        id: String,
        node_id: String,
        resp: oneshot::Sender<Result<Node>>,
    },
    GetEdges {
        id: String,
        resp: oneshot::Sender<Result<Vec<Edge>>>,
    },
    Close,
}

fn storage_err(e: impl std::fmt::Display) -> Error {
    Error::Storage(e.to_string())
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS snapshots (
    id TEXT PRIMARY KEY,
    created_at TEXT NOT NULL,
    label TEXT
);

CREATE TABLE IF NOT EXISTS nodes (
    snapshot_id TEXT NOT NULL,
    id TEXT NOT NULL,
    kind TEXT NOT NULL,
    labels TEXT NOT NULL,
    props TEXT NOT NULL,
    PRIMARY KEY (snapshot_id, id)
);

CREATE INDEX IF NOT EXISTS idx_nodes_snapshot_kind
ON nodes(snapshot_id, kind);

CREATE INDEX IF NOT EXISTS idx_nodes_snapshot_id
ON nodes(snapshot_id, id);

CREATE TABLE IF NOT EXISTS edges (
    snapshot_id TEXT NOT NULL,
    src TEXT NOT NULL,
    dst TEXT NOT NULL,
    kind TEXT NOT NULL,
    props TEXT NOT NULL,
    PRIMARY KEY (snapshot_id, src, dst, kind)
);

CREATE INDEX IF NOT EXISTS idx_edges_snapshot
ON edges(snapshot_id);
"#;

/// Start a blocking worker thread that owns the SQLite connection.
async fn start_worker(path: Option<PathBuf>) -> Result<mpsc::Sender<WorkerCommand>> {
    let (tx, mut rx) = mpsc::channel::<WorkerCommand>(128);
    let (ready_tx, ready_rx) = oneshot::channel::<Result<()>>();

    tokio::task::spawn_blocking(move || {
        let open_result: Result<rusqlite::Connection> = match path {
            Some(ref p) => rusqlite::Connection::open(p)
                .map_err(storage_err)
                .and_then(|conn| {
                    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
                        .map_err(storage_err)?;
                    Ok(conn)
                }),
            None => rusqlite::Connection::open_in_memory().map_err(storage_err),
        };

        let mut conn = match open_result {
            Ok(c) => c,
            Err(e) => {
                let msg = e.to_string();
                if ready_tx.send(Err(e)).is_err() {
                    warn!(error = %msg, "snapshot store open error lost (receiver dropped)");
                }
                return;
            }
        };

        if let Err(e) = conn.execute_batch(SCHEMA).map_err(storage_err) {
            let msg = e.to_string();
            if ready_tx.send(Err(e)).is_err() {
                warn!(error = %msg, "snapshot store schema error lost (receiver dropped)");
            }
            return;
        }

        let _ = ready_tx.send(Ok(()));

        // Process commands serially.
        while let Some(cmd) = rx.blocking_recv() {
            match cmd {
                WorkerCommand::Save {
                    id,
                    label,
                    nodes,
                    edges,
                    resp,
                } => {
                    let result = save_snapshot_tx(&mut conn, &id, label.as_deref(), &nodes, &edges);
                    if resp.send(result).is_err() {
                        warn!(snapshot = %id, "save result lost (receiver dropped)");
                    }
                }
                WorkerCommand::LoadRows { id, resp } => {
                    let _ = resp.send(load_rows(&conn, &id));
                }
                WorkerCommand::List { resp } => {
                    let _ = resp.send(list_snapshots_rows(&conn));
                }
                WorkerCommand::Get { id, resp } => {
                    let _ = resp.send(get_snapshot_row(&conn, &id));
                }
                WorkerCommand::CountNodes { id, resp } => {
                    let _ = resp.send(count_rows(&conn, "nodes", &id));
                }
                WorkerCommand::CountEdges { id, resp } => {
                    let _ = resp.send(count_rows(&conn, "edges", &id));
                }
                WorkerCommand::SearchPrincipals {
                    id,
                    query,
                    limit,
                    resp,
                } => {
                    let _ = resp.send(search_principals_rows(&conn, &id, &query, limit));
                }
                WorkerCommand::GetNode { id, node_id, resp } => {
                    let _ = resp.send(get_node_row(&conn, &id, &node_id));
                }
                WorkerCommand::GetEdges { id, resp } => {
                    let _ = resp.send(get_edge_rows(&conn, &id));
                }
                WorkerCommand::Close => break,
            }
        }
    });

    match ready_rx.await {
        Ok(Ok(())) => Ok(tx),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(Error::Storage("snapshot store worker exited".to_string())),
    }
}

fn save_snapshot_tx(
    conn: &mut rusqlite::Connection,
    id: &str,
    label: Option<&str>,
    nodes: &[Node],
    edges: &[Edge],
) -> Result<()> {
    let tx = conn.transaction().map_err(storage_err)?;
    // created_at is captured at commit time, UTC, second precision.
    let created_at = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();

    tx.execute(
        "INSERT INTO snapshots (id, created_at, label) VALUES (?1, ?2, ?3)",
        rusqlite::params![id, created_at, label],
    )
    .map_err(storage_err)?;

    {
        let mut insert_node = tx
            .prepare(
                "INSERT INTO nodes (snapshot_id, id, kind, labels, props) VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .map_err(storage_err)?;
        for node in nodes {
            let labels = serde_json::to_string(&node.labels)?;
            let props = serde_json::to_string(&node.props)?;
            insert_node
                .execute(rusqlite::params![
                    id,
                    node.id,
                    node.kind.as_str(),
                    labels,
                    props
                ])
                .map_err(storage_err)?;
        }

        // The storage key is (snapshot_id, src, dst, kind): parallel edges of
        // the same kind between one pair collapse to the first written.
        let mut insert_edge = tx
            .prepare(
                "INSERT OR IGNORE INTO edges (snapshot_id, src, dst, kind, props) VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .map_err(storage_err)?;
        for edge in edges {
            let props = serde_json::to_string(&edge.props)?;
            insert_edge
                .execute(rusqlite::params![id, edge.src, edge.dst, edge.kind, props])
                .map_err(storage_err)?;
        }
    }

    tx.commit().map_err(storage_err)
}

fn snapshot_exists(conn: &rusqlite::Connection, id: &str) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM snapshots WHERE id = ?1",
            [id],
            |row| row.get(0),
        )
        .map_err(storage_err)?;
    Ok(count > 0)
}

fn decode_node(id: &str, kind: &str, labels: &str, props: &str) -> Result<Node> {
    let kind = NodeKind::parse(kind)
        .ok_or_else(|| Error::Storage(format!("node {id}: unknown kind {kind:?}")))?;
    let labels: Vec<String> = serde_json::from_str(labels)
        .map_err(|e| Error::Storage(format!("node {id}: labels: {e}")))?;
    let props = serde_json::from_str(props)
        .map_err(|e| Error::Storage(format!("node {id}: props: {e}")))?;
    Ok(Node {
        id: id.to_string(),
        kind,
        labels,
        props,
    })
}

fn decode_edge(src: &str, dst: &str, kind: &str, props: &str) -> Result<Edge> {
    let props = serde_json::from_str(props)
        .map_err(|e| Error::Storage(format!("edge {src} -> {dst} ({kind}): props: {e}")))?;
    Ok(Edge {
        src: src.to_string(),
        dst: dst.to_string(),
        kind: kind.to_string(),
        props,
    })
}

fn load_rows(conn: &rusqlite::Connection, id: &str) -> Result<(Vec<Node>, Vec<Edge>)> {
    if !snapshot_exists(conn, id)? {
        return Err(Error::NotFound(id.to_string()));
    }

    let mut stmt = conn
        .prepare("SELECT id, kind, labels, props FROM nodes WHERE snapshot_id = ?1 ORDER BY id")
        .map_err(storage_err)?;
    let mut rows = stmt.query([id]).map_err(storage_err)?;
    let mut nodes = Vec::new();
    while let Some(row) = rows.next().map_err(storage_err)? {
        let node_id: String = row.get(0).map_err(storage_err)?;
        let kind: String = row.get(1).map_err(storage_err)?;
        let labels: String = row.get(2).map_err(storage_err)?;
        let props: String = row.get(3).map_err(storage_err)?;
        nodes.push(decode_node(&node_id, &kind, &labels, &props)?);
    }

    let edges = get_edge_rows(conn, id)?;
    Ok((nodes, edges))
}

fn get_edge_rows(conn: &rusqlite::Connection, id: &str) -> Result<Vec<Edge>> {
    let mut stmt = conn
        .prepare(
            "SELECT src, dst, kind, props FROM edges WHERE snapshot_id = ?1 ORDER BY src, dst, kind",
        )
        .map_err(storage_err)?;
    let mut rows = stmt.query([id]).map_err(storage_err)?;
    let mut edges = Vec::new();
    while let Some(row) = rows.next().map_err(storage_err)? {
        let src: String = row.get(0).map_err(storage_err)?;
        let dst: String = row.get(1).map_err(storage_err)?;
        let kind: String = row.get(2).map_err(storage_err)?;
        let props: String = row.get(3).map_err(storage_err)?;
        edges.push(decode_edge(&src, &dst, &kind, &props)?);
    }
    Ok(edges)
}

fn list_snapshots_rows(conn: &rusqlite::Connection) -> Result<Vec<Snapshot>> {
    let mut stmt = conn
        .prepare("SELECT id, created_at, label FROM snapshots ORDER BY created_at DESC, id ASC")
        .map_err(storage_err)?;
    let mut rows = stmt.query([]).map_err(storage_err)?;
    let mut snapshots = Vec::new();
    while let Some(row) = rows.next().map_err(storage_err)? {
        snapshots.push(Snapshot {
            id: row.get(0).map_err(storage_err)?,
            created_at: row.get(1).map_err(storage_err)?,
            label: row.get(2).map_err(storage_err)?,
        });
    }
    Ok(snapshots)
}

fn get_snapshot_row(conn: &rusqlite::Connection, id: &str) -> Result<Snapshot> {
    match conn.query_row(
        "SELECT id, created_at, label FROM snapshots WHERE id = ?1",
        [id],
        |row| {
            Ok(Snapshot {
                id: row.get(0)?,
                created_at: row.get(1)?,
                label: row.get(2)?,
            })
        },
    ) {
        Ok(snapshot) => Ok(snapshot),
        Err(rusqlite::Error::QueryReturnedNoRows) => Err(Error::NotFound(id.to_string())),
        Err(e) => Err(storage_err(e)),
    }
}

fn count_rows(conn: &rusqlite::Connection, table: &str, id: &str) -> Result<u64> {
    // `table` is one of two compile-time constants, never user input.
    let sql = format!("SELECT COUNT(*) FROM {table} WHERE snapshot_id = ?1");
    let count: i64 = conn
        .query_row(&sql, [id], |row| row.get(0))
        .map_err(storage_err)?;
    Ok(count.unsigned_abs())
}

fn search_principals_rows(
    conn: &rusqlite::Connection,
    id: &str,
    query: &str,
    limit: usize,
) -> Result<Vec<Node>> {
    // instr() keeps the match case-sensitive; LIKE is not for ASCII.
    let mut stmt = conn
        .prepare(
            "SELECT id, kind, labels, props FROM nodes
             WHERE snapshot_id = ?1 AND kind = 'PRINCIPAL'
               AND (instr(id, ?2) > 0 OR instr(labels, ?2) > 0)
             ORDER BY id LIMIT ?3",
        )
        .map_err(storage_err)?;
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let mut rows = stmt
        .query(rusqlite::params![id, query, limit])
        .map_err(storage_err)?;
    let mut nodes = Vec::new();
    while let Some(row) = rows.next().map_err(storage_err)? {
        let node_id: String = row.get(0).map_err(storage_err)?;
        let kind: String = row.get(1).map_err(storage_err)?;
        let labels: String = row.get(2).map_err(storage_err)?;
        let props: String = row.get(3).map_err(storage_err)?;
        nodes.push(decode_node(&node_id, &kind, &labels, &props)?);
    }
    Ok(nodes)
}

fn get_node_row(conn: &rusqlite::Connection, id: &str, node_id: &str) -> Result<Node> {
    match conn.query_row(
        "SELECT id, kind, labels, props FROM nodes WHERE snapshot_id = ?1 AND id = ?2",
        [id, node_id],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        },
    ) {
        Ok((node_id, kind, labels, props)) => decode_node(&node_id, &kind, &labels, &props),
        Err(rusqlite::Error::QueryReturnedNoRows) => Err(Error::NotFound(node_id.to_string())),
        Err(e) => Err(storage_err(e)),
    }
}

/// Durable multi-snapshot repository.
///
/// One database holds any number of snapshots; each snapshot's rows are
/// immutable once `save_snapshot` commits. The store assumes at most one
/// writer process at a time.
pub struct SnapshotStore {
    worker_tx: mpsc::Sender<WorkerCommand>,
    closed: AtomicBool,
}

impl SnapshotStore {
    /// Open (creating if necessary) a snapshot database at `path`.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let worker_tx = start_worker(Some(path.into())).await?;
        Ok(Self {
            worker_tx,
            closed: AtomicBool::new(false),
        })
    }

    /// Open an in-memory store (for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let worker_tx = start_worker(None).await?;
        Ok(Self {
            worker_tx,
            closed: AtomicBool::new(false),
        })
    }

    async fn send<T>(
        &self,
        cmd: WorkerCommand,
        resp_rx: oneshot::Receiver<Result<T>>,
    ) -> Result<T> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(Error::Storage("store is closed".to_string()));
        }
        self.worker_tx
            .send(cmd)
            .await
            .map_err(|_| Error::Storage("store worker is gone".to_string()))?;
        resp_rx
            .await
            .map_err(|_| Error::Storage("store worker dropped the reply".to_string()))?
    }

    /// Persist a graph under `snapshot_id` in one atomic transaction. On
    /// failure nothing of the snapshot is observable.
    pub async fn save_snapshot(
        &self,
        snapshot_id: &str,
        label: Option<&str>,
        graph: &Graph,
    ) -> Result<()> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.send(
            WorkerCommand::Save {
                id: snapshot_id.to_string(),
                label: label.map(str::to_string),
                nodes: graph.nodes(),
                edges: graph.edges(),
                resp: resp_tx,
            },
            resp_rx,
        )
        .await
    }

    /// Load a snapshot into a fresh in-memory graph. Nodes are read in
    /// ascending id order and edges in ascending `(src, dst, kind)` order;
    /// an edge whose endpoint is missing from the loaded node set is
    /// silently dropped.
    pub async fn load_snapshot(&self, snapshot_id: &str) -> Result<Graph> {
        let (resp_tx, resp_rx) = oneshot::channel();
        let (nodes, edges) = self
            .send(
                WorkerCommand::LoadRows {
                    id: snapshot_id.to_string(),
                    resp: resp_tx,
                },
                resp_rx,
            )
            .await?;

        let mut graph = Graph::new();
        for node in nodes {
            graph.add_node(node);
        }
        for edge in edges {
            if let Err(Error::MissingEndpoint(endpoint)) = graph.add_edge(edge) {
                // Should be impossible given the write path; self-heal on read.
                debug!(snapshot = snapshot_id, %endpoint, "dropping edge with missing endpoint");
            }
        }
        Ok(graph)
    }

    /// All snapshots, newest first.
    pub async fn list_snapshots(&self) -> Result<Vec<Snapshot>> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.send(WorkerCommand::List { resp: resp_tx }, resp_rx).await
    }

    /// Metadata for one snapshot.
    pub async fn get_snapshot(&self, snapshot_id: &str) -> Result<Snapshot> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.send(
            WorkerCommand::Get {
                id: snapshot_id.to_string(),
                resp: resp_tx,
            },
            resp_rx,
        )
        .await
    }

    pub async fn count_nodes(&self, snapshot_id: &str) -> Result<u64> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.send(
            WorkerCommand::CountNodes {
                id: snapshot_id.to_string(),
                resp: resp_tx,
            },
            resp_rx,
        )
        .await
    }

    pub async fn count_edges(&self, snapshot_id: &str) -> Result<u64> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.send(
            WorkerCommand::CountEdges {
                id: snapshot_id.to_string(),
                resp: resp_tx,
            },
            resp_rx,
        )
        .await
    }

    /// Case-sensitive substring search over principal ids and serialized
    /// labels, ordered by id. `limit == 0` falls back to
    /// [`DEFAULT_SEARCH_LIMIT`].
    pub async fn search_principals(
        &self,
        snapshot_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Node>> {
        let limit = if limit == 0 { DEFAULT_SEARCH_LIMIT } else { limit };
        let (resp_tx, resp_rx) = oneshot::channel();
        self.send(
            WorkerCommand::SearchPrincipals {
                id: snapshot_id.to_string(),
                query: query.to_string(),
                limit,
                resp: resp_tx,
            },
            resp_rx,
        )
        .await
    }

    /// Single-row node lookup.
    pub async fn get_node(&self, snapshot_id: &str, node_id: &str) -> Result<Node> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.send(
            WorkerCommand::GetNode {
                id: snapshot_id.to_string(),
                node_id: node_id.to_string(),
                resp: resp_tx,
            },
            resp_rx,
        )
        .await
    }

    /// All edges of a snapshot in `(src, dst, kind)` order, for diffing.
    pub async fn get_edges(&self, snapshot_id: &str) -> Result<Vec<Edge>> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.send(
            WorkerCommand::GetEdges {
                id: snapshot_id.to_string(),
                resp: resp_tx,
            },
            resp_rx,
        )
        .await
    }

    /// Release the database handle. Outstanding commands are completed first.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
        let _ = self.worker_tx.send(WorkerCommand::Close).await;
    }
}
