//! In-process property-graph store.
//!
//! Nodes and edges live behind a `parking_lot::RwLock`; queries take a read
//! guard for their duration. Session accounting is exposed so callers can
//! assert that every acquired session was released.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::error::{GatewayError, GraphError, Result};
use crate::gateway::{executor, GraphSession, QueryResult, SessionSource};
use crate::model::{Edge, EdgeId, Node, NodeId, PropertyValue};
use crate::query::ast::QueryAst;

/// Node and edge tables with adjacency lists and a label index.
#[derive(Debug, Default)]
pub(crate) struct GraphData {
    pub(crate) nodes: BTreeMap<NodeId, Node>,
    pub(crate) edges: BTreeMap<EdgeId, Edge>,
    pub(crate) outgoing: FxHashMap<NodeId, Vec<EdgeId>>,
    pub(crate) incoming: FxHashMap<NodeId, Vec<EdgeId>>,
    pub(crate) by_label: FxHashMap<String, BTreeSet<NodeId>>,
    next_node: NodeId,
    next_edge: EdgeId,
}

#[derive(Debug, Default)]
struct Inner {
    data: RwLock<GraphData>,
    open_sessions: AtomicUsize,
    sessions_opened: AtomicU64,
    fail_acquire: AtomicUsize,
    fail_query: AtomicUsize,
    offline: AtomicBool,
}

/// Shared handle to an in-memory graph. Clones share the same store.
#[derive(Debug, Clone, Default)]
pub struct MemoryGraph {
    inner: Arc<Inner>,
}

impl MemoryGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a node and returns its engine id.
    pub fn add_node<'a, L, P>(&self, labels: L, props: P) -> NodeId
    where
        L: IntoIterator<Item = &'a str>,
        P: IntoIterator<Item = (&'a str, PropertyValue)>,
    {
        let mut data = self.inner.data.write();
        data.next_node += 1;
        let id = data.next_node;
        let mut node = Node::new(id);
        node.labels = labels.into_iter().map(str::to_owned).collect();
        node.properties = props
            .into_iter()
            .map(|(k, v)| (k.to_owned(), v))
            .collect();
        for label in &node.labels {
            data.by_label.entry(label.clone()).or_default().insert(id);
        }
        data.nodes.insert(id, node);
        id
    }

    /// Returns the node labelled `label` whose `key` property equals `value`,
    /// creating it when absent.
    pub fn merge_node(&self, label: &str, key: &str, value: &str) -> NodeId {
        if let Some(id) = self.find_node(label, key, value) {
            return id;
        }
        self.add_node([label], [(key, PropertyValue::from(value))])
    }

    /// Looks a node up by label and string key.
    pub fn find_node(&self, label: &str, key: &str, value: &str) -> Option<NodeId> {
        let data = self.inner.data.read();
        let ids = data.by_label.get(label)?;
        ids.iter().copied().find(|id| {
            data.nodes
                .get(id)
                .and_then(|node| node.properties.get(key))
                .and_then(PropertyValue::as_str)
                == Some(value)
        })
    }

    /// Inserts a typed edge between two existing nodes.
    pub fn add_edge(&self, from: NodeId, to: NodeId, edge_type: &str) -> Result<EdgeId> {
        let mut data = self.inner.data.write();
        for endpoint in [from, to] {
            if !data.nodes.contains_key(&endpoint) {
                return Err(GraphError::InvalidArgument(format!(
                    "edge endpoint {endpoint} does not exist"
                )));
            }
        }
        data.next_edge += 1;
        let id = data.next_edge;
        data.edges.insert(id, Edge::new(id, from, to, edge_type));
        data.outgoing.entry(from).or_default().push(id);
        data.incoming.entry(to).or_default().push(id);
        Ok(id)
    }

    /// Number of stored nodes.
    pub fn node_count(&self) -> usize {
        self.inner.data.read().nodes.len()
    }

    /// Number of stored edges.
    pub fn edge_count(&self) -> usize {
        self.inner.data.read().edges.len()
    }

    /// Sessions currently acquired and not yet released.
    pub fn open_sessions(&self) -> usize {
        self.inner.open_sessions.load(Ordering::SeqCst)
    }

    /// Sessions acquired since creation.
    pub fn sessions_opened(&self) -> u64 {
        self.inner.sessions_opened.load(Ordering::SeqCst)
    }

    /// Makes the next `count` acquisitions fail.
    pub fn fail_next_acquire(&self, count: usize) {
        self.inner.fail_acquire.store(count, Ordering::SeqCst);
    }

    /// Makes the next `count` queries fail after their session was acquired.
    pub fn fail_next_query(&self, count: usize) {
        self.inner.fail_query.store(count, Ordering::SeqCst);
    }

    /// Simulates the store going away (or coming back).
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

impl SessionSource for MemoryGraph {
    fn acquire(&self) -> Result<Box<dyn GraphSession + '_>> {
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(GatewayError::SessionUnavailable("store is offline".into()).into());
        }
        if take_one(&self.inner.fail_acquire) {
            return Err(GatewayError::SessionUnavailable("injected acquire failure".into()).into());
        }
        self.inner.open_sessions.fetch_add(1, Ordering::SeqCst);
        self.inner.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySession { inner: &self.inner }))
    }

    fn describe(&self) -> String {
        let data = self.inner.data.read();
        format!(
            "memory graph ({} nodes, {} edges)",
            data.nodes.len(),
            data.edges.len()
        )
    }
}

struct MemorySession<'a> {
    inner: &'a Inner,
}

impl GraphSession for MemorySession<'_> {
    fn run(&mut self, query: &QueryAst) -> Result<QueryResult> {
        if take_one(&self.inner.fail_query) {
            return Err(GatewayError::Execution("injected query failure".into()).into());
        }
        let data = self.inner.data.read();
        executor::execute(&data, query)
    }

    fn ping(&mut self) -> Result<()> {
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(GatewayError::SessionUnavailable("store is offline".into()).into());
        }
        Ok(())
    }
}

impl Drop for MemorySession<'_> {
    fn drop(&mut self) {
        self.inner.open_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}
