//! In-memory reference implementation of the graph store traits.
//!
//! Writes stage inside a [`MemoryTx`] and only merge into the committed
//! state on commit; dropping the transaction discards them. Ids come from
//! shared atomic counters so several short-lived batch transactions can
//! interleave without colliding.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::error::{acquire_lock, GantryError, Result};
use crate::graph::{GraphSource, GraphStore, GraphTransaction};
use crate::model::{Node, NodeId, RelId, Relationship};
use crate::values::PropertyValue;

#[derive(Debug, Default)]
struct GraphData {
    nodes: BTreeMap<u64, Node>,
    relationships: BTreeMap<u64, Relationship>,
}

/// A simple committed-state graph store backed by ordered maps.
#[derive(Debug, Default)]
pub struct MemoryGraph {
    next_node: AtomicU64,
    next_rel: AtomicU64,
    commits: AtomicU64,
    inner: Mutex<GraphData>,
}

impl MemoryGraph {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed nodes.
    pub fn node_count(&self) -> Result<usize> {
        Ok(acquire_lock(&self.inner)?.nodes.len())
    }

    /// Number of committed relationships.
    pub fn relationship_count(&self) -> Result<usize> {
        Ok(acquire_lock(&self.inner)?.relationships.len())
    }

    /// Number of commits performed, i.e. observed batch boundaries.
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }

    /// Looks up one committed node.
    pub fn node(&self, id: NodeId) -> Option<Node> {
        self.inner.lock().ok()?.nodes.get(&id.0).cloned()
    }

    /// Looks up one committed relationship.
    pub fn relationship(&self, id: RelId) -> Option<Relationship> {
        self.inner.lock().ok()?.relationships.get(&id.0).cloned()
    }
}

impl GraphStore for MemoryGraph {
    type Tx<'a> = MemoryTx<'a>
    where
        Self: 'a;

    fn begin(&self) -> Result<MemoryTx<'_>> {
        Ok(MemoryTx {
            store: self,
            staged_nodes: BTreeMap::new(),
            staged_rels: BTreeMap::new(),
        })
    }
}

impl GraphSource for MemoryGraph {
    fn nodes(&self) -> Result<Vec<Node>> {
        let data = acquire_lock(&self.inner)?;
        Ok(data.nodes.values().cloned().collect())
    }

    fn relationships(&self) -> Result<Vec<Relationship>> {
        let data = acquire_lock(&self.inner)?;
        Ok(data.relationships.values().cloned().collect())
    }
}

/// Staged writes for one [`MemoryGraph`] transaction.
#[derive(Debug)]
pub struct MemoryTx<'a> {
    store: &'a MemoryGraph,
    // New entities plus copy-on-write snapshots of modified committed ones.
    staged_nodes: BTreeMap<u64, Node>,
    staged_rels: BTreeMap<u64, Relationship>,
}

impl MemoryTx<'_> {
    fn staged_node(&mut self, id: NodeId) -> Result<&mut Node> {
        if !self.staged_nodes.contains_key(&id.0) {
            let committed = {
                let data = acquire_lock(&self.store.inner)?;
                data.nodes.get(&id.0).cloned()
            };
            let node = committed.ok_or(GantryError::NotFound("node"))?;
            self.staged_nodes.insert(id.0, node);
        }
        self.staged_nodes
            .get_mut(&id.0)
            .ok_or(GantryError::NotFound("node"))
    }

    fn node_exists(&self, id: NodeId) -> Result<bool> {
        if self.staged_nodes.contains_key(&id.0) {
            return Ok(true);
        }
        let data = acquire_lock(&self.store.inner)?;
        Ok(data.nodes.contains_key(&id.0))
    }
}

impl GraphTransaction for MemoryTx<'_> {
    fn create_node(&mut self) -> Result<NodeId> {
        let id = self.store.next_node.fetch_add(1, Ordering::Relaxed);
        self.staged_nodes.insert(id, Node::new(NodeId(id)));
        Ok(NodeId(id))
    }

    fn add_label(&mut self, node: NodeId, label: &str) -> Result<()> {
        let node = self.staged_node(node)?;
        if !node.labels.iter().any(|existing| existing == label) {
            node.labels.push(label.to_string());
        }
        Ok(())
    }

    fn create_relationship(
        &mut self,
        start: NodeId,
        end: NodeId,
        rel_type: &str,
    ) -> Result<RelId> {
        if !self.node_exists(start)? || !self.node_exists(end)? {
            return Err(GantryError::NotFound("node"));
        }
        let id = self.store.next_rel.fetch_add(1, Ordering::Relaxed);
        self.staged_rels
            .insert(id, Relationship::new(RelId(id), start, end, rel_type));
        Ok(RelId(id))
    }

    fn set_node_property(&mut self, node: NodeId, key: &str, value: PropertyValue) -> Result<()> {
        let node = self.staged_node(node)?;
        node.properties.insert(key.to_string(), value);
        Ok(())
    }

    fn set_relationship_property(
        &mut self,
        rel: RelId,
        key: &str,
        value: PropertyValue,
    ) -> Result<()> {
        let rel = self
            .staged_rels
            .get_mut(&rel.0)
            .ok_or(GantryError::NotFound("relationship"))?;
        rel.properties.insert(key.to_string(), value);
        Ok(())
    }

    fn commit(self) -> Result<()> {
        let mut data = acquire_lock(&self.store.inner)?;
        data.nodes.extend(self.staged_nodes);
        data.relationships.extend(self.staged_rels);
        self.store.commits.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
