//! The injected transactional graph store abstraction.
//!
//! The loader writes through [`GraphStore`] / [`GraphTransaction`]; the
//! exporter reads through [`GraphSource`]. The concrete engine is an
//! external collaborator — [`crate::memory::MemoryGraph`] is the in-tree
//! reference implementation.

use crate::error::Result;
use crate::model::{Node, NodeId, RelId, Relationship};
use crate::values::PropertyValue;

/// A store that can open write transactions.
pub trait GraphStore {
    /// Transaction handle type, borrowing the store.
    type Tx<'a>: GraphTransaction
    where
        Self: 'a;

    /// Opens a new write transaction.
    fn begin(&self) -> Result<Self::Tx<'_>>;
}

/// One write transaction. Dropping an uncommitted transaction discards
/// every staged write (rollback); only [`commit`](Self::commit) publishes.
pub trait GraphTransaction {
    /// Creates an empty node and returns its store-assigned id.
    fn create_node(&mut self) -> Result<NodeId>;

    /// Adds a label to a node created in this transaction or committed
    /// earlier.
    fn add_label(&mut self, node: NodeId, label: &str) -> Result<()>;

    /// Creates a relationship between two existing nodes.
    fn create_relationship(
        &mut self,
        start: NodeId,
        end: NodeId,
        rel_type: &str,
    ) -> Result<RelId>;

    /// Sets a node property.
    fn set_node_property(&mut self, node: NodeId, key: &str, value: PropertyValue) -> Result<()>;

    /// Sets a relationship property.
    fn set_relationship_property(
        &mut self,
        rel: RelId,
        key: &str,
        value: PropertyValue,
    ) -> Result<()>;

    /// Publishes every staged write.
    fn commit(self) -> Result<()>
    where
        Self: Sized;
}

/// Read access to committed entities, materialized for the exporter.
pub trait GraphSource {
    /// All committed nodes, ordered by id.
    fn nodes(&self) -> Result<Vec<Node>>;

    /// All committed relationships, ordered by id.
    fn relationships(&self) -> Result<Vec<Relationship>>;
}
