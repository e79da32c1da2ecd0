use std::collections::BTreeMap;

use crate::values::PropertyValue;

/// Internal node identifier assigned by the graph store.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct NodeId(pub u64);

/// Internal relationship identifier assigned by the graph store.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct RelId(pub u64);

/// A materialized node as handed to the exporter.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Store-assigned id.
    pub id: NodeId,
    /// Labels in insertion order.
    pub labels: Vec<String>,
    /// Properties keyed by name.
    pub properties: BTreeMap<String, PropertyValue>,
}

impl Node {
    /// Creates an empty node with the given id.
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            labels: Vec::new(),
            properties: BTreeMap::new(),
        }
    }
}

/// A materialized relationship as handed to the exporter.
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    /// Store-assigned id.
    pub id: RelId,
    /// Start node.
    pub start: NodeId,
    /// End node.
    pub end: NodeId,
    /// Relationship type name.
    pub rel_type: String,
    /// Properties keyed by name.
    pub properties: BTreeMap<String, PropertyValue>,
}

impl Relationship {
    /// Creates an empty relationship between two nodes.
    pub fn new(id: RelId, start: NodeId, end: NodeId, rel_type: impl Into<String>) -> Self {
        Self {
            id,
            start,
            end,
            rel_type: rel_type.into(),
            properties: BTreeMap::new(),
        }
    }
}
