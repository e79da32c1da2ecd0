//! Id-space–scoped identity resolution.
//!
//! External ids live in named partitions ("id spaces"); uniqueness and
//! resolution are scoped per partition. The registry is filled while node
//! files load and is read-only once the relationship phase starts. It is an
//! explicit object scoped to one import invocation, never process-global.

use rustc_hash::FxHashMap;

use crate::model::NodeId;

/// External-id → internal-id mapping, partitioned by id space.
#[derive(Debug, Default)]
pub struct IdSpaceRegistry {
    spaces: FxHashMap<String, FxHashMap<String, NodeId>>,
}

impl IdSpaceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `external_id` is already registered in `id_space`.
    pub fn contains(&self, id_space: &str, external_id: &str) -> bool {
        self.spaces
            .get(id_space)
            .is_some_and(|space| space.contains_key(external_id))
    }

    /// Registers a freshly created node. The space is created lazily on
    /// first reference. Callers check [`contains`](Self::contains) first to
    /// apply the duplicate policy; re-registering overwrites.
    pub fn register(&mut self, id_space: &str, external_id: &str, node: NodeId) {
        self.spaces
            .entry(id_space.to_string())
            .or_default()
            .insert(external_id.to_string(), node);
    }

    /// Resolves an external id, or `None` when it was never registered
    /// (including rows dropped by the duplicate policy's skip mode).
    pub fn resolve(&self, id_space: &str, external_id: &str) -> Option<NodeId> {
        self.spaces.get(id_space)?.get(external_id).copied()
    }

    /// Number of ids registered in one space.
    pub fn space_len(&self, id_space: &str) -> usize {
        self.spaces.get(id_space).map_or(0, FxHashMap::len)
    }
}
