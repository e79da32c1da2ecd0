//! Monotonic progress counters shared between the loader/exporter and a
//! concurrent status reader.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

/// Live counters updated while a load or export runs. Counters only ever
/// increase and may be read from another thread at any time.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    nodes: AtomicU64,
    relationships: AtomicU64,
    properties: AtomicU64,
}

impl ProgressTracker {
    /// Creates a zeroed tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds to the counters.
    pub fn update(&self, nodes: u64, relationships: u64, properties: u64) {
        self.nodes.fetch_add(nodes, Ordering::Relaxed);
        self.relationships.fetch_add(relationships, Ordering::Relaxed);
        self.properties.fetch_add(properties, Ordering::Relaxed);
    }

    /// Current `(nodes, relationships, properties)` counts.
    pub fn snapshot(&self) -> (u64, u64, u64) {
        (
            self.nodes.load(Ordering::Relaxed),
            self.relationships.load(Ordering::Relaxed),
            self.properties.load(Ordering::Relaxed),
        )
    }

    /// Freezes the counters into a final report.
    pub fn report(&self, elapsed: Duration) -> ProgressReport {
        let (nodes, relationships, properties) = self.snapshot();
        ProgressReport {
            nodes,
            relationships,
            properties,
            elapsed,
        }
    }
}

/// Final counts for one load or export invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressReport {
    /// Nodes created (load) or exported.
    pub nodes: u64,
    /// Relationships created (load) or exported.
    pub relationships: u64,
    /// Properties written.
    pub properties: u64,
    /// Wall-clock duration.
    pub elapsed: Duration,
}
