//! Bulk CSV import and export for property graphs.
//!
//! The import side reads CSV files whose header row carries a small
//! per-column grammar (`name:type{params}(idspace)[]` plus the reserved
//! `ID`/`START_ID`/`END_ID`/`LABEL`/`TYPE`/`IGNORE` tags), resolves
//! cross-file node references through named id spaces, and writes entities
//! into a [`graph::GraphStore`] in commit-bounded batches. Node files
//! always load before relationship files.
//!
//! The export side is the inverse: [`export::Exporter`] renders a
//! [`graph::GraphSource`] either as one plain CSV file with a combined
//! header, or as a set of bulk-import files that feed straight back into
//! the loader.
//!
//! ```no_run
//! use gantry::config::LoaderConfig;
//! use gantry::files::DirFiles;
//! use gantry::loader::{EntityLoader, NodeFile, RelationshipFile};
//! use gantry::memory::MemoryGraph;
//! use gantry::progress::ProgressTracker;
//!
//! # fn main() -> gantry::error::Result<()> {
//! let config = LoaderConfig::default();
//! let progress = ProgressTracker::new();
//! let store = MemoryGraph::new();
//! let files = DirFiles::new("/data/import");
//!
//! let report = EntityLoader::new(&config, &progress).load(
//!     &store,
//!     &files,
//!     &[NodeFile {
//!         file_name: "people.csv".into(),
//!         labels: vec!["Person".into()],
//!     }],
//!     &[RelationshipFile {
//!         file_name: "knows.csv".into(),
//!         rel_type: "KNOWS".into(),
//!     }],
//! )?;
//! println!("loaded {} nodes", report.nodes);
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod config;
pub mod error;
pub mod export;
pub mod files;
pub mod graph;
pub mod header;
pub mod idspace;
pub mod loader;
pub mod memory;
pub mod model;
pub mod progress;
pub mod values;

pub use config::{BatchSize, ExportConfig, LoaderConfig, Quoting};
pub use error::{GantryError, Result};
pub use export::Exporter;
pub use loader::{EntityLoader, NodeFile, RelationshipFile};
pub use model::{Node, NodeId, RelId, Relationship};
pub use values::PropertyValue;
