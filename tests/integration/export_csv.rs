//! Exporter coverage: plain combined-header CSV and the bulk-import
//! file set, over the in-memory store and in-memory sinks.

use std::io::{self, Write};
use std::sync::Mutex;

use gantry::config::{BatchSize, ExportConfig, Quoting};
use gantry::error::Result;
use gantry::export::Exporter;
use gantry::files::{MemFiles, SinkProvider};
use gantry::graph::{GraphStore, GraphTransaction};
use gantry::memory::MemoryGraph;
use gantry::progress::ProgressTracker;
use gantry::values::PropertyValue;

/// Two Person nodes and one KNOWS relationship.
fn sample_graph() -> Result<MemoryGraph> {
    let store = MemoryGraph::new();
    let mut tx = store.begin()?;
    let alice = tx.create_node()?;
    tx.add_label(alice, "Person")?;
    tx.set_node_property(alice, "name", PropertyValue::String("Alice".into()))?;
    tx.set_node_property(alice, "age", PropertyValue::Int(30))?;
    let bob = tx.create_node()?;
    tx.add_label(bob, "Person")?;
    tx.set_node_property(bob, "name", PropertyValue::String("Bob".into()))?;
    tx.set_node_property(bob, "age", PropertyValue::Int(25))?;
    let knows = tx.create_relationship(alice, bob, "KNOWS")?;
    tx.set_relationship_property(knows, "since", PropertyValue::Int(2019))?;
    tx.commit()?;
    Ok(store)
}

fn export(store: &MemoryGraph, config: &ExportConfig) -> Result<MemFiles> {
    let sinks = MemFiles::new();
    let progress = ProgressTracker::new();
    Exporter::new(config, &progress).export(store, &sinks, "all.csv")?;
    Ok(sinks)
}

#[test]
fn plain_export_combines_node_and_relationship_sections() -> Result<()> {
    let store = sample_graph()?;
    let config = ExportConfig {
        quoting: Quoting::IfNeeded,
        ..ExportConfig::default()
    };
    let sinks = export(&store, &config)?;

    let out = sinks.get("all.csv").unwrap();
    let mut lines = out.lines();
    assert_eq!(
        lines.next(),
        Some("_id:id,_labels:label,age:long,name,_start:id,_end:id,_type:label,since:long")
    );
    assert_eq!(lines.next(), Some("0,:Person,30,Alice,,,,"));
    assert_eq!(lines.next(), Some("1,:Person,25,Bob,,,,"));
    assert_eq!(lines.next(), Some(",,,,0,1,KNOWS,2019"));
    assert_eq!(lines.next(), None);
    Ok(())
}

#[test]
fn use_types_false_drops_header_tags() -> Result<()> {
    let store = sample_graph()?;
    let config = ExportConfig {
        quoting: Quoting::IfNeeded,
        use_types: false,
        ..ExportConfig::default()
    };
    let sinks = export(&store, &config)?;

    let out = sinks.get("all.csv").unwrap();
    assert_eq!(
        out.lines().next(),
        Some("_id,_labels,age,name,_start,_end,_type,since")
    );
    Ok(())
}

#[test]
fn always_quoting_wraps_every_field() -> Result<()> {
    let store = sample_graph()?;
    let config = ExportConfig::default();
    let sinks = export(&store, &config)?;

    let out = sinks.get("all.csv").unwrap();
    let first_row = out.lines().nth(1).unwrap();
    assert_eq!(first_row, "\"0\",\":Person\",\"30\",\"Alice\",\"\",\"\",\"\",\"\"");
    Ok(())
}

#[test]
fn multiple_labels_render_colon_separated() -> Result<()> {
    let store = MemoryGraph::new();
    let mut tx = store.begin()?;
    let n = tx.create_node()?;
    tx.add_label(n, "Person")?;
    tx.add_label(n, "Admin")?;
    tx.commit()?;

    let config = ExportConfig {
        quoting: Quoting::IfNeeded,
        ..ExportConfig::default()
    };
    let sinks = export(&store, &config)?;
    let out = sinks.get("all.csv").unwrap();
    assert_eq!(out.lines().nth(1), Some("0,:Person:Admin,,,"));
    Ok(())
}

#[test]
fn conflicting_property_types_degrade_to_untyped() -> Result<()> {
    let store = MemoryGraph::new();
    let mut tx = store.begin()?;
    let a = tx.create_node()?;
    tx.set_node_property(a, "code", PropertyValue::Int(7))?;
    let b = tx.create_node()?;
    tx.set_node_property(b, "code", PropertyValue::String("seven".into()))?;
    tx.commit()?;

    let config = ExportConfig {
        quoting: Quoting::IfNeeded,
        ..ExportConfig::default()
    };
    let sinks = export(&store, &config)?;
    let header = sinks.get("all.csv").unwrap();
    assert!(header.lines().next().unwrap().contains(",code,"));
    Ok(())
}

#[test]
fn bulk_export_groups_by_label_set_and_type() -> Result<()> {
    let store = sample_graph()?;
    let config = ExportConfig {
        quoting: Quoting::IfNeeded,
        bulk_import: true,
        ..ExportConfig::default()
    };
    let sinks = export(&store, &config)?;

    assert_eq!(
        sinks.names(),
        vec![
            "nodes.Person.csv".to_string(),
            "relationships.KNOWS.csv".to_string(),
        ]
    );

    let nodes = sinks.get("nodes.Person.csv").unwrap();
    let mut lines = nodes.lines();
    assert_eq!(lines.next(), Some(":ID,age:long,name,:LABEL"));
    assert_eq!(lines.next(), Some("0,30,Alice,Person"));
    assert_eq!(lines.next(), Some("1,25,Bob,Person"));

    let rels = sinks.get("relationships.KNOWS.csv").unwrap();
    let mut lines = rels.lines();
    assert_eq!(lines.next(), Some(":START_ID,:END_ID,:TYPE,since:long"));
    assert_eq!(lines.next(), Some("0,1,KNOWS,2019"));
    Ok(())
}

#[test]
fn bulk_export_sorts_label_sets_into_file_names() -> Result<()> {
    let store = MemoryGraph::new();
    let mut tx = store.begin()?;
    let n = tx.create_node()?;
    tx.add_label(n, "Person")?;
    tx.add_label(n, "Admin")?;
    let bare = tx.create_node()?;
    let _ = bare;
    tx.commit()?;

    let config = ExportConfig {
        quoting: Quoting::IfNeeded,
        bulk_import: true,
        ..ExportConfig::default()
    };
    let sinks = export(&store, &config)?;

    assert_eq!(
        sinks.names(),
        vec!["nodes.Admin.Person.csv".to_string(), "nodes.csv".to_string()]
    );
    let grouped = sinks.get("nodes.Admin.Person.csv").unwrap();
    // Label cells join with the array delimiter for re-import.
    assert_eq!(grouped.lines().nth(1), Some("0,Admin;Person"));
    Ok(())
}

#[test]
fn separate_header_splits_each_bulk_file() -> Result<()> {
    let store = sample_graph()?;
    let config = ExportConfig {
        quoting: Quoting::IfNeeded,
        bulk_import: true,
        separate_header: true,
        ..ExportConfig::default()
    };
    let sinks = export(&store, &config)?;

    assert_eq!(
        sinks.names(),
        vec![
            "header.nodes.Person.csv".to_string(),
            "header.relationships.KNOWS.csv".to_string(),
            "nodes.Person.csv".to_string(),
            "relationships.KNOWS.csv".to_string(),
        ]
    );
    assert_eq!(
        sinks.get("header.nodes.Person.csv").unwrap().trim_end(),
        ":ID,age:long,name,:LABEL"
    );
    // Data files start straight at the first row.
    assert!(sinks
        .get("nodes.Person.csv")
        .unwrap()
        .starts_with("0,30,Alice,"));
    Ok(())
}

#[test]
fn array_properties_get_the_bracket_suffix() -> Result<()> {
    let store = MemoryGraph::new();
    let mut tx = store.begin()?;
    let n = tx.create_node()?;
    tx.add_label(n, "Person")?;
    tx.set_node_property(
        n,
        "tags",
        PropertyValue::List(vec![
            PropertyValue::String("a".into()),
            PropertyValue::String("b".into()),
        ]),
    )?;
    tx.set_node_property(
        n,
        "scores",
        PropertyValue::List(vec![PropertyValue::Int(1), PropertyValue::Int(2)]),
    )?;
    tx.commit()?;

    let config = ExportConfig {
        quoting: Quoting::IfNeeded,
        bulk_import: true,
        ..ExportConfig::default()
    };
    let sinks = export(&store, &config)?;

    let out = sinks.get("nodes.Person.csv").unwrap();
    let mut lines = out.lines();
    assert_eq!(lines.next(), Some(":ID,scores:long[],tags[],:LABEL"));
    assert_eq!(lines.next(), Some("0,1;2,a;b,Person"));
    Ok(())
}

/// Sink that records the node counter every time bytes reach it, so a
/// test can see what a concurrent status reader would see mid-export.
struct StreamingSinks<'a> {
    tracker: &'a ProgressTracker,
    observed: Mutex<Vec<u64>>,
}

impl SinkProvider for StreamingSinks<'_> {
    fn create(&self, _name: &str) -> Result<Box<dyn Write + '_>> {
        Ok(Box::new(ObservedSink { sinks: self }))
    }
}

struct ObservedSink<'a> {
    sinks: &'a StreamingSinks<'a>,
}

impl Write for ObservedSink<'_> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let (nodes, _, _) = self.sinks.tracker.snapshot();
        if let Ok(mut observed) = self.sinks.observed.lock() {
            observed.push(nodes);
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn plain_export_reports_progress_while_streaming() -> Result<()> {
    let store = MemoryGraph::new();
    let mut tx = store.begin()?;
    for _ in 0..5 {
        tx.create_node()?;
    }
    tx.commit()?;

    let progress = ProgressTracker::new();
    let sinks = StreamingSinks {
        tracker: &progress,
        observed: Mutex::new(Vec::new()),
    };
    let config = ExportConfig {
        quoting: Quoting::IfNeeded,
        batch_size: BatchSize::from_raw(2)?,
        ..ExportConfig::default()
    };
    let report = Exporter::new(&config, &progress).export(&store, &sinks, "all.csv")?;
    assert_eq!(report.nodes, 5);

    // Batch-boundary flushes surface intermediate counts; without them a
    // status reader would only ever observe the final total.
    let observed = sinks.observed.into_inner().unwrap();
    assert!(observed.contains(&2), "observed {observed:?}");
    assert!(observed.contains(&4), "observed {observed:?}");
    assert_eq!(observed.last(), Some(&5));
    Ok(())
}

#[test]
fn progress_counts_exported_entities() -> Result<()> {
    let store = sample_graph()?;
    let sinks = MemFiles::new();
    let progress = ProgressTracker::new();
    let config = ExportConfig::default();
    let report = Exporter::new(&config, &progress).export(&store, &sinks, "all.csv")?;

    assert_eq!(report.nodes, 2);
    assert_eq!(report.relationships, 1);
    assert_eq!(report.properties, 5);
    Ok(())
}
