//! Bulk export feeding straight back into the loader.

use gantry::config::{ExportConfig, LoaderConfig, Quoting};
use gantry::error::Result;
use gantry::export::Exporter;
use gantry::files::MemFiles;
use gantry::graph::{GraphSource, GraphStore, GraphTransaction};
use gantry::loader::{EntityLoader, NodeFile, RelationshipFile};
use gantry::memory::MemoryGraph;
use gantry::model::Node;
use gantry::progress::ProgressTracker;
use gantry::values::{IsoDuration, PropertyValue};

use time::macros::{date, datetime};

fn original_graph() -> Result<MemoryGraph> {
    let store = MemoryGraph::new();
    let mut tx = store.begin()?;

    let alice = tx.create_node()?;
    tx.add_label(alice, "Person")?;
    tx.set_node_property(alice, "name", PropertyValue::String("Alice".into()))?;
    tx.set_node_property(alice, "age", PropertyValue::Int(30))?;
    tx.set_node_property(alice, "born", PropertyValue::Date(date!(1994 - 02 - 17)))?;
    tx.set_node_property(
        alice,
        "tags",
        PropertyValue::List(vec![
            PropertyValue::String("a".into()),
            PropertyValue::String("b".into()),
        ]),
    )?;

    let bob = tx.create_node()?;
    tx.add_label(bob, "Person")?;
    tx.set_node_property(bob, "name", PropertyValue::String("Bob".into()))?;
    tx.set_node_property(bob, "age", PropertyValue::Int(25))?;

    let initech = tx.create_node()?;
    tx.add_label(initech, "Company")?;
    tx.set_node_property(initech, "name", PropertyValue::String("Initech".into()))?;

    let knows = tx.create_relationship(alice, bob, "KNOWS")?;
    tx.set_relationship_property(
        knows,
        "since",
        PropertyValue::DateTime(datetime!(2019-06-01 12:00:00 +02:00)),
    )?;
    let works = tx.create_relationship(bob, initech, "WORKS_AT")?;
    tx.set_relationship_property(
        works,
        "tenure",
        PropertyValue::Duration(IsoDuration {
            months: 14,
            days: 3,
            seconds: 0,
            nanos: 0,
        }),
    )?;
    tx.commit()?;
    Ok(store)
}

fn find<'a>(nodes: &'a [Node], name: &str) -> &'a Node {
    nodes
        .iter()
        .find(|n| n.properties.get("name") == Some(&PropertyValue::String(name.into())))
        .expect("node by name")
}

#[test]
fn bulk_export_reimports_an_isomorphic_graph() -> Result<()> {
    let original = original_graph()?;

    let export_config = ExportConfig {
        quoting: Quoting::IfNeeded,
        bulk_import: true,
        ..ExportConfig::default()
    };
    let files = MemFiles::new();
    let progress = ProgressTracker::new();
    Exporter::new(&export_config, &progress).export(&original, &files, "")?;

    assert_eq!(
        files.names(),
        vec![
            "nodes.Company.csv".to_string(),
            "nodes.Person.csv".to_string(),
            "relationships.KNOWS.csv".to_string(),
            "relationships.WORKS_AT.csv".to_string(),
        ]
    );

    // The exported :ID column carries the original internal id; reimport
    // resolves endpoints through it, no labels beyond the :LABEL column.
    let reimported = MemoryGraph::new();
    let loader_config = LoaderConfig::default();
    let progress = ProgressTracker::new();
    let report = EntityLoader::new(&loader_config, &progress).load(
        &reimported,
        &files,
        &[
            NodeFile {
                file_name: "nodes.Company.csv".into(),
                labels: vec![],
            },
            NodeFile {
                file_name: "nodes.Person.csv".into(),
                labels: vec![],
            },
        ],
        &[
            RelationshipFile {
                file_name: "relationships.KNOWS.csv".into(),
                rel_type: "KNOWS".into(),
            },
            RelationshipFile {
                file_name: "relationships.WORKS_AT.csv".into(),
                rel_type: "WORKS_AT".into(),
            },
        ],
    )?;
    assert_eq!(report.nodes, 3);
    assert_eq!(report.relationships, 2);

    let nodes = reimported.nodes()?;
    let rels = reimported.relationships()?;

    let alice = find(&nodes, "Alice");
    assert_eq!(alice.labels, vec!["Person".to_string()]);
    assert_eq!(alice.properties.get("age"), Some(&PropertyValue::Int(30)));
    assert_eq!(
        alice.properties.get("born"),
        Some(&PropertyValue::Date(date!(1994 - 02 - 17)))
    );
    assert_eq!(
        alice.properties.get("tags"),
        Some(&PropertyValue::List(vec![
            PropertyValue::String("a".into()),
            PropertyValue::String("b".into()),
        ]))
    );

    let bob = find(&nodes, "Bob");
    let initech = find(&nodes, "Initech");
    assert_eq!(initech.labels, vec!["Company".to_string()]);

    let knows = rels.iter().find(|r| r.rel_type == "KNOWS").unwrap();
    assert_eq!(knows.start, alice.id);
    assert_eq!(knows.end, bob.id);
    assert_eq!(
        knows.properties.get("since"),
        Some(&PropertyValue::DateTime(
            datetime!(2019-06-01 12:00:00 +02:00)
        ))
    );

    let works = rels.iter().find(|r| r.rel_type == "WORKS_AT").unwrap();
    assert_eq!(works.start, bob.id);
    assert_eq!(works.end, initech.id);
    assert_eq!(
        works.properties.get("tenure"),
        Some(&PropertyValue::Duration(IsoDuration {
            months: 14,
            days: 3,
            seconds: 0,
            nanos: 0,
        }))
    );
    Ok(())
}

#[test]
fn plain_export_stays_stable_across_a_bulk_cycle() -> Result<()> {
    let original = original_graph()?;

    // Cycle once through bulk files.
    let bulk = ExportConfig {
        quoting: Quoting::IfNeeded,
        bulk_import: true,
        ..ExportConfig::default()
    };
    let files = MemFiles::new();
    let progress = ProgressTracker::new();
    Exporter::new(&bulk, &progress).export(&original, &files, "")?;

    let reimported = MemoryGraph::new();
    let loader_config = LoaderConfig::default();
    let progress = ProgressTracker::new();
    EntityLoader::new(&loader_config, &progress).load(
        &reimported,
        &files,
        &[
            NodeFile {
                file_name: "nodes.Company.csv".into(),
                labels: vec![],
            },
            NodeFile {
                file_name: "nodes.Person.csv".into(),
                labels: vec![],
            },
        ],
        &[
            RelationshipFile {
                file_name: "relationships.KNOWS.csv".into(),
                rel_type: "KNOWS".into(),
            },
            RelationshipFile {
                file_name: "relationships.WORKS_AT.csv".into(),
                rel_type: "WORKS_AT".into(),
            },
        ],
    )?;

    // Property-level equality between the graphs, ignoring internal ids
    // and the :ID column written back as a property.
    let strip = |mut node: Node| {
        node.properties.remove("__csv_id");
        (node.labels, node.properties)
    };
    let name_of = |props: &std::collections::BTreeMap<String, PropertyValue>| match props
        .get("name")
    {
        Some(PropertyValue::String(name)) => name.clone(),
        _ => String::new(),
    };
    let mut before: Vec<_> = original.nodes()?.into_iter().map(strip).collect();
    let mut after: Vec<_> = reimported.nodes()?.into_iter().map(strip).collect();
    before.sort_by_key(|(_, props)| name_of(props));
    after.sort_by_key(|(_, props)| name_of(props));
    assert_eq!(before, after);
    Ok(())
}
