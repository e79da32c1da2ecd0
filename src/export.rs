//! CSV export: the inverse of the loader.
//!
//! Plain mode writes one file whose header combines a node section and a
//! relationship section; bulk-import mode regenerates the loader's header
//! grammar, one file per distinct label set or relationship type, so the
//! output feeds straight back into an import.

use std::collections::BTreeMap;
use std::io::Write;
use std::time::Instant;

use csv::WriterBuilder;
use tracing::info;

use crate::config::{BatchSize, ExportConfig};
use crate::error::Result;
use crate::files::SinkProvider;
use crate::graph::GraphSource;
use crate::model::{Node, Relationship};
use crate::progress::{ProgressReport, ProgressTracker};
use crate::values::{self, PropertyValue, ScalarType};

/// Streams graph entities out as CSV.
pub struct Exporter<'a> {
    config: &'a ExportConfig,
    progress: &'a ProgressTracker,
}

/// Property type observed across a set of entities. Conflicting types
/// degrade to untyped (string) headers.
#[derive(Debug, Default, Clone, Copy)]
struct InferredType {
    ty: Option<ScalarType>,
    conflicted: bool,
    is_array: bool,
}

impl InferredType {
    fn observe(&mut self, value: &PropertyValue) {
        if let Some(ty) = value.scalar_type() {
            match self.ty {
                None => self.ty = Some(ty),
                Some(seen) if seen != ty => self.conflicted = true,
                Some(_) => {}
            }
        }
        self.is_array |= value.is_list();
    }

    fn effective(&self) -> Option<ScalarType> {
        match self.ty {
            Some(ty) if !self.conflicted && ty != ScalarType::String => Some(ty),
            _ => None,
        }
    }
}

type TypeMap = BTreeMap<String, InferredType>;

impl<'a> Exporter<'a> {
    /// Creates an exporter over a config and a progress tracker.
    pub fn new(config: &'a ExportConfig, progress: &'a ProgressTracker) -> Self {
        Self { config, progress }
    }

    /// Runs the export. `file_name` names the single output in plain mode;
    /// bulk-import mode derives one name per label set / type.
    pub fn export<G: GraphSource, S: SinkProvider>(
        &self,
        graph: &G,
        sinks: &S,
        file_name: &str,
    ) -> Result<ProgressReport> {
        let started = Instant::now();
        if self.config.bulk_import {
            self.export_bulk(graph, sinks)?;
        } else {
            self.export_plain(graph, sinks, file_name)?;
        }
        Ok(self.progress.report(started.elapsed()))
    }

    fn export_plain<G: GraphSource, S: SinkProvider>(
        &self,
        graph: &G,
        sinks: &S,
        file_name: &str,
    ) -> Result<()> {
        let nodes = graph.nodes()?;
        let relationships = graph.relationships()?;
        let node_types = collect_types(nodes.iter().map(|n| &n.properties));
        let rel_types = collect_types(relationships.iter().map(|r| &r.properties));

        let node_keys: Vec<&String> = node_types.keys().collect();
        let rel_keys: Vec<&String> = rel_types.keys().collect();

        let mut header: Vec<String> = Vec::new();
        for column in ["_id:id", "_labels:label"] {
            header.push(self.structural(column));
        }
        for key in &node_keys {
            header.push(self.property_header(key, &node_types[*key], self.config.use_types));
        }
        for column in ["_start:id", "_end:id", "_type:label"] {
            header.push(self.structural(column));
        }
        for key in &rel_keys {
            header.push(self.property_header(key, &rel_types[*key], self.config.use_types));
        }

        let sink = sinks.create(file_name)?;
        let mut writer = self.csv_writer(sink);
        writer.write_record(&header)?;

        let cols = header.len();
        let rel_offset = 2 + node_keys.len();

        let mut batch = 0u64;
        for node in &nodes {
            let mut row = vec![String::new(); cols];
            row[0] = node.id.0.to_string();
            row[1] = labels_string(&node.labels);
            let mut props = 0u64;
            for (slot, key) in node_keys.iter().enumerate() {
                if let Some(value) = node.properties.get(*key) {
                    row[2 + slot] = values::stringify(value, self.config.array_delimiter);
                    props += 1;
                }
            }
            writer.write_record(&row)?;
            self.progress.update(1, 0, props);
            batch += 1;
            if self.batch_boundary(batch) {
                writer.flush()?;
                batch = 0;
            }
        }

        let mut batch = 0u64;
        for rel in &relationships {
            let mut row = vec![String::new(); cols];
            row[rel_offset] = rel.start.0.to_string();
            row[rel_offset + 1] = rel.end.0.to_string();
            row[rel_offset + 2] = rel.rel_type.clone();
            let mut props = 0u64;
            for (slot, key) in rel_keys.iter().enumerate() {
                if let Some(value) = rel.properties.get(*key) {
                    row[rel_offset + 3 + slot] =
                        values::stringify(value, self.config.array_delimiter);
                    props += 1;
                }
            }
            writer.write_record(&row)?;
            self.progress.update(0, 1, props);
            batch += 1;
            if self.batch_boundary(batch) {
                writer.flush()?;
                batch = 0;
            }
        }

        writer.flush()?;
        info!(
            file = file_name,
            nodes = nodes.len(),
            relationships = relationships.len(),
            "plain CSV export written"
        );
        Ok(())
    }

    fn export_bulk<G: GraphSource, S: SinkProvider>(&self, graph: &G, sinks: &S) -> Result<()> {
        let nodes = graph.nodes()?;
        let relationships = graph.relationships()?;

        // Materialize per-group batches in memory; grouping is by the exact
        // (sorted) label set and by relationship type.
        let mut node_groups: BTreeMap<Vec<String>, Vec<&Node>> = BTreeMap::new();
        for node in &nodes {
            let mut labels = node.labels.clone();
            labels.sort();
            node_groups.entry(labels).or_default().push(node);
        }
        let mut rel_groups: BTreeMap<String, Vec<&Relationship>> = BTreeMap::new();
        for rel in &relationships {
            rel_groups.entry(rel.rel_type.clone()).or_default().push(rel);
        }

        for (labels, group) in &node_groups {
            self.write_node_group(sinks, labels, group)?;
        }
        for (rel_type, group) in &rel_groups {
            self.write_rel_group(sinks, rel_type, group)?;
        }
        info!(
            node_files = node_groups.len(),
            relationship_files = rel_groups.len(),
            "bulk-import export written"
        );
        Ok(())
    }

    fn write_node_group<S: SinkProvider>(
        &self,
        sinks: &S,
        labels: &[String],
        group: &[&Node],
    ) -> Result<()> {
        let types = collect_types(group.iter().map(|n| &n.properties));
        let keys: Vec<&String> = types.keys().collect();

        let mut header = vec![":ID".to_string()];
        for key in &keys {
            header.push(self.property_header(key, &types[*key], true));
        }
        header.push(":LABEL".to_string());

        let name = if labels.is_empty() {
            "nodes.csv".to_string()
        } else {
            format!("nodes.{}.csv", labels.join("."))
        };
        let mut writer = self.group_writer(sinks, &name, &header)?;

        let joined_labels = join_with(labels, self.config.array_delimiter);
        for node in group {
            let mut row = Vec::with_capacity(header.len());
            row.push(node.id.0.to_string());
            let mut props = 0u64;
            for key in &keys {
                match node.properties.get(*key) {
                    Some(value) => {
                        row.push(values::stringify(value, self.config.array_delimiter));
                        props += 1;
                    }
                    None => row.push(String::new()),
                }
            }
            row.push(joined_labels.clone());
            writer.write_record(&row)?;
            self.progress.update(1, 0, props);
        }
        writer.flush()?;
        Ok(())
    }

    fn write_rel_group<S: SinkProvider>(
        &self,
        sinks: &S,
        rel_type: &str,
        group: &[&Relationship],
    ) -> Result<()> {
        let types = collect_types(group.iter().map(|r| &r.properties));
        let keys: Vec<&String> = types.keys().collect();

        let mut header = vec![
            ":START_ID".to_string(),
            ":END_ID".to_string(),
            ":TYPE".to_string(),
        ];
        for key in &keys {
            header.push(self.property_header(key, &types[*key], true));
        }

        let name = format!("relationships.{rel_type}.csv");
        let mut writer = self.group_writer(sinks, &name, &header)?;

        for rel in group {
            let mut row = Vec::with_capacity(header.len());
            row.push(rel.start.0.to_string());
            row.push(rel.end.0.to_string());
            row.push(rel.rel_type.clone());
            let mut props = 0u64;
            for key in &keys {
                match rel.properties.get(*key) {
                    Some(value) => {
                        row.push(values::stringify(value, self.config.array_delimiter));
                        props += 1;
                    }
                    None => row.push(String::new()),
                }
            }
            writer.write_record(&row)?;
            self.progress.update(0, 1, props);
        }
        writer.flush()?;
        Ok(())
    }

    /// Opens the data writer for one bulk group, emitting the header into
    /// it or into a sibling `header.` file per `separateHeader`.
    fn group_writer<'s, S: SinkProvider>(
        &self,
        sinks: &'s S,
        name: &str,
        header: &[String],
    ) -> Result<csv::Writer<Box<dyn Write + 's>>> {
        if self.config.separate_header {
            let header_sink = sinks.create(&format!("header.{name}"))?;
            let mut header_writer = self.csv_writer(header_sink);
            header_writer.write_record(header)?;
            header_writer.flush()?;
        }
        let mut writer = self.csv_writer(sinks.create(name)?);
        if !self.config.separate_header {
            writer.write_record(header)?;
        }
        Ok(writer)
    }

    fn csv_writer<'s>(&self, sink: Box<dyn Write + 's>) -> csv::Writer<Box<dyn Write + 's>> {
        WriterBuilder::new()
            .delimiter(self.config.delimiter)
            .quote_style(self.config.quoting.to_csv())
            .from_writer(sink)
    }

    fn structural(&self, column: &str) -> String {
        if self.config.use_types {
            column.to_string()
        } else {
            column.split(':').next().unwrap_or(column).to_string()
        }
    }

    fn property_header(&self, key: &str, inferred: &InferredType, with_types: bool) -> String {
        let mut out = key.to_string();
        if with_types {
            if let Some(ty) = inferred.effective() {
                out.push(':');
                out.push_str(ty.tag());
            }
            if inferred.is_array {
                out.push_str("[]");
            }
        }
        out
    }

    /// Whether `batch` rows have accumulated since the last flush.
    fn batch_boundary(&self, batch: u64) -> bool {
        match self.config.batch_size {
            BatchSize::Limited(limit) => batch >= limit.get() as u64,
            BatchSize::Unbounded => false,
        }
    }
}

fn collect_types<'v>(
    entities: impl Iterator<Item = &'v BTreeMap<String, PropertyValue>>,
) -> TypeMap {
    let mut types = TypeMap::new();
    for properties in entities {
        for (key, value) in properties {
            types.entry(key.clone()).or_default().observe(value);
        }
    }
    types
}

fn labels_string(labels: &[String]) -> String {
    if labels.is_empty() {
        String::new()
    } else {
        format!(":{}", labels.join(":"))
    }
}

fn join_with(parts: &[String], delimiter: char) -> String {
    parts.join(&delimiter.to_string())
}
