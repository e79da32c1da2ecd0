//! Two-phase batched CSV entity loading.
//!
//! All node files load first, filling the [`IdSpaceRegistry`]; only then do
//! relationship files resolve their endpoints against it — a strict
//! sequential barrier. Each file is read once, forward-only: the header
//! line is consumed with a raw scan, the remaining rows stream through the
//! CSV reader into a [`BatchTransaction`] scope.

use std::time::Instant;

use csv::ReaderBuilder;
use tracing::{debug, info, warn};

use crate::batch::BatchTransaction;
use crate::config::LoaderConfig;
use crate::error::{Endpoint, GantryError, Result};
use crate::files::FileProvider;
use crate::graph::{GraphStore, GraphTransaction};
use crate::header::{self, FieldKind, HeaderField, DEFAULT_ID_SPACE};
use crate::idspace::IdSpaceRegistry;
use crate::progress::{ProgressReport, ProgressTracker};
use crate::values::{self, PropertyValue, ScalarType};

/// One node CSV input: the file plus the labels applied to every row.
#[derive(Debug, Clone)]
pub struct NodeFile {
    /// Name resolved through the [`FileProvider`].
    pub file_name: String,
    /// Labels attached to each created node.
    pub labels: Vec<String>,
}

/// One relationship CSV input: the file plus the default relationship type.
#[derive(Debug, Clone)]
pub struct RelationshipFile {
    /// Name resolved through the [`FileProvider`].
    pub file_name: String,
    /// Type used unless a `:TYPE` column overrides it per row.
    pub rel_type: String,
}

/// Orchestrates a single import invocation.
pub struct EntityLoader<'a> {
    config: &'a LoaderConfig,
    progress: &'a ProgressTracker,
}

impl<'a> EntityLoader<'a> {
    /// Creates a loader over a config and a progress tracker.
    pub fn new(config: &'a LoaderConfig, progress: &'a ProgressTracker) -> Self {
        Self { config, progress }
    }

    /// Loads every node file, then every relationship file, and reports
    /// final counts. A failure aborts the current file only: batches
    /// committed earlier — in this file or previous ones — persist.
    pub fn load<S: GraphStore, F: FileProvider>(
        &self,
        store: &S,
        files: &F,
        nodes: &[NodeFile],
        relationships: &[RelationshipFile],
    ) -> Result<ProgressReport> {
        let started = Instant::now();
        let mut registry = IdSpaceRegistry::new();
        for node_file in nodes {
            self.load_nodes(store, files, node_file, &mut registry)?;
        }
        // Node phase complete: the registry is read-only from here on.
        for rel_file in relationships {
            self.load_relationships(store, files, rel_file, &registry)?;
        }
        Ok(self.progress.report(started.elapsed()))
    }

    /// Loads one node file, registering external ids in the registry.
    pub fn load_nodes<S: GraphStore, F: FileProvider>(
        &self,
        store: &S,
        files: &F,
        node_file: &NodeFile,
        registry: &mut IdSpaceRegistry,
    ) -> Result<()> {
        let file_name = node_file.file_name.as_str();
        let fields = match self.read_header(files, file_name)? {
            Some(fields) => fields,
            None => return Ok(()),
        };
        let (fields, mut reader) = fields;

        let id_field = header::single_id_field(&fields).map_err(|e| e.in_file(file_name))?;
        if id_field.is_none() {
            warn!(
                file = file_name,
                "no ID column; imported nodes cannot be referenced by relationship files"
            );
        }
        let id_space = id_field
            .map(|f| f.id_space.clone())
            .unwrap_or_else(|| DEFAULT_ID_SPACE.to_string());

        let mut csv_reader = ReaderBuilder::new()
            .delimiter(self.config.delimiter)
            .quote(self.config.quotation_character)
            .has_headers(false)
            .flexible(true)
            .from_reader(&mut reader);

        let mut btx = BatchTransaction::new(store, self.config.batch_size)?;
        let mut line_no = 0u64;
        let mut created = 0u64;
        for record in csv_reader.records() {
            let record = record?;
            line_no += 1;

            let external_id = id_field.map(|f| record.get(f.index).unwrap_or("").to_string());
            if let Some(id) = &external_id {
                if registry.contains(&id_space, id) {
                    if self.config.ignore_duplicate_nodes {
                        continue;
                    }
                    return Err(GantryError::DuplicateId {
                        id: id.clone(),
                        id_space: id_space.clone(),
                        line: line_no,
                        row: record.iter().collect::<Vec<_>>().join(", "),
                    });
                }
            }

            let tx = btx.tx();
            let node = tx.create_node()?;
            for label in &node_file.labels {
                tx.add_label(node, label)?;
            }

            let mut props = 0u64;
            for field in &fields {
                let raw = record.get(field.index);
                match field.kind {
                    FieldKind::Label => {
                        let Some(raw) = raw else { continue };
                        for label in raw.split(self.config.array_delimiter) {
                            if !label.is_empty() {
                                tx.add_label(node, label)?;
                            }
                        }
                    }
                    FieldKind::Id => {
                        let value = self
                            .id_property(raw.unwrap_or(""))
                            .map_err(|e| e.at_line(line_no))?;
                        tx.set_node_property(node, &field.name, value)?;
                        props += 1;
                    }
                    FieldKind::Scalar(ty) => {
                        if let Some(value) = self
                            .coerce_cell(raw, field, ty)
                            .map_err(|e| e.at_line(line_no))?
                        {
                            tx.set_node_property(node, &field.name, value)?;
                            props += 1;
                        }
                    }
                    // Endpoint and TYPE columns carry no node data; IGNORE
                    // is always skipped.
                    FieldKind::StartId
                    | FieldKind::EndId
                    | FieldKind::Type
                    | FieldKind::Ignore => {}
                }
            }

            if let Some(id) = external_id {
                registry.register(&id_space, &id, node);
            }
            self.progress.update(1, 0, props);
            created += 1;
            btx.bump()?;
        }
        let batches = btx.finish()?;
        info!(
            file = file_name,
            nodes = created,
            batches,
            "node file loaded"
        );
        Ok(())
    }

    /// Loads one relationship file, resolving endpoints via the registry.
    pub fn load_relationships<S: GraphStore, F: FileProvider>(
        &self,
        store: &S,
        files: &F,
        rel_file: &RelationshipFile,
        registry: &IdSpaceRegistry,
    ) -> Result<()> {
        let file_name = rel_file.file_name.as_str();
        let fields = match self.read_header(files, file_name)? {
            Some(fields) => fields,
            None => {
                return Err(GantryError::ColumnCount {
                    file: file_name.to_string(),
                    column: ":START_ID",
                    expected: "exactly one",
                    found: 0,
                })
            }
        };
        let (fields, mut reader) = fields;
        let (start_field, end_field) =
            header::endpoint_fields(&fields).map_err(|e| e.in_file(file_name))?;
        let type_field = fields.iter().find(|f| f.kind == FieldKind::Type);

        let mut csv_reader = ReaderBuilder::new()
            .delimiter(self.config.delimiter)
            .quote(self.config.quotation_character)
            .has_headers(false)
            .flexible(true)
            .from_reader(&mut reader);

        let mut btx = BatchTransaction::new(store, self.config.batch_size)?;
        let mut line_no = 0u64;
        let mut created = 0u64;
        for record in csv_reader.records() {
            let record = record?;
            line_no += 1;

            let start = self.resolve_endpoint(
                registry,
                start_field,
                record.get(start_field.index).unwrap_or(""),
                Endpoint::Start,
                line_no,
            )?;
            let end = self.resolve_endpoint(
                registry,
                end_field,
                record.get(end_field.index).unwrap_or(""),
                Endpoint::End,
                line_no,
            )?;

            // An empty TYPE cell falls back to the file-level default.
            let rel_type = type_field
                .and_then(|f| record.get(f.index))
                .filter(|value| !value.is_empty())
                .unwrap_or(rel_file.rel_type.as_str());

            let tx = btx.tx();
            let rel = tx.create_relationship(start, end, rel_type)?;

            let mut props = 0u64;
            for field in &fields {
                let raw = record.get(field.index);
                match field.kind {
                    FieldKind::Id => {
                        let value = self
                            .id_property(raw.unwrap_or(""))
                            .map_err(|e| e.at_line(line_no))?;
                        tx.set_relationship_property(rel, &field.name, value)?;
                        props += 1;
                    }
                    FieldKind::Scalar(ty) => {
                        if let Some(value) = self
                            .coerce_cell(raw, field, ty)
                            .map_err(|e| e.at_line(line_no))?
                        {
                            tx.set_relationship_property(rel, &field.name, value)?;
                            props += 1;
                        }
                    }
                    FieldKind::StartId
                    | FieldKind::EndId
                    | FieldKind::Type
                    | FieldKind::Label
                    | FieldKind::Ignore => {}
                }
            }

            self.progress.update(0, 1, props);
            created += 1;
            btx.bump()?;
        }
        let batches = btx.finish()?;
        info!(
            file = file_name,
            relationships = created,
            batches,
            "relationship file loaded"
        );
        Ok(())
    }

    /// Raw-scans the header line and skips configured leading lines.
    /// Returns `None` for an empty file.
    #[allow(clippy::type_complexity)]
    fn read_header<F: FileProvider>(
        &self,
        files: &F,
        file_name: &str,
    ) -> Result<Option<(Vec<HeaderField>, crate::files::CountingReader<Box<dyn std::io::BufRead>>)>>
    {
        let mut reader = files.open(file_name)?;
        let Some(header_line) = reader.read_raw_line()? else {
            return Ok(None);
        };
        for _ in 1..self.config.skip_lines {
            if reader.read_raw_line()?.is_none() {
                break;
            }
        }
        let fields = header::parse_header(
            &header_line,
            self.config.delimiter,
            self.config.quotation_character,
        )
        .map_err(|e| e.in_file(file_name))?;
        debug!(file = file_name, columns = fields.len(), "header parsed");
        Ok(Some((fields, reader)))
    }

    fn resolve_endpoint(
        &self,
        registry: &IdSpaceRegistry,
        field: &HeaderField,
        external_id: &str,
        endpoint: Endpoint,
        line_no: u64,
    ) -> Result<crate::model::NodeId> {
        registry
            .resolve(&field.id_space, external_id)
            .ok_or_else(|| GantryError::UnresolvedEndpoint {
                id_space: field.id_space.clone(),
                id: external_id.to_string(),
                endpoint,
                line: line_no,
            })
    }

    /// The external id written back as a node property: kept as a string
    /// or coerced to an integer, per `stringIds`.
    fn id_property(&self, raw: &str) -> Result<PropertyValue> {
        if self.config.string_ids {
            Ok(PropertyValue::String(raw.to_string()))
        } else {
            values::coerce(raw, ScalarType::Int, &Default::default())
        }
    }

    /// Converts one data cell per its header field. `None` means the cell
    /// contributes no property.
    fn coerce_cell(
        &self,
        raw: Option<&str>,
        field: &HeaderField,
        ty: ScalarType,
    ) -> Result<Option<PropertyValue>> {
        let Some(raw) = raw else { return Ok(None) };
        if raw.is_empty() {
            // Only a plain string column keeps an explicit empty value;
            // empty cells of every other shape contribute nothing.
            if self.config.ignore_empty_string || field.is_array || ty != ScalarType::String {
                return Ok(None);
            }
            return Ok(Some(PropertyValue::String(String::new())));
        }
        if field.is_array {
            let elements = raw
                .split(self.config.array_delimiter)
                .map(|part| values::coerce(part, ty, &field.params))
                .collect::<Result<Vec<_>>>()?;
            Ok(Some(PropertyValue::List(elements)))
        } else {
            values::coerce(raw, ty, &field.params).map(Some)
        }
    }
}
