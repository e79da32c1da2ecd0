//! The per-column header mini-grammar.
//!
//! Each header cell has the shape `name[:type][{params}][(idspace)][\[\]]`,
//! every group optional. `:ID`, `:START_ID`, `:END_ID`, `:LABEL`, `:TYPE`
//! and `:IGNORE` mark the column's structural role; any other tag is a
//! scalar type from the closed [`ScalarType`] set, defaulting to `string`.

use std::collections::BTreeMap;

use csv::ReaderBuilder;

use crate::error::{GantryError, Result};
use crate::values::ScalarType;

/// Property name given to `:ID` columns declared without a literal name.
pub const ID_ATTR: &str = "__csv_id";
/// Reserved name assigned to every `:START_ID` column.
pub const START_ID_ATTR: &str = "__csv_start_id";
/// Reserved name assigned to every `:END_ID` column.
pub const END_ID_ATTR: &str = "__csv_end_id";
/// Reserved name assigned to every `:LABEL` column.
pub const LABEL_ATTR: &str = "__csv_label";
/// Reserved name assigned to every `:TYPE` column.
pub const TYPE_ATTR: &str = "__csv_type";
/// Id space used when an id column does not name one.
pub const DEFAULT_ID_SPACE: &str = "__CSV_DEFAULT_IDSPACE__";

/// Structural role of a header column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// External node identifier, registered in its id space.
    Id,
    /// Relationship start endpoint reference.
    StartId,
    /// Relationship end endpoint reference.
    EndId,
    /// Extra node labels (always an array).
    Label,
    /// Relationship type override.
    Type,
    /// Column skipped entirely.
    Ignore,
    /// Plain property of the given scalar type.
    Scalar(ScalarType),
}

/// One parsed header column.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderField {
    /// Zero-based column index.
    pub index: usize,
    /// Resolved property name (reserved names for structural roles).
    pub name: String,
    /// Structural role or scalar type.
    pub kind: FieldKind,
    /// Whether cells hold arrays split on the array delimiter.
    pub is_array: bool,
    /// Id space for `Id`/`StartId`/`EndId` columns.
    pub id_space: String,
    /// Optional `{key:value}` parameters, e.g. a default `timezone`.
    pub params: BTreeMap<String, String>,
}

/// Parses a full header line into an ordered field list. The line is split
/// with the same delimiter and quote character as the data rows.
pub fn parse_header(line: &str, delimiter: u8, quote: u8) -> Result<Vec<HeaderField>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .quote(quote)
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());
    let mut record = csv::StringRecord::new();
    if !reader.read_record(&mut record)? {
        return Ok(Vec::new());
    }
    record
        .iter()
        .enumerate()
        .map(|(index, cell)| parse_field(index, cell.trim()))
        .collect()
}

/// Parses a single header cell. Total over any input: failures surface as
/// [`GantryError::Parse`] or [`GantryError::UnknownType`], never panics.
pub fn parse_field(index: usize, cell: &str) -> Result<HeaderField> {
    let parse_err = || GantryError::Parse {
        file: String::new(),
        column: index,
        text: cell.to_string(),
    };

    let (body, is_array) = match cell.strip_suffix("[]") {
        Some(body) => (body, true),
        None => (cell, false),
    };
    let (body, id_space) = take_suffix_group(body, '(', ')').ok_or_else(parse_err)?;
    let (body, params_raw) = take_suffix_group(body, '{', '}').ok_or_else(parse_err)?;

    let (name, tag) = match body.split_once(':') {
        Some((name, tag)) => (name, Some(tag)),
        None => (body, None),
    };
    // Stray grammar characters left in the name or tag mean the cell never
    // matched the shape.
    if name.contains(['(', ')', '{', '}', '[', ']']) {
        return Err(parse_err());
    }
    if let Some(tag) = tag {
        if tag.contains([':', '(', ')', '{', '}', '[', ']']) {
            return Err(parse_err());
        }
    }

    let kind = match tag {
        None | Some("") => FieldKind::Scalar(ScalarType::String),
        Some("ID") => FieldKind::Id,
        Some("START_ID") => FieldKind::StartId,
        Some("END_ID") => FieldKind::EndId,
        Some("LABEL") => FieldKind::Label,
        Some("TYPE") => FieldKind::Type,
        Some("IGNORE") => FieldKind::Ignore,
        Some(tag) => match ScalarType::from_tag(tag) {
            Some(ty) => FieldKind::Scalar(ty),
            None => {
                return Err(GantryError::UnknownType {
                    file: String::new(),
                    column: index,
                    tag: tag.to_string(),
                })
            }
        },
    };

    let name = match kind {
        FieldKind::Id if name.is_empty() => ID_ATTR.to_string(),
        FieldKind::StartId => START_ID_ATTR.to_string(),
        FieldKind::EndId => END_ID_ATTR.to_string(),
        FieldKind::Label => LABEL_ATTR.to_string(),
        FieldKind::Type => TYPE_ATTR.to_string(),
        _ => name.to_string(),
    };

    let id_space = match id_space {
        Some(space) if !space.is_empty() => space.to_string(),
        _ => DEFAULT_ID_SPACE.to_string(),
    };

    let params = match params_raw {
        Some(raw) => parse_params(raw).ok_or_else(parse_err)?,
        None => BTreeMap::new(),
    };

    Ok(HeaderField {
        index,
        name,
        // LABEL columns always hold arrays of extra labels.
        is_array: is_array || kind == FieldKind::Label,
        kind,
        id_space,
        params,
    })
}

/// Strips a trailing `open…close` group, returning the remainder and the
/// group body. `None` when the group is malformed (unmatched delimiters).
fn take_suffix_group(text: &str, open: char, close: char) -> Option<(&str, Option<&str>)> {
    if let Some(head) = text.strip_suffix(close) {
        let start = head.rfind(open)?;
        let body = &head[start + open.len_utf8()..];
        if body.contains(close) {
            return None;
        }
        return Some((&head[..start], Some(body)));
    }
    // An unmatched opening delimiter anywhere in the remainder is malformed,
    // but its detection is deferred to the name/tag character check.
    Some((text, None))
}

fn parse_params(raw: &str) -> Option<BTreeMap<String, String>> {
    let mut params = BTreeMap::new();
    if raw.is_empty() {
        return Some(params);
    }
    for pair in raw.split(',') {
        let (key, value) = pair.split_once(':')?;
        params.insert(key.trim().to_string(), value.trim().to_string());
    }
    Some(params)
}

/// Finds the optional single `:ID` column of a node header. More than one
/// is fatal.
pub fn single_id_field(fields: &[HeaderField]) -> Result<Option<&HeaderField>> {
    let mut ids = fields.iter().filter(|f| f.kind == FieldKind::Id);
    let first = ids.next();
    let extra = ids.count();
    if extra > 0 {
        return Err(GantryError::ColumnCount {
            file: String::new(),
            column: ":ID",
            expected: "at most one",
            found: extra + 1,
        });
    }
    Ok(first)
}

/// Finds the mandatory `:START_ID` and `:END_ID` columns of a relationship
/// header; each must occur exactly once.
pub fn endpoint_fields(fields: &[HeaderField]) -> Result<(&HeaderField, &HeaderField)> {
    let start = exactly_one(fields, FieldKind::StartId, ":START_ID")?;
    let end = exactly_one(fields, FieldKind::EndId, ":END_ID")?;
    Ok((start, end))
}

fn exactly_one<'a>(
    fields: &'a [HeaderField],
    kind: FieldKind,
    column: &'static str,
) -> Result<&'a HeaderField> {
    let mut matching = fields.iter().filter(|f| f.kind == kind);
    match (matching.next(), matching.count()) {
        (Some(field), 0) => Ok(field),
        (first, rest) => Err(GantryError::ColumnCount {
            file: String::new(),
            column,
            expected: "exactly one",
            found: if first.is_some() { rest + 1 } else { 0 },
        }),
    }
}
