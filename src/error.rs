use std::fmt;
use std::io;
use std::sync::{Mutex, MutexGuard};

use thiserror::Error;
use tracing::error;

use crate::values::ScalarType;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, GantryError>;

/// Which endpoint of a relationship row failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// The `:START_ID` column.
    Start,
    /// The `:END_ID` column.
    End,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Start => write!(f, "start"),
            Endpoint::End => write!(f, "end"),
        }
    }
}

/// Errors produced while loading or exporting CSV graph data.
///
/// None of these are retried automatically. Every variant carries enough
/// context (file, line, raw content, id space) to fix the input and re-run.
/// Batches committed before the failure stay committed.
#[derive(Debug, Error)]
pub enum GantryError {
    /// A header cell did not match the `name[:type][{params}][(idspace)][[]]` shape.
    #[error("malformed header field {column} in '{file}': '{text}'")]
    Parse {
        /// File the header came from.
        file: String,
        /// Zero-based column index.
        column: usize,
        /// Raw cell text.
        text: String,
    },
    /// A header cell used a type tag outside the supported set.
    #[error("unknown type tag '{tag}' in header field {column} of '{file}'")]
    UnknownType {
        /// File the header came from.
        file: String,
        /// Zero-based column index.
        column: usize,
        /// The unrecognized tag.
        tag: String,
    },
    /// A mandatory column count constraint was violated.
    #[error("'{file}': expected {expected} {column} column, found {found}")]
    ColumnCount {
        /// File the header came from.
        file: String,
        /// Column kind, e.g. `:START_ID`.
        column: &'static str,
        /// Constraint description, e.g. "exactly one".
        expected: &'static str,
        /// Number of matching columns found.
        found: usize,
    },
    /// A node row re-used an external id already registered in its id space.
    #[error("duplicate node with id '{id}' (id space '{id_space}') on line {line}: [{row}]")]
    DuplicateId {
        /// The offending external id.
        id: String,
        /// The id space it collided in.
        id_space: String,
        /// One-based data line number.
        line: u64,
        /// Raw row content.
        row: String,
    },
    /// A relationship row referenced an external id that was never registered.
    #[error("node for id space '{id_space}' and id '{id}' not found ({endpoint} endpoint, line {line})")]
    UnresolvedEndpoint {
        /// Id space searched.
        id_space: String,
        /// External id that failed to resolve.
        id: String,
        /// Which endpoint column the id came from.
        endpoint: Endpoint,
        /// One-based data line number.
        line: u64,
    },
    /// A cell could not be converted to its declared scalar type.
    #[error("cannot convert '{value}' to {target} on line {line}")]
    Coercion {
        /// Raw cell text.
        value: String,
        /// Declared target type.
        target: ScalarType,
        /// One-based data line number (0 when raised outside row context).
        line: u64,
    },
    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// A referenced entity does not exist in the store.
    #[error("{0} not found")]
    NotFound(&'static str),
    /// Internal invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
    /// I/O error from the file abstraction.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// CSV parse or write error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl GantryError {
    /// Attaches a file name to header errors raised without file context.
    pub(crate) fn in_file(mut self, name: &str) -> Self {
        match &mut self {
            GantryError::Parse { file, .. }
            | GantryError::UnknownType { file, .. }
            | GantryError::ColumnCount { file, .. } => {
                *file = name.to_string();
            }
            _ => {}
        }
        self
    }

    /// Attaches a data line number to coercion errors raised without row context.
    pub(crate) fn at_line(mut self, line_no: u64) -> Self {
        if let GantryError::Coercion { line, .. } = &mut self {
            *line = line_no;
        }
        self
    }
}

pub(crate) fn acquire_lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex.lock().map_err(|_| {
        error!("store lock poisoned - fatal error");
        GantryError::Internal("store lock poisoned".into())
    })
}
