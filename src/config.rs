//! Validated, immutable configuration for the loader and exporter.
//!
//! Both configs can be built from a loosely-typed `serde_json` map (the
//! shape procedure layers hand around) or through a builder. Parsing
//! happens once, up front; unknown keys are ignored, wrongly-typed values
//! and out-of-range numbers are [`GantryError::Config`] errors.

use std::num::NonZeroUsize;

use serde_json::{Map, Value};

use crate::error::{GantryError, Result};

/// Batch commit bound for one file's transaction scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchSize {
    /// Commit and reopen every `n` entities.
    Limited(NonZeroUsize),
    /// Single transaction for the whole file (`batchSize: -1`).
    Unbounded,
}

impl BatchSize {
    /// Default bound of 2000 entities per batch.
    pub const DEFAULT: BatchSize = match NonZeroUsize::new(2000) {
        Some(n) => BatchSize::Limited(n),
        None => unreachable!(),
    };

    /// Validates a raw configured value: positive sizes are limits, `-1`
    /// is the documented unbounded sentinel, anything else is rejected.
    pub fn from_raw(raw: i64) -> Result<Self> {
        if raw == -1 {
            return Ok(BatchSize::Unbounded);
        }
        usize::try_from(raw)
            .ok()
            .and_then(NonZeroUsize::new)
            .map(BatchSize::Limited)
            .ok_or_else(|| {
                GantryError::Config(format!(
                    "batchSize must be positive or the -1 sentinel, got {raw}"
                ))
            })
    }
}

/// Quoting policy applied uniformly to every column within one export run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quoting {
    /// Quote every field.
    #[default]
    Always,
    /// Quote only fields that need it.
    IfNeeded,
    /// Never quote (output may not re-parse if values embed the delimiter).
    None,
}

impl Quoting {
    fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "always" => Ok(Quoting::Always),
            "ifneeded" => Ok(Quoting::IfNeeded),
            "none" => Ok(Quoting::None),
            _ => Err(GantryError::Config(format!(
                "quotes must be one of none/ifNeeded/always, got '{name}'"
            ))),
        }
    }

    pub(crate) fn to_csv(self) -> csv::QuoteStyle {
        match self {
            Quoting::Always => csv::QuoteStyle::Always,
            Quoting::IfNeeded => csv::QuoteStyle::Necessary,
            Quoting::None => csv::QuoteStyle::Never,
        }
    }
}

/// Immutable loader configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LoaderConfig {
    /// Column delimiter.
    pub delimiter: u8,
    /// Delimiter splitting array cells.
    pub array_delimiter: char,
    /// Quote character for both header and data rows.
    pub quotation_character: u8,
    /// Store node ids as strings (`true`) or coerce them to integers.
    pub string_ids: bool,
    /// Physical lines consumed before data starts (the header included).
    pub skip_lines: usize,
    /// Commit bound per file.
    pub batch_size: BatchSize,
    /// Skip rows whose id already exists instead of failing.
    pub ignore_duplicate_nodes: bool,
    /// Treat empty-string cells as absent.
    pub ignore_empty_string: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            delimiter: b',',
            array_delimiter: ';',
            quotation_character: b'"',
            string_ids: true,
            skip_lines: 1,
            batch_size: BatchSize::DEFAULT,
            ignore_duplicate_nodes: false,
            ignore_empty_string: false,
        }
    }
}

impl LoaderConfig {
    /// Starts a builder over the defaults.
    pub fn builder() -> LoaderConfigBuilder {
        LoaderConfigBuilder {
            config: LoaderConfig::default(),
        }
    }

    /// Parses the recognized option keys out of a loosely-typed map.
    pub fn from_map(map: &Map<String, Value>) -> Result<Self> {
        let mut builder = LoaderConfig::builder();
        if let Some(value) = map.get("delimiter") {
            builder = builder.delimiter(single_byte(value, "delimiter")?);
        }
        if let Some(value) = map.get("arrayDelimiter") {
            builder = builder.array_delimiter(single_char(value, "arrayDelimiter")?);
        }
        if let Some(value) = map.get("quotationCharacter") {
            builder = builder.quotation_character(single_byte(value, "quotationCharacter")?);
        }
        if let Some(value) = map.get("stringIds") {
            builder = builder.string_ids(boolean(value, "stringIds")?);
        }
        if let Some(value) = map.get("skipLines") {
            let lines = integer(value, "skipLines")?;
            if lines < 1 {
                return Err(GantryError::Config(format!(
                    "skipLines must be at least 1, got {lines}"
                )));
            }
            builder = builder.skip_lines(lines as usize);
        }
        if let Some(value) = map.get("batchSize") {
            builder = builder.batch_size(BatchSize::from_raw(integer(value, "batchSize")?)?);
        }
        if let Some(value) = map.get("ignoreDuplicateNodes") {
            builder = builder.ignore_duplicate_nodes(boolean(value, "ignoreDuplicateNodes")?);
        }
        if let Some(value) = map.get("ignoreEmptyString") {
            builder = builder.ignore_empty_string(boolean(value, "ignoreEmptyString")?);
        }
        Ok(builder.build())
    }
}

/// Builder for [`LoaderConfig`].
#[derive(Debug, Clone)]
pub struct LoaderConfigBuilder {
    config: LoaderConfig,
}

impl LoaderConfigBuilder {
    /// Sets the column delimiter.
    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.config.delimiter = delimiter;
        self
    }

    /// Sets the array element delimiter.
    pub fn array_delimiter(mut self, delimiter: char) -> Self {
        self.config.array_delimiter = delimiter;
        self
    }

    /// Sets the quote character.
    pub fn quotation_character(mut self, quote: u8) -> Self {
        self.config.quotation_character = quote;
        self
    }

    /// Stores node ids as strings instead of coercing to integers.
    pub fn string_ids(mut self, string_ids: bool) -> Self {
        self.config.string_ids = string_ids;
        self
    }

    /// Number of leading physical lines to consume (header included).
    pub fn skip_lines(mut self, skip_lines: usize) -> Self {
        self.config.skip_lines = skip_lines;
        self
    }

    /// Sets the per-file commit bound.
    pub fn batch_size(mut self, batch_size: BatchSize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    /// Skips duplicate-id rows instead of aborting the file.
    pub fn ignore_duplicate_nodes(mut self, ignore: bool) -> Self {
        self.config.ignore_duplicate_nodes = ignore;
        self
    }

    /// Treats empty-string cells as absent.
    pub fn ignore_empty_string(mut self, ignore: bool) -> Self {
        self.config.ignore_empty_string = ignore;
        self
    }

    /// Finishes the builder.
    pub fn build(self) -> LoaderConfig {
        self.config
    }
}

/// Immutable exporter configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportConfig {
    /// Column delimiter.
    pub delimiter: u8,
    /// Delimiter joining array elements and label sets.
    pub array_delimiter: char,
    /// Quoting policy for the run.
    pub quoting: Quoting,
    /// Emit the per-label/type bulk-import file set instead of one CSV.
    pub bulk_import: bool,
    /// Suffix property columns with inferred `:type` tags.
    pub use_types: bool,
    /// Write bulk-import headers to separate `header.*` files.
    pub separate_header: bool,
    /// Progress-flush bound while streaming rows.
    pub batch_size: BatchSize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            delimiter: b',',
            array_delimiter: ';',
            quoting: Quoting::Always,
            bulk_import: false,
            use_types: true,
            separate_header: false,
            batch_size: BatchSize::DEFAULT,
        }
    }
}

impl ExportConfig {
    /// Parses the recognized option keys out of a loosely-typed map.
    pub fn from_map(map: &Map<String, Value>) -> Result<Self> {
        let mut config = ExportConfig::default();
        if let Some(value) = map.get("delimiter") {
            config.delimiter = single_byte(value, "delimiter")?;
        }
        if let Some(value) = map.get("arrayDelimiter") {
            config.array_delimiter = single_char(value, "arrayDelimiter")?;
        }
        if let Some(value) = map.get("quotes") {
            let name = value.as_str().ok_or_else(|| {
                GantryError::Config("quotes must be a string".to_string())
            })?;
            config.quoting = Quoting::from_name(name)?;
        }
        if let Some(value) = map.get("bulkImport") {
            config.bulk_import = boolean(value, "bulkImport")?;
        }
        if let Some(value) = map.get("useTypes") {
            config.use_types = boolean(value, "useTypes")?;
        }
        if let Some(value) = map.get("separateHeader") {
            config.separate_header = boolean(value, "separateHeader")?;
        }
        if let Some(value) = map.get("batchSize") {
            config.batch_size = BatchSize::from_raw(integer(value, "batchSize")?)?;
        }
        Ok(config)
    }
}

fn single_char(value: &Value, key: &str) -> Result<char> {
    let text = value
        .as_str()
        .ok_or_else(|| GantryError::Config(format!("{key} must be a string")))?;
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(GantryError::Config(format!(
            "{key} must have a length of one, got '{text}'"
        ))),
    }
}

fn single_byte(value: &Value, key: &str) -> Result<u8> {
    let c = single_char(value, key)?;
    u8::try_from(c).map_err(|_| {
        GantryError::Config(format!("{key} must be an ASCII character, got '{c}'"))
    })
}

fn boolean(value: &Value, key: &str) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| GantryError::Config(format!("{key} must be a boolean")))
}

fn integer(value: &Value, key: &str) -> Result<i64> {
    value
        .as_i64()
        .ok_or_else(|| GantryError::Config(format!("{key} must be an integer")))
}
