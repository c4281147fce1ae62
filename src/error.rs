//! Error taxonomy shared by the catalog store, coordinate parsing and the
//! crossmatch pipeline.
//!
//! The matcher, assignment and deduplication routines themselves never fail;
//! errors only arise at the edges where text is parsed or files are touched.

use thiserror::Error;

/// Result type for skyjoin operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error.
#[derive(Error, Debug)]
pub enum Error {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// A single field could not be turned into the value it should hold.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("missing value")]
    Missing,

    #[error("not a number: {0:?}")]
    NotANumber(String),

    #[error("not an integer: {0:?}")]
    NotAnInteger(String),

    #[error("non-finite coordinate: {0}")]
    NonFinite(f64),

    #[error("{axis} out of range: {value}")]
    OutOfRange { axis: &'static str, value: f64 },

    #[error("malformed sexagesimal {input:?}: {reason}")]
    Sexagesimal { input: String, reason: &'static str },
}

/// The shape of a table does not satisfy an operation's precondition.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("{table} is missing required columns: {}", missing.join(", "))]
    MissingColumns { table: String, missing: Vec<String> },

    #[error("row count mismatch: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },

    #[error("row {row} has {found} fields, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
}
