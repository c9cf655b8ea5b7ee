use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum AugmentError {
    #[error("config file not found: {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse config {path} line {line}: {message}")]
    ConfigParse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("section not found: {0}")]
    MissingSection(String),

    #[error("parameter not found: {section}/{parameter}")]
    MissingParameter { section: String, parameter: String },

    #[error("failed to convert cfg value: {0}")]
    ConfigValue(String),

    #[error("query not found: {0}")]
    QueryNotFound(String),

    #[error("unable to connect to {database} on {primary} or {secondary}: {message}")]
    ConnectionFailed {
        database: String,
        primary: String,
        secondary: String,
        message: String,
    },

    #[error("query {query} failed: {message}")]
    Database { query: String, message: String },

    #[error("invalid structure path: {0}")]
    InvalidStructurePath(String),

    #[error("marker not found: {0}")]
    MarkerNotFound(String),

    #[error("column mismatch in {block}: expected {expected} fields, found {found}")]
    ColumnMismatch {
        block: String,
        expected: usize,
        found: usize,
    },

    #[error("missing column: {0}")]
    MissingColumn(String),

    #[error("invalid number in {field}: {value}")]
    InvalidNumber { field: String, value: String },

    #[error("BMRB request failed: {0}")]
    CatalogHttp(String),

    #[error("BMRB returned status {status}: {message}")]
    CatalogStatus { status: u16, message: String },

    #[error("failed to read analysis input {path}: {message}")]
    AnalysisInput { path: PathBuf, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("plot rendering failed: {0}")]
    Plot(String),
}

impl AugmentError {
    /// Errors that stop a whole batch instead of a single input.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AugmentError::ConfigRead(_)
                | AugmentError::ConfigParse { .. }
                | AugmentError::MissingSection(_)
                | AugmentError::MissingParameter { .. }
                | AugmentError::ConfigValue(_)
                | AugmentError::QueryNotFound(_)
                | AugmentError::ConnectionFailed { .. }
        )
    }
}
