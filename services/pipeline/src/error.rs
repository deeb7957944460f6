//! Error types for the record pipeline.

use std::path::PathBuf;
use thiserror::Error;

use crate::route::IdentifierError;

/// Fatal conditions. Anything in here stops the run before a single row is loaded.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Source file could not be read.
    #[error("failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Input has no header line.
    #[error("input is empty: no header line found")]
    EmptyInput,

    /// Column count rejected under the strict policy.
    #[error("expected {expected} columns, found {found}")]
    ColumnCount { found: usize, expected: usize },

    /// Underlying delimited-text reader failure.
    #[error("failed to parse delimited input near line {line}: {source}")]
    Csv {
        line: u64,
        #[source]
        source: csv::Error,
    },

    /// A statically configured destination is not a safe identifier.
    #[error("invalid table name '{name}': {reason}")]
    InvalidTableName {
        name: String,
        #[source]
        reason: IdentifierError,
    },
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
