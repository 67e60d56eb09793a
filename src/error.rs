//! Error types for configuration, per-job evaluation and the data store

use thiserror::Error;

/// Fatal configuration problems, raised before any work starts
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required setting '{0}' is missing")]
    MissingSetting(&'static str),

    #[error("malformed settings: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("invalid time '{value}' in {context}")]
    InvalidTime { value: String, context: &'static str },

    #[error("time shift step must be positive, got {0}")]
    NonPositiveStep(i64),

    #[error("criterion '{0}' expands to no values")]
    EmptyExpansion(String),

    #[error("criterion references unknown attribute '{0}'")]
    UnknownAttribute(String),
}

/// Faults while evaluating a single job; the job is dropped
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("unknown attribute '{0}'")]
    UnknownAttribute(String),

    #[error("attribute '{attribute}' is {actual}, constraint expects {expected}")]
    TypeMismatch {
        attribute: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("unparsable trade time '{0}'")]
    UnparsableTime(String),
}

/// Data store failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("configuration {0} not found")]
    ConfigurationNotFound(i64),

    #[error("could not decode settings of configuration {id}: {source}")]
    SettingsDecode {
        id: i64,
        #[source]
        source: serde_json::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("row {row}: {message}")]
    InvalidRow { row: usize, message: String },
}
