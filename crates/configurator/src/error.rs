//! Configuration error types.

use thiserror::Error;

/// Errors raised while declaring or initializing a grid configuration.
///
/// These are programmer faults: they surface immediately and abort
/// initialization. Filter input that fails validation is not an error; it is
/// recorded on the filter model instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("column must contain 'name' or 'attribute' option")]
    MissingColumnName,

    #[error("duplicate column name: {0}")]
    DuplicateColumn(String),

    #[error("invalid query attribute #{index}: {reason}")]
    InvalidQueryAttribute { index: usize, reason: String },

    #[error("invalid rule target: expected a string or an array of strings, got {0}")]
    InvalidRuleTarget(String),

    #[error("invalid rule declaration: {0}")]
    InvalidRule(String),

    #[error("unknown validator '{0}'")]
    UnknownValidator(String),

    #[error("invalid option '{option}' for validator '{validator}': {reason}")]
    InvalidRuleOption {
        validator: String,
        option: String,
        reason: String,
    },

    #[error("invalid grid definition: {0}")]
    InvalidDefinition(String),
}

/// Result type alias using ConfigError.
pub type ConfigResult<T> = Result<T, ConfigError>;
