//! Error types for sqlport.

use thiserror::Error;

/// The main error type for sqlport operations.
#[derive(Debug, Error)]
pub enum SqlportError {
    /// A condition key carries an operator glyph that isn't supported.
    #[error("Invalid operator '{operator}' in condition key '{key}'")]
    InvalidOperator { key: String, operator: String },

    /// A condition key has no usable column or expression.
    #[error("Invalid condition key: '{0}'")]
    InvalidCondition(String),

    /// A value can't be used with the operator it was given.
    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Heterogeneous OR-group without one value per column.
    #[error("OR-group '{key}' has {columns} columns but {values} values")]
    OrGroupArity {
        key: String,
        columns: usize,
        values: usize,
    },

    /// Sort direction other than ASC/DESC.
    #[error("Invalid sort direction '{direction}' for '{column}'. Expected: ASC or DESC")]
    InvalidDirection { column: String, direction: String },

    /// A statement handed to the join compiler lacks a required placeholder.
    #[error("Missing {placeholder} placeholder in statement: {statement}")]
    MissingPlaceholder {
        placeholder: &'static str,
        statement: String,
    },

    /// Several routes connect two tables and none was named.
    #[error("Must specify route between '{table}' and '{related}' (one of: {})", .routes.join(", "))]
    AmbiguousRoute {
        table: String,
        related: String,
        routes: Vec<String>,
    },

    /// A named route doesn't exist between two tables.
    #[error("Unknown route '{route}' between '{table}' and '{related}'")]
    UnknownRoute {
        table: String,
        related: String,
        route: String,
    },

    /// An explicit path names tables with no relationship at all.
    #[error("No relationship between '{table}' and '{related}'")]
    NoRelationship { table: String, related: String },

    /// Relationship metadata is incomplete (e.g. many-to-many without join table).
    #[error("Invalid relationship '{route}' from '{table}': {message}")]
    InvalidRelationship {
        table: String,
        route: String,
        message: String,
    },

    /// No column metadata is known for a table.
    #[error("Unknown table: '{0}'")]
    UnknownTable(String),

    /// Paging options that can't be expressed.
    #[error("Invalid paging: {0}")]
    InvalidPaging(String),

    /// The metadata-refresh query failed.
    #[error("Metadata query failed: {0}")]
    Metadata(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Broad classification of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caused by the caller's input; retrying can't help.
    Programmer,
    /// Caused by the surroundings (database, files, connectivity).
    Environment,
}

impl SqlportError {
    /// Create an invalid-value error for the given condition key.
    pub fn invalid_value(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Metadata(_) | Self::Database(_) | Self::Config(_) | Self::Io(_) => {
                ErrorKind::Environment
            }
            _ => ErrorKind::Programmer,
        }
    }
}

impl From<toml::de::Error> for SqlportError {
    fn from(e: toml::de::Error) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<serde_json::Error> for SqlportError {
    fn from(e: serde_json::Error) -> Self {
        Self::Config(e.to_string())
    }
}

/// Result type alias for sqlport operations.
pub type SqlportResult<T> = Result<T, SqlportError>;
