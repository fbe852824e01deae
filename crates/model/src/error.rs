//! Model error types

use thiserror::Error;

/// Result type for model operations
pub type Result<T> = std::result::Result<T, ModelError>;

/// Errors raised while validating columns or rendering a record
#[derive(Debug, Error)]
pub enum ModelError {
    /// Two columns share a name
    #[error("duplicate column name \"{0}\"")]
    DuplicateColumn(String),

    /// Column set is empty
    #[error("at least one column is required")]
    NoColumns,

    /// Value at the JSON path does not exist and no default is set
    #[error("path \"{0}\" not found in the body")]
    PathNotFound(String),

    /// JSON path cannot be parsed
    #[error("invalid path \"{path}\": {message}")]
    InvalidPath {
        /// The path as configured
        path: String,
        /// What is wrong with it
        message: String,
    },

    /// Body is not valid JSON
    #[error("cannot parse body as JSON: {0}")]
    InvalidBody(#[from] serde_json::Error),

    /// Record cannot provide its body
    #[error("cannot read body: {0}")]
    Body(String),

    /// Record has no template engine for the language
    #[error("template language \"{0}\" is not supported by the record")]
    TemplateUnsupported(String),

    /// Template evaluation failed
    #[error("cannot render template: {0}")]
    Template(String),
}
