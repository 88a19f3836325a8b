//! Error taxonomy for the test engine.
//!
//! Parse-time errors abort processing of the one file they belong to;
//! everything that escapes to the orchestrator boundary is folded into a
//! failing [`crate::TestResult`] rather than propagated, so a batch run
//! always yields exactly one result per file.

use std::path::PathBuf;

use thiserror::Error;

use crate::expr::ExprError;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Environment variable '${{{name}}}' is not set and no default provided")]
    MissingVariable { name: String },

    #[error("No frontmatter block found in {path}")]
    MissingFrontmatter { path: PathBuf },

    #[error("Malformed metadata in {path}: {detail}")]
    MalformedMetadata { path: PathBuf, detail: String },

    #[error("Connection '{name}' not found in shared connections. Available: {available:?}")]
    UnknownConnection { name: String, available: Vec<String> },

    #[error("Connection failed: {message}")]
    Connection { message: String },

    #[error("Step '{step}' has no results to reference")]
    UnresolvedStepReference { step: String },

    #[error("Column '{column}' not found in first row of step '{step}'")]
    UnknownColumn { step: String, column: String },

    #[error("Expression error: {0}")]
    Expression(#[from] ExprError),

    #[error("Query failed: {message}")]
    StepExecution { message: String },

    /// Catch-all for faults the taxonomy does not anticipate. The
    /// orchestrator converts these into failing results like any other.
    #[error("{0}")]
    Message(String),
}

impl EngineError {
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}
