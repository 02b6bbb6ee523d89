//! Error types for bootstrap and teardown

use conveyor_engine::EngineError;
use thiserror::Error;

use crate::state::BootstrapState;

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, BootstrapError>;

/// Configuration problems found before any engine call
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// One or more account identifiers are unset
    #[error("missing required account identifier(s): {}", .0.join(", "))]
    MissingAccounts(Vec<&'static str>),

    /// A required setting is empty
    #[error("{0} cannot be empty")]
    EmptyField(&'static str),
}

/// Errors that abort a bootstrap run
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration was rejected; nothing was deployed
    #[error("precondition failed: {0}")]
    Precondition(#[from] ConfigError),

    /// The engine failed to create or update a stack
    #[error("deployment of stack '{stack}' failed: {source}")]
    Deployment {
        stack: String,
        #[source]
        source: EngineError,
    },

    /// The channel stack deployed but did not publish the key ARN
    #[error(
        "stack '{stack}' did not publish a KeyArn output; roles cannot be granted artifact access"
    )]
    MissingKeyArn { stack: String },

    /// Reading or writing the deploy capture file failed
    #[error("capture file {path}: {source}")]
    Capture {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A role stack template could not be rendered to disk
    #[error("role template {path}: {source}")]
    Template {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Publishing the source failed
    #[error("source push failed: {0}")]
    SourcePush(#[source] EngineError),

    /// A deployment task panicked or was aborted
    #[error("task for '{label}' did not complete: {message}")]
    TaskFailed { label: String, message: String },

    /// `step` was called in a state with no outgoing transition
    #[error("no transition out of state {0}")]
    InvalidTransition(BootstrapState),
}

impl BootstrapError {
    /// Whether the failure happened before anything was deployed
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::Precondition(_))
    }
}
