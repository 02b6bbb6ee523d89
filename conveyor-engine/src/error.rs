//! Error types for engine operations

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur while driving the provisioning engine or git
#[derive(Debug, Error)]
pub enum EngineError {
    /// The command could not be started at all
    #[error("Failed to execute '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The command ran and exited non-zero
    #[error("'{command}' exited with code {exit_code}: {stderr}")]
    CommandFailed {
        /// Rendered command line
        command: String,
        exit_code: i32,
        stderr: String,
    },

    /// The command succeeded but its output could not be understood
    #[error("Failed to parse output of '{command}': {message}")]
    ParseError { command: String, message: String },

    /// The stack source does not support the requested operation
    #[error("Stack '{stack}' cannot be {operation}: {reason}")]
    Unsupported {
        stack: String,
        operation: &'static str,
        reason: String,
    },
}

impl EngineError {
    /// Exit code of a failed command, if it ran
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::CommandFailed { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }

    /// Whether the engine reported that the stack does not exist
    pub fn is_missing_stack(&self) -> bool {
        matches!(self, Self::CommandFailed { stderr, .. } if stderr.contains("does not exist"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_missing_stack() {
        let err = EngineError::CommandFailed {
            command: "aws cloudformation describe-stacks".to_string(),
            exit_code: 254,
            stderr: "ValidationError: Stack with id PipelineStack does not exist".to_string(),
        };
        assert!(err.is_missing_stack());
        assert_eq!(err.exit_code(), Some(254));

        let err = EngineError::CommandFailed {
            command: "aws cloudformation describe-stacks".to_string(),
            exit_code: 255,
            stderr: "Unable to locate credentials".to_string(),
        };
        assert!(!err.is_missing_stack());
    }
}
