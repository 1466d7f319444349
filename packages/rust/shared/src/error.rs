//! Error types for LinkHunter.
//!
//! Library crates use [`LinkHunterError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all LinkHunter operations.
#[derive(Debug, thiserror::Error)]
pub enum LinkHunterError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while talking to a remote site.
    #[error("network error: {0}")]
    Network(String),

    /// HTML or JSON parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// An external data provider (metrics, search, contacts) failed.
    #[error("provider error: {0}")]
    Provider(String),

    /// The language model call failed or returned an unusable response.
    #[error("model error: {0}")]
    Model(String),

    /// Request validation error (bad ids, empty message lists, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A referenced record does not exist for the calling organisation.
    #[error("{0} not found")]
    NotFound(String),

    /// The model asked for a tool the dispatcher does not know.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// A tool input payload did not match the tool's schema.
    #[error("invalid input for {tool}: {message}")]
    ToolInput { tool: String, message: String },

    /// The run was cancelled by the caller.
    #[error("operation cancelled")]
    Cancelled,

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LinkHunterError>;

impl LinkHunterError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a tool-input error for the named tool.
    pub fn tool_input(tool: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::ToolInput {
            tool: tool.into(),
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = LinkHunterError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = LinkHunterError::NotFound("project".into());
        assert_eq!(err.to_string(), "project not found");

        let err = LinkHunterError::tool_input("run_discovery", "missing field `project_id`");
        assert!(err.to_string().contains("run_discovery"));
        assert!(err.to_string().contains("project_id"));
    }

    #[test]
    fn unknown_tool_names_the_tool() {
        let err = LinkHunterError::UnknownTool("send_email".into());
        assert_eq!(err.to_string(), "unknown tool: send_email");
    }
}
