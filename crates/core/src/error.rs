//! Error types for the CampusPilot domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum.

use thiserror::Error;

/// The top-level error type for all CampusPilot operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Token source errors ---
    #[error("Token source error: {0}")]
    TokenSource(#[from] TokenSourceError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures of the model's token stream. None of these are recoverable
/// within a turn.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenSourceError {
    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Model unavailable: {0}")]
    Unavailable(String),

    #[error("Timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Stream closed before completion")]
    Closed,
}

/// Failures around a single tool call. All of these are recovered by the
/// dispatcher and fed back to the model as conversation text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    #[error("malformed tool call: {0}")]
    MalformedToolCall(String),

    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error("{tool_name} failed: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },
}

impl ToolError {
    /// Shorthand for a handler-side failure.
    pub fn failed(tool_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            tool_name: tool_name.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_source_error_displays_correctly() {
        let err = Error::TokenSource(TokenSourceError::Timeout { secs: 30 });
        assert!(err.to_string().contains("30s"));
    }

    #[test]
    fn tool_error_displays_correctly() {
        let err = Error::Tool(ToolError::UnknownTool("bogus".into()));
        assert_eq!(err.to_string(), "Tool error: unknown tool 'bogus'");

        let err = ToolError::failed("school_search", "index offline");
        assert!(err.to_string().contains("school_search"));
        assert!(err.to_string().contains("index offline"));
    }
}
