//! Error types for the financial agent team

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Error, Debug)]
pub enum AgentError {

    // =============================
    // Startup Errors
    // =============================

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Invalid team: {0}")]
    InvalidTeam(String),

    // =============================
    // Run Errors
    // =============================

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Duplicate tool: {0}")]
    DuplicateTool(String),

    #[error("Invalid tool input: {0}")]
    InvalidToolInput(String),

    #[error("Max tool rounds exceeded: {0}")]
    MaxToolRoundsExceeded(String),

    #[error("Output error: {0}")]
    OutputError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl AgentError {
    /// Errors the model can recover from when they are reported back as a
    /// tool result instead of aborting the run.
    pub fn is_recoverable_tool_error(&self) -> bool {
        matches!(
            self,
            AgentError::InvalidToolInput(_) | AgentError::ToolNotFound(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_tool_errors() {
        assert!(AgentError::InvalidToolInput("symbol".into()).is_recoverable_tool_error());
        assert!(AgentError::ToolNotFound("x".into()).is_recoverable_tool_error());
        assert!(!AgentError::ProviderError("down".into()).is_recoverable_tool_error());
        assert!(!AgentError::LlmError("429".into()).is_recoverable_tool_error());
    }
}
