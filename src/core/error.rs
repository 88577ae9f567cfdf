use std::io;
use thiserror::Error;

/// Failures raised while extracting or dispatching a tool call.
///
/// Each of these is converted into a visible, terminal message for the
/// current turn by the orchestrator; none of them end the session.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    /// The sentinel was present but the payload after it was not a valid call
    #[error("Malformed tool call: {0}")]
    Parse(String),

    /// No tool with this exact name is registered
    #[error("Tool not found: {0}")]
    NotFound(String),

    /// Arguments did not match the tool's declared parameters
    #[error("Invalid arguments for {tool}: {reason}")]
    Argument { tool: String, reason: String },

    /// The handler failed, panicked or ran past its deadline
    #[error("Tool {tool} failed: {reason}")]
    Execution { tool: String, reason: String },
}

/// Unified error type for the application
#[derive(Error, Debug)]
pub enum ChatError {
    /// API-related errors (non-success status, malformed payloads)
    #[error("API error: {0}")]
    Api(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// User input errors
    #[error("Input error: {0}")]
    Input(String),

    /// IO-related errors
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Network-related errors
    #[error("Network error: {0}")]
    Network(String),

    /// The turn was cancelled before it could finish
    #[error("Cancelled")]
    Cancelled,

    /// Tool extraction or dispatch errors
    #[error(transparent)]
    Tool(#[from] ToolError),
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ChatError::Network(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            ChatError::Network(format!("Connection failed: {}", err))
        } else if err.is_status() {
            ChatError::Api(format!("API returned error status: {}", err))
        } else {
            ChatError::Network(format!("Request failed: {}", err))
        }
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        ChatError::Serialization(format!("JSON error: {}", err))
    }
}

impl From<serde_yml::Error> for ChatError {
    fn from(err: serde_yml::Error) -> Self {
        ChatError::Serialization(format!("YAML error: {}", err))
    }
}
