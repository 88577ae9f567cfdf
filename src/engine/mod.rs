pub mod extractor;
pub mod orchestrator;
pub mod prompts;
pub mod router;
pub mod stream;

use crate::config::OrchestrationConfig;
use crate::core::error::ToolError;
use crate::tools::ToolStatus;
use serde_json::{Map, Value};
use std::time::Duration;
use tokio::sync::mpsc;

pub use orchestrator::Orchestrator;

/// What the engine tells the UI while a turn runs.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Displayable part of the response being streamed
    Token(String),
    /// A tool is about to run on the assistant's behalf
    ToolInvoked {
        name: String,
        arguments: Map<String, Value>,
    },
    ToolCompleted {
        name: String,
        status: ToolStatus,
    },
    /// The model call failed and is being retried
    Retrying { reason: String },
    /// Final visible answer of the turn
    Final(String),
    /// Visible failure text that ended the turn
    Error(String),
}

pub type EventSender = mpsc::UnboundedSender<EngineEvent>;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// Maximum completed tool dispatches in one user turn
    pub max_iterations: usize,
    pub tool_timeout: Duration,
    /// Bound on each model attempt; an elapsed attempt counts as a failure
    pub model_timeout: Duration,
    pub retry_backoff: Duration,
    pub use_router: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&OrchestrationConfig::default())
    }
}

impl From<&OrchestrationConfig> for EngineSettings {
    fn from(config: &OrchestrationConfig) -> Self {
        Self {
            max_iterations: config.max_iterations,
            tool_timeout: Duration::from_secs(config.tool_timeout_secs),
            model_timeout: Duration::from_secs(config.model_timeout_secs),
            retry_backoff: Duration::from_millis(config.model_retry_backoff_ms),
            use_router: config.router,
        }
    }
}

/// Why a turn stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum Termination {
    /// The model answered without requesting a tool
    Answered,
    /// Extraction or dispatch failed; the turn ends with an error message
    ToolFailure(ToolError),
    /// The model kept requesting tools past the iteration bound
    IterationLimit,
    /// The model could not be reached, even after a retry
    ModelUnavailable(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    /// Visible text the turn ended with
    pub text: String,
    pub termination: Termination,
    /// Tool dispatches completed during the turn
    pub dispatches: usize,
}

#[cfg(test)]
impl TurnOutcome {
    pub fn is_answer(&self) -> bool {
        self.termination == Termination::Answered
    }
}
