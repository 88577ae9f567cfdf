use super::{ToolCallResult, ToolDescriptor};
use crate::core::error::{ChatError, ToolError};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use std::time::Duration;
use tokio::time;
use tracing::{debug, warn};

static TOOL_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*\.[A-Za-z_][A-Za-z0-9_]*$").expect("valid tool name regex")
});

/// Collects tool descriptors at startup; the only place tools can be added.
#[derive(Default)]
pub struct ToolRegistryBuilder {
    tools: BTreeMap<String, ToolDescriptor>,
}

impl ToolRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, descriptor: ToolDescriptor) -> Result<Self, ChatError> {
        if !TOOL_NAME.is_match(&descriptor.name) {
            return Err(ChatError::Config(format!(
                "Tool name '{}' must have the form Namespace.Function",
                descriptor.name
            )));
        }
        if self.tools.contains_key(&descriptor.name) {
            return Err(ChatError::Config(format!(
                "Tool '{}' is already registered",
                descriptor.name
            )));
        }
        debug!(tool = %descriptor.name, "registered tool");
        self.tools.insert(descriptor.name.clone(), descriptor);
        Ok(self)
    }

    pub fn build(self) -> ToolRegistry {
        ToolRegistry { tools: self.tools }
    }
}

/// Immutable name → tool table, shared read-only between sessions.
pub struct ToolRegistry {
    tools: BTreeMap<String, ToolDescriptor>,
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::new()
    }

    /// Exact, case-sensitive lookup.
    pub fn resolve(&self, name: &str) -> Result<&ToolDescriptor, ToolError> {
        self.tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))
    }

    pub fn tools(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.values()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Binds the arguments and runs the handler, bounded by `deadline`.
    ///
    /// The handler runs on its own task so a panic is reported as an
    /// execution error instead of unwinding through the caller.
    pub async fn invoke(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
        deadline: Duration,
    ) -> Result<String, ToolError> {
        let descriptor = self.resolve(name)?;
        let args = descriptor.bind(arguments)?;
        let handler = descriptor.handler.clone();

        let mut task = tokio::spawn(async move { handler.call(&args).await });

        match time::timeout(deadline, &mut task).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(e))) => Err(ToolError::Execution {
                tool: name.to_string(),
                reason: e.to_string(),
            }),
            Ok(Err(join_err)) => {
                warn!(tool = %name, "tool handler aborted: {}", join_err);
                Err(ToolError::Execution {
                    tool: name.to_string(),
                    reason: "handler panicked".to_string(),
                })
            }
            Err(_) => {
                task.abort();
                warn!(tool = %name, timeout_ms = deadline.as_millis() as u64, "tool timed out");
                Err(ToolError::Execution {
                    tool: name.to_string(),
                    reason: format!("timed out after {}s", deadline.as_secs_f64()),
                })
            }
        }
    }

    pub async fn dispatch(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
        deadline: Duration,
    ) -> (ToolCallResult, Result<String, ToolError>) {
        let outcome = self.invoke(name, arguments, deadline).await;
        (ToolCallResult::from_outcome(name, &outcome), outcome)
    }
}
