pub mod builtin;
pub mod registry;

use crate::core::error::ToolError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub use registry::ToolRegistry;

/// Error type handlers return; anything they raise becomes an execution error.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, args: &ToolArguments) -> Result<String, HandlerError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
}

impl ParamType {
    /// Short type name shown to the model in tool signatures.
    pub fn label(&self) -> &'static str {
        match self {
            ParamType::String => "str",
            ParamType::Number => "float",
            ParamType::Integer => "int",
            ParamType::Boolean => "bool",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub kind: ParamType,
    pub description: String,
    pub required: bool,
}

/// A registered tool: unique `Namespace.Function` name, argument schema and handler.
#[derive(Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Vec<Parameter>,
    pub handler: Arc<dyn ToolHandler>,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        handler: impl ToolHandler + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
            handler: Arc::new(handler),
        }
    }

    pub fn param(mut self, name: &str, kind: ParamType, description: &str) -> Self {
        self.parameters.push(Parameter {
            name: name.to_string(),
            kind,
            description: description.to_string(),
            required: true,
        });
        self
    }

    pub fn optional_param(mut self, name: &str, kind: ParamType, description: &str) -> Self {
        self.parameters.push(Parameter {
            name: name.to_string(),
            kind,
            description: description.to_string(),
            required: false,
        });
        self
    }

    /// Renders `Namespace.fn(a: float, b: float) - description`.
    pub fn signature(&self) -> String {
        let params = self
            .parameters
            .iter()
            .map(|p| {
                let optional = if p.required { "" } else { "?" };
                format!("{}{}: {}", p.name, optional, p.kind.label())
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({}) - {}", self.name, params, self.description)
    }

    /// The signature followed by one indented line per documented parameter.
    pub fn describe(&self) -> String {
        let mut text = self.signature();
        for p in self.parameters.iter().filter(|p| !p.description.is_empty()) {
            text.push_str(&format!("\n    - {}: {}", p.name, p.description));
        }
        text
    }

    /// Matches raw JSON arguments against the declared parameters.
    pub fn bind(&self, raw: &Map<String, Value>) -> Result<ToolArguments, ToolError> {
        let mut bound = HashMap::new();

        for param in &self.parameters {
            match raw.get(&param.name) {
                None | Some(Value::Null) => {
                    if param.required {
                        return Err(self.argument_error(format!(
                            "missing required parameter '{}'",
                            param.name
                        )));
                    }
                }
                Some(value) => {
                    let arg = coerce(param.kind, value).map_err(|reason| {
                        self.argument_error(format!("parameter '{}' {}", param.name, reason))
                    })?;
                    bound.insert(param.name.clone(), arg);
                }
            }
        }

        for key in raw.keys() {
            if !self.parameters.iter().any(|p| &p.name == key) {
                tracing::debug!(tool = %self.name, argument = %key, "ignoring undeclared argument");
            }
        }

        Ok(ToolArguments(bound))
    }

    fn argument_error(&self, reason: String) -> ToolError {
        ToolError::Argument {
            tool: self.name.clone(),
            reason,
        }
    }
}

impl fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .finish()
    }
}

fn coerce(kind: ParamType, value: &Value) -> Result<ArgValue, String> {
    match (kind, value) {
        (ParamType::String, Value::String(s)) => Ok(ArgValue::Str(s.clone())),
        (ParamType::String, Value::Number(n)) => Ok(ArgValue::Str(n.to_string())),
        (ParamType::String, Value::Bool(b)) => Ok(ArgValue::Str(b.to_string())),

        (ParamType::Number, Value::Number(n)) => n
            .as_f64()
            .map(ArgValue::Number)
            .ok_or_else(|| format!("expected a number, got {}", n)),
        (ParamType::Number, Value::String(s)) => match s.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => Ok(ArgValue::Number(n)),
            _ => Err(format!("expected a number, got \"{}\"", s)),
        },

        (ParamType::Integer, Value::Number(n)) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Ok(ArgValue::Integer(i)),
            (None, Some(f)) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                Ok(ArgValue::Integer(f as i64))
            }
            _ => Err(format!("expected an integer, got {}", n)),
        },
        (ParamType::Integer, Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(ArgValue::Integer)
            .map_err(|_| format!("expected an integer, got \"{}\"", s)),

        (ParamType::Boolean, Value::Bool(b)) => Ok(ArgValue::Bool(*b)),
        (ParamType::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(ArgValue::Bool(true)),
            "false" => Ok(ArgValue::Bool(false)),
            _ => Err(format!("expected a boolean, got \"{}\"", s)),
        },

        (kind, other) => Err(format!(
            "expected {}, got {}",
            kind.label(),
            json_type_name(other)
        )),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Str(String),
    Number(f64),
    Integer(i64),
    Bool(bool),
}

/// Arguments already checked against a tool's schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArguments(HashMap<String, ArgValue>);

impl ToolArguments {
    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.0.get(name)
    }

    pub fn str(&self, name: &str) -> Result<&str, HandlerError> {
        match self.get(name) {
            Some(ArgValue::Str(s)) => Ok(s),
            _ => Err(format!("string argument '{}' not bound", name).into()),
        }
    }

    pub fn number(&self, name: &str) -> Result<f64, HandlerError> {
        match self.get(name) {
            Some(ArgValue::Number(n)) => Ok(*n),
            Some(ArgValue::Integer(i)) => Ok(*i as f64),
            _ => Err(format!("numeric argument '{}' not bound", name).into()),
        }
    }

    /// An optional boolean; absent means `false`.
    pub fn flag(&self, name: &str) -> bool {
        matches!(self.get(name), Some(ArgValue::Bool(true)))
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Outcome category of one dispatch, folded into the conversation right away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolStatus {
    Ok,
    NotFound,
    ExecutionError,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallResult {
    pub tool_name: String,
    pub value: String,
    pub status: ToolStatus,
}

impl ToolCallResult {
    pub fn from_outcome(tool_name: &str, outcome: &Result<String, ToolError>) -> Self {
        let (value, status) = match outcome {
            Ok(value) => (value.clone(), ToolStatus::Ok),
            Err(ToolError::NotFound(_)) => (
                format!("tool not found: {}", tool_name),
                ToolStatus::NotFound,
            ),
            Err(err) => (err.to_string(), ToolStatus::ExecutionError),
        };
        Self {
            tool_name: tool_name.to_string(),
            value,
            status,
        }
    }
}
