use crate::core::error::ChatError;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Marker the model is told to treat as hidden context when it prefixes a
/// tool result fed back into the conversation.
pub const TOOL_ANSWER_MARKER: &str = "CALL_TOOL_ANSWER";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Visible,
    Hidden,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub visibility: Visibility,
}

impl Message {
    fn new(role: Role, content: impl Into<String>, visibility: Visibility) -> Self {
        Self {
            role,
            content: content.into(),
            visibility,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content, Visibility::Hidden)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content, Visibility::Visible)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content, Visibility::Visible)
    }

    /// An assistant turn that requested a tool; kept for the model only.
    pub fn tool_request(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content, Visibility::Hidden)
    }

    pub fn tool_result(tool_name: &str, value: &str) -> Self {
        Self::new(
            Role::Tool,
            format!("tool result for {}: {}", tool_name, value),
            Visibility::Hidden,
        )
    }

    pub fn is_visible(&self) -> bool {
        self.visibility == Visibility::Visible
    }

    /// Role name used on chat-completion wire formats, which have no
    /// marker-free tool role for text-embedded calls.
    pub fn wire_role(&self) -> &'static str {
        match self.role {
            Role::System => "system",
            Role::User | Role::Tool => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn wire_content(&self) -> Cow<'_, str> {
        match self.role {
            Role::Tool => Cow::Owned(format!("{} {}", TOOL_ANSWER_MARKER, self.content)),
            _ => Cow::Borrowed(&self.content),
        }
    }
}

/// Ordered message log of one session, always led by its single system message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<Message>,
    turn: u64,
}

impl Conversation {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(system_prompt)],
            turn: 0,
        }
    }

    /// Re-checks the single leading system message after deserializing.
    pub fn validate(&self) -> Result<(), ChatError> {
        match self.messages.first() {
            Some(first) if first.role == Role::System => {}
            _ => {
                return Err(ChatError::Input(
                    "Conversation must start with a system message".to_string(),
                ));
            }
        }
        if self.messages[1..].iter().any(|m| m.role == Role::System) {
            return Err(ChatError::Input(
                "Conversation contains more than one system message".to_string(),
            ));
        }
        Ok(())
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn visible_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.is_visible())
    }

    /// Starts a new user turn.
    pub fn begin_turn(&mut self, content: impl Into<String>) -> u64 {
        self.turn += 1;
        self.messages.push(Message::user(content));
        self.turn
    }

    /// Appends a non-system message; the log is append-only.
    pub fn push(&mut self, message: Message) -> Result<(), ChatError> {
        if message.role == Role::System {
            return Err(ChatError::Input(
                "Only the leading message may use the system role".to_string(),
            ));
        }
        self.messages.push(message);
        Ok(())
    }

    /// Drops everything except the system message.
    pub fn clear(&mut self) {
        self.messages.truncate(1);
        self.turn = 0;
    }
}

#[cfg(test)]
impl Conversation {
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn turn(&self) -> u64 {
        self.turn
    }

    pub fn system_prompt(&self) -> &str {
        &self.messages[0].content
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }
}
