use super::extractor::{ToolCallRequest, extract_call};
use super::prompts::router_system_prompt;
use crate::conversation::Conversation;
use crate::core::error::ChatError;
use crate::providers::LLMProvider;
use crate::tools::ToolRegistry;
use regex::Regex;
use std::sync::LazyLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub const ANSWER_DIRECTLY: &str = "ANSWER_DIRECTLY";

static ANSWER_DIRECTLY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bANSWER_DIRECTLY\b").expect("valid router regex"));

#[derive(Debug, Clone, PartialEq)]
pub enum RouteDecision {
    AnswerDirectly,
    InvokeTool(ToolCallRequest),
}

/// Reads the router's reply. Anything short of one clear tool request,
/// including a reply naming both choices, means answering directly.
pub fn parse_decision(reply: &str) -> RouteDecision {
    let direct = ANSWER_DIRECTLY_RE.is_match(reply);
    match extract_call(reply) {
        Ok(Some(call)) if !direct => RouteDecision::InvokeTool(call),
        Ok(Some(_)) => {
            warn!("router named both choices; answering directly");
            RouteDecision::AnswerDirectly
        }
        Ok(None) => {
            if !direct {
                debug!("router reply had no sentinel; answering directly");
            }
            RouteDecision::AnswerDirectly
        }
        Err(e) => {
            warn!("router produced an unusable tool call ({}); answering directly", e);
            RouteDecision::AnswerDirectly
        }
    }
}

/// Builds the router's own conversation, never shared with the user-facing one.
pub fn routing_conversation(registry: &ToolRegistry, user_message: &str) -> Conversation {
    let mut conversation = Conversation::new(router_system_prompt(registry));
    conversation.begin_turn(user_message);
    conversation
}

/// Runs the single classification turn for `user_message`.
pub async fn route(
    provider: &dyn LLMProvider,
    registry: &ToolRegistry,
    user_message: &str,
    cancel: &CancellationToken,
) -> Result<RouteDecision, ChatError> {
    let conversation = routing_conversation(registry, user_message);

    let reply = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(ChatError::Cancelled),
        reply = provider.get_response(conversation.messages()) => reply?,
    };
    debug!(reply = %reply, "router replied");

    Ok(parse_decision(&reply))
}
