use crate::conversation::Message;
use crate::core::error::ChatError;
use crate::providers::base_client::{HttpClient, sse_data};
use crate::providers::{LLMProvider, ResponseStream};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Parser for OpenAI-style `chat.completion.chunk` events
pub fn openai_stream_parser(line: &str) -> Result<Option<String>, ChatError> {
    let Some(data) = sse_data(line) else {
        return Ok(None);
    };
    if data.is_empty() || data == "[DONE]" {
        return Ok(None);
    }

    let parsed: serde_json::Value = serde_json::from_str(data)
        .map_err(|e| ChatError::Serialization(format!("Failed to parse stream data: {}", e)))?;

    if let Some(error) = parsed.get("error") {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown stream error");
        return Err(ChatError::Api(message.to_string()));
    }

    Ok(parsed
        .pointer("/choices/0/delta/content")
        .and_then(|c| c.as_str())
        .filter(|c| !c.is_empty())
        .map(str::to_string))
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatCompletionMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Serialize)]
struct ChatCompletionMessage<'a> {
    role: &'a str,
    content: std::borrow::Cow<'a, str>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    content: Option<String>,
}

/// Any `/chat/completions` endpoint: OpenAI, OpenRouter, or a local vLLM server.
#[derive(Clone)]
pub struct OpenAICompatibleProvider {
    client: HttpClient,
    model: String,
    temperature: Option<f32>,
}

impl OpenAICompatibleProvider {
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        model: String,
        extra_headers: Option<HashMap<String, String>>,
    ) -> Self {
        let auth_header = api_key
            .filter(|key| !key.is_empty())
            .map(|key| ("Authorization".to_string(), format!("Bearer {}", key)));

        Self {
            client: HttpClient::new(base_url, auth_header, extra_headers),
            model,
            temperature: Some(0.2),
        }
    }

    fn payload<'a>(&'a self, messages: &'a [Message], stream: bool) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| ChatCompletionMessage {
                    role: m.wire_role(),
                    content: m.wire_content(),
                })
                .collect(),
            temperature: self.temperature,
            stream,
        }
    }
}

#[async_trait]
impl LLMProvider for OpenAICompatibleProvider {
    fn clone_provider(&self) -> Box<dyn LLMProvider> {
        Box::new(self.clone())
    }

    async fn get_response(&self, messages: &[Message]) -> Result<String, ChatError> {
        let payload = self.payload(messages, false);
        let response = self.client.post("chat/completions", &payload).await?;

        let response_body: String = response.text().await?;
        let parsed: ChatCompletionResponse = serde_json::from_str(&response_body)?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| ChatError::Api("No choices in API response".to_string()))
    }

    async fn get_response_stream(&self, messages: &[Message]) -> Result<ResponseStream, ChatError> {
        let payload = self.payload(messages, true);
        let response = self.client.post("chat/completions", &payload).await?;
        Ok(self.client.stream_response(response, openai_stream_parser))
    }

    fn set_model(&mut self, model: &str) {
        self.model = model.to_string();
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_delta_content() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hel"}}]}"#;
        assert_eq!(openai_stream_parser(line).unwrap(), Some("Hel".to_string()));
    }

    #[test]
    fn ignores_done_role_and_blank_lines() {
        assert_eq!(openai_stream_parser("data: [DONE]").unwrap(), None);
        assert_eq!(openai_stream_parser("").unwrap(), None);
        assert_eq!(openai_stream_parser(": keep-alive").unwrap(), None);
        let role_only = r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert_eq!(openai_stream_parser(role_only).unwrap(), None);
    }

    #[test]
    fn surfaces_stream_errors() {
        let line = r#"data: {"error":{"message":"model overloaded"}}"#;
        assert!(matches!(openai_stream_parser(line), Err(ChatError::Api(m)) if m == "model overloaded"));
        assert!(matches!(
            openai_stream_parser("data: {not json"),
            Err(ChatError::Serialization(_))
        ));
    }

    #[test]
    fn tool_results_go_out_as_marked_user_turns() {
        let provider = OpenAICompatibleProvider::new(
            "http://localhost:8000/v1".to_string(),
            None,
            "apertus".to_string(),
            None,
        );
        let messages = vec![
            Message::system("sys"),
            Message::user("2+3?"),
            Message::tool_request(r#"CALL_TOOL {"name":"Math.sum_numbers"}"#),
            Message::tool_result("Math.sum_numbers", "5"),
        ];
        let payload = serde_json::to_value(provider.payload(&messages, true)).unwrap();
        assert_eq!(payload["model"], "apertus");
        assert_eq!(payload["stream"], true);
        assert_eq!(payload["messages"][2]["role"], "assistant");
        assert_eq!(payload["messages"][3]["role"], "user");
        assert_eq!(
            payload["messages"][3]["content"],
            "CALL_TOOL_ANSWER tool result for Math.sum_numbers: 5"
        );
    }
}
