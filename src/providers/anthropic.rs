use crate::conversation::{Message, Role};
use crate::core::error::ChatError;
use crate::providers::base_client::{HttpClient, sse_data};
use crate::providers::{LLMProvider, ResponseStream};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1024;

/// Parser for Anthropic's streaming response
pub fn anthropic_stream_parser(line: &str) -> Result<Option<String>, ChatError> {
    let Some(data) = sse_data(line) else {
        return Ok(None);
    };
    if data.is_empty() {
        return Ok(None);
    }
    let parsed: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(_) => return Ok(None),
    };

    match parsed["type"].as_str() {
        Some("content_block_delta") if parsed["delta"]["type"] == "text_delta" => {
            Ok(parsed["delta"]["text"].as_str().map(str::to_string))
        }
        Some("error") => {
            let message = parsed["error"]["message"]
                .as_str()
                .unwrap_or("unknown stream error");
            Err(ChatError::Api(format!("Anthropic stream error: {}", message)))
        }
        _ => Ok(None),
    }
}

#[derive(Clone)]
pub struct AnthropicProvider {
    client: HttpClient,
    model: String,
}

impl AnthropicProvider {
    pub fn new(base_url: String, api_key: Option<String>, model: String) -> Self {
        let mut extra_headers = HashMap::new();
        extra_headers.insert("anthropic-version".to_string(), API_VERSION.to_string());
        Self {
            client: HttpClient::new(
                base_url,
                Some(("x-api-key".to_string(), api_key.unwrap_or_default())),
                Some(extra_headers),
            ),
            model,
        }
    }

    fn payload<'a>(&'a self, messages: &'a [Message], stream: bool) -> AnthropicRequest<'a> {
        let system = messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.as_str());

        let turns = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| AnthropicMessage {
                role: m.wire_role(),
                content: m.wire_content(),
            })
            .collect();

        AnthropicRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            messages: turns,
            stream,
            system,
        }
    }
}

#[async_trait]
impl LLMProvider for AnthropicProvider {
    fn clone_provider(&self) -> Box<dyn LLMProvider> {
        Box::new(self.clone())
    }

    async fn get_response(&self, messages: &[Message]) -> Result<String, ChatError> {
        let payload = self.payload(messages, false);
        let response = self.client.post("messages", &payload).await?;
        let response_body = response.text().await?;
        let parsed: AnthropicResponse = serde_json::from_str(&response_body)?;

        let text: String = parsed
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect();
        if text.is_empty() {
            Err(ChatError::Api("Empty response from Anthropic".to_string()))
        } else {
            Ok(text)
        }
    }

    async fn get_response_stream(&self, messages: &[Message]) -> Result<ResponseStream, ChatError> {
        let payload = self.payload(messages, true);
        let response = self.client.post("messages", &payload).await?;
        Ok(self.client.stream_response(response, anthropic_stream_parser))
    }

    fn set_model(&mut self, model: &str) {
        self.model = model.to_string();
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<AnthropicMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
}

#[derive(Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: std::borrow::Cow<'a, str>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_text_deltas_only() {
        let delta = r#"data: {"type":"content_block_delta","delta":{"type":"text_delta","text":"Hi"}}"#;
        assert_eq!(anthropic_stream_parser(delta).unwrap(), Some("Hi".to_string()));

        let ping = r#"data: {"type":"ping"}"#;
        assert_eq!(anthropic_stream_parser(ping).unwrap(), None);
        assert_eq!(anthropic_stream_parser("event: message_start").unwrap(), None);
    }

    #[test]
    fn error_events_fail_the_stream() {
        let line = r#"data: {"type":"error","error":{"message":"overloaded"}}"#;
        assert!(anthropic_stream_parser(line).is_err());
    }

    #[test]
    fn system_prompt_is_hoisted() {
        let provider = AnthropicProvider::new(
            "https://api.anthropic.com/v1".to_string(),
            None,
            "claude".to_string(),
        );
        let messages = vec![Message::system("rules"), Message::user("hello")];
        let payload = serde_json::to_value(provider.payload(&messages, false)).unwrap();
        assert_eq!(payload["system"], "rules");
        assert_eq!(payload["messages"].as_array().unwrap().len(), 1);
        assert_eq!(payload["messages"][0]["role"], "user");
    }
}
