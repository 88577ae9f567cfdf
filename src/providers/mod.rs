use crate::conversation::Message;
use crate::core::error::ChatError;
use async_trait::async_trait;
use futures::stream::BoxStream;

pub mod anthropic;
pub mod base_client;
pub mod factory;
pub mod openai_compatible;
#[cfg(test)]
pub mod scripted;

/// Lazy, finite, non-restartable sequence of text fragments.
pub type ResponseStream = BoxStream<'static, Result<String, ChatError>>;

#[async_trait]
pub trait LLMProvider: Send + Sync {
    fn clone_provider(&self) -> Box<dyn LLMProvider>;

    async fn get_response(&self, messages: &[Message]) -> Result<String, ChatError>;

    async fn get_response_stream(&self, messages: &[Message]) -> Result<ResponseStream, ChatError>;

    fn set_model(&mut self, model: &str);

    fn model(&self) -> &str;
}
