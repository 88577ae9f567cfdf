//! In-memory provider that replays canned replies, for engine tests.

use crate::conversation::Message;
use crate::core::error::ChatError;
use crate::providers::{LLMProvider, ResponseStream};
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub enum Reply {
    Fragments(Vec<String>),
    /// Fails before any fragment is produced
    Unavailable(String),
    /// Yields the fragments, then an error
    BrokenAfter(Vec<String>),
    /// Yields the fragments, then never finishes
    Hang(Vec<String>),
}

impl Reply {
    pub fn text(text: &str) -> Self {
        Reply::Fragments(vec![text.to_string()])
    }

    pub fn chunked(chunks: &[&str]) -> Self {
        Reply::Fragments(chunks.iter().map(|c| c.to_string()).collect())
    }
}

#[derive(Clone, Default)]
pub struct ScriptedProvider {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    /// Whenever the script runs dry, keep answering with this
    fallback: Option<Reply>,
    requests: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into())),
            ..Self::default()
        }
    }

    pub fn repeating(reply: Reply) -> Self {
        Self {
            fallback: Some(reply),
            ..Self::default()
        }
    }

    /// Every message list the provider was called with, in order.
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }

    fn next_reply(&self, messages: &[Message]) -> Reply {
        self.requests.lock().unwrap().push(messages.to_vec());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.fallback.clone())
            .unwrap_or_else(|| Reply::Unavailable("script exhausted".to_string()))
    }
}

fn ok_fragments(fragments: Vec<String>) -> impl futures::Stream<Item = Result<String, ChatError>> {
    stream::iter(fragments.into_iter().map(Ok))
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    fn clone_provider(&self) -> Box<dyn LLMProvider> {
        Box::new(self.clone())
    }

    async fn get_response(&self, messages: &[Message]) -> Result<String, ChatError> {
        match self.next_reply(messages) {
            Reply::Fragments(fragments) => Ok(fragments.concat()),
            Reply::Unavailable(reason) => Err(ChatError::Network(reason)),
            Reply::BrokenAfter(_) => Err(ChatError::Network("connection reset".to_string())),
            Reply::Hang(_) => futures::future::pending().await,
        }
    }

    async fn get_response_stream(&self, messages: &[Message]) -> Result<ResponseStream, ChatError> {
        match self.next_reply(messages) {
            Reply::Fragments(fragments) => Ok(ok_fragments(fragments).boxed()),
            Reply::Unavailable(reason) => Err(ChatError::Network(reason)),
            Reply::BrokenAfter(fragments) => Ok(ok_fragments(fragments)
                .chain(stream::once(async {
                    Err(ChatError::Network("connection reset".to_string()))
                }))
                .boxed()),
            Reply::Hang(fragments) => Ok(ok_fragments(fragments).chain(stream::pending()).boxed()),
        }
    }

    fn set_model(&mut self, _model: &str) {}

    fn model(&self) -> &str {
        "scripted"
    }
}
