use crate::core::error::ChatError;
use crate::providers::ResponseStream;
use futures::{StreamExt, stream};
use reqwest::{Client, Response};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Turns one complete SSE line into the text it carries, if any.
pub type LineParser = fn(&str) -> Result<Option<String>, ChatError>;

#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    auth_header: Option<(String, String)>,
    extra_headers: HashMap<String, String>,
}

impl HttpClient {
    pub fn new(
        base_url: String,
        auth_header: Option<(String, String)>,
        extra_headers: Option<HashMap<String, String>>,
    ) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_header,
            extra_headers: extra_headers.unwrap_or_default(),
        }
    }

    pub async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
    ) -> Result<Response, ChatError> {
        let url = format!("{}/{}", self.base_url, path);
        debug!(%url, "sending model request");

        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json");

        if let Some((name, value)) = &self.auth_header {
            request = request.header(name, value);
        }
        for (key, value) in &self.extra_headers {
            request = request.header(key, value);
        }

        let response = request.json(payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Api(format!("{} returned {}: {}", url, status, body)));
        }
        Ok(response)
    }

    /// Splits the body into lines, buffering across chunk boundaries, and
    /// yields whatever text `parser` finds in each batch of complete lines.
    /// A last line without a trailing newline is parsed when the body ends.
    pub fn stream_response(&self, response: Response, parser: LineParser) -> ResponseStream {
        let body = response.bytes_stream().boxed();

        stream::unfold(
            Some((body, Vec::<u8>::new())),
            move |state| async move {
                let (mut body, mut buffer) = state?;
                loop {
                    let item = match body.next().await {
                        Some(Ok(chunk)) => {
                            buffer.extend_from_slice(&chunk);
                            drain_lines(&mut buffer, parser)
                        }
                        Some(Err(e)) => Err(ChatError::from(e)),
                        None => {
                            return drain_tail(&mut buffer, parser)
                                .transpose()
                                .map(|item| (item, None));
                        }
                    };
                    match item {
                        Ok(None) => continue,
                        Ok(Some(text)) => return Some((Ok(text), Some((body, buffer)))),
                        Err(e) => return Some((Err(e), None)),
                    }
                }
            },
        )
        .boxed()
    }
}

fn drain_lines(buffer: &mut Vec<u8>, parser: LineParser) -> Result<Option<String>, ChatError> {
    let mut text = String::new();
    while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
        let line: Vec<u8> = buffer.drain(..=pos).collect();
        let line = String::from_utf8_lossy(&line);
        if let Some(fragment) = parser(line.trim_end())? {
            text.push_str(&fragment);
        }
    }
    Ok(if text.is_empty() { None } else { Some(text) })
}

/// Parses the unterminated remainder left in `buffer` at end of body.
fn drain_tail(buffer: &mut Vec<u8>, parser: LineParser) -> Result<Option<String>, ChatError> {
    if buffer.iter().all(u8::is_ascii_whitespace) {
        buffer.clear();
        return Ok(None);
    }
    buffer.push(b'\n');
    drain_lines(buffer, parser)
}

/// Payload of an SSE `data:` line, or `None` for other lines.
pub fn sse_data(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim)
}
