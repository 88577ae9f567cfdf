use super::extractor::{SENTINEL, find_sentinel};
use crate::core::error::ChatError;
use crate::providers::ResponseStream;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

/// Decides which part of a response that is still streaming may be shown.
///
/// Everything up to a tool-call sentinel is forwarded; a trailing fragment
/// that might be the beginning of the sentinel is held back until the next
/// chunk settles it.
#[derive(Debug, Default)]
pub struct TokenRelay {
    forwarded: usize,
    halted: bool,
}

impl TokenRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the newly displayable slice of `full`.
    pub fn advance<'a>(&mut self, full: &'a str) -> Option<&'a str> {
        if self.halted {
            return None;
        }
        let limit = match find_sentinel(full) {
            Some(pos) => {
                self.halted = true;
                pos
            }
            None => full.len() - partial_sentinel_suffix(full),
        };
        self.take(full, limit)
    }

    /// Flushes whatever is left once the response is known to hold no call.
    pub fn finish<'a>(&mut self, full: &'a str) -> Option<&'a str> {
        self.halted = true;
        self.take(full, full.len())
    }

    fn take<'a>(&mut self, full: &'a str, limit: usize) -> Option<&'a str> {
        if limit <= self.forwarded {
            return None;
        }
        let slice = &full[self.forwarded..limit];
        self.forwarded = limit;
        Some(slice)
    }
}

// Sentinel is ASCII, so a matching suffix always starts on a char boundary.
fn partial_sentinel_suffix(text: &str) -> usize {
    (1..SENTINEL.len())
        .rev()
        .find(|&n| text.ends_with(&SENTINEL[..n]))
        .unwrap_or(0)
}

/// Drains `stream` into one response, handing each fragment to `on_fragment`
/// as it arrives. Cancellation wins over a pending fragment.
pub async fn collect_stream(
    mut stream: ResponseStream,
    cancel: &CancellationToken,
    mut on_fragment: impl FnMut(&str, &str),
) -> Result<String, ChatError> {
    let mut response = String::new();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ChatError::Cancelled),
            next = stream.next() => next,
        };

        match next {
            Some(Ok(fragment)) => {
                response.push_str(&fragment);
                on_fragment(&fragment, &response);
            }
            Some(Err(e)) => return Err(e),
            None => break,
        }
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn relay_all(chunks: &[&str]) -> (String, String) {
        let mut relay = TokenRelay::new();
        let mut full = String::new();
        let mut shown = String::new();
        for chunk in chunks {
            full.push_str(chunk);
            if let Some(visible) = relay.advance(&full) {
                shown.push_str(visible);
            }
        }
        (full, shown)
    }

    #[test]
    fn forwards_plain_text_as_it_arrives() {
        let (_, shown) = relay_all(&["Hello", " wor", "ld"]);
        assert_eq!(shown, "Hello world");
    }

    #[test]
    fn never_forwards_the_call_payload() {
        let (full, shown) = relay_all(&["Checking. CAL", "L_TO", "OL {\"name\":", " \"A.b\"}"]);
        assert_eq!(shown, "Checking. ");
        assert!(full.contains("CALL_TOOL"));
    }

    #[test]
    fn held_back_prefix_is_released_when_it_is_not_a_sentinel() {
        let mut relay = TokenRelay::new();
        assert_eq!(relay.advance("Press C"), Some("Press "));
        assert_eq!(relay.advance("Press CA"), None);
        assert_eq!(relay.advance("Press CAT"), Some("CAT"));
        assert_eq!(relay.finish("Press CAT"), None);
    }

    #[test]
    fn finish_flushes_the_tail() {
        let mut relay = TokenRelay::new();
        assert_eq!(relay.advance("see CALL"), Some("see "));
        assert_eq!(relay.finish("see CALL"), Some("CALL"));
    }

    #[tokio::test]
    async fn collects_fragments_in_order() {
        let fragments = stream::iter(vec![Ok("a".to_string()), Ok("b".to_string())]).boxed();
        let mut seen = Vec::new();
        let response = collect_stream(fragments, &CancellationToken::new(), |fragment, _| {
            seen.push(fragment.to_string())
        })
        .await
        .unwrap();
        assert_eq!(response, "ab");
        assert_eq!(seen, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn stream_errors_propagate() {
        let fragments = stream::iter(vec![
            Ok("a".to_string()),
            Err(ChatError::Network("reset".to_string())),
        ])
        .boxed();
        let err = collect_stream(fragments, &CancellationToken::new(), |_, _| {})
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Network(_)));
    }

    #[tokio::test]
    async fn cancellation_interrupts_a_stalled_stream() {
        let fragments = stream::iter(vec![Ok("partial".to_string())])
            .chain(stream::pending())
            .boxed();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move { trigger.cancel() });
        let err = collect_stream(fragments, &cancel, |_, _| {}).await.unwrap_err();
        assert!(matches!(err, ChatError::Cancelled));
    }
}
