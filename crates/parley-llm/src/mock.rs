use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use parley_core::errors::GatewayError;
use parley_core::messages::{ChatMessage, Role};
use parley_core::provider::{ChatProvider, CompletionOptions};

/// Pre-programmed responses for deterministic testing without API calls.
#[derive(Clone, Debug)]
pub enum MockResponse {
    /// Reply with fixed text.
    Text(String),
    /// Reply with `"echo: "` plus the last user message.
    Echo,
    /// Fail with the given error.
    Error(GatewayError),
    /// Wait a duration, then resolve the inner response.
    Delay(Duration, Box<MockResponse>),
}

impl MockResponse {
    pub fn text(text: &str) -> Self {
        Self::Text(text.to_string())
    }

    /// Convenience: wrap any response with a delay.
    pub fn delayed(delay: Duration, inner: MockResponse) -> Self {
        Self::Delay(delay, Box::new(inner))
    }
}

/// Mock provider that returns pre-programmed responses in sequence.
///
/// Every request is recorded so tests can assert on what was sent upstream.
pub struct MockProvider {
    responses: Vec<MockResponse>,
    repeat_last: bool,
    call_count: AtomicUsize,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl MockProvider {
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            responses,
            repeat_last: false,
            call_count: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Keep answering with the final configured response once the script runs out.
    pub fn repeating(responses: Vec<MockResponse>) -> Self {
        Self {
            repeat_last: true,
            ..Self::new(responses)
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Message lists received so far, in call order.
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().clone()
    }

    fn response_for(&self, idx: usize) -> Option<&MockResponse> {
        self.responses.get(idx).or_else(|| {
            if self.repeat_last {
                self.responses.last()
            } else {
                None
            }
        })
    }
}

#[async_trait]
impl ChatProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        _options: &CompletionOptions,
    ) -> Result<String, GatewayError> {
        let idx = self.call_count.fetch_add(1, Ordering::Relaxed);
        self.requests.lock().push(messages.to_vec());

        let Some(response) = self.response_for(idx) else {
            return Err(GatewayError::InvalidRequest(format!(
                "MockProvider: no response configured for call {idx}"
            )));
        };

        resolve_response(response, messages).await
    }
}

/// Resolve a MockResponse, handling Delay by sleeping first.
/// Unrolls nested delays iteratively to avoid recursive async.
async fn resolve_response(
    response: &MockResponse,
    messages: &[ChatMessage],
) -> Result<String, GatewayError> {
    let mut current = response;
    loop {
        match current {
            MockResponse::Text(text) => return Ok(text.clone()),
            MockResponse::Echo => {
                let last_user = messages
                    .iter()
                    .rev()
                    .find(|m| m.role == Role::User)
                    .map(|m| m.content.as_str())
                    .unwrap_or_default();
                return Ok(format!("echo: {last_user}"));
            }
            MockResponse::Error(e) => return Err(e.clone()),
            MockResponse::Delay(duration, inner) => {
                tokio::time::sleep(*duration).await;
                current = inner;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(text: &str) -> ChatMessage {
        ChatMessage {
            role: Role::User,
            content: text.into(),
        }
    }

    #[tokio::test]
    async fn text_response() {
        let mock = MockProvider::new(vec![MockResponse::text("hello world")]);
        let reply = mock
            .complete(&[user("hi")], &CompletionOptions::default())
            .await
            .unwrap();
        assert_eq!(reply, "hello world");
        assert_eq!(mock.requests(), vec![vec![user("hi")]]);
    }

    #[tokio::test]
    async fn error_response() {
        let mock = MockProvider::new(vec![MockResponse::Error(
            GatewayError::AuthenticationFailed("bad".into()),
        )]);
        let result = mock.complete(&[], &CompletionOptions::default()).await;
        assert!(matches!(result, Err(GatewayError::AuthenticationFailed(_))));
    }

    #[tokio::test]
    async fn sequential_then_exhausted() {
        let mock = MockProvider::new(vec![
            MockResponse::text("first"),
            MockResponse::text("second"),
        ]);
        let opts = CompletionOptions::default();

        assert_eq!(mock.complete(&[], &opts).await.unwrap(), "first");
        assert_eq!(mock.complete(&[], &opts).await.unwrap(), "second");
        assert!(mock.complete(&[], &opts).await.is_err());
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn repeating_reuses_last_response() {
        let mock = MockProvider::repeating(vec![MockResponse::Echo]);
        let opts = CompletionOptions::default();
        for word in ["one", "two", "three"] {
            let reply = mock.complete(&[user(word)], &opts).await.unwrap();
            assert_eq!(reply, format!("echo: {word}"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_response() {
        let mock = MockProvider::new(vec![MockResponse::delayed(
            Duration::from_secs(5),
            MockResponse::text("after delay"),
        )]);

        let start = tokio::time::Instant::now();
        let reply = mock.complete(&[], &CompletionOptions::default()).await.unwrap();
        assert_eq!(reply, "after delay");
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[test]
    fn provider_properties() {
        let mock = MockProvider::new(vec![]);
        assert_eq!(mock.name(), "mock");
        assert_eq!(mock.model(), "mock-model");
    }
}
