use async_trait::async_trait;

use crate::errors::GatewayError;
use crate::messages::ChatMessage;

/// Options controlling a single completion request.
#[derive(Clone, Debug)]
pub struct CompletionOptions {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            max_tokens: Some(150),
            temperature: Some(0.7),
        }
    }
}

/// A generative-text backend that answers an ordered message list.
///
/// One call is one upstream request; implementations do not retry.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn name(&self) -> &str;
    fn model(&self) -> &str;

    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String, GatewayError>;
}
