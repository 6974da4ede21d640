//! One-shot reply generation with failure classification.

use std::sync::Arc;
use std::time::Duration;

use parley_core::{ChatMessage, ChatProvider, CompletionOptions, FailureKind, GatewayError};
use tracing::{debug, warn};

const DETAIL_MAX_CHARS: usize = 60;
const OPAQUE_TOKEN_MIN_LEN: usize = 24;
const REDACTED: &str = "[redacted]";

/// Why a reply could not be generated. Always recovered locally by
/// speaking [`GenerationError::fallback_utterance`].
#[derive(Clone, Debug, thiserror::Error)]
#[error("{kind}: {detail}")]
pub struct GenerationError {
    pub kind: FailureKind,
    pub detail: String,
}

impl GenerationError {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn from_gateway(err: &GatewayError) -> Self {
        Self::new(err.kind(), err.to_string())
    }

    /// Caller-safe wording for this failure.
    pub fn fallback_utterance(&self, include_detail: bool) -> String {
        match self.kind {
            FailureKind::Auth => {
                "I'm sorry, I'm having a configuration issue right now. Please try calling back later."
                    .to_string()
            }
            FailureKind::RateLimited => {
                "I'm sorry, I'm getting a lot of requests right now. Please try again in a moment."
                    .to_string()
            }
            FailureKind::UpstreamUnavailable => {
                "I'm sorry, I can't reach my service right now. Could you please try again?"
                    .to_string()
            }
            FailureKind::Unknown => {
                let apology =
                    "I'm sorry, I'm having trouble processing that right now. Could you try again?";
                let detail = sanitize_detail(&self.detail);
                if include_detail && !detail.is_empty() {
                    format!("{apology} Error: {detail}")
                } else {
                    apology.to_string()
                }
            }
        }
    }
}

impl From<GatewayError> for GenerationError {
    fn from(err: GatewayError) -> Self {
        Self::from_gateway(&err)
    }
}

/// Redact credential-like tokens and bound the result to a short fragment.
pub fn sanitize_detail(raw: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut redact_next = false;
    for word in raw.split_whitespace() {
        if redact_next {
            redact_next = false;
            out.push(REDACTED);
            continue;
        }
        if word.eq_ignore_ascii_case("bearer") {
            out.push(word);
            redact_next = true;
        } else if looks_secret(word) {
            out.push(REDACTED);
        } else {
            out.push(word);
        }
    }

    let joined = out.join(" ");
    match joined.char_indices().nth(DETAIL_MAX_CHARS) {
        Some((cut, _)) => joined[..cut].trim_end().to_string(),
        None => joined,
    }
}

fn looks_secret(word: &str) -> bool {
    let token = word.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '-' && c != '_');
    if token.starts_with("sk-") {
        return true;
    }
    token.len() >= OPAQUE_TOKEN_MIN_LEN
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        && token.chars().any(|c| c.is_ascii_digit())
}

#[derive(Clone, Debug)]
pub struct GeneratorConfig {
    pub options: CompletionOptions,
    /// Upper bound on one upstream attempt.
    pub timeout: Duration,
    pub include_error_detail: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            options: CompletionOptions::default(),
            timeout: Duration::from_secs(20),
            include_error_detail: false,
        }
    }
}

/// Wraps a [`ChatProvider`] with a deadline and failure classification.
pub struct ResponseGenerator {
    provider: Arc<dyn ChatProvider>,
    config: GeneratorConfig,
}

impl ResponseGenerator {
    pub fn new(provider: Arc<dyn ChatProvider>, config: GeneratorConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Exactly one upstream attempt. Empty completions count as failures so
    /// an assistant turn is never blank.
    pub async fn generate(&self, messages: &[ChatMessage]) -> Result<String, GenerationError> {
        let attempt = self.provider.complete(messages, &self.config.options);
        let text = match tokio::time::timeout(self.config.timeout, attempt).await {
            Ok(Ok(text)) => text,
            Ok(Err(err)) => {
                warn!(
                    provider = self.provider.name(),
                    error_kind = err.error_kind(),
                    kind = %err.kind(),
                    "generation failed: {err}"
                );
                return Err(GenerationError::from_gateway(&err));
            }
            Err(_) => {
                warn!(
                    provider = self.provider.name(),
                    timeout_secs = self.config.timeout.as_secs(),
                    "generation timed out"
                );
                return Err(GenerationError::from_gateway(&GatewayError::Timeout(
                    self.config.timeout,
                )));
            }
        };

        let text = text.trim();
        if text.is_empty() {
            warn!(provider = self.provider.name(), "empty completion");
            return Err(GenerationError::new(FailureKind::Unknown, "empty completion"));
        }
        debug!(provider = self.provider.name(), chars = text.len(), "generated reply");
        Ok(text.to_string())
    }

    pub fn fallback_for(&self, err: &GenerationError) -> String {
        err.fallback_utterance(self.config.include_error_detail)
    }
}
