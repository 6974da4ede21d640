//! Generative backend settings.

use serde::{Deserialize, Serialize};

/// OpenAI-compatible chat completions backend.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LlmSettings {
    /// API root; `/chat/completions` is appended.
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    /// Upper bound on one upstream request, in seconds.
    pub timeout_secs: u64,
    /// Name of the env var holding the API key.
    pub api_key_env: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            max_tokens: 150,
            temperature: 0.7,
            timeout_secs: 20,
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}
