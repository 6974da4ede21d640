//! Per-call conversation and call-control settings.

use parley_core::InputModality;
use serde::{Deserialize, Serialize};

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant answering phone calls. \
Keep responses conversational, concise (under 50 words), and friendly. \
You can help with general questions, provide information, and have casual conversations. \
If you don't know something, be honest about it. \
Add in \"uhh\" and \"umm\" on occasion to make the conversation sound human.";

/// Conversation shape and NCCO parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CallSettings {
    /// Fixed system directive prepended to every generation request.
    pub system_prompt: String,
    /// Spoken when a call is answered.
    pub greeting: String,
    /// Spoken when the caller said nothing usable.
    pub reprompt: String,
    /// Appended to the final reply when the caller says goodbye.
    pub closing: String,
    /// Case-insensitive substrings that end the call.
    pub farewell_keywords: Vec<String>,
    /// Maximum number of turns kept per call.
    pub history_max_turns: usize,
    pub voice_name: String,
    pub language: String,
    /// Modality requested right after the greeting.
    pub initial_modality: InputModality,
    /// Speech hints attached to the first input action only.
    pub speech_context: Vec<String>,
    /// Seconds of silence that end a speech input.
    pub end_on_silence_secs: f64,
    /// Maximum length of one speech input, in seconds.
    pub max_speech_duration_secs: u32,
    /// Seconds to wait between keypresses.
    pub dtmf_timeout_secs: u32,
    pub dtmf_max_digits: u32,
    pub dtmf_submit_on_hash: bool,
    /// Window in which an identical DTMF delivery is treated as a duplicate.
    pub dtmf_dedup_window_ms: u64,
    /// Sessions idle longer than this are evicted.
    pub idle_timeout_secs: u64,
    /// How often the idle reaper runs.
    pub reap_interval_secs: u64,
}

impl Default for CallSettings {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            greeting: "Hello, thanks for calling. How can I help you today?".to_string(),
            reprompt: "I didn't catch that. Could you please repeat?".to_string(),
            closing: "Goodbye!".to_string(),
            farewell_keywords: vec!["goodbye".to_string(), "bye".to_string()],
            history_max_turns: 20,
            voice_name: "Amy".to_string(),
            language: "en-US".to_string(),
            initial_modality: InputModality::Speech,
            speech_context: vec![
                "customer_service".to_string(),
                "general_inquiry".to_string(),
            ],
            end_on_silence_secs: 2.0,
            max_speech_duration_secs: 60,
            dtmf_timeout_secs: 5,
            dtmf_max_digits: 1,
            dtmf_submit_on_hash: true,
            dtmf_dedup_window_ms: 3_000,
            idle_timeout_secs: 3_600,
            reap_interval_secs: 60,
        }
    }
}

/// Wording controls for generation failures.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FallbackSettings {
    /// Append a short, sanitized error fragment to the generic apology.
    pub include_error_detail: bool,
}
