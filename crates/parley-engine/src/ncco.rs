//! Call-control instructions (Vonage NCCO actions) and the builder that
//! shapes a reply into "continue listening" or "say goodbye".

use parley_core::{CallId, InputModality};
use parley_settings::CallSettings;
use serde::{Deserialize, Serialize};

pub const SPEECH_WEBHOOK_PATH: &str = "/webhooks/speech";
pub const DTMF_WEBHOOK_PATH: &str = "/webhooks/dtmf";

/// One NCCO action.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Instruction {
    Talk(TalkAction),
    Input(InputAction),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TalkAction {
    pub text: String,
    pub voice_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barge_in: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputAction {
    #[serde(rename = "type")]
    pub input_types: Vec<InputModality>,
    pub event_url: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speech: Option<SpeechSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtmf: Option<DtmfSettings>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechSettings {
    pub uuid: Vec<String>,
    pub end_on_silence: f64,
    pub language: String,
    pub max_duration: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DtmfSettings {
    pub time_out: u32,
    pub max_digits: u32,
    pub submit_on_hash: bool,
}

impl Instruction {
    pub fn talk_text(&self) -> Option<&str> {
        match self {
            Self::Talk(t) => Some(&t.text),
            Self::Input(_) => None,
        }
    }

    pub fn is_input(&self) -> bool {
        matches!(self, Self::Input(_))
    }
}

/// How a reply should shape the call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    ContinueWithInput(InputModality),
    Terminate,
    NoInputRetry(InputModality),
}

/// Scheme and host that webhook callbacks should point back at,
/// e.g. `https://bot.example.com`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallbackBase(String);

impl CallbackBase {
    pub fn new(base: impl Into<String>) -> Self {
        Self(base.into().trim_end_matches('/').to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Input webhook for a modality.
    pub fn endpoint_for(&self, modality: InputModality) -> String {
        let path = match modality {
            InputModality::Speech => SPEECH_WEBHOOK_PATH,
            InputModality::Dtmf => DTMF_WEBHOOK_PATH,
        };
        format!("{}{}", self.0, path)
    }
}

/// Case-insensitive substring match against the farewell keywords.
pub fn is_farewell(utterance: &str, keywords: &[String]) -> bool {
    let lowered = utterance.to_lowercase();
    keywords
        .iter()
        .filter(|k| !k.is_empty())
        .any(|k| lowered.contains(&k.to_lowercase()))
}

/// Builds NCCO action lists from call settings.
#[derive(Clone, Debug)]
pub struct InstructionBuilder {
    voice_name: String,
    language: String,
    greeting: String,
    reprompt: String,
    closing: String,
    speech_context: Vec<String>,
    end_on_silence: f64,
    max_speech_duration: u32,
    dtmf_timeout: u32,
    dtmf_max_digits: u32,
    dtmf_submit_on_hash: bool,
}

impl InstructionBuilder {
    pub fn new(settings: &CallSettings) -> Self {
        Self {
            voice_name: settings.voice_name.clone(),
            language: settings.language.clone(),
            greeting: settings.greeting.clone(),
            reprompt: settings.reprompt.clone(),
            closing: settings.closing.clone(),
            speech_context: settings.speech_context.clone(),
            end_on_silence: settings.end_on_silence_secs,
            max_speech_duration: settings.max_speech_duration_secs,
            dtmf_timeout: settings.dtmf_timeout_secs,
            dtmf_max_digits: settings.dtmf_max_digits,
            dtmf_submit_on_hash: settings.dtmf_submit_on_hash,
        }
    }

    /// Greeting plus the first input action, with speech context hints.
    pub fn greeting(
        &self,
        call_id: &CallId,
        base: &CallbackBase,
        modality: InputModality,
    ) -> Vec<Instruction> {
        vec![
            self.talk(&self.greeting, Some(true)),
            self.input(call_id, base, modality, true),
        ]
    }

    /// Shape `assistant_text` according to `decision`. For
    /// [`Decision::NoInputRetry`] the configured re-prompt is spoken instead.
    pub fn build(
        &self,
        decision: Decision,
        assistant_text: &str,
        call_id: &CallId,
        base: &CallbackBase,
    ) -> Vec<Instruction> {
        match decision {
            Decision::Terminate => {
                vec![self.talk(&format!("{} {}", assistant_text.trim_end(), self.closing), None)]
            }
            Decision::ContinueWithInput(modality) => vec![
                self.talk(assistant_text, Some(true)),
                self.input(call_id, base, modality, false),
            ],
            Decision::NoInputRetry(modality) => vec![
                self.talk(&self.reprompt, None),
                self.input(call_id, base, modality, false),
            ],
        }
    }

    fn talk(&self, text: &str, barge_in: Option<bool>) -> Instruction {
        Instruction::Talk(TalkAction {
            text: text.to_string(),
            voice_name: self.voice_name.clone(),
            barge_in,
        })
    }

    fn input(
        &self,
        call_id: &CallId,
        base: &CallbackBase,
        modality: InputModality,
        with_context: bool,
    ) -> Instruction {
        let (speech, dtmf) = match modality {
            InputModality::Speech => (
                Some(SpeechSettings {
                    uuid: vec![call_id.to_string()],
                    end_on_silence: self.end_on_silence,
                    language: self.language.clone(),
                    max_duration: self.max_speech_duration,
                    context: if with_context {
                        self.speech_context.clone()
                    } else {
                        Vec::new()
                    },
                }),
                None,
            ),
            InputModality::Dtmf => (
                None,
                Some(DtmfSettings {
                    time_out: self.dtmf_timeout,
                    max_digits: self.dtmf_max_digits,
                    submit_on_hash: self.dtmf_submit_on_hash,
                }),
            ),
        };

        Instruction::Input(InputAction {
            input_types: vec![modality],
            event_url: vec![base.endpoint_for(modality)],
            speech,
            dtmf,
        })
    }
}
