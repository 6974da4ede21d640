//! Inbound webhook payloads (Vonage Voice API shape).
//!
//! Every field is optional: carriers send partial payloads, and a malformed
//! event must still produce a spoken reply rather than a rejected request.

use parley_core::CallId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

/// Payload of an input webhook (speech and/or keypad).
#[derive(Clone, Debug, Default, Deserialize)]
pub struct InputEvent {
    #[serde(default, deserialize_with = "tolerant")]
    pub uuid: Option<String>,
    #[serde(default, deserialize_with = "tolerant")]
    pub speech: Option<SpeechPayload>,
    #[serde(default, deserialize_with = "tolerant")]
    pub dtmf: Option<DtmfPayload>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct SpeechPayload {
    #[serde(default, deserialize_with = "tolerant")]
    pub results: Vec<SpeechResult>,
    #[serde(default, deserialize_with = "tolerant")]
    pub timeout_reason: Option<String>,
}

/// One recognition candidate. Vonage sends `confidence` as a string.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SpeechResult {
    #[serde(default, deserialize_with = "tolerant")]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "tolerant")]
    pub confidence: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct DtmfPayload {
    #[serde(default, deserialize_with = "tolerant")]
    pub digits: Option<String>,
    #[serde(default, deserialize_with = "tolerant")]
    pub timed_out: bool,
}

/// Null or mistyped fields fall back to their default instead of failing
/// the whole payload, so a good `uuid` survives a bad sibling field.
fn tolerant<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_default())
}

impl InputEvent {
    pub fn call_id(&self) -> CallId {
        CallId::from_optional(self.uuid.as_deref())
    }

    pub fn speech(call_id: &str, text: &str) -> Self {
        Self {
            uuid: Some(call_id.to_string()),
            speech: Some(SpeechPayload {
                results: vec![SpeechResult {
                    text: Some(text.to_string()),
                    confidence: None,
                }],
                timeout_reason: None,
            }),
            dtmf: None,
        }
    }

    pub fn dtmf(call_id: &str, digits: &str) -> Self {
        Self {
            uuid: Some(call_id.to_string()),
            speech: None,
            dtmf: Some(DtmfPayload {
                digits: Some(digits.to_string()),
                timed_out: false,
            }),
        }
    }
}

/// Payload of the generic events webhook: status changes, and on some
/// carriers a duplicate copy of keypad input.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CallEvent {
    #[serde(default, deserialize_with = "tolerant")]
    pub uuid: Option<String>,
    #[serde(default, deserialize_with = "tolerant")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "tolerant")]
    pub dtmf: Option<DtmfPayload>,
}

impl CallEvent {
    pub fn call_id(&self) -> CallId {
        CallId::from_optional(self.uuid.as_deref())
    }

    pub fn is_completed(&self) -> bool {
        self.status.as_deref() == Some("completed")
    }

    /// Keypad input carried on this event, re-shaped as an input event.
    pub fn as_input(&self) -> Option<InputEvent> {
        let dtmf = self.dtmf.clone()?;
        Some(InputEvent {
            uuid: self.uuid.clone(),
            speech: None,
            dtmf: Some(dtmf),
        })
    }
}
