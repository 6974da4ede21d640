//! Collapses speech, keypad and empty events into one canonical utterance.

use parley_core::InputModality;

use crate::events::InputEvent;

pub const DEMO_INTENT: &str = "request capability demonstration";
pub const HELP_INTENT: &str = "request help menu";

/// Result of normalizing one inbound event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Normalized {
    Utterance {
        text: String,
        modality: InputModality,
    },
    /// Nothing usable was said or pressed. `modality` is the channel the
    /// event arrived on, so the re-prompt listens on the same one.
    NoInput { modality: InputModality },
}

impl Normalized {
    pub fn modality(&self) -> InputModality {
        match self {
            Self::Utterance { modality, .. } | Self::NoInput { modality } => *modality,
        }
    }
}

/// Normalize an event regardless of which endpoint delivered it.
///
/// Non-empty keypad digits take precedence over speech; otherwise the top
/// speech candidate is used verbatim.
pub fn normalize(event: &InputEvent) -> Normalized {
    let digits = event
        .dtmf
        .as_ref()
        .and_then(|d| d.digits.as_deref())
        .and_then(utterance_for_digits);
    if let Some(text) = digits {
        return Normalized::Utterance {
            text,
            modality: InputModality::Dtmf,
        };
    }

    if let Some(speech) = &event.speech {
        let transcript = speech
            .results
            .first()
            .and_then(|r| r.text.as_deref())
            .filter(|t| !t.trim().is_empty());
        return match transcript {
            Some(text) => Normalized::Utterance {
                text: text.to_string(),
                modality: InputModality::Speech,
            },
            None => Normalized::NoInput {
                modality: InputModality::Speech,
            },
        };
    }

    if event.dtmf.is_some() {
        return Normalized::NoInput {
            modality: InputModality::Dtmf,
        };
    }

    Normalized::NoInput {
        modality: InputModality::Speech,
    }
}

/// Map a keypad digit string to its canonical utterance.
pub fn utterance_for_digits(raw: &str) -> Option<String> {
    let digits = raw.trim();
    match digits {
        "" => None,
        "1" => Some(DEMO_INTENT.to_string()),
        "2" => Some(HELP_INTENT.to_string()),
        other => Some(format!("The caller pressed {other} on the keypad")),
    }
}
