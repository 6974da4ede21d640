//! Settings types, grouped by concern.

mod call;
mod llm;
mod server;

pub use call::{CallSettings, FallbackSettings};
pub use llm::LlmSettings;
pub use server::{LoggingSettings, ServerSettings};

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings document.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParleySettings {
    pub server: ServerSettings,
    pub llm: LlmSettings,
    pub call: CallSettings,
    pub fallback: FallbackSettings,
    pub logging: LoggingSettings,
}

impl ParleySettings {
    /// Reject combinations the call engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.call.history_max_turns < 2 {
            return Err(SettingsError::InvalidValue(
                "call.historyMaxTurns must be at least 2".into(),
            ));
        }
        if self.llm.timeout_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "llm.timeoutSecs must be greater than zero".into(),
            ));
        }
        if self.server.request_timeout_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "server.requestTimeoutSecs must be greater than zero".into(),
            ));
        }
        if self.server.request_timeout_secs <= self.llm.timeout_secs.saturating_mul(2) {
            return Err(SettingsError::InvalidValue(format!(
                "server.requestTimeoutSecs ({}) must exceed twice llm.timeoutSecs ({})",
                self.server.request_timeout_secs, self.llm.timeout_secs
            )));
        }
        if self.call.greeting.trim().is_empty() {
            return Err(SettingsError::InvalidValue("call.greeting is empty".into()));
        }
        Ok(())
    }
}
