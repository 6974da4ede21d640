use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Key used when a webhook arrives without a call identifier.
pub const UNKNOWN_CALL_ID: &str = "unknown";

/// Carrier-assigned identifier for a single phone call.
///
/// The value is opaque: it is never generated locally, only parsed from
/// webhook payloads. Missing or blank identifiers collapse to
/// [`UNKNOWN_CALL_ID`] so a live call is never dropped over a bad payload.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(String);

impl CallId {
    pub fn from_raw(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Build an id from an optional payload field.
    pub fn from_optional(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(s) if !s.is_empty() => Self(s.to_owned()),
            _ => Self::unknown(),
        }
    }

    pub fn unknown() -> Self {
        Self(UNKNOWN_CALL_ID.to_owned())
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN_CALL_ID
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CallId {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_optional(Some(s)))
    }
}

impl AsRef<str> for CallId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_raw_preserves_value() {
        let id = CallId::from_raw("aaaaaaaa-bbbb-cccc-dddd-0123456789ab");
        assert_eq!(id.as_str(), "aaaaaaaa-bbbb-cccc-dddd-0123456789ab");
        assert!(!id.is_unknown());
    }

    #[test]
    fn missing_id_becomes_unknown() {
        assert!(CallId::from_optional(None).is_unknown());
        assert!(CallId::from_optional(Some("")).is_unknown());
        assert!(CallId::from_optional(Some("   ")).is_unknown());
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        let id = CallId::from_optional(Some(" call-1 \n"));
        assert_eq!(id.as_str(), "call-1");
    }

    #[test]
    fn display_and_from_str_roundtrip() {
        let id = CallId::from_raw("call-42");
        let parsed: CallId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = CallId::from_raw("call-7");
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""call-7""#);
    }
}
