use std::time::Duration;

/// Typed error hierarchy for calls to the generative-text backend.
#[derive(Clone, Debug, thiserror::Error)]
pub enum GatewayError {
    // Credentials
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    // Capacity
    #[error("rate limited")]
    RateLimited { retry_after: Option<Duration> },

    // Service-level
    #[error("server error {status}: {body}")]
    ServerError { status: u16, body: String },
    #[error("provider overloaded")]
    ProviderOverloaded,
    #[error("network error: {0}")]
    NetworkError(String),
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    // Everything else
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Caller-facing classification of a generation failure.
///
/// Each kind maps to its own fallback wording; call-control behavior is the
/// same for all of them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Auth,
    RateLimited,
    UpstreamUnavailable,
    Unknown,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::RateLimited => "rate_limited",
            Self::UpstreamUnavailable => "upstream_unavailable",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl GatewayError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::AuthenticationFailed(_) => FailureKind::Auth,
            Self::RateLimited { .. } => FailureKind::RateLimited,
            Self::ServerError { .. }
            | Self::ProviderOverloaded
            | Self::NetworkError(_)
            | Self::Timeout(_) => FailureKind::UpstreamUnavailable,
            Self::InvalidRequest(_) | Self::MalformedResponse(_) => FailureKind::Unknown,
        }
    }

    pub fn suggested_delay(&self) -> Option<Duration> {
        if let Self::RateLimited { retry_after } = self {
            *retry_after
        } else {
            None
        }
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed(_) => "authentication_failed",
            Self::RateLimited { .. } => "rate_limited",
            Self::ServerError { .. } => "server_error",
            Self::ProviderOverloaded => "provider_overloaded",
            Self::NetworkError(_) => "network_error",
            Self::Timeout(_) => "timeout",
            Self::InvalidRequest(_) => "invalid_request",
            Self::MalformedResponse(_) => "malformed_response",
        }
    }

    /// Classify an HTTP status code into the appropriate error variant.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => Self::AuthenticationFailed(body),
            429 => Self::RateLimited { retry_after: None },
            529 => Self::ProviderOverloaded,
            500..=599 => Self::ServerError { status, body },
            _ => Self::InvalidRequest(format!("unexpected status {status}: {body}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_classification() {
        assert_eq!(GatewayError::AuthenticationFailed("bad key".into()).kind(), FailureKind::Auth);
        assert_eq!(GatewayError::from_status(401, "no".into()).kind(), FailureKind::Auth);
        assert_eq!(GatewayError::from_status(403, "no".into()).kind(), FailureKind::Auth);
    }

    #[test]
    fn rate_limit_classification() {
        let rl = GatewayError::from_status(429, "slow down".into());
        assert_eq!(rl.kind(), FailureKind::RateLimited);
    }

    #[test]
    fn upstream_unavailable_classification() {
        for err in [
            GatewayError::ServerError { status: 500, body: "err".into() },
            GatewayError::ProviderOverloaded,
            GatewayError::NetworkError("connection reset".into()),
            GatewayError::Timeout(Duration::from_secs(20)),
            GatewayError::from_status(503, "unavailable".into()),
            GatewayError::from_status(529, "overloaded".into()),
        ] {
            assert_eq!(err.kind(), FailureKind::UpstreamUnavailable, "{err}");
        }
    }

    #[test]
    fn everything_else_is_unknown() {
        assert_eq!(GatewayError::from_status(400, "bad".into()).kind(), FailureKind::Unknown);
        assert_eq!(GatewayError::from_status(404, "gone".into()).kind(), FailureKind::Unknown);
        assert_eq!(
            GatewayError::MalformedResponse("no choices".into()).kind(),
            FailureKind::Unknown
        );
    }

    #[test]
    fn suggested_delay_only_for_rate_limit() {
        let rl = GatewayError::RateLimited {
            retry_after: Some(Duration::from_secs(5)),
        };
        assert_eq!(rl.suggested_delay(), Some(Duration::from_secs(5)));

        let se = GatewayError::ServerError { status: 500, body: "err".into() };
        assert_eq!(se.suggested_delay(), None);
    }

    #[test]
    fn error_kind_strings() {
        assert_eq!(GatewayError::Timeout(Duration::from_secs(1)).error_kind(), "timeout");
        assert_eq!(GatewayError::ProviderOverloaded.error_kind(), "provider_overloaded");
        assert_eq!(FailureKind::UpstreamUnavailable.to_string(), "upstream_unavailable");
    }

    #[test]
    fn failure_kind_serde() {
        let json = serde_json::to_string(&FailureKind::RateLimited).unwrap();
        assert_eq!(json, r#""rate_limited""#);
    }
}
