use reqwest::header::InvalidHeaderValue;
use thiserror::Error;

/// Errors that can occur within a provider client call.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The access token was rejected (HTTP 401). The merchant must re-authorize
    /// or the token must be refreshed.
    #[error("access token rejected by provider: {0}")]
    AuthExpired(String),

    /// The provider refused an order update because the supplied version is stale.
    #[error("order version conflict: {0}")]
    VersionConflict(String),

    /// The provider answered with a non-success status.
    #[error("API error ({status_code}): {message}")]
    Api { status_code: u16, message: String },

    /// The call did not complete within the configured timeout.
    #[error("provider request timed out")]
    Timeout,

    /// Transport-level failure (DNS, connection reset, TLS...).
    #[error("API request failed: {0}")]
    Request(#[source] reqwest::Error),

    /// The response body did not match the expected shape.
    #[error("failed to decode provider response: {0}")]
    Decode(String),

    /// The request could not be built from the supplied parameters.
    #[error("Invalid parameters for provider: {0}")]
    Validation(String),
}

impl ProviderError {
    /// Whether retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::Api { .. } | ProviderError::Timeout | ProviderError::Request(_)
        )
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            ProviderError::Api { status_code, .. } => Some(*status_code),
            ProviderError::AuthExpired(_) => Some(401),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout
        } else if e.is_decode() {
            ProviderError::Decode(e.to_string())
        } else {
            ProviderError::Request(e)
        }
    }
}

/// Errors raised while constructing a provider client.
#[derive(Debug, Error)]
pub enum ProviderInitError {
    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] InvalidHeaderValue),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("missing credential: {0}")]
    MissingCredential(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_api_and_transport_failures_are_transient() {
        assert!(ProviderError::Timeout.is_transient());
        assert!(
            ProviderError::Api {
                status_code: 503,
                message: "unavailable".into()
            }
            .is_transient()
        );
        assert!(!ProviderError::AuthExpired("expired".into()).is_transient());
        assert!(!ProviderError::VersionConflict("stale".into()).is_transient());
        assert!(!ProviderError::Decode("eof".into()).is_transient());
    }
}
