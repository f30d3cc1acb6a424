//! Access-token holder shared between a provider client and the refresh job.

use std::{fmt, sync::Arc};

use arc_swap::ArcSwap;
use reqwest::header::HeaderValue;
use secrecy::{ExposeSecret, SecretString};

use crate::providers::errors::ProviderError;

/// Bearer token injected into every provider call.
///
/// The token can be replaced while clients are in use (after a refresh);
/// in-flight requests keep the value they started with.
pub struct AccessToken {
    current: ArcSwap<SecretString>,
}

impl AccessToken {
    pub fn new(token: SecretString) -> Self {
        Self {
            current: ArcSwap::from_pointee(token),
        }
    }

    pub fn shared(token: SecretString) -> Arc<Self> {
        Arc::new(Self::new(token))
    }

    /// Swap in a freshly issued token.
    pub fn replace(&self, token: SecretString) {
        self.current.store(Arc::new(token));
    }

    /// `Authorization` header value, marked sensitive so it is redacted from debug output.
    pub(crate) fn bearer_header(&self) -> Result<HeaderValue, ProviderError> {
        let token = self.current.load();
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
            .map_err(|_| ProviderError::Validation("access token is not a valid header value".into()))?;
        value.set_sensitive(true);
        Ok(value)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}
