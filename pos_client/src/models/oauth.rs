use chrono::{DateTime, Utc};
use secrecy::SecretString;

/// Tokens returned by an authorization-code exchange or a refresh.
#[derive(Debug)]
pub struct TokenGrant {
    pub access_token: SecretString,
    /// Absent for providers that do not issue refresh tokens.
    pub refresh_token: Option<SecretString>,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    /// Merchant the grant belongs to, when the provider reports it.
    pub merchant_id: Option<String>,
}
