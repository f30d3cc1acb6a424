use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};

use crate::{
    models::TokenGrant,
    providers::{
        OAuthClient,
        clover_rest::{TOKEN_LIFETIME_DAYS, provider::classify_error, response::TokenResponse},
        errors::{ProviderError, ProviderInitError},
        http,
    },
};

/// OAuth client for one Clover application.
///
/// Clover issues long-lived access tokens without refresh tokens; an expired
/// merchant has to go through the authorization flow again.
pub struct CloverOAuth {
    client: Client,
    base_url: String,
    app_id: String,
    app_secret: SecretString,
}

impl CloverOAuth {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        app_id: String,
        app_secret: SecretString,
    ) -> Result<Self, ProviderInitError> {
        if app_id.trim().is_empty() {
            return Err(ProviderInitError::MissingCredential("clover app id"));
        }
        let client = http::build_client(timeout, Default::default())?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            app_id,
            app_secret,
        })
    }
}

#[async_trait]
impl OAuthClient for CloverOAuth {
    async fn exchange_code(
        &self,
        code: &str,
        merchant_id: Option<&str>,
    ) -> Result<TokenGrant, ProviderError> {
        let resp = self
            .client
            .get(format!("{}/oauth/token", self.base_url))
            .query(&[
                ("client_id", self.app_id.as_str()),
                ("client_secret", self.app_secret.expose_secret()),
                ("code", code),
            ])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(classify_error(status, &text));
        }
        let token: TokenResponse = http::decode(resp).await?;
        Ok(TokenGrant {
            access_token: SecretString::new(token.access_token.into()),
            refresh_token: None,
            token_type: "bearer".into(),
            expires_at: Utc::now() + chrono::Duration::days(TOKEN_LIFETIME_DAYS),
            merchant_id: merchant_id.map(str::to_string),
        })
    }

    async fn refresh(&self, _refresh_token: &SecretString) -> Result<TokenGrant, ProviderError> {
        Err(ProviderError::Validation(
            "Clover tokens cannot be refreshed; the merchant must reconnect".into(),
        ))
    }

    async fn health_check(
        &self,
        access_token: &SecretString,
        merchant_id: Option<&str>,
    ) -> Result<bool, ProviderError> {
        let merchant_id = merchant_id
            .ok_or_else(|| ProviderError::Validation("merchant id required".into()))?;
        let resp = self
            .client
            .get(format!("{}/v3/merchants/{merchant_id}", self.base_url))
            .bearer_auth(access_token.expose_secret())
            .send()
            .await?;
        match resp.status() {
            s if s.is_success() => Ok(true),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(false),
            s => {
                let text = resp.text().await.unwrap_or_default();
                Err(classify_error(s, &text))
            }
        }
    }
}
