use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use crate::{
    models::TokenGrant,
    providers::{
        OAuthClient,
        errors::{ProviderError, ProviderInitError},
        http,
        square_rest::{API_VERSION, provider::classify_error, response::TokenResponse},
    },
};

#[derive(Serialize)]
struct TokenBody<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    grant_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<&'a str>,
}

/// OAuth client for one Square application.
pub struct SquareOAuth {
    client: Client,
    base_url: String,
    app_id: String,
    app_secret: SecretString,
}

impl SquareOAuth {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        app_id: String,
        app_secret: SecretString,
    ) -> Result<Self, ProviderInitError> {
        if app_id.trim().is_empty() {
            return Err(ProviderInitError::MissingCredential("square app id"));
        }
        let client = http::build_client(timeout, Default::default())?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            app_id,
            app_secret,
        })
    }

    async fn token_request(&self, body: &TokenBody<'_>) -> Result<TokenGrant, ProviderError> {
        let resp = self
            .client
            .request(Method::POST, format!("{}/oauth2/token", self.base_url))
            .header("Square-Version", API_VERSION)
            .json(body)
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
            refresh_token: token.refresh_token.map(|t| SecretString::new(t.into())),
            token_type: token.token_type.unwrap_or_else(|| "bearer".into()),
            expires_at: token.expires_at,
            merchant_id: token.merchant_id,
        })
    }
}

#[async_trait]
impl OAuthClient for SquareOAuth {
    async fn exchange_code(
        &self,
        code: &str,
        _merchant_id: Option<&str>,
    ) -> Result<TokenGrant, ProviderError> {
        self.token_request(&TokenBody {
            client_id: &self.app_id,
            client_secret: self.app_secret.expose_secret(),
            grant_type: "authorization_code",
            code: Some(code),
            refresh_token: None,
        })
        .await
    }

    async fn refresh(&self, refresh_token: &SecretString) -> Result<TokenGrant, ProviderError> {
        self.token_request(&TokenBody {
            client_id: &self.app_id,
            client_secret: self.app_secret.expose_secret(),
            grant_type: "refresh_token",
            code: None,
            refresh_token: Some(refresh_token.expose_secret()),
        })
        .await
    }

    async fn health_check(
        &self,
        access_token: &SecretString,
        _merchant_id: Option<&str>,
    ) -> Result<bool, ProviderError> {
        let resp = self
            .client
            .get(format!("{}/v2/locations", self.base_url))
            .header("Square-Version", API_VERSION)
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
