//! Request execution shared by the provider clients: rate limiting, bearer
//! injection, 429 back-off and status classification.

use std::{sync::Arc, time::Duration};

use reqwest::{
    Client, Method, RequestBuilder, Response, StatusCode,
    header::{AUTHORIZATION, HeaderMap, RETRY_AFTER},
};
use serde::de::DeserializeOwned;

use crate::{credentials::AccessToken, providers::errors::ProviderError, rate_limit::RateLimit};

/// How many times a throttled (429) call is replayed before giving up.
pub(crate) const MAX_THROTTLE_RETRIES: u32 = 3;

const DEFAULT_THROTTLE_WAIT: Duration = Duration::from_secs(1);

/// Maps a non-success status and its body to a provider error.
pub(crate) type Classifier = fn(StatusCode, &str) -> ProviderError;

pub(crate) struct HttpCore {
    pub client: Client,
    pub base_url: String,
    pub token: Arc<AccessToken>,
    pub limiter: Option<Arc<RateLimit>>,
    pub classify: Classifier,
}

impl HttpCore {
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, format!("{}{}", self.base_url, path))
    }

    /// Send `req`, waiting on the rate limiter first and replaying it after a
    /// 429. Non-success statuses are turned into errors by `classify`.
    pub async fn send(&self, req: RequestBuilder) -> Result<Response, ProviderError> {
        let mut throttled = 0;
        loop {
            let attempt = req
                .try_clone()
                .ok_or_else(|| ProviderError::Validation("request body is not replayable".into()))?;

            if let Some(limiter) = &self.limiter {
                limiter.acquire().await;
            }

            let resp = attempt
                .header(AUTHORIZATION, self.token.bearer_header()?)
                .send()
                .await?;
            let status = resp.status();

            if status == StatusCode::TOO_MANY_REQUESTS && throttled < MAX_THROTTLE_RETRIES {
                throttled += 1;
                let wait = retry_after(resp.headers()).unwrap_or(DEFAULT_THROTTLE_WAIT);
                tracing::warn!(
                    url = %resp.url(),
                    wait_ms = wait.as_millis() as u64,
                    attempt = throttled,
                    "provider throttled request, backing off"
                );
                tokio::time::sleep(wait).await;
                continue;
            }

            if status.is_success() {
                return Ok(resp);
            }

            let body = resp.text().await.unwrap_or_default();
            return Err((self.classify)(status, &body));
        }
    }

    pub async fn json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ProviderError> {
        let resp = self.send(req).await?;
        decode(resp).await
    }
}

pub(crate) async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ProviderError> {
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ProviderError::Decode(e.to_string()))
}

pub(crate) fn build_client(timeout: Duration, headers: HeaderMap) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .default_headers(headers)
        .build()
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Parse a provider quantity string ("3", "2.5") into whole units, rounding down.
pub fn parse_quantity(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    raw.parse::<i64>()
        .ok()
        .or_else(|| raw.parse::<f64>().ok().map(|q| q.floor() as i64))
}
