//! Builds provider clients per retailer.
//!
//! Engines never construct HTTP clients themselves; they ask a
//! [`ProviderFactory`] for an `Arc<dyn PosProvider>` bound to the retailer's
//! stored token. Tests inject a factory returning in-memory fakes.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use pos_client::{
    OAuthClient, PosProvider,
    credentials::AccessToken,
    models::Origin,
    providers::{
        clover_rest::{oauth::CloverOAuth, provider::CloverProvider},
        square_rest::{oauth::SquareOAuth, provider::SquareProvider},
    },
    rate_limit::RateLimit,
};
use secrecy::SecretString;

use crate::{
    config::SyncConfig,
    error::{SyncError, SyncResult},
    models::Retailer,
    repo::retailers::Credentials,
};

/// Source of provider clients.
pub trait ProviderFactory: Send + Sync {
    /// Catalog/order client acting for `retailer` with `credentials`.
    fn provider(
        &self,
        retailer: &Retailer,
        credentials: &Credentials,
    ) -> SyncResult<Arc<dyn PosProvider>>;

    /// OAuth client for the retailer's application.
    fn oauth(&self, retailer: &Retailer) -> SyncResult<Arc<dyn OAuthClient>>;
}

/// [`ProviderFactory`] building the REST clients from configuration.
///
/// Clover clients of one merchant share a single [`RateLimit`], so the
/// budget holds across concurrently running units of work.
pub struct HttpProviderFactory {
    config: SyncConfig,
    limiters: Mutex<HashMap<String, Arc<RateLimit>>>,
}

impl HttpProviderFactory {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            limiters: Mutex::new(HashMap::new()),
        }
    }

    fn limiter_for(&self, merchant_id: &str) -> Option<Arc<RateLimit>> {
        let per_second = self.config.clover.rate_limit()?;
        let mut limiters = match self.limiters.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Some(
            limiters
                .entry(merchant_id.to_string())
                .or_insert_with(|| Arc::new(RateLimit::per_second(per_second)))
                .clone(),
        )
    }
}

fn init_error(e: pos_client::ProviderInitError) -> SyncError {
    SyncError::Other(anyhow::Error::new(e).context("build provider client"))
}

impl ProviderFactory for HttpProviderFactory {
    fn provider(
        &self,
        retailer: &Retailer,
        credentials: &Credentials,
    ) -> SyncResult<Arc<dyn PosProvider>> {
        let origin = retailer.origin()?;
        let settings = self.config.provider(origin).client_settings();
        let token = AccessToken::shared(credentials.access_token.clone());
        let provider: Arc<dyn PosProvider> = match origin {
            Origin::Square => Arc::new(SquareProvider::new(&settings, token).map_err(init_error)?),
            Origin::Clover => {
                let merchant_id = retailer.merchant()?;
                Arc::new(
                    CloverProvider::new(&settings, merchant_id, token, self.limiter_for(merchant_id))
                        .map_err(init_error)?,
                )
            }
        };
        Ok(provider)
    }

    fn oauth(&self, retailer: &Retailer) -> SyncResult<Arc<dyn OAuthClient>> {
        let origin = retailer.origin()?;
        let cfg = self.config.provider(origin);
        let secret = SecretString::from(retailer.app_secret.clone());
        let client: Arc<dyn OAuthClient> = match origin {
            Origin::Square => Arc::new(
                SquareOAuth::new(&cfg.base_url, cfg.timeout(), retailer.app_id.clone(), secret)
                    .map_err(init_error)?,
            ),
            Origin::Clover => Arc::new(
                CloverOAuth::new(&cfg.base_url, cfg.timeout(), retailer.app_id.clone(), secret)
                    .map_err(init_error)?,
            ),
        };
        Ok(client)
    }
}
