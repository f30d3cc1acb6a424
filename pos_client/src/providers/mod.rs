//! Provider abstraction for point-of-sale systems.
//!
//! This module defines the [`PosProvider`] trait, a unified interface for the
//! catalog, stock, order, customer and location calls the synchronization engine
//! needs from any POS vendor (Square, Clover, ...), and the [`OAuthClient`] trait
//! for the application-level token flows.
//!
//! Each concrete provider implements both traits over its REST API. The traits
//! are async and object safe so the runtime can pick an implementation per
//! retailer (`Arc<dyn PosProvider>`).
//!
//! # Example
//!
//! ```rust,no_run
//! # use std::{sync::Arc, time::Duration};
//! # use pos_client::{credentials::AccessToken, models::Cursor, PosProvider};
//! # use pos_client::providers::{ClientSettings, square_rest::provider::SquareProvider};
//! # use secrecy::SecretString;
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let token = AccessToken::shared(SecretString::new("sq0atp-...".into()));
//! let provider = SquareProvider::new(&ClientSettings::square_default(), token)?;
//! let page = provider.fetch_catalog_page(&Cursor::Start, None).await?;
//! println!("{} objects", page.objects.len());
//! # Ok(())
//! # }
//! ```

pub mod clover_rest;
pub mod errors;
pub(crate) mod http;
pub mod square_rest;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;

use crate::models::{
    CatalogPage, Cursor, CustomerPage, OrderPage, OrderRequest, ProviderCategory,
    ProviderCustomer, ProviderLocation, ProviderOrder, TokenGrant,
};
use errors::ProviderError;
pub use http::parse_quantity;

/// Connection settings shared by every provider client.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Scheme and host, without a trailing slash (e.g. `https://connect.squareup.com`).
    pub base_url: String,
    /// Upper bound for a single HTTP call.
    pub timeout: Duration,
    /// Page size for offset-paginated listings.
    pub page_limit: u32,
}

impl ClientSettings {
    pub fn square_default() -> Self {
        Self {
            base_url: square_rest::DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            page_limit: 100,
        }
    }

    pub fn clover_default() -> Self {
        Self {
            base_url: clover_rest::DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            page_limit: 100,
        }
    }
}

/// Calls against one connected merchant account.
#[async_trait]
pub trait PosProvider: Send + Sync {
    /// One page of the catalog. With `since`, only objects changed after that
    /// instant are returned, deleted objects included.
    async fn fetch_catalog_page(
        &self,
        cursor: &Cursor,
        since: Option<DateTime<Utc>>,
    ) -> Result<CatalogPage, ProviderError>;

    /// A page holding the single catalog item `item_id` (and whatever related
    /// objects the provider returns with it).
    async fn fetch_catalog_item(&self, item_id: &str) -> Result<CatalogPage, ProviderError>;

    /// Category by id; `None` when the provider no longer knows it.
    async fn fetch_category(&self, category_id: &str)
    -> Result<Option<ProviderCategory>, ProviderError>;

    /// Units on hand of one variant at one location.
    async fn get_stock(&self, item_id: &str, location_id: &str) -> Result<i64, ProviderError>;

    async fn fetch_order(&self, order_id: &str) -> Result<ProviderOrder, ProviderError>;

    async fn list_orders(
        &self,
        location_ids: &[String],
        cursor: &Cursor,
    ) -> Result<OrderPage, ProviderError>;

    async fn create_order(&self, request: &OrderRequest) -> Result<ProviderOrder, ProviderError>;

    /// Replace the line items (and state) of an existing order. Providers with
    /// optimistic concurrency reject a stale `request.version` with
    /// [`ProviderError::VersionConflict`].
    async fn update_order(
        &self,
        order_id: &str,
        request: &OrderRequest,
    ) -> Result<ProviderOrder, ProviderError>;

    /// Cancel or delete an order on the provider.
    async fn delete_order(&self, order_id: &str, version: Option<i64>)
    -> Result<(), ProviderError>;

    async fn fetch_customers(&self, cursor: &Cursor) -> Result<CustomerPage, ProviderError>;

    async fn fetch_customer(&self, customer_id: &str) -> Result<ProviderCustomer, ProviderError>;

    async fn fetch_locations(&self) -> Result<Vec<ProviderLocation>, ProviderError>;
}

/// Application-level OAuth flows.
#[async_trait]
pub trait OAuthClient: Send + Sync {
    /// Trade an authorization code from the callback for tokens.
    async fn exchange_code(
        &self,
        code: &str,
        merchant_id: Option<&str>,
    ) -> Result<TokenGrant, ProviderError>;

    async fn refresh(&self, refresh_token: &SecretString) -> Result<TokenGrant, ProviderError>;

    /// Whether `access_token` is accepted by the provider.
    async fn health_check(
        &self,
        access_token: &SecretString,
        merchant_id: Option<&str>,
    ) -> Result<bool, ProviderError>;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::credentials::AccessToken;

    use super::*;

    // Decides at runtime which provider to hand back; only possible through `dyn PosProvider`.
    fn get_provider(name: &str) -> Arc<dyn PosProvider> {
        let token = AccessToken::shared(SecretString::new("token".into()));
        if name == "square" {
            Arc::new(
                square_rest::provider::SquareProvider::new(&ClientSettings::square_default(), token)
                    .unwrap(),
            )
        } else {
            Arc::new(
                clover_rest::provider::CloverProvider::new(
                    &ClientSettings::clover_default(),
                    "MERCHANT",
                    token,
                    None,
                )
                .unwrap(),
            )
        }
    }

    #[test]
    fn providers_are_object_safe() {
        let providers = [get_provider("square"), get_provider("clover")];
        assert_eq!(providers.len(), 2);
    }
}
