//! Async REST clients for point-of-sale providers.
//!
//! The crate exposes two provider-agnostic contracts:
//! - [`providers::PosProvider`]: catalog, stock, order, customer and location calls
//!   against one connected merchant account.
//! - [`providers::OAuthClient`]: authorization-code exchange, token refresh and
//!   token health checks for an application.
//!
//! Concrete implementations live in [`providers::square_rest`] and
//! [`providers::clover_rest`]. Payloads are returned in the provider's own
//! shape (see the `response` module of each provider); turning them into
//! canonical records is left to the caller.
//!
//! Calls authenticate with a hot-swappable [`credentials::AccessToken`] and may be
//! paced by an injected [`rate_limit::RateLimit`].

pub mod credentials;
pub mod models;
pub mod providers;
pub mod rate_limit;

pub use providers::errors::{ProviderError, ProviderInitError};
pub use providers::{OAuthClient, PosProvider};
