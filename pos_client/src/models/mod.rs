//! Provider-neutral request and response envelopes.

pub mod catalog;
pub mod customer;
pub mod location;
pub mod oauth;
pub mod order;
pub mod origin;
pub mod page;

pub use catalog::{CatalogObjects, CatalogPage, ProviderCategory};
pub use customer::{CustomerPage, ProviderCustomer};
pub use location::ProviderLocation;
pub use oauth::TokenGrant;
pub use order::{OrderLineRequest, OrderPage, OrderRequest, OrderState, PickupRequest, ProviderOrder};
pub use origin::Origin;
pub use page::Cursor;
