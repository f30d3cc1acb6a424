//! Pure translation of provider payloads into canonical records.
//!
//! Nothing in here performs I/O. The engines feed raw pages from
//! [`pos_client::PosProvider`] through these functions and persist the result.
//!
//! - [`map_catalog`]: items, variants, categories and images of one page, with
//!   location visibility resolved against the retailer's known locations
//! - [`map_order`], [`map_customer`], [`map_location`]: one record each

pub mod clover;
pub mod square;
pub mod visibility;

use pos_client::models::{CatalogObjects, ProviderCustomer, ProviderLocation, ProviderOrder};

use crate::canonical::{CanonicalCustomer, CanonicalLocation, CanonicalOrder, MappedCatalog};

pub use visibility::resolve_locations;

/// Currency assumed when a payload does not carry one.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Retailer-specific inputs for catalog mapping.
#[derive(Debug, Clone, Copy)]
pub struct MapContext<'a> {
    /// Provider ids of the retailer's known locations.
    pub location_ids: &'a [String],
}

pub fn map_catalog(objects: &CatalogObjects, ctx: MapContext<'_>) -> MappedCatalog {
    match objects {
        CatalogObjects::Square(objects) => square::map_catalog(objects, ctx),
        CatalogObjects::Clover(items) => clover::map_catalog(items, ctx),
    }
}

pub fn map_order(order: &ProviderOrder) -> CanonicalOrder {
    match order {
        ProviderOrder::Square(o) => square::map_order(o),
        ProviderOrder::Clover(o) => clover::map_order(o),
    }
}

pub fn map_customer(customer: &ProviderCustomer) -> CanonicalCustomer {
    match customer {
        ProviderCustomer::Square(c) => square::map_customer(c),
        ProviderCustomer::Clover(c) => clover::map_customer(c),
    }
}

pub fn map_location(location: &ProviderLocation) -> CanonicalLocation {
    match location {
        ProviderLocation::Square(l) => square::map_location(l),
        ProviderLocation::Clover(m) => clover::map_location(m),
    }
}
