//! Provider-neutral records produced by [`crate::mapper`] and consumed by the engines.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::money::{Cents, PriceRange};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalCategory {
    pub origin_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalImage {
    pub image_id: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalVariant {
    pub origin_id: String,
    pub origin_parent_id: Option<String>,
    pub name: String,
    pub description: String,
    pub sku: Option<String>,
    pub upc: Option<String>,
    /// Base price, before location overrides.
    pub price: Cents,
    pub currency: String,
    /// Units on hand when the payload carries them; otherwise fetched per location.
    pub stock: Option<i64>,
    /// Provider location ids the variant is sold at.
    pub locations: Vec<String>,
    /// Location-specific prices replacing `price` at that location.
    pub location_prices: BTreeMap<String, Cents>,
    pub image_ids: Vec<String>,
    pub category_ids: Vec<String>,
}

impl CanonicalVariant {
    /// Effective price at `location_id`.
    pub fn price_at(&self, location_id: &str) -> Cents {
        self.location_prices
            .get(location_id)
            .copied()
            .unwrap_or(self.price)
    }

    pub fn is_visible_at(&self, location_id: &str) -> bool {
        self.locations.iter().any(|l| l == location_id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalProduct {
    pub origin_id: String,
    pub name: String,
    pub locations: Vec<String>,
    pub variants: Vec<CanonicalVariant>,
    /// Aggregated from base variant prices.
    pub prices: PriceRange,
}

/// Everything one catalog page maps to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappedCatalog {
    pub products: Vec<CanonicalProduct>,
    pub categories: Vec<CanonicalCategory>,
    pub images: Vec<CanonicalImage>,
    /// Provider ids of items or variants reported as deleted.
    pub deleted_ids: Vec<String>,
}

impl MappedCatalog {
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
            && self.categories.is_empty()
            && self.images.is_empty()
            && self.deleted_ids.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalLineItem {
    /// Provider variant id; `None` for custom-amount lines.
    pub catalog_item_id: Option<String>,
    pub name: String,
    pub quantity: i64,
    pub unit_price: Cents,
    pub variation_total: Cents,
    pub tax: Cents,
    pub total_price: Cents,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalPickup {
    pub origin_id: String,
    pub pickup_at: Option<DateTime<Utc>>,
    pub recipient_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalOrder {
    pub origin_id: String,
    pub location_id: Option<String>,
    /// Provider-native state (e.g. `OPEN`, `COMPLETED`, `paid`).
    pub state: String,
    pub version: Option<i64>,
    pub customer_origin_id: Option<String>,
    pub ordered_at: Option<DateTime<Utc>>,
    pub subtotal: Cents,
    pub tax: Cents,
    pub total: Cents,
    pub currency: String,
    pub line_items: Vec<CanonicalLineItem>,
    pub pickups: Vec<CanonicalPickup>,
}

impl CanonicalOrder {
    pub fn quantity(&self) -> i64 {
        self.line_items.iter().map(|l| l.quantity).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalCustomer {
    pub origin_id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address1: Option<String>,
    pub address2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalLocation {
    pub pos_id: String,
    pub name: String,
    pub address1: Option<String>,
    pub address2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
}
