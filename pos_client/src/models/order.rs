use chrono::{DateTime, Utc};

use crate::{
    models::page::Cursor,
    providers::{clover_rest::response as clover, square_rest::response as square},
};

/// An order as returned by the provider.
#[derive(Debug, Clone)]
pub enum ProviderOrder {
    Square(square::Order),
    Clover(clover::Order),
}

impl ProviderOrder {
    pub fn id(&self) -> &str {
        match self {
            ProviderOrder::Square(o) => &o.id,
            ProviderOrder::Clover(o) => &o.id,
        }
    }

    /// Optimistic-concurrency version, for providers that track one.
    pub fn version(&self) -> Option<i64> {
        match self {
            ProviderOrder::Square(o) => o.version,
            ProviderOrder::Clover(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrderPage {
    pub orders: Vec<ProviderOrder>,
    pub next: Option<Cursor>,
}

/// Requested state of an outbound order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderState {
    Open,
    Canceled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLineRequest {
    /// Provider id of the variant being ordered.
    pub catalog_item_id: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickupRequest {
    pub recipient_name: String,
    pub pickup_at: DateTime<Utc>,
}

/// Provider-neutral description of an order to create or update.
///
/// Each provider turns this into its own request body. `version` is required
/// for updates against providers with optimistic concurrency and ignored by
/// the others.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRequest {
    pub location_id: String,
    pub line_items: Vec<OrderLineRequest>,
    pub customer_id: Option<String>,
    pub state: OrderState,
    pub version: Option<i64>,
    pub pickup: Option<PickupRequest>,
    /// Marketplace reference shown on the provider side (e.g. `#000042`).
    pub reference_id: Option<String>,
}
