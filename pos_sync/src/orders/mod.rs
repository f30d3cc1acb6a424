//! Order synchronization and the reservation lifecycle.
//!
//! A marketplace reservation starts as an in-memory [`ReservationDraft`]
//! (`CREATED`), becomes `SUBMITTED` once the provider has assigned an id, and
//! is only persisted as `RESERVED` after the provider accepted it. From there
//! it ends `CANCELLED`, `EXPIRED`, or in whatever state the provider reports.
//!
//! - Outbound ([`create_reservation`], [`update_reservation`],
//!   [`cancel_reservation`]): optimistic versioning, checked locally before
//!   any I/O and enforced again by a conditional write.
//! - Inbound ([`reconcile_order`], [`sync_orders`]): the provider's order is
//!   authoritative for lines and totals; a local hold survives a non-terminal
//!   provider state.
//! - [`expiry::sweep`]: `RESERVED → EXPIRED` once the time limit passes.

pub mod expiry;
mod inbound;
mod outbound;

use std::fmt;

pub use inbound::{SyncOrdersReport, UNKNOWN_ITEM_NAME, reconcile_order, reconcile_payload, sync_orders};
pub use outbound::{ReservationDraft, cancel_reservation, create_reservation, update_reservation};

/// Lifecycle label of an order row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderStatus {
    Created,
    Submitted,
    Reserved,
    Cancelled,
    Expired,
    /// Provider-native state, uppercased (e.g. `OPEN`, `COMPLETED`, `PAID`).
    Provider(String),
}

impl OrderStatus {
    pub fn as_str(&self) -> &str {
        match self {
            OrderStatus::Created => "CREATED",
            OrderStatus::Submitted => "SUBMITTED",
            OrderStatus::Reserved => "RESERVED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Expired => "EXPIRED",
            OrderStatus::Provider(s) => s,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "CREATED" => OrderStatus::Created,
            "SUBMITTED" => OrderStatus::Submitted,
            "RESERVED" => OrderStatus::Reserved,
            "CANCELLED" => OrderStatus::Cancelled,
            "EXPIRED" => OrderStatus::Expired,
            other => OrderStatus::Provider(other.to_string()),
        }
    }

    /// Status for a state reported by the provider.
    pub fn from_provider(state: &str) -> Self {
        match state.trim().to_ascii_uppercase().as_str() {
            "CANCELED" | "CANCELLED" => OrderStatus::Cancelled,
            other => OrderStatus::Provider(other.to_string()),
        }
    }

    /// Held locally and not to be overwritten by a non-terminal provider state.
    pub fn is_local_hold(&self) -> bool {
        matches!(self, OrderStatus::Reserved | OrderStatus::Expired)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a provider order state is final.
pub fn is_terminal_provider_state(state: &str) -> bool {
    matches!(
        state.trim().to_ascii_uppercase().as_str(),
        "CANCELED" | "CANCELLED" | "COMPLETED" | "PAID" | "LOCKED" | "REFUNDED"
    )
}

/// Status to store when the provider reports `provider_state` for an order
/// currently labelled `local` (`None` for an order seen for the first time).
pub fn resolve_status(local: Option<&str>, provider_state: &str) -> OrderStatus {
    if is_terminal_provider_state(provider_state) {
        return OrderStatus::from_provider(provider_state);
    }
    match local.map(OrderStatus::parse) {
        Some(held) if held.is_local_hold() => held,
        _ => OrderStatus::from_provider(provider_state),
    }
}
