//! Persistence gateway.
//!
//! Free functions over a `&mut SqliteConnection`, grouped by aggregate. Callers
//! own transaction boundaries: the engines wrap a unit of work in
//! `conn.immediate_transaction(..)` and call into these modules from inside it.
//!
//! - [`catalog`]: products, variants, images, aggregates and admin edits
//! - [`categories`]: per-retailer categories and variant links
//! - [`locations`]: stores and their inventories
//! - [`retailers`]: merchant accounts and the [`retailers::CredentialStore`]
//! - [`customers`], [`orders`], [`expiry`]: customer records and the reservation lifecycle
//! - [`webhook_events`]: idempotency claims for inbound events
//! - [`failed_tasks`]: the permanent-failure channel

pub mod catalog;
pub mod categories;
pub mod customers;
pub mod expiry;
pub mod failed_tasks;
pub mod locations;
pub mod orders;
pub mod retailers;
pub mod webhook_events;
