//! Diesel models mapping to the database schema.
//!
//! These types mirror the tables defined in the embedded migrations and in
//! [`crate::schema`] for use with Diesel's Queryable/Selectable APIs:
//! - [`crate::schema::retailers`]: merchant accounts and their provider credentials
//! - [`crate::schema::locations`] / [`crate::schema::inventories`]: stores, one inventory each
//! - [`crate::schema::products`] / [`crate::schema::variants`]: the synchronized catalog
//! - [`crate::schema::orders`] / [`crate::schema::order_items`]: provider orders and reservations
//! - [`crate::schema::webhook_events`]: idempotency records for inbound events
//!
//! Timestamps are RFC 3339 UTC strings with millisecond precision (see [`crate::tz`]).
//! Money columns are integer minor units (see [`crate::money::Cents`]).

use diesel::prelude::*;

use crate::schema::*;

/// A row in [`crate::schema::retailers`]: one merchant account on one POS provider.
///
/// Token columns are either all set or all null (enforced by a CHECK constraint).
#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = retailers, check_for_backend(diesel::sqlite::Sqlite))]
pub struct Retailer {
    /// Database primary key.
    pub id: i32,
    /// Display name.
    pub name: String,
    /// Provider code, `CLOVER` or `SQUARE`.
    pub origin: String,
    /// Connection status: `requesting`, `approved` or `denied`.
    pub status: String,
    /// Provider-side merchant id; known once the merchant has authorized the app.
    pub merchant_id: Option<String>,
    /// Provider application id the merchant authorized.
    pub app_id: String,
    /// Provider application secret (opaque).
    pub app_secret: String,
    /// Current access token (opaque).
    pub access_token: Option<String>,
    /// Refresh token; absent for providers that do not issue one.
    pub refresh_token: Option<String>,
    /// Token type reported by the provider (usually `bearer`).
    pub token_type: Option<String>,
    /// When the current token was issued.
    pub token_created_at: Option<String>,
    /// When the current token stops being accepted.
    pub expires_at: Option<String>,
    /// CSRF value expected back on the OAuth callback.
    pub oauth_state: Option<String>,
    /// Set while an inventory sync chain is running for this retailer.
    pub is_sync: bool,
    /// Row creation time.
    pub created_at: String,
    /// Last update time.
    pub updated_at: String,
}

/// A row in [`crate::schema::locations`].
#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = locations, check_for_backend(diesel::sqlite::Sqlite))]
pub struct Location {
    pub id: i32,
    pub retailer_id: i32,
    /// Provider location id (Clover: the merchant id).
    pub pos_id: String,
    pub name: String,
    pub address1: Option<String>,
    pub address2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
}

/// A row in [`crate::schema::inventories`]; exactly one per location.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = inventories, check_for_backend(diesel::sqlite::Sqlite))]
pub struct Inventory {
    pub id: i32,
    pub location_id: i32,
    pub name: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = categories, check_for_backend(diesel::sqlite::Sqlite))]
pub struct Category {
    pub id: i32,
    pub retailer_id: i32,
    pub origin_id: String,
    pub name: String,
}

/// A row in [`crate::schema::products`]: a sellable item within one inventory.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = products, check_for_backend(diesel::sqlite::Sqlite))]
pub struct Product {
    pub id: i32,
    pub inventory_id: i32,
    pub origin: String,
    /// Provider item id (Clover: item group id for grouped items).
    pub origin_id: String,
    pub name: String,
    /// Price of the only variant; zero when the product has several.
    pub price: i64,
    /// Lowest variant price; zero unless the product has several differently priced variants.
    pub min_price: i64,
    pub max_price: i64,
    /// Sum of variant stock.
    pub total_stock: i64,
    pub is_active: bool,
    /// When set, sync keeps the local `name`.
    pub is_modified_by_admin: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// A row in [`crate::schema::variants`].
#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = variants, check_for_backend(diesel::sqlite::Sqlite))]
pub struct Variant {
    pub id: i32,
    pub product_id: i32,
    pub origin_id: String,
    pub origin_parent_id: Option<String>,
    pub name: String,
    pub description: String,
    pub sku: Option<String>,
    /// Cross-retailer identity key.
    pub upc: Option<String>,
    pub price: i64,
    pub stock: i64,
    pub currency: String,
    /// When set, sync keeps the local `name` and `description`.
    pub is_modified_by_admin: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = variant_images, check_for_backend(diesel::sqlite::Sqlite))]
pub struct VariantImage {
    pub id: i32,
    pub variant_id: i32,
    pub image_id: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = customers, check_for_backend(diesel::sqlite::Sqlite))]
pub struct Customer {
    pub id: i32,
    pub retailer_id: i32,
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
    pub updated_at: String,
}

/// A row in [`crate::schema::orders`]: a provider order, a marketplace reservation, or both.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = orders, check_for_backend(diesel::sqlite::Sqlite))]
pub struct Order {
    pub id: i32,
    pub retailer_id: i32,
    /// Provider order id; null only for rows never submitted.
    pub origin_id: Option<String>,
    pub location_pos_id: Option<String>,
    /// See [`crate::orders::OrderStatus`].
    pub status: String,
    /// Monotonic optimistic-concurrency version.
    pub version: i64,
    pub subtotal: i64,
    pub tax: i64,
    pub total: i64,
    pub currency: String,
    /// Sum of line quantities.
    pub quantity: i64,
    pub customer_id: Option<i32>,
    /// Marketplace user holding the reservation.
    pub shopper_id: Option<String>,
    /// Reserved variant.
    pub variant_id: Option<i32>,
    /// Reservation hold deadline.
    pub time_limit: Option<String>,
    /// Human-facing code, `#` followed by the zero-padded id.
    pub order_code: Option<String>,
    pub order_time: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = order_items, check_for_backend(diesel::sqlite::Sqlite))]
pub struct OrderItem {
    pub id: i32,
    pub order_id: i32,
    pub variant_id: Option<i32>,
    pub name: String,
    pub quantity: i64,
    pub unit_price: i64,
    pub variation_total: i64,
    pub tax: i64,
    pub total_price: i64,
    pub is_custom: bool,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = order_pickups, check_for_backend(diesel::sqlite::Sqlite))]
pub struct OrderPickup {
    pub id: i32,
    pub order_id: i32,
    pub origin_id: String,
    pub pickup_time: Option<String>,
    pub recipient_name: Option<String>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = expiry_tasks, check_for_backend(diesel::sqlite::Sqlite))]
pub struct ExpiryTask {
    pub reservation_id: i32,
    pub fire_at: String,
    pub fired_at: Option<String>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = failed_tasks, check_for_backend(diesel::sqlite::Sqlite))]
pub struct FailedTask {
    pub id: i32,
    pub kind: String,
    pub retailer_id: Option<i32>,
    pub payload: String,
    pub attempts: i32,
    pub last_error: String,
    pub failed_at: String,
}
