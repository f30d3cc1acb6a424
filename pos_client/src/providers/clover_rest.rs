//! Clover v3 REST client.

pub mod oauth;
pub mod params;
pub mod provider;
pub mod response;

pub const DEFAULT_BASE_URL: &str = "https://api.clover.com";

/// Expansions requested with every inventory item so mapping needs no follow-up calls.
pub const ITEM_EXPAND: &str = "categories,itemStock,itemGroup";

pub const ORDER_EXPAND: &str = "lineItems,customers";

pub const CUSTOMER_EXPAND: &str = "addresses,emailAddresses,phoneNumbers";

/// Clover does not report token expiry; issued tokens are treated as valid for this long.
pub const TOKEN_LIFETIME_DAYS: i64 = 364;
