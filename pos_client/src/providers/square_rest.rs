//! Square Connect v2 REST client.

pub mod oauth;
pub mod params;
pub mod provider;
pub mod response;

pub const DEFAULT_BASE_URL: &str = "https://connect.squareup.com";

/// Value sent in the `Square-Version` header.
pub const API_VERSION: &str = "2024-07-17";

/// Catalog object types requested when listing the catalog.
pub const CATALOG_TYPES: &str = "ITEM,IMAGE,CATEGORY";
