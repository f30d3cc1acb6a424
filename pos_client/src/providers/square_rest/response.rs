use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Money {
    pub amount: i64,
    pub currency: String,
}

/// A catalog object of any type. Exactly one of the `*_data` fields is set,
/// matching `object_type`.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct CatalogObject {
    #[serde(rename = "type")]
    pub object_type: String,
    pub id: String,
    #[serde(default)]
    pub is_deleted: bool,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: Option<i64>,
    pub present_at_all_locations: Option<bool>,
    pub present_at_location_ids: Option<Vec<String>>,
    pub absent_at_location_ids: Option<Vec<String>>,
    pub item_data: Option<ItemData>,
    pub item_variation_data: Option<ItemVariationData>,
    pub image_data: Option<ImageData>,
    pub category_data: Option<CategoryData>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ItemData {
    pub name: Option<String>,
    pub description: Option<String>,
    /// Legacy single-category reference.
    pub category_id: Option<String>,
    #[serde(default)]
    pub categories: Vec<CategoryRef>,
    #[serde(default)]
    pub variations: Vec<CatalogObject>,
    #[serde(default)]
    pub image_ids: Vec<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ItemVariationData {
    pub item_id: Option<String>,
    pub name: Option<String>,
    pub sku: Option<String>,
    pub upc: Option<String>,
    pub price_money: Option<Money>,
    #[serde(default)]
    pub location_overrides: Vec<LocationOverride>,
    #[serde(default)]
    pub image_ids: Vec<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct LocationOverride {
    pub location_id: String,
    pub price_money: Option<Money>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ImageData {
    pub name: Option<String>,
    pub url: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct CategoryData {
    pub name: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CategoryRef {
    pub id: String,
}

#[derive(Deserialize, Debug)]
pub struct CatalogListResponse {
    #[serde(default)]
    pub objects: Vec<CatalogObject>,
    pub cursor: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct CatalogObjectResponse {
    pub object: Option<CatalogObject>,
    #[serde(default)]
    pub related_objects: Vec<CatalogObject>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct InventoryCount {
    pub catalog_object_id: String,
    pub location_id: Option<String>,
    pub state: Option<String>,
    pub quantity: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct InventoryCountsResponse {
    #[serde(default)]
    pub counts: Vec<InventoryCount>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Order {
    pub id: String,
    pub location_id: Option<String>,
    pub state: Option<String>,
    pub version: Option<i64>,
    pub customer_id: Option<String>,
    pub reference_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub total_money: Option<Money>,
    pub total_tax_money: Option<Money>,
    pub net_amounts: Option<NetAmounts>,
    #[serde(default)]
    pub line_items: Vec<OrderLineItem>,
    #[serde(default)]
    pub fulfillments: Vec<Fulfillment>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct NetAmounts {
    pub total_money: Option<Money>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct OrderLineItem {
    pub uid: Option<String>,
    pub catalog_object_id: Option<String>,
    pub name: Option<String>,
    pub quantity: String,
    pub item_type: Option<String>,
    pub base_price_money: Option<Money>,
    pub variation_total_price_money: Option<Money>,
    pub total_tax_money: Option<Money>,
    pub total_money: Option<Money>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Fulfillment {
    pub uid: Option<String>,
    #[serde(rename = "type")]
    pub fulfillment_type: Option<String>,
    pub state: Option<String>,
    pub pickup_details: Option<PickupDetails>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct PickupDetails {
    pub pickup_at: Option<DateTime<Utc>>,
    pub recipient: Option<Recipient>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Recipient {
    pub display_name: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct OrderResponse {
    pub order: Order,
}

#[derive(Deserialize, Debug)]
pub struct SearchOrdersResponse {
    #[serde(default)]
    pub orders: Vec<Order>,
    pub cursor: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Address {
    pub address_line_1: Option<String>,
    pub address_line_2: Option<String>,
    pub locality: Option<String>,
    pub administrative_district_level_1: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Customer {
    pub id: String,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub email_address: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<Address>,
}

#[derive(Deserialize, Debug)]
pub struct CustomerResponse {
    pub customer: Customer,
}

#[derive(Deserialize, Debug)]
pub struct ListCustomersResponse {
    #[serde(default)]
    pub customers: Vec<Customer>,
    pub cursor: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Location {
    pub id: String,
    pub name: Option<String>,
    pub merchant_id: Option<String>,
    pub status: Option<String>,
    pub address: Option<Address>,
}

#[derive(Deserialize, Debug)]
pub struct ListLocationsResponse {
    #[serde(default)]
    pub locations: Vec<Location>,
}

#[derive(Deserialize, Debug, Default)]
pub struct ErrorResponse {
    #[serde(default)]
    pub errors: Vec<ApiErrorDetail>,
}

#[derive(Deserialize, Debug)]
pub struct ApiErrorDetail {
    pub category: Option<String>,
    pub code: Option<String>,
    pub detail: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub merchant_id: Option<String>,
    pub refresh_token: Option<String>,
}
