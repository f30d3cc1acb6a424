use serde::Deserialize;

/// Clover wraps expanded collections as `{ "elements": [...] }`, while webhook
/// payloads and some endpoints use a bare array. Both are accepted.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum Elements<T> {
    Wrapped {
        #[serde(default = "Vec::new")]
        elements: Vec<T>,
    },
    Bare(Vec<T>),
}

impl<T> Default for Elements<T> {
    fn default() -> Self {
        Elements::Bare(Vec::new())
    }
}

impl<T> Elements<T> {
    pub fn as_slice(&self) -> &[T] {
        match self {
            Elements::Wrapped { elements } => elements,
            Elements::Bare(v) => v,
        }
    }

    pub fn into_vec(self) -> Vec<T> {
        match self {
            Elements::Wrapped { elements } => elements,
            Elements::Bare(v) => v,
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub elements: Vec<T>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub name: Option<String>,
    pub alternate_name: Option<String>,
    /// Price in cents.
    pub price: Option<i64>,
    pub sku: Option<String>,
    /// Product code (UPC/EAN).
    pub code: Option<String>,
    #[serde(default)]
    pub hidden: bool,
    pub item_group: Option<ItemGroup>,
    pub item_stock: Option<ItemStock>,
    pub categories: Option<Elements<Category>>,
    pub modified_time: Option<i64>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ItemGroup {
    pub id: String,
    pub name: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ItemStock {
    pub stock_count: Option<i64>,
    pub quantity: Option<f64>,
}

impl ItemStock {
    pub fn units(&self) -> Option<i64> {
        self.stock_count
            .or_else(|| self.quantity.map(|q| q.floor() as i64))
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Category {
    pub id: String,
    pub name: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Reference {
    pub id: String,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub state: Option<String>,
    /// Order total in cents.
    pub total: Option<i64>,
    pub currency: Option<String>,
    pub title: Option<String>,
    /// Milliseconds since the epoch.
    pub created_time: Option<i64>,
    pub modified_time: Option<i64>,
    pub customers: Option<Elements<Reference>>,
    pub line_items: Option<Elements<LineItem>>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub id: String,
    pub item: Option<Reference>,
    pub name: Option<String>,
    /// Unit price in cents.
    pub price: Option<i64>,
    /// Quantity in thousandths for weighed items.
    pub unit_qty: Option<i64>,
    #[serde(default)]
    pub is_revenue: Option<bool>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email_addresses: Option<Elements<EmailAddress>>,
    pub phone_numbers: Option<Elements<PhoneNumber>>,
    pub addresses: Option<Elements<Address>>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct EmailAddress {
    pub email_address: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct PhoneNumber {
    pub phone_number: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Address {
    pub address1: Option<String>,
    pub address2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub country: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Merchant {
    pub id: String,
    pub name: Option<String>,
    pub address: Option<Address>,
}

#[derive(Deserialize, Debug)]
pub struct TokenResponse {
    pub access_token: String,
}

#[derive(Deserialize, Debug, Default)]
pub struct ErrorBody {
    pub message: Option<String>,
}
