#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use diesel::QueryableByName;
use diesel::prelude::*;
use diesel::sql_types::{Integer, Text};
use pos_client::models::{
    CatalogObjects, CatalogPage, Cursor, CustomerPage, OrderPage, OrderRequest, OrderState,
    Origin, ProviderCategory, ProviderCustomer, ProviderLocation, ProviderOrder, TokenGrant,
};
use pos_client::{OAuthClient, PosProvider, ProviderError};
use pos_sync::canonical::CanonicalLocation;
use pos_sync::config::SyncConfig;
use pos_sync::context::SyncContext;
use pos_sync::db::{connection, migrate};
use pos_sync::models::{Location, Retailer};
use pos_sync::providers::ProviderFactory;
use pos_sync::repo::locations;
use pos_sync::repo::retailers::{self, CredentialStore, Credentials, NewRetailer, SqliteCredentialStore};
use pos_sync::SyncResult;
use secrecy::SecretString;
use serde_json::{Value, json};
use tempfile::TempDir;

#[derive(QueryableByName)]
struct JournalMode {
    #[diesel(sql_type = Text)]
    journal_mode: String,
}
#[derive(QueryableByName)]
struct ForeignKeys {
    #[diesel(sql_type = Integer)]
    foreign_keys: i32,
}
#[derive(QueryableByName)]
struct BusyTimeout {
    #[diesel(sql_type = Integer, column_name = "timeout")]
    busy_timeout: i32,
}

pub struct TestDb {
    _dir: TempDir,    // keep alive for the life of the test
    pub path: String, // <tmpdir>/test.db
}

pub fn setup_db() -> (TestDb, SqliteConnection) {
    let dir = TempDir::new().expect("tempdir");
    let mut p = PathBuf::from(dir.path());
    p.push("test.db");
    let path = p.to_string_lossy().to_string();

    migrate::run_all(&path).expect("migrations");

    let conn = connection::connect_sqlite(&path).expect("connect");
    (TestDb { _dir: dir, path }, conn)
}

pub fn assert_sqlite_pragmas(conn: &mut SqliteConnection) {
    use diesel::sql_query;

    let jm: JournalMode = sql_query("PRAGMA journal_mode;").get_result(conn).unwrap();
    assert_eq!(jm.journal_mode.to_lowercase(), "wal"); // WAL is persistent per DB file

    let fk: ForeignKeys = sql_query("PRAGMA foreign_keys;").get_result(conn).unwrap();
    assert_eq!(fk.foreign_keys, 1);

    let bt: BusyTimeout = sql_query("PRAGMA busy_timeout;").get_result(conn).unwrap();
    assert_eq!(bt.busy_timeout, 5000);
}

// ---------------------------------------------------------------------------
// In-memory provider
// ---------------------------------------------------------------------------

/// Scripted provider state. Payloads are Square JSON, decoded with the
/// client's own response types.
#[derive(Default)]
pub struct FakeState {
    /// Catalog pages; page `n` is served for `Cursor::Start` (n = 0) or token `n`.
    pub pages: Vec<Vec<Value>>,
    /// Objects returned by `fetch_catalog_item`, keyed by item id.
    pub items: HashMap<String, Vec<Value>>,
    pub categories: HashMap<String, String>,
    /// Units keyed by (variant id, location id); missing pairs have 0.
    pub stock: HashMap<(String, String), i64>,
    pub orders: HashMap<String, Value>,
    pub customers: Vec<Value>,
    pub locations: Vec<Value>,
    /// Reject `update_order` calls with a version conflict.
    pub reject_versions: bool,
    /// Fail every catalog page with a timeout.
    pub catalog_timeouts: bool,
    /// Time out this many `fetch_order` calls before answering.
    pub order_timeouts: usize,
    pub created: Vec<OrderRequest>,
    pub updated: Vec<(String, OrderRequest)>,
    pub deleted: Vec<(String, Option<i64>)>,
    pub catalog_calls: usize,
    pub order_fetches: usize,
    next_order: usize,
}

#[derive(Default)]
pub struct FakeProvider {
    pub state: Mutex<FakeState>,
}

impl FakeProvider {
    pub fn with(f: impl FnOnce(&mut FakeState)) -> Arc<Self> {
        let provider = Self::default();
        f(&mut provider.state.lock().unwrap());
        Arc::new(provider)
    }

    pub fn edit(&self, f: impl FnOnce(&mut FakeState)) {
        f(&mut self.state.lock().unwrap());
    }
}

fn decode<T: serde::de::DeserializeOwned>(v: Value) -> T {
    serde_json::from_value(v).expect("valid fixture")
}

fn page_index(cursor: &Cursor) -> usize {
    match cursor {
        Cursor::Start => 0,
        Cursor::Token { token } => token.parse().expect("numeric token"),
        Cursor::Offset { offset, .. } => *offset as usize,
    }
}

fn square_order(id: &str, version: i64, state: &str, req: &OrderRequest) -> Value {
    let lines: Vec<Value> = req
        .line_items
        .iter()
        .map(|l| {
            json!({
                "catalog_object_id": l.catalog_item_id,
                "quantity": l.quantity.to_string(),
                "name": "line",
                "item_type": "ITEM"
            })
        })
        .collect();
    json!({
        "id": id,
        "location_id": req.location_id,
        "state": state,
        "version": version,
        "line_items": lines
    })
}

#[async_trait]
impl PosProvider for FakeProvider {
    async fn fetch_catalog_page(
        &self,
        cursor: &Cursor,
        _since: Option<DateTime<Utc>>,
    ) -> Result<CatalogPage, ProviderError> {
        let mut s = self.state.lock().unwrap();
        s.catalog_calls += 1;
        if s.catalog_timeouts {
            return Err(ProviderError::Timeout);
        }
        let idx = page_index(cursor);
        let objects = s.pages.get(idx).cloned().unwrap_or_default();
        let next = (idx + 1 < s.pages.len()).then(|| Cursor::token((idx + 1).to_string()));
        Ok(CatalogPage {
            objects: CatalogObjects::Square(objects.into_iter().map(decode).collect()),
            next,
        })
    }

    async fn fetch_catalog_item(&self, item_id: &str) -> Result<CatalogPage, ProviderError> {
        let s = self.state.lock().unwrap();
        let objects = s.items.get(item_id).cloned().unwrap_or_default();
        Ok(CatalogPage {
            objects: CatalogObjects::Square(objects.into_iter().map(decode).collect()),
            next: None,
        })
    }

    async fn fetch_category(
        &self,
        category_id: &str,
    ) -> Result<Option<ProviderCategory>, ProviderError> {
        let s = self.state.lock().unwrap();
        Ok(s.categories.get(category_id).map(|name| ProviderCategory {
            id: category_id.to_string(),
            name: name.clone(),
        }))
    }

    async fn get_stock(&self, item_id: &str, location_id: &str) -> Result<i64, ProviderError> {
        let s = self.state.lock().unwrap();
        Ok(s
            .stock
            .get(&(item_id.to_string(), location_id.to_string()))
            .copied()
            .unwrap_or(0))
    }

    async fn fetch_order(&self, order_id: &str) -> Result<ProviderOrder, ProviderError> {
        let mut s = self.state.lock().unwrap();
        s.order_fetches += 1;
        if s.order_timeouts > 0 {
            s.order_timeouts -= 1;
            return Err(ProviderError::Timeout);
        }
        let order = s.orders.get(order_id).cloned().ok_or_else(|| ProviderError::Api {
            status_code: 404,
            message: format!("order {order_id} not found"),
        })?;
        Ok(ProviderOrder::Square(decode(order)))
    }

    async fn list_orders(
        &self,
        _location_ids: &[String],
        cursor: &Cursor,
    ) -> Result<OrderPage, ProviderError> {
        let s = self.state.lock().unwrap();
        let orders = if *cursor == Cursor::Start {
            let mut ids: Vec<&String> = s.orders.keys().collect();
            ids.sort();
            ids.into_iter()
                .map(|id| ProviderOrder::Square(decode(s.orders[id].clone())))
                .collect()
        } else {
            Vec::new()
        };
        Ok(OrderPage { orders, next: None })
    }

    async fn create_order(&self, request: &OrderRequest) -> Result<ProviderOrder, ProviderError> {
        let mut s = self.state.lock().unwrap();
        s.next_order += 1;
        let id = format!("ORD-{}", s.next_order);
        let order = square_order(&id, 1, "OPEN", request);
        s.orders.insert(id, order.clone());
        s.created.push(request.clone());
        Ok(ProviderOrder::Square(decode(order)))
    }

    async fn update_order(
        &self,
        order_id: &str,
        request: &OrderRequest,
    ) -> Result<ProviderOrder, ProviderError> {
        let mut s = self.state.lock().unwrap();
        if s.reject_versions {
            return Err(ProviderError::VersionConflict("VERSION_MISMATCH".into()));
        }
        let version = request.version.unwrap_or(0) + 1;
        let state = match request.state {
            OrderState::Open => "OPEN",
            OrderState::Canceled => "CANCELED",
        };
        let order = square_order(order_id, version, state, request);
        s.orders.insert(order_id.to_string(), order.clone());
        s.updated.push((order_id.to_string(), request.clone()));
        Ok(ProviderOrder::Square(decode(order)))
    }

    async fn delete_order(&self, order_id: &str, version: Option<i64>) -> Result<(), ProviderError> {
        let mut s = self.state.lock().unwrap();
        if s.reject_versions {
            return Err(ProviderError::VersionConflict("VERSION_MISMATCH".into()));
        }
        s.deleted.push((order_id.to_string(), version));
        Ok(())
    }

    async fn fetch_customers(&self, cursor: &Cursor) -> Result<CustomerPage, ProviderError> {
        let s = self.state.lock().unwrap();
        let customers = if *cursor == Cursor::Start {
            s.customers
                .iter()
                .cloned()
                .map(|c| ProviderCustomer::Square(decode(c)))
                .collect()
        } else {
            Vec::new()
        };
        Ok(CustomerPage {
            customers,
            next: None,
        })
    }

    async fn fetch_customer(&self, customer_id: &str) -> Result<ProviderCustomer, ProviderError> {
        let s = self.state.lock().unwrap();
        s.customers
            .iter()
            .find(|c| c["id"] == customer_id)
            .cloned()
            .map(|c| ProviderCustomer::Square(decode(c)))
            .ok_or_else(|| ProviderError::Api {
                status_code: 404,
                message: format!("customer {customer_id} not found"),
            })
    }

    async fn fetch_locations(&self) -> Result<Vec<ProviderLocation>, ProviderError> {
        let s = self.state.lock().unwrap();
        Ok(s.locations
            .iter()
            .cloned()
            .map(|l| ProviderLocation::Square(decode(l)))
            .collect())
    }
}

/// OAuth client issuing sequential tokens.
#[derive(Default)]
pub struct FakeOAuth {
    pub healthy: Mutex<bool>,
    pub issued: Mutex<u32>,
}

impl FakeOAuth {
    pub fn healthy() -> Arc<Self> {
        Arc::new(Self {
            healthy: Mutex::new(true),
            issued: Mutex::new(0),
        })
    }

    fn grant(&self, merchant_id: Option<&str>) -> TokenGrant {
        let mut issued = self.issued.lock().unwrap();
        *issued += 1;
        TokenGrant {
            access_token: SecretString::from(format!("access-{issued}")),
            refresh_token: Some(SecretString::from(format!("refresh-{issued}"))),
            token_type: "bearer".into(),
            expires_at: Utc::now() + Duration::days(30),
            merchant_id: merchant_id.map(str::to_string),
        }
    }
}

#[async_trait]
impl OAuthClient for FakeOAuth {
    async fn exchange_code(
        &self,
        _code: &str,
        merchant_id: Option<&str>,
    ) -> Result<TokenGrant, ProviderError> {
        Ok(self.grant(merchant_id.or(Some("M-SQ"))))
    }

    async fn refresh(&self, _refresh_token: &SecretString) -> Result<TokenGrant, ProviderError> {
        Ok(self.grant(None))
    }

    async fn health_check(
        &self,
        _access_token: &SecretString,
        _merchant_id: Option<&str>,
    ) -> Result<bool, ProviderError> {
        Ok(*self.healthy.lock().unwrap())
    }
}

pub struct FakeFactory {
    pub provider: Arc<FakeProvider>,
    pub oauth: Arc<FakeOAuth>,
}

impl ProviderFactory for FakeFactory {
    fn provider(
        &self,
        _retailer: &Retailer,
        _credentials: &Credentials,
    ) -> SyncResult<Arc<dyn PosProvider>> {
        Ok(self.provider.clone())
    }

    fn oauth(&self, _retailer: &Retailer) -> SyncResult<Arc<dyn OAuthClient>> {
        Ok(self.oauth.clone())
    }
}

/// Engine context backed by `provider`, with retries that do not sleep.
pub fn test_context(provider: Arc<FakeProvider>) -> SyncContext {
    let mut config = SyncConfig::default();
    config.jobs.retry_delay_secs = 0;
    SyncContext::new(
        config,
        Arc::new(FakeFactory {
            provider,
            oauth: FakeOAuth::healthy(),
        }),
        Arc::new(SqliteCredentialStore),
    )
}

// ---------------------------------------------------------------------------
// Seeds and fixtures
// ---------------------------------------------------------------------------

pub const MERCHANT: &str = "M-SQ";

/// An approved Square retailer for `merchant_id` holding a token issued at `issued_at`.
pub fn seed_merchant(
    conn: &mut SqliteConnection,
    merchant_id: &str,
    issued_at: DateTime<Utc>,
) -> Retailer {
    let retailer = retailers::create_retailer(
        conn,
        &NewRetailer {
            name: "Corner Shop",
            origin: Origin::Square,
            app_id: "sq-app",
            app_secret: "sq-secret",
            merchant_id: None,
        },
    )
    .expect("create retailer");
    let grant = TokenGrant {
        access_token: SecretString::from("access-0".to_string()),
        refresh_token: Some(SecretString::from("refresh-0".to_string())),
        token_type: "bearer".into(),
        expires_at: issued_at + Duration::days(30),
        merchant_id: Some(merchant_id.into()),
    };
    SqliteCredentialStore
        .set(conn, retailer.id, &grant, issued_at, None)
        .expect("store token");
    retailers::approve(conn, retailer.id, merchant_id).expect("approve")
}

pub fn seed_retailer_at(conn: &mut SqliteConnection, issued_at: DateTime<Utc>) -> Retailer {
    seed_merchant(conn, MERCHANT, issued_at)
}

pub fn seed_retailer(conn: &mut SqliteConnection) -> Retailer {
    seed_retailer_at(conn, Utc::now())
}

pub fn seed_location(conn: &mut SqliteConnection, retailer_id: i32, pos_id: &str) -> Location {
    locations::upsert_location(
        conn,
        retailer_id,
        &CanonicalLocation {
            pos_id: pos_id.to_string(),
            name: format!("Store {pos_id}"),
            address1: None,
            address2: None,
            city: None,
            state: None,
            zip_code: None,
            country: None,
        },
    )
    .expect("location")
}

/// Square ITEM with one variation per `(variation id, price in cents)`.
pub fn square_item(id: &str, name: &str, variations: &[(&str, i64)]) -> Value {
    let variations: Vec<Value> = variations
        .iter()
        .map(|(vid, cents)| {
            json!({
                "type": "ITEM_VARIATION",
                "id": vid,
                "item_variation_data": {
                    "item_id": id,
                    "name": format!("{name} {vid}"),
                    "price_money": {"amount": cents, "currency": "USD"}
                }
            })
        })
        .collect();
    json!({
        "type": "ITEM",
        "id": id,
        "present_at_all_locations": true,
        "item_data": {
            "name": name,
            "description": format!("{name} description"),
            "variations": variations
        }
    })
}

pub fn deleted_object(id: &str, object_type: &str) -> Value {
    json!({"type": object_type, "id": id, "is_deleted": true})
}
