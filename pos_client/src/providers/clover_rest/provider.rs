use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{
    Method, StatusCode,
    header::{self, HeaderMap, HeaderValue},
};

use crate::{
    credentials::AccessToken,
    models::{
        CatalogObjects, CatalogPage, Cursor, CustomerPage, OrderPage, OrderRequest,
        ProviderCategory, ProviderCustomer, ProviderLocation, ProviderOrder,
    },
    providers::{
        ClientSettings, PosProvider,
        clover_rest::{
            CUSTOMER_EXPAND, ITEM_EXPAND, ORDER_EXPAND,
            params::{BulkLineItemsBody, atomic_order_body, expand_lines},
            response::{Category, Customer, ErrorBody, Item, ItemStock, ListResponse, Merchant, Order},
        },
        errors::{ProviderError, ProviderInitError},
        http::{self, HttpCore},
    },
    rate_limit::RateLimit,
};

pub struct CloverProvider {
    http: HttpCore,
    merchant_id: String,
    page_limit: u32,
}

impl CloverProvider {
    /// Creates a client for merchant `merchant_id`.
    ///
    /// Pass the merchant's shared [`RateLimit`]; `None` falls back to a
    /// private limiter with Clover's default budget.
    pub fn new(
        settings: &ClientSettings,
        merchant_id: &str,
        token: Arc<AccessToken>,
        limiter: Option<Arc<RateLimit>>,
    ) -> Result<Self, ProviderInitError> {
        if merchant_id.trim().is_empty() {
            return Err(ProviderInitError::MissingCredential("clover merchant id"));
        }
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        let client = http::build_client(settings.timeout, headers)?;
        Ok(Self {
            http: HttpCore {
                client,
                base_url: settings.base_url.trim_end_matches('/').to_string(),
                token,
                limiter: Some(limiter.unwrap_or_else(|| Arc::new(RateLimit::clover_default()))),
                classify: classify_error,
            },
            merchant_id: merchant_id.to_string(),
            page_limit: settings.page_limit.max(1),
        })
    }

    fn path(&self, rest: &str) -> String {
        format!("/v3/merchants/{}{}", self.merchant_id, rest)
    }

    fn offset_of(&self, cursor: &Cursor) -> (u32, u32) {
        match cursor {
            Cursor::Offset { offset, limit } => (*offset, *limit),
            _ => (0, self.page_limit),
        }
    }

    async fn list<T: serde::de::DeserializeOwned>(
        &self,
        rest: &str,
        expand: &str,
        cursor: &Cursor,
        filter: Option<String>,
    ) -> Result<(Vec<T>, Option<Cursor>), ProviderError> {
        let (offset, limit) = self.offset_of(cursor);
        let mut req = self.http.request(Method::GET, &self.path(rest)).query(&[
            ("expand", expand.to_string()),
            ("offset", offset.to_string()),
            ("limit", limit.to_string()),
        ]);
        if let Some(filter) = filter {
            req = req.query(&[("filter", filter)]);
        }
        let resp: ListResponse<T> = self.http.json(req).await?;
        let next = Cursor::next_offset(offset, limit, resp.elements.len());
        Ok((resp.elements, next))
    }

    async fn get_order(&self, order_id: &str) -> Result<Order, ProviderError> {
        let req = self
            .http
            .request(Method::GET, &self.path(&format!("/orders/{order_id}")))
            .query(&[("expand", ORDER_EXPAND)]);
        self.http.json(req).await
    }
}

pub(crate) fn classify_error(status: StatusCode, body: &str) -> ProviderError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .unwrap_or_else(|| body.to_string());
    if status == StatusCode::UNAUTHORIZED {
        ProviderError::AuthExpired(message)
    } else {
        ProviderError::Api {
            status_code: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl PosProvider for CloverProvider {
    async fn fetch_catalog_page(
        &self,
        cursor: &Cursor,
        since: Option<DateTime<Utc>>,
    ) -> Result<CatalogPage, ProviderError> {
        let filter = since.map(|t| format!("modifiedTime>={}", t.timestamp_millis()));
        let (items, next) = self.list::<Item>("/items", ITEM_EXPAND, cursor, filter).await?;
        Ok(CatalogPage {
            objects: CatalogObjects::Clover(items),
            next,
        })
    }

    async fn fetch_catalog_item(&self, item_id: &str) -> Result<CatalogPage, ProviderError> {
        let req = self
            .http
            .request(Method::GET, &self.path(&format!("/items/{item_id}")))
            .query(&[("expand", ITEM_EXPAND)]);
        let item: Item = self.http.json(req).await?;
        Ok(CatalogPage {
            objects: CatalogObjects::Clover(vec![item]),
            next: None,
        })
    }

    async fn fetch_category(
        &self,
        category_id: &str,
    ) -> Result<Option<ProviderCategory>, ProviderError> {
        let req = self
            .http
            .request(Method::GET, &self.path(&format!("/categories/{category_id}")));
        match self.http.json::<Category>(req).await {
            Ok(c) => Ok(Some(ProviderCategory {
                name: c.name.unwrap_or_default(),
                id: c.id,
            })),
            Err(ProviderError::Api {
                status_code: 404, ..
            }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn get_stock(&self, item_id: &str, _location_id: &str) -> Result<i64, ProviderError> {
        let req = self
            .http
            .request(Method::GET, &self.path(&format!("/item_stocks/{item_id}")));
        let stock: ItemStock = self.http.json(req).await?;
        Ok(stock.units().unwrap_or(0))
    }

    async fn fetch_order(&self, order_id: &str) -> Result<ProviderOrder, ProviderError> {
        Ok(ProviderOrder::Clover(self.get_order(order_id).await?))
    }

    async fn list_orders(
        &self,
        _location_ids: &[String],
        cursor: &Cursor,
    ) -> Result<OrderPage, ProviderError> {
        let (orders, next) = self.list::<Order>("/orders", ORDER_EXPAND, cursor, None).await?;
        Ok(OrderPage {
            orders: orders.into_iter().map(ProviderOrder::Clover).collect(),
            next,
        })
    }

    async fn create_order(&self, request: &OrderRequest) -> Result<ProviderOrder, ProviderError> {
        let req = self
            .http
            .request(Method::POST, &self.path("/atomic_order/orders"))
            .json(&atomic_order_body(request));
        let created: Order = self.http.json(req).await?;
        // The atomic endpoint answers without expansions.
        self.fetch_order(&created.id).await
    }

    async fn update_order(
        &self,
        order_id: &str,
        request: &OrderRequest,
    ) -> Result<ProviderOrder, ProviderError> {
        let current = self.get_order(order_id).await?;
        let existing: Vec<String> = current
            .line_items
            .map(|l| l.into_vec().into_iter().map(|li| li.id).collect())
            .unwrap_or_default();

        if !existing.is_empty() {
            let req = self
                .http
                .request(Method::DELETE, &self.path(&format!("/orders/{order_id}/line_items")))
                .query(&[("lineItemIds", existing.join(","))]);
            self.http.send(req).await?;
        }

        let lines = expand_lines(request);
        if !lines.is_empty() {
            let req = self
                .http
                .request(Method::POST, &self.path(&format!("/orders/{order_id}/bulk_line_items")))
                .json(&BulkLineItemsBody { items: lines });
            self.http.send(req).await?;
        }

        self.fetch_order(order_id).await
    }

    async fn delete_order(&self, order_id: &str, _version: Option<i64>) -> Result<(), ProviderError> {
        let req = self
            .http
            .request(Method::DELETE, &self.path(&format!("/orders/{order_id}")));
        self.http.send(req).await?;
        Ok(())
    }

    async fn fetch_customers(&self, cursor: &Cursor) -> Result<CustomerPage, ProviderError> {
        let (customers, next) = self
            .list::<Customer>("/customers", CUSTOMER_EXPAND, cursor, None)
            .await?;
        Ok(CustomerPage {
            customers: customers.into_iter().map(ProviderCustomer::Clover).collect(),
            next,
        })
    }

    async fn fetch_customer(&self, customer_id: &str) -> Result<ProviderCustomer, ProviderError> {
        let req = self
            .http
            .request(Method::GET, &self.path(&format!("/customers/{customer_id}")))
            .query(&[("expand", CUSTOMER_EXPAND)]);
        Ok(ProviderCustomer::Clover(self.http.json(req).await?))
    }

    async fn fetch_locations(&self) -> Result<Vec<ProviderLocation>, ProviderError> {
        let req = self
            .http
            .request(Method::GET, &self.path(""))
            .query(&[("expand", "address")]);
        let merchant: Merchant = self.http.json(req).await?;
        Ok(vec![ProviderLocation::Clover(merchant)])
    }
}
