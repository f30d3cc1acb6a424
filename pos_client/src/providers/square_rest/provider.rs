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
        errors::{ProviderError, ProviderInitError},
        http::{self, HttpCore},
        square_rest::{
            API_VERSION, CATALOG_TYPES,
            params::{
                BatchInventoryBody, SearchCatalogBody, SearchOrdersBody, cancel_order_body,
                create_order_body, update_order_body,
            },
            response::{
                CatalogListResponse, CatalogObject, CatalogObjectResponse, CustomerResponse,
                ErrorResponse, InventoryCountsResponse, ListCustomersResponse,
                ListLocationsResponse, OrderResponse, SearchOrdersResponse,
            },
        },
    },
};

/// Square error code returned when an order update carries a stale version.
const VERSION_MISMATCH: &str = "VERSION_MISMATCH";

pub struct SquareProvider {
    http: HttpCore,
    page_limit: u32,
}

impl SquareProvider {
    /// Creates a client for one merchant, authenticated with `token`.
    pub fn new(settings: &ClientSettings, token: Arc<AccessToken>) -> Result<Self, ProviderInitError> {
        let mut headers = HeaderMap::new();
        headers.insert("Square-Version", HeaderValue::from_static(API_VERSION));
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        let client = http::build_client(settings.timeout, headers)?;
        Ok(Self {
            http: HttpCore {
                client,
                base_url: settings.base_url.trim_end_matches('/').to_string(),
                token,
                limiter: None,
                classify: classify_error,
            },
            page_limit: settings.page_limit.max(1),
        })
    }

    async fn retrieve_object(&self, object_id: &str) -> Result<CatalogObjectResponse, ProviderError> {
        let req = self
            .http
            .request(Method::GET, &format!("/v2/catalog/object/{object_id}"))
            .query(&[("include_related_objects", "true")]);
        self.http.json(req).await
    }
}

fn token_of(cursor: &Cursor) -> Option<String> {
    match cursor {
        Cursor::Token { token } => Some(token.clone()),
        _ => None,
    }
}

/// Square returns `{ "errors": [{ "category", "code", "detail" }] }` for every failure.
pub(crate) fn classify_error(status: StatusCode, body: &str) -> ProviderError {
    let parsed: ErrorResponse = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .errors
        .iter()
        .filter_map(|e| e.detail.clone().or_else(|| e.code.clone()))
        .collect::<Vec<_>>()
        .join("; ");
    let message = if message.is_empty() {
        body.to_string()
    } else {
        message
    };

    if status == StatusCode::UNAUTHORIZED {
        return ProviderError::AuthExpired(message);
    }
    if parsed
        .errors
        .iter()
        .any(|e| e.code.as_deref() == Some(VERSION_MISMATCH))
    {
        return ProviderError::VersionConflict(message);
    }
    ProviderError::Api {
        status_code: status.as_u16(),
        message,
    }
}

#[async_trait]
impl PosProvider for SquareProvider {
    async fn fetch_catalog_page(
        &self,
        cursor: &Cursor,
        since: Option<DateTime<Utc>>,
    ) -> Result<CatalogPage, ProviderError> {
        let resp: CatalogListResponse = match since {
            None => {
                let mut req = self
                    .http
                    .request(Method::GET, "/v2/catalog/list")
                    .query(&[("types", CATALOG_TYPES)]);
                if let Some(token) = token_of(cursor) {
                    req = req.query(&[("cursor", token)]);
                }
                self.http.json(req).await?
            }
            Some(since) => {
                let body = SearchCatalogBody::changed_since(since, token_of(cursor));
                let req = self
                    .http
                    .request(Method::POST, "/v2/catalog/search")
                    .json(&body);
                self.http.json(req).await?
            }
        };

        Ok(CatalogPage {
            objects: CatalogObjects::Square(resp.objects),
            next: resp.cursor.filter(|c| !c.is_empty()).map(Cursor::token),
        })
    }

    async fn fetch_catalog_item(&self, item_id: &str) -> Result<CatalogPage, ProviderError> {
        let mut resp = self.retrieve_object(item_id).await?;

        // A variation id resolves to its parent item so the whole product is refreshed.
        let parent = resp
            .object
            .as_ref()
            .filter(|o| o.object_type == "ITEM_VARIATION")
            .and_then(|o| o.item_variation_data.as_ref())
            .and_then(|v| v.item_id.clone());
        if let Some(parent_id) = parent {
            resp = self.retrieve_object(&parent_id).await?;
        }

        let mut objects: Vec<CatalogObject> = resp.object.into_iter().collect();
        objects.extend(resp.related_objects);
        Ok(CatalogPage {
            objects: CatalogObjects::Square(objects),
            next: None,
        })
    }

    async fn fetch_category(
        &self,
        category_id: &str,
    ) -> Result<Option<ProviderCategory>, ProviderError> {
        let resp = match self.retrieve_object(category_id).await {
            Ok(resp) => resp,
            Err(ProviderError::Api {
                status_code: 404, ..
            }) => return Ok(None),
            Err(e) => return Err(e),
        };
        Ok(resp.object.filter(|o| !o.is_deleted).map(|o| ProviderCategory {
            name: o
                .category_data
                .and_then(|c| c.name)
                .unwrap_or_default(),
            id: o.id,
        }))
    }

    async fn get_stock(&self, item_id: &str, location_id: &str) -> Result<i64, ProviderError> {
        let body = BatchInventoryBody {
            catalog_object_ids: [item_id],
            location_ids: [location_id],
        };
        let req = self
            .http
            .request(Method::POST, "/v2/inventory/counts/batch-retrieve")
            .json(&body);
        let resp: InventoryCountsResponse = self.http.json(req).await?;

        Ok(resp
            .counts
            .iter()
            .filter(|c| c.state.as_deref().unwrap_or("IN_STOCK") == "IN_STOCK")
            .filter_map(|c| c.quantity.as_deref().and_then(http::parse_quantity))
            .sum())
    }

    async fn fetch_order(&self, order_id: &str) -> Result<ProviderOrder, ProviderError> {
        let req = self.http.request(Method::GET, &format!("/v2/orders/{order_id}"));
        let resp: OrderResponse = self.http.json(req).await?;
        Ok(ProviderOrder::Square(resp.order))
    }

    async fn list_orders(
        &self,
        location_ids: &[String],
        cursor: &Cursor,
    ) -> Result<OrderPage, ProviderError> {
        let body = SearchOrdersBody {
            location_ids,
            cursor: token_of(cursor),
            limit: self.page_limit,
        };
        let req = self.http.request(Method::POST, "/v2/orders/search").json(&body);
        let resp: SearchOrdersResponse = self.http.json(req).await?;
        Ok(OrderPage {
            orders: resp.orders.into_iter().map(ProviderOrder::Square).collect(),
            next: resp.cursor.filter(|c| !c.is_empty()).map(Cursor::token),
        })
    }

    async fn create_order(&self, request: &OrderRequest) -> Result<ProviderOrder, ProviderError> {
        let req = self
            .http
            .request(Method::POST, "/v2/orders")
            .json(&create_order_body(request));
        let resp: OrderResponse = self.http.json(req).await?;
        Ok(ProviderOrder::Square(resp.order))
    }

    async fn update_order(
        &self,
        order_id: &str,
        request: &OrderRequest,
    ) -> Result<ProviderOrder, ProviderError> {
        if request.version.is_none() {
            return Err(ProviderError::Validation(
                "Square order updates require the current order version".into(),
            ));
        }
        let req = self
            .http
            .request(Method::PUT, &format!("/v2/orders/{order_id}"))
            .json(&update_order_body(request));
        let resp: OrderResponse = self.http.json(req).await?;
        Ok(ProviderOrder::Square(resp.order))
    }

    async fn delete_order(&self, order_id: &str, version: Option<i64>) -> Result<(), ProviderError> {
        // Square orders cannot be deleted; they are moved to CANCELED at their
        // location, which the update body must name.
        let ProviderOrder::Square(current) = self.fetch_order(order_id).await? else {
            return Err(ProviderError::Decode("unexpected order shape".into()));
        };
        let location_id = current
            .location_id
            .ok_or_else(|| ProviderError::Decode(format!("order {order_id} has no location")))?;
        let version = version.or(current.version);

        let req = self
            .http
            .request(Method::PUT, &format!("/v2/orders/{order_id}"))
            .json(&cancel_order_body(location_id, version));
        let _: OrderResponse = self.http.json(req).await?;
        Ok(())
    }

    async fn fetch_customers(&self, cursor: &Cursor) -> Result<CustomerPage, ProviderError> {
        let mut req = self
            .http
            .request(Method::GET, "/v2/customers")
            .query(&[("limit", self.page_limit.min(100).to_string())]);
        if let Some(token) = token_of(cursor) {
            req = req.query(&[("cursor", token)]);
        }
        let resp: ListCustomersResponse = self.http.json(req).await?;
        Ok(CustomerPage {
            customers: resp
                .customers
                .into_iter()
                .map(ProviderCustomer::Square)
                .collect(),
            next: resp.cursor.filter(|c| !c.is_empty()).map(Cursor::token),
        })
    }

    async fn fetch_customer(&self, customer_id: &str) -> Result<ProviderCustomer, ProviderError> {
        let req = self
            .http
            .request(Method::GET, &format!("/v2/customers/{customer_id}"));
        let resp: CustomerResponse = self.http.json(req).await?;
        Ok(ProviderCustomer::Square(resp.customer))
    }

    async fn fetch_locations(&self) -> Result<Vec<ProviderLocation>, ProviderError> {
        let req = self.http.request(Method::GET, "/v2/locations");
        let resp: ListLocationsResponse = self.http.json(req).await?;
        Ok(resp
            .locations
            .into_iter()
            .map(ProviderLocation::Square)
            .collect())
    }
}
