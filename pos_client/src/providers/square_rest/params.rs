//! Request bodies for the Square endpoints.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{OrderRequest, OrderState};

use super::CATALOG_TYPES;

#[derive(Serialize, Debug)]
pub struct SearchCatalogBody {
    pub object_types: Vec<&'static str>,
    pub include_deleted_objects: bool,
    pub begin_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

impl SearchCatalogBody {
    pub fn changed_since(since: DateTime<Utc>, cursor: Option<String>) -> Self {
        Self {
            object_types: CATALOG_TYPES.split(',').collect(),
            include_deleted_objects: true,
            begin_time: since.to_rfc3339_opts(SecondsFormat::Millis, true),
            cursor,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct BatchInventoryBody<'a> {
    pub catalog_object_ids: [&'a str; 1],
    pub location_ids: [&'a str; 1],
}

#[derive(Serialize, Debug)]
pub struct SearchOrdersBody<'a> {
    pub location_ids: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    pub limit: u32,
}

#[derive(Serialize, Debug)]
pub struct OrderBody {
    pub idempotency_key: String,
    pub order: OrderPayload,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields_to_clear: Vec<&'static str>,
}

#[derive(Serialize, Debug)]
pub struct OrderPayload {
    pub location_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub line_items: Vec<LineItemPayload>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fulfillments: Vec<FulfillmentPayload>,
}

#[derive(Serialize, Debug)]
pub struct LineItemPayload {
    pub catalog_object_id: String,
    /// Square transmits quantities as decimal strings.
    pub quantity: String,
}

#[derive(Serialize, Debug)]
pub struct FulfillmentPayload {
    #[serde(rename = "type")]
    pub fulfillment_type: &'static str,
    pub state: &'static str,
    pub pickup_details: PickupPayload,
}

#[derive(Serialize, Debug)]
pub struct PickupPayload {
    pub recipient: RecipientPayload,
    pub pickup_at: String,
}

#[derive(Serialize, Debug)]
pub struct RecipientPayload {
    pub display_name: String,
}

fn state_code(state: OrderState) -> &'static str {
    match state {
        OrderState::Open => "OPEN",
        OrderState::Canceled => "CANCELED",
    }
}

/// Body for `POST /v2/orders`.
pub fn create_order_body(req: &OrderRequest) -> OrderBody {
    OrderBody {
        idempotency_key: Uuid::new_v4().to_string(),
        order: order_payload(req, false),
        fields_to_clear: Vec::new(),
    }
}

/// Body for `PUT /v2/orders/{id}`. Existing line items are cleared and
/// replaced by the requested ones.
pub fn update_order_body(req: &OrderRequest) -> OrderBody {
    let order = order_payload(req, true);
    let fields_to_clear = if order.line_items.is_empty() {
        Vec::new()
    } else {
        vec!["line_items"]
    };
    OrderBody {
        idempotency_key: Uuid::new_v4().to_string(),
        order,
        fields_to_clear,
    }
}

/// Body cancelling an order at `version`.
pub fn cancel_order_body(location_id: String, version: Option<i64>) -> OrderBody {
    OrderBody {
        idempotency_key: Uuid::new_v4().to_string(),
        order: OrderPayload {
            location_id,
            version,
            state: Some(state_code(OrderState::Canceled)),
            customer_id: None,
            reference_id: None,
            line_items: Vec::new(),
            fulfillments: Vec::new(),
        },
        fields_to_clear: Vec::new(),
    }
}

fn order_payload(req: &OrderRequest, with_version: bool) -> OrderPayload {
    OrderPayload {
        location_id: req.location_id.clone(),
        version: if with_version { req.version } else { None },
        state: Some(state_code(req.state)),
        customer_id: req.customer_id.clone(),
        reference_id: req.reference_id.clone(),
        line_items: req
            .line_items
            .iter()
            .map(|l| LineItemPayload {
                catalog_object_id: l.catalog_item_id.clone(),
                quantity: l.quantity.to_string(),
            })
            .collect(),
        fulfillments: req
            .pickup
            .iter()
            .map(|p| FulfillmentPayload {
                fulfillment_type: "PICKUP",
                state: "PROPOSED",
                pickup_details: PickupPayload {
                    recipient: RecipientPayload {
                        display_name: p.recipient_name.clone(),
                    },
                    pickup_at: p.pickup_at.to_rfc3339_opts(SecondsFormat::Secs, true),
                },
            })
            .collect(),
    }
}
