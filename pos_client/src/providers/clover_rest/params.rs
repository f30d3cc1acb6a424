//! Request bodies for the Clover endpoints.

use serde::Serialize;

use crate::models::OrderRequest;

#[derive(Serialize, Debug)]
pub struct ItemRef {
    pub id: String,
}

/// A line of an atomic order. Clover represents quantity by repeating lines.
#[derive(Serialize, Debug)]
pub struct LineItemPayload {
    pub item: ItemRef,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OrderCart {
    pub line_items: Vec<LineItemPayload>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub customers: Vec<ItemRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AtomicOrderBody {
    pub order_cart: OrderCart,
}

#[derive(Serialize, Debug)]
pub struct BulkLineItemsBody {
    pub items: Vec<LineItemPayload>,
}

/// One line per ordered unit.
pub fn expand_lines(req: &OrderRequest) -> Vec<LineItemPayload> {
    req.line_items
        .iter()
        .flat_map(|l| {
            std::iter::repeat_n(&l.catalog_item_id, l.quantity.max(0) as usize).map(|id| {
                LineItemPayload {
                    item: ItemRef { id: id.clone() },
                }
            })
        })
        .collect()
}

pub fn atomic_order_body(req: &OrderRequest) -> AtomicOrderBody {
    AtomicOrderBody {
        order_cart: OrderCart {
            line_items: expand_lines(req),
            customers: req
                .customer_id
                .iter()
                .map(|id| ItemRef { id: id.clone() })
                .collect(),
            title: req.reference_id.clone(),
        },
    }
}
