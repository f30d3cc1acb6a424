//! Square webhook envelopes.
//!
//! Square delivers one event per request:
//! `{"merchant_id", "event_id", "type", "data": {"id", "object": {...}}}`.

use chrono::{DateTime, SubsecRound, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::{IncomingEvent, WebhookAction, WebhookReject};

#[derive(Debug, Deserialize)]
struct Envelope {
    merchant_id: String,
    event_id: String,
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    data: EventData,
}

#[derive(Debug, Default, Deserialize)]
struct EventData {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    object: Value,
}

#[derive(Debug, Deserialize)]
struct InventoryCount {
    catalog_object_id: String,
    location_id: String,
}

pub(super) fn parse(body: &[u8]) -> Result<IncomingEvent, WebhookReject> {
    let envelope: Envelope =
        serde_json::from_slice(body).map_err(|e| WebhookReject::Malformed(e.to_string()))?;
    let action = route(&envelope.event_type, &envelope.data)?;
    Ok(IncomingEvent {
        merchant_id: envelope.merchant_id,
        app_id: None,
        event_id: envelope.event_id,
        event_type: envelope.event_type,
        action,
    })
}

fn malformed(event_type: &str, what: &str) -> WebhookReject {
    WebhookReject::Malformed(format!("{event_type}: missing {what}"))
}

fn route(event_type: &str, data: &EventData) -> Result<WebhookAction, WebhookReject> {
    let object = &data.object;
    let action = match event_type {
        "location.created" | "location.updated" => WebhookAction::RefreshLocations,
        "catalog.version.updated" => {
            let updated_at = object
                .pointer("/catalog_version/updated_at")
                .and_then(Value::as_str)
                .ok_or_else(|| malformed(event_type, "catalog_version.updated_at"))?;
            let since = DateTime::parse_from_rfc3339(updated_at)
                .map_err(|e| WebhookReject::Malformed(format!("{event_type}: {e}")))?
                .with_timezone(&Utc)
                .trunc_subsecs(0);
            WebhookAction::CatalogChanged { since }
        }
        "inventory.count.updated" => {
            let counts: Vec<InventoryCount> = object
                .get("inventory_counts")
                .cloned()
                .map(serde_json::from_value)
                .transpose()
                .map_err(|e| WebhookReject::Malformed(format!("{event_type}: {e}")))?
                .unwrap_or_default();
            WebhookAction::StockChanged(
                counts
                    .into_iter()
                    .map(|c| (c.catalog_object_id, c.location_id))
                    .collect(),
            )
        }
        "customer.created" | "customer.updated" | "customer.deleted" => {
            let id = object
                .pointer("/customer/id")
                .and_then(Value::as_str)
                .or(data.id.as_deref())
                .ok_or_else(|| malformed(event_type, "customer id"))?
                .to_string();
            if event_type == "customer.deleted" {
                WebhookAction::DeleteCustomer(id)
            } else {
                WebhookAction::UpsertCustomer(id)
            }
        }
        "order.created" | "order.updated" | "order.fulfillment.updated" => {
            // the object holds a single key such as `order_created`
            let order_id = object
                .as_object()
                .and_then(|o| o.values().next())
                .and_then(|inner| inner.get("order_id"))
                .and_then(Value::as_str)
                .or(data.id.as_deref())
                .ok_or_else(|| malformed(event_type, "order_id"))?;
            WebhookAction::ReconcileOrder(order_id.to_string())
        }
        _ => WebhookAction::Ignore,
    };
    Ok(action)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn event(event_type: &str, object: Value) -> Vec<u8> {
        json!({
            "merchant_id": "M1",
            "event_id": "evt-1",
            "type": event_type,
            "data": {"type": "x", "id": "obj-1", "object": object}
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn catalog_version_truncates_to_seconds() {
        let parsed = parse(&event(
            "catalog.version.updated",
            json!({"catalog_version": {"updated_at": "2024-05-01T10:20:30.456Z"}}),
        ))
        .unwrap();
        assert_eq!(parsed.merchant_id, "M1");
        assert_eq!(
            parsed.action,
            WebhookAction::CatalogChanged {
                since: Utc.with_ymd_and_hms(2024, 5, 1, 10, 20, 30).unwrap()
            }
        );
    }

    #[test]
    fn inventory_counts_become_stock_updates() {
        let parsed = parse(&event(
            "inventory.count.updated",
            json!({"inventory_counts": [
                {"catalog_object_id": "V1", "location_id": "L1", "quantity": "3"},
                {"catalog_object_id": "V2", "location_id": "L2", "quantity": "0"}
            ]}),
        ))
        .unwrap();
        assert_eq!(
            parsed.action,
            WebhookAction::StockChanged(vec![
                ("V1".into(), "L1".into()),
                ("V2".into(), "L2".into())
            ])
        );
    }

    #[test]
    fn order_events_carry_the_order_id() {
        let parsed = parse(&event(
            "order.fulfillment.updated",
            json!({"order_fulfillment_updated": {"order_id": "O-9", "version": 4}}),
        ))
        .unwrap();
        assert_eq!(parsed.action, WebhookAction::ReconcileOrder("O-9".into()));
    }

    #[test]
    fn customer_deleted_routes_to_delete() {
        let parsed = parse(&event(
            "customer.deleted",
            json!({"customer": {"id": "C-1"}}),
        ))
        .unwrap();
        assert_eq!(parsed.action, WebhookAction::DeleteCustomer("C-1".into()));
    }

    #[test]
    fn unknown_types_are_ignored_and_garbage_rejected() {
        let parsed = parse(&event("payment.updated", json!({}))).unwrap();
        assert_eq!(parsed.action, WebhookAction::Ignore);
        assert!(matches!(
            parse(b"not json"),
            Err(WebhookReject::Malformed(_))
        ));
    }
}
