//! Clover webhook envelopes.
//!
//! Clover batches events per merchant:
//! `{"appId", "merchants": {"<merchant>": [{"objectId": "I:<id>", "type": "UPDATE", "ts": 1}]}}`.
//! Events carry no id of their own; `objectId:type:ts` identifies one. The
//! first call after registering the endpoint only carries a `verificationCode`.

use std::collections::BTreeMap;

use serde::Deserialize;

use super::{IncomingEvent, WebhookAction, WebhookReject};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    #[serde(default)]
    verification_code: Option<String>,
    #[serde(default)]
    app_id: Option<String>,
    #[serde(default)]
    merchants: BTreeMap<String, Vec<Event>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Event {
    object_id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    ts: Option<i64>,
}

/// A parsed Clover request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Parsed {
    Verification(String),
    Events(Vec<IncomingEvent>),
}

pub(super) fn parse(body: &[u8]) -> Result<Parsed, WebhookReject> {
    let envelope: Envelope =
        serde_json::from_slice(body).map_err(|e| WebhookReject::Malformed(e.to_string()))?;
    if let Some(code) = envelope.verification_code {
        return Ok(Parsed::Verification(code));
    }

    let mut events = Vec::new();
    for (merchant_id, batch) in envelope.merchants {
        for event in batch {
            let (prefix, object_id) = event.object_id.split_once(':').ok_or_else(|| {
                WebhookReject::Malformed(format!("objectId {} has no type prefix", event.object_id))
            })?;
            let action = route(prefix, &event.kind, object_id);
            let ts = event.ts.map(|t| t.to_string()).unwrap_or_default();
            events.push(IncomingEvent {
                merchant_id: merchant_id.clone(),
                app_id: envelope.app_id.clone(),
                event_id: format!("{}:{}:{}", event.object_id, event.kind, ts),
                event_type: format!("{prefix}:{}", event.kind),
                action,
            });
        }
    }
    Ok(Parsed::Events(events))
}

fn route(prefix: &str, kind: &str, object_id: &str) -> WebhookAction {
    let id = object_id.to_string();
    let upsert = matches!(kind, "CREATE" | "UPDATE");
    let delete = kind == "DELETE";
    match prefix {
        "I" if upsert => WebhookAction::SyncItem(id),
        "I" if delete => WebhookAction::DeleteItem(id),
        "IC" if upsert => WebhookAction::UpsertCategory(id),
        "IC" if delete => WebhookAction::DeleteCategory(id),
        "C" if upsert => WebhookAction::UpsertCustomer(id),
        "C" if delete => WebhookAction::DeleteCustomer(id),
        "O" if upsert => WebhookAction::ReconcileOrder(id),
        "M" if kind == "UPDATE" => WebhookAction::RefreshLocations,
        _ => WebhookAction::Ignore,
    }
}
