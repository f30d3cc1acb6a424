use std::collections::HashMap;

use diesel::SqliteConnection;
use pos_client::{
    PosProvider,
    models::{Cursor, ProviderOrder},
};

use crate::{
    canonical::CanonicalOrder,
    context::SyncContext,
    customers,
    error::{SyncError, SyncResult},
    inventory,
    mapper,
    models::{Order, Retailer},
    orders::resolve_status,
    repo::{
        catalog, customers as customer_repo, locations,
        orders::{self, NewOrderItem, OrderRow},
    },
    tz,
};

/// Name of order lines whose catalog item cannot be resolved locally.
pub const UNKNOWN_ITEM_NAME: &str = "Unknown item";

/// Fetch an order from the provider and reconcile the local copy.
pub async fn reconcile_order(
    ctx: &SyncContext,
    conn: &mut SqliteConnection,
    retailer_id: i32,
    order_id: &str,
) -> SyncResult<Order> {
    let (retailer, provider) = ctx.connect(conn, retailer_id)?;
    let remote = provider.fetch_order(order_id).await?;
    reconcile_payload(conn, &retailer, provider.as_ref(), &remote).await
}

// Local variant id per provider catalog id; unknown items are synced on demand first.
async fn resolve_variants(
    conn: &mut SqliteConnection,
    retailer: &Retailer,
    provider: &dyn PosProvider,
    mapped: &CanonicalOrder,
) -> SyncResult<HashMap<String, i32>> {
    let location = mapped.location_id.as_deref();
    let mut resolved = HashMap::new();
    for catalog_id in mapped
        .line_items
        .iter()
        .filter_map(|l| l.catalog_item_id.as_deref())
    {
        if resolved.contains_key(catalog_id) {
            continue;
        }
        let mut found = catalog::find_retailer_variant(conn, retailer.id, catalog_id, location)?;
        if found.is_none() {
            match inventory::ingest_item(conn, retailer, provider, catalog_id).await {
                Ok(_) => {
                    found = catalog::find_retailer_variant(conn, retailer.id, catalog_id, location)?
                }
                Err(e) => tracing::warn!(
                    retailer_id = retailer.id,
                    catalog_id,
                    error = %e,
                    "on-demand item sync failed"
                ),
            }
        }
        match found {
            Some(variant) => {
                resolved.insert(catalog_id.to_string(), variant.id);
            }
            None => tracing::warn!(
                retailer_id = retailer.id,
                order_id = %mapped.origin_id,
                catalog_id,
                "order line references an unknown item"
            ),
        }
    }
    Ok(resolved)
}

async fn resolve_customer(
    conn: &mut SqliteConnection,
    retailer: &Retailer,
    provider: &dyn PosProvider,
    customer_origin_id: Option<&str>,
) -> SyncResult<Option<i32>> {
    let Some(origin_id) = customer_origin_id else {
        return Ok(None);
    };
    if let Some(customer) = customer_repo::find_customer(conn, origin_id)? {
        return Ok(Some(customer.id));
    }
    match customers::fetch_and_store(conn, retailer, provider, origin_id).await {
        Ok(customer) => Ok(Some(customer.id)),
        Err(e) => {
            tracing::warn!(retailer_id = retailer.id, customer_id = origin_id, error = %e, "order customer not stored");
            Ok(None)
        }
    }
}

/// Reconcile a provider order already in hand (webhook payload or poll result).
///
/// Lines are replaced wholesale; lines whose item cannot be resolved are kept
/// as custom "unknown item" lines.
pub async fn reconcile_payload(
    conn: &mut SqliteConnection,
    retailer: &Retailer,
    provider: &dyn PosProvider,
    order: &ProviderOrder,
) -> SyncResult<Order> {
    let mapped = mapper::map_order(order);
    let variants = resolve_variants(conn, retailer, provider, &mapped).await?;
    let customer_id =
        resolve_customer(conn, retailer, provider, mapped.customer_origin_id.as_deref()).await?;
    let order_time = mapped.ordered_at.map(tz::to_rfc3339_millis);

    let saved = conn.immediate_transaction::<_, SyncError, _>(|conn| {
        let existing = orders::find_by_origin(conn, &mapped.origin_id)?;
        let status = resolve_status(existing.as_ref().map(|o| o.status.as_str()), &mapped.state);
        let version = match (&existing, mapped.version) {
            (Some(current), Some(v)) => v.max(current.version),
            (Some(current), None) => current.version,
            (None, v) => v.unwrap_or(1),
        };
        let row = OrderRow {
            retailer_id: retailer.id,
            origin_id: Some(&mapped.origin_id),
            location_pos_id: mapped
                .location_id
                .as_deref()
                .or(existing.as_ref().and_then(|o| o.location_pos_id.as_deref())),
            status: status.as_str(),
            version,
            subtotal: mapped.subtotal.0,
            tax: mapped.tax.0,
            total: mapped.total.0,
            currency: &mapped.currency,
            quantity: mapped.quantity(),
            customer_id: customer_id.or(existing.as_ref().and_then(|o| o.customer_id)),
            shopper_id: existing.as_ref().and_then(|o| o.shopper_id.as_deref()),
            variant_id: existing.as_ref().and_then(|o| o.variant_id),
            time_limit: existing.as_ref().and_then(|o| o.time_limit.as_deref()),
            order_time: order_time
                .as_deref()
                .or(existing.as_ref().and_then(|o| o.order_time.as_deref())),
        };
        let saved = match &existing {
            Some(current) => orders::overwrite_order(conn, current.id, &row)?,
            None => orders::insert_order(conn, &row)?,
        };

        let lines: Vec<NewOrderItem<'_>> = mapped
            .line_items
            .iter()
            .map(|line| {
                let variant_id = line
                    .catalog_item_id
                    .as_deref()
                    .and_then(|id| variants.get(id).copied());
                let is_custom = variant_id.is_none();
                NewOrderItem {
                    order_id: saved.id,
                    variant_id,
                    name: if is_custom && line.catalog_item_id.is_some() {
                        UNKNOWN_ITEM_NAME
                    } else {
                        &line.name
                    },
                    quantity: line.quantity,
                    unit_price: line.unit_price.0,
                    variation_total: line.variation_total.0,
                    tax: line.tax.0,
                    total_price: line.total_price.0,
                    is_custom,
                }
            })
            .collect();
        orders::replace_items(conn, saved.id, &lines)?;
        orders::upsert_pickups(conn, saved.id, &mapped.pickups)?;
        Ok(saved)
    })?;

    tracing::info!(
        retailer_id = retailer.id,
        order_id = saved.id,
        origin_id = %mapped.origin_id,
        status = %saved.status,
        lines = mapped.line_items.len(),
        "order reconciled"
    );
    Ok(saved)
}

/// Counters of one [`sync_orders`] poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOrdersReport {
    pub reconciled: usize,
    pub failed: usize,
}

/// Poll the provider's orders for the retailer's locations and reconcile each.
///
/// A failing order is logged and skipped; the others still go through.
pub async fn sync_orders(
    ctx: &SyncContext,
    conn: &mut SqliteConnection,
    retailer_id: i32,
) -> SyncResult<SyncOrdersReport> {
    let (retailer, provider) = ctx.connect(conn, retailer_id)?;
    let location_ids: Vec<String> = locations::list_locations(conn, retailer_id)?
        .into_iter()
        .map(|l| l.pos_id)
        .collect();

    let mut report = SyncOrdersReport::default();
    let mut cursor = Cursor::Start;
    loop {
        let page = provider.list_orders(&location_ids, &cursor).await?;
        if page.orders.is_empty() {
            break;
        }
        for order in &page.orders {
            match reconcile_payload(conn, &retailer, provider.as_ref(), order).await {
                Ok(_) => report.reconciled += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(retailer_id, order_id = order.id(), error = %e, "order not reconciled");
                }
            }
        }
        match page.next {
            Some(next) => cursor = next,
            None => break,
        }
    }
    tracing::info!(retailer_id, reconciled = report.reconciled, failed = report.failed, "orders synced");
    Ok(report)
}
