use chrono::{Duration, Utc};
use diesel::SqliteConnection;
use pos_client::models::{OrderLineRequest, OrderRequest, OrderState, PickupRequest};

use crate::{
    canonical::CanonicalOrder,
    context::SyncContext,
    error::{SyncError, SyncResult},
    mapper,
    models::{Order, Variant},
    money::Cents,
    orders::OrderStatus,
    repo::{
        catalog, customers, expiry,
        orders::{self, NewOrderItem, OrderChange, OrderRow},
    },
    tz,
};

/// A reservation requested at checkout, before anything is sent or stored.
#[derive(Debug, Clone)]
pub struct ReservationDraft {
    pub retailer_id: i32,
    pub variant_id: i32,
    pub quantity: i64,
    /// Opaque marketplace user id.
    pub shopper_id: Option<String>,
    pub customer_id: Option<i32>,
    pub pickup: Option<PickupRequest>,
}

fn validate_quantity(quantity: i64) -> SyncResult<()> {
    if quantity < 1 {
        return Err(SyncError::Validation(format!(
            "quantity must be at least 1, got {quantity}"
        )));
    }
    Ok(())
}

fn check_version(order: &Order, expected: i64) -> SyncResult<()> {
    if order.version != expected {
        return Err(SyncError::VersionConflict {
            expected,
            found: Some(order.version),
        });
    }
    Ok(())
}

fn require_reserved(order: &Order) -> SyncResult<&str> {
    if OrderStatus::parse(&order.status) != OrderStatus::Reserved {
        return Err(SyncError::Validation(format!(
            "order {} is {}, not an active reservation",
            order.id, order.status
        )));
    }
    order
        .origin_id
        .as_deref()
        .ok_or_else(|| SyncError::Validation(format!("order {} has no provider id", order.id)))
}

fn line_for(order_id: i32, variant: &Variant, quantity: i64) -> NewOrderItem<'_> {
    let total = variant.price * quantity;
    NewOrderItem {
        order_id,
        variant_id: Some(variant.id),
        name: &variant.name,
        quantity,
        unit_price: variant.price,
        variation_total: total,
        tax: 0,
        total_price: total,
        is_custom: false,
    }
}

// Provider totals when it reports them, otherwise the variant price times quantity.
fn totals(mapped: &CanonicalOrder, variant: &Variant, quantity: i64) -> (Cents, Cents, Cents) {
    if mapped.total == Cents::ZERO {
        let subtotal = Cents(variant.price * quantity);
        (subtotal, Cents::ZERO, subtotal)
    } else {
        (mapped.subtotal, mapped.tax, mapped.total)
    }
}

/// Reserve stock on the provider and persist the reservation.
///
/// Nothing is stored unless the provider accepted the order; the reservation
/// row and its expiry task are written in one transaction. Errors are returned
/// to the caller and never retried.
pub async fn create_reservation(
    ctx: &SyncContext,
    conn: &mut SqliteConnection,
    draft: &ReservationDraft,
) -> SyncResult<Order> {
    validate_quantity(draft.quantity)?;
    let (variant, location) = catalog::variant_with_location(conn, draft.variant_id)?;
    if location.retailer_id != draft.retailer_id {
        return Err(SyncError::Validation(format!(
            "variant {} does not belong to retailer {}",
            variant.id, draft.retailer_id
        )));
    }
    if variant.stock < draft.quantity {
        return Err(SyncError::Validation(format!(
            "insufficient stock for variant {}: {} requested, {} available",
            variant.id, draft.quantity, variant.stock
        )));
    }
    let customer = draft
        .customer_id
        .map(|id| customers::get_customer(conn, id))
        .transpose()?;

    let request = OrderRequest {
        location_id: location.pos_id.clone(),
        line_items: vec![OrderLineRequest {
            catalog_item_id: variant.origin_id.clone(),
            quantity: draft.quantity,
        }],
        customer_id: customer.as_ref().map(|c| c.origin_id.clone()),
        state: OrderState::Open,
        version: None,
        pickup: draft.pickup.clone(),
        reference_id: None,
    };
    tracing::debug!(retailer_id = draft.retailer_id, variant_id = variant.id, status = %OrderStatus::Created, "submitting reservation");

    let (_, provider) = ctx.connect(conn, draft.retailer_id)?;
    let remote = provider.create_order(&request).await?;
    let mapped = mapper::map_order(&remote);
    tracing::debug!(retailer_id = draft.retailer_id, order_id = %mapped.origin_id, status = %OrderStatus::Submitted, "reservation accepted by provider");

    let now = Utc::now();
    let time_limit = tz::to_rfc3339_millis(
        now + Duration::minutes(ctx.config.reservations.time_limit_minutes),
    );
    let order_time = tz::to_rfc3339_millis(now);
    let (subtotal, tax, total) = totals(&mapped, &variant, draft.quantity);

    let saved = conn.immediate_transaction::<_, SyncError, _>(|conn| {
        let order = orders::insert_order(
            conn,
            &OrderRow {
                retailer_id: draft.retailer_id,
                origin_id: Some(&mapped.origin_id),
                location_pos_id: Some(&location.pos_id),
                status: OrderStatus::Reserved.as_str(),
                version: mapped.version.unwrap_or(1),
                subtotal: subtotal.0,
                tax: tax.0,
                total: total.0,
                currency: &variant.currency,
                quantity: draft.quantity,
                customer_id: customer.as_ref().map(|c| c.id),
                shopper_id: draft.shopper_id.as_deref(),
                variant_id: Some(variant.id),
                time_limit: Some(&time_limit),
                order_time: Some(&order_time),
            },
        )?;
        orders::replace_items(conn, order.id, &[line_for(order.id, &variant, draft.quantity)])?;
        expiry::schedule(conn, order.id, &time_limit)?;
        Ok(order)
    });

    match saved {
        Ok(order) => {
            tracing::info!(
                retailer_id = draft.retailer_id,
                order_id = order.id,
                origin_id = %mapped.origin_id,
                status = %OrderStatus::Reserved,
                "reservation created"
            );
            Ok(order)
        }
        Err(e) => {
            tracing::error!(
                retailer_id = draft.retailer_id,
                origin_id = %mapped.origin_id,
                error = %e,
                "reservation not stored; cancelling provider order"
            );
            if let Err(cancel) = provider.delete_order(&mapped.origin_id, mapped.version).await {
                tracing::error!(origin_id = %mapped.origin_id, error = %cancel, "provider order left open");
            }
            Err(e)
        }
    }
}

/// Change the reserved quantity.
pub async fn update_reservation(
    ctx: &SyncContext,
    conn: &mut SqliteConnection,
    order_id: i32,
    expected_version: i64,
    quantity: i64,
) -> SyncResult<Order> {
    validate_quantity(quantity)?;
    let order = orders::get_order(conn, order_id)?;
    check_version(&order, expected_version)?;
    let origin_id = require_reserved(&order)?.to_string();
    let variant_id = order
        .variant_id
        .ok_or_else(|| SyncError::Validation(format!("order {order_id} has no reserved variant")))?;
    let variant = catalog::get_variant(conn, variant_id)?;

    let request = OrderRequest {
        location_id: order.location_pos_id.clone().unwrap_or_default(),
        line_items: vec![OrderLineRequest {
            catalog_item_id: variant.origin_id.clone(),
            quantity,
        }],
        customer_id: None,
        state: OrderState::Open,
        version: Some(expected_version),
        pickup: None,
        reference_id: order.order_code.clone(),
    };
    let (_, provider) = ctx.connect(conn, order.retailer_id)?;
    let remote = provider
        .update_order(&origin_id, &request)
        .await
        .map_err(|e| SyncError::from_versioned_call(e, expected_version))?;
    let mapped = mapper::map_order(&remote);
    let new_version = mapped
        .version
        .map_or(expected_version + 1, |v| v.max(expected_version + 1));
    let (subtotal, tax, total) = totals(&mapped, &variant, quantity);

    let saved = conn.immediate_transaction::<_, SyncError, _>(|conn| {
        let saved = orders::update_versioned(
            conn,
            order_id,
            expected_version,
            new_version,
            &OrderChange {
                quantity: Some(quantity),
                subtotal: Some(subtotal.0),
                tax: Some(tax.0),
                total: Some(total.0),
                ..OrderChange::default()
            },
        )?;
        orders::replace_items(conn, order_id, &[line_for(order_id, &variant, quantity)])?;
        Ok(saved)
    })?;
    tracing::info!(order_id, version = saved.version, quantity, "reservation updated");
    Ok(saved)
}

/// Cancel the provider order and release the reservation.
pub async fn cancel_reservation(
    ctx: &SyncContext,
    conn: &mut SqliteConnection,
    order_id: i32,
    expected_version: i64,
) -> SyncResult<Order> {
    let order = orders::get_order(conn, order_id)?;
    check_version(&order, expected_version)?;
    let origin_id = require_reserved(&order)?.to_string();

    let (_, provider) = ctx.connect(conn, order.retailer_id)?;
    provider
        .delete_order(&origin_id, Some(expected_version))
        .await
        .map_err(|e| SyncError::from_versioned_call(e, expected_version))?;

    let now = tz::now_rfc3339();
    let saved = conn.immediate_transaction::<_, SyncError, _>(|conn| {
        let saved = orders::update_versioned(
            conn,
            order_id,
            expected_version,
            expected_version + 1,
            &OrderChange {
                status: Some(OrderStatus::Cancelled.as_str()),
                ..OrderChange::default()
            },
        )?;
        expiry::mark_fired(conn, order_id, &now)?;
        Ok(saved)
    })?;
    tracing::info!(order_id, version = saved.version, status = %OrderStatus::Cancelled, "reservation cancelled");
    Ok(saved)
}
