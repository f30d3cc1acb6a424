//! Orders, reservations, their lines and pickups.

use diesel::prelude::*;

use crate::{
    canonical::CanonicalPickup,
    error::{SyncError, SyncResult},
    models::{Order, OrderItem, OrderPickup},
    schema::{order_items, order_pickups, orders},
    tz,
};

/// Column values of a new or reconciled order.
#[derive(Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = orders, treat_none_as_null = true)]
pub struct OrderRow<'a> {
    pub retailer_id: i32,
    pub origin_id: Option<&'a str>,
    pub location_pos_id: Option<&'a str>,
    pub status: &'a str,
    pub version: i64,
    pub subtotal: i64,
    pub tax: i64,
    pub total: i64,
    pub currency: &'a str,
    pub quantity: i64,
    pub customer_id: Option<i32>,
    pub shopper_id: Option<&'a str>,
    pub variant_id: Option<i32>,
    pub time_limit: Option<&'a str>,
    pub order_time: Option<&'a str>,
}

/// Marketplace display code of an order, e.g. `#000042`.
pub fn order_code(order_id: i32) -> String {
    format!("#{order_id:06}")
}

/// Insert an order and assign its display code.
pub fn insert_order(conn: &mut SqliteConnection, row: &OrderRow<'_>) -> SyncResult<Order> {
    let id: i32 = diesel::insert_into(orders::table)
        .values(row)
        .returning(orders::id)
        .get_result(conn)?;
    let saved = diesel::update(orders::table.find(id))
        .set(orders::order_code.eq(order_code(id)))
        .returning(Order::as_returning())
        .get_result(conn)?;
    Ok(saved)
}

/// Overwrite every column of `row` on order `order_id`.
pub fn overwrite_order(
    conn: &mut SqliteConnection,
    order_id: i32,
    row: &OrderRow<'_>,
) -> SyncResult<Order> {
    let saved = diesel::update(orders::table.find(order_id))
        .set((row, orders::updated_at.eq(tz::now_rfc3339())))
        .returning(Order::as_returning())
        .get_result(conn)?;
    Ok(saved)
}

pub fn get_order(conn: &mut SqliteConnection, order_id: i32) -> SyncResult<Order> {
    orders::table
        .find(order_id)
        .select(Order::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| SyncError::not_found("order", order_id))
}

pub fn find_by_origin(conn: &mut SqliteConnection, origin_id: &str) -> SyncResult<Option<Order>> {
    let row = orders::table
        .filter(orders::origin_id.eq(origin_id))
        .select(Order::as_select())
        .first(conn)
        .optional()?;
    Ok(row)
}

/// Fields a versioned update may change; `None` leaves the column alone.
#[derive(AsChangeset, Debug, Clone, Default)]
#[diesel(table_name = orders)]
pub struct OrderChange<'a> {
    pub status: Option<&'a str>,
    pub quantity: Option<i64>,
    pub subtotal: Option<i64>,
    pub tax: Option<i64>,
    pub total: Option<i64>,
}

/// Apply `change` only if the stored version is still `expected`, moving it to
/// `new_version`.
///
/// Fails with [`SyncError::VersionConflict`] carrying the current version when
/// another writer got there first.
pub fn update_versioned(
    conn: &mut SqliteConnection,
    order_id: i32,
    expected: i64,
    new_version: i64,
    change: &OrderChange<'_>,
) -> SyncResult<Order> {
    let updated = diesel::update(
        orders::table
            .find(order_id)
            .filter(orders::version.eq(expected)),
    )
    .set((
        change,
        orders::version.eq(new_version),
        orders::updated_at.eq(tz::now_rfc3339()),
    ))
    .returning(Order::as_returning())
    .get_result(conn)
    .optional()?;

    match updated {
        Some(order) => Ok(order),
        None => {
            let found = orders::table
                .find(order_id)
                .select(orders::version)
                .first::<i64>(conn)
                .optional()?;
            match found {
                Some(v) => Err(SyncError::VersionConflict {
                    expected,
                    found: Some(v),
                }),
                None => Err(SyncError::not_found("order", order_id)),
            }
        }
    }
}

/// Move a due reservation to `EXPIRED`. Returns `false` when it is no longer
/// reserved or its time limit has not passed.
pub fn expire_if_due(conn: &mut SqliteConnection, order_id: i32, now: &str) -> SyncResult<bool> {
    let n = diesel::update(
        orders::table
            .find(order_id)
            .filter(orders::status.eq("RESERVED"))
            .filter(orders::time_limit.le(now)),
    )
    .set((
        orders::status.eq("EXPIRED"),
        orders::version.eq(orders::version + 1),
        orders::updated_at.eq(now),
    ))
    .execute(conn)?;
    Ok(n == 1)
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = order_items)]
pub struct NewOrderItem<'a> {
    pub order_id: i32,
    pub variant_id: Option<i32>,
    pub name: &'a str,
    pub quantity: i64,
    pub unit_price: i64,
    pub variation_total: i64,
    pub tax: i64,
    pub total_price: i64,
    pub is_custom: bool,
}

/// Replace all lines of an order.
pub fn replace_items(
    conn: &mut SqliteConnection,
    order_id: i32,
    items: &[NewOrderItem<'_>],
) -> SyncResult<usize> {
    diesel::delete(order_items::table.filter(order_items::order_id.eq(order_id))).execute(conn)?;
    if items.is_empty() {
        return Ok(0);
    }
    let n = diesel::insert_into(order_items::table)
        .values(items)
        .execute(conn)?;
    Ok(n)
}

pub fn order_items_of(conn: &mut SqliteConnection, order_id: i32) -> SyncResult<Vec<OrderItem>> {
    let rows = order_items::table
        .filter(order_items::order_id.eq(order_id))
        .order(order_items::id)
        .select(OrderItem::as_select())
        .load(conn)?;
    Ok(rows)
}

pub fn upsert_pickups(
    conn: &mut SqliteConnection,
    order_id: i32,
    pickups: &[CanonicalPickup],
) -> SyncResult<usize> {
    let mut n = 0;
    for pickup in pickups {
        let pickup_time = pickup.pickup_at.map(tz::to_rfc3339_millis);
        n += diesel::insert_into(order_pickups::table)
            .values((
                order_pickups::order_id.eq(order_id),
                order_pickups::origin_id.eq(&pickup.origin_id),
                order_pickups::pickup_time.eq(&pickup_time),
                order_pickups::recipient_name.eq(&pickup.recipient_name),
            ))
            .on_conflict((order_pickups::order_id, order_pickups::origin_id))
            .do_update()
            .set((
                order_pickups::pickup_time.eq(&pickup_time),
                order_pickups::recipient_name.eq(&pickup.recipient_name),
            ))
            .execute(conn)?;
    }
    Ok(n)
}

pub fn order_pickups_of(conn: &mut SqliteConnection, order_id: i32) -> SyncResult<Vec<OrderPickup>> {
    let rows = order_pickups::table
        .filter(order_pickups::order_id.eq(order_id))
        .order(order_pickups::id)
        .select(OrderPickup::as_select())
        .load(conn)?;
    Ok(rows)
}
