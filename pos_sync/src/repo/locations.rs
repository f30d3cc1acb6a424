use diesel::prelude::*;

use crate::{
    canonical::CanonicalLocation,
    error::SyncResult,
    models::{Inventory, Location},
    schema::{inventories, locations},
};

#[derive(Insertable, AsChangeset, Debug)]
#[diesel(table_name = locations)]
struct LocationRow<'a> {
    retailer_id: i32,
    pos_id: &'a str,
    name: &'a str,
    address1: Option<&'a str>,
    address2: Option<&'a str>,
    city: Option<&'a str>,
    state: Option<&'a str>,
    zip_code: Option<&'a str>,
    country: Option<&'a str>,
}

pub fn upsert_location(
    conn: &mut SqliteConnection,
    retailer_id: i32,
    location: &CanonicalLocation,
) -> SyncResult<Location> {
    let row = LocationRow {
        retailer_id,
        pos_id: &location.pos_id,
        name: &location.name,
        address1: location.address1.as_deref(),
        address2: location.address2.as_deref(),
        city: location.city.as_deref(),
        state: location.state.as_deref(),
        zip_code: location.zip_code.as_deref(),
        country: location.country.as_deref(),
    };
    let saved = diesel::insert_into(locations::table)
        .values(&row)
        .on_conflict((locations::retailer_id, locations::pos_id))
        .do_update()
        .set(&row)
        .returning(Location::as_returning())
        .get_result(conn)?;
    Ok(saved)
}

pub fn list_locations(conn: &mut SqliteConnection, retailer_id: i32) -> SyncResult<Vec<Location>> {
    let rows = locations::table
        .filter(locations::retailer_id.eq(retailer_id))
        .order(locations::id)
        .select(Location::as_select())
        .load(conn)?;
    Ok(rows)
}

pub fn find_location(
    conn: &mut SqliteConnection,
    retailer_id: i32,
    pos_id: &str,
) -> SyncResult<Option<Location>> {
    let row = locations::table
        .filter(locations::retailer_id.eq(retailer_id))
        .filter(locations::pos_id.eq(pos_id))
        .select(Location::as_select())
        .first(conn)
        .optional()?;
    Ok(row)
}

/// The location's inventory, created on first use.
pub fn ensure_inventory(conn: &mut SqliteConnection, location: &Location) -> SyncResult<Inventory> {
    diesel::insert_into(inventories::table)
        .values((
            inventories::location_id.eq(location.id),
            inventories::name.eq(&location.name),
        ))
        .on_conflict(inventories::location_id)
        .do_nothing()
        .execute(conn)?;

    let inventory = inventories::table
        .filter(inventories::location_id.eq(location.id))
        .select(Inventory::as_select())
        .first(conn)?;
    Ok(inventory)
}

/// Inventory of the retailer's location `pos_id`, if both exist.
pub fn find_inventory(
    conn: &mut SqliteConnection,
    retailer_id: i32,
    pos_id: &str,
) -> SyncResult<Option<Inventory>> {
    let row = inventories::table
        .inner_join(locations::table)
        .filter(locations::retailer_id.eq(retailer_id))
        .filter(locations::pos_id.eq(pos_id))
        .select(Inventory::as_select())
        .first(conn)
        .optional()?;
    Ok(row)
}
