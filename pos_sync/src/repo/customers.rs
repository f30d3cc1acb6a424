use diesel::prelude::*;

use crate::{
    canonical::CanonicalCustomer,
    error::{SyncError, SyncResult},
    models::Customer,
    schema::customers,
    tz,
};

#[derive(Insertable, AsChangeset, Debug)]
#[diesel(table_name = customers)]
struct CustomerRow<'a> {
    retailer_id: i32,
    origin_id: &'a str,
    first_name: Option<&'a str>,
    last_name: Option<&'a str>,
    email: Option<&'a str>,
    phone: Option<&'a str>,
    address1: Option<&'a str>,
    address2: Option<&'a str>,
    city: Option<&'a str>,
    state: Option<&'a str>,
    zip_code: Option<&'a str>,
    country: Option<&'a str>,
    updated_at: &'a str,
}

pub fn upsert_customer(
    conn: &mut SqliteConnection,
    retailer_id: i32,
    customer: &CanonicalCustomer,
) -> SyncResult<Customer> {
    let now = tz::now_rfc3339();
    let row = CustomerRow {
        retailer_id,
        origin_id: &customer.origin_id,
        first_name: customer.first_name.as_deref(),
        last_name: customer.last_name.as_deref(),
        email: customer.email.as_deref(),
        phone: customer.phone.as_deref(),
        address1: customer.address1.as_deref(),
        address2: customer.address2.as_deref(),
        city: customer.city.as_deref(),
        state: customer.state.as_deref(),
        zip_code: customer.zip_code.as_deref(),
        country: customer.country.as_deref(),
        updated_at: &now,
    };
    let saved = diesel::insert_into(customers::table)
        .values(&row)
        .on_conflict(customers::origin_id)
        .do_update()
        .set(&row)
        .returning(Customer::as_returning())
        .get_result(conn)?;
    Ok(saved)
}

pub fn get_customer(conn: &mut SqliteConnection, customer_id: i32) -> SyncResult<Customer> {
    customers::table
        .find(customer_id)
        .select(Customer::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| SyncError::not_found("customer", customer_id))
}

pub fn find_customer(conn: &mut SqliteConnection, origin_id: &str) -> SyncResult<Option<Customer>> {
    let row = customers::table
        .filter(customers::origin_id.eq(origin_id))
        .select(Customer::as_select())
        .first(conn)
        .optional()?;
    Ok(row)
}

/// Remove the retailer's customer `origin_id`; returns the number of rows deleted.
pub fn delete_customer(
    conn: &mut SqliteConnection,
    retailer_id: i32,
    origin_id: &str,
) -> SyncResult<usize> {
    let n = diesel::delete(
        customers::table
            .filter(customers::retailer_id.eq(retailer_id))
            .filter(customers::origin_id.eq(origin_id)),
    )
    .execute(conn)?;
    Ok(n)
}
