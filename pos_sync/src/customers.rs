//! Customer synchronization.

use diesel::SqliteConnection;
use pos_client::{PosProvider, models::Cursor};

use crate::{
    context::SyncContext,
    error::SyncResult,
    mapper,
    models::{Customer, Retailer},
    repo::customers as repo,
};

/// Pull every customer of the retailer. Returns the number stored.
pub async fn sync_customers(
    ctx: &SyncContext,
    conn: &mut SqliteConnection,
    retailer_id: i32,
) -> SyncResult<usize> {
    let (_, provider) = ctx.connect(conn, retailer_id)?;
    let mut cursor = Cursor::Start;
    let mut stored = 0;
    loop {
        let page = provider.fetch_customers(&cursor).await?;
        if page.customers.is_empty() {
            break;
        }
        for customer in &page.customers {
            repo::upsert_customer(conn, retailer_id, &mapper::map_customer(customer))?;
            stored += 1;
        }
        match page.next {
            Some(next) => cursor = next,
            None => break,
        }
    }
    tracing::info!(retailer_id, stored, "customers synced");
    Ok(stored)
}

/// Fetch one customer and upsert it.
pub async fn sync_customer(
    ctx: &SyncContext,
    conn: &mut SqliteConnection,
    retailer_id: i32,
    customer_id: &str,
) -> SyncResult<Customer> {
    let (retailer, provider) = ctx.connect(conn, retailer_id)?;
    fetch_and_store(conn, &retailer, provider.as_ref(), customer_id).await
}

pub(crate) async fn fetch_and_store(
    conn: &mut SqliteConnection,
    retailer: &Retailer,
    provider: &dyn PosProvider,
    customer_id: &str,
) -> SyncResult<Customer> {
    let remote = provider.fetch_customer(customer_id).await?;
    repo::upsert_customer(conn, retailer.id, &mapper::map_customer(&remote))
}

pub fn delete_customer(
    conn: &mut SqliteConnection,
    retailer_id: i32,
    customer_id: &str,
) -> SyncResult<usize> {
    let removed = repo::delete_customer(conn, retailer_id, customer_id)?;
    tracing::info!(retailer_id, customer_id, removed, "customer deleted");
    Ok(removed)
}
