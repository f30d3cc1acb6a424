//! Location refresh.

use diesel::SqliteConnection;
use pos_client::{PosProvider, models::ProviderLocation};

use crate::{
    canonical::CanonicalLocation,
    context::SyncContext,
    error::{SyncError, SyncResult},
    mapper,
    models::{Location, Retailer},
    repo::locations as repo,
};

fn is_active(location: &ProviderLocation) -> bool {
    match location {
        ProviderLocation::Square(l) => l.status.as_deref() != Some("INACTIVE"),
        ProviderLocation::Clover(_) => true,
    }
}

/// Fetch the retailer's locations from the provider and upsert them.
pub async fn refresh_locations(
    conn: &mut SqliteConnection,
    retailer: &Retailer,
    provider: &dyn PosProvider,
) -> SyncResult<Vec<Location>> {
    let remote = provider.fetch_locations().await?;
    let mapped: Vec<CanonicalLocation> = remote
        .iter()
        .filter(|l| is_active(l))
        .map(mapper::map_location)
        .collect();

    let saved = conn.immediate_transaction::<_, SyncError, _>(|conn| {
        for location in &mapped {
            repo::upsert_location(conn, retailer.id, location)?;
        }
        repo::list_locations(conn, retailer.id)
    })?;
    tracing::info!(
        retailer_id = retailer.id,
        fetched = mapped.len(),
        "locations refreshed"
    );
    Ok(saved)
}

/// Stored locations, refreshed from the provider when none are known yet.
pub async fn known_locations(
    conn: &mut SqliteConnection,
    retailer: &Retailer,
    provider: &dyn PosProvider,
) -> SyncResult<Vec<Location>> {
    let stored = repo::list_locations(conn, retailer.id)?;
    if !stored.is_empty() {
        return Ok(stored);
    }
    refresh_locations(conn, retailer, provider).await
}

/// Entry point for location webhooks and the OAuth callback.
pub async fn sync_locations(
    ctx: &SyncContext,
    conn: &mut SqliteConnection,
    retailer_id: i32,
) -> SyncResult<Vec<Location>> {
    let (retailer, provider) = ctx.connect(conn, retailer_id)?;
    refresh_locations(conn, &retailer, provider.as_ref()).await
}
