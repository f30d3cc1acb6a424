//! Inventory synchronization: provider catalog → local products and variants.
//!
//! ## What this does
//! - Pulls one catalog page per call ([`run_page`]) and hands back a
//!   [`SyncCursor`] for the next one; the caller drives the chain.
//! - Maps the page with [`crate::mapper`], fills in stock the payload lacks,
//!   and stores products per visible location.
//! - Handles single-object updates from webhooks: [`sync_item`],
//!   [`delete_item`], [`apply_stock_update`], [`upsert_category`] and
//!   [`delete_category`].
//!
//! ## Transactions & consistency
//! Provider I/O happens before the write. All writes of one page run inside a
//! single `BEGIN IMMEDIATE` transaction, so a failed page leaves nothing
//! behind. Product aggregates (`total_stock`, price range) are recomputed from
//! stored variants, never patched.
//!
//! ## Phases
//! Each page moves through `FETCHING → MAPPING → STORING → DONE`, or `FAILED`;
//! every transition is logged with the retailer id.

mod store;

use std::{collections::HashMap, fmt};

use chrono::{DateTime, Utc};
use diesel::SqliteConnection;
use pos_client::{
    PosProvider,
    models::{CatalogObjects, Cursor},
};
use serde::{Deserialize, Serialize};

use crate::{
    canonical::{CanonicalCategory, MappedCatalog},
    context::SyncContext,
    error::{FailureKind, SyncError, SyncResult},
    locations::known_locations,
    mapper::{self, MapContext},
    models::Retailer,
    repo::{catalog, categories},
};

/// Position of a retailer's catalog chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCursor {
    pub retailer_id: i32,
    pub position: Cursor,
}

impl SyncCursor {
    pub fn start(retailer_id: i32) -> Self {
        Self {
            retailer_id,
            position: Cursor::Start,
        }
    }
}

/// What a chain pulls from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SyncMode {
    /// The whole catalog; nothing is deleted.
    Full,
    /// Objects changed after `since`, deletions included.
    Incremental { since: DateTime<Utc> },
}

impl SyncMode {
    pub fn since(self) -> Option<DateTime<Utc>> {
        match self {
            SyncMode::Full => None,
            SyncMode::Incremental { since } => Some(since),
        }
    }

    pub fn is_incremental(self) -> bool {
        matches!(self, SyncMode::Incremental { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Fetching,
    Mapping,
    Storing,
    Done,
    Failed,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Fetching => "FETCHING",
            Phase::Mapping => "MAPPING",
            Phase::Storing => "STORING",
            Phase::Done => "DONE",
            Phase::Failed => "FAILED",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters of one stored page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PageStats {
    pub objects: usize,
    pub products: usize,
    pub variants: usize,
    pub categories: usize,
    pub images: usize,
    pub deleted: usize,
}

/// Result of [`run_page`].
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOutcome {
    pub success: bool,
    /// Cursor of the following page; `None` ends the chain.
    pub next: Option<SyncCursor>,
    pub failure: Option<FailureKind>,
    pub error: Option<String>,
    pub stats: PageStats,
}

impl SyncOutcome {
    fn done(next: Option<SyncCursor>, stats: PageStats) -> Self {
        Self {
            success: true,
            next,
            failure: None,
            error: None,
            stats,
        }
    }

    fn failed(error: &SyncError) -> Self {
        Self {
            success: false,
            next: None,
            failure: Some(error.kind()),
            error: Some(error.to_string()),
            stats: PageStats::default(),
        }
    }

    /// Whether the chain has another page to run.
    pub fn should_continue(&self) -> bool {
        self.next.is_some()
    }
}

/// Fetch, map and store one catalog page.
///
/// Never returns an error: failures are logged with the retailer id and
/// reported through [`SyncOutcome::failure`].
pub async fn run_page(
    ctx: &SyncContext,
    conn: &mut SqliteConnection,
    cursor: &SyncCursor,
    mode: SyncMode,
) -> SyncOutcome {
    match try_run_page(ctx, conn, cursor, mode).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::warn!(
                retailer_id = cursor.retailer_id,
                phase = %Phase::Failed,
                failure = ?e.kind(),
                error = %e,
                "catalog page failed"
            );
            SyncOutcome::failed(&e)
        }
    }
}

async fn try_run_page(
    ctx: &SyncContext,
    conn: &mut SqliteConnection,
    cursor: &SyncCursor,
    mode: SyncMode,
) -> SyncResult<SyncOutcome> {
    let retailer_id = cursor.retailer_id;
    let (retailer, provider) = ctx.connect(conn, retailer_id)?;

    tracing::debug!(retailer_id, phase = %Phase::Fetching, position = ?cursor.position, "fetching catalog page");
    let page = provider
        .fetch_catalog_page(&cursor.position, mode.since())
        .await?;
    if page.objects.is_empty() {
        tracing::info!(retailer_id, phase = %Phase::Done, "catalog exhausted");
        return Ok(SyncOutcome::done(None, PageStats::default()));
    }

    let stats = ingest(
        conn,
        &retailer,
        provider.as_ref(),
        &page.objects,
        mode.is_incremental(),
    )
    .await?;
    let next = page.next.map(|position| SyncCursor {
        retailer_id,
        position,
    });
    Ok(SyncOutcome::done(next, stats))
}

/// Units on hand keyed by (variant provider id, location provider id).
pub(crate) type StockTable = HashMap<(String, String), i64>;

async fn ingest(
    conn: &mut SqliteConnection,
    retailer: &Retailer,
    provider: &dyn PosProvider,
    objects: &CatalogObjects,
    prune: bool,
) -> SyncResult<PageStats> {
    let retailer_id = retailer.id;
    let locations = known_locations(conn, retailer, provider).await?;
    let location_ids: Vec<String> = locations.iter().map(|l| l.pos_id.clone()).collect();

    tracing::debug!(retailer_id, phase = %Phase::Mapping, objects = objects.len(), "mapping catalog page");
    let mapped = mapper::map_catalog(
        objects,
        MapContext {
            location_ids: &location_ids,
        },
    );
    let stock = fetch_missing_stock(provider, &mapped).await?;
    let extra_categories = fetch_missing_categories(conn, retailer_id, provider, &mapped).await?;

    tracing::debug!(retailer_id, phase = %Phase::Storing, products = mapped.products.len(), "storing catalog page");
    let mut stats = conn.immediate_transaction::<_, SyncError, _>(|conn| {
        store::apply_catalog(
            conn,
            retailer,
            &locations,
            &mapped,
            &extra_categories,
            &stock,
            prune,
        )
    })?;
    stats.objects = objects.len();

    tracing::info!(
        retailer_id,
        phase = %Phase::Done,
        products = stats.products,
        variants = stats.variants,
        deleted = stats.deleted,
        "catalog page stored"
    );
    Ok(stats)
}

async fn fetch_missing_stock(
    provider: &dyn PosProvider,
    mapped: &MappedCatalog,
) -> SyncResult<StockTable> {
    let mut stock = StockTable::new();
    for variant in mapped.products.iter().flat_map(|p| &p.variants) {
        if variant.stock.is_some() {
            continue;
        }
        for location_id in &variant.locations {
            let units = provider.get_stock(&variant.origin_id, location_id).await?;
            stock.insert((variant.origin_id.clone(), location_id.clone()), units);
        }
    }
    Ok(stock)
}

// Categories referenced by variants that are neither on the page nor stored.
async fn fetch_missing_categories(
    conn: &mut SqliteConnection,
    retailer_id: i32,
    provider: &dyn PosProvider,
    mapped: &MappedCatalog,
) -> SyncResult<Vec<CanonicalCategory>> {
    let mut referenced: Vec<String> = mapped
        .products
        .iter()
        .flat_map(|p| &p.variants)
        .flat_map(|v| v.category_ids.iter().cloned())
        .filter(|id| !mapped.categories.iter().any(|c| &c.origin_id == id))
        .collect();
    referenced.sort();
    referenced.dedup();
    if referenced.is_empty() {
        return Ok(Vec::new());
    }

    let mut fetched = Vec::new();
    for id in categories::missing_categories(conn, retailer_id, &referenced)? {
        match provider.fetch_category(&id).await? {
            Some(c) => fetched.push(CanonicalCategory {
                origin_id: c.id,
                name: c.name,
            }),
            None => tracing::debug!(retailer_id, category_id = %id, "referenced category not found"),
        }
    }
    Ok(fetched)
}

/// Fetch and store one catalog item without touching its siblings.
pub async fn sync_item(
    ctx: &SyncContext,
    conn: &mut SqliteConnection,
    retailer_id: i32,
    item_id: &str,
) -> SyncResult<PageStats> {
    let (retailer, provider) = ctx.connect(conn, retailer_id)?;
    ingest_item(conn, &retailer, provider.as_ref(), item_id).await
}

pub(crate) async fn ingest_item(
    conn: &mut SqliteConnection,
    retailer: &Retailer,
    provider: &dyn PosProvider,
    item_id: &str,
) -> SyncResult<PageStats> {
    let page = provider.fetch_catalog_item(item_id).await?;
    if page.objects.is_empty() {
        tracing::info!(retailer_id = retailer.id, item_id, "item not returned by provider");
        return Ok(PageStats::default());
    }
    ingest(conn, retailer, provider, &page.objects, false).await
}

/// Remove an item (product or variant) the provider reported deleted.
pub fn delete_item(conn: &mut SqliteConnection, retailer_id: i32, item_id: &str) -> SyncResult<usize> {
    let removed = conn.immediate_transaction::<_, SyncError, _>(|conn| {
        let n = catalog::delete_catalog_item(conn, retailer_id, item_id)?;
        catalog::recompute_aggregates(conn, retailer_id)?;
        Ok(n)
    })?;
    tracing::info!(retailer_id, item_id, removed, "catalog item deleted");
    Ok(removed)
}

/// Re-read the stock of one variant at one location.
pub async fn apply_stock_update(
    ctx: &SyncContext,
    conn: &mut SqliteConnection,
    retailer_id: i32,
    item_id: &str,
    location_id: &str,
) -> SyncResult<usize> {
    let (_, provider) = ctx.connect(conn, retailer_id)?;
    let units = provider.get_stock(item_id, location_id).await?;
    let updated = conn.immediate_transaction::<_, SyncError, _>(|conn| {
        let n = catalog::update_variant_stock(conn, retailer_id, item_id, location_id, units)?;
        catalog::recompute_aggregates(conn, retailer_id)?;
        Ok(n)
    })?;
    tracing::debug!(retailer_id, item_id, location_id, units, updated, "stock updated");
    Ok(updated)
}

/// Fetch a category and store it; a category the provider no longer knows is deleted.
pub async fn upsert_category(
    ctx: &SyncContext,
    conn: &mut SqliteConnection,
    retailer_id: i32,
    category_id: &str,
) -> SyncResult<bool> {
    let (_, provider) = ctx.connect(conn, retailer_id)?;
    match provider.fetch_category(category_id).await? {
        Some(c) => {
            categories::upsert_category(
                conn,
                retailer_id,
                &CanonicalCategory {
                    origin_id: c.id,
                    name: c.name,
                },
            )?;
            Ok(true)
        }
        None => {
            delete_category(conn, retailer_id, category_id)?;
            Ok(false)
        }
    }
}

pub fn delete_category(
    conn: &mut SqliteConnection,
    retailer_id: i32,
    category_id: &str,
) -> SyncResult<usize> {
    categories::delete_category(conn, retailer_id, category_id)
}
