use std::collections::HashMap;

use diesel::SqliteConnection;

use crate::{
    canonical::{CanonicalCategory, CanonicalImage, CanonicalProduct, CanonicalVariant, MappedCatalog},
    error::SyncResult,
    inventory::{PageStats, StockTable},
    models::{Location, Retailer},
    money::{Cents, price_range},
    repo::{
        catalog::{self, ProductFields, VariantFields},
        categories,
        locations::ensure_inventory,
    },
};

/// Write a mapped page inside the caller's transaction.
pub(crate) fn apply_catalog(
    conn: &mut SqliteConnection,
    retailer: &Retailer,
    locations: &[Location],
    mapped: &MappedCatalog,
    extra_categories: &[CanonicalCategory],
    stock: &StockTable,
    prune: bool,
) -> SyncResult<PageStats> {
    let mut stats = PageStats::default();

    for category in mapped.categories.iter().chain(extra_categories) {
        categories::upsert_category(conn, retailer.id, category)?;
        stats.categories += 1;
    }

    let images: HashMap<&str, &CanonicalImage> = mapped
        .images
        .iter()
        .map(|i| (i.image_id.as_str(), i))
        .collect();

    for location in locations {
        let pos_id = location.pos_id.as_str();
        let here: Vec<&CanonicalProduct> = mapped
            .products
            .iter()
            .filter(|p| p.locations.iter().any(|l| l == pos_id))
            .collect();
        if here.is_empty() {
            continue;
        }
        let inventory = ensure_inventory(conn, location)?;

        for product in here {
            let visible: Vec<&CanonicalVariant> = product
                .variants
                .iter()
                .filter(|v| v.is_visible_at(pos_id))
                .collect();
            if visible.is_empty() {
                if prune {
                    // Hidden everywhere here now: drop what an earlier page stored.
                    if let Some(stale) = catalog::find_product(conn, &product.origin_id, inventory.id)? {
                        stats.deleted += catalog::delete_missing_variants(conn, stale.id, &[])?;
                        catalog::remove_product_if_empty(conn, stale.id)?;
                    }
                }
                continue;
            }
            let prices: Vec<Cents> = visible.iter().map(|v| v.price_at(pos_id)).collect();
            let row = catalog::upsert_product(
                conn,
                &product.origin_id,
                inventory.id,
                &ProductFields {
                    origin: &retailer.origin,
                    name: &product.name,
                    prices: price_range(&prices),
                },
            )?;
            stats.products += 1;

            for variant in &visible {
                let units = variant
                    .stock
                    .or_else(|| {
                        stock
                            .get(&(variant.origin_id.clone(), pos_id.to_string()))
                            .copied()
                    })
                    .unwrap_or(0);
                let saved = catalog::upsert_variant(
                    conn,
                    &variant.origin_id,
                    row.id,
                    &VariantFields {
                        origin_parent_id: variant.origin_parent_id.as_deref(),
                        name: &variant.name,
                        description: &variant.description,
                        sku: variant.sku.as_deref(),
                        upc: variant.upc.as_deref(),
                        price: variant.price_at(pos_id),
                        stock: units,
                        currency: &variant.currency,
                    },
                )?;
                categories::set_variant_categories(conn, retailer.id, saved.id, &variant.category_ids)?;
                for image_id in &variant.image_ids {
                    let image = images.get(image_id.as_str()).map_or_else(
                        || CanonicalImage {
                            image_id: image_id.clone(),
                            url: None,
                        },
                        |i| (*i).clone(),
                    );
                    if catalog::upsert_variant_image(conn, saved.id, &image)? {
                        stats.images += 1;
                    }
                }
                stats.variants += 1;
            }

            if prune {
                let keep: Vec<String> = visible.iter().map(|v| v.origin_id.clone()).collect();
                stats.deleted += catalog::delete_missing_variants(conn, row.id, &keep)?;
            }
            catalog::recompute_product_prices(conn, row.id)?;
        }
    }

    for image in &mapped.images {
        if let Some(url) = &image.url {
            catalog::fill_image_url(conn, &image.image_id, url)?;
        }
    }

    for origin_id in &mapped.deleted_ids {
        stats.deleted += catalog::delete_catalog_item(conn, retailer.id, origin_id)?;
    }
    catalog::recompute_aggregates(conn, retailer.id)?;
    Ok(stats)
}
