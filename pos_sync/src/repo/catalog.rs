//! Products, variants and their images.
//!
//! Upserts are keyed by provider id: a product by (`origin_id`, inventory), a
//! variant by (product, `origin_id`). Fields protected by an admin edit keep
//! their local value; price and stock always follow the provider.

use diesel::{prelude::*, sql_query, sql_types::Integer};

use crate::{
    canonical::CanonicalImage,
    error::{SyncError, SyncResult},
    models::{Location, Product, Variant, VariantImage},
    money::{Cents, PriceRange, price_range},
    schema::{inventories, locations, products, variant_images, variants},
    tz,
};

/// Provider-sourced product fields.
#[derive(Debug, Clone)]
pub struct ProductFields<'a> {
    pub origin: &'a str,
    pub name: &'a str,
    pub prices: PriceRange,
}

/// Provider-sourced variant fields.
#[derive(Debug, Clone)]
pub struct VariantFields<'a> {
    pub origin_parent_id: Option<&'a str>,
    pub name: &'a str,
    pub description: &'a str,
    pub sku: Option<&'a str>,
    pub upc: Option<&'a str>,
    pub price: Cents,
    pub stock: i64,
    pub currency: &'a str,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = products)]
struct NewProduct<'a> {
    inventory_id: i32,
    origin: &'a str,
    origin_id: &'a str,
    name: &'a str,
    price: i64,
    min_price: i64,
    max_price: i64,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = variants)]
struct NewVariant<'a> {
    product_id: i32,
    origin_id: &'a str,
    origin_parent_id: Option<&'a str>,
    name: &'a str,
    description: &'a str,
    sku: Option<&'a str>,
    upc: Option<&'a str>,
    price: i64,
    stock: i64,
    currency: &'a str,
}

pub fn get_product(conn: &mut SqliteConnection, product_id: i32) -> SyncResult<Product> {
    products::table
        .find(product_id)
        .select(Product::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| SyncError::not_found("product", product_id))
}

pub fn find_product(
    conn: &mut SqliteConnection,
    origin_id: &str,
    inventory_id: i32,
) -> SyncResult<Option<Product>> {
    let row = products::table
        .filter(products::origin_id.eq(origin_id))
        .filter(products::inventory_id.eq(inventory_id))
        .select(Product::as_select())
        .first(conn)
        .optional()?;
    Ok(row)
}

pub fn upsert_product(
    conn: &mut SqliteConnection,
    origin_id: &str,
    inventory_id: i32,
    fields: &ProductFields<'_>,
) -> SyncResult<Product> {
    let now = tz::now_rfc3339();
    let saved = match find_product(conn, origin_id, inventory_id)? {
        Some(current) => {
            let name = if current.is_modified_by_admin {
                current.name.as_str()
            } else {
                fields.name
            };
            diesel::update(products::table.find(current.id))
                .set((
                    products::name.eq(name),
                    products::price.eq(fields.prices.price.0),
                    products::min_price.eq(fields.prices.min_price.0),
                    products::max_price.eq(fields.prices.max_price.0),
                    products::is_active.eq(true),
                    products::updated_at.eq(&now),
                ))
                .returning(Product::as_returning())
                .get_result(conn)?
        }
        None => diesel::insert_into(products::table)
            .values(&NewProduct {
                inventory_id,
                origin: fields.origin,
                origin_id,
                name: fields.name,
                price: fields.prices.price.0,
                min_price: fields.prices.min_price.0,
                max_price: fields.prices.max_price.0,
            })
            .returning(Product::as_returning())
            .get_result(conn)?,
    };
    Ok(saved)
}

pub fn get_variant(conn: &mut SqliteConnection, variant_id: i32) -> SyncResult<Variant> {
    variants::table
        .find(variant_id)
        .select(Variant::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| SyncError::not_found("variant", variant_id))
}

pub fn find_variant(
    conn: &mut SqliteConnection,
    product_id: i32,
    origin_id: &str,
) -> SyncResult<Option<Variant>> {
    let row = variants::table
        .filter(variants::product_id.eq(product_id))
        .filter(variants::origin_id.eq(origin_id))
        .select(Variant::as_select())
        .first(conn)
        .optional()?;
    Ok(row)
}

pub fn product_variants(conn: &mut SqliteConnection, product_id: i32) -> SyncResult<Vec<Variant>> {
    let rows = variants::table
        .filter(variants::product_id.eq(product_id))
        .order(variants::id)
        .select(Variant::as_select())
        .load(conn)?;
    Ok(rows)
}

pub fn upsert_variant(
    conn: &mut SqliteConnection,
    origin_id: &str,
    product_id: i32,
    fields: &VariantFields<'_>,
) -> SyncResult<Variant> {
    let now = tz::now_rfc3339();
    let saved = match find_variant(conn, product_id, origin_id)? {
        Some(current) => {
            let (name, description) = if current.is_modified_by_admin {
                (current.name.as_str(), current.description.as_str())
            } else {
                (fields.name, fields.description)
            };
            diesel::update(variants::table.find(current.id))
                .set((
                    variants::origin_parent_id.eq(fields.origin_parent_id),
                    variants::name.eq(name),
                    variants::description.eq(description),
                    variants::sku.eq(fields.sku),
                    variants::upc.eq(fields.upc),
                    variants::price.eq(fields.price.0),
                    variants::stock.eq(fields.stock),
                    variants::currency.eq(fields.currency),
                    variants::updated_at.eq(&now),
                ))
                .returning(Variant::as_returning())
                .get_result(conn)?
        }
        None => diesel::insert_into(variants::table)
            .values(&NewVariant {
                product_id,
                origin_id,
                origin_parent_id: fields.origin_parent_id,
                name: fields.name,
                description: fields.description,
                sku: fields.sku,
                upc: fields.upc,
                price: fields.price.0,
                stock: fields.stock,
                currency: fields.currency,
            })
            .returning(Variant::as_returning())
            .get_result(conn)?,
    };
    Ok(saved)
}

/// Attach an image to a variant. Returns `false` when `image_id` is already stored.
pub fn upsert_variant_image(
    conn: &mut SqliteConnection,
    variant_id: i32,
    image: &CanonicalImage,
) -> SyncResult<bool> {
    let n = diesel::insert_into(variant_images::table)
        .values((
            variant_images::variant_id.eq(variant_id),
            variant_images::image_id.eq(&image.image_id),
            variant_images::url.eq(image.url.as_deref()),
        ))
        .on_conflict(variant_images::image_id)
        .do_nothing()
        .execute(conn)?;
    Ok(n == 1)
}

pub fn variant_images_of(
    conn: &mut SqliteConnection,
    variant_id: i32,
) -> SyncResult<Vec<VariantImage>> {
    let rows = variant_images::table
        .filter(variant_images::variant_id.eq(variant_id))
        .order(variant_images::id)
        .select(VariantImage::as_select())
        .load(conn)?;
    Ok(rows)
}

/// Delete the product's variants whose provider id is not in `keep`. An
/// emptied product is deleted too.
pub fn delete_missing_variants(
    conn: &mut SqliteConnection,
    product_id: i32,
    keep: &[String],
) -> SyncResult<usize> {
    let n = diesel::delete(
        variants::table
            .filter(variants::product_id.eq(product_id))
            .filter(variants::origin_id.ne_all(keep)),
    )
    .execute(conn)?;
    if n > 0 {
        remove_product_if_empty(conn, product_id)?;
    }
    Ok(n)
}

/// Delete a product without variants. Returns whether it was deleted.
pub fn remove_product_if_empty(conn: &mut SqliteConnection, product_id: i32) -> SyncResult<bool> {
    let remaining: i64 = variants::table
        .filter(variants::product_id.eq(product_id))
        .count()
        .get_result(conn)?;
    if remaining > 0 {
        return Ok(false);
    }
    let n = diesel::delete(products::table.find(product_id)).execute(conn)?;
    Ok(n == 1)
}

/// Recompute `price`/`min_price`/`max_price` of a product from its stored variants.
pub fn recompute_product_prices(
    conn: &mut SqliteConnection,
    product_id: i32,
) -> SyncResult<PriceRange> {
    let prices: Vec<Cents> = variants::table
        .filter(variants::product_id.eq(product_id))
        .order(variants::id)
        .select(variants::price)
        .load::<i64>(conn)?
        .into_iter()
        .map(Cents)
        .collect();
    let range = price_range(&prices);
    diesel::update(products::table.find(product_id))
        .set((
            products::price.eq(range.price.0),
            products::min_price.eq(range.min_price.0),
            products::max_price.eq(range.max_price.0),
        ))
        .execute(conn)?;
    Ok(range)
}

/// Set `total_stock` of every product of the retailer to the sum of its variants' stock.
pub fn recompute_aggregates(conn: &mut SqliteConnection, retailer_id: i32) -> SyncResult<usize> {
    let n = sql_query(
        "UPDATE products \
         SET total_stock = COALESCE((SELECT SUM(v.stock) FROM variants v WHERE v.product_id = products.id), 0) \
         WHERE inventory_id IN ( \
             SELECT i.id FROM inventories i JOIN locations l ON l.id = i.location_id \
             WHERE l.retailer_id = ?)",
    )
    .bind::<Integer, _>(retailer_id)
    .execute(conn)?;
    Ok(n)
}

fn retailer_inventory_ids(conn: &mut SqliteConnection, retailer_id: i32) -> SyncResult<Vec<i32>> {
    let ids = inventories::table
        .inner_join(locations::table)
        .filter(locations::retailer_id.eq(retailer_id))
        .select(inventories::id)
        .load(conn)?;
    Ok(ids)
}

/// Delete a provider catalog object from every inventory of the retailer.
///
/// `origin_id` may name a product or a variant. Products left without
/// variants are removed; the others get their prices recomputed.
pub fn delete_catalog_item(
    conn: &mut SqliteConnection,
    retailer_id: i32,
    origin_id: &str,
) -> SyncResult<usize> {
    let inventory_ids = retailer_inventory_ids(conn, retailer_id)?;

    let removed_products = diesel::delete(
        products::table
            .filter(products::inventory_id.eq_any(&inventory_ids))
            .filter(products::origin_id.eq(origin_id)),
    )
    .execute(conn)?;

    let affected: Vec<i32> = variants::table
        .inner_join(products::table)
        .filter(products::inventory_id.eq_any(&inventory_ids))
        .filter(variants::origin_id.eq(origin_id))
        .select(variants::product_id)
        .load(conn)?;
    let removed_variants = diesel::delete(
        variants::table
            .filter(variants::origin_id.eq(origin_id))
            .filter(variants::product_id.eq_any(&affected)),
    )
    .execute(conn)?;

    for product_id in affected {
        if !remove_product_if_empty(conn, product_id)? {
            recompute_product_prices(conn, product_id)?;
        }
    }
    Ok(removed_products + removed_variants)
}

/// Set the stock of variant `origin_id` at the retailer's location `location_pos_id`.
pub fn update_variant_stock(
    conn: &mut SqliteConnection,
    retailer_id: i32,
    origin_id: &str,
    location_pos_id: &str,
    stock: i64,
) -> SyncResult<usize> {
    let Some(inventory) = super::locations::find_inventory(conn, retailer_id, location_pos_id)?
    else {
        return Ok(0);
    };
    let n = diesel::update(
        variants::table.filter(variants::origin_id.eq(origin_id)).filter(
            variants::product_id.eq_any(
                products::table
                    .filter(products::inventory_id.eq(inventory.id))
                    .select(products::id),
            ),
        ),
    )
    .set((
        variants::stock.eq(stock),
        variants::updated_at.eq(tz::now_rfc3339()),
    ))
    .execute(conn)?;
    Ok(n)
}

/// The retailer's variant with provider id `origin_id`, preferring the one
/// stocked at `location_pos_id` when given.
pub fn find_retailer_variant(
    conn: &mut SqliteConnection,
    retailer_id: i32,
    origin_id: &str,
    location_pos_id: Option<&str>,
) -> SyncResult<Option<Variant>> {
    let base = move || {
        variants::table
            .inner_join(products::table.inner_join(inventories::table.inner_join(locations::table)))
            .filter(locations::retailer_id.eq(retailer_id))
            .filter(variants::origin_id.eq(origin_id))
            .select(Variant::as_select())
            .order(variants::id)
            .into_boxed()
    };
    if let Some(pos_id) = location_pos_id {
        let at_location = base()
            .filter(locations::pos_id.eq(pos_id))
            .first(conn)
            .optional()?;
        if at_location.is_some() {
            return Ok(at_location);
        }
    }
    Ok(base().first(conn).optional()?)
}

/// A variant together with the location its inventory belongs to.
pub fn variant_with_location(
    conn: &mut SqliteConnection,
    variant_id: i32,
) -> SyncResult<(Variant, Location)> {
    variants::table
        .inner_join(products::table.inner_join(inventories::table.inner_join(locations::table)))
        .filter(variants::id.eq(variant_id))
        .select((Variant::as_select(), Location::as_select()))
        .first(conn)
        .optional()?
        .ok_or_else(|| SyncError::not_found("variant", variant_id))
}

/// Edit a product's name from the admin side.
///
/// Changing the name protects it from later syncs.
pub fn admin_edit_product(
    conn: &mut SqliteConnection,
    product_id: i32,
    name: &str,
) -> SyncResult<Product> {
    let current = get_product(conn, product_id)?;
    let protected = current.is_modified_by_admin || current.name != name;
    let saved = diesel::update(products::table.find(product_id))
        .set((
            products::name.eq(name),
            products::is_modified_by_admin.eq(protected),
            products::updated_at.eq(tz::now_rfc3339()),
        ))
        .returning(Product::as_returning())
        .get_result(conn)?;
    Ok(saved)
}

/// Admin-side changes to a variant; `None` leaves the field as is.
#[derive(Debug, Clone, Default)]
pub struct VariantEdit<'a> {
    pub name: Option<&'a str>,
    pub description: Option<&'a str>,
    pub price: Option<Cents>,
    pub stock: Option<i64>,
}

/// Edit a variant from the admin side.
///
/// Changing the name or description protects both from later syncs. Price
/// and stock edits do not, and are overwritten by the next sync.
pub fn admin_edit_variant(
    conn: &mut SqliteConnection,
    variant_id: i32,
    edit: &VariantEdit<'_>,
) -> SyncResult<Variant> {
    let current = get_variant(conn, variant_id)?;
    let name = edit.name.unwrap_or(current.name.as_str());
    let description = edit.description.unwrap_or(current.description.as_str());
    let protected =
        current.is_modified_by_admin || name != current.name || description != current.description;

    let saved = diesel::update(variants::table.find(variant_id))
        .set((
            variants::name.eq(name),
            variants::description.eq(description),
            variants::price.eq(edit.price.map_or(current.price, |p| p.0)),
            variants::stock.eq(edit.stock.unwrap_or(current.stock)),
            variants::is_modified_by_admin.eq(protected),
            variants::updated_at.eq(tz::now_rfc3339()),
        ))
        .returning(Variant::as_returning())
        .get_result(conn)?;
    recompute_product_prices(conn, current.product_id)?;
    Ok(saved)
}

/// Delete a variant from the admin side; its product goes with its last variant.
pub fn admin_delete_variant(conn: &mut SqliteConnection, variant_id: i32) -> SyncResult<()> {
    let current = get_variant(conn, variant_id)?;
    diesel::delete(variants::table.find(variant_id)).execute(conn)?;
    if !remove_product_if_empty(conn, current.product_id)? {
        recompute_product_prices(conn, current.product_id)?;
    }
    Ok(())
}

/// Record whose admin protection is cleared by [`clear_admin_override`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminTarget {
    Product(i32),
    Variant(i32),
}

/// Let the next sync overwrite the record's protected fields again.
pub fn clear_admin_override(conn: &mut SqliteConnection, target: AdminTarget) -> SyncResult<usize> {
    let n = match target {
        AdminTarget::Product(id) => diesel::update(products::table.find(id))
            .set(products::is_modified_by_admin.eq(false))
            .execute(conn)?,
        AdminTarget::Variant(id) => diesel::update(variants::table.find(id))
            .set(variants::is_modified_by_admin.eq(false))
            .execute(conn)?,
    };
    Ok(n)
}

/// Set the URL of a stored image that was referenced before its image object arrived.
pub fn fill_image_url(conn: &mut SqliteConnection, image_id: &str, url: &str) -> SyncResult<usize> {
    let n = diesel::update(
        variant_images::table
            .filter(variant_images::image_id.eq(image_id))
            .filter(variant_images::url.is_null()),
    )
    .set(variant_images::url.eq(url))
    .execute(conn)?;
    Ok(n)
}
