use diesel::prelude::*;

use crate::{
    canonical::CanonicalCategory,
    error::SyncResult,
    models::Category,
    schema::{categories, variant_categories},
};

pub fn upsert_category(
    conn: &mut SqliteConnection,
    retailer_id: i32,
    category: &CanonicalCategory,
) -> SyncResult<Category> {
    let saved = diesel::insert_into(categories::table)
        .values((
            categories::retailer_id.eq(retailer_id),
            categories::origin_id.eq(&category.origin_id),
            categories::name.eq(&category.name),
        ))
        .on_conflict((categories::retailer_id, categories::origin_id))
        .do_update()
        .set(categories::name.eq(&category.name))
        .returning(Category::as_returning())
        .get_result(conn)?;
    Ok(saved)
}

pub fn delete_category(
    conn: &mut SqliteConnection,
    retailer_id: i32,
    origin_id: &str,
) -> SyncResult<usize> {
    let n = diesel::delete(
        categories::table
            .filter(categories::retailer_id.eq(retailer_id))
            .filter(categories::origin_id.eq(origin_id)),
    )
    .execute(conn)?;
    Ok(n)
}

/// Provider category ids of the retailer that have no local row yet.
pub fn missing_categories(
    conn: &mut SqliteConnection,
    retailer_id: i32,
    origin_ids: &[String],
) -> SyncResult<Vec<String>> {
    let known: Vec<String> = categories::table
        .filter(categories::retailer_id.eq(retailer_id))
        .filter(categories::origin_id.eq_any(origin_ids))
        .select(categories::origin_id)
        .load(conn)?;
    Ok(origin_ids
        .iter()
        .filter(|id| !known.contains(id))
        .cloned()
        .collect())
}

/// Replace the category links of a variant. Unknown provider ids are skipped.
pub fn set_variant_categories(
    conn: &mut SqliteConnection,
    retailer_id: i32,
    variant_id: i32,
    origin_ids: &[String],
) -> SyncResult<usize> {
    diesel::delete(variant_categories::table.filter(variant_categories::variant_id.eq(variant_id)))
        .execute(conn)?;

    let ids: Vec<i32> = categories::table
        .filter(categories::retailer_id.eq(retailer_id))
        .filter(categories::origin_id.eq_any(origin_ids))
        .select(categories::id)
        .load(conn)?;
    let links: Vec<_> = ids
        .iter()
        .map(|category_id| {
            (
                variant_categories::variant_id.eq(variant_id),
                variant_categories::category_id.eq(*category_id),
            )
        })
        .collect();
    if links.is_empty() {
        return Ok(0);
    }
    let n = diesel::insert_into(variant_categories::table)
        .values(&links)
        .execute(conn)?;
    Ok(n)
}

pub fn variant_category_ids(conn: &mut SqliteConnection, variant_id: i32) -> SyncResult<Vec<String>> {
    let ids = variant_categories::table
        .inner_join(categories::table)
        .filter(variant_categories::variant_id.eq(variant_id))
        .order(categories::origin_id)
        .select(categories::origin_id)
        .load(conn)?;
    Ok(ids)
}
