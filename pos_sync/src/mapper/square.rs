//! Square catalog, order, customer and location mapping.

use std::collections::BTreeMap;

use indexmap::IndexSet;
use pos_client::providers::{parse_quantity, square_rest::response as sq};

use crate::{
    canonical::{
        CanonicalCategory, CanonicalCustomer, CanonicalImage, CanonicalLineItem,
        CanonicalLocation, CanonicalOrder, CanonicalPickup, CanonicalProduct, CanonicalVariant,
        MappedCatalog,
    },
    mapper::{DEFAULT_CURRENCY, MapContext, resolve_locations},
    money::{Cents, price_range},
};

pub fn map_catalog(objects: &[sq::CatalogObject], ctx: MapContext<'_>) -> MappedCatalog {
    let mut mapped = MappedCatalog::default();
    for object in objects {
        if object.is_deleted {
            mapped.deleted_ids.push(object.id.clone());
            continue;
        }
        match object.object_type.as_str() {
            "ITEM" => {
                if let Some(product) = map_item(object, ctx) {
                    mapped.products.push(product);
                }
            }
            "ITEM_VARIATION" => {
                tracing::debug!(id = %object.id, "standalone variation ignored; mapped with its item");
            }
            "CATEGORY" => mapped.categories.push(CanonicalCategory {
                origin_id: object.id.clone(),
                name: object
                    .category_data
                    .as_ref()
                    .and_then(|c| c.name.clone())
                    .unwrap_or_default(),
            }),
            "IMAGE" => mapped.images.push(CanonicalImage {
                image_id: object.id.clone(),
                url: object.image_data.as_ref().and_then(|i| i.url.clone()),
            }),
            other => tracing::debug!(id = %object.id, object_type = other, "catalog object skipped"),
        }
    }
    mapped
}

/// Map one ITEM. Returns `None` when neither the item nor any of its
/// variations is visible at a known location.
pub fn map_item(object: &sq::CatalogObject, ctx: MapContext<'_>) -> Option<CanonicalProduct> {
    let data = object.item_data.as_ref()?;
    let locations = visibility_of(object, ctx.location_ids);
    if locations.is_empty() {
        return None;
    }

    let mut category_ids: IndexSet<String> = data.categories.iter().map(|c| c.id.clone()).collect();
    if let Some(legacy) = &data.category_id {
        category_ids.insert(legacy.clone());
    }
    let category_ids: Vec<String> = category_ids.into_iter().collect();
    let item_name = data.name.clone().unwrap_or_default();

    let mut variants = Vec::with_capacity(data.variations.len());
    for (idx, variation) in data.variations.iter().enumerate() {
        if variation.is_deleted {
            continue;
        }
        let Some(vd) = variation.item_variation_data.as_ref() else {
            continue;
        };
        let variant_locations = visibility_of(variation, &locations);
        if variant_locations.is_empty() {
            continue;
        }

        let location_prices: BTreeMap<String, Cents> = vd
            .location_overrides
            .iter()
            .filter_map(|o| {
                o.price_money
                    .as_ref()
                    .map(|m| (o.location_id.clone(), Cents::from_minor_units(m.amount)))
            })
            .collect();

        // The item's own images go to its first variant.
        let mut image_ids = if idx == 0 {
            data.image_ids.clone()
        } else {
            Vec::new()
        };
        image_ids.extend(vd.image_ids.iter().cloned());

        variants.push(CanonicalVariant {
            origin_id: variation.id.clone(),
            origin_parent_id: Some(vd.item_id.clone().unwrap_or_else(|| object.id.clone())),
            name: vd.name.clone().unwrap_or_else(|| item_name.clone()),
            description: data.description.clone().unwrap_or_default(),
            sku: vd.sku.clone(),
            upc: vd.upc.clone(),
            price: vd
                .price_money
                .as_ref()
                .map(|m| Cents::from_minor_units(m.amount))
                .unwrap_or_default(),
            currency: vd
                .price_money
                .as_ref()
                .map(|m| m.currency.clone())
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            stock: None,
            locations: variant_locations,
            location_prices,
            image_ids,
            category_ids: category_ids.clone(),
        });
    }
    if variants.is_empty() {
        return None;
    }

    let prices: Vec<Cents> = variants.iter().map(|v| v.price).collect();
    Some(CanonicalProduct {
        origin_id: object.id.clone(),
        name: item_name,
        locations,
        prices: price_range(&prices),
        variants,
    })
}

// Variations without any visibility fields inherit the item's locations.
fn visibility_of(object: &sq::CatalogObject, known: &[String]) -> Vec<String> {
    if object.object_type == "ITEM_VARIATION"
        && object.present_at_all_locations.is_none()
        && object.present_at_location_ids.is_none()
        && object.absent_at_location_ids.is_none()
    {
        return known.to_vec();
    }
    resolve_locations(
        object.present_at_all_locations,
        object.present_at_location_ids.as_deref(),
        object.absent_at_location_ids.as_deref(),
        known,
    )
}

fn money(m: &Option<sq::Money>) -> Cents {
    m.as_ref()
        .map(|m| Cents::from_minor_units(m.amount))
        .unwrap_or_default()
}

pub fn map_order(order: &sq::Order) -> CanonicalOrder {
    let subtotal = money(&order.total_money);
    let tax = money(&order.total_tax_money);
    let total = order
        .net_amounts
        .as_ref()
        .map(|n| money(&n.total_money))
        .unwrap_or(subtotal);
    let line_items = order
        .line_items
        .iter()
        .map(|li| {
            let is_catalog_line = li.item_type.as_deref().is_none_or(|t| t == "ITEM");
            CanonicalLineItem {
                catalog_item_id: li.catalog_object_id.clone().filter(|_| is_catalog_line),
                name: li.name.clone().unwrap_or_else(|| "Custom amount".to_string()),
                quantity: parse_quantity(&li.quantity).unwrap_or(1),
                unit_price: money(&li.base_price_money),
                variation_total: money(&li.variation_total_price_money),
                tax: money(&li.total_tax_money),
                total_price: money(&li.total_money),
            }
        })
        .collect();
    let pickups = order
        .fulfillments
        .iter()
        .enumerate()
        .filter_map(|(idx, f)| {
            let details = f.pickup_details.as_ref()?;
            Some(CanonicalPickup {
                origin_id: f.uid.clone().unwrap_or_else(|| format!("{}-{idx}", order.id)),
                pickup_at: details.pickup_at,
                recipient_name: details.recipient.as_ref().and_then(|r| r.display_name.clone()),
            })
        })
        .collect();

    CanonicalOrder {
        origin_id: order.id.clone(),
        location_id: order.location_id.clone(),
        state: order.state.clone().unwrap_or_else(|| "OPEN".to_string()),
        version: order.version,
        customer_origin_id: order.customer_id.clone(),
        ordered_at: order.created_at,
        subtotal,
        tax,
        total,
        currency: order
            .total_money
            .as_ref()
            .map(|m| m.currency.clone())
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        line_items,
        pickups,
    }
}

pub fn map_customer(customer: &sq::Customer) -> CanonicalCustomer {
    let address = customer.address.clone().unwrap_or_default();
    CanonicalCustomer {
        origin_id: customer.id.clone(),
        first_name: customer.given_name.clone(),
        last_name: customer.family_name.clone(),
        email: customer.email_address.clone(),
        phone: customer.phone_number.clone(),
        address1: address.address_line_1,
        address2: address.address_line_2,
        city: address.locality,
        state: address.administrative_district_level_1,
        zip_code: address.postal_code,
        country: address.country,
    }
}

pub fn map_location(location: &sq::Location) -> CanonicalLocation {
    let address = location.address.clone().unwrap_or_default();
    CanonicalLocation {
        pos_id: location.id.clone(),
        name: location.name.clone().unwrap_or_else(|| location.id.clone()),
        address1: address.address_line_1,
        address2: address.address_line_2,
        city: address.locality,
        state: address.administrative_district_level_1,
        zip_code: address.postal_code,
        country: address.country,
    }
}
