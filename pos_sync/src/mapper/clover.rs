//! Clover catalog, order, customer and location mapping.
//!
//! Clover has no item/variation split: every inventory item is sellable on
//! its own and items of one item group are the variants of a single product.
//! Ungrouped items become single-variant products. Clover merchants have one
//! location, so items are visible at every known location.

use indexmap::IndexMap;
use pos_client::providers::clover_rest::response as cl;

use crate::{
    canonical::{
        CanonicalCategory, CanonicalCustomer, CanonicalLineItem, CanonicalLocation,
        CanonicalOrder, CanonicalProduct, CanonicalVariant, MappedCatalog,
    },
    mapper::{DEFAULT_CURRENCY, MapContext},
    money::{Cents, price_range},
    tz,
};

pub fn map_catalog(items: &[cl::Item], ctx: MapContext<'_>) -> MappedCatalog {
    let mut products: IndexMap<String, CanonicalProduct> = IndexMap::new();
    let mut categories: IndexMap<String, CanonicalCategory> = IndexMap::new();

    for item in items {
        let item_categories = item
            .categories
            .as_ref()
            .map(|c| c.as_slice())
            .unwrap_or_default();
        for category in item_categories {
            categories
                .entry(category.id.clone())
                .or_insert_with(|| CanonicalCategory {
                    origin_id: category.id.clone(),
                    name: category.name.clone().unwrap_or_default(),
                });
        }

        let item_name = item.name.clone().unwrap_or_default();
        let (product_id, product_name) = match &item.item_group {
            Some(group) => (
                group.id.clone(),
                group.name.clone().unwrap_or_else(|| item_name.clone()),
            ),
            None => (item.id.clone(), item_name.clone()),
        };

        let variant = CanonicalVariant {
            origin_id: item.id.clone(),
            origin_parent_id: Some(product_id.clone()),
            name: item_name,
            description: item.alternate_name.clone().unwrap_or_default(),
            sku: item.sku.clone(),
            upc: item.code.clone(),
            price: Cents::from_minor_units(item.price.unwrap_or(0)),
            currency: DEFAULT_CURRENCY.to_string(),
            stock: item.item_stock.as_ref().and_then(|s| s.units()),
            locations: ctx.location_ids.to_vec(),
            location_prices: Default::default(),
            image_ids: Vec::new(),
            category_ids: item_categories.iter().map(|c| c.id.clone()).collect(),
        };

        products
            .entry(product_id.clone())
            .or_insert_with(|| CanonicalProduct {
                origin_id: product_id,
                name: product_name,
                locations: ctx.location_ids.to_vec(),
                variants: Vec::new(),
                prices: Default::default(),
            })
            .variants
            .push(variant);
    }

    let products = products
        .into_values()
        .filter(|p| !p.locations.is_empty())
        .map(|mut p| {
            let prices: Vec<Cents> = p.variants.iter().map(|v| v.price).collect();
            p.prices = price_range(&prices);
            p
        })
        .collect();

    MappedCatalog {
        products,
        categories: categories.into_values().collect(),
        images: Vec::new(),
        deleted_ids: Vec::new(),
    }
}

pub fn map_order(order: &cl::Order) -> CanonicalOrder {
    let line_items: Vec<CanonicalLineItem> = order
        .line_items
        .as_ref()
        .map(|l| l.as_slice())
        .unwrap_or_default()
        .iter()
        .map(|li| {
            // unitQty is in thousandths and only set for weighed items
            let quantity = li.unit_qty.map(|q| (q / 1000).max(1)).unwrap_or(1);
            let unit_price = Cents::from_minor_units(li.price.unwrap_or(0));
            let total = Cents(unit_price.0 * quantity);
            CanonicalLineItem {
                catalog_item_id: li.item.as_ref().map(|r| r.id.clone()),
                name: li.name.clone().unwrap_or_else(|| "Custom amount".to_string()),
                quantity,
                unit_price,
                variation_total: total,
                tax: Cents::ZERO,
                total_price: total,
            }
        })
        .collect();
    let total = Cents::from_minor_units(order.total.unwrap_or(0));

    CanonicalOrder {
        origin_id: order.id.clone(),
        location_id: None,
        state: order.state.clone().unwrap_or_else(|| "open".to_string()),
        version: None,
        customer_origin_id: order
            .customers
            .as_ref()
            .and_then(|c| c.as_slice().first())
            .map(|c| c.id.clone()),
        ordered_at: order.created_time.and_then(tz::from_epoch_millis),
        subtotal: total,
        tax: Cents::ZERO,
        total,
        currency: order
            .currency
            .clone()
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        line_items,
        pickups: Vec::new(),
    }
}

pub fn map_customer(customer: &cl::Customer) -> CanonicalCustomer {
    let email = customer
        .email_addresses
        .as_ref()
        .and_then(|e| e.as_slice().iter().find_map(|e| e.email_address.clone()));
    let phone = customer
        .phone_numbers
        .as_ref()
        .and_then(|p| p.as_slice().iter().find_map(|p| p.phone_number.clone()));
    let address = customer
        .addresses
        .as_ref()
        .and_then(|a| a.as_slice().first().cloned())
        .unwrap_or_default();
    CanonicalCustomer {
        origin_id: customer.id.clone(),
        first_name: customer.first_name.clone(),
        last_name: customer.last_name.clone(),
        email,
        phone,
        address1: address.address1,
        address2: address.address2,
        city: address.city,
        state: address.state,
        zip_code: address.zip,
        country: address.country,
    }
}

pub fn map_location(merchant: &cl::Merchant) -> CanonicalLocation {
    let address = merchant.address.clone().unwrap_or_default();
    CanonicalLocation {
        pos_id: merchant.id.clone(),
        name: merchant.name.clone().unwrap_or_else(|| merchant.id.clone()),
        address1: address.address1,
        address2: address.address2,
        city: address.city,
        state: address.state,
        zip_code: address.zip,
        country: address.country,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn items(value: serde_json::Value) -> Vec<cl::Item> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn grouped_items_become_variants_of_one_product() {
        let ids = vec!["MERCHANT".to_string()];
        let page = items(json!([
            {"id": "I1", "name": "Shirt S", "price": 1500,
             "itemGroup": {"id": "G1", "name": "Shirt"},
             "itemStock": {"stockCount": 4},
             "categories": {"elements": [{"id": "C1", "name": "Apparel"}]}},
            {"id": "I2", "name": "Shirt L", "price": 1800,
             "itemGroup": {"id": "G1"},
             "categories": {"elements": [{"id": "C1", "name": "Apparel"}]}},
            {"id": "I3", "name": "Mug", "price": 900}
        ]));

        let mapped = map_catalog(&page, MapContext { location_ids: &ids });
        assert_eq!(mapped.products.len(), 2);
        let shirt = &mapped.products[0];
        assert_eq!(shirt.origin_id, "G1");
        assert_eq!(shirt.name, "Shirt");
        assert_eq!(shirt.variants.len(), 2);
        assert_eq!(shirt.variants[0].stock, Some(4));
        assert_eq!(shirt.prices.min_price, Cents(1500));
        assert_eq!(shirt.prices.max_price, Cents(1800));

        let mug = &mapped.products[1];
        assert_eq!(mug.origin_id, "I3");
        assert_eq!(mug.prices.price, Cents(900));
        assert_eq!(mug.variants[0].origin_parent_id.as_deref(), Some("I3"));

        assert_eq!(mapped.categories.len(), 1);
        assert_eq!(mapped.categories[0].name, "Apparel");
    }

    #[test]
    fn no_known_location_maps_no_products() {
        let page = items(json!([{"id": "I1", "name": "Mug", "price": 900}]));
        let mapped = map_catalog(&page, MapContext { location_ids: &[] });
        assert!(mapped.products.is_empty());
    }

    #[test]
    fn order_quantities_and_customer() {
        let order: cl::Order = serde_json::from_value(json!({
            "id": "O1",
            "state": "locked",
            "total": 2400,
            "currency": "USD",
            "createdTime": 1_700_000_000_000i64,
            "customers": {"elements": [{"id": "CU1"}]},
            "lineItems": {"elements": [
                {"id": "LI1", "item": {"id": "I1"}, "name": "Shirt", "price": 1500},
                {"id": "LI2", "item": {"id": "I3"}, "name": "Mug", "price": 900}
            ]}
        }))
        .unwrap();

        let mapped = map_order(&order);
        assert_eq!(mapped.customer_origin_id.as_deref(), Some("CU1"));
        assert_eq!(mapped.quantity(), 2);
        assert_eq!(mapped.total, Cents(2400));
        assert!(mapped.ordered_at.is_some());
    }
}
