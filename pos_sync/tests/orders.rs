use chrono::{Duration, Utc};
use diesel::SqliteConnection;
use pos_sync::SyncError;
use pos_sync::context::SyncContext;
use pos_sync::inventory::{self, SyncCursor, SyncMode};
use pos_sync::orders::{self, ReservationDraft, UNKNOWN_ITEM_NAME, expiry};
use pos_sync::repo::{catalog, expiry as expiry_repo, locations, orders as order_repo};
use serde_json::json;
use std::sync::Arc;

mod common;
use common::{FakeProvider, seed_location, seed_retailer, setup_db, square_item, test_context};

struct Shop {
    ctx: SyncContext,
    provider: Arc<FakeProvider>,
    retailer_id: i32,
    variant_id: i32,
}

// One retailer at L1 selling "A1" at 5.00 with 3 units on hand.
async fn shop(conn: &mut SqliteConnection) -> Shop {
    let retailer = seed_retailer(conn);
    seed_location(conn, retailer.id, "L1");
    let provider = FakeProvider::with(|s| {
        s.pages = vec![vec![square_item("A", "Apple", &[("A1", 500)])]];
        s.stock.insert(("A1".into(), "L1".into()), 3);
    });
    let ctx = test_context(provider.clone());
    let outcome = inventory::run_page(&ctx, conn, &SyncCursor::start(retailer.id), SyncMode::Full).await;
    assert!(outcome.success);

    let inventory = locations::find_inventory(conn, retailer.id, "L1").unwrap().unwrap();
    let product = catalog::find_product(conn, "A", inventory.id).unwrap().unwrap();
    let variant = catalog::find_variant(conn, product.id, "A1").unwrap().unwrap();
    Shop {
        ctx,
        provider,
        retailer_id: retailer.id,
        variant_id: variant.id,
    }
}

fn draft(shop: &Shop, quantity: i64) -> ReservationDraft {
    ReservationDraft {
        retailer_id: shop.retailer_id,
        variant_id: shop.variant_id,
        quantity,
        shopper_id: Some("shopper-7".into()),
        customer_id: None,
        pickup: None,
    }
}

#[tokio::test]
async fn reservation_is_stored_after_provider_accepts() {
    let (_db, mut conn) = setup_db();
    let shop = shop(&mut conn).await;

    let order = orders::create_reservation(&shop.ctx, &mut conn, &draft(&shop, 2))
        .await
        .unwrap();
    assert_eq!(order.status, "RESERVED");
    assert_eq!(order.origin_id.as_deref(), Some("ORD-1"));
    assert_eq!(order.version, 1);
    assert_eq!(order.quantity, 2);
    assert_eq!(order.total, 1000);
    assert_eq!(order.shopper_id.as_deref(), Some("shopper-7"));
    assert_eq!(order.order_code, Some(order_repo::order_code(order.id)));

    let items = order_repo::order_items_of(&mut conn, order.id).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].variant_id, Some(shop.variant_id));
    assert!(!items[0].is_custom);

    let task = expiry_repo::get_task(&mut conn, order.id).unwrap().unwrap();
    assert_eq!(Some(task.fire_at), order.time_limit);
    assert!(task.fired_at.is_none());

    let state = shop.provider.state.lock().unwrap();
    let created = &state.created;
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].location_id, "L1");
    assert_eq!(created[0].line_items[0].catalog_item_id, "A1");
}

#[tokio::test]
async fn reservation_beyond_stock_never_reaches_provider() {
    let (_db, mut conn) = setup_db();
    let shop = shop(&mut conn).await;

    for quantity in [0, 4] {
        let err = orders::create_reservation(&shop.ctx, &mut conn, &draft(&shop, quantity))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)), "{err:?}");
    }
    assert!(shop.provider.state.lock().unwrap().created.is_empty());
}

#[tokio::test]
async fn update_bumps_version() {
    let (_db, mut conn) = setup_db();
    let shop = shop(&mut conn).await;
    let order = orders::create_reservation(&shop.ctx, &mut conn, &draft(&shop, 1))
        .await
        .unwrap();

    let updated = orders::update_reservation(&shop.ctx, &mut conn, order.id, order.version, 3)
        .await
        .unwrap();
    assert_eq!(updated.version, 2);
    assert_eq!(updated.quantity, 3);
    assert_eq!(updated.total, 1500);
    let items = order_repo::order_items_of(&mut conn, order.id).unwrap();
    assert_eq!(items[0].quantity, 3);
}

#[tokio::test]
async fn stale_version_is_rejected_before_any_call() {
    let (_db, mut conn) = setup_db();
    let shop = shop(&mut conn).await;
    let order = orders::create_reservation(&shop.ctx, &mut conn, &draft(&shop, 1))
        .await
        .unwrap();

    let err = orders::update_reservation(&shop.ctx, &mut conn, order.id, order.version + 4, 2)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SyncError::VersionConflict {
            expected: 5,
            found: Some(1)
        }
    ));
    assert!(shop.provider.state.lock().unwrap().updated.is_empty());
}

#[tokio::test]
async fn provider_version_rejection_leaves_order_unchanged() {
    let (_db, mut conn) = setup_db();
    let shop = shop(&mut conn).await;
    let order = orders::create_reservation(&shop.ctx, &mut conn, &draft(&shop, 1))
        .await
        .unwrap();
    shop.provider.edit(|s| s.reject_versions = true);

    let err = orders::update_reservation(&shop.ctx, &mut conn, order.id, order.version, 2)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::VersionConflict { expected: 1, found: None }));

    let err = orders::cancel_reservation(&shop.ctx, &mut conn, order.id, order.version)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::VersionConflict { .. }));

    let stored = order_repo::get_order(&mut conn, order.id).unwrap();
    assert_eq!((stored.status.as_str(), stored.version, stored.quantity), ("RESERVED", 1, 1));
}

#[tokio::test]
async fn cancel_releases_reservation_and_its_expiry() {
    let (_db, mut conn) = setup_db();
    let shop = shop(&mut conn).await;
    let order = orders::create_reservation(&shop.ctx, &mut conn, &draft(&shop, 1))
        .await
        .unwrap();

    let cancelled = orders::cancel_reservation(&shop.ctx, &mut conn, order.id, order.version)
        .await
        .unwrap();
    assert_eq!(cancelled.status, "CANCELLED");
    assert_eq!(cancelled.version, 2);
    assert_eq!(
        shop.provider.state.lock().unwrap().deleted,
        vec![("ORD-1".to_string(), Some(1))]
    );
    assert!(expiry_repo::get_task(&mut conn, order.id).unwrap().unwrap().fired_at.is_some());

    let later = Utc::now() + Duration::days(1);
    assert_eq!(expiry::sweep(&mut conn, later).unwrap(), 0);
    let err = orders::cancel_reservation(&shop.ctx, &mut conn, order.id, 2)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Validation(_)));
}

#[tokio::test]
async fn reservation_expires_exactly_once() {
    let (_db, mut conn) = setup_db();
    let shop = shop(&mut conn).await;
    let order = orders::create_reservation(&shop.ctx, &mut conn, &draft(&shop, 1))
        .await
        .unwrap();

    assert_eq!(expiry::sweep(&mut conn, Utc::now()).unwrap(), 0);
    let later = Utc::now() + Duration::days(1);
    assert_eq!(expiry::sweep(&mut conn, later).unwrap(), 1);
    assert_eq!(expiry::sweep(&mut conn, later).unwrap(), 0);
    assert_eq!(order_repo::get_order(&mut conn, order.id).unwrap().status, "EXPIRED");
}

#[tokio::test]
async fn reconcile_replaces_lines_and_keeps_unknown_items() {
    let (_db, mut conn) = setup_db();
    let shop = shop(&mut conn).await;
    shop.provider.edit(|s| {
        s.orders.insert(
            "POS-9".into(),
            json!({
                "id": "POS-9",
                "location_id": "L1",
                "state": "OPEN",
                "version": 4,
                "total_money": {"amount": 1800, "currency": "USD"},
                "total_tax_money": {"amount": 100, "currency": "USD"},
                "line_items": [
                    {"catalog_object_id": "A1", "name": "Apple", "quantity": "2",
                     "base_price_money": {"amount": 500, "currency": "USD"}},
                    {"catalog_object_id": "GONE", "name": "Mystery", "quantity": "1",
                     "base_price_money": {"amount": 700, "currency": "USD"}},
                    {"name": "Gift wrap", "quantity": "1",
                     "base_price_money": {"amount": 100, "currency": "USD"}}
                ]
            }),
        );
    });

    let order = orders::reconcile_order(&shop.ctx, &mut conn, shop.retailer_id, "POS-9")
        .await
        .unwrap();
    assert_eq!(order.status, "OPEN");
    assert_eq!(order.version, 4);
    assert_eq!(order.total, 1800);
    assert_eq!(order.quantity, 4);

    let items = order_repo::order_items_of(&mut conn, order.id).unwrap();
    let summary: Vec<(Option<i32>, &str, bool)> = items
        .iter()
        .map(|i| (i.variant_id, i.name.as_str(), i.is_custom))
        .collect();
    assert_eq!(
        summary,
        vec![
            (Some(shop.variant_id), "Apple", false),
            (None, UNKNOWN_ITEM_NAME, true),
            (None, "Gift wrap", true),
        ]
    );

    // A second pass replaces rather than appends.
    shop.provider.edit(|s| {
        s.orders.get_mut("POS-9").unwrap()["line_items"] =
            json!([{"catalog_object_id": "A1", "name": "Apple", "quantity": "1"}]);
    });
    let again = orders::reconcile_order(&shop.ctx, &mut conn, shop.retailer_id, "POS-9")
        .await
        .unwrap();
    assert_eq!(again.id, order.id);
    assert_eq!(order_repo::order_items_of(&mut conn, order.id).unwrap().len(), 1);
}

#[tokio::test]
async fn local_hold_survives_open_but_not_completion() {
    let (_db, mut conn) = setup_db();
    let shop = shop(&mut conn).await;
    let order = orders::create_reservation(&shop.ctx, &mut conn, &draft(&shop, 1))
        .await
        .unwrap();

    let held = orders::reconcile_order(&shop.ctx, &mut conn, shop.retailer_id, "ORD-1")
        .await
        .unwrap();
    assert_eq!(held.id, order.id);
    assert_eq!(held.status, "RESERVED");
    assert_eq!(held.shopper_id.as_deref(), Some("shopper-7"));
    assert_eq!(held.time_limit, order.time_limit);

    shop.provider.edit(|s| {
        let remote = s.orders.get_mut("ORD-1").unwrap();
        remote["state"] = json!("COMPLETED");
        remote["version"] = json!(3);
    });
    let done = orders::reconcile_order(&shop.ctx, &mut conn, shop.retailer_id, "ORD-1")
        .await
        .unwrap();
    assert_eq!(done.status, "COMPLETED");
    assert_eq!(done.version, 3);

    let later = Utc::now() + Duration::days(1);
    assert_eq!(expiry::sweep(&mut conn, later).unwrap(), 0);
    assert_eq!(order_repo::get_order(&mut conn, order.id).unwrap().status, "COMPLETED");
}

#[tokio::test]
async fn poll_reconciles_every_listed_order() {
    let (_db, mut conn) = setup_db();
    let shop = shop(&mut conn).await;
    shop.provider.edit(|s| {
        for id in ["P-1", "P-2"] {
            s.orders.insert(
                id.into(),
                json!({"id": id, "location_id": "L1", "state": "OPEN", "version": 1, "line_items": []}),
            );
        }
    });

    let report = orders::sync_orders(&shop.ctx, &mut conn, shop.retailer_id)
        .await
        .unwrap();
    assert_eq!((report.reconciled, report.failed), (2, 0));
    assert!(order_repo::find_by_origin(&mut conn, "P-2").unwrap().is_some());
}
