use std::sync::{Arc, Barrier};
use std::thread;

use chrono::{Duration, Utc};
use pos_client::models::Origin;
use pos_sync::db::connection;
use pos_sync::inventory::{self, SyncCursor, SyncMode};
use pos_sync::jobs::KIND_WEBHOOK_EVENT;
use pos_sync::repo::catalog;
use pos_sync::repo::orders as order_repo;
use pos_sync::repo::retailers::{self, NewRetailer};
use pos_sync::repo::failed_tasks;
use pos_sync::repo::webhook_events::{self, Claim};
use pos_sync::webhook::{WebhookAck, WebhookAction, WebhookDispatcher, WebhookReject};
use serde_json::json;

mod common;
use common::{
    FakeProvider, MERCHANT, deleted_object, seed_location, seed_retailer, setup_db, square_item,
    test_context,
};

fn order_event(event_id: &str, merchant_id: &str, order_id: &str) -> Vec<u8> {
    json!({
        "merchant_id": merchant_id,
        "event_id": event_id,
        "type": "order.updated",
        "data": {
            "type": "order_updated",
            "id": order_id,
            "object": {"order_updated": {"order_id": order_id, "state": "OPEN", "version": 2}}
        }
    })
    .to_string()
    .into_bytes()
}

fn provider_with_order(order_id: &str) -> Arc<FakeProvider> {
    let order_id = order_id.to_string();
    FakeProvider::with(move |s| {
        s.orders.insert(
            order_id.clone(),
            json!({"id": order_id, "location_id": "L1", "state": "OPEN", "version": 2, "line_items": []}),
        );
    })
}

#[test]
fn concurrent_claims_have_one_winner() {
    let (db, _conn) = setup_db();
    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let path = db.path.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                let mut conn = connection::connect_sqlite(&path).expect("connect");
                barrier.wait();
                webhook_events::claim(
                    &mut conn,
                    MERCHANT,
                    "evt-race",
                    "order.updated",
                    Utc::now(),
                    Duration::minutes(5),
                )
                .expect("claim")
            })
        })
        .collect();
    let claims: Vec<Claim> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(claims.iter().filter(|c| **c == Claim::Claimed).count(), 1);
    assert!(claims.contains(&Claim::InProgress));
}

#[test]
fn stale_processing_claim_is_reclaimed() {
    let (_db, mut conn) = setup_db();
    let ttl = Duration::minutes(5);
    let start = Utc::now();

    assert_eq!(
        webhook_events::claim(&mut conn, MERCHANT, "evt-1", "x", start, ttl).unwrap(),
        Claim::Claimed
    );
    assert_eq!(
        webhook_events::claim(&mut conn, MERCHANT, "evt-1", "x", start + Duration::minutes(1), ttl).unwrap(),
        Claim::InProgress
    );
    assert_eq!(
        webhook_events::claim(&mut conn, MERCHANT, "evt-1", "x", start + Duration::minutes(6), ttl).unwrap(),
        Claim::Claimed
    );

    webhook_events::mark_success(&mut conn, MERCHANT, "evt-1").unwrap();
    assert_eq!(
        webhook_events::claim(&mut conn, MERCHANT, "evt-1", "x", start + Duration::hours(1), ttl).unwrap(),
        Claim::Done
    );
}

#[tokio::test]
async fn order_event_is_processed_once() {
    let (_db, mut conn) = setup_db();
    let retailer = seed_retailer(&mut conn);
    seed_location(&mut conn, retailer.id, "L1");
    let dispatcher = WebhookDispatcher::new(test_context(provider_with_order("P-1")));
    let body = order_event("evt-1", MERCHANT, "P-1");

    let accepted = dispatcher.accept(&mut conn, Origin::Square, &body).unwrap();
    assert_eq!(accepted.claimed.len(), 1);
    assert_eq!(accepted.claimed[0].retailer_id, retailer.id);
    assert_eq!(
        accepted.claimed[0].event.action,
        WebhookAction::ReconcileOrder("P-1".into())
    );
    assert_eq!(accepted.response(), Ok(WebhookAck::Processed));

    // Redelivered while the first copy is still running.
    let racing = dispatcher.accept(&mut conn, Origin::Square, &body).unwrap();
    assert_eq!(racing.response(), Err(WebhookReject::RetryLater));

    let report = dispatcher.process(&mut conn, accepted.claimed).await;
    assert_eq!((report.processed, report.failed), (1, 0));
    assert!(order_repo::find_by_origin(&mut conn, "P-1").unwrap().is_some());
    assert_eq!(
        webhook_events::event_state(&mut conn, MERCHANT, "evt-1").unwrap().as_deref(),
        Some(webhook_events::STATE_SUCCESS)
    );

    let again = dispatcher.handle(&mut conn, Origin::Square, &body).await;
    assert_eq!(again, Ok(WebhookAck::Duplicate));
}

#[tokio::test]
async fn failed_event_is_released_for_redelivery() {
    let (_db, mut conn) = setup_db();
    let retailer = seed_retailer(&mut conn);
    seed_location(&mut conn, retailer.id, "L1");
    let provider = FakeProvider::with(|_| {});
    let dispatcher = WebhookDispatcher::new(test_context(provider.clone()));
    let body = order_event("evt-2", MERCHANT, "P-404");

    let first = dispatcher.handle(&mut conn, Origin::Square, &body).await;
    assert!(matches!(first, Err(WebhookReject::Internal(_))));
    assert_eq!(webhook_events::event_state(&mut conn, MERCHANT, "evt-2").unwrap(), None);
    assert_eq!(provider.state.lock().unwrap().order_fetches, 3);

    let failed = failed_tasks::list_failed_tasks(&mut conn).unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].kind, KIND_WEBHOOK_EVENT);
    assert_eq!(failed[0].retailer_id, Some(retailer.id));
    assert_eq!(failed[0].attempts, 3);
    let payload: serde_json::Value = serde_json::from_str(&failed[0].payload).unwrap();
    assert_eq!(
        payload,
        json!({"merchant_id": MERCHANT, "event_id": "evt-2", "event_type": "order.updated"})
    );

    provider.edit(|s| {
        s.orders.insert(
            "P-404".into(),
            json!({"id": "P-404", "location_id": "L1", "state": "OPEN", "version": 1, "line_items": []}),
        );
    });
    let second = dispatcher.handle(&mut conn, Origin::Square, &body).await;
    assert_eq!(second, Ok(WebhookAck::Processed));
}

#[tokio::test]
async fn transient_failure_is_retried_within_one_delivery() {
    let (_db, mut conn) = setup_db();
    let retailer = seed_retailer(&mut conn);
    seed_location(&mut conn, retailer.id, "L1");
    let provider = provider_with_order("P-7");
    provider.edit(|s| s.order_timeouts = 2);
    let dispatcher = WebhookDispatcher::new(test_context(provider.clone()));

    let ack = dispatcher
        .handle(&mut conn, Origin::Square, &order_event("evt-7", MERCHANT, "P-7"))
        .await;
    assert_eq!(ack, Ok(WebhookAck::Processed));
    assert_eq!(provider.state.lock().unwrap().order_fetches, 3);
    assert!(order_repo::find_by_origin(&mut conn, "P-7").unwrap().is_some());
    assert!(failed_tasks::list_failed_tasks(&mut conn).unwrap().is_empty());
}

#[tokio::test]
async fn catalog_event_waits_for_a_running_chain() {
    let (_db, mut conn) = setup_db();
    let retailer = seed_retailer(&mut conn);
    seed_location(&mut conn, retailer.id, "L1");
    let provider = FakeProvider::with(|s| {
        s.pages = vec![vec![square_item("A", "Apple", &[("A1", 500)])]];
    });
    let ctx = test_context(provider.clone());
    let outcome =
        inventory::run_page(&ctx, &mut conn, &SyncCursor::start(retailer.id), SyncMode::Full).await;
    assert!(outcome.success, "page failed: {:?}", outcome.error);

    provider.edit(|s| s.pages = vec![vec![deleted_object("A", "ITEM")]]);
    let body = json!({
        "merchant_id": MERCHANT,
        "event_id": "evt-cat",
        "type": "catalog.version.updated",
        "data": {
            "type": "catalog",
            "id": "cv-1",
            "object": {"catalog_version": {"updated_at": "2024-05-01T10:20:30Z"}}
        }
    })
    .to_string();
    let dispatcher = WebhookDispatcher::new(ctx);

    assert!(retailers::try_start_sync(&mut conn, retailer.id).unwrap());
    let busy = dispatcher.handle(&mut conn, Origin::Square, body.as_bytes()).await;
    assert!(matches!(busy, Err(WebhookReject::Internal(_))));
    assert_eq!(webhook_events::event_state(&mut conn, MERCHANT, "evt-cat").unwrap(), None);
    assert!(
        catalog::find_retailer_variant(&mut conn, retailer.id, "A1", Some("L1"))
            .unwrap()
            .is_some()
    );
    let failed = failed_tasks::list_failed_tasks(&mut conn).unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].kind, KIND_WEBHOOK_EVENT);

    retailers::finish_sync(&mut conn, retailer.id).unwrap();
    let redelivered = dispatcher.handle(&mut conn, Origin::Square, body.as_bytes()).await;
    assert_eq!(redelivered, Ok(WebhookAck::Processed));
    assert!(
        catalog::find_retailer_variant(&mut conn, retailer.id, "A1", Some("L1"))
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn approved_retailer_wins_over_older_rows_for_the_merchant() {
    let (_db, mut conn) = setup_db();
    retailers::create_retailer(
        &mut conn,
        &NewRetailer {
            name: "Corner Shop (old app)",
            origin: Origin::Square,
            app_id: "old-app",
            app_secret: "old-secret",
            merchant_id: Some(MERCHANT),
        },
    )
    .unwrap();
    let retailer = seed_retailer(&mut conn);
    seed_location(&mut conn, retailer.id, "L1");

    let found = retailers::find_approved_by_merchant(&mut conn, Origin::Square, MERCHANT, None)
        .unwrap()
        .map(|r| r.id);
    assert_eq!(found, Some(retailer.id));
    assert!(
        retailers::find_approved_by_merchant(&mut conn, Origin::Square, MERCHANT, Some("old-app"))
            .unwrap()
            .is_none()
    );

    let dispatcher = WebhookDispatcher::new(test_context(provider_with_order("P-1")));
    let ack = dispatcher
        .handle(&mut conn, Origin::Square, &order_event("evt-8", MERCHANT, "P-1"))
        .await;
    assert_eq!(ack, Ok(WebhookAck::Processed));
    let order = order_repo::find_by_origin(&mut conn, "P-1").unwrap().unwrap();
    assert_eq!(order.retailer_id, retailer.id);
}

#[tokio::test]
async fn unknown_merchant_is_ignored_without_a_claim() {
    let (_db, mut conn) = setup_db();
    seed_retailer(&mut conn);
    let dispatcher = WebhookDispatcher::new(test_context(provider_with_order("P-1")));

    let ack = dispatcher
        .handle(&mut conn, Origin::Square, &order_event("evt-3", "M-OTHER", "P-1"))
        .await;
    assert_eq!(ack, Ok(WebhookAck::Ignored));
    assert_eq!(webhook_events::event_state(&mut conn, "M-OTHER", "evt-3").unwrap(), None);
    assert!(order_repo::find_by_origin(&mut conn, "P-1").unwrap().is_none());
}

#[tokio::test]
async fn unhandled_event_type_is_ignored() {
    let (_db, mut conn) = setup_db();
    seed_retailer(&mut conn);
    let dispatcher = WebhookDispatcher::new(test_context(FakeProvider::with(|_| {})));
    let body = json!({
        "merchant_id": MERCHANT,
        "event_id": "evt-4",
        "type": "payment.created",
        "data": {"type": "payment", "id": "PAY-1", "object": {}}
    })
    .to_string();

    let ack = dispatcher.handle(&mut conn, Origin::Square, body.as_bytes()).await;
    assert_eq!(ack, Ok(WebhookAck::Ignored));
    assert_eq!(webhook_events::event_state(&mut conn, MERCHANT, "evt-4").unwrap(), None);
}

#[tokio::test]
async fn malformed_body_is_rejected() {
    let (_db, mut conn) = setup_db();
    let dispatcher = WebhookDispatcher::new(test_context(FakeProvider::with(|_| {})));

    let ack = dispatcher.handle(&mut conn, Origin::Square, b"{not json").await;
    let Err(reject) = ack else {
        panic!("expected a rejection, got {ack:?}");
    };
    assert_eq!(reject.status_code(), 400);
}

#[tokio::test]
async fn clover_verification_is_acknowledged() {
    let (_db, mut conn) = setup_db();
    let dispatcher = WebhookDispatcher::new(test_context(FakeProvider::with(|_| {})));
    let body = json!({"verificationCode": "abc-123"}).to_string();

    let ack = dispatcher.handle(&mut conn, Origin::Clover, body.as_bytes()).await;
    assert_eq!(ack, Ok(WebhookAck::Verified));
}
