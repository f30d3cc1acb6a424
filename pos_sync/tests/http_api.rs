use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use pos_sync::http::{AppState, router};
use pos_sync::jobs::KIND_WEBHOOK_EVENT;
use pos_sync::repo::{failed_tasks, webhook_events};
use serde_json::{Value, json};
use tower::ServiceExt;

mod common;
use common::{FakeProvider, MERCHANT, TestDb, seed_retailer, setup_db, test_context};

fn app(db: &TestDb) -> axum::Router {
    router(AppState::new(&db.path, test_context(FakeProvider::with(|_| {}))))
}

fn post(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(db: &TestDb, request: Request<Body>) -> (StatusCode, Value) {
    let response = app(db).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn square_order_event(merchant_id: &str, event_id: &str) -> Value {
    json!({
        "merchant_id": merchant_id,
        "event_id": event_id,
        "type": "order.updated",
        "data": {"type": "order_updated", "id": "P-1", "object": {"order_updated": {"order_id": "P-1"}}}
    })
}

#[tokio::test]
async fn webhook_for_unknown_merchant_is_acknowledged() {
    let (db, _conn) = setup_db();
    let (status, body) = send(&db, post("/webhooks/square", &square_order_event("M-NOBODY", "evt-1"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "result": "ignored"}));
}

#[tokio::test]
async fn malformed_webhook_is_a_bad_request() {
    let (db, _conn) = setup_db();
    let (status, body) = send(&db, post("/webhooks/square", &json!({"type": "order.updated"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn event_in_progress_asks_for_redelivery() {
    let (db, mut conn) = setup_db();
    seed_retailer(&mut conn);
    webhook_events::claim(&mut conn, MERCHANT, "evt-2", "order.updated", Utc::now(), Duration::minutes(5))
        .unwrap();

    let (status, body) = send(&db, post("/webhooks/square", &square_order_event(MERCHANT, "evt-2"))).await;
    assert_eq!(status.as_u16(), 425);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn background_failure_is_recorded_after_the_ack() {
    let (db, mut conn) = setup_db();
    let retailer = seed_retailer(&mut conn);
    let provider = FakeProvider::with(|s| s.order_timeouts = usize::MAX);
    let app = router(AppState::new(&db.path, test_context(provider.clone())));

    let response = app
        .oneshot(post("/webhooks/square", &square_order_event(MERCHANT, "evt-9")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let mut failed = Vec::new();
    for _ in 0..100 {
        failed = failed_tasks::list_failed_tasks(&mut conn).unwrap();
        if !failed.is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].kind, KIND_WEBHOOK_EVENT);
    assert_eq!(failed[0].retailer_id, Some(retailer.id));
    assert_eq!(failed[0].attempts, 3);
    assert_eq!(provider.state.lock().unwrap().order_fetches, 3);
    assert_eq!(webhook_events::event_state(&mut conn, MERCHANT, "evt-9").unwrap(), None);
}

#[tokio::test]
async fn processed_event_is_a_duplicate() {
    let (db, mut conn) = setup_db();
    seed_retailer(&mut conn);
    webhook_events::claim(&mut conn, MERCHANT, "evt-3", "order.updated", Utc::now(), Duration::minutes(5))
        .unwrap();
    webhook_events::mark_success(&mut conn, MERCHANT, "evt-3").unwrap();

    let (status, body) = send(&db, post("/webhooks/square", &square_order_event(MERCHANT, "evt-3"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], json!("duplicate"));
}

#[tokio::test]
async fn clover_verification_ping_is_answered() {
    let (db, _conn) = setup_db();
    let (status, body) = send(&db, post("/webhooks/clover", &json!({"verificationCode": "v-1"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], json!("verified"));
}

#[tokio::test]
async fn callback_without_code_is_rejected() {
    let (db, _conn) = setup_db();
    let request = Request::builder()
        .uri("/oauth/square/callback?state=abc")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&db, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], json!("missing code"));
}

#[tokio::test]
async fn clover_callback_for_unknown_retailer_is_rejected() {
    let (db, _conn) = setup_db();
    let request = Request::builder()
        .uri("/oauth/clover/callback/999?code=c&merchant_id=M-CL")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&db, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
