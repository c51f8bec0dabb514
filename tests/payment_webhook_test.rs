mod common;

use axum::http::StatusCode;
use chrono::Utc;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

use common::{booking_request, sign_webhook, TestApp, WEBHOOK_SECRET};

async fn seeded_booking(app: &TestApp) -> (String, String) {
    let property = app.seed_property(dec!(100)).await;
    app.seed_room_unit(property.id, "DLX", 2).await;
    let (_, body) = app
        .post("/api/v1/bookings", booking_request(property.id, "DLX", 10, 2))
        .await;
    (
        body["data"]["id"].as_str().unwrap().to_string(),
        body["data"]["payment_order_ref"].as_str().unwrap().to_string(),
    )
}

fn capture_event(event_id: &str, order_ref: &str) -> Value {
    json!({
        "event_id": event_id,
        "event_type": "payment.captured",
        "order_ref": order_ref,
        "amount": "200"
    })
}

#[tokio::test]
async fn rejects_invalid_signature() {
    let app = TestApp::new().await;
    let (_, order_ref) = seeded_booking(&app).await;

    let body = capture_event("evt_1", &order_ref).to_string();
    let ts = Utc::now().timestamp().to_string();
    let (status, _) = app
        .send_raw_webhook(body, &ts, "deadbeefdeadbeef")
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn rejects_stale_timestamp() {
    let app = TestApp::new().await;
    let (_, order_ref) = seeded_booking(&app).await;

    let body = capture_event("evt_1", &order_ref).to_string();
    let ts = (Utc::now().timestamp() - 3600).to_string();
    let signature = sign_webhook(WEBHOOK_SECRET, &ts, body.as_bytes());
    let (status, _) = app.send_raw_webhook(body, &ts, &signature).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn capture_confirms_booking() {
    let app = TestApp::new().await;
    let (id, order_ref) = seeded_booking(&app).await;

    let (status, _) = app.send_webhook(capture_event("evt_1", &order_ref)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get(&format!("/api/v1/bookings/{id}")).await;
    assert_eq!(body["data"]["status"], "confirmed");
    assert_eq!(body["data"]["payment_status"], "completed");
}

#[tokio::test]
async fn duplicate_event_is_acknowledged_once() {
    let app = TestApp::new().await;
    let (id, order_ref) = seeded_booking(&app).await;

    let (status, body) = app.send_webhook(capture_event("evt_1", &order_ref)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ok".to_string()));

    let (status, body) = app.send_webhook(capture_event("evt_1", &order_ref)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("duplicate".to_string()));

    let (_, body) = app.get(&format!("/api/v1/bookings/{id}")).await;
    assert_eq!(body["data"]["status"], "confirmed");
}

#[tokio::test]
async fn capture_after_cancellation_flags_refund() {
    let app = TestApp::new().await;
    let (id, order_ref) = seeded_booking(&app).await;

    app.post(&format!("/api/v1/bookings/{id}/cancel"), json!({}))
        .await;

    let (status, _) = app.send_webhook(capture_event("evt_late", &order_ref)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get(&format!("/api/v1/bookings/{id}")).await;
    assert_eq!(body["data"]["status"], "cancelled");
    assert_eq!(body["data"]["refund_required"], true);
}

#[tokio::test]
async fn payment_failure_keeps_booking_pending() {
    let app = TestApp::new().await;
    let (id, order_ref) = seeded_booking(&app).await;

    let (status, _) = app
        .send_webhook(json!({
            "event_id": "evt_fail",
            "event_type": "payment.failed",
            "order_ref": order_ref,
            "amount": null
        }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get(&format!("/api/v1/bookings/{id}")).await;
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(body["data"]["payment_status"], "failed");
}

#[tokio::test]
async fn refund_cancels_confirmed_booking() {
    let app = TestApp::new().await;
    let (id, order_ref) = seeded_booking(&app).await;

    app.send_webhook(capture_event("evt_cap", &order_ref)).await;
    let (status, _) = app
        .send_webhook(json!({
            "event_id": "evt_refund",
            "event_type": "refund.created",
            "order_ref": order_ref,
            "amount": "200"
        }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get(&format!("/api/v1/bookings/{id}")).await;
    assert_eq!(body["data"]["status"], "cancelled");
    assert_eq!(body["data"]["payment_status"], "refunded");
    assert_eq!(body["data"]["refund_required"], false);
}

#[tokio::test]
async fn unknown_order_ref_is_not_found() {
    let app = TestApp::new().await;
    seeded_booking(&app).await;

    let (status, _) = app
        .send_webhook(capture_event("evt_x", "ord_does_not_exist"))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unhandled_event_type_is_ignored() {
    let app = TestApp::new().await;
    let (id, order_ref) = seeded_booking(&app).await;

    let (status, body) = app
        .send_webhook(json!({
            "event_id": "evt_odd",
            "event_type": "payout.settled",
            "order_ref": order_ref,
            "amount": null
        }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ignored".to_string()));

    let (_, body) = app.get(&format!("/api/v1/bookings/{id}")).await;
    assert_eq!(body["data"]["status"], "pending");
}
