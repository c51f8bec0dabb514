mod common;

use axum::http::StatusCode;
use rust_decimal_macros::dec;
use serde_json::json;

use common::{booking_request, TestApp, TestOptions};

fn zero_grace() -> TestOptions {
    TestOptions {
        grace_minutes: 0,
        ..TestOptions::default()
    }
}

#[tokio::test]
async fn sweep_cancels_unpaid_holds_and_frees_inventory() {
    let app = TestApp::with_options(zero_grace()).await;
    let property = app.seed_property(dec!(100)).await;
    app.seed_room_unit(property.id, "SGL", 1).await;

    let (_, body) = app
        .post("/api/v1/bookings", booking_request(property.id, "SGL", 10, 2))
        .await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let report = app.state.services.expiry.sweep().await.unwrap();
    assert_eq!(report.cancelled, 1);
    assert_eq!(report.skipped, 0);

    let (_, body) = app.get(&format!("/api/v1/bookings/{id}")).await;
    assert_eq!(body["data"]["status"], "cancelled");
    assert_eq!(body["data"]["payment_status"], "pending");

    // the hold is gone, the room can be booked again
    let (status, body) = app
        .post("/api/v1/bookings", booking_request(property.id, "SGL", 10, 2))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
}

#[tokio::test]
async fn sweep_skips_bookings_paid_in_the_meantime() {
    let app = TestApp::with_options(zero_grace()).await;
    let property = app.seed_property(dec!(100)).await;
    app.seed_room_unit(property.id, "SGL", 1).await;

    let (_, body) = app
        .post("/api/v1/bookings", booking_request(property.id, "SGL", 10, 2))
        .await;
    let id = body["data"]["id"].as_str().unwrap().to_string();
    let order_ref = body["data"]["payment_order_ref"].as_str().unwrap().to_string();

    app.send_webhook(json!({
        "event_id": "evt_cap_sweep",
        "event_type": "payment.captured",
        "order_ref": order_ref,
        "amount": "200"
    }))
    .await;

    let report = app.state.services.expiry.sweep().await.unwrap();
    assert_eq!(report.cancelled, 0);

    let (_, body) = app.get(&format!("/api/v1/bookings/{id}")).await;
    assert_eq!(body["data"]["status"], "confirmed");
}

#[tokio::test]
async fn sweep_leaves_holds_inside_the_grace_window() {
    let app = TestApp::new().await;
    let property = app.seed_property(dec!(100)).await;
    app.seed_room_unit(property.id, "SGL", 1).await;

    let (_, body) = app
        .post("/api/v1/bookings", booking_request(property.id, "SGL", 10, 2))
        .await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let report = app.state.services.expiry.sweep().await.unwrap();
    assert_eq!(report.examined, 0);
    assert_eq!(report.cancelled, 0);

    let (_, body) = app.get(&format!("/api/v1/bookings/{id}"))
        .await;
    assert_eq!(body["data"]["status"], "pending");
}

#[tokio::test]
async fn sweep_handles_payment_landing_mid_sweep() {
    // A booking that turns paid between find and cancel is counted as
    // skipped, not cancelled.
    let app = TestApp::with_options(zero_grace()).await;
    let property = app.seed_property(dec!(100)).await;
    app.seed_room_unit(property.id, "SGL", 2).await;

    let (_, unpaid) = app
        .post("/api/v1/bookings", booking_request(property.id, "SGL", 10, 2))
        .await;
    let (_, paid) = app
        .post("/api/v1/bookings", booking_request(property.id, "SGL", 20, 2))
        .await;
    let order_ref = paid["data"]["payment_order_ref"].as_str().unwrap().to_string();
    app.send_webhook(json!({
        "event_id": "evt_cap_mid",
        "event_type": "payment.captured",
        "order_ref": order_ref,
        "amount": "200"
    }))
    .await;

    let report = app.state.services.expiry.sweep().await.unwrap();
    assert_eq!(report.cancelled, 1);

    let unpaid_id = unpaid["data"]["id"].as_str().unwrap();
    let paid_id = paid["data"]["id"].as_str().unwrap();
    let (_, body) = app.get(&format!("/api/v1/bookings/{unpaid_id}")).await;
    assert_eq!(body["data"]["status"], "cancelled");
    let (_, body) = app.get(&format!("/api/v1/bookings/{paid_id}")).await;
    assert_eq!(body["data"]["status"], "confirmed");
}
