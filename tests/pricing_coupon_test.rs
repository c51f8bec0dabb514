mod common;

use axum::http::StatusCode;
use chrono::{Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde_json::{json, Value};

use common::{booking_request, future_date, TestApp};
use staysync_api::entities::coupon_usage;
use staysync_api::services::coupons::CreateCouponInput;

/// Money fields round-trip through the store with no scale guarantee
/// ("20.00" may come back as "20"), so compare them numerically.
fn money(value: &Value) -> Decimal {
    value
        .as_str()
        .expect("money field must be a string")
        .parse()
        .expect("money field must parse as a decimal")
}

#[tokio::test]
async fn custom_rule_beats_seasonal_and_base() {
    let app = TestApp::new().await;
    let property = app.seed_property(dec!(100)).await;
    let unit = app.seed_room_unit(property.id, "DLX", 2).await;
    app.seed_pricing_rule(
        property.id,
        unit.id,
        "SEASONAL",
        future_date(0),
        future_date(60),
        dec!(150),
    )
    .await;
    app.seed_pricing_rule(
        property.id,
        unit.id,
        "CUSTOM",
        future_date(0),
        future_date(60),
        dec!(120),
    )
    .await;

    let (status, body) = app
        .post("/api/v1/bookings", booking_request(property.id, "DLX", 10, 2))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["total_amount"], "240");
}

#[tokio::test]
async fn nights_outside_any_rule_fall_back_to_base_price() {
    let app = TestApp::new().await;
    let property = app.seed_property(dec!(100)).await;
    let unit = app.seed_room_unit(property.id, "DLX", 2).await;
    // rule covers only the first night of a two-night stay
    app.seed_pricing_rule(
        property.id,
        unit.id,
        "SEASONAL",
        future_date(10),
        future_date(10),
        dec!(150),
    )
    .await;

    let (status, body) = app
        .post("/api/v1/bookings", booking_request(property.id, "DLX", 10, 2))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["total_amount"], "250");
}

#[tokio::test]
async fn percentage_coupon_discounts_total() {
    let app = TestApp::new().await;
    let property = app.seed_property(dec!(100)).await;
    app.seed_room_unit(property.id, "STD", 2).await;
    app.seed_coupon("SAVE10", "percentage", dec!(10), None, 1).await;

    let mut request = booking_request(property.id, "STD", 10, 2);
    request["coupon_code"] = json!("save10");
    let (status, body) = app.post("/api/v1/bookings", request).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(money(&body["data"]["discount_amount"]), dec!(20));
    assert_eq!(money(&body["data"]["total_amount"]), dec!(180));
}

#[tokio::test]
async fn fixed_coupon_discounts_total() {
    let app = TestApp::new().await;
    let property = app.seed_property(dec!(100)).await;
    app.seed_room_unit(property.id, "STD", 2).await;
    app.seed_coupon("FLAT50", "fixed", dec!(50), None, 1).await;

    let mut request = booking_request(property.id, "STD", 10, 2);
    request["coupon_code"] = json!("FLAT50");
    let (status, body) = app.post("/api/v1/bookings", request).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(money(&body["data"]["discount_amount"]), dec!(50));
    assert_eq!(money(&body["data"]["total_amount"]), dec!(150));
}

#[tokio::test]
async fn global_usage_limit_is_enforced() {
    let app = TestApp::new().await;
    let property = app.seed_property(dec!(100)).await;
    app.seed_room_unit(property.id, "STD", 5).await;
    app.seed_coupon("ONCE", "fixed", dec!(10), Some(1), 5).await;

    let mut request = booking_request(property.id, "STD", 10, 2);
    request["coupon_code"] = json!("ONCE");
    let (status, body) = app.post("/api/v1/bookings", request).await;
    assert_eq!(status, StatusCode::OK, "{body}");

    // different guest, same coupon
    let mut request = booking_request(property.id, "STD", 20, 2);
    request["coupon_code"] = json!("ONCE");
    request["guest_email"] = json!("bob@example.com");
    let (status, body) = app.post("/api/v1/bookings", request).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");

    // the failed attempt must not consume inventory
    let (status, _) = app
        .post("/api/v1/bookings", booking_request(property.id, "STD", 20, 2))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn concurrent_applications_consume_the_last_use_once() {
    let app = std::sync::Arc::new(TestApp::new().await);
    let property = app.seed_property(dec!(100)).await;
    app.seed_room_unit(property.id, "STD", 5).await;
    let coupon = app.seed_coupon("LASTUSE", "fixed", dec!(10), Some(1), 5).await;

    let first = {
        let app = app.clone();
        let mut req = booking_request(property.id, "STD", 10, 2);
        req["coupon_code"] = json!("LASTUSE");
        tokio::spawn(async move { app.post("/api/v1/bookings", req).await })
    };
    let second = {
        let app = app.clone();
        let mut req = booking_request(property.id, "STD", 10, 2);
        req["coupon_code"] = json!("LASTUSE");
        req["guest_email"] = json!("bob@example.com");
        tokio::spawn(async move { app.post("/api/v1/bookings", req).await })
    };

    let (a, b) = (first.await.unwrap(), second.await.unwrap());
    let statuses = [a.0, b.0];
    assert!(
        statuses.contains(&StatusCode::OK),
        "one application must win: {a:?} {b:?}"
    );
    assert!(
        statuses.contains(&StatusCode::UNPROCESSABLE_ENTITY),
        "one application must lose: {a:?} {b:?}"
    );

    let usages = coupon_usage::Entity::find()
        .filter(coupon_usage::Column::CouponId.eq(coupon.id))
        .all(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(usages.len(), 1, "exactly one usage row may survive");
}

#[tokio::test]
async fn per_user_limit_is_enforced() {
    let app = TestApp::new().await;
    let property = app.seed_property(dec!(100)).await;
    app.seed_room_unit(property.id, "STD", 5).await;
    app.seed_coupon("LOYAL", "fixed", dec!(10), None, 1).await;

    let mut request = booking_request(property.id, "STD", 10, 2);
    request["coupon_code"] = json!("LOYAL");
    let (status, _) = app.post("/api/v1/bookings", request).await;
    assert_eq!(status, StatusCode::OK);

    // same guest again
    let mut request = booking_request(property.id, "STD", 20, 2);
    request["coupon_code"] = json!("LOYAL");
    let (status, body) = app.post("/api/v1/bookings", request).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");

    // another guest still qualifies
    let mut request = booking_request(property.id, "STD", 20, 2);
    request["coupon_code"] = json!("LOYAL");
    request["guest_email"] = json!("bob@example.com");
    let (status, body) = app.post("/api/v1/bookings", request).await;
    assert_eq!(status, StatusCode::OK, "{body}");
}

#[tokio::test]
async fn expired_coupon_is_rejected() {
    let app = TestApp::new().await;
    let property = app.seed_property(dec!(100)).await;
    app.seed_room_unit(property.id, "STD", 2).await;
    app.state
        .services
        .coupons
        .create_coupon(CreateCouponInput {
            code: "OLD".to_string(),
            discount_type: "fixed".to_string(),
            discount_value: dec!(10),
            max_discount: None,
            min_amount: None,
            valid_from: Utc::now() - ChronoDuration::days(30),
            valid_to: Utc::now() - ChronoDuration::days(1),
            usage_limit: None,
            user_usage_limit: 1,
            property_id: None,
        })
        .await
        .expect("failed to seed expired coupon");

    let mut request = booking_request(property.id, "STD", 10, 2);
    request["coupon_code"] = json!("OLD");
    let (status, body) = app.post("/api/v1/bookings", request).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");
}

#[tokio::test]
async fn coupon_below_minimum_amount_is_rejected() {
    let app = TestApp::new().await;
    let property = app.seed_property(dec!(100)).await;
    app.seed_room_unit(property.id, "STD", 2).await;
    app.state
        .services
        .coupons
        .create_coupon(CreateCouponInput {
            code: "BIGSPEND".to_string(),
            discount_type: "percentage".to_string(),
            discount_value: dec!(15),
            max_discount: None,
            min_amount: Some(dec!(500)),
            valid_from: Utc::now() - ChronoDuration::days(1),
            valid_to: Utc::now() + ChronoDuration::days(30),
            usage_limit: None,
            user_usage_limit: 1,
            property_id: None,
        })
        .await
        .expect("failed to seed coupon");

    let mut request = booking_request(property.id, "STD", 10, 2);
    request["coupon_code"] = json!("BIGSPEND");
    let (status, body) = app.post("/api/v1/bookings", request).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");
}

#[tokio::test]
async fn unknown_coupon_is_rejected() {
    let app = TestApp::new().await;
    let property = app.seed_property(dec!(100)).await;
    app.seed_room_unit(property.id, "STD", 2).await;

    let mut request = booking_request(property.id, "STD", 10, 2);
    request["coupon_code"] = json!("NOPE");
    let (status, _) = app.post("/api/v1/bookings", request).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}
