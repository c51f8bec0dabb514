use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use sha2::Sha256;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use staysync_api::channels::{ChannelAdapter, ChannelRegistry};
use staysync_api::entities::{coupon, property, room_unit};
use staysync_api::services::channel_sync::{ChannelSyncService, SyncSettings};
use staysync_api::services::coupons::CreateCouponInput;
use staysync_api::services::expiry::ExpiryService;
use staysync_api::services::pricing::CreatePricingRuleInput;
use staysync_api::{
    api_v1_routes, config::AppConfig, db, events, handlers::AppServices, health_routes,
    notifications, services, AppState,
};

pub const WEBHOOK_SECRET: &str = "whsec_test";

pub struct TestOptions {
    pub grace_minutes: i64,
    pub extra_adapters: Vec<Arc<dyn ChannelAdapter>>,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            grace_minutes: 30,
            extra_adapters: Vec::new(),
        }
    }
}

/// Test harness backed by a file-based SQLite database. A single pooled
/// connection serializes transactions, which keeps concurrent-path tests
/// deterministic.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    _db_dir: tempfile::TempDir,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_options(TestOptions::default()).await
    }

    pub async fn with_options(options: TestOptions) -> Self {
        let db_dir = tempfile::tempdir().expect("failed to create temp dir");
        let db_path = db_dir.path().join("staysync_test.db");
        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.auto_migrate = true;
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.payment_webhook_secret = Some(WEBHOOK_SECRET.to_string());
        cfg.booking_hold_grace_minutes = options.grace_minutes;
        cfg.sync_retry_backoff_ms = 5;

        let pool = Arc::new(
            db::establish_connection_from_app_config(&cfg)
                .await
                .expect("failed to create test database"),
        );
        db::ensure_schema(&pool)
            .await
            .expect("failed to bootstrap schema");

        let (event_tx, event_rx) = mpsc::channel(64);
        let event_sender = events::EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(
            event_rx,
            Arc::new(notifications::TracingNotifier),
        ));

        let catalog = Arc::new(services::catalog::CatalogService::new(pool.clone()));
        let pricing = Arc::new(services::pricing::PricingService::new(
            pool.clone(),
            Duration::from_secs(0),
        ));
        let inventory = Arc::new(services::inventory::InventoryService::new(pool.clone()));
        let coupons = Arc::new(services::coupons::CouponService::new(pool.clone()));
        let bookings = Arc::new(services::bookings::BookingService::new(
            pool.clone(),
            catalog.clone(),
            pricing.clone(),
            inventory.clone(),
            coupons.clone(),
            event_sender.clone(),
        ));
        let payments = Arc::new(services::payments::PaymentService::new(
            bookings.clone(),
            event_sender.clone(),
            cfg.payment_webhook_secret.clone(),
            cfg.payment_webhook_tolerance_secs,
        ));
        let expiry = Arc::new(ExpiryService::new(
            bookings.clone(),
            cfg.booking_hold_grace_minutes,
        ));

        let mut registry = ChannelRegistry::new();
        for adapter in options.extra_adapters {
            registry.register(adapter);
        }
        let channel_sync = Arc::new(ChannelSyncService::new(
            pool.clone(),
            Arc::new(registry),
            catalog.clone(),
            pricing.clone(),
            inventory.clone(),
            bookings.clone(),
            event_sender.clone(),
            SyncSettings::from(&cfg),
        ));

        let state = AppState {
            db: pool,
            config: cfg,
            event_sender,
            services: AppServices {
                catalog,
                pricing,
                inventory,
                coupons,
                bookings,
                payments,
                expiry,
                channel_sync,
            },
        };

        let router = Router::new()
            .merge(health_routes())
            .nest("/api/v1", api_v1_routes())
            .with_state(state.clone());

        Self {
            router,
            state,
            _db_dir: db_dir,
            _event_task: event_task,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        admin: bool,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(path);
        if admin {
            builder = builder
                .header("x-user-id", "test-admin")
                .header("x-user-role", "admin");
        }
        let request = match body {
            Some(value) => builder
                .header("content-type", "application/json")
                .body(Body::from(value.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("request failed");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or(Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }

    pub async fn get(&self, path: &str) -> (StatusCode, Value) {
        self.request(Method::GET, path, None, false).await
    }

    pub async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, path, Some(body), false).await
    }

    pub async fn post_admin(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, path, Some(body), true).await
    }

    pub async fn get_admin(&self, path: &str) -> (StatusCode, Value) {
        self.request(Method::GET, path, None, true).await
    }

    /// Sends a signed payment webhook.
    pub async fn send_webhook(&self, payload: Value) -> (StatusCode, Value) {
        let body = payload.to_string();
        let ts = Utc::now().timestamp().to_string();
        let signature = sign_webhook(WEBHOOK_SECRET, &ts, body.as_bytes());
        self.send_raw_webhook(body, &ts, &signature).await
    }

    pub async fn send_raw_webhook(
        &self,
        body: String,
        timestamp: &str,
        signature: &str,
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/payments/webhook")
            .header("content-type", "application/json")
            .header("x-timestamp", timestamp)
            .header("x-signature", signature)
            .body(Body::from(body))
            .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes)
            .unwrap_or(Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, value)
    }

    // Seeding helpers go straight through the services.

    pub async fn seed_property(&self, base_price: Decimal) -> property::Model {
        self.state
            .services
            .catalog
            .create_property("Test Hotel", "USD", base_price)
            .await
            .expect("failed to seed property")
    }

    pub async fn seed_room_unit(
        &self,
        property_id: Uuid,
        code: &str,
        instances: u32,
    ) -> room_unit::Model {
        self.state
            .services
            .catalog
            .add_room_unit(property_id, code, "Test Room", 2, instances)
            .await
            .expect("failed to seed room unit")
    }

    pub async fn seed_pricing_rule(
        &self,
        property_id: Uuid,
        room_unit_id: Uuid,
        pricing_type: &str,
        start: NaiveDate,
        end: NaiveDate,
        price: Decimal,
    ) {
        self.state
            .services
            .pricing
            .create_rule(CreatePricingRuleInput {
                property_id,
                room_unit_id,
                plan_type: "EP".to_string(),
                occupancy_type: "double".to_string(),
                start_date: start,
                end_date: end,
                price,
                pricing_type: pricing_type.to_string(),
            })
            .await
            .expect("failed to seed pricing rule");
    }

    pub async fn seed_coupon(
        &self,
        code: &str,
        discount_type: &str,
        value: Decimal,
        usage_limit: Option<i32>,
        user_usage_limit: i32,
    ) -> coupon::Model {
        self.state
            .services
            .coupons
            .create_coupon(CreateCouponInput {
                code: code.to_string(),
                discount_type: discount_type.to_string(),
                discount_value: value,
                max_discount: None,
                min_amount: None,
                valid_from: Utc::now() - ChronoDuration::days(1),
                valid_to: Utc::now() + ChronoDuration::days(30),
                usage_limit,
                user_usage_limit,
                property_id: None,
            })
            .await
            .expect("failed to seed coupon")
    }
}

pub fn sign_webhook(secret: &str, timestamp: &str, body: &[u8]) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("hmac accepts any key length");
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

pub fn future_date(days_ahead: i64) -> NaiveDate {
    Utc::now().date_naive() + ChronoDuration::days(days_ahead)
}

pub fn booking_request(property_id: Uuid, room_type: &str, days_ahead: i64, nights: i64) -> Value {
    json!({
        "property_id": property_id,
        "room_type": room_type,
        "guest_name": "Ada Guest",
        "guest_email": "ada@example.com",
        "check_in": future_date(days_ahead),
        "check_out": future_date(days_ahead + nights),
        "adults": 2,
        "children": 0,
        "rooms": 1
    })
}
