//! StaySync API Library
//!
//! Booking lifecycle and channel inventory synchronization for multi-unit
//! properties: the room-night ledger, the booking state machine, payment
//! reconciliation, pricing resolution, coupons, and OTA channel sync.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod channels;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod notifications;
pub mod openapi;
pub mod services;

use axum::{extract::State, response::Json, routing::get, routing::post, Router};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

// Common query parameters for list endpoints
#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_page() -> u64 {
    1
}
fn default_limit() -> u64 {
    20
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub timestamp: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

pub fn api_v1_routes() -> Router<AppState> {
    let bookings = Router::new()
        .route(
            "/bookings",
            get(handlers::bookings::list_bookings).post(handlers::bookings::create_booking),
        )
        .route("/bookings/:id", get(handlers::bookings::get_booking))
        .route(
            "/bookings/by-reference/:reference",
            get(handlers::bookings::get_booking_by_reference),
        )
        .route("/bookings/:id/cancel", post(handlers::bookings::cancel_booking))
        .route("/bookings/:id/check-in", post(handlers::bookings::check_in))
        .route("/bookings/:id/check-out", post(handlers::bookings::check_out))
        .route("/bookings/:id/complete", post(handlers::bookings::complete));

    let catalog = Router::new()
        .route("/properties", post(handlers::properties::create_property))
        .route(
            "/properties/:id/room-units",
            get(handlers::properties::list_room_units)
                .post(handlers::properties::create_room_unit),
        )
        .route(
            "/properties/:id/availability",
            get(handlers::bookings::availability),
        )
        .route(
            "/room-instances/:id/maintenance",
            post(handlers::properties::set_maintenance),
        );

    let pricing = Router::new()
        .route(
            "/pricing-rules",
            post(handlers::properties::create_pricing_rule),
        )
        .route(
            "/pricing-rules/:id",
            axum::routing::delete(handlers::properties::deactivate_pricing_rule),
        )
        .route("/coupons", post(handlers::properties::create_coupon))
        .route("/coupons/:code", get(handlers::properties::get_coupon));

    let payments = Router::new().route(
        "/payments/webhook",
        post(handlers::payment_webhooks::payment_webhook),
    );

    let channels = Router::new()
        .route("/channels", post(handlers::channels::register_channel))
        .route(
            "/channels/:id/enabled",
            axum::routing::put(handlers::channels::set_channel_enabled),
        )
        .route("/channels/:id/test", post(handlers::channels::test_channel))
        .route(
            "/properties/:id/channels",
            get(handlers::channels::list_channels),
        )
        .route("/properties/:id/sync", post(handlers::channels::trigger_sync))
        .route(
            "/properties/:id/sync-logs",
            get(handlers::channels::list_sync_logs),
        );

    Router::new()
        .merge(bookings)
        .merge(catalog)
        .merge(pricing)
        .merge(payments)
        .merge(channels)
}

pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn readiness(State(state): State<AppState>) -> Result<Json<Value>, errors::ServiceError> {
    db::ping(&state.db).await?;
    Ok(Json(json!({
        "status": "ready",
        "timestamp": Utc::now().to_rfc3339(),
    })))
}

#[cfg(test)]
mod response_tests {
    use super::*;

    #[test]
    fn success_response_shape() {
        let response = ApiResponse::success(42);
        assert!(response.success);
        assert_eq!(response.data, Some(42));
        assert!(response.message.is_none());
        assert!(!response.timestamp.is_empty());
    }

    #[test]
    fn error_response_shape() {
        let response = ApiResponse::<()>::error("oops".into());
        assert!(!response.success);
        assert!(response.data.is_none());
        assert_eq!(response.message.as_deref(), Some("oops"));
    }
}
