use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "StaySync API",
        version = "1.0.0",
        description = r#"
# StaySync Booking & Channel Sync API

Booking lifecycle and channel inventory synchronization for multi-unit
properties.

## Features

- **Bookings**: atomic create (pricing, coupons, allocation in one
  transaction), confirm via payment webhooks, cancel, check-in/out
- **Inventory**: per-night room allocation with overbooking prevention
- **Pricing**: layered rules (CUSTOM > SEASONAL > BASE) with property
  base-price fallback
- **Coupons**: percentage/fixed discounts with global and per-user limits
- **Channels**: rate and availability pushes, inbound booking ingestion,
  sync audit log

## Authentication

The upstream gateway authenticates callers and forwards identity as
`x-user-id` and `x-user-role` headers. Administrative endpoints require
the `admin` or `operator` role.

## Error Handling

```json
{
  "error": "Conflict",
  "message": "No rooms available: deluxe sold out",
  "timestamp": "2026-08-30T00:00:00Z"
}
```
        "#
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Bookings", description = "Booking lifecycle endpoints"),
        (name = "Catalog", description = "Property and room catalog endpoints"),
        (name = "Pricing", description = "Pricing rule and coupon endpoints"),
        (name = "Coupons", description = "Coupon endpoints"),
        (name = "Payments", description = "Payment webhook endpoints"),
        (name = "Channels", description = "Channel sync administration endpoints")
    ),
    paths(
        crate::handlers::bookings::create_booking,
        crate::handlers::bookings::get_booking,
        crate::handlers::bookings::get_booking_by_reference,
        crate::handlers::bookings::list_bookings,
        crate::handlers::bookings::cancel_booking,
        crate::handlers::bookings::check_in,
        crate::handlers::bookings::check_out,
        crate::handlers::bookings::complete,
        crate::handlers::bookings::availability,

        crate::handlers::properties::create_property,
        crate::handlers::properties::create_room_unit,
        crate::handlers::properties::list_room_units,
        crate::handlers::properties::set_maintenance,
        crate::handlers::properties::create_pricing_rule,
        crate::handlers::properties::deactivate_pricing_rule,
        crate::handlers::properties::create_coupon,
        crate::handlers::properties::get_coupon,

        crate::handlers::payment_webhooks::payment_webhook,

        crate::handlers::channels::register_channel,
        crate::handlers::channels::list_channels,
        crate::handlers::channels::set_channel_enabled,
        crate::handlers::channels::test_channel,
        crate::handlers::channels::trigger_sync,
        crate::handlers::channels::list_sync_logs,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::services::bookings::CreateBookingRequest,
        crate::services::pricing::CreatePricingRuleInput,
        crate::services::coupons::CreateCouponInput,
        crate::services::payments::PaymentWebhookPayload,
        crate::services::channel_sync::RegisterChannelInput,
        crate::handlers::bookings::CancelBookingRequest,
        crate::handlers::properties::CreatePropertyRequest,
        crate::handlers::properties::CreateRoomUnitRequest,
        crate::handlers::properties::SetMaintenanceRequest,
        crate::handlers::channels::TriggerSyncRequest,
        crate::handlers::channels::SetEnabledRequest,
    ))
)]
pub struct ApiDoc;

pub fn swagger_routes() -> axum::Router<AppState> {
    axum::Router::new()
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_includes_entity_schemas() {
        let doc = ApiDoc::openapi();
        let json = doc.to_json().expect("openapi doc serializes");
        // Entity models referenced in handler response bodies must resolve
        // to named component schemas.
        for schema in ["Booking", "Coupon", "ChannelConfig", "SyncLog", "RoomInstance"] {
            assert!(json.contains(&format!("\"{schema}\"")), "missing schema {schema}");
        }
        assert!(doc.paths.paths.contains_key("/api/v1/bookings"));
        assert!(doc.paths.paths.contains_key("/api/v1/payments/webhook"));
    }
}
