//! Property catalog, pricing rule, and coupon administration.

use axum::{
    extract::{Path, State},
    response::Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthSession;
use crate::entities::{coupon, pricing_rule, property, room_instance, room_unit};
use crate::errors::ServiceError;
use crate::services::coupons::CreateCouponInput;
use crate::services::pricing::CreatePricingRuleInput;
use crate::{ApiResponse, ApiResult, AppState};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreatePropertyRequest {
    #[validate(length(min = 1, max = 160))]
    pub name: String,
    #[validate(length(equal = 3))]
    pub currency: String,
    pub base_price: Decimal,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateRoomUnitRequest {
    #[validate(length(min = 1, max = 16))]
    pub code: String,
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(range(min = 1, max = 16))]
    pub max_occupancy: i32,
    #[validate(range(min = 1, max = 500))]
    pub instances: u32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetMaintenanceRequest {
    pub under_maintenance: bool,
}

/// Register a property
#[utoipa::path(
    post,
    path = "/api/v1/properties",
    request_body = CreatePropertyRequest,
    responses(
        (status = 200, description = "Property created", body = ApiResponse<property::Model>),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorResponse)
    ),
    tag = "Catalog"
)]
pub async fn create_property(
    State(state): State<AppState>,
    session: AuthSession,
    Json(request): Json<CreatePropertyRequest>,
) -> ApiResult<property::Model> {
    session.require_admin()?;
    request
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
    if request.base_price <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "base_price must be positive".to_string(),
        ));
    }
    let property = state
        .services
        .catalog
        .create_property(&request.name, &request.currency, request.base_price)
        .await?;
    Ok(Json(ApiResponse::success(property)))
}

/// Add a room unit (category) with its physical instances
#[utoipa::path(
    post,
    path = "/api/v1/properties/{id}/room-units",
    params(("id" = Uuid, Path, description = "Property id")),
    request_body = CreateRoomUnitRequest,
    responses(
        (status = 200, description = "Room unit created", body = ApiResponse<room_unit::Model>),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorResponse)
    ),
    tag = "Catalog"
)]
pub async fn create_room_unit(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<Uuid>,
    Json(request): Json<CreateRoomUnitRequest>,
) -> ApiResult<room_unit::Model> {
    session.require_admin()?;
    request
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
    let db = &*state.db;
    state.services.catalog.get_property(db, id).await?;
    let unit = state
        .services
        .catalog
        .add_room_unit(
            id,
            &request.code,
            &request.name,
            request.max_occupancy,
            request.instances,
        )
        .await?;
    Ok(Json(ApiResponse::success(unit)))
}

/// List a property's room units
#[utoipa::path(
    get,
    path = "/api/v1/properties/{id}/room-units",
    params(("id" = Uuid, Path, description = "Property id")),
    responses(
        (status = 200, description = "Room units returned", body = ApiResponse<Vec<room_unit::Model>>)
    ),
    tag = "Catalog"
)]
pub async fn list_room_units(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<room_unit::Model>> {
    let units = state.services.catalog.list_room_units(id).await?;
    Ok(Json(ApiResponse::success(units)))
}

/// Flip a room instance in or out of maintenance
#[utoipa::path(
    post,
    path = "/api/v1/room-instances/{id}/maintenance",
    params(("id" = Uuid, Path, description = "Room instance id")),
    request_body = SetMaintenanceRequest,
    responses(
        (status = 200, description = "Instance updated", body = ApiResponse<room_instance::Model>),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorResponse)
    ),
    tag = "Catalog"
)]
pub async fn set_maintenance(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<Uuid>,
    Json(request): Json<SetMaintenanceRequest>,
) -> ApiResult<room_instance::Model> {
    session.require_admin()?;
    let instance = state
        .services
        .inventory
        .set_maintenance(id, request.under_maintenance)
        .await?;
    Ok(Json(ApiResponse::success(instance)))
}

/// Create a pricing rule
#[utoipa::path(
    post,
    path = "/api/v1/pricing-rules",
    request_body = CreatePricingRuleInput,
    responses(
        (status = 200, description = "Pricing rule created", body = ApiResponse<pricing_rule::Model>),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorResponse)
    ),
    tag = "Pricing"
)]
pub async fn create_pricing_rule(
    State(state): State<AppState>,
    session: AuthSession,
    Json(input): Json<CreatePricingRuleInput>,
) -> ApiResult<pricing_rule::Model> {
    session.require_admin()?;
    let rule = state.services.pricing.create_rule(input).await?;
    Ok(Json(ApiResponse::success(rule)))
}

/// Deactivate a pricing rule
#[utoipa::path(
    delete,
    path = "/api/v1/pricing-rules/{id}",
    params(("id" = Uuid, Path, description = "Pricing rule id")),
    responses(
        (status = 200, description = "Pricing rule deactivated"),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorResponse)
    ),
    tag = "Pricing"
)]
pub async fn deactivate_pricing_rule(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    session.require_admin()?;
    state.services.pricing.deactivate_rule(id).await?;
    Ok(Json(ApiResponse::success(())))
}

/// Create a coupon
#[utoipa::path(
    post,
    path = "/api/v1/coupons",
    request_body = CreateCouponInput,
    responses(
        (status = 200, description = "Coupon created", body = ApiResponse<coupon::Model>),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorResponse),
        (status = 409, description = "Code already exists", body = crate::errors::ErrorResponse)
    ),
    tag = "Coupons"
)]
pub async fn create_coupon(
    State(state): State<AppState>,
    session: AuthSession,
    Json(input): Json<CreateCouponInput>,
) -> ApiResult<coupon::Model> {
    session.require_admin()?;
    let coupon = state.services.coupons.create_coupon(input).await?;
    Ok(Json(ApiResponse::success(coupon)))
}

/// Look up a coupon by code
#[utoipa::path(
    get,
    path = "/api/v1/coupons/{code}",
    params(("code" = String, Path, description = "Coupon code")),
    responses(
        (status = 200, description = "Coupon returned", body = ApiResponse<coupon::Model>),
        (status = 404, description = "Coupon not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Coupons"
)]
pub async fn get_coupon(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<coupon::Model> {
    let coupon = state.services.coupons.get_by_code(&code).await?;
    Ok(Json(ApiResponse::success(coupon)))
}
