use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::AuthSession;
use crate::entities::booking;
use crate::errors::ServiceError;
use crate::services::bookings::{BookingListFilter, CreateBookingRequest};
use crate::services::inventory::NightAvailability;
use crate::{ApiResponse, ApiResult, AppState, ListQuery, PaginatedResponse};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CancelBookingRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct BookingFilters {
    pub property_id: Option<Uuid>,
    pub status: Option<String>,
    pub guest_email: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AvailabilityQuery {
    pub room_type: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

/// Create a booking
#[utoipa::path(
    post,
    path = "/api/v1/bookings",
    request_body = CreateBookingRequest,
    responses(
        (status = 200, description = "Booking created", body = ApiResponse<booking::Model>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 409, description = "No rooms available", body = crate::errors::ErrorResponse),
        (status = 422, description = "Coupon rejected", body = crate::errors::ErrorResponse)
    ),
    tag = "Bookings"
)]
pub async fn create_booking(
    State(state): State<AppState>,
    Json(request): Json<CreateBookingRequest>,
) -> ApiResult<booking::Model> {
    let booking = state.services.bookings.create(request).await?;
    Ok(Json(ApiResponse::success(booking)))
}

/// Get a booking by id
#[utoipa::path(
    get,
    path = "/api/v1/bookings/{id}",
    params(("id" = Uuid, Path, description = "Booking id")),
    responses(
        (status = 200, description = "Booking returned", body = ApiResponse<booking::Model>),
        (status = 404, description = "Booking not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Bookings"
)]
pub async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<booking::Model> {
    let booking = state.services.bookings.get(id).await?;
    Ok(Json(ApiResponse::success(booking)))
}

/// Get a booking by its human-facing reference
#[utoipa::path(
    get,
    path = "/api/v1/bookings/by-reference/{reference}",
    params(("reference" = String, Path, description = "Booking reference, e.g. BK-4F2A9C")),
    responses(
        (status = 200, description = "Booking returned", body = ApiResponse<booking::Model>),
        (status = 404, description = "Booking not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Bookings"
)]
pub async fn get_booking_by_reference(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> ApiResult<booking::Model> {
    let booking = state
        .services
        .bookings
        .get_by_reference(&reference)
        .await?;
    Ok(Json(ApiResponse::success(booking)))
}

/// List bookings
#[utoipa::path(
    get,
    path = "/api/v1/bookings",
    params(BookingFilters, ListQuery),
    responses(
        (status = 200, description = "Bookings returned", body = ApiResponse<PaginatedResponse<booking::Model>>)
    ),
    tag = "Bookings"
)]
pub async fn list_bookings(
    State(state): State<AppState>,
    Query(filters): Query<BookingFilters>,
    Query(query): Query<ListQuery>,
) -> ApiResult<PaginatedResponse<booking::Model>> {
    let filter = BookingListFilter {
        property_id: filters.property_id,
        status: filters.status,
        guest_email: filters.guest_email,
    };
    let (items, total) = state
        .services
        .bookings
        .list(filter, query.page, query.limit)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse {
        total_pages: total.div_ceil(query.limit.max(1)),
        items,
        total,
        page: query.page,
        limit: query.limit,
    })))
}

/// Cancel a booking
#[utoipa::path(
    post,
    path = "/api/v1/bookings/{id}/cancel",
    params(("id" = Uuid, Path, description = "Booking id")),
    request_body = CancelBookingRequest,
    responses(
        (status = 200, description = "Booking cancelled", body = ApiResponse<booking::Model>),
        (status = 400, description = "Booking not cancellable", body = crate::errors::ErrorResponse),
        (status = 404, description = "Booking not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Bookings"
)]
pub async fn cancel_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<CancelBookingRequest>,
) -> ApiResult<booking::Model> {
    let reason = request
        .reason
        .unwrap_or_else(|| "cancelled by guest".to_string());
    let booking = state.services.bookings.cancel(id, &reason).await?;
    Ok(Json(ApiResponse::success(booking)))
}

/// Check a guest in
#[utoipa::path(
    post,
    path = "/api/v1/bookings/{id}/check-in",
    params(("id" = Uuid, Path, description = "Booking id")),
    responses(
        (status = 200, description = "Guest checked in", body = ApiResponse<booking::Model>),
        (status = 400, description = "Invalid transition", body = crate::errors::ErrorResponse),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorResponse)
    ),
    tag = "Bookings"
)]
pub async fn check_in(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<Uuid>,
) -> ApiResult<booking::Model> {
    session.require_admin()?;
    let booking = state.services.bookings.check_in(id).await?;
    Ok(Json(ApiResponse::success(booking)))
}

/// Check a guest out
#[utoipa::path(
    post,
    path = "/api/v1/bookings/{id}/check-out",
    params(("id" = Uuid, Path, description = "Booking id")),
    responses(
        (status = 200, description = "Guest checked out", body = ApiResponse<booking::Model>),
        (status = 400, description = "Invalid transition", body = crate::errors::ErrorResponse),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorResponse)
    ),
    tag = "Bookings"
)]
pub async fn check_out(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<Uuid>,
) -> ApiResult<booking::Model> {
    session.require_admin()?;
    let booking = state.services.bookings.check_out(id).await?;
    Ok(Json(ApiResponse::success(booking)))
}

/// Close out a stay after checkout
#[utoipa::path(
    post,
    path = "/api/v1/bookings/{id}/complete",
    params(("id" = Uuid, Path, description = "Booking id")),
    responses(
        (status = 200, description = "Booking completed", body = ApiResponse<booking::Model>),
        (status = 400, description = "Invalid transition", body = crate::errors::ErrorResponse),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorResponse)
    ),
    tag = "Bookings"
)]
pub async fn complete(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<Uuid>,
) -> ApiResult<booking::Model> {
    session.require_admin()?;
    let booking = state.services.bookings.complete(id).await?;
    Ok(Json(ApiResponse::success(booking)))
}

/// Per-night availability for a room type
#[utoipa::path(
    get,
    path = "/api/v1/properties/{id}/availability",
    params(("id" = Uuid, Path, description = "Property id"), AvailabilityQuery),
    responses(
        (status = 200, description = "Availability returned", body = ApiResponse<Vec<NightAvailability>>),
        (status = 404, description = "Property or room type not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Bookings"
)]
pub async fn availability(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> ApiResult<Vec<NightAvailability>> {
    if query.check_in >= query.check_out {
        return Err(ServiceError::ValidationError(
            "check_in must precede check_out".to_string(),
        ));
    }
    let db = &*state.db;
    state.services.catalog.get_property(db, id).await?;
    let unit = state
        .services
        .catalog
        .get_room_unit(db, id, &query.room_type)
        .await?;
    let nights = state
        .services
        .inventory
        .availability(unit.id, query.check_in, query.check_out)
        .await?;
    Ok(Json(ApiResponse::success(nights)))
}
