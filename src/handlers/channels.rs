//! Channel connection administration and sync triggers.

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::AuthSession;
use crate::entities::{channel_config, sync_log};
use crate::services::channel_sync::{ChannelSyncReport, RegisterChannelInput};
use crate::{ApiResponse, ApiResult, AppState, ListQuery, PaginatedResponse};

#[derive(Debug, Deserialize, ToSchema)]
pub struct TriggerSyncRequest {
    /// Restrict the cycle to these channels; absent means all enabled
    pub channels: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetEnabledRequest {
    pub enabled: bool,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SyncLogFilters {
    pub channel: Option<String>,
    pub sync_type: Option<String>,
}

/// Enable a channel for a property
#[utoipa::path(
    post,
    path = "/api/v1/channels",
    request_body = RegisterChannelInput,
    responses(
        (status = 200, description = "Channel registered", body = ApiResponse<channel_config::Model>),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorResponse),
        (status = 409, description = "Channel already configured", body = crate::errors::ErrorResponse)
    ),
    tag = "Channels"
)]
pub async fn register_channel(
    State(state): State<AppState>,
    session: AuthSession,
    Json(input): Json<RegisterChannelInput>,
) -> ApiResult<channel_config::Model> {
    session.require_admin()?;
    let config = state.services.channel_sync.register_channel(input).await?;
    Ok(Json(ApiResponse::success(config)))
}

/// List a property's channel configurations
#[utoipa::path(
    get,
    path = "/api/v1/properties/{id}/channels",
    params(("id" = Uuid, Path, description = "Property id")),
    responses(
        (status = 200, description = "Channel configs returned", body = ApiResponse<Vec<channel_config::Model>>),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorResponse)
    ),
    tag = "Channels"
)]
pub async fn list_channels(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<channel_config::Model>> {
    session.require_admin()?;
    let configs = state.services.channel_sync.list_configs(id).await?;
    Ok(Json(ApiResponse::success(configs)))
}

/// Enable or disable a channel configuration
#[utoipa::path(
    put,
    path = "/api/v1/channels/{id}/enabled",
    params(("id" = Uuid, Path, description = "Channel config id")),
    request_body = SetEnabledRequest,
    responses(
        (status = 200, description = "Channel updated", body = ApiResponse<channel_config::Model>),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorResponse)
    ),
    tag = "Channels"
)]
pub async fn set_channel_enabled(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<Uuid>,
    Json(request): Json<SetEnabledRequest>,
) -> ApiResult<channel_config::Model> {
    session.require_admin()?;
    let config = state
        .services
        .channel_sync
        .set_enabled(id, request.enabled)
        .await?;
    Ok(Json(ApiResponse::success(config)))
}

/// Probe a channel connection with the stored credentials
#[utoipa::path(
    post,
    path = "/api/v1/channels/{id}/test",
    params(("id" = Uuid, Path, description = "Channel config id")),
    responses(
        (status = 200, description = "Connection state recorded", body = ApiResponse<channel_config::Model>),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorResponse)
    ),
    tag = "Channels"
)]
pub async fn test_channel(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<Uuid>,
) -> ApiResult<channel_config::Model> {
    session.require_admin()?;
    let config = state.services.channel_sync.test_connection(id).await?;
    Ok(Json(ApiResponse::success(config)))
}

/// Trigger a sync cycle for a property
#[utoipa::path(
    post,
    path = "/api/v1/properties/{id}/sync",
    params(("id" = Uuid, Path, description = "Property id")),
    request_body = TriggerSyncRequest,
    responses(
        (status = 200, description = "Cycle finished", body = ApiResponse<Vec<ChannelSyncReport>>),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorResponse),
        (status = 404, description = "No enabled channels", body = crate::errors::ErrorResponse)
    ),
    tag = "Channels"
)]
pub async fn trigger_sync(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<Uuid>,
    Json(request): Json<TriggerSyncRequest>,
) -> ApiResult<Vec<ChannelSyncReport>> {
    session.require_admin()?;
    let reports = state
        .services
        .channel_sync
        .sync_property(id, request.channels)
        .await?;
    Ok(Json(ApiResponse::success(reports)))
}

/// Sync audit log for a property
#[utoipa::path(
    get,
    path = "/api/v1/properties/{id}/sync-logs",
    params(("id" = Uuid, Path, description = "Property id"), SyncLogFilters, ListQuery),
    responses(
        (status = 200, description = "Sync logs returned", body = ApiResponse<PaginatedResponse<sync_log::Model>>),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorResponse)
    ),
    tag = "Channels"
)]
pub async fn list_sync_logs(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<Uuid>,
    Query(filters): Query<SyncLogFilters>,
    Query(query): Query<ListQuery>,
) -> ApiResult<PaginatedResponse<sync_log::Model>> {
    session.require_admin()?;
    let (items, total) = state
        .services
        .channel_sync
        .list_sync_logs(id, filters.channel, filters.sync_type, query.page, query.limit)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse {
        total_pages: total.div_ceil(query.limit.max(1)),
        items,
        total,
        page: query.page,
        limit: query.limit,
    })))
}
