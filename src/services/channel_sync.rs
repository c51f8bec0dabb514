//! Channel sync orchestration.
//!
//! Pushes rates and availability outward and pulls channel bookings inward
//! for every enabled (property, channel) pair. Each sync attempt is
//! audited in `sync_logs` (running, then completed or failed); one
//! channel's failure never blocks the others; and a dashmap guard keeps
//! two cycles for the same pair from overlapping. Outbound calls retry
//! with bounded exponential backoff and jitter on retryable errors only.

use chrono::{Datelike, DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use metrics::{counter, histogram};
use rand::Rng;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{interval, sleep};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::channels::{
    AvailabilityPush, ChannelError, ChannelRegistry, InboundBooking, RatePush,
};
use crate::config::AppConfig;
use crate::entities::channel_config::{self, ConnectionStatus, Entity as ChannelConfigEntity};
use crate::entities::sync_log::{self, Entity as SyncLogEntity, SyncStatus, SyncType};
use crate::errors::{on_unique_violation, ServiceError};
use crate::events::{Event, EventSender};
use crate::services::bookings::{BookingService, CreateBookingRequest};
use crate::services::catalog::CatalogService;
use crate::services::inventory::InventoryService;
use crate::services::pricing::PricingService;

#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub horizon_days: i64,
    pub retry_attempts: u32,
    pub retry_backoff_ms: u64,
    pub demand_multiplier: Decimal,
    pub weekend_multiplier: Decimal,
    pub min_factor: Decimal,
    pub max_factor: Decimal,
}

impl From<&AppConfig> for SyncSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            horizon_days: config.sync_horizon_days,
            retry_attempts: config.sync_retry_attempts,
            retry_backoff_ms: config.sync_retry_backoff_ms,
            demand_multiplier: Decimal::from_f64(config.rate_demand_multiplier)
                .unwrap_or(Decimal::ONE),
            weekend_multiplier: Decimal::from_f64(config.rate_weekend_multiplier)
                .unwrap_or(Decimal::ONE),
            min_factor: Decimal::from_f64(config.rate_min_factor)
                .unwrap_or_else(|| Decimal::new(5, 1)),
            max_factor: Decimal::from_f64(config.rate_max_factor).unwrap_or(Decimal::TWO),
        }
    }
}

/// Summary of one sync type within a cycle.
#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub struct SyncSummary {
    pub sync_type: String,
    pub status: String,
    pub processed: i32,
    pub succeeded: i32,
    pub failed: i32,
    pub errors: Vec<String>,
}

/// Outcome of one (property, channel) cycle.
#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub struct ChannelSyncReport {
    pub channel: String,
    /// True when another cycle for this pair was already in flight
    pub skipped: bool,
    pub summaries: Vec<SyncSummary>,
}

#[derive(Debug, Clone, serde::Deserialize, utoipa::ToSchema)]
pub struct RegisterChannelInput {
    pub property_id: Uuid,
    pub channel: String,
    /// Credential blob handed through to the adapter (JSON)
    pub credentials: String,
    pub sync_frequency_minutes: Option<i32>,
}

pub struct ChannelSyncService {
    db: Arc<DatabaseConnection>,
    registry: Arc<ChannelRegistry>,
    catalog: Arc<CatalogService>,
    pricing: Arc<PricingService>,
    inventory: Arc<InventoryService>,
    bookings: Arc<BookingService>,
    event_sender: EventSender,
    settings: SyncSettings,
    in_flight: DashMap<(Uuid, String), ()>,
}

impl ChannelSyncService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Arc<DatabaseConnection>,
        registry: Arc<ChannelRegistry>,
        catalog: Arc<CatalogService>,
        pricing: Arc<PricingService>,
        inventory: Arc<InventoryService>,
        bookings: Arc<BookingService>,
        event_sender: EventSender,
        settings: SyncSettings,
    ) -> Self {
        Self {
            db,
            registry,
            catalog,
            pricing,
            inventory,
            bookings,
            event_sender,
            settings,
            in_flight: DashMap::new(),
        }
    }

    /// Enables a channel for a property. One config per (property, channel)
    /// pair, enforced by a unique index.
    #[instrument(skip(self, input), fields(property_id = %input.property_id, channel = %input.channel))]
    pub async fn register_channel(
        &self,
        input: RegisterChannelInput,
    ) -> Result<channel_config::Model, ServiceError> {
        if self.registry.get(&input.channel).is_none() {
            return Err(ServiceError::ValidationError(format!(
                "unknown channel '{}'; known: {}",
                input.channel,
                self.registry.names().join(", ")
            )));
        }
        serde_json::from_str::<serde_json::Value>(&input.credentials)
            .map_err(|_| ServiceError::ValidationError("credentials must be JSON".to_string()))?;

        let db = &*self.db;
        // verify the property exists before wiring a channel to it
        self.catalog.get_property(db, input.property_id).await?;

        let model = channel_config::ActiveModel {
            id: Set(Uuid::new_v4()),
            property_id: Set(input.property_id),
            channel: Set(input.channel.clone()),
            enabled: Set(true),
            credentials: Set(input.credentials),
            sync_frequency_minutes: Set(input.sync_frequency_minutes.unwrap_or(15)),
            connection_status: Set(ConnectionStatus::Disconnected.as_str().to_string()),
            last_inventory_sync: Set(None),
            last_rates_sync: Set(None),
            last_bookings_sync: Set(None),
            last_error: Set(None),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(db)
        .await
        .map_err(|e| {
            on_unique_violation(e, || {
                ServiceError::Conflict(format!(
                    "channel '{}' already configured for this property",
                    input.channel
                ))
            })
        })?;

        info!(config_id = %model.id, "Channel registered");
        Ok(model)
    }

    pub async fn set_enabled(
        &self,
        config_id: Uuid,
        enabled: bool,
    ) -> Result<channel_config::Model, ServiceError> {
        let db = &*self.db;
        let config = self.get_config(config_id).await?;
        let mut active: channel_config::ActiveModel = config.into();
        active.enabled = Set(enabled);
        active.updated_at = Set(Some(Utc::now()));
        Ok(active.update(db).await?)
    }

    pub async fn get_config(
        &self,
        config_id: Uuid,
    ) -> Result<channel_config::Model, ServiceError> {
        let db = &*self.db;
        ChannelConfigEntity::find_by_id(config_id)
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Channel config {} not found", config_id))
            })
    }

    pub async fn list_configs(
        &self,
        property_id: Uuid,
    ) -> Result<Vec<channel_config::Model>, ServiceError> {
        let db = &*self.db;
        Ok(ChannelConfigEntity::find()
            .filter(channel_config::Column::PropertyId.eq(property_id))
            .all(db)
            .await?)
    }

    /// Probes the channel with the stored credentials and records the
    /// resulting connection state.
    #[instrument(skip(self))]
    pub async fn test_connection(
        &self,
        config_id: Uuid,
    ) -> Result<channel_config::Model, ServiceError> {
        let config = self.get_config(config_id).await?;
        let adapter = self.registry.get(&config.channel).ok_or_else(|| {
            ServiceError::InternalError(format!("no adapter for channel '{}'", config.channel))
        })?;

        let (status, last_error) = match adapter.test_connection(&config.credentials).await {
            Ok(check) if check.success => (ConnectionStatus::Connected, None),
            Ok(check) => (ConnectionStatus::Error, check.error),
            Err(e) => (ConnectionStatus::Error, Some(e.to_string())),
        };

        let db = &*self.db;
        let mut active: channel_config::ActiveModel = config.into();
        active.connection_status = Set(status.as_str().to_string());
        active.last_error = Set(last_error);
        active.updated_at = Set(Some(Utc::now()));
        Ok(active.update(db).await?)
    }

    /// Runs a sync cycle for every enabled channel of a property,
    /// optionally restricted to the named channels. Channel failures land
    /// in the per-channel report; the cycle itself only fails on
    /// infrastructure errors.
    #[instrument(skip(self))]
    pub async fn sync_property(
        &self,
        property_id: Uuid,
        only_channels: Option<Vec<String>>,
    ) -> Result<Vec<ChannelSyncReport>, ServiceError> {
        let db = &*self.db;
        let mut configs = ChannelConfigEntity::find()
            .filter(channel_config::Column::PropertyId.eq(property_id))
            .filter(channel_config::Column::Enabled.eq(true))
            .all(db)
            .await?;
        if let Some(only) = &only_channels {
            configs.retain(|c| only.contains(&c.channel));
        }
        if configs.is_empty() {
            return Err(ServiceError::NotFound(format!(
                "no enabled channels for property {}",
                property_id
            )));
        }

        let mut reports = Vec::with_capacity(configs.len());
        for config in configs {
            reports.push(self.sync_channel(&config).await?);
        }
        Ok(reports)
    }

    /// One full cycle (rates, availability, inbound bookings) for a single
    /// (property, channel) pair.
    #[instrument(skip(self, config), fields(property_id = %config.property_id, channel = %config.channel))]
    pub async fn sync_channel(
        &self,
        config: &channel_config::Model,
    ) -> Result<ChannelSyncReport, ServiceError> {
        let key = (config.property_id, config.channel.clone());
        let _guard = match self.try_acquire(key) {
            Some(guard) => guard,
            None => {
                warn!("Sync already in flight for this pair; skipping");
                return Ok(ChannelSyncReport {
                    channel: config.channel.clone(),
                    skipped: true,
                    summaries: Vec::new(),
                });
            }
        };

        let started = Instant::now();
        let mut summaries = Vec::with_capacity(3);
        summaries.push(self.sync_rates(config).await?);
        summaries.push(self.sync_availability(config).await?);
        summaries.push(self.sync_bookings(config).await?);

        let succeeded = summaries
            .iter()
            .all(|s| s.status == SyncStatus::Completed.as_str());
        histogram!(
            "staysync.sync.cycle_seconds",
            started.elapsed().as_secs_f64(),
            "channel" => config.channel.clone()
        );
        if let Err(e) = self
            .event_sender
            .send(Event::SyncCycleFinished {
                property_id: config.property_id,
                channel: config.channel.clone(),
                succeeded,
            })
            .await
        {
            warn!(error = %e, "Failed to emit SyncCycleFinished");
        }

        Ok(ChannelSyncReport {
            channel: config.channel.clone(),
            skipped: false,
            summaries,
        })
    }

    async fn sync_rates(
        &self,
        config: &channel_config::Model,
    ) -> Result<SyncSummary, ServiceError> {
        let adapter = match self.registry.get(&config.channel) {
            Some(a) => a,
            None => return self.summary_for_missing_adapter(config, SyncType::Rates).await,
        };

        let log = self.open_log(config, SyncType::Rates).await?;
        let rates = self.build_rate_pushes(config.property_id).await?;
        let processed = rates.len() as i32;

        let result = self
            .with_retry(|| adapter.push_rates(config.property_id, &config.credentials, &rates))
            .await;
        self.finish_push(config, SyncType::Rates, log, processed, result)
            .await
    }

    async fn sync_availability(
        &self,
        config: &channel_config::Model,
    ) -> Result<SyncSummary, ServiceError> {
        let adapter = match self.registry.get(&config.channel) {
            Some(a) => a,
            None => {
                return self
                    .summary_for_missing_adapter(config, SyncType::Inventory)
                    .await
            }
        };

        let log = self.open_log(config, SyncType::Inventory).await?;
        let availability = self.build_availability_pushes(config.property_id).await?;
        let processed = availability.len() as i32;

        let result = self
            .with_retry(|| {
                adapter.push_availability(config.property_id, &config.credentials, &availability)
            })
            .await;
        self.finish_push(config, SyncType::Inventory, log, processed, result)
            .await
    }

    async fn sync_bookings(
        &self,
        config: &channel_config::Model,
    ) -> Result<SyncSummary, ServiceError> {
        let adapter = match self.registry.get(&config.channel) {
            Some(a) => a,
            None => {
                return self
                    .summary_for_missing_adapter(config, SyncType::Bookings)
                    .await
            }
        };

        let log = self.open_log(config, SyncType::Bookings).await?;
        let pulled = self
            .with_retry(|| {
                adapter.pull_bookings(
                    config.property_id,
                    &config.credentials,
                    config.last_bookings_sync,
                )
            })
            .await;

        match pulled {
            Ok(inbound) => {
                let processed = inbound.len() as i32;
                let (succeeded, failed, errors) =
                    self.ingest_inbound(config, inbound).await?;
                let status = if failed == 0 {
                    SyncStatus::Completed
                } else {
                    SyncStatus::Failed
                };
                self.finish_log(log, status, processed, succeeded, failed, &errors)
                    .await?;
                self.touch_config(config, SyncType::Bookings, status, errors.last().cloned())
                    .await?;
                counter!(
                    "staysync.sync.bookings_ingested",
                    succeeded as u64,
                    "channel" => config.channel.clone()
                );
                Ok(SyncSummary {
                    sync_type: SyncType::Bookings.as_str().to_string(),
                    status: status.as_str().to_string(),
                    processed,
                    succeeded,
                    failed,
                    errors,
                })
            }
            Err(e) => {
                let errors = vec![e.to_string()];
                self.finish_log(log, SyncStatus::Failed, 0, 0, 0, &errors)
                    .await?;
                self.touch_config(
                    config,
                    SyncType::Bookings,
                    SyncStatus::Failed,
                    Some(e.to_string()),
                )
                .await?;
                counter!("staysync.sync.failures", 1, "channel" => config.channel.clone());
                Ok(SyncSummary {
                    sync_type: SyncType::Bookings.as_str().to_string(),
                    status: SyncStatus::Failed.as_str().to_string(),
                    processed: 0,
                    succeeded: 0,
                    failed: 0,
                    errors,
                })
            }
        }
    }

    /// Rates for every room unit over the sync horizon, with the demand
    /// and weekend multipliers applied and the result clamped to the band
    /// around the resolved rate.
    async fn build_rate_pushes(
        &self,
        property_id: Uuid,
    ) -> Result<Vec<RatePush>, ServiceError> {
        let db = &*self.db;
        let property = self.catalog.get_property(db, property_id).await?;
        let units = self.catalog.list_room_units(property_id).await?;

        let today = Utc::now().date_naive();
        let horizon_end = today + ChronoDuration::days(self.settings.horizon_days);

        let mut pushes = Vec::new();
        for unit in units {
            let nightly = self
                .pricing
                .quote_range(&property, unit.id, "EP", "double", today, horizon_end)
                .await?;
            for (night, rate) in nightly {
                pushes.push(RatePush {
                    room_unit_code: unit.code.clone(),
                    plan_type: "EP".to_string(),
                    occupancy_type: "double".to_string(),
                    night,
                    rate: self.adjust_rate(rate, night),
                    currency: property.currency.clone(),
                });
            }
        }
        Ok(pushes)
    }

    async fn build_availability_pushes(
        &self,
        property_id: Uuid,
    ) -> Result<Vec<AvailabilityPush>, ServiceError> {
        let units = self.catalog.list_room_units(property_id).await?;
        let today = Utc::now().date_naive();
        let horizon_end = today + ChronoDuration::days(self.settings.horizon_days);

        let mut pushes = Vec::new();
        for unit in units {
            let nights = self.inventory.availability(unit.id, today, horizon_end).await?;
            for night in nights {
                pushes.push(AvailabilityPush {
                    room_unit_code: unit.code.clone(),
                    night: night.night,
                    available: night.available,
                });
            }
        }
        Ok(pushes)
    }

    /// Applies the demand and weekend multipliers, clamped to
    /// `[rate * min_factor, rate * max_factor]`.
    fn adjust_rate(&self, rate: Decimal, night: chrono::NaiveDate) -> Decimal {
        let mut adjusted = rate * self.settings.demand_multiplier;
        // Friday and Saturday nights count as weekend
        if matches!(
            night.weekday(),
            chrono::Weekday::Fri | chrono::Weekday::Sat
        ) {
            adjusted *= self.settings.weekend_multiplier;
        }
        let floor = rate * self.settings.min_factor;
        let ceiling = rate * self.settings.max_factor;
        adjusted.max(floor).min(ceiling).round_dp(2)
    }

    /// Creates and confirms inbound channel bookings. Already-ingested
    /// external refs count as succeeded; an unallocatable booking is an
    /// overbooking surfaced in the log, and the rest of the batch goes on.
    async fn ingest_inbound(
        &self,
        config: &channel_config::Model,
        inbound: Vec<InboundBooking>,
    ) -> Result<(i32, i32, Vec<String>), ServiceError> {
        let mut succeeded = 0;
        let mut failed = 0;
        let mut errors = Vec::new();

        for booking in inbound {
            if self
                .bookings
                .find_by_external_ref(&config.channel, &booking.external_ref)
                .await?
                .is_some()
            {
                succeeded += 1;
                continue;
            }

            let request = CreateBookingRequest {
                property_id: config.property_id,
                room_type: booking.room_unit_code.clone(),
                guest_name: booking.guest_name.clone(),
                guest_email: booking.guest_email.clone(),
                guest_phone: None,
                check_in: booking.check_in,
                check_out: booking.check_out,
                adults: booking.adults,
                children: booking.children,
                rooms: booking.rooms,
                plan_type: None,
                occupancy_type: None,
                coupon_code: None,
                source: Some(config.channel.clone()),
                external_ref: Some(booking.external_ref.clone()),
            };

            match self.bookings.create(request).await {
                Ok(created) => {
                    // Channel bookings arrive prepaid; confirm against a
                    // synthetic provider event keyed by the external ref.
                    let event_id = format!("{}:{}", config.channel, booking.external_ref);
                    match self
                        .bookings
                        .confirm(created.id, &event_id, booking.amount)
                        .await
                    {
                        Ok(_) => succeeded += 1,
                        Err(e) => {
                            failed += 1;
                            errors.push(format!(
                                "confirm failed: {} ({})",
                                booking.external_ref, e
                            ));
                            error!(
                                external_ref = %booking.external_ref,
                                error = %e,
                                "Inbound booking confirmation failed"
                            );
                        }
                    }
                }
                Err(ServiceError::RoomUnavailable(msg)) => {
                    failed += 1;
                    errors.push(format!(
                        "overbooking: {} ({})",
                        booking.external_ref, msg
                    ));
                    warn!(
                        external_ref = %booking.external_ref,
                        "Inbound booking could not be allocated"
                    );
                }
                Err(ServiceError::ValidationError(msg)) | Err(ServiceError::NotFound(msg)) => {
                    failed += 1;
                    errors.push(format!("rejected: {} ({})", booking.external_ref, msg));
                }
                // Any other per-record failure stays inside the cycle;
                // only the surrounding pull/connection errors abort it.
                Err(e) => {
                    failed += 1;
                    errors.push(format!("ingest failed: {} ({})", booking.external_ref, e));
                    error!(
                        external_ref = %booking.external_ref,
                        error = %e,
                        "Inbound booking ingest failed"
                    );
                }
            }
        }
        Ok((succeeded, failed, errors))
    }

    async fn finish_push(
        &self,
        config: &channel_config::Model,
        sync_type: SyncType,
        log: sync_log::Model,
        processed: i32,
        result: Result<crate::channels::PushOutcome, ChannelError>,
    ) -> Result<SyncSummary, ServiceError> {
        match result {
            Ok(outcome) => {
                let succeeded = outcome.accepted as i32;
                let failed = outcome.rejected as i32;
                let status = if failed == 0 {
                    SyncStatus::Completed
                } else {
                    SyncStatus::Failed
                };
                self.finish_log(log, status, processed, succeeded, failed, &outcome.errors)
                    .await?;
                self.touch_config(config, sync_type, status, outcome.errors.last().cloned())
                    .await?;
                counter!(
                    "staysync.sync.records_pushed",
                    succeeded as u64,
                    "channel" => config.channel.clone(),
                    "type" => sync_type.as_str()
                );
                Ok(SyncSummary {
                    sync_type: sync_type.as_str().to_string(),
                    status: status.as_str().to_string(),
                    processed,
                    succeeded,
                    failed,
                    errors: outcome.errors,
                })
            }
            Err(e) => {
                let errors = vec![e.to_string()];
                self.finish_log(log, SyncStatus::Failed, processed, 0, processed, &errors)
                    .await?;
                self.touch_config(config, sync_type, SyncStatus::Failed, Some(e.to_string()))
                    .await?;
                counter!("staysync.sync.failures", 1, "channel" => config.channel.clone());
                error!(channel = %config.channel, error = %e, "Push failed after retries");
                Ok(SyncSummary {
                    sync_type: sync_type.as_str().to_string(),
                    status: SyncStatus::Failed.as_str().to_string(),
                    processed,
                    succeeded: 0,
                    failed: processed,
                    errors,
                })
            }
        }
    }

    async fn summary_for_missing_adapter(
        &self,
        config: &channel_config::Model,
        sync_type: SyncType,
    ) -> Result<SyncSummary, ServiceError> {
        let message = format!("no adapter registered for channel '{}'", config.channel);
        let log = self.open_log(config, sync_type).await?;
        self.finish_log(log, SyncStatus::Failed, 0, 0, 0, &[message.clone()])
            .await?;
        Ok(SyncSummary {
            sync_type: sync_type.as_str().to_string(),
            status: SyncStatus::Failed.as_str().to_string(),
            processed: 0,
            succeeded: 0,
            failed: 0,
            errors: vec![message],
        })
    }

    async fn open_log(
        &self,
        config: &channel_config::Model,
        sync_type: SyncType,
    ) -> Result<sync_log::Model, ServiceError> {
        let db = &*self.db;
        let now = Utc::now();
        Ok(sync_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            property_id: Set(config.property_id),
            channel: Set(config.channel.clone()),
            sync_type: Set(sync_type.as_str().to_string()),
            status: Set(SyncStatus::Running.as_str().to_string()),
            started_at: Set(now),
            finished_at: Set(None),
            records_processed: Set(0),
            records_succeeded: Set(0),
            records_failed: Set(0),
            errors: Set(json!([])),
            created_at: Set(now),
        }
        .insert(db)
        .await?)
    }

    async fn finish_log(
        &self,
        log: sync_log::Model,
        status: SyncStatus,
        processed: i32,
        succeeded: i32,
        failed: i32,
        errors: &[String],
    ) -> Result<(), ServiceError> {
        let db = &*self.db;
        let mut active: sync_log::ActiveModel = log.into();
        active.status = Set(status.as_str().to_string());
        active.finished_at = Set(Some(Utc::now()));
        active.records_processed = Set(processed);
        active.records_succeeded = Set(succeeded);
        active.records_failed = Set(failed);
        active.errors = Set(json!(errors));
        active.update(db).await?;
        Ok(())
    }

    /// Stamps the per-type sync timestamp and connection state on the
    /// channel config.
    async fn touch_config(
        &self,
        config: &channel_config::Model,
        sync_type: SyncType,
        status: SyncStatus,
        last_error: Option<String>,
    ) -> Result<(), ServiceError> {
        let db = &*self.db;
        let now = Utc::now();
        let mut active: channel_config::ActiveModel = config.clone().into();
        match sync_type {
            SyncType::Inventory => active.last_inventory_sync = Set(Some(now)),
            SyncType::Rates => active.last_rates_sync = Set(Some(now)),
            SyncType::Bookings => active.last_bookings_sync = Set(Some(now)),
        }
        let connection = if status == SyncStatus::Completed {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Error
        };
        active.connection_status = Set(connection.as_str().to_string());
        active.last_error = Set(last_error);
        active.updated_at = Set(Some(now));
        active.update(db).await?;
        Ok(())
    }

    /// Retries retryable channel errors with exponential backoff and
    /// jitter. Non-retryable errors fail immediately.
    async fn with_retry<T, F, Fut>(&self, op: F) -> Result<T, ChannelError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ChannelError>>,
    {
        let attempts = self.settings.retry_attempts.max(1);
        let mut last_err = None;
        for attempt in 0..attempts {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if !e.is_retryable() || attempt + 1 == attempts {
                        return Err(e);
                    }
                    let backoff = self.settings.retry_backoff_ms << attempt;
                    let jitter = rand::thread_rng().gen_range(0..=self.settings.retry_backoff_ms / 2 + 1);
                    warn!(attempt, backoff_ms = backoff + jitter, error = %e, "Channel call failed; retrying");
                    sleep(std::time::Duration::from_millis(backoff + jitter)).await;
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or(ChannelError::Timeout))
    }

    fn try_acquire(&self, key: (Uuid, String)) -> Option<SyncGuard<'_>> {
        match self.in_flight.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => None,
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(());
                Some(SyncGuard {
                    map: &self.in_flight,
                    key,
                })
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn list_sync_logs(
        &self,
        property_id: Uuid,
        channel: Option<String>,
        sync_type: Option<String>,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<sync_log::Model>, u64), ServiceError> {
        let db = &*self.db;
        let mut query = SyncLogEntity::find()
            .filter(sync_log::Column::PropertyId.eq(property_id));
        if let Some(channel) = channel {
            query = query.filter(sync_log::Column::Channel.eq(channel));
        }
        if let Some(sync_type) = sync_type {
            let sync_type = SyncType::from_str(&sync_type).ok_or_else(|| {
                ServiceError::ValidationError(format!("unknown sync_type '{}'", sync_type))
            })?;
            query = query.filter(sync_log::Column::SyncType.eq(sync_type.as_str()));
        }

        let paginator = query
            .order_by_desc(sync_log::Column::StartedAt)
            .paginate(db, per_page.max(1));
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((items, total))
    }

    /// Properties with at least one enabled channel, for the periodic loop.
    async fn properties_with_channels(&self) -> Result<Vec<Uuid>, ServiceError> {
        let db = &*self.db;
        let configs = ChannelConfigEntity::find()
            .filter(channel_config::Column::Enabled.eq(true))
            .all(db)
            .await?;
        let mut ids: Vec<Uuid> = configs.into_iter().map(|c| c.property_id).collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }
}

/// Guard marking a (property, channel) pair as in flight.
struct SyncGuard<'a> {
    map: &'a DashMap<(Uuid, String), ()>,
    key: (Uuid, String),
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.map.remove(&self.key);
    }
}

/// Background loop: periodic full sync of every property with enabled
/// channels. Per-property errors are logged; the loop keeps going.
pub async fn run_sync_loop(service: Arc<ChannelSyncService>, interval_secs: u64) {
    let mut ticker = interval(std::time::Duration::from_secs(interval_secs.max(1)));
    info!(interval_secs, "Channel sync loop started");
    loop {
        ticker.tick().await;
        let properties = match service.properties_with_channels().await {
            Ok(ids) => ids,
            Err(e) => {
                error!(error = %e, "Failed to list properties for sync");
                continue;
            }
        };
        for property_id in properties {
            if let Err(e) = service.sync_property(property_id, None).await {
                error!(property_id = %property_id, error = %e, "Property sync failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn settings(demand: f64, weekend: f64) -> SyncSettings {
        SyncSettings {
            horizon_days: 30,
            retry_attempts: 3,
            retry_backoff_ms: 10,
            demand_multiplier: Decimal::from_f64(demand).unwrap(),
            weekend_multiplier: Decimal::from_f64(weekend).unwrap(),
            min_factor: dec!(0.5),
            max_factor: dec!(2.0),
        }
    }

    fn service_with(settings: SyncSettings) -> ChannelSyncService {
        let db = Arc::new(DatabaseConnection::default());
        let (tx, _rx) = tokio::sync::mpsc::channel(8);
        let catalog = Arc::new(CatalogService::new(db.clone()));
        let pricing = Arc::new(PricingService::new(
            db.clone(),
            std::time::Duration::from_secs(60),
        ));
        let inventory = Arc::new(InventoryService::new(db.clone()));
        let coupons = Arc::new(crate::services::coupons::CouponService::new(db.clone()));
        let bookings = Arc::new(BookingService::new(
            db.clone(),
            catalog.clone(),
            pricing.clone(),
            inventory.clone(),
            coupons,
            EventSender::new(tx.clone()),
        ));
        ChannelSyncService::new(
            db,
            Arc::new(ChannelRegistry::new()),
            catalog,
            pricing,
            inventory,
            bookings,
            EventSender::new(tx),
            settings,
        )
    }

    fn d(y: i32, m: u32, day: u32) -> chrono::NaiveDate {
        chrono::NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn weekday_rate_gets_demand_multiplier_only() {
        let svc = service_with(settings(1.1, 1.3));
        // 2026-09-02 is a Wednesday
        assert_eq!(svc.adjust_rate(dec!(100), d(2026, 9, 2)), dec!(110));
    }

    #[test]
    fn weekend_rate_gets_both_multipliers() {
        let svc = service_with(settings(1.1, 1.3));
        // 2026-09-04 is a Friday
        assert_eq!(svc.adjust_rate(dec!(100), d(2026, 9, 4)), dec!(143));
    }

    #[test]
    fn adjusted_rate_clamped_to_band() {
        // 4.0 demand would push past the 2.0x ceiling
        let svc = service_with(settings(4.0, 1.0));
        assert_eq!(svc.adjust_rate(dec!(100), d(2026, 9, 2)), dec!(200));

        // 0.1 demand would undercut the 0.5x floor
        let svc = service_with(settings(0.1, 1.0));
        assert_eq!(svc.adjust_rate(dec!(100), d(2026, 9, 2)), dec!(50));
    }

    #[test]
    fn guard_excludes_same_pair_only() {
        let svc = service_with(settings(1.0, 1.0));
        let property = Uuid::new_v4();
        let guard = svc.try_acquire((property, "booking_com".to_string()));
        assert!(guard.is_some());
        assert!(svc
            .try_acquire((property, "booking_com".to_string()))
            .is_none());
        assert!(svc.try_acquire((property, "expedia".to_string())).is_some());

        drop(guard);
        assert!(svc
            .try_acquire((property, "booking_com".to_string()))
            .is_some());
    }

    #[tokio::test]
    async fn retry_gives_up_on_non_retryable() {
        let svc = service_with(settings(1.0, 1.0));
        let calls = std::sync::atomic::AtomicUsize::new(0);
        let result: Result<(), ChannelError> = svc
            .with_retry(|| {
                calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                async { Err(ChannelError::Protocol("bad payload".to_string())) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retry_recovers_from_transient_failures() {
        let svc = service_with(settings(1.0, 1.0));
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let result = svc
            .with_retry(|| {
                let calls = calls.clone();
                async move {
                    if calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst) < 2 {
                        Err(ChannelError::Timeout)
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 3);
    }
}
