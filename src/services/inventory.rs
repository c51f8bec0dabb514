//! Room-night allocation ledger.
//!
//! Occupancy truth is the `booking_rooms` table: one row per room instance
//! per night, guarded by a unique (room_instance_id, night) index. Two
//! transactions racing for the last free instance both pass the candidate
//! scan, but only one insert survives the index; the loser maps the
//! violation to `RoomUnavailable` and rolls back. No application-level
//! locks are held across awaits.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::entities::{
    booking_room::{self, Entity as BookingRoomEntity},
    room_instance::{self, Entity as RoomInstanceEntity, RoomStatus},
};
use crate::errors::{on_unique_violation, ServiceError};

/// Availability for one night of a room unit.
#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub struct NightAvailability {
    pub night: NaiveDate,
    pub total: i64,
    pub available: i64,
}

#[derive(Clone)]
pub struct InventoryService {
    db: Arc<DatabaseConnection>,
}

impl InventoryService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Allocates `rooms` instances of a unit for every night of
    /// `[check_in, check_out)`, inside the caller's transaction.
    ///
    /// Returns the chosen instance ids. `RoomUnavailable` if the scan finds
    /// too few free instances, or if a concurrent allocation wins the
    /// unique-index race on insert.
    #[instrument(skip(self, db, nightly_rates), fields(booking_id = %booking_id))]
    pub async fn allocate<C: ConnectionTrait>(
        &self,
        db: &C,
        booking_id: Uuid,
        room_unit_id: Uuid,
        rooms: i32,
        nightly_rates: &[(NaiveDate, Decimal)],
    ) -> Result<Vec<Uuid>, ServiceError> {
        if nightly_rates.is_empty() {
            return Err(ServiceError::ValidationError(
                "stay must cover at least one night".to_string(),
            ));
        }

        let candidates = RoomInstanceEntity::find()
            .filter(room_instance::Column::RoomUnitId.eq(room_unit_id))
            .filter(room_instance::Column::Retired.eq(false))
            .filter(room_instance::Column::Status.ne(RoomStatus::Maintenance.as_str()))
            .all(db)
            .await?;

        let candidate_ids: Vec<Uuid> = candidates.iter().map(|c| c.id).collect();
        let first_night = nightly_rates[0].0;
        let last_night = nightly_rates[nightly_rates.len() - 1].0;

        let taken = BookingRoomEntity::find()
            .filter(booking_room::Column::RoomInstanceId.is_in(candidate_ids.clone()))
            .filter(booking_room::Column::Night.gte(first_night))
            .filter(booking_room::Column::Night.lte(last_night))
            .all(db)
            .await?;
        let taken_instances: HashSet<Uuid> = taken.iter().map(|r| r.room_instance_id).collect();

        let free: Vec<Uuid> = candidate_ids
            .into_iter()
            .filter(|id| !taken_instances.contains(id))
            .take(rooms as usize)
            .collect();

        if free.len() < rooms as usize {
            debug!(
                room_unit_id = %room_unit_id,
                requested = rooms,
                free = free.len(),
                "Not enough free instances"
            );
            return Err(ServiceError::RoomUnavailable(format!(
                "only {} of {} requested rooms available",
                free.len(),
                rooms
            )));
        }

        let now = Utc::now();
        for instance_id in &free {
            for (night, rate) in nightly_rates {
                let row = booking_room::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    booking_id: Set(booking_id),
                    room_instance_id: Set(*instance_id),
                    night: Set(*night),
                    nightly_rate: Set(*rate),
                    created_at: Set(now),
                };
                if let Err(e) = row.insert(db).await {
                    // Concurrent allocation won the unique-index race.
                    return Err(on_unique_violation(e, || {
                        ServiceError::RoomUnavailable(
                            "room was allocated concurrently".to_string(),
                        )
                    }));
                }
            }
        }

        info!(
            booking_id = %booking_id,
            instances = free.len(),
            nights = nightly_rates.len(),
            "Room nights allocated"
        );
        Ok(free)
    }

    /// Releases every room night held by a booking. Idempotent: releasing
    /// an already-released booking deletes zero rows and succeeds.
    #[instrument(skip(self, db))]
    pub async fn release<C: ConnectionTrait>(
        &self,
        db: &C,
        booking_id: Uuid,
    ) -> Result<u64, ServiceError> {
        let held = BookingRoomEntity::find()
            .filter(booking_room::Column::BookingId.eq(booking_id))
            .all(db)
            .await?;
        if held.is_empty() {
            debug!(booking_id = %booking_id, "Release: nothing held");
            return Ok(0);
        }
        let instance_ids: HashSet<Uuid> = held.iter().map(|r| r.room_instance_id).collect();

        let deleted = BookingRoomEntity::delete_many()
            .filter(booking_room::Column::BookingId.eq(booking_id))
            .exec(db)
            .await?
            .rows_affected;

        // Instances with no remaining allocations go back to available.
        for instance_id in instance_ids {
            let still_held = BookingRoomEntity::find()
                .filter(booking_room::Column::RoomInstanceId.eq(instance_id))
                .one(db)
                .await?;
            if still_held.is_none() {
                RoomInstanceEntity::update_many()
                    .col_expr(
                        room_instance::Column::Status,
                        Expr::value(RoomStatus::Available.as_str()),
                    )
                    .col_expr(room_instance::Column::UpdatedAt, Expr::value(Utc::now()))
                    .filter(room_instance::Column::Id.eq(instance_id))
                    .filter(room_instance::Column::Status.ne(RoomStatus::Maintenance.as_str()))
                    .exec(db)
                    .await?;
            }
        }

        info!(booking_id = %booking_id, rows = deleted, "Room nights released");
        Ok(deleted)
    }

    /// Marks a booking's instances as physically occupied.
    pub async fn mark_occupied<C: ConnectionTrait>(
        &self,
        db: &C,
        booking_id: Uuid,
    ) -> Result<(), ServiceError> {
        let held = BookingRoomEntity::find()
            .filter(booking_room::Column::BookingId.eq(booking_id))
            .all(db)
            .await?;
        let instance_ids: HashSet<Uuid> = held.iter().map(|r| r.room_instance_id).collect();
        if instance_ids.is_empty() {
            warn!(booking_id = %booking_id, "mark_occupied: booking holds no rooms");
            return Ok(());
        }

        RoomInstanceEntity::update_many()
            .col_expr(
                room_instance::Column::Status,
                Expr::value(RoomStatus::Booked.as_str()),
            )
            .col_expr(room_instance::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(room_instance::Column::Id.is_in(instance_ids))
            .exec(db)
            .await?;
        Ok(())
    }

    /// Per-night availability counts for a room unit over `[from, to)`.
    /// Advisory reads for display and channel pushes; the allocation path
    /// never trusts these counts.
    #[instrument(skip(self))]
    pub async fn availability(
        &self,
        room_unit_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<NightAvailability>, ServiceError> {
        let db = &*self.db;
        let instances = RoomInstanceEntity::find()
            .filter(room_instance::Column::RoomUnitId.eq(room_unit_id))
            .filter(room_instance::Column::Retired.eq(false))
            .filter(room_instance::Column::Status.ne(RoomStatus::Maintenance.as_str()))
            .all(db)
            .await?;
        let instance_ids: Vec<Uuid> = instances.iter().map(|i| i.id).collect();
        let total = instance_ids.len() as i64;

        let held = BookingRoomEntity::find()
            .filter(booking_room::Column::RoomInstanceId.is_in(instance_ids))
            .filter(booking_room::Column::Night.gte(from))
            .filter(booking_room::Column::Night.lt(to))
            .all(db)
            .await?;

        let mut out = Vec::new();
        let mut night = from;
        while night < to {
            let booked = held.iter().filter(|r| r.night == night).count() as i64;
            out.push(NightAvailability {
                night,
                total,
                available: total - booked,
            });
            night = match night.succ_opt() {
                Some(n) => n,
                None => break,
            };
        }
        Ok(out)
    }

    /// Flips a room instance in or out of maintenance. Instances under
    /// maintenance are excluded from allocation and availability counts;
    /// existing allocations are untouched.
    #[instrument(skip(self))]
    pub async fn set_maintenance(
        &self,
        instance_id: Uuid,
        under_maintenance: bool,
    ) -> Result<room_instance::Model, ServiceError> {
        let db = &*self.db;
        let instance = RoomInstanceEntity::find_by_id(instance_id)
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Room instance {} not found", instance_id))
            })?;

        let next = if under_maintenance {
            RoomStatus::Maintenance
        } else {
            RoomStatus::Available
        };
        let mut active: room_instance::ActiveModel = instance.into();
        active.status = Set(next.as_str().to_string());
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(db).await?;

        info!(instance_id = %instance_id, status = %updated.status, "Room instance status changed");
        Ok(updated)
    }
}
