//! Booking lifecycle orchestration.
//!
//! Creation runs in a single transaction: price resolution, coupon
//! redemption, and room-night allocation commit together or not at all.
//! Transitions are conditional updates filtered on the expected current
//! status; a zero row count means another writer got there first and the
//! transition re-derives its answer from the reloaded row.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::entities::booking::{self, BookingStatus, Entity as BookingEntity, PaymentStatus};
use crate::entities::payment_event::{self, Entity as PaymentEventEntity};
use crate::errors::{on_unique_violation, ServiceError};
use crate::events::{Event, EventSender};
use crate::services::catalog::CatalogService;
use crate::services::coupons::CouponService;
use crate::services::inventory::InventoryService;
use crate::services::pricing::PricingService;

#[derive(Debug, Clone, serde::Deserialize, Validate, utoipa::ToSchema)]
pub struct CreateBookingRequest {
    pub property_id: Uuid,
    /// Room category code, e.g. "DLX"
    #[validate(length(min = 1, max = 16))]
    pub room_type: String,
    #[validate(length(min = 1, max = 120))]
    pub guest_name: String,
    #[validate(email)]
    pub guest_email: String,
    pub guest_phone: Option<String>,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    #[validate(range(min = 1, max = 16))]
    pub adults: i32,
    #[validate(range(min = 0, max = 16))]
    pub children: i32,
    #[validate(range(min = 1, max = 8))]
    pub rooms: i32,
    /// Meal plan code; defaults to "EP"
    pub plan_type: Option<String>,
    /// "single", "double", "triple"; defaults to "double"
    pub occupancy_type: Option<String>,
    pub coupon_code: Option<String>,
    /// Channel name for inbound bookings; absent means direct
    pub source: Option<String>,
    /// Channel-side booking id for inbound bookings
    pub external_ref: Option<String>,
}

/// What a payment-captured event did to the booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmOutcome {
    Confirmed,
    /// Event id already recorded; nothing changed.
    DuplicateEvent,
    /// Booking already confirmed by an earlier event.
    AlreadyConfirmed,
    /// Capture arrived after cancellation; booking flagged for refund.
    RefundFlagged,
}

#[derive(Debug, Clone, serde::Deserialize, utoipa::ToSchema)]
pub struct BookingListFilter {
    pub property_id: Option<Uuid>,
    pub status: Option<String>,
    pub guest_email: Option<String>,
}

pub struct BookingService {
    db: Arc<DatabaseConnection>,
    catalog: Arc<CatalogService>,
    pricing: Arc<PricingService>,
    inventory: Arc<InventoryService>,
    coupons: Arc<CouponService>,
    event_sender: EventSender,
}

impl BookingService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        catalog: Arc<CatalogService>,
        pricing: Arc<PricingService>,
        inventory: Arc<InventoryService>,
        coupons: Arc<CouponService>,
        event_sender: EventSender,
    ) -> Self {
        Self {
            db,
            catalog,
            pricing,
            inventory,
            coupons,
            event_sender,
        }
    }

    /// Creates a pending booking with its price snapshot, coupon
    /// redemption, and room-night allocation in one transaction.
    #[instrument(skip(self, request), fields(property_id = %request.property_id))]
    pub async fn create(
        &self,
        request: CreateBookingRequest,
    ) -> Result<booking::Model, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        if request.check_in >= request.check_out {
            return Err(ServiceError::ValidationError(
                "check_in must precede check_out".to_string(),
            ));
        }
        if request.check_in < Utc::now().date_naive() {
            return Err(ServiceError::ValidationError(
                "check_in must not be in the past".to_string(),
            ));
        }

        let plan_type = request.plan_type.as_deref().unwrap_or("EP");
        let occupancy_type = request.occupancy_type.as_deref().unwrap_or("double");
        let source = request.source.clone().unwrap_or_else(|| "direct".to_string());

        let txn = self.db.begin().await?;

        let property = self.catalog.get_property(&txn, request.property_id).await?;
        let unit = self
            .catalog
            .get_room_unit(&txn, property.id, &request.room_type)
            .await?;

        let nightly = self
            .pricing
            .resolve_range(
                &txn,
                &property,
                unit.id,
                plan_type,
                occupancy_type,
                request.check_in,
                request.check_out,
            )
            .await?;
        let per_room: Decimal = nightly.iter().map(|(_, rate)| *rate).sum();
        let subtotal = per_room * Decimal::from(request.rooms);

        let booking_id = Uuid::new_v4();
        let reference = new_reference();
        let payment_order_ref = format!("ord_{}", Uuid::new_v4().simple());

        let (coupon_id, discount) = match &request.coupon_code {
            Some(code) => {
                let (coupon, _) = self
                    .coupons
                    .validate(&txn, code, subtotal, &request.guest_email, property.id)
                    .await?;
                let applied = self
                    .coupons
                    .apply(&txn, &coupon, booking_id, &request.guest_email, subtotal)
                    .await?;
                (Some(applied.coupon_id), applied.discount)
            }
            None => (None, Decimal::ZERO),
        };
        let total = subtotal - discount;

        let now = Utc::now();
        let model = booking::ActiveModel {
            id: Set(booking_id),
            reference: Set(reference),
            property_id: Set(property.id),
            room_unit_id: Set(unit.id),
            guest_name: Set(request.guest_name.clone()),
            guest_email: Set(request.guest_email.clone()),
            guest_phone: Set(request.guest_phone.clone()),
            check_in: Set(request.check_in),
            check_out: Set(request.check_out),
            adults: Set(request.adults),
            children: Set(request.children),
            rooms_requested: Set(request.rooms),
            status: Set(BookingStatus::Pending.as_str().to_string()),
            payment_status: Set(PaymentStatus::Pending.as_str().to_string()),
            payment_order_ref: Set(payment_order_ref),
            total_amount: Set(total),
            discount_amount: Set(discount),
            currency: Set(property.currency.clone()),
            coupon_id: Set(coupon_id),
            source: Set(source.clone()),
            external_ref: Set(request.external_ref.clone()),
            cancellation_reason: Set(None),
            refund_required: Set(false),
            created_at: Set(now),
            updated_at: Set(None),
            version: Set(1),
        }
        .insert(&txn)
        .await?;

        self.inventory
            .allocate(&txn, booking_id, unit.id, request.rooms, &nightly)
            .await?;

        txn.commit().await?;

        if let Err(e) = self
            .event_sender
            .send(Event::BookingCreated {
                booking_id,
                property_id: property.id,
                source,
            })
            .await
        {
            warn!(error = %e, "Failed to emit BookingCreated");
        }

        info!(booking_id = %booking_id, reference = %model.reference, total = %total, "Booking created");
        Ok(model)
    }

    /// Applies a payment capture. Idempotent on `provider_event_id`; a
    /// capture that lands after cancellation flags the booking for refund
    /// instead of resurrecting it.
    #[instrument(skip(self), fields(booking_id = %booking_id))]
    pub async fn confirm(
        &self,
        booking_id: Uuid,
        provider_event_id: &str,
        amount: Option<Decimal>,
    ) -> Result<ConfirmOutcome, ServiceError> {
        let txn = self.db.begin().await?;

        if !self
            .record_payment_event(&txn, booking_id, provider_event_id, "captured", amount)
            .await?
        {
            txn.commit().await?;
            info!(provider_event_id, "Duplicate capture event ignored");
            return Ok(ConfirmOutcome::DuplicateEvent);
        }

        let transitioned = BookingEntity::update_many()
            .col_expr(
                booking::Column::Status,
                Expr::value(BookingStatus::Confirmed.as_str()),
            )
            .col_expr(
                booking::Column::PaymentStatus,
                Expr::value(PaymentStatus::Completed.as_str()),
            )
            .col_expr(booking::Column::UpdatedAt, Expr::value(Some(Utc::now())))
            .col_expr(
                booking::Column::Version,
                Expr::col(booking::Column::Version).add(1),
            )
            .filter(booking::Column::Id.eq(booking_id))
            .filter(booking::Column::Status.eq(BookingStatus::Pending.as_str()))
            .exec(&txn)
            .await?
            .rows_affected;

        if transitioned == 1 {
            self.inventory.mark_occupied(&txn, booking_id).await?;
            txn.commit().await?;
            self.emit(Event::BookingConfirmed {
                booking_id,
                payment_event_id: provider_event_id.to_string(),
            })
            .await;
            info!(booking_id = %booking_id, "Booking confirmed");
            return Ok(ConfirmOutcome::Confirmed);
        }

        // Lost the race or the booking already left pending.
        let current = BookingEntity::find_by_id(booking_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Booking {} not found", booking_id)))?;
        match BookingStatus::from_str(&current.status) {
            Some(BookingStatus::Confirmed)
            | Some(BookingStatus::CheckedIn)
            | Some(BookingStatus::CheckedOut)
            | Some(BookingStatus::Completed) => {
                txn.commit().await?;
                Ok(ConfirmOutcome::AlreadyConfirmed)
            }
            Some(BookingStatus::Cancelled) => {
                BookingEntity::update_many()
                    .col_expr(booking::Column::RefundRequired, Expr::value(true))
                    .col_expr(
                        booking::Column::PaymentStatus,
                        Expr::value(PaymentStatus::Completed.as_str()),
                    )
                    .col_expr(booking::Column::UpdatedAt, Expr::value(Some(Utc::now())))
                    .filter(booking::Column::Id.eq(booking_id))
                    .exec(&txn)
                    .await?;
                txn.commit().await?;
                warn!(booking_id = %booking_id, "Capture after cancellation; refund flagged");
                Ok(ConfirmOutcome::RefundFlagged)
            }
            _ => {
                txn.commit().await?;
                Err(ServiceError::InvalidStatus(format!(
                    "cannot confirm booking in status '{}'",
                    current.status
                )))
            }
        }
    }

    /// Records a payment failure. The booking stays pending so the guest
    /// can retry; the auto-cancel sweep reclaims the hold if they don't.
    #[instrument(skip(self), fields(booking_id = %booking_id))]
    pub async fn record_payment_failure(
        &self,
        booking_id: Uuid,
        provider_event_id: &str,
    ) -> Result<bool, ServiceError> {
        let txn = self.db.begin().await?;
        if !self
            .record_payment_event(&txn, booking_id, provider_event_id, "failed", None)
            .await?
        {
            txn.commit().await?;
            return Ok(false);
        }

        BookingEntity::update_many()
            .col_expr(
                booking::Column::PaymentStatus,
                Expr::value(PaymentStatus::Failed.as_str()),
            )
            .col_expr(booking::Column::UpdatedAt, Expr::value(Some(Utc::now())))
            .filter(booking::Column::Id.eq(booking_id))
            .filter(booking::Column::Status.eq(BookingStatus::Pending.as_str()))
            .exec(&txn)
            .await?;
        txn.commit().await?;

        self.emit(Event::PaymentFailed {
            booking_id,
            provider_event_id: provider_event_id.to_string(),
        })
        .await;
        Ok(true)
    }

    /// Applies a refund-created event: marks the payment refunded and
    /// cancels the booking if it still holds inventory.
    #[instrument(skip(self), fields(booking_id = %booking_id))]
    pub async fn apply_refund(
        &self,
        booking_id: Uuid,
        provider_event_id: &str,
        amount: Option<Decimal>,
    ) -> Result<bool, ServiceError> {
        let txn = self.db.begin().await?;
        if !self
            .record_payment_event(&txn, booking_id, provider_event_id, "refunded", amount)
            .await?
        {
            txn.commit().await?;
            return Ok(false);
        }

        let current = BookingEntity::find_by_id(booking_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Booking {} not found", booking_id)))?;

        BookingEntity::update_many()
            .col_expr(
                booking::Column::PaymentStatus,
                Expr::value(PaymentStatus::Refunded.as_str()),
            )
            .col_expr(booking::Column::RefundRequired, Expr::value(false))
            .col_expr(booking::Column::UpdatedAt, Expr::value(Some(Utc::now())))
            .filter(booking::Column::Id.eq(booking_id))
            .exec(&txn)
            .await?;

        let mut cancelled = false;
        if matches!(
            BookingStatus::from_str(&current.status),
            Some(BookingStatus::Pending) | Some(BookingStatus::Confirmed)
        ) {
            self.cancel_in_txn(&txn, &current, "refund issued by payment provider", false)
                .await?;
            cancelled = true;
        }
        txn.commit().await?;

        self.emit(Event::PaymentRefunded {
            booking_id,
            provider_event_id: provider_event_id.to_string(),
        })
        .await;
        if cancelled {
            self.emit(Event::BookingCancelled {
                booking_id,
                reason: "refund issued by payment provider".to_string(),
                refund_required: false,
            })
            .await;
        }
        Ok(true)
    }

    /// Guest- or operator-initiated cancellation. Allowed from pending and
    /// confirmed; cancelling an already-cancelled booking is a no-op.
    #[instrument(skip(self), fields(booking_id = %booking_id))]
    pub async fn cancel(
        &self,
        booking_id: Uuid,
        reason: &str,
    ) -> Result<booking::Model, ServiceError> {
        let txn = self.db.begin().await?;
        let current = BookingEntity::find_by_id(booking_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Booking {} not found", booking_id)))?;

        match BookingStatus::from_str(&current.status) {
            Some(BookingStatus::Cancelled) => {
                txn.commit().await?;
                return Ok(current);
            }
            Some(BookingStatus::Pending) | Some(BookingStatus::Confirmed) => {}
            _ => {
                txn.commit().await?;
                return Err(ServiceError::InvalidStatus(format!(
                    "cannot cancel booking in status '{}'",
                    current.status
                )));
            }
        }

        let refund_required =
            PaymentStatus::from_str(&current.payment_status) == Some(PaymentStatus::Completed);
        self.cancel_in_txn(&txn, &current, reason, refund_required)
            .await?;

        let updated = BookingEntity::find_by_id(booking_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Booking {} not found", booking_id)))?;
        txn.commit().await?;

        self.emit(Event::BookingCancelled {
            booking_id,
            reason: reason.to_string(),
            refund_required,
        })
        .await;
        info!(booking_id = %booking_id, refund_required, "Booking cancelled");
        Ok(updated)
    }

    /// Expires one pending, unpaid booking. Returns false when the booking
    /// escaped the sweep (payment landed, or another sweeper won).
    #[instrument(skip(self), fields(booking_id = %booking_id))]
    pub async fn cancel_expired(&self, booking_id: Uuid) -> Result<bool, ServiceError> {
        let txn = self.db.begin().await?;
        let transitioned = BookingEntity::update_many()
            .col_expr(
                booking::Column::Status,
                Expr::value(BookingStatus::Cancelled.as_str()),
            )
            .col_expr(
                booking::Column::CancellationReason,
                Expr::value(Some("payment window elapsed")),
            )
            .col_expr(booking::Column::UpdatedAt, Expr::value(Some(Utc::now())))
            .col_expr(
                booking::Column::Version,
                Expr::col(booking::Column::Version).add(1),
            )
            .filter(booking::Column::Id.eq(booking_id))
            .filter(booking::Column::Status.eq(BookingStatus::Pending.as_str()))
            .filter(
                booking::Column::PaymentStatus.ne(PaymentStatus::Completed.as_str()),
            )
            .exec(&txn)
            .await?
            .rows_affected;

        if transitioned == 0 {
            txn.commit().await?;
            return Ok(false);
        }

        self.inventory.release(&txn, booking_id).await?;
        txn.commit().await?;

        self.emit(Event::BookingExpired(booking_id)).await;
        info!(booking_id = %booking_id, "Booking expired");
        Ok(true)
    }

    pub async fn check_in(&self, booking_id: Uuid) -> Result<booking::Model, ServiceError> {
        let db = &*self.db;
        let current = self.get(booking_id).await?;
        if Utc::now().date_naive() < current.check_in {
            return Err(ServiceError::InvalidOperation(format!(
                "check-in opens on {}",
                current.check_in
            )));
        }
        let updated = self
            .transition(db, booking_id, BookingStatus::Confirmed, BookingStatus::CheckedIn)
            .await?;
        self.emit(Event::BookingCheckedIn(booking_id)).await;
        Ok(updated)
    }

    pub async fn check_out(&self, booking_id: Uuid) -> Result<booking::Model, ServiceError> {
        let db = &*self.db;
        let updated = self
            .transition(db, booking_id, BookingStatus::CheckedIn, BookingStatus::CheckedOut)
            .await?;
        self.emit(Event::BookingCheckedOut(booking_id)).await;
        Ok(updated)
    }

    pub async fn complete(&self, booking_id: Uuid) -> Result<booking::Model, ServiceError> {
        let db = &*self.db;
        let updated = self
            .transition(db, booking_id, BookingStatus::CheckedOut, BookingStatus::Completed)
            .await?;
        self.emit(Event::BookingCompleted(booking_id)).await;
        Ok(updated)
    }

    pub async fn get(&self, booking_id: Uuid) -> Result<booking::Model, ServiceError> {
        let db = &*self.db;
        BookingEntity::find_by_id(booking_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Booking {} not found", booking_id)))
    }

    pub async fn get_by_reference(&self, reference: &str) -> Result<booking::Model, ServiceError> {
        let db = &*self.db;
        BookingEntity::find()
            .filter(booking::Column::Reference.eq(reference))
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Booking '{}' not found", reference)))
    }

    pub async fn get_by_payment_order_ref(
        &self,
        order_ref: &str,
    ) -> Result<booking::Model, ServiceError> {
        let db = &*self.db;
        BookingEntity::find()
            .filter(booking::Column::PaymentOrderRef.eq(order_ref))
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("No booking for payment order '{}'", order_ref))
            })
    }

    /// Existing inbound booking for a channel, if this external ref was
    /// already ingested.
    pub async fn find_by_external_ref(
        &self,
        source: &str,
        external_ref: &str,
    ) -> Result<Option<booking::Model>, ServiceError> {
        let db = &*self.db;
        Ok(BookingEntity::find()
            .filter(booking::Column::Source.eq(source))
            .filter(booking::Column::ExternalRef.eq(external_ref))
            .one(db)
            .await?)
    }

    #[instrument(skip(self, filter))]
    pub async fn list(
        &self,
        filter: BookingListFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<booking::Model>, u64), ServiceError> {
        let db = &*self.db;
        let mut query = BookingEntity::find();
        if let Some(property_id) = filter.property_id {
            query = query.filter(booking::Column::PropertyId.eq(property_id));
        }
        if let Some(status) = &filter.status {
            let status = BookingStatus::from_str(status).ok_or_else(|| {
                ServiceError::ValidationError(format!("unknown status '{}'", status))
            })?;
            query = query.filter(booking::Column::Status.eq(status.as_str()));
        }
        if let Some(email) = &filter.guest_email {
            query = query.filter(booking::Column::GuestEmail.eq(email.clone()));
        }

        let paginator = query
            .order_by_desc(booking::Column::CreatedAt)
            .paginate(db, per_page.max(1));
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((items, total))
    }

    /// Pending, unpaid bookings older than the grace cutoff.
    pub async fn find_expired(
        &self,
        cutoff: chrono::DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<booking::Model>, ServiceError> {
        let db = &*self.db;
        let paginator = BookingEntity::find()
            .filter(booking::Column::Status.eq(BookingStatus::Pending.as_str()))
            .filter(booking::Column::PaymentStatus.ne(PaymentStatus::Completed.as_str()))
            .filter(booking::Column::CreatedAt.lt(cutoff))
            .order_by_asc(booking::Column::CreatedAt)
            .paginate(db, limit.max(1));
        Ok(paginator.fetch_page(0).await?)
    }

    /// Writes the payment history entry. Returns false when the provider
    /// event id was already recorded.
    async fn record_payment_event(
        &self,
        txn: &DatabaseTransaction,
        booking_id: Uuid,
        provider_event_id: &str,
        event_type: &str,
        amount: Option<Decimal>,
    ) -> Result<bool, ServiceError> {
        let row = payment_event::ActiveModel {
            id: Set(Uuid::new_v4()),
            booking_id: Set(booking_id),
            provider_event_id: Set(provider_event_id.to_string()),
            event_type: Set(event_type.to_string()),
            amount: Set(amount),
            created_at: Set(Utc::now()),
        };
        match PaymentEventEntity::insert(row).exec(txn).await {
            Ok(_) => Ok(true),
            Err(e) => match e.sql_err() {
                Some(sea_orm::SqlErr::UniqueConstraintViolation(_)) => Ok(false),
                _ => Err(ServiceError::DatabaseError(e)),
            },
        }
    }

    /// Marks cancelled (conditional on the observed status) and releases
    /// the allocation. Caller owns the transaction and the event emission.
    async fn cancel_in_txn(
        &self,
        txn: &DatabaseTransaction,
        current: &booking::Model,
        reason: &str,
        refund_required: bool,
    ) -> Result<(), ServiceError> {
        let transitioned = BookingEntity::update_many()
            .col_expr(
                booking::Column::Status,
                Expr::value(BookingStatus::Cancelled.as_str()),
            )
            .col_expr(
                booking::Column::CancellationReason,
                Expr::value(Some(reason)),
            )
            .col_expr(booking::Column::RefundRequired, Expr::value(refund_required))
            .col_expr(booking::Column::UpdatedAt, Expr::value(Some(Utc::now())))
            .col_expr(
                booking::Column::Version,
                Expr::col(booking::Column::Version).add(1),
            )
            .filter(booking::Column::Id.eq(current.id))
            .filter(booking::Column::Status.eq(current.status.clone()))
            .exec(txn)
            .await?
            .rows_affected;
        if transitioned == 0 {
            return Err(ServiceError::ConcurrentModification(current.id));
        }
        self.inventory.release(txn, current.id).await?;
        Ok(())
    }

    async fn transition<C: ConnectionTrait>(
        &self,
        db: &C,
        booking_id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    ) -> Result<booking::Model, ServiceError> {
        let transitioned = BookingEntity::update_many()
            .col_expr(booking::Column::Status, Expr::value(to.as_str()))
            .col_expr(booking::Column::UpdatedAt, Expr::value(Some(Utc::now())))
            .col_expr(
                booking::Column::Version,
                Expr::col(booking::Column::Version).add(1),
            )
            .filter(booking::Column::Id.eq(booking_id))
            .filter(booking::Column::Status.eq(from.as_str()))
            .exec(db)
            .await?
            .rows_affected;

        if transitioned == 0 {
            let current = BookingEntity::find_by_id(booking_id)
                .one(db)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Booking {} not found", booking_id))
                })?;
            return Err(ServiceError::InvalidStatus(format!(
                "cannot move booking from '{}' to '{}'",
                current.status,
                to.as_str()
            )));
        }

        BookingEntity::find_by_id(booking_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Booking {} not found", booking_id)))
    }

    async fn emit(&self, event: Event) {
        if let Err(e) = self.event_sender.send(event).await {
            warn!(error = %e, "Failed to emit event");
        }
    }
}

/// Human-facing reference, e.g. "BK-4F2A9C".
fn new_reference() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("BK-{}", id[..6].to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_shape() {
        let r = new_reference();
        assert!(r.starts_with("BK-"));
        assert_eq!(r.len(), 9);
        assert!(r[3..].chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
