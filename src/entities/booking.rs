use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Booking lifecycle states.
///
/// `pending → confirmed → checked_in → checked_out → completed`, with
/// `cancelled` reachable from `pending` or `confirmed`. `completed` and
/// `cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    Pending,
    Confirmed,
    CheckedIn,
    CheckedOut,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::CheckedIn => "checked_in",
            BookingStatus::CheckedOut => "checked_out",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BookingStatus::Pending),
            "confirmed" => Some(BookingStatus::Confirmed),
            "checked_in" => Some(BookingStatus::CheckedIn),
            "checked_out" => Some(BookingStatus::CheckedOut),
            "completed" => Some(BookingStatus::Completed),
            "cancelled" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }

    /// Whether a booking in this state still holds room allocations.
    pub fn holds_inventory(&self) -> bool {
        !matches!(self, BookingStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "completed" => Some(PaymentStatus::Completed),
            "failed" => Some(PaymentStatus::Failed),
            "refunded" => Some(PaymentStatus::Refunded),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, Validate, utoipa::ToSchema)]
#[sea_orm(table_name = "bookings")]
#[schema(as = Booking)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Human-facing booking reference, e.g. "BK-4F2A9C"
    #[sea_orm(unique)]
    pub reference: String,

    pub property_id: Uuid,
    pub room_unit_id: Uuid,

    #[validate(length(min = 1, max = 120))]
    pub guest_name: String,
    #[validate(email)]
    pub guest_email: String,
    pub guest_phone: Option<String>,

    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub adults: i32,
    pub children: i32,
    pub rooms_requested: i32,

    pub status: String,
    pub payment_status: String,

    /// Reference handed to the payment provider when the order is issued
    #[sea_orm(unique)]
    pub payment_order_ref: String,

    /// Price snapshot at creation time; never recomputed retroactively
    pub total_amount: Decimal,
    pub discount_amount: Decimal,
    pub currency: String,
    pub coupon_id: Option<Uuid>,

    /// "direct" or the name of the channel that pushed the booking inward
    pub source: String,
    /// Channel-side booking identifier for inbound bookings
    pub external_ref: Option<String>,

    pub cancellation_reason: Option<String>,
    /// Set when a paid booking is cancelled; the refund itself is delegated
    /// to the payment provider
    pub refund_required: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::property::Entity",
        from = "Column::PropertyId",
        to = "super::property::Column::Id"
    )]
    Property,
    #[sea_orm(has_many = "super::booking_room::Entity")]
    Allocations,
    #[sea_orm(has_many = "super::payment_event::Entity")]
    PaymentEvents,
}

impl Related<super::property::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Property.def()
    }
}

impl Related<super::booking_room::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Allocations.def()
    }
}

impl Related<super::payment_event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PaymentEvents.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booking_status_round_trip() {
        assert_eq!(BookingStatus::CheckedIn.as_str(), "checked_in");
        assert_eq!(
            BookingStatus::from_str("checked_out"),
            Some(BookingStatus::CheckedOut)
        );
        assert_eq!(BookingStatus::from_str("lost"), None);
    }

    #[test]
    fn terminal_states() {
        assert!(BookingStatus::Completed.is_terminal());
        assert!(BookingStatus::Cancelled.is_terminal());
        assert!(!BookingStatus::Confirmed.is_terminal());
        assert!(!BookingStatus::Cancelled.holds_inventory());
        assert!(BookingStatus::Confirmed.holds_inventory());
    }

    #[test]
    fn payment_status_round_trip() {
        assert_eq!(PaymentStatus::Refunded.as_str(), "refunded");
        assert_eq!(
            PaymentStatus::from_str("completed"),
            Some(PaymentStatus::Completed)
        );
        assert_eq!(PaymentStatus::from_str("charged"), None);
    }
}
