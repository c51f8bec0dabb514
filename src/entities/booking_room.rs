use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One night of one physical room held by a booking.
///
/// The unique index on (room_instance_id, night) is the ledger's
/// double-booking guard: concurrent allocations of the same room-night race
/// on the insert and exactly one wins. Rows are deleted when the hold is
/// released; the booking itself keeps the monetary snapshot.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, utoipa::ToSchema)]
#[sea_orm(table_name = "booking_rooms")]
#[schema(as = BookingRoom)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub booking_id: Uuid,
    pub room_instance_id: Uuid,
    pub night: NaiveDate,
    /// Resolved nightly rate at allocation time
    pub nightly_rate: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::booking::Entity",
        from = "Column::BookingId",
        to = "super::booking::Column::Id"
    )]
    Booking,
    #[sea_orm(
        belongs_to = "super::room_instance::Entity",
        from = "Column::RoomInstanceId",
        to = "super::room_instance::Column::Id"
    )]
    RoomInstance,
}

impl Related<super::booking::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Booking.def()
    }
}

impl Related<super::room_instance::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RoomInstance.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
