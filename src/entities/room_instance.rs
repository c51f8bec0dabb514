use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a physical room. Mutated only by the inventory ledger
/// (booking confirmation/cancellation) or a manual maintenance flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomStatus {
    Available,
    Booked,
    Maintenance,
}

impl RoomStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomStatus::Available => "available",
            RoomStatus::Booked => "booked",
            RoomStatus::Maintenance => "maintenance",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "available" => Some(RoomStatus::Available),
            "booked" => Some(RoomStatus::Booked),
            "maintenance" => Some(RoomStatus::Maintenance),
            _ => None,
        }
    }
}

/// A physical, allocatable room. Never deleted while bookings reference it;
/// `retired` soft-removes it from the allocatable pool.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, utoipa::ToSchema)]
#[sea_orm(table_name = "room_instances")]
#[schema(as = RoomInstance)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub room_unit_id: Uuid,
    /// Human-facing room label, e.g. "204"
    pub label: String,
    pub status: String,
    pub retired: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::room_unit::Entity",
        from = "Column::RoomUnitId",
        to = "super::room_unit::Column::Id"
    )]
    RoomUnit,
    #[sea_orm(has_many = "super::booking_room::Entity")]
    Allocations,
}

impl Related<super::room_unit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RoomUnit.def()
    }
}

impl Related<super::booking_room::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Allocations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_status_round_trip() {
        assert_eq!(RoomStatus::Available.as_str(), "available");
        assert_eq!(RoomStatus::from_str("booked"), Some(RoomStatus::Booked));
        assert_eq!(RoomStatus::from_str("demolished"), None);
    }
}
