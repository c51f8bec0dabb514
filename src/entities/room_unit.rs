use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A room category of a property (e.g. "deluxe", "standard-twin"). Physical
/// rooms are `room_instances` belonging to a unit.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, utoipa::ToSchema)]
#[sea_orm(table_name = "room_units")]
#[schema(as = RoomUnit)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub property_id: Uuid,
    /// Stable category code used in pricing rules and channel payloads
    pub code: String,
    pub name: String,
    pub max_occupancy: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::property::Entity",
        from = "Column::PropertyId",
        to = "super::property::Column::Id"
    )]
    Property,
    #[sea_orm(has_many = "super::room_instance::Entity")]
    RoomInstances,
}

impl Related<super::property::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Property.def()
    }
}

impl Related<super::room_instance::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RoomInstances.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
