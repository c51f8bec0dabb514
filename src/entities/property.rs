use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Read-side projection of the external property catalog: the fields the
/// booking engine needs (flat base price fallback, currency, active flag).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, utoipa::ToSchema)]
#[sea_orm(table_name = "properties")]
#[schema(as = Property)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub currency: String,
    /// Flat nightly price used when no pricing rule matches
    pub base_price: Decimal,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::room_unit::Entity")]
    RoomUnits,
    #[sea_orm(has_many = "super::booking::Entity")]
    Bookings,
}

impl Related<super::room_unit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RoomUnits.def()
    }
}

impl Related<super::booking::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bookings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
