use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Rule specificity tier. CUSTOM beats SEASONAL beats BASE; when no rule
/// matches at all, the property's flat base price applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PricingType {
    Base,
    Seasonal,
    Custom,
}

impl PricingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PricingType::Base => "BASE",
            PricingType::Seasonal => "SEASONAL",
            PricingType::Custom => "CUSTOM",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "BASE" => Some(PricingType::Base),
            "SEASONAL" => Some(PricingType::Seasonal),
            "CUSTOM" => Some(PricingType::Custom),
            _ => None,
        }
    }

    /// Higher wins during resolution.
    pub fn precedence(&self) -> u8 {
        match self {
            PricingType::Base => 0,
            PricingType::Seasonal => 1,
            PricingType::Custom => 2,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, utoipa::ToSchema)]
#[sea_orm(table_name = "pricing_rules")]
#[schema(as = PricingRule)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub property_id: Uuid,
    pub room_unit_id: Uuid,
    /// Meal/board plan code, e.g. "EP", "CP", "MAP"
    pub plan_type: String,
    /// "single", "double", "triple"
    pub occupancy_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub price: Decimal,
    pub pricing_type: String,
    pub active: bool,
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
}

impl Related<super::room_unit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RoomUnit.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
