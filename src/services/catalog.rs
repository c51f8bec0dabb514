//! Read surface of the external property catalog, plus the seeding
//! operations property onboarding uses. The booking core only consults
//! this for room categories, instances, and the flat base price.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::entities::{
    property::{self, Entity as PropertyEntity},
    room_instance::{self, Entity as RoomInstanceEntity, RoomStatus},
    room_unit::{self, Entity as RoomUnitEntity},
};
use crate::errors::ServiceError;

#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Loads an active property or fails with `NotFound`.
    pub async fn get_property<C: ConnectionTrait>(
        &self,
        db: &C,
        property_id: Uuid,
    ) -> Result<property::Model, ServiceError> {
        PropertyEntity::find_by_id(property_id)
            .filter(property::Column::Active.eq(true))
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Property {} not found", property_id)))
    }

    /// Resolves a room unit by its category code within a property.
    pub async fn get_room_unit<C: ConnectionTrait>(
        &self,
        db: &C,
        property_id: Uuid,
        code: &str,
    ) -> Result<room_unit::Model, ServiceError> {
        RoomUnitEntity::find()
            .filter(room_unit::Column::PropertyId.eq(property_id))
            .filter(room_unit::Column::Code.eq(code))
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Room unit '{}' not found for property {}",
                    code, property_id
                ))
            })
    }

    pub async fn list_room_units(
        &self,
        property_id: Uuid,
    ) -> Result<Vec<room_unit::Model>, ServiceError> {
        let db = &*self.db;
        Ok(RoomUnitEntity::find()
            .filter(room_unit::Column::PropertyId.eq(property_id))
            .all(db)
            .await?)
    }

    /// Registers a property in the local projection.
    #[instrument(skip(self))]
    pub async fn create_property(
        &self,
        name: &str,
        currency: &str,
        base_price: Decimal,
    ) -> Result<property::Model, ServiceError> {
        let db = &*self.db;
        let model = property::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            currency: Set(currency.to_string()),
            base_price: Set(base_price),
            active: Set(true),
            created_at: Set(Utc::now()),
        }
        .insert(db)
        .await?;

        info!(property_id = %model.id, "Property registered");
        Ok(model)
    }

    /// Creates a room unit with `instance_count` physical rooms.
    #[instrument(skip(self))]
    pub async fn add_room_unit(
        &self,
        property_id: Uuid,
        code: &str,
        name: &str,
        max_occupancy: i32,
        instance_count: u32,
    ) -> Result<room_unit::Model, ServiceError> {
        let db = &*self.db;
        let now = Utc::now();

        let unit = room_unit::ActiveModel {
            id: Set(Uuid::new_v4()),
            property_id: Set(property_id),
            code: Set(code.to_string()),
            name: Set(name.to_string()),
            max_occupancy: Set(max_occupancy),
            created_at: Set(now),
        }
        .insert(db)
        .await?;

        for i in 1..=instance_count {
            room_instance::ActiveModel {
                id: Set(Uuid::new_v4()),
                room_unit_id: Set(unit.id),
                label: Set(format!("{}-{:02}", code, i)),
                status: Set(RoomStatus::Available.as_str().to_string()),
                retired: Set(false),
                created_at: Set(now),
                updated_at: Set(None),
            }
            .insert(db)
            .await?;
        }

        info!(room_unit_id = %unit.id, instances = instance_count, "Room unit created");
        Ok(unit)
    }

    pub async fn list_room_instances(
        &self,
        room_unit_id: Uuid,
    ) -> Result<Vec<room_instance::Model>, ServiceError> {
        let db = &*self.db;
        Ok(RoomInstanceEntity::find()
            .filter(room_instance::Column::RoomUnitId.eq(room_unit_id))
            .all(db)
            .await?)
    }
}
