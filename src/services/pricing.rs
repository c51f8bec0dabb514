//! Per-night rate resolution.
//!
//! A night's rate is decided by the most specific active rule covering it:
//! CUSTOM beats SEASONAL beats BASE, and within a tier the narrower date
//! window wins. When nothing matches, the property's flat base price
//! applies. Booking creation resolves against the database inside the
//! booking transaction; only the outward channel rate push reads through
//! the short-TTL cache.

use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::entities::{
    pricing_rule::{self, Entity as PricingRuleEntity, PricingType},
    property,
};
use crate::errors::ServiceError;

#[derive(Debug, Clone, serde::Deserialize, Validate, utoipa::ToSchema)]
pub struct CreatePricingRuleInput {
    pub property_id: Uuid,
    pub room_unit_id: Uuid,
    #[validate(length(min = 1, max = 16))]
    pub plan_type: String,
    #[validate(length(min = 1, max = 16))]
    pub occupancy_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub price: Decimal,
    /// "BASE", "SEASONAL" or "CUSTOM"
    pub pricing_type: String,
}

struct CachedRules {
    fetched_at: Instant,
    rules: Vec<pricing_rule::Model>,
}

pub struct PricingService {
    db: Arc<DatabaseConnection>,
    cache: DashMap<Uuid, CachedRules>,
    cache_ttl: Duration,
}

impl PricingService {
    pub fn new(db: Arc<DatabaseConnection>, cache_ttl: Duration) -> Self {
        Self {
            db,
            cache: DashMap::new(),
            cache_ttl,
        }
    }

    /// Resolves the nightly rates for a stay, one entry per night of
    /// `[check_in, check_out)`. Authoritative: always reads the database,
    /// so it can run inside the booking transaction.
    #[instrument(skip(self, db, property))]
    pub async fn resolve_range<C: ConnectionTrait>(
        &self,
        db: &C,
        property: &property::Model,
        room_unit_id: Uuid,
        plan_type: &str,
        occupancy_type: &str,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<Vec<(NaiveDate, Decimal)>, ServiceError> {
        let rules = PricingRuleEntity::find()
            .filter(pricing_rule::Column::RoomUnitId.eq(room_unit_id))
            .filter(pricing_rule::Column::Active.eq(true))
            .filter(pricing_rule::Column::StartDate.lt(check_out))
            .filter(pricing_rule::Column::EndDate.gte(check_in))
            .all(db)
            .await?;

        Ok(resolve_nights(
            &rules,
            property.base_price,
            plan_type,
            occupancy_type,
            check_in,
            check_out,
        ))
    }

    /// Cache-backed variant used for outward rate pushes. May lag rule
    /// writes by up to the cache TTL; never used for booking totals.
    pub async fn quote_range(
        &self,
        property: &property::Model,
        room_unit_id: Uuid,
        plan_type: &str,
        occupancy_type: &str,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<Vec<(NaiveDate, Decimal)>, ServiceError> {
        let rules = self.rules_for_property(property.id).await?;
        let unit_rules: Vec<pricing_rule::Model> = rules
            .into_iter()
            .filter(|r| r.room_unit_id == room_unit_id)
            .collect();

        Ok(resolve_nights(
            &unit_rules,
            property.base_price,
            plan_type,
            occupancy_type,
            check_in,
            check_out,
        ))
    }

    async fn rules_for_property(
        &self,
        property_id: Uuid,
    ) -> Result<Vec<pricing_rule::Model>, ServiceError> {
        if let Some(cached) = self.cache.get(&property_id) {
            if cached.fetched_at.elapsed() < self.cache_ttl {
                debug!(property_id = %property_id, "Pricing rules served from cache");
                return Ok(cached.rules.clone());
            }
        }

        let db = &*self.db;
        let rules = PricingRuleEntity::find()
            .filter(pricing_rule::Column::PropertyId.eq(property_id))
            .filter(pricing_rule::Column::Active.eq(true))
            .all(db)
            .await?;

        self.cache.insert(
            property_id,
            CachedRules {
                fetched_at: Instant::now(),
                rules: rules.clone(),
            },
        );
        Ok(rules)
    }

    #[instrument(skip(self, input), fields(property_id = %input.property_id))]
    pub async fn create_rule(
        &self,
        input: CreatePricingRuleInput,
    ) -> Result<pricing_rule::Model, ServiceError> {
        input
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        if input.start_date > input.end_date {
            return Err(ServiceError::ValidationError(
                "start_date must not be after end_date".to_string(),
            ));
        }
        if input.price <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "price must be positive".to_string(),
            ));
        }
        let pricing_type = PricingType::from_str(&input.pricing_type).ok_or_else(|| {
            ServiceError::ValidationError(format!(
                "unknown pricing_type '{}'",
                input.pricing_type
            ))
        })?;

        let db = &*self.db;
        let model = pricing_rule::ActiveModel {
            id: Set(Uuid::new_v4()),
            property_id: Set(input.property_id),
            room_unit_id: Set(input.room_unit_id),
            plan_type: Set(input.plan_type),
            occupancy_type: Set(input.occupancy_type),
            start_date: Set(input.start_date),
            end_date: Set(input.end_date),
            price: Set(input.price),
            pricing_type: Set(pricing_type.as_str().to_string()),
            active: Set(true),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(db)
        .await?;

        self.cache.remove(&input.property_id);
        info!(rule_id = %model.id, pricing_type = %model.pricing_type, "Pricing rule created");
        Ok(model)
    }

    /// Soft-disables a rule; resolution ignores inactive rules immediately.
    pub async fn deactivate_rule(&self, rule_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db;
        let rule = PricingRuleEntity::find_by_id(rule_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Pricing rule {} not found", rule_id)))?;

        let property_id = rule.property_id;
        let mut active: pricing_rule::ActiveModel = rule.into();
        active.active = Set(false);
        active.updated_at = Set(Some(Utc::now()));
        active.update(db).await?;

        self.cache.remove(&property_id);
        Ok(())
    }
}

/// Picks the winning rate for every night of `[check_in, check_out)`.
///
/// Ordering is deterministic: precedence tier first, then the narrower
/// window, then the most recently created rule, then rule id.
fn resolve_nights(
    rules: &[pricing_rule::Model],
    base_price: Decimal,
    plan_type: &str,
    occupancy_type: &str,
    check_in: NaiveDate,
    check_out: NaiveDate,
) -> Vec<(NaiveDate, Decimal)> {
    let mut nights = Vec::new();
    let mut night = check_in;
    while night < check_out {
        let rate = rules
            .iter()
            .filter(|r| {
                r.active
                    && r.plan_type == plan_type
                    && r.occupancy_type == occupancy_type
                    && r.start_date <= night
                    && r.end_date >= night
            })
            .max_by_key(|r| rule_rank(r))
            .map(|r| r.price)
            .unwrap_or(base_price);
        nights.push((night, rate));
        night = night.succ_opt().unwrap_or(check_out);
    }
    nights
}

fn rule_rank(rule: &pricing_rule::Model) -> (u8, i64, DateTime<Utc>, Uuid) {
    let precedence = PricingType::from_str(&rule.pricing_type)
        .map(|t| t.precedence())
        .unwrap_or(0);
    let span = (rule.end_date - rule.start_date).num_days();
    // narrower window ranks higher
    (precedence, -span, rule.created_at, rule.id)
}
