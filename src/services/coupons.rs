//! Coupon validation and atomic redemption.
//!
//! Validation is advisory; the limits are enforced at apply time with
//! conditional increments so concurrent redemptions of a nearly-exhausted
//! coupon cannot overshoot. Apply runs inside the booking transaction:
//! if allocation fails afterwards, the increments roll back with it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, Set,
};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::entities::coupon::{self, DiscountType, Entity as CouponEntity};
use crate::entities::coupon_usage::{self, Entity as CouponUsageEntity};
use crate::entities::coupon_user_usage::{self, Entity as CouponUserUsageEntity};
use crate::errors::{on_unique_violation, ServiceError};

#[derive(Debug, Clone, serde::Deserialize, Validate, utoipa::ToSchema)]
pub struct CreateCouponInput {
    #[validate(length(min = 3, max = 32))]
    pub code: String,
    /// "percentage" or "fixed"
    pub discount_type: String,
    pub discount_value: Decimal,
    pub max_discount: Option<Decimal>,
    pub min_amount: Option<Decimal>,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub usage_limit: Option<i32>,
    #[validate(range(min = 1))]
    pub user_usage_limit: i32,
    pub property_id: Option<Uuid>,
}

/// Outcome of a successful redemption.
#[derive(Debug, Clone)]
pub struct AppliedCoupon {
    pub coupon_id: Uuid,
    pub discount: Decimal,
    pub final_amount: Decimal,
}

#[derive(Clone)]
pub struct CouponService {
    db: Arc<DatabaseConnection>,
}

impl CouponService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, input), fields(code = %input.code))]
    pub async fn create_coupon(
        &self,
        input: CreateCouponInput,
    ) -> Result<coupon::Model, ServiceError> {
        input
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        let discount_type = DiscountType::from_str(&input.discount_type).ok_or_else(|| {
            ServiceError::ValidationError(format!(
                "unknown discount_type '{}'",
                input.discount_type
            ))
        })?;
        if input.discount_value <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "discount_value must be positive".to_string(),
            ));
        }
        if discount_type == DiscountType::Percentage && input.discount_value > Decimal::from(100) {
            return Err(ServiceError::ValidationError(
                "percentage discount cannot exceed 100".to_string(),
            ));
        }
        if input.valid_from >= input.valid_to {
            return Err(ServiceError::ValidationError(
                "valid_from must precede valid_to".to_string(),
            ));
        }

        let db = &*self.db;
        let model = coupon::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(input.code.to_uppercase()),
            discount_type: Set(discount_type.as_str().to_string()),
            discount_value: Set(input.discount_value),
            max_discount: Set(input.max_discount),
            min_amount: Set(input.min_amount),
            valid_from: Set(input.valid_from),
            valid_to: Set(input.valid_to),
            usage_limit: Set(input.usage_limit),
            user_usage_limit: Set(input.user_usage_limit),
            used_count: Set(0),
            property_id: Set(input.property_id),
            active: Set(true),
            created_at: Set(Utc::now()),
        }
        .insert(db)
        .await
        .map_err(|e| {
            on_unique_violation(e, || {
                ServiceError::Conflict("coupon code already exists".to_string())
            })
        })?;

        info!(coupon_id = %model.id, "Coupon created");
        Ok(model)
    }

    /// Validates a coupon against an order without consuming a use.
    /// The checks here are advisory; `apply` re-enforces the limits
    /// atomically.
    #[instrument(skip(self, db))]
    pub async fn validate<C: ConnectionTrait>(
        &self,
        db: &C,
        code: &str,
        amount: Decimal,
        user_id: &str,
        property_id: Uuid,
    ) -> Result<(coupon::Model, Decimal), ServiceError> {
        let coupon = CouponEntity::find()
            .filter(coupon::Column::Code.eq(code.to_uppercase()))
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::CouponRejected(format!("unknown coupon '{}'", code)))?;

        if !coupon.active {
            return Err(ServiceError::CouponRejected("coupon is inactive".to_string()));
        }
        let now = Utc::now();
        if now < coupon.valid_from || now > coupon.valid_to {
            return Err(ServiceError::CouponRejected(
                "coupon is outside its validity window".to_string(),
            ));
        }
        if let Some(scope) = coupon.property_id {
            if scope != property_id {
                return Err(ServiceError::CouponRejected(
                    "coupon is not valid for this property".to_string(),
                ));
            }
        }
        if let Some(min) = coupon.min_amount {
            if amount < min {
                return Err(ServiceError::CouponRejected(format!(
                    "order total below coupon minimum of {}",
                    min
                )));
            }
        }
        if let Some(limit) = coupon.usage_limit {
            if coupon.used_count >= limit {
                return Err(ServiceError::CouponRejected(
                    "coupon usage limit reached".to_string(),
                ));
            }
        }
        let user_used = CouponUserUsageEntity::find()
            .filter(coupon_user_usage::Column::CouponId.eq(coupon.id))
            .filter(coupon_user_usage::Column::UserId.eq(user_id))
            .one(db)
            .await?
            .map(|u| u.used)
            .unwrap_or(0);
        if user_used >= coupon.user_usage_limit {
            return Err(ServiceError::CouponRejected(
                "per-user usage limit reached".to_string(),
            ));
        }

        let discount = compute_discount(&coupon, amount);
        Ok((coupon, discount))
    }

    /// Consumes one use of the coupon for a booking, atomically.
    ///
    /// Three guards, in order: a conditional global increment (fails if the
    /// cap is hit), an insert-then-conditional-increment on the per-user
    /// counter, and the unique (coupon_id, booking_id) usage row. Any
    /// failure surfaces as `CouponRejected` and rolls back with the
    /// caller's transaction.
    #[instrument(skip(self, db, coupon), fields(coupon_id = %coupon.id, booking_id = %booking_id))]
    pub async fn apply<C: ConnectionTrait>(
        &self,
        db: &C,
        coupon: &coupon::Model,
        booking_id: Uuid,
        user_id: &str,
        amount: Decimal,
    ) -> Result<AppliedCoupon, ServiceError> {
        let discount = compute_discount(coupon, amount);
        let final_amount = amount - discount;

        let limit_guard = Condition::any()
            .add(coupon::Column::UsageLimit.is_null())
            .add(
                Expr::col(coupon::Column::UsedCount)
                    .lt(Expr::col(coupon::Column::UsageLimit)),
            );
        let claimed = CouponEntity::update_many()
            .col_expr(
                coupon::Column::UsedCount,
                Expr::col(coupon::Column::UsedCount).add(1),
            )
            .filter(coupon::Column::Id.eq(coupon.id))
            .filter(coupon::Column::Active.eq(true))
            .filter(limit_guard)
            .exec(db)
            .await?
            .rows_affected;
        if claimed == 0 {
            return Err(ServiceError::CouponRejected(
                "coupon usage limit reached".to_string(),
            ));
        }

        self.claim_user_slot(db, coupon, user_id).await?;

        let usage = coupon_usage::ActiveModel {
            id: Set(Uuid::new_v4()),
            coupon_id: Set(coupon.id),
            booking_id: Set(booking_id),
            user_id: Set(user_id.to_string()),
            original_amount: Set(amount),
            discount_amount: Set(discount),
            final_amount: Set(final_amount),
            created_at: Set(Utc::now()),
        };
        CouponUsageEntity::insert(usage)
            .exec(db)
            .await
            .map_err(|e| {
                on_unique_violation(e, || {
                    ServiceError::CouponRejected(
                        "coupon already applied to this booking".to_string(),
                    )
                })
            })?;

        debug!(discount = %discount, "Coupon applied");
        Ok(AppliedCoupon {
            coupon_id: coupon.id,
            discount,
            final_amount,
        })
    }

    /// First redemption inserts the counter row at 1; later redemptions
    /// increment it only while under the per-user limit.
    async fn claim_user_slot<C: ConnectionTrait>(
        &self,
        db: &C,
        coupon: &coupon::Model,
        user_id: &str,
    ) -> Result<(), ServiceError> {
        let insert = coupon_user_usage::ActiveModel {
            id: Set(Uuid::new_v4()),
            coupon_id: Set(coupon.id),
            user_id: Set(user_id.to_string()),
            used: Set(1),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        };
        match CouponUserUsageEntity::insert(insert).exec(db).await {
            Ok(_) => Ok(()),
            Err(e) => {
                if !matches!(
                    e.sql_err(),
                    Some(sea_orm::SqlErr::UniqueConstraintViolation(_))
                ) {
                    return Err(ServiceError::DatabaseError(e));
                }
                let bumped = CouponUserUsageEntity::update_many()
                    .col_expr(
                        coupon_user_usage::Column::Used,
                        Expr::col(coupon_user_usage::Column::Used).add(1),
                    )
                    .col_expr(
                        coupon_user_usage::Column::UpdatedAt,
                        Expr::value(Some(Utc::now())),
                    )
                    .filter(coupon_user_usage::Column::CouponId.eq(coupon.id))
                    .filter(coupon_user_usage::Column::UserId.eq(user_id))
                    .filter(coupon_user_usage::Column::Used.lt(coupon.user_usage_limit))
                    .exec(db)
                    .await?
                    .rows_affected;
                if bumped == 0 {
                    return Err(ServiceError::CouponRejected(
                        "per-user usage limit reached".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }

    pub async fn get_by_code(&self, code: &str) -> Result<coupon::Model, ServiceError> {
        let db = &*self.db;
        CouponEntity::find()
            .filter(coupon::Column::Code.eq(code.to_uppercase()))
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Coupon '{}' not found", code)))
    }
}

/// Discount for an order total. Percentage discounts honor `max_discount`;
/// fixed discounts never exceed the order total.
pub fn compute_discount(coupon: &coupon::Model, amount: Decimal) -> Decimal {
    match DiscountType::from_str(&coupon.discount_type) {
        Some(DiscountType::Percentage) => {
            let raw = amount * coupon.discount_value / Decimal::from(100);
            let capped = match coupon.max_discount {
                Some(cap) => raw.min(cap),
                None => raw,
            };
            capped.min(amount).round_dp(2)
        }
        Some(DiscountType::Fixed) => coupon.discount_value.min(amount).round_dp(2),
        None => Decimal::ZERO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn coupon(discount_type: DiscountType, value: Decimal, max: Option<Decimal>) -> coupon::Model {
        coupon::Model {
            id: Uuid::new_v4(),
            code: "SAVE".to_string(),
            discount_type: discount_type.as_str().to_string(),
            discount_value: value,
            max_discount: max,
            min_amount: None,
            valid_from: Utc::now(),
            valid_to: Utc::now(),
            usage_limit: None,
            user_usage_limit: 1,
            used_count: 0,
            property_id: None,
            active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn percentage_discount_capped() {
        let c = coupon(DiscountType::Percentage, dec!(20), Some(dec!(50)));
        assert_eq!(compute_discount(&c, dec!(100)), dec!(20));
        assert_eq!(compute_discount(&c, dec!(1000)), dec!(50));
    }

    #[test]
    fn fixed_discount_never_exceeds_total() {
        let c = coupon(DiscountType::Fixed, dec!(80), None);
        assert_eq!(compute_discount(&c, dec!(100)), dec!(80));
        assert_eq!(compute_discount(&c, dec!(60)), dec!(60));
    }
}
