use crate::{
    entities::{
        coupon::{self, CouponType, DiscountType},
        coupon_category, sales_order,
        sales_order::OrderStatus,
        Coupon, CouponCategory, CouponModel, SalesOrder,
    },
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait,
    DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Coupon validation and redemption.
///
/// Validation applies the rules in a fixed order; the first failure is
/// terminal. Redemption runs inside the caller's checkout transaction as a
/// single guarded increment, so concurrent checkouts cannot push a limited
/// coupon past its cap.
#[derive(Clone)]
pub struct CouponService {
    db: Arc<DatabaseConnection>,
}

impl CouponService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Validates a coupon for one shop group and returns the coupon row.
    ///
    /// `subtotal` is the base the coupon would discount (item subtotal for
    /// product coupons, shipping fee for shipping coupons);  `category_ids`
    /// are the categories of the group's products.
    #[instrument(skip(self, conn, category_ids))]
    pub async fn validate<C: ConnectionTrait>(
        &self,
        conn: &C,
        code: &str,
        usage: CouponType,
        subtotal: Decimal,
        category_ids: &[Uuid],
        buyer_id: Uuid,
    ) -> Result<CouponModel, ServiceError> {
        let now = Utc::now();

        let coupon = Coupon::find_by_id(code.to_string())
            .one(conn)
            .await?
            .filter(|c| c.active && c.coupon_type == usage)
            .filter(|c| c.start_time <= now && now <= c.end_time)
            .ok_or_else(|| {
                ServiceError::ValidationError(format!("Coupon {} is invalid or expired", code))
            })?;

        let already_used = if coupon.allow_multiple_use {
            false
        } else {
            self.buyer_has_used(conn, code, buyer_id).await?
        };

        let restrictions: Vec<Uuid> = CouponCategory::find()
            .filter(coupon_category::Column::CouponCode.eq(code))
            .all(conn)
            .await?
            .into_iter()
            .map(|row| row.category_id)
            .collect();

        check_rules(&coupon, subtotal, category_ids, &restrictions, already_used)?;
        Ok(coupon)
    }

    /// Whether the buyer has a non-cancelled historical order that consumed
    /// this code.
    async fn buyer_has_used<C: ConnectionTrait>(
        &self,
        conn: &C,
        code: &str,
        buyer_id: Uuid,
    ) -> Result<bool, ServiceError> {
        let used = SalesOrder::find()
            .filter(sales_order::Column::UserId.eq(buyer_id))
            .filter(sales_order::Column::Status.ne(OrderStatus::Cancelled))
            .filter(
                sales_order::Column::ProductCouponCode
                    .eq(code)
                    .or(sales_order::Column::ShippingCouponCode.eq(code)),
            )
            .one(conn)
            .await?;
        Ok(used.is_some())
    }

    /// Consumes one use of the coupon inside the caller's transaction.
    ///
    /// The cap check and the increment are one `UPDATE ... WHERE used_count <
    /// max_use_count` statement, so two concurrent checkouts cannot both read
    /// the same counter and overwrite each other past the cap. Zero rows
    /// affected means the coupon is missing or exhausted.
    pub async fn redeem<C: ConnectionTrait>(
        &self,
        txn: &C,
        code: &str,
    ) -> Result<(), ServiceError> {
        let result = Coupon::update_many()
            .col_expr(
                coupon::Column::UsedCount,
                Expr::col(coupon::Column::UsedCount).add(1),
            )
            .col_expr(coupon::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(coupon::Column::Code.eq(code))
            .filter(
                Condition::any()
                    .add(coupon::Column::MaxUseCount.eq(0))
                    .add(
                        Expr::col(coupon::Column::UsedCount)
                            .lt(Expr::col(coupon::Column::MaxUseCount)),
                    ),
            )
            .exec(txn)
            .await?;

        if result.rows_affected == 0 {
            Coupon::find_by_id(code.to_string())
                .one(txn)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("Coupon {} not found", code)))?;
            return Err(ServiceError::Conflict(format!(
                "Coupon {} has reached its usage limit",
                code
            )));
        }
        Ok(())
    }

    /// Creates a coupon with its category restriction rows.
    #[instrument(skip(self, input))]
    pub async fn create_coupon(
        &self,
        input: CreateCouponInput,
    ) -> Result<CouponModel, ServiceError> {
        validate_coupon_input(&input)?;

        let now = Utc::now();
        let coupon = coupon::ActiveModel {
            code: Set(input.code.clone()),
            coupon_type: Set(input.coupon_type),
            discount_type: Set(input.discount_type),
            value: Set(input.value),
            min_order_value: Set(input.min_order_value),
            max_discount_amount: Set(input.max_discount_amount),
            allow_multiple_use: Set(input.allow_multiple_use),
            max_use_count: Set(input.max_use_count),
            used_count: Set(0),
            active: Set(true),
            start_time: Set(input.start_time),
            end_time: Set(input.end_time),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let coupon = coupon.insert(&*self.db).await?;

        for category_id in input.category_ids {
            coupon_category::ActiveModel {
                coupon_code: Set(coupon.code.clone()),
                category_id: Set(category_id),
            }
            .insert(&*self.db)
            .await?;
        }

        info!("Created coupon {}", coupon.code);
        Ok(coupon)
    }

    pub async fn get_coupon(&self, code: &str) -> Result<CouponModel, ServiceError> {
        Coupon::find_by_id(code.to_string())
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Coupon {} not found", code)))
    }

    pub async fn list_coupons(&self) -> Result<Vec<CouponModel>, ServiceError> {
        Ok(Coupon::find().all(&*self.db).await?)
    }
}

/// Input for creating a coupon
#[derive(Debug)]
pub struct CreateCouponInput {
    pub code: String,
    pub coupon_type: CouponType,
    pub discount_type: DiscountType,
    pub value: Decimal,
    pub min_order_value: Decimal,
    pub max_discount_amount: Decimal,
    pub allow_multiple_use: bool,
    pub max_use_count: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub category_ids: Vec<Uuid>,
}

fn validate_coupon_input(input: &CreateCouponInput) -> Result<(), ServiceError> {
    if input.code.trim().is_empty() {
        return Err(ServiceError::ValidationError(
            "Coupon code must not be empty".to_string(),
        ));
    }
    if input.value <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "Coupon value must be positive".to_string(),
        ));
    }
    if input.discount_type == DiscountType::Percent && input.value > Decimal::from(100) {
        return Err(ServiceError::ValidationError(
            "Percent coupon value must not exceed 100".to_string(),
        ));
    }
    if input.start_time >= input.end_time {
        return Err(ServiceError::ValidationError(
            "Coupon start time must be before its end time".to_string(),
        ));
    }
    if input.min_order_value < Decimal::ZERO || input.max_discount_amount < Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "Coupon thresholds must not be negative".to_string(),
        ));
    }
    Ok(())
}

/// Ordered rule check, separated from I/O so it is unit-testable.
///
/// Rule order: validity (checked by the caller's query), prior use, usage
/// limit, minimum subtotal, category restriction.
fn check_rules(
    coupon: &CouponModel,
    subtotal: Decimal,
    category_ids: &[Uuid],
    restrictions: &[Uuid],
    already_used: bool,
) -> Result<(), ServiceError> {
    if already_used {
        return Err(ServiceError::Conflict(format!(
            "Coupon {} has already been used",
            coupon.code
        )));
    }
    if coupon.max_use_count > 0 && coupon.used_count >= coupon.max_use_count {
        return Err(ServiceError::Conflict(format!(
            "Coupon {} has reached its usage limit",
            coupon.code
        )));
    }
    if subtotal < coupon.min_order_value {
        return Err(ServiceError::ValidationError(format!(
            "Order subtotal must be at least {} to use coupon {}",
            coupon.min_order_value, coupon.code
        )));
    }
    if !restrictions.is_empty()
        && !category_ids.iter().any(|id| restrictions.contains(id))
    {
        return Err(ServiceError::ValidationError(format!(
            "Coupon {} does not apply to the selected products",
            coupon.code
        )));
    }
    Ok(())
}

/// Discount produced by a coupon against a base amount.
///
/// Percent discounts are capped by `max_discount_amount` when the cap is
/// positive; fixed-amount discounts never exceed the base.
pub fn discount_amount(coupon: &CouponModel, base: Decimal) -> Decimal {
    match coupon.discount_type {
        DiscountType::Percent => {
            let raw = base * coupon.value / Decimal::from(100);
            if coupon.max_discount_amount > Decimal::ZERO {
                raw.min(coupon.max_discount_amount)
            } else {
                raw
            }
        }
        DiscountType::Amount => coupon.value.min(base),
    }
}
