use crate::{
    entities::{
        product_discount, Product, ProductDiscount, ProductDiscountModel,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// A discount window as a closed `[start, end]` interval.
pub type Window = (DateTime<Utc>, DateTime<Utc>);

/// Closed-interval overlap test between two discount windows.
///
/// `[s1,e1]` conflicts with `[s2,e2]` when either endpoint of one interval
/// falls inside the other, or one fully contains the other.
pub fn windows_overlap(a: Window, b: Window) -> bool {
    let (s1, e1) = a;
    let (s2, e2) = b;
    (s1 <= s2 && s2 <= e1) || (s1 <= e2 && e2 <= e1) || (s2 <= s1 && e2 >= e1)
}

/// Product discount-window management.
#[derive(Clone)]
pub struct DiscountService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl DiscountService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Adds a discount window to a product.
    #[instrument(skip(self, input))]
    pub async fn add_discount(
        &self,
        input: DiscountWindowInput,
    ) -> Result<ProductDiscountModel, ServiceError> {
        self.check_window(&input, None).await?;

        let discount = product_discount::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(input.product_id),
            discount_price: Set(input.discount_price),
            start_time: Set(input.start_time),
            end_time: Set(input.end_time),
            created_at: Set(Utc::now()),
        };
        let discount = discount.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::ProductDiscountAdded {
                product_id: discount.product_id,
                discount_id: discount.id,
            })
            .await;

        info!(
            "Added discount window {} on product {}",
            discount.id, discount.product_id
        );
        Ok(discount)
    }

    /// Replaces the price and window of an existing discount. The edited row
    /// is excluded from the overlap check against its own previous window.
    #[instrument(skip(self, input))]
    pub async fn update_discount(
        &self,
        discount_id: Uuid,
        input: DiscountWindowInput,
    ) -> Result<ProductDiscountModel, ServiceError> {
        let existing = ProductDiscount::find_by_id(discount_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product discount {} not found", discount_id))
            })?;

        if existing.product_id != input.product_id {
            return Err(ServiceError::ValidationError(
                "Discount cannot be moved to a different product".to_string(),
            ));
        }

        self.check_window(&input, Some(discount_id)).await?;

        let mut active: product_discount::ActiveModel = existing.into();
        active.discount_price = Set(input.discount_price);
        active.start_time = Set(input.start_time);
        active.end_time = Set(input.end_time);
        Ok(active.update(&*self.db).await?)
    }

    pub async fn list_for_product(
        &self,
        product_id: Uuid,
    ) -> Result<Vec<ProductDiscountModel>, ServiceError> {
        Ok(ProductDiscount::find()
            .filter(product_discount::Column::ProductId.eq(product_id))
            .all(&*self.db)
            .await?)
    }

    /// Validates price and window shape, then checks for overlap against the
    /// product's other windows.
    async fn check_window(
        &self,
        input: &DiscountWindowInput,
        excluding: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        if input.start_time >= input.end_time {
            return Err(ServiceError::ValidationError(
                "Discount start time must be before its end time".to_string(),
            ));
        }

        let product = Product::find_by_id(input.product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", input.product_id))
            })?;

        if input.discount_price <= Decimal::ZERO
            || input.discount_price >= product.regular_price
        {
            return Err(ServiceError::ValidationError(format!(
                "Discount price must be positive and lower than the regular price {}",
                product.regular_price
            )));
        }

        let windows = ProductDiscount::find()
            .filter(product_discount::Column::ProductId.eq(input.product_id))
            .all(&*self.db)
            .await?;

        let candidate = (input.start_time, input.end_time);
        let conflict = windows
            .iter()
            .filter(|w| Some(w.id) != excluding)
            .any(|w| windows_overlap((w.start_time, w.end_time), candidate));
        if conflict {
            return Err(ServiceError::ValidationError(
                "Discount window overlaps an existing window on this product".to_string(),
            ));
        }

        Ok(())
    }
}

/// Input for adding or editing a discount window
#[derive(Debug, Clone)]
pub struct DiscountWindowInput {
    pub product_id: Uuid,
    pub discount_price: Decimal,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}
