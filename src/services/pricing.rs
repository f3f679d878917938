use crate::{
    entities::{
        coupon::CouponType, product_discount, ProductDiscount, ProductDiscountModel, Ward,
        WardModel,
    },
    errors::ServiceError,
    external::shipping::{QuoteRequest, ShippingCarrier},
    services::cart::ShopGroup,
    services::coupons::{self, CouponService},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

/// Price breakdown for one shop group. Produced identically by the preview
/// endpoint (read-only) and the checkout commit.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PriceBreakdown {
    pub shop_id: Uuid,
    pub items: Vec<PricedItem>,
    pub subtotal: Decimal,
    pub shipping_fee: Decimal,
    pub product_discount_amount: Decimal,
    pub shipping_discount_amount: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PricedItem {
    pub product_id: Uuid,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

/// Per-shop-group price calculator: discounted subtotal, carrier quote,
/// coupon validation, floored total.
#[derive(Clone)]
pub struct PricingService {
    carrier: Arc<dyn ShippingCarrier>,
    coupons: Arc<CouponService>,
}

impl PricingService {
    pub fn new(carrier: Arc<dyn ShippingCarrier>, coupons: Arc<CouponService>) -> Self {
        Self { carrier, coupons }
    }

    /// Prices one shop group against a destination ward and optional coupon
    /// codes. Coupons are validated here; any failure aborts the whole
    /// pricing (and, on the commit path, the whole checkout).
    #[instrument(skip(self, conn, group), fields(shop_id = %group.shop_id))]
    pub async fn price_group<C: ConnectionTrait>(
        &self,
        conn: &C,
        group: &ShopGroup,
        ward_id: Uuid,
        product_coupon_code: Option<&str>,
        shipping_coupon_code: Option<&str>,
        buyer_id: Uuid,
    ) -> Result<PriceBreakdown, ServiceError> {
        let ward = self.resolve_ward(conn, ward_id).await?;
        let now = Utc::now();

        let product_ids: Vec<Uuid> = group.items.iter().map(|i| i.product.id).collect();
        let discounts = ProductDiscount::find()
            .filter(product_discount::Column::ProductId.is_in(product_ids))
            .all(conn)
            .await?;

        let mut items = Vec::with_capacity(group.items.len());
        let mut subtotal = Decimal::ZERO;
        for item in &group.items {
            let unit_price = unit_price_at(&item.product.regular_price, &discounts, item.product.id, now);
            let line_total = unit_price * Decimal::from(item.quantity);
            subtotal += line_total;
            items.push(PricedItem {
                product_id: item.product.id,
                product_name: item.product.name.clone(),
                unit_price,
                quantity: item.quantity,
                line_total,
            });
        }

        let quote = self
            .carrier
            .preview_shipping(&quote_request(group, &ward))
            .await?;
        let shipping_fee = quote.fee;

        let category_ids = group.category_ids();
        let product_discount_amount = match product_coupon_code {
            Some(code) => {
                let coupon = self
                    .coupons
                    .validate(conn, code, CouponType::Product, subtotal, &category_ids, buyer_id)
                    .await?;
                coupons::discount_amount(&coupon, subtotal)
            }
            None => Decimal::ZERO,
        };
        let shipping_discount_amount = match shipping_coupon_code {
            Some(code) => {
                let coupon = self
                    .coupons
                    .validate(
                        conn,
                        code,
                        CouponType::Shipping,
                        shipping_fee,
                        &category_ids,
                        buyer_id,
                    )
                    .await?;
                coupons::discount_amount(&coupon, shipping_fee)
            }
            None => Decimal::ZERO,
        };

        let total = (subtotal + shipping_fee - product_discount_amount - shipping_discount_amount)
            .max(Decimal::ZERO);

        Ok(PriceBreakdown {
            shop_id: group.shop_id,
            items,
            subtotal,
            shipping_fee,
            product_discount_amount,
            shipping_discount_amount,
            total,
        })
    }

    pub async fn resolve_ward<C: ConnectionTrait>(
        &self,
        conn: &C,
        ward_id: Uuid,
    ) -> Result<WardModel, ServiceError> {
        Ward::find_by_id(ward_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Ward {} not found", ward_id)))
    }
}

/// Effective unit price: the discounted price when an active window covers
/// `at`, otherwise the regular price.
fn unit_price_at(
    regular_price: &Decimal,
    discounts: &[ProductDiscountModel],
    product_id: Uuid,
    at: DateTime<Utc>,
) -> Decimal {
    discounts
        .iter()
        .find(|d| d.product_id == product_id && d.covers(at))
        .map(|d| d.discount_price)
        .unwrap_or(*regular_price)
}

/// Aggregates the group's package: total weight, footprint of the largest
/// item, stacked height.
fn quote_request(group: &ShopGroup, ward: &WardModel) -> QuoteRequest {
    let mut weight_grams = 0;
    let mut length_cm = 0;
    let mut width_cm = 0;
    let mut height_cm = 0;
    for item in &group.items {
        weight_grams += item.product.weight_grams * item.quantity;
        length_cm = length_cm.max(item.product.length_cm);
        width_cm = width_cm.max(item.product.width_cm);
        height_cm += item.product.height_cm * item.quantity;
    }
    QuoteRequest {
        to_ward_code: ward.carrier_ward_code.clone(),
        to_district_id: ward.carrier_district_id,
        weight_grams,
        length_cm,
        width_cm,
        height_cm,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn discount(product_id: Uuid, price: Decimal, from_hours: i64, to_hours: i64) -> ProductDiscountModel {
        ProductDiscountModel {
            id: Uuid::new_v4(),
            product_id,
            discount_price: price,
            start_time: Utc::now() + Duration::hours(from_hours),
            end_time: Utc::now() + Duration::hours(to_hours),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn active_window_price_wins() {
        let product_id = Uuid::new_v4();
        let discounts = vec![discount(product_id, dec!(80), -1, 1)];
        assert_eq!(
            unit_price_at(&dec!(100), &discounts, product_id, Utc::now()),
            dec!(80)
        );
    }

    #[test]
    fn expired_window_falls_back_to_regular_price() {
        let product_id = Uuid::new_v4();
        let discounts = vec![discount(product_id, dec!(80), -48, -24)];
        assert_eq!(
            unit_price_at(&dec!(100), &discounts, product_id, Utc::now()),
            dec!(100)
        );
    }

    #[test]
    fn other_products_windows_are_ignored() {
        let product_id = Uuid::new_v4();
        let discounts = vec![discount(Uuid::new_v4(), dec!(1), -1, 1)];
        assert_eq!(
            unit_price_at(&dec!(100), &discounts, product_id, Utc::now()),
            dec!(100)
        );
    }

    #[test]
    fn total_never_goes_below_zero() {
        let subtotal = dec!(10);
        let shipping = dec!(5);
        let product_discount = dec!(10);
        let shipping_discount = dec!(20);
        let total =
            (subtotal + shipping - product_discount - shipping_discount).max(Decimal::ZERO);
        assert_eq!(total, Decimal::ZERO);
    }
}
