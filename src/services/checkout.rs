use crate::{
    entities::{
        cart_item, order_product, sales_order,
        sales_order::{OrderStatus, PaymentMethod},
        CartItem, SalesOrderModel,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    external::payment::PaymentGateway,
    services::{cart::CartService, pricing::PriceBreakdown, pricing::PricingService, coupons::CouponService},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Checkout orchestrator.
///
/// The preview path prices every shop group without writing anything; the
/// commit path persists one sales order per shop group, redeems coupons,
/// and clears the checked-out cart rows, all inside a single transaction.
/// Any group failure aborts the whole submission.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    cart: Arc<CartService>,
    pricing: Arc<PricingService>,
    coupons: Arc<CouponService>,
    gateway: Arc<dyn PaymentGateway>,
    event_sender: Arc<EventSender>,
}

/// Shared checkout parameters.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub selected_product_ids: Vec<Uuid>,
    pub ward_id: Uuid,
    pub receiver_name: String,
    pub receiver_phone: String,
    pub receiver_address: String,
    pub payment_method: PaymentMethod,
    pub product_coupon_code: Option<String>,
    pub shipping_coupon_code: Option<String>,
}

/// Result of a committed checkout: the created orders plus, for gateway
/// payments, the redirect URL for the combined total.
#[derive(Debug, Serialize)]
pub struct CheckoutOutcome {
    pub orders: Vec<SalesOrderModel>,
    pub payment_url: Option<String>,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        cart: Arc<CartService>,
        pricing: Arc<PricingService>,
        coupons: Arc<CouponService>,
        gateway: Arc<dyn PaymentGateway>,
        event_sender: Arc<EventSender>,
    ) -> Self {
        Self {
            db,
            cart,
            pricing,
            coupons,
            gateway,
            event_sender,
        }
    }

    /// Read-only price preview: one breakdown per shop group. Never mutates
    /// coupon usage counts or cart state.
    #[instrument(skip(self, request))]
    pub async fn preview(
        &self,
        buyer_id: Uuid,
        request: &CheckoutRequest,
    ) -> Result<Vec<PriceBreakdown>, ServiceError> {
        let groups = self
            .cart
            .group_by_shop(&*self.db, buyer_id, &request.selected_product_ids)
            .await?;

        let mut breakdowns = Vec::with_capacity(groups.len());
        for group in &groups {
            breakdowns.push(
                self.pricing
                    .price_group(
                        &*self.db,
                        group,
                        request.ward_id,
                        request.product_coupon_code.as_deref(),
                        request.shipping_coupon_code.as_deref(),
                        buyer_id,
                    )
                    .await?,
            );
        }
        Ok(breakdowns)
    }

    /// Commits the checkout: creates one order per shop group with its line
    /// snapshots, redeems consumed coupons, and deletes the checked-out cart
    /// rows, atomically. For gateway payments the combined total is turned
    /// into a redirect URL after the transaction commits.
    #[instrument(skip(self, request))]
    pub async fn checkout(
        &self,
        buyer_id: Uuid,
        request: &CheckoutRequest,
    ) -> Result<CheckoutOutcome, ServiceError> {
        let txn = self.db.begin().await?;

        let groups = self
            .cart
            .group_by_shop(&txn, buyer_id, &request.selected_product_ids)
            .await?;

        let initial_status = match request.payment_method {
            PaymentMethod::Vnpay => OrderStatus::PendingPayment,
            PaymentMethod::Cod => OrderStatus::PendingConfirmation,
        };

        let mut orders = Vec::with_capacity(groups.len());
        for group in &groups {
            let breakdown = self
                .pricing
                .price_group(
                    &txn,
                    group,
                    request.ward_id,
                    request.product_coupon_code.as_deref(),
                    request.shipping_coupon_code.as_deref(),
                    buyer_id,
                )
                .await?;

            let order_id = Uuid::new_v4();
            let now = Utc::now();
            let order = sales_order::ActiveModel {
                id: Set(order_id),
                user_id: Set(buyer_id),
                shop_id: Set(group.shop_id),
                subtotal: Set(breakdown.subtotal),
                shipping_fee: Set(breakdown.shipping_fee),
                product_discount_amount: Set(breakdown.product_discount_amount),
                shipping_discount_amount: Set(breakdown.shipping_discount_amount),
                total: Set(breakdown.total),
                product_coupon_code: Set(request
                    .product_coupon_code
                    .as_ref()
                    .filter(|_| breakdown.product_discount_amount > Decimal::ZERO)
                    .cloned()),
                shipping_coupon_code: Set(request
                    .shipping_coupon_code
                    .as_ref()
                    .filter(|_| breakdown.shipping_discount_amount > Decimal::ZERO)
                    .cloned()),
                payment_method: Set(request.payment_method),
                status: Set(initial_status),
                shipping_order_code: Set(None),
                payment_id: Set(None),
                ward_id: Set(request.ward_id),
                receiver_name: Set(request.receiver_name.clone()),
                receiver_phone: Set(request.receiver_phone.clone()),
                receiver_address: Set(request.receiver_address.clone()),
                created_at: Set(now),
                updated_at: Set(now),
            };
            let order = order.insert(&txn).await?;

            for item in &breakdown.items {
                order_product::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    order_id: Set(order_id),
                    product_id: Set(item.product_id),
                    product_name: Set(item.product_name.clone()),
                    unit_price: Set(item.unit_price),
                    quantity: Set(item.quantity),
                    line_total: Set(item.line_total),
                    created_at: Set(now),
                }
                .insert(&txn)
                .await?;
            }

            // Each order that consumed a coupon accounts for one use
            if let Some(code) = order.product_coupon_code.as_deref() {
                self.coupons.redeem(&txn, code).await?;
            }
            if let Some(code) = order.shipping_coupon_code.as_deref() {
                self.coupons.redeem(&txn, code).await?;
            }

            orders.push(order);
        }

        CartItem::delete_many()
            .filter(cart_item::Column::UserId.eq(buyer_id))
            .filter(
                cart_item::Column::ProductId.is_in(request.selected_product_ids.clone()),
            )
            .exec(&txn)
            .await?;

        txn.commit().await?;

        let combined_total: Decimal = orders.iter().map(|o| o.total).sum();
        let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();

        let payment_url = match request.payment_method {
            PaymentMethod::Vnpay => Some(
                self.gateway
                    .create_payment_url(combined_total, &payment_description(&order_ids))?,
            ),
            PaymentMethod::Cod => None,
        };

        for order in &orders {
            if let Some(code) = order.product_coupon_code.as_deref() {
                self.event_sender
                    .send_or_log(Event::CouponRedeemed {
                        code: code.to_string(),
                        order_id: order.id,
                    })
                    .await;
            }
            if let Some(code) = order.shipping_coupon_code.as_deref() {
                self.event_sender
                    .send_or_log(Event::CouponRedeemed {
                        code: code.to_string(),
                        order_id: order.id,
                    })
                    .await;
            }
        }
        self.event_sender
            .send_or_log(Event::CheckoutCompleted {
                user_id: buyer_id,
                order_ids: order_ids.clone(),
                total: combined_total,
            })
            .await;

        info!(
            "Checkout by {} created {} order(s), combined total {}",
            buyer_id,
            orders.len(),
            combined_total
        );
        Ok(CheckoutOutcome {
            orders,
            payment_url,
        })
    }
}

/// Gateway order description carrying the created order ids, parsed back out
/// when the payment result is reconciled.
pub fn payment_description(order_ids: &[Uuid]) -> String {
    let ids: Vec<String> = order_ids.iter().map(|id| id.to_string()).collect();
    format!("orders:{}", ids.join(","))
}

/// Inverse of [`payment_description`].
pub fn parse_payment_description(description: &str) -> Vec<Uuid> {
    description
        .strip_prefix("orders:")
        .map(|ids| {
            ids.split(',')
                .filter_map(|id| Uuid::parse_str(id.trim()).ok())
                .collect()
        })
        .unwrap_or_default()
}
