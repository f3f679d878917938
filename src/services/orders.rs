use crate::{
    entities::{
        order_product, product, sales_order,
        sales_order::{OrderStatus, PaymentMethod},
        OrderProduct, OrderProductModel, Product, SalesOrder, SalesOrderModel, Ward,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    external::shipping::{self, BookingRequest, ShipmentItem, ShippingCarrier},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Actions that drive the order state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderAction {
    /// Shop accepts the order and books the shipment.
    Confirm,
    /// Buyer or shop cancels before a shipment exists.
    Cancel,
    /// Gateway reported a successful payment.
    PaymentSucceeded,
    /// Carrier delivered the shipment.
    MarkDelivered,
}

/// Explicit transition table: `state x action -> next state`.
///
/// Every handler goes through this one function, so illegal transitions are
/// rejected uniformly instead of being re-checked ad hoc.
pub fn next_status(status: OrderStatus, action: OrderAction) -> Result<OrderStatus, ServiceError> {
    use OrderAction::*;
    use OrderStatus::*;

    match (status, action) {
        (PendingPayment, PaymentSucceeded) => Ok(PendingConfirmation),
        (PendingPayment, Cancel) | (PendingConfirmation, Cancel) => Ok(Cancelled),
        (PendingConfirmation, Confirm) => Ok(Tracking),
        (Tracking, MarkDelivered) => Ok(Delivered),
        (_, Confirm) => Err(ServiceError::InvalidStatus(
            "Sales order is not in pending confirmation status".to_string(),
        )),
        (_, Cancel) => Err(ServiceError::InvalidStatus(
            "Sales order is not in pending confirmation or pending payment status".to_string(),
        )),
        (_, PaymentSucceeded) => Err(ServiceError::InvalidStatus(
            "Sales order is not awaiting payment".to_string(),
        )),
        (_, MarkDelivered) => Err(ServiceError::InvalidStatus(
            "Sales order is not being tracked".to_string(),
        )),
    }
}

/// Order lifecycle controller.
///
/// Confirmation books the physical shipment with the carrier *before* the
/// local status write commits; a carrier failure leaves the order in its
/// prior state so the operation is safely retryable. The booking carries a
/// client order code derived from the order id, making retries idempotent on
/// the carrier side.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    carrier: Arc<dyn ShippingCarrier>,
    event_sender: Arc<EventSender>,
}

impl OrderService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        carrier: Arc<dyn ShippingCarrier>,
        event_sender: Arc<EventSender>,
    ) -> Self {
        Self {
            db,
            carrier,
            event_sender,
        }
    }

    /// Confirms a pending order: books the shipment, then moves the order to
    /// `Tracking` with the carrier's order code.
    #[instrument(skip(self))]
    pub async fn confirm_order(&self, order_id: Uuid) -> Result<SalesOrderModel, ServiceError> {
        let txn = self.db.begin().await?;

        let order = self.fetch_order(&txn, order_id).await?;
        let next = next_status(order.status, OrderAction::Confirm)?;

        let lines = OrderProduct::find()
            .filter(order_product::Column::OrderId.eq(order_id))
            .all(&txn)
            .await?;
        let booking_request = self.booking_request(&txn, &order, &lines).await?;

        // Remote booking happens before the local commit; on failure the
        // transaction is dropped and the order keeps its prior status.
        let booking = match self.carrier.create_shipping(&booking_request).await {
            Ok(booking) => booking,
            Err(err) => {
                warn!(%order_id, %err, "shipment booking failed; order left unchanged");
                return Err(err);
            }
        };

        let mut active: sales_order::ActiveModel = order.into();
        active.status = Set(next);
        active.shipping_order_code = Set(Some(booking.order_code.clone()));
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderConfirmed {
                order_id,
                shipping_order_code: booking.order_code.clone(),
            })
            .await;

        info!(
            "Order {} confirmed; shipment {} booked",
            order_id, booking.order_code
        );
        Ok(updated)
    }

    /// Cancels an order that has not shipped yet. No shipment exists in the
    /// cancellable states, so no carrier call is made.
    #[instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: Uuid) -> Result<SalesOrderModel, ServiceError> {
        let txn = self.db.begin().await?;

        let order = self.fetch_order(&txn, order_id).await?;
        let next = next_status(order.status, OrderAction::Cancel)?;

        let mut active: sales_order::ActiveModel = order.into();
        active.status = Set(next);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderCancelled(order_id))
            .await;
        info!("Order {} cancelled", order_id);
        Ok(updated)
    }

    /// Closes a tracked order once the carrier reports delivery.
    #[instrument(skip(self))]
    pub async fn mark_delivered(&self, order_id: Uuid) -> Result<SalesOrderModel, ServiceError> {
        let txn = self.db.begin().await?;

        let order = self.fetch_order(&txn, order_id).await?;
        let next = next_status(order.status, OrderAction::MarkDelivered)?;

        let mut active: sales_order::ActiveModel = order.into();
        active.status = Set(next);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderDelivered(order_id))
            .await;
        Ok(updated)
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderWithLines, ServiceError> {
        let order = self.fetch_order(&*self.db, order_id).await?;
        let lines = OrderProduct::find()
            .filter(order_product::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?;
        Ok(OrderWithLines { order, lines })
    }

    pub async fn list_for_buyer(
        &self,
        buyer_id: Uuid,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<SalesOrderModel>, u64), ServiceError> {
        self.list(sales_order::Column::UserId, buyer_id, page, per_page)
            .await
    }

    pub async fn list_for_shop(
        &self,
        shop_id: Uuid,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<SalesOrderModel>, u64), ServiceError> {
        self.list(sales_order::Column::ShopId, shop_id, page, per_page)
            .await
    }

    async fn list(
        &self,
        column: sales_order::Column,
        id: Uuid,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<SalesOrderModel>, u64), ServiceError> {
        let paginator = SalesOrder::find()
            .filter(column.eq(id))
            .order_by_desc(sales_order::Column::CreatedAt)
            .paginate(&*self.db, per_page);
        let total = paginator.num_items().await?;
        let data = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((data, total))
    }

    async fn fetch_order<C: sea_orm::ConnectionTrait>(
        &self,
        conn: &C,
        order_id: Uuid,
    ) -> Result<SalesOrderModel, ServiceError> {
        SalesOrder::find_by_id(order_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Sales order {} not found", order_id)))
    }

    /// Builds the carrier booking from the order's snapshot lines and the
    /// current product dimensions.
    async fn booking_request<C: sea_orm::ConnectionTrait>(
        &self,
        conn: &C,
        order: &SalesOrderModel,
        lines: &[OrderProductModel],
    ) -> Result<BookingRequest, ServiceError> {
        let ward = Ward::find_by_id(order.ward_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Ward {} not found", order.ward_id)))?;

        let product_ids: Vec<Uuid> = lines.iter().map(|l| l.product_id).collect();
        let products: HashMap<Uuid, product::Model> = Product::find()
            .filter(product::Column::Id.is_in(product_ids))
            .all(conn)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let mut weight_grams = 0;
        let mut length_cm = 0;
        let mut width_cm = 0;
        let mut height_cm = 0;
        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            if let Some(p) = products.get(&line.product_id) {
                weight_grams += p.weight_grams * line.quantity;
                length_cm = length_cm.max(p.length_cm);
                width_cm = width_cm.max(p.width_cm);
                height_cm += p.height_cm * line.quantity;
            }
            items.push(ShipmentItem {
                name: line.product_name.clone(),
                quantity: line.quantity,
            });
        }

        // The carrier collects the total on delivery for COD orders only
        let cod_amount = match order.payment_method {
            PaymentMethod::Cod => order.total,
            PaymentMethod::Vnpay => Decimal::ZERO,
        };

        Ok(BookingRequest {
            client_order_code: shipping::client_order_code(order.id),
            cod_amount,
            to_name: order.receiver_name.clone(),
            to_phone: order.receiver_phone.clone(),
            to_address: order.receiver_address.clone(),
            to_ward_code: ward.carrier_ward_code,
            to_district_id: ward.carrier_district_id,
            weight_grams,
            length_cm,
            width_cm,
            height_cm,
            items,
        })
    }
}

/// Order joined with its line snapshots.
#[derive(Debug, Serialize)]
pub struct OrderWithLines {
    pub order: SalesOrderModel,
    pub lines: Vec<OrderProductModel>,
}
