use crate::{
    entities::{payment, sales_order, Payment, PaymentModel, SalesOrder},
    errors::ServiceError,
    events::{Event, EventSender},
    external::payment::GatewayResult,
    services::checkout::parse_payment_description,
    services::orders::{next_status, OrderAction},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Payment reconciliation.
///
/// A gateway callback carries no order foreign key; the order ids travel in
/// the order description written at checkout and are parsed back out here.
/// Recording is idempotent on the gateway's transaction id, so a replayed
/// callback neither duplicates the payment row nor advances an order twice.
#[derive(Clone)]
pub struct PaymentService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl PaymentService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Persists a verified gateway result and, on success, advances every
    /// referenced order still awaiting payment.
    #[instrument(skip(self, result), fields(transaction_id = %result.transaction_id))]
    pub async fn record_gateway_result(
        &self,
        result: &GatewayResult,
    ) -> Result<PaymentModel, ServiceError> {
        let txn = self.db.begin().await?;

        if let Some(existing) = Payment::find_by_id(result.transaction_id.clone())
            .one(&txn)
            .await?
        {
            info!(
                "Transaction {} already recorded; callback replay ignored",
                existing.id
            );
            txn.commit().await?;
            return Ok(existing);
        }

        let payment = payment::ActiveModel {
            id: Set(result.transaction_id.clone()),
            amount: Set(result.amount),
            success: Set(result.success),
            bank_code: Set(result.bank_code.clone()),
            response_code: Set(result.response_code.clone()),
            order_info: Set(result.order_info.clone()),
            created_at: Set(Utc::now()),
        };
        let payment = payment.insert(&txn).await?;

        if result.success {
            let order_ids = result
                .order_info
                .as_deref()
                .map(parse_payment_description)
                .unwrap_or_default();
            if order_ids.is_empty() {
                warn!(
                    "Successful transaction {} carries no recognizable order ids",
                    payment.id
                );
            }
            for order_id in order_ids {
                self.apply_payment(&txn, order_id, &payment.id).await?;
            }
        }

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::PaymentRecorded {
                payment_id: payment.id.clone(),
                success: payment.success,
            })
            .await;
        Ok(payment)
    }

    pub async fn get_payment(&self, payment_id: &str) -> Result<PaymentModel, ServiceError> {
        Payment::find_by_id(payment_id.to_string())
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Payment {} not found", payment_id)))
    }

    pub async fn list_payments(&self) -> Result<Vec<PaymentModel>, ServiceError> {
        Ok(Payment::find()
            .order_by_desc(payment::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    /// Moves one referenced order out of `PendingPayment` and links it to the
    /// payment. Orders in any other state are logged and skipped rather than
    /// failing the whole reconciliation.
    async fn apply_payment<C: sea_orm::ConnectionTrait>(
        &self,
        conn: &C,
        order_id: Uuid,
        payment_id: &str,
    ) -> Result<(), ServiceError> {
        let order = match SalesOrder::find()
            .filter(sales_order::Column::Id.eq(order_id))
            .one(conn)
            .await?
        {
            Some(order) => order,
            None => {
                warn!("Paid order {} does not exist; skipping", order_id);
                return Ok(());
            }
        };

        match next_status(order.status, OrderAction::PaymentSucceeded) {
            Ok(next) => {
                let mut active: sales_order::ActiveModel = order.into();
                active.status = Set(next);
                active.payment_id = Set(Some(payment_id.to_string()));
                active.updated_at = Set(Utc::now());
                active.update(conn).await?;
                info!("Order {} paid by transaction {}", order_id, payment_id);
            }
            Err(_) => {
                warn!(
                    "Order {} is not awaiting payment (status {:?}); skipping",
                    order_id, order.status
                );
            }
        }
        Ok(())
    }
}
