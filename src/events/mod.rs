use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Domain events emitted by the services layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Cart events
    CartItemAdded {
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    },
    CartItemRemoved {
        user_id: Uuid,
        product_id: Uuid,
    },

    // Checkout events
    CheckoutCompleted {
        user_id: Uuid,
        order_ids: Vec<Uuid>,
        total: Decimal,
    },
    CouponRedeemed {
        code: String,
        order_id: Uuid,
    },

    // Order lifecycle events
    OrderConfirmed {
        order_id: Uuid,
        shipping_order_code: String,
    },
    OrderCancelled(Uuid),
    OrderDelivered(Uuid),

    // Payment events
    PaymentRecorded {
        payment_id: String,
        success: bool,
    },

    // Catalog events
    ProductCreated(Uuid),
    ProductDiscountAdded {
        product_id: Uuid,
        discount_id: Uuid,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event, surfacing channel failures to the caller.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event and logs (rather than propagates) a channel failure.
    /// Event delivery is best-effort; domain writes never fail on it.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Dropping event: {}", e);
        }
    }
}

/// Drains the event channel, logging each event. A real deployment would fan
/// these out to notification and analytics consumers.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        info!(?event, "processing domain event");
    }
    info!("event channel closed; consumer exiting");
}
