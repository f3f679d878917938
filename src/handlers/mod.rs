pub mod carts;
pub mod checkout;
pub mod common;
pub mod coupons;
pub mod orders;
pub mod payments;
pub mod products;

use crate::{
    events::EventSender,
    external::{payment::PaymentGateway, shipping::ShippingCarrier},
    services::{
        CartService, CatalogService, CheckoutService, CouponService, DiscountService,
        OrderService, PaymentService, PricingService,
    },
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// All domain services, wired once at startup and shared through the router
/// state.
#[derive(Clone)]
pub struct AppServices {
    pub cart: Arc<CartService>,
    pub catalog: Arc<CatalogService>,
    pub checkout: Arc<CheckoutService>,
    pub coupons: Arc<CouponService>,
    pub discounts: Arc<DiscountService>,
    pub orders: Arc<OrderService>,
    pub payments: Arc<PaymentService>,
    pub pricing: Arc<PricingService>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub carrier: Arc<dyn ShippingCarrier>,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        carrier: Arc<dyn ShippingCarrier>,
        gateway: Arc<dyn PaymentGateway>,
        event_sender: Arc<EventSender>,
    ) -> Self {
        let coupons = Arc::new(CouponService::new(db.clone()));
        let pricing = Arc::new(PricingService::new(carrier.clone(), coupons.clone()));
        let cart = Arc::new(CartService::new(db.clone(), event_sender.clone()));
        let checkout = Arc::new(CheckoutService::new(
            db.clone(),
            cart.clone(),
            pricing.clone(),
            coupons.clone(),
            gateway.clone(),
            event_sender.clone(),
        ));

        Self {
            catalog: Arc::new(CatalogService::new(db.clone(), event_sender.clone())),
            discounts: Arc::new(DiscountService::new(db.clone(), event_sender.clone())),
            orders: Arc::new(OrderService::new(
                db.clone(),
                carrier.clone(),
                event_sender.clone(),
            )),
            payments: Arc::new(PaymentService::new(db, event_sender)),
            cart,
            checkout,
            coupons,
            pricing,
            gateway,
            carrier,
        }
    }
}
