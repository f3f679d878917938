pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod coupons;
pub mod discounts;
pub mod orders;
pub mod payments;
pub mod pricing;

pub use cart::CartService;
pub use catalog::CatalogService;
pub use checkout::CheckoutService;
pub use coupons::CouponService;
pub use discounts::DiscountService;
pub use orders::OrderService;
pub use payments::PaymentService;
pub use pricing::PricingService;
