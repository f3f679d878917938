//! SeaORM entities for the marketplace domain.

pub mod cart_item;
pub mod category;
pub mod coupon;
pub mod coupon_category;
pub mod order_product;
pub mod payment;
pub mod product;
pub mod product_discount;
pub mod sales_order;
pub mod ward;

// Re-export entities
pub use cart_item::{Entity as CartItem, Model as CartItemModel};
pub use category::{Entity as Category, Model as CategoryModel};
pub use coupon::{CouponType, DiscountType, Entity as Coupon, Model as CouponModel};
pub use coupon_category::{Entity as CouponCategory, Model as CouponCategoryModel};
pub use order_product::{Entity as OrderProduct, Model as OrderProductModel};
pub use payment::{Entity as Payment, Model as PaymentModel};
pub use product::{Entity as Product, Model as ProductModel, ProductStatus};
pub use product_discount::{Entity as ProductDiscount, Model as ProductDiscountModel};
pub use sales_order::{
    Entity as SalesOrder, Model as SalesOrderModel, OrderStatus, PaymentMethod,
};
pub use ward::{Entity as Ward, Model as WardModel};
