mod common;

use common::{CouponSpec, TestApp};
use marketplace_api::{
    entities::{CartItem, CouponType, DiscountType, OrderStatus, PaymentMethod, SalesOrder},
    errors::ServiceError,
    services::checkout::CheckoutRequest,
};
use rust_decimal_macros::dec;
use sea_orm::EntityTrait;
use uuid::Uuid;

fn request(product_ids: Vec<Uuid>, ward_id: Uuid, method: PaymentMethod) -> CheckoutRequest {
    CheckoutRequest {
        selected_product_ids: product_ids,
        ward_id,
        receiver_name: "Alice Buyer".to_string(),
        receiver_phone: "0901234567".to_string(),
        receiver_address: "12 Market St".to_string(),
        payment_method: method,
        product_coupon_code: None,
        shipping_coupon_code: None,
    }
}

#[tokio::test]
async fn multi_shop_cart_creates_one_order_per_shop() {
    let app = TestApp::spawn().await;
    let buyer = Uuid::new_v4();
    let ward = app.seed_ward().await;
    let category = app.seed_category("electronics").await;

    let shop_a = Uuid::new_v4();
    let shop_b = Uuid::new_v4();
    let p1 = app.seed_product(shop_a, category, dec!(100), 10).await;
    let p2 = app.seed_product(shop_a, category, dec!(50), 10).await;
    let p3 = app.seed_product(shop_b, category, dec!(80), 10).await;

    for &p in &[p1, p2, p3] {
        app.services.cart.add_item(buyer, p, 1).await.unwrap();
    }

    let outcome = app
        .services
        .checkout
        .checkout(buyer, &request(vec![p1, p2, p3], ward, PaymentMethod::Cod))
        .await
        .unwrap();

    assert_eq!(outcome.orders.len(), 2);
    assert!(outcome.payment_url.is_none());

    let order_a = outcome.orders.iter().find(|o| o.shop_id == shop_a).unwrap();
    let order_b = outcome.orders.iter().find(|o| o.shop_id == shop_b).unwrap();
    // Each shop group is priced on its own: subtotal + flat stub fee of 20
    assert_eq!(order_a.subtotal, dec!(150));
    assert_eq!(order_a.total, dec!(170));
    assert_eq!(order_b.subtotal, dec!(80));
    assert_eq!(order_b.total, dec!(100));
    // COD orders skip the payment step entirely
    assert!(outcome
        .orders
        .iter()
        .all(|o| o.status == OrderStatus::PendingConfirmation));

    // Checked-out rows are gone from the cart
    assert!(app.services.cart.get_cart(buyer).await.unwrap().is_empty());
}

#[tokio::test]
async fn second_shop_group_failure_rolls_back_the_first() {
    let app = TestApp::spawn().await;
    let buyer = Uuid::new_v4();
    let ward = app.seed_ward().await;
    let category = app.seed_category("electronics").await;
    // One remaining use, and the cart spans two shops that both want it
    app.seed_coupon(
        "LASTONE",
        CouponSpec {
            max_use_count: 1,
            ..CouponSpec::default()
        },
    )
    .await;

    let p1 = app.seed_product(Uuid::new_v4(), category, dec!(100), 5).await;
    let p2 = app.seed_product(Uuid::new_v4(), category, dec!(100), 5).await;
    app.services.cart.add_item(buyer, p1, 1).await.unwrap();
    app.services.cart.add_item(buyer, p2, 1).await.unwrap();

    let mut req = request(vec![p1, p2], ward, PaymentMethod::Cod);
    req.product_coupon_code = Some("LASTONE".to_string());

    // The first group consumes the last use, so the second group fails
    let err = app.services.checkout.checkout(buyer, &req).await.unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));

    // The first group's order did not survive the rollback
    assert!(SalesOrder::find().all(&*app.db).await.unwrap().is_empty());
    let coupon = app.services.coupons.get_coupon("LASTONE").await.unwrap();
    assert_eq!(coupon.used_count, 0);
    assert_eq!(app.services.cart.get_cart(buyer).await.unwrap().len(), 2);
}

#[tokio::test]
async fn gateway_checkout_returns_url_for_combined_total() {
    let app = TestApp::spawn().await;
    let buyer = Uuid::new_v4();
    let ward = app.seed_ward().await;
    let category = app.seed_category("books").await;
    let product = app.seed_product(Uuid::new_v4(), category, dec!(100), 5).await;

    app.services.cart.add_item(buyer, product, 2).await.unwrap();

    let outcome = app
        .services
        .checkout
        .checkout(buyer, &request(vec![product], ward, PaymentMethod::Vnpay))
        .await
        .unwrap();

    assert_eq!(outcome.orders.len(), 1);
    let order = &outcome.orders[0];
    assert_eq!(order.status, OrderStatus::PendingPayment);
    assert_eq!(order.total, dec!(220));

    let url = outcome.payment_url.unwrap();
    assert!(url.contains("amount=220"));
    assert!(url.contains(&format!("orders:{}", order.id)));
}

#[tokio::test]
async fn unknown_ward_aborts_the_whole_checkout() {
    let app = TestApp::spawn().await;
    let buyer = Uuid::new_v4();
    let category = app.seed_category("toys").await;
    let product = app.seed_product(Uuid::new_v4(), category, dec!(40), 5).await;

    app.services.cart.add_item(buyer, product, 1).await.unwrap();

    let err = app
        .services
        .checkout
        .checkout(
            buyer,
            &request(vec![product], Uuid::new_v4(), PaymentMethod::Cod),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));

    // Nothing was committed: no orders, cart untouched
    assert!(SalesOrder::find().all(&*app.db).await.unwrap().is_empty());
    assert_eq!(app.services.cart.get_cart(buyer).await.unwrap().len(), 1);
}

#[tokio::test]
async fn empty_selection_is_rejected() {
    let app = TestApp::spawn().await;
    let ward = app.seed_ward().await;

    let err = app
        .services
        .checkout
        .checkout(
            Uuid::new_v4(),
            &request(vec![Uuid::new_v4()], ward, PaymentMethod::Cod),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn product_coupon_discounts_and_is_recorded_on_the_order() {
    let app = TestApp::spawn().await;
    let buyer = Uuid::new_v4();
    let ward = app.seed_ward().await;
    let category = app.seed_category("electronics").await;
    let product = app.seed_product(Uuid::new_v4(), category, dec!(150), 5).await;
    app.seed_coupon(
        "WELCOME10",
        CouponSpec {
            min_order_value: dec!(100),
            max_discount_amount: dec!(50),
            ..CouponSpec::default()
        },
    )
    .await;

    app.services.cart.add_item(buyer, product, 1).await.unwrap();

    let mut req = request(vec![product], ward, PaymentMethod::Cod);
    req.product_coupon_code = Some("WELCOME10".to_string());

    let outcome = app.services.checkout.checkout(buyer, &req).await.unwrap();
    let order = &outcome.orders[0];

    // 10% of 150 = 15, under the 50 cap
    assert_eq!(order.product_discount_amount, dec!(15));
    assert_eq!(order.total, dec!(155));
    assert_eq!(order.product_coupon_code.as_deref(), Some("WELCOME10"));

    // The redemption committed with the order
    let coupon = app.services.coupons.get_coupon("WELCOME10").await.unwrap();
    assert_eq!(coupon.used_count, 1);
}

#[tokio::test]
async fn coupon_below_minimum_subtotal_aborts_checkout() {
    let app = TestApp::spawn().await;
    let buyer = Uuid::new_v4();
    let ward = app.seed_ward().await;
    let category = app.seed_category("electronics").await;
    let product = app.seed_product(Uuid::new_v4(), category, dec!(50), 5).await;
    app.seed_coupon(
        "WELCOME10",
        CouponSpec {
            min_order_value: dec!(100),
            ..CouponSpec::default()
        },
    )
    .await;

    app.services.cart.add_item(buyer, product, 1).await.unwrap();

    let mut req = request(vec![product], ward, PaymentMethod::Cod);
    req.product_coupon_code = Some("WELCOME10".to_string());

    let err = app.services.checkout.checkout(buyer, &req).await.unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));
    assert!(SalesOrder::find().all(&*app.db).await.unwrap().is_empty());
}

#[tokio::test]
async fn shipping_coupon_never_exceeds_the_fee() {
    let app = TestApp::spawn().await;
    let buyer = Uuid::new_v4();
    let ward = app.seed_ward().await;
    let category = app.seed_category("books").await;
    let product = app.seed_product(Uuid::new_v4(), category, dec!(60), 5).await;
    app.seed_coupon(
        "FREESHIP",
        CouponSpec {
            coupon_type: CouponType::Shipping,
            discount_type: DiscountType::Amount,
            value: dec!(30),
            ..CouponSpec::default()
        },
    )
    .await;

    app.services.cart.add_item(buyer, product, 1).await.unwrap();

    let mut req = request(vec![product], ward, PaymentMethod::Cod);
    req.shipping_coupon_code = Some("FREESHIP".to_string());

    let outcome = app.services.checkout.checkout(buyer, &req).await.unwrap();
    let order = &outcome.orders[0];

    // The 30-off coupon is clamped to the stub's flat fee of 20
    assert_eq!(order.shipping_discount_amount, dec!(20));
    assert_eq!(order.total, dec!(60));
    assert_eq!(order.shipping_coupon_code.as_deref(), Some("FREESHIP"));
}

#[tokio::test]
async fn category_restricted_coupon_requires_a_matching_product() {
    let app = TestApp::spawn().await;
    let buyer = Uuid::new_v4();
    let ward = app.seed_ward().await;
    let electronics = app.seed_category("electronics").await;
    let books = app.seed_category("books").await;
    let product = app.seed_product(Uuid::new_v4(), books, dec!(150), 5).await;
    app.seed_coupon(
        "TECH10",
        CouponSpec {
            category_ids: vec![electronics],
            ..CouponSpec::default()
        },
    )
    .await;

    app.services.cart.add_item(buyer, product, 1).await.unwrap();

    let mut req = request(vec![product], ward, PaymentMethod::Cod);
    req.product_coupon_code = Some("TECH10".to_string());

    let err = app.services.checkout.checkout(buyer, &req).await.unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn preview_prices_without_committing_anything() {
    let app = TestApp::spawn().await;
    let buyer = Uuid::new_v4();
    let ward = app.seed_ward().await;
    let category = app.seed_category("toys").await;
    let product = app.seed_product(Uuid::new_v4(), category, dec!(45), 5).await;
    app.seed_coupon("WELCOME10", CouponSpec::default()).await;

    app.services.cart.add_item(buyer, product, 2).await.unwrap();

    let mut req = request(vec![product], ward, PaymentMethod::Cod);
    req.product_coupon_code = Some("WELCOME10".to_string());

    let breakdowns = app.services.checkout.preview(buyer, &req).await.unwrap();
    assert_eq!(breakdowns.len(), 1);
    assert_eq!(breakdowns[0].subtotal, dec!(90));
    assert_eq!(breakdowns[0].product_discount_amount, dec!(9));
    assert_eq!(breakdowns[0].total, dec!(101));

    // Preview is read-only
    assert!(SalesOrder::find().all(&*app.db).await.unwrap().is_empty());
    assert_eq!(
        CartItem::find().all(&*app.db).await.unwrap().len(),
        1
    );
    let coupon = app.services.coupons.get_coupon("WELCOME10").await.unwrap();
    assert_eq!(coupon.used_count, 0);
}
