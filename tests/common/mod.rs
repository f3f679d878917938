#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use marketplace_api::{
    config::{AppConfig, CarrierConfig, GatewayConfig},
    db,
    entities::{
        category, coupon, coupon_category, product, ward, CouponType, DiscountType, ProductStatus,
    },
    errors::ServiceError,
    events::{process_events, EventSender},
    external::{
        payment::{GatewayResult, PaymentGateway},
        shipping::{
            BookingRequest, CancelResult, QuoteRequest, ShipmentDetails, ShippingBooking,
            ShippingCarrier, ShippingQuote,
        },
    },
    handlers::AppServices,
    AppState,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use std::collections::BTreeMap;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};
use tokio::sync::mpsc;
use uuid::Uuid;

/// In-process shipping carrier with a fixed fee, recordable bookings, and a
/// failure switch.
pub struct StubCarrier {
    pub fee: Decimal,
    pub fail_bookings: AtomicBool,
    pub bookings: Mutex<Vec<BookingRequest>>,
}

impl StubCarrier {
    pub fn new(fee: Decimal) -> Self {
        Self {
            fee,
            fail_bookings: AtomicBool::new(false),
            bookings: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_next_bookings(&self, fail: bool) {
        self.fail_bookings.store(fail, Ordering::SeqCst);
    }

    pub fn booked(&self) -> Vec<BookingRequest> {
        self.bookings.lock().unwrap().clone()
    }
}

#[async_trait]
impl ShippingCarrier for StubCarrier {
    async fn preview_shipping(
        &self,
        _request: &QuoteRequest,
    ) -> Result<ShippingQuote, ServiceError> {
        Ok(ShippingQuote {
            fee: self.fee,
            leadtime_days: Some(3),
        })
    }

    async fn create_shipping(
        &self,
        request: &BookingRequest,
    ) -> Result<ShippingBooking, ServiceError> {
        if self.fail_bookings.load(Ordering::SeqCst) {
            return Err(ServiceError::ExternalServiceError(
                "carrier rejected the booking".to_string(),
            ));
        }
        self.bookings.lock().unwrap().push(request.clone());
        Ok(ShippingBooking {
            order_code: format!("CARRIER-{}", request.client_order_code),
            fee: self.fee,
        })
    }

    async fn cancel_shipping(&self, _order_code: &str) -> Result<CancelResult, ServiceError> {
        Ok(CancelResult {
            success: true,
            message: None,
        })
    }

    async fn get_details(&self, order_code: &str) -> Result<ShipmentDetails, ServiceError> {
        Ok(ShipmentDetails {
            order_code: order_code.to_string(),
            status: "ready_to_pick".to_string(),
        })
    }
}

/// Gateway stub: URLs embed the amount and description, and return callbacks
/// are read straight from the params without signature checks.
pub struct StubGateway;

impl PaymentGateway for StubGateway {
    fn create_payment_url(
        &self,
        amount: Decimal,
        description: &str,
    ) -> Result<String, ServiceError> {
        Ok(format!(
            "https://gateway.test/pay?amount={}&info={}",
            amount, description
        ))
    }

    fn parse_return(
        &self,
        params: &BTreeMap<String, String>,
    ) -> Result<GatewayResult, ServiceError> {
        let response_code = params.get("code").cloned();
        Ok(GatewayResult {
            transaction_id: params.get("txn").cloned().unwrap_or_default(),
            amount: params
                .get("amount")
                .and_then(|a| a.parse().ok())
                .unwrap_or(Decimal::ZERO),
            success: response_code.as_deref() == Some("00"),
            bank_code: None,
            response_code,
            order_info: params.get("info").cloned(),
        })
    }
}

/// A fully wired application on an in-memory SQLite database with stub
/// collaborators.
pub struct TestApp {
    pub db: Arc<DatabaseConnection>,
    pub services: AppServices,
    pub carrier: Arc<StubCarrier>,
    pub gateway: Arc<StubGateway>,
    pub state: AppState,
}

impl TestApp {
    pub async fn spawn() -> Self {
        // A single pooled connection keeps every query on the same in-memory
        // database.
        let mut options = ConnectOptions::new("sqlite::memory:".to_string());
        options.max_connections(1).min_connections(1);
        let db = Arc::new(Database::connect(options).await.unwrap());
        db::create_schema(&db).await.unwrap();

        let (tx, rx) = mpsc::channel(256);
        let event_sender = Arc::new(EventSender::new(tx));
        tokio::spawn(process_events(rx));

        let carrier = Arc::new(StubCarrier::new(dec!(20)));
        let gateway = Arc::new(StubGateway);
        let services = AppServices::new(
            db.clone(),
            carrier.clone(),
            gateway.clone(),
            event_sender.clone(),
        );

        let state = AppState {
            db: db.clone(),
            config: Arc::new(test_config()),
            services: services.clone(),
            event_sender,
        };

        Self {
            db,
            services,
            carrier,
            gateway,
            state,
        }
    }

    pub async fn seed_ward(&self) -> Uuid {
        let id = Uuid::new_v4();
        ward::ActiveModel {
            id: Set(id),
            name: Set("Ben Nghe".to_string()),
            district_name: Set("District 1".to_string()),
            province_name: Set("Ho Chi Minh City".to_string()),
            carrier_ward_code: Set("21211".to_string()),
            carrier_district_id: Set(1444),
        }
        .insert(&*self.db)
        .await
        .unwrap();
        id
    }

    pub async fn seed_category(&self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        category::ActiveModel {
            id: Set(id),
            name: Set(name.to_string()),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await
        .unwrap();
        id
    }

    pub async fn seed_product(
        &self,
        shop_id: Uuid,
        category_id: Uuid,
        price: Decimal,
        stock: i32,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        product::ActiveModel {
            id: Set(id),
            shop_id: Set(shop_id),
            category_id: Set(category_id),
            name: Set(format!("Product {}", id)),
            description: Set("A seeded product".to_string()),
            regular_price: Set(price),
            quantity: Set(stock),
            status: Set(ProductStatus::Active),
            weight_grams: Set(500),
            length_cm: Set(20),
            width_cm: Set(15),
            height_cm: Set(10),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .unwrap();
        id
    }

    pub async fn seed_coupon(&self, code: &str, spec: CouponSpec) -> String {
        let now = Utc::now();
        coupon::ActiveModel {
            code: Set(code.to_string()),
            coupon_type: Set(spec.coupon_type),
            discount_type: Set(spec.discount_type),
            value: Set(spec.value),
            min_order_value: Set(spec.min_order_value),
            max_discount_amount: Set(spec.max_discount_amount),
            allow_multiple_use: Set(spec.allow_multiple_use),
            max_use_count: Set(spec.max_use_count),
            used_count: Set(0),
            active: Set(true),
            start_time: Set(now - Duration::days(1)),
            end_time: Set(now + Duration::days(30)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .unwrap();

        for category_id in spec.category_ids {
            coupon_category::ActiveModel {
                coupon_code: Set(code.to_string()),
                category_id: Set(category_id),
            }
            .insert(&*self.db)
            .await
            .unwrap();
        }
        code.to_string()
    }
}

/// Seed parameters for a test coupon; defaults to an unrestricted,
/// reusable 10% product coupon.
pub struct CouponSpec {
    pub coupon_type: CouponType,
    pub discount_type: DiscountType,
    pub value: Decimal,
    pub min_order_value: Decimal,
    pub max_discount_amount: Decimal,
    pub allow_multiple_use: bool,
    pub max_use_count: i32,
    pub category_ids: Vec<Uuid>,
}

impl Default for CouponSpec {
    fn default() -> Self {
        Self {
            coupon_type: CouponType::Product,
            discount_type: DiscountType::Percent,
            value: dec!(10),
            min_order_value: Decimal::ZERO,
            max_discount_amount: Decimal::ZERO,
            allow_multiple_use: true,
            max_use_count: 0,
            category_ids: Vec::new(),
        }
    }
}

fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".to_string(),
        host: "127.0.0.1".to_string(),
        port: 0,
        environment: "test".to_string(),
        log_level: "debug".to_string(),
        log_json: false,
        auto_migrate: true,
        db_max_connections: 1,
        db_min_connections: 1,
        carrier: CarrierConfig {
            base_url: "http://localhost:9000".to_string(),
            token: "test-token".to_string(),
            origin_address: "1 Warehouse Way".to_string(),
            origin_ward_code: "21211".to_string(),
            origin_district_id: 1444,
            timeout_secs: 5,
        },
        gateway: GatewayConfig {
            base_url: "http://localhost:9001/pay".to_string(),
            merchant_code: "MKT0001".to_string(),
            hash_secret: "0123456789abcdef0123456789abcdef".to_string(),
            return_url: "http://localhost:8080/payments/return".to_string(),
        },
    }
}
