use crate::config::CarrierConfig;
use crate::errors::ServiceError;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{instrument, warn};

/// One line item on a shipment booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentItem {
    pub name: String,
    pub quantity: i32,
}

/// Quote request: destination plus aggregated package dimensions.
#[derive(Debug, Clone, Serialize)]
pub struct QuoteRequest {
    pub to_ward_code: String,
    pub to_district_id: i32,
    pub weight_grams: i32,
    pub length_cm: i32,
    pub width_cm: i32,
    pub height_cm: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShippingQuote {
    pub fee: Decimal,
    /// Estimated delivery leadtime in days, when the carrier reports one.
    pub leadtime_days: Option<i32>,
}

/// Booking request for a confirmed order.
#[derive(Debug, Clone, Serialize)]
pub struct BookingRequest {
    /// Client-side order code, stable across retries of the same order.
    pub client_order_code: String,
    /// Amount the carrier collects on delivery (zero for prepaid orders).
    pub cod_amount: Decimal,
    pub to_name: String,
    pub to_phone: String,
    pub to_address: String,
    pub to_ward_code: String,
    pub to_district_id: i32,
    pub weight_grams: i32,
    pub length_cm: i32,
    pub width_cm: i32,
    pub height_cm: i32,
    pub items: Vec<ShipmentItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShippingBooking {
    pub order_code: String,
    pub fee: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancelResult {
    pub success: bool,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShipmentDetails {
    pub order_code: String,
    pub status: String,
}

/// Shipping carrier collaborator.
///
/// `create_shipping` must be idempotent with respect to `client_order_code`:
/// re-sending the same code re-books the same logical shipment, which makes
/// order confirmation safely retryable after a crash.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ShippingCarrier: Send + Sync {
    async fn preview_shipping(&self, request: &QuoteRequest)
        -> Result<ShippingQuote, ServiceError>;
    async fn create_shipping(
        &self,
        request: &BookingRequest,
    ) -> Result<ShippingBooking, ServiceError>;
    async fn cancel_shipping(&self, order_code: &str) -> Result<CancelResult, ServiceError>;
    async fn get_details(&self, order_code: &str) -> Result<ShipmentDetails, ServiceError>;
}

/// Carrier response envelope: `{code, message, data}`.
#[derive(Debug, Deserialize)]
struct CarrierEnvelope<T> {
    code: i32,
    message: Option<String>,
    data: Option<T>,
}

/// Wire form of a quote request: the destination and dimensions plus the
/// configured pickup point, which the carrier prices the route from.
#[derive(Debug, Serialize)]
struct QuotePayload<'a> {
    #[serde(flatten)]
    request: &'a QuoteRequest,
    from_ward_code: &'a str,
    from_district_id: i32,
}

/// Wire form of a booking: the order fields plus the pickup point and the
/// carrier's payer flag (1 = shop prepaid, 2 = collected from the receiver).
#[derive(Debug, Serialize)]
struct BookingPayload<'a> {
    #[serde(flatten)]
    request: &'a BookingRequest,
    from_address: &'a str,
    from_ward_code: &'a str,
    from_district_id: i32,
    payment_type_id: i32,
}

fn payment_type_id(cod_amount: Decimal) -> i32 {
    if cod_amount > Decimal::ZERO {
        2
    } else {
        1
    }
}

/// HTTP client for the shipping carrier API.
#[derive(Clone)]
pub struct CarrierHttpClient {
    http: reqwest::Client,
    config: CarrierConfig,
}

impl CarrierHttpClient {
    pub fn new(config: CarrierConfig) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ServiceError::InternalError(format!("http client: {}", e)))?;
        Ok(Self { http, config })
    }

    async fn post_json<Req: Serialize + ?Sized, Resp: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &Req,
    ) -> Result<Resp, ServiceError> {
        let url = format!("{}{}", self.config.base_url, path);
        let response = self
            .http
            .post(&url)
            .header("Token", &self.config.token)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ServiceError::ServiceUnavailable("shipping carrier timed out".to_string())
                } else {
                    ServiceError::ExternalServiceError(format!("shipping carrier: {}", e))
                }
            })?;

        let envelope: CarrierEnvelope<Resp> = response.json().await.map_err(|e| {
            ServiceError::ExternalServiceError(format!("shipping carrier response: {}", e))
        })?;

        if envelope.code != 200 {
            let message = envelope
                .message
                .unwrap_or_else(|| "unknown carrier error".to_string());
            warn!(code = envelope.code, %message, "carrier call rejected");
            return Err(ServiceError::ExternalServiceError(message));
        }

        envelope.data.ok_or_else(|| {
            ServiceError::ExternalServiceError("carrier returned empty payload".to_string())
        })
    }
}

#[async_trait]
impl ShippingCarrier for CarrierHttpClient {
    #[instrument(skip(self, request), fields(ward = %request.to_ward_code))]
    async fn preview_shipping(
        &self,
        request: &QuoteRequest,
    ) -> Result<ShippingQuote, ServiceError> {
        let payload = QuotePayload {
            request,
            from_ward_code: &self.config.origin_ward_code,
            from_district_id: self.config.origin_district_id,
        };
        self.post_json("/v2/shipping-order/fee", &payload).await
    }

    #[instrument(skip(self, request), fields(client_order_code = %request.client_order_code))]
    async fn create_shipping(
        &self,
        request: &BookingRequest,
    ) -> Result<ShippingBooking, ServiceError> {
        let payload = BookingPayload {
            request,
            from_address: &self.config.origin_address,
            from_ward_code: &self.config.origin_ward_code,
            from_district_id: self.config.origin_district_id,
            payment_type_id: payment_type_id(request.cod_amount),
        };
        self.post_json("/v2/shipping-order/create", &payload).await
    }

    #[instrument(skip(self))]
    async fn cancel_shipping(&self, order_code: &str) -> Result<CancelResult, ServiceError> {
        self.post_json(
            "/v2/shipping-order/cancel",
            &serde_json::json!({ "order_code": order_code }),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn get_details(&self, order_code: &str) -> Result<ShipmentDetails, ServiceError> {
        self.post_json(
            "/v2/shipping-order/detail",
            &serde_json::json!({ "order_code": order_code }),
        )
        .await
    }
}

/// Builds the idempotent client order code the carrier is booked with.
pub fn client_order_code(order_id: uuid::Uuid) -> String {
    format!("mkt-order-{}", order_id)
}
