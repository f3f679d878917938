use crate::{
    entities::coupon::{CouponType, DiscountType},
    errors::ApiError,
    handlers::common::{created_response, map_service_error, success_response, validate_input},
    services::coupons::CreateCouponInput,
    AppState,
};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateCouponRequest {
    #[validate(length(min = 1, max = 50))]
    pub code: String,
    pub coupon_type: CouponType,
    pub discount_type: DiscountType,
    pub value: Decimal,
    #[serde(default)]
    pub min_order_value: Decimal,
    #[serde(default)]
    pub max_discount_amount: Decimal,
    #[serde(default)]
    pub allow_multiple_use: bool,
    #[serde(default)]
    pub max_use_count: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub category_ids: Vec<Uuid>,
}

async fn create_coupon(
    State(state): State<AppState>,
    Json(payload): Json<CreateCouponRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let coupon = state
        .services
        .coupons
        .create_coupon(CreateCouponInput {
            code: payload.code,
            coupon_type: payload.coupon_type,
            discount_type: payload.discount_type,
            value: payload.value,
            min_order_value: payload.min_order_value,
            max_discount_amount: payload.max_discount_amount,
            allow_multiple_use: payload.allow_multiple_use,
            max_use_count: payload.max_use_count,
            start_time: payload.start_time,
            end_time: payload.end_time,
            category_ids: payload.category_ids,
        })
        .await
        .map_err(map_service_error)?;
    Ok(created_response(coupon))
}

async fn list_coupons(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let coupons = state
        .services
        .coupons
        .list_coupons()
        .await
        .map_err(map_service_error)?;
    Ok(success_response(coupons))
}

async fn get_coupon(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let coupon = state
        .services
        .coupons
        .get_coupon(&code)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(coupon))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_coupons).post(create_coupon))
        .route("/:code", get(get_coupon))
}
