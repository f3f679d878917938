use crate::{
    entities::sales_order::PaymentMethod,
    errors::ApiError,
    handlers::common::{map_service_error, success_response, validate_input, CurrentUser},
    services::checkout::CheckoutRequest,
    AppState,
};
use axum::{extract::State, response::IntoResponse, routing::post, Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CheckoutPayload {
    #[validate(length(min = 1, message = "select at least one cart item"))]
    pub selected_product_ids: Vec<Uuid>,
    pub ward_id: Uuid,
    #[validate(length(min = 1))]
    pub receiver_name: String,
    #[validate(length(min = 8))]
    pub receiver_phone: String,
    #[validate(length(min = 1))]
    pub receiver_address: String,
    pub payment_method: PaymentMethod,
    pub product_coupon_code: Option<String>,
    pub shipping_coupon_code: Option<String>,
}

impl From<CheckoutPayload> for CheckoutRequest {
    fn from(payload: CheckoutPayload) -> Self {
        CheckoutRequest {
            selected_product_ids: payload.selected_product_ids,
            ward_id: payload.ward_id,
            receiver_name: payload.receiver_name,
            receiver_phone: payload.receiver_phone,
            receiver_address: payload.receiver_address,
            payment_method: payload.payment_method,
            product_coupon_code: payload.product_coupon_code,
            shipping_coupon_code: payload.shipping_coupon_code,
        }
    }
}

/// Prices the selected cart items per shop group without committing anything.
async fn preview(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<CheckoutPayload>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let breakdowns = state
        .services
        .checkout
        .preview(user.id, &payload.into())
        .await
        .map_err(map_service_error)?;
    Ok(success_response(breakdowns))
}

/// Commits the checkout, creating one order per shop group.
async fn commit(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<CheckoutPayload>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let outcome = state
        .services
        .checkout
        .checkout(user.id, &payload.into())
        .await
        .map_err(map_service_error)?;
    Ok(success_response(outcome))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(commit))
        .route("/preview", post(preview))
}
