use crate::{
    handlers::common::{
        map_service_error, no_content_response, success_response, validate_input, CurrentUser,
    },
    errors::ApiError,
    AppState,
};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddCartItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateCartItemRequest {
    pub quantity: i32,
}

async fn get_cart(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let lines = state
        .services
        .cart
        .get_cart(user.id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(lines))
}

async fn add_item(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<AddCartItemRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let item = state
        .services
        .cart
        .add_item(user.id, payload.product_id, payload.quantity)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(item))
}

async fn update_item(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<UpdateCartItemRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let item = state
        .services
        .cart
        .update_quantity(user.id, product_id, payload.quantity)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(item))
}

async fn remove_item(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .cart
        .remove_item(user.id, product_id)
        .await
        .map_err(map_service_error)?;
    Ok(no_content_response())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart))
        .route("/items", axum::routing::post(add_item))
        .route("/items/:product_id", put(update_item).delete(remove_item))
}
