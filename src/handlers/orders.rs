use crate::{
    errors::ApiError,
    handlers::common::{
        map_service_error, success_response, CurrentUser, PaginatedResponse, PaginationParams,
    },
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use uuid::Uuid;

async fn list_my_orders(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (orders, total) = state
        .services
        .orders
        .list_for_buyer(user.id, params.page(), params.per_page())
        .await
        .map_err(map_service_error)?;
    Ok(success_response(PaginatedResponse::new(
        orders, total, &params,
    )))
}

async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .get_order(order_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(order))
}

async fn confirm_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .confirm_order(order_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(order))
}

async fn cancel_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .cancel_order(order_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(order))
}

async fn mark_delivered(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .mark_delivered(order_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(order))
}

/// Shop-side order listing.
pub async fn list_shop_orders(
    State(state): State<AppState>,
    Path(shop_id): Path<Uuid>,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (orders, total) = state
        .services
        .orders
        .list_for_shop(shop_id, params.page(), params.per_page())
        .await
        .map_err(map_service_error)?;
    Ok(success_response(PaginatedResponse::new(
        orders, total, &params,
    )))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_my_orders))
        .route("/:order_id", get(get_order))
        .route("/:order_id/confirm", post(confirm_order))
        .route("/:order_id/cancel", post(cancel_order))
        .route("/:order_id/delivered", post(mark_delivered))
}
