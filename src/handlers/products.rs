use crate::{
    entities::product::ProductStatus,
    errors::ApiError,
    handlers::common::{
        created_response, map_service_error, success_response, validate_input, PaginatedResponse,
        PaginationParams,
    },
    services::{catalog::NewProduct, discounts::DiscountWindowInput},
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateProductRequest {
    pub shop_id: Uuid,
    pub category_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub description: Option<String>,
    pub regular_price: Decimal,
    #[validate(range(min = 0))]
    pub quantity: i32,
    #[validate(range(min = 1))]
    pub weight_grams: i32,
    #[validate(range(min = 1))]
    pub length_cm: i32,
    #[validate(range(min = 1))]
    pub width_cm: i32,
    #[validate(range(min = 1))]
    pub height_cm: i32,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateStockRequest {
    #[validate(range(min = 0))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    pub status: ProductStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DiscountWindowRequest {
    pub discount_price: Decimal,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateDiscountRequest {
    pub product_id: Uuid,
    pub discount_price: Decimal,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct BrowseParams {
    pub category_id: Option<Uuid>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

async fn create_product(
    State(state): State<AppState>,
    Json(payload): Json<CreateProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let product = state
        .services
        .catalog
        .create_product(NewProduct {
            shop_id: payload.shop_id,
            category_id: payload.category_id,
            name: payload.name,
            description: payload.description.unwrap_or_default(),
            regular_price: payload.regular_price,
            quantity: payload.quantity,
            weight_grams: payload.weight_grams,
            length_cm: payload.length_cm,
            width_cm: payload.width_cm,
            height_cm: payload.height_cm,
        })
        .await
        .map_err(map_service_error)?;
    Ok(created_response(product))
}

async fn browse_products(
    State(state): State<AppState>,
    Query(params): Query<BrowseParams>,
) -> Result<impl IntoResponse, ApiError> {
    let pagination = PaginationParams {
        page: params.page,
        per_page: params.per_page,
    };
    let (products, total) = state
        .services
        .catalog
        .list_active(params.category_id, pagination.page(), pagination.per_page())
        .await
        .map_err(map_service_error)?;
    Ok(success_response(PaginatedResponse::new(
        products,
        total,
        &pagination,
    )))
}

async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state
        .services
        .catalog
        .get_product(product_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(product))
}

async fn update_stock(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<UpdateStockRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let product = state
        .services
        .catalog
        .set_stock(product_id, payload.quantity)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(product))
}

async fn update_status(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state
        .services
        .catalog
        .set_status(product_id, payload.status)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(product))
}

async fn add_discount(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<DiscountWindowRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let discount = state
        .services
        .discounts
        .add_discount(DiscountWindowInput {
            product_id,
            discount_price: payload.discount_price,
            start_time: payload.start_time,
            end_time: payload.end_time,
        })
        .await
        .map_err(map_service_error)?;
    Ok(created_response(discount))
}

async fn list_discounts(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let discounts = state
        .services
        .discounts
        .list_for_product(product_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(discounts))
}

/// PUT /discounts/:discount_id, registered at the top level of the router.
pub async fn update_discount(
    State(state): State<AppState>,
    Path(discount_id): Path<Uuid>,
    Json(payload): Json<UpdateDiscountRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let discount = state
        .services
        .discounts
        .update_discount(
            discount_id,
            DiscountWindowInput {
                product_id: payload.product_id,
                discount_price: payload.discount_price,
                start_time: payload.start_time,
                end_time: payload.end_time,
            },
        )
        .await
        .map_err(map_service_error)?;
    Ok(success_response(discount))
}

pub async fn list_shop_products(
    State(state): State<AppState>,
    Path(shop_id): Path<Uuid>,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (products, total) = state
        .services
        .catalog
        .list_for_shop(shop_id, params.page(), params.per_page())
        .await
        .map_err(map_service_error)?;
    Ok(success_response(PaginatedResponse::new(
        products, total, &params,
    )))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
}

pub async fn create_category(
    State(state): State<AppState>,
    Json(payload): Json<CreateCategoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let category = state
        .services
        .catalog
        .create_category(payload.name)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(category))
}

pub async fn list_categories(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let categories = state
        .services
        .catalog
        .list_categories()
        .await
        .map_err(map_service_error)?;
    Ok(success_response(categories))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(browse_products).post(create_product))
        .route("/:product_id", get(get_product))
        .route("/:product_id/stock", put(update_stock))
        .route("/:product_id/status", put(update_status))
        .route(
            "/:product_id/discounts",
            get(list_discounts).post(add_discount),
        )
}
