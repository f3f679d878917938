use crate::{
    errors::ApiError,
    handlers::common::{map_service_error, success_response},
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use std::collections::BTreeMap;

/// Gateway return callback. The query string carries the signed gateway
/// parameters; verification happens in the gateway client, reconciliation in
/// the payment service.
async fn payment_return(
    State(state): State<AppState>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .services
        .gateway
        .parse_return(&params)
        .map_err(map_service_error)?;
    let payment = state
        .services
        .payments
        .record_gateway_result(&result)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(payment))
}

async fn get_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let payment = state
        .services
        .payments
        .get_payment(&payment_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(payment))
}

async fn list_payments(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let payments = state
        .services
        .payments
        .list_payments()
        .await
        .map_err(map_service_error)?;
    Ok(success_response(payments))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_payments))
        .route("/return", get(payment_return))
        .route("/:payment_id", get(get_payment))
}
