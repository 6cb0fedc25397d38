use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};

use crate::{
    dto::orders::{CreateOrderRequest, CreateOrderResponse},
    error::AppResult,
    middleware::auth::AuthUser,
    models::ShippingAddress,
    order::OrderSnapshot,
    response::ApiResponse,
    services::order_service,
    state::AppState,
};

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders/", post(create_order))
        .route("/orders/{order_id}/status/", get(order_status))
        .route("/orders/{order_id}/invoice/", get(order_invoice))
        .route("/shipping-addresses/{address_id}/", get(shipping_address))
}

#[utoipa::path(
    post,
    path = "/api/orders/",
    request_body = CreateOrderRequest,
    params(
        ("Idempotency-Key" = Option<String>, Header, description = "Replays return the order created by the first request"),
    ),
    responses(
        (status = 201, description = "Order created", body = ApiResponse<CreateOrderResponse>),
        (status = 400, description = "Invalid cart, address or total"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Unknown product"),
        (status = 500, description = "Order only partially saved"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    user: AuthUser,
    headers: HeaderMap,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<ApiResponse<CreateOrderResponse>>)> {
    let Json(payload) = payload?;
    let idempotency_key = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let resp = order_service::create_order(&state, &user, payload, idempotency_key).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/orders/{order_id}/status/",
    params(("order_id" = String, Path, description = "Order UUID")),
    responses(
        (status = 200, description = "Order snapshot", body = ApiResponse<OrderSnapshot>),
        (status = 404, description = "Unknown or malformed order id"),
    ),
    tag = "Orders"
)]
pub async fn order_status(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> AppResult<Json<ApiResponse<OrderSnapshot>>> {
    let resp = order_service::order_status(&state, &order_id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/orders/{order_id}/invoice/",
    params(("order_id" = String, Path, description = "Order UUID")),
    responses(
        (status = 200, description = "Invoice PDF", content_type = "application/pdf", body = Vec<u8>),
        (status = 404, description = "Unknown or malformed order id"),
    ),
    tag = "Orders"
)]
pub async fn order_invoice(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let invoice = order_service::render_invoice(&state, &order_id).await?;
    let headers = [
        (header::CONTENT_TYPE, "application/pdf".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("inline; filename=\"invoice_{}.pdf\"", invoice.number),
        ),
    ];
    Ok((headers, invoice.pdf))
}

#[utoipa::path(
    get,
    path = "/api/shipping-addresses/{address_id}/",
    params(("address_id" = String, Path, description = "Shipping address id")),
    responses(
        (status = 200, description = "Shipping address", body = ApiResponse<ShippingAddress>),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Address belongs to someone else"),
        (status = 404, description = "Unknown or malformed address id"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn shipping_address(
    State(state): State<AppState>,
    user: AuthUser,
    Path(address_id): Path<String>,
) -> AppResult<Json<ApiResponse<ShippingAddress>>> {
    let resp = order_service::shipping_address(&state, &user, &address_id).await?;
    Ok(Json(resp))
}
