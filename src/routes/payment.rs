use axum::{
    Json, Router,
    body::Bytes,
    extract::{RawQuery, State, rejection::JsonRejection},
    routing::post,
};

use crate::{
    dto::payment::{CallbackAck, InitiatePaymentRequest, callback_order_id},
    error::AppResult,
    middleware::auth::AuthUser,
    payment::PaymentHandle,
    response::ApiResponse,
    services::payment_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/payment/initiate/", post(initiate_payment))
        .route("/payment/callback/", post(payment_callback))
}

#[utoipa::path(
    post,
    path = "/api/payment/initiate/",
    request_body = InitiatePaymentRequest,
    responses(
        (status = 200, description = "STK push accepted by the gateway", body = ApiResponse<PaymentHandle>),
        (status = 400, description = "Invalid phone or amount"),
        (status = 409, description = "Order already settled"),
        (status = 403, description = "Order belongs to someone else"),
        (status = 404, description = "Unknown order"),
        (status = 502, description = "Gateway failure"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payment"
)]
pub async fn initiate_payment(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<InitiatePaymentRequest>, JsonRejection>,
) -> AppResult<Json<ApiResponse<PaymentHandle>>> {
    let Json(payload) = payload?;
    let resp = payment_service::initiate_order_payment(&state, &user, payload).await?;
    Ok(Json(resp))
}

/// Called by the gateway, not by users, so there is no auth. The body and the
/// query string are both read raw; a query that fails to parse is treated as
/// carrying no order id.
#[utoipa::path(
    post,
    path = "/api/payment/callback/",
    params(
        ("order_id" = Option<String>, Query, description = "Order the push was sent for"),
    ),
    request_body(content = Object, description = "Daraja stkCallback envelope"),
    responses(
        (status = 200, description = "Acknowledged", body = CallbackAck),
        (status = 400, description = "Body is not JSON"),
    ),
    tag = "Payment"
)]
pub async fn payment_callback(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> AppResult<Json<CallbackAck>> {
    let order_id = callback_order_id(query.as_deref());
    let ack = payment_service::handle_payment_callback(&state, order_id.as_deref(), &body).await?;
    Ok(Json(ack))
}
