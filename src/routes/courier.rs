use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    routing::post,
};

use crate::{
    dto::courier::{CourierOrderCreated, CreateCourierOrderRequest},
    error::AppResult,
    response::ApiResponse,
    services::courier_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/courier/", post(create_courier_order))
}

#[utoipa::path(
    post,
    path = "/api/courier/",
    request_body = CreateCourierOrderRequest,
    responses(
        (status = 201, description = "Courier booking stored", body = ApiResponse<CourierOrderCreated>),
        (status = 400, description = "Invalid booking")
    ),
    tag = "Courier"
)]
pub async fn create_courier_order(
    State(state): State<AppState>,
    payload: Result<Json<CreateCourierOrderRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<ApiResponse<CourierOrderCreated>>)> {
    let Json(payload) = payload?;
    let resp = courier_service::create_courier_order(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}
