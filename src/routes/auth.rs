use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    routing::{get, post},
};

use crate::{
    dto::auth::{
        LoginRequest, LoginResponse, RegisterRequest, RegisterResponse, TokenRefreshRequest,
        TokenRefreshResponse,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::GuestUser,
    response::ApiResponse,
    services::auth_service::{login_user, refresh_token, register_user, user_profile},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/guest-users/", post(register))
        .route("/login/", post(login))
        .route("/token/refresh/", post(token_refresh))
        .route("/user-profile/", get(profile))
}

#[utoipa::path(
    post,
    path = "/api/guest-users/",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Register guest user", body = ApiResponse<RegisterResponse>),
        (status = 400, description = "Email or password missing"),
        (status = 409, description = "Email already registered")
    ),
    tag = "Auth"
)]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<ApiResponse<RegisterResponse>>)> {
    let Json(payload) = payload?;
    let resp = register_user(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    post,
    path = "/api/login/",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login guest user", body = ApiResponse<LoginResponse>),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<ApiResponse<LoginResponse>>> {
    let Json(payload) = payload?;
    let resp = login_user(&state, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/token/refresh/",
    request_body = TokenRefreshRequest,
    responses(
        (status = 200, description = "Fresh token", body = ApiResponse<TokenRefreshResponse>),
        (status = 401, description = "Token invalid, expired or for an inactive user")
    ),
    tag = "Auth"
)]
pub async fn token_refresh(
    State(state): State<AppState>,
    payload: Result<Json<TokenRefreshRequest>, JsonRejection>,
) -> AppResult<Json<ApiResponse<TokenRefreshResponse>>> {
    let Json(payload) = payload?;
    let resp = refresh_token(&state, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/user-profile/",
    responses(
        (status = 200, description = "Current guest user", body = ApiResponse<GuestUser>),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<GuestUser>>> {
    let resp = user_profile(&state, &user).await?;
    Ok(Json(resp))
}
