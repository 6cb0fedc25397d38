use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use password_hash::rand_core::OsRng;
use secrecy::{ExposeSecret, SecretString};
use tracing::info;

use crate::{
    audit::log_audit,
    dto::auth::{
        Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse,
        TokenRefreshRequest, TokenRefreshResponse,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    ids::ObjectId,
    models::{GuestUser, NewGuestUser, normalize_email},
    response::{ApiResponse, Meta},
    state::AppState,
};

const TOKEN_TTL_HOURS: i64 = 24;

pub async fn register_user(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<RegisterResponse>> {
    let email = payload
        .email
        .as_deref()
        .map(normalize_email)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::BadRequest("Email is required".into()))?;
    let password = payload
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::BadRequest("Password is required".into()))?;

    let password_hash = hash_password(&password)?;
    let user = state
        .store
        .insert_guest_user(NewGuestUser {
            email,
            password_hash,
            first_name: payload.first_name.trim().to_string(),
            last_name: payload.last_name.trim().to_string(),
            phone: payload.phone.filter(|p| !p.trim().is_empty()),
            subscribed: payload.subscribed,
        })
        .await?;

    info!(user_id = %user.id, "guest user registered");
    log_audit(
        &*state.store,
        Some(user.id),
        "user_register",
        Some("guest_users"),
        Some(serde_json::json!({ "user_id": user.id })),
    )
    .await;

    let token = issue_token(&state.config.jwt_secret, &user)?;
    Ok(ApiResponse::success(
        "User created",
        RegisterResponse { user, token },
        Some(Meta::empty()),
    ))
}

pub async fn login_user(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let LoginRequest { email, password } = payload;
    let email = normalize_email(&email);

    let user = state
        .store
        .guest_user_by_email(&email)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| AppError::Unauthorized("Invalid email or password".into()))?;

    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;
    if Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(AppError::Unauthorized("Invalid email or password".into()));
    }

    let token = issue_token(&state.config.jwt_secret, &user)?;

    log_audit(
        &*state.store,
        Some(user.id),
        "user_login",
        Some("guest_users"),
        Some(serde_json::json!({ "user_id": user.id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Logged in",
        LoginResponse {
            token,
            user_id: user.id.to_string(),
            email: user.email,
        },
        Some(Meta::empty()),
    ))
}

/// Swaps a still-valid token for a fresh one. The user must still exist and
/// be active.
pub async fn refresh_token(
    state: &AppState,
    payload: TokenRefreshRequest,
) -> AppResult<ApiResponse<TokenRefreshResponse>> {
    let claims = decode_token(&state.config.jwt_secret, payload.refresh.trim())?;
    let user_id = ObjectId::parse(&claims.sub)
        .map_err(|_| AppError::Unauthorized("Invalid user id in token".into()))?;
    let user = state
        .store
        .guest_user(user_id)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired token".into()))?;

    let access = issue_token(&state.config.jwt_secret, &user)?;
    info!(user_id = %user.id, "token refreshed");
    Ok(ApiResponse::success(
        "Token refreshed",
        TokenRefreshResponse { access },
        Some(Meta::empty()),
    ))
}

pub async fn user_profile(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<GuestUser>> {
    let profile = state
        .store
        .guest_user(user.user_id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("OK", profile, Some(Meta::empty())))
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

pub fn issue_token(secret: &SecretString, user: &GuestUser) -> AppResult<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(TOKEN_TTL_HOURS))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: user.id.to_string(),
        email: user.email.clone(),
        exp: expiration.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.expose_secret().as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

pub fn decode_token(secret: &SecretString, token: &str) -> AppResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.expose_secret().as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Unauthorized("Invalid or expired token".into()))
}
