use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::GuestUser;

#[derive(Deserialize, Debug, Default, ToSchema)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub phone: Option<String>,
    #[serde(default)]
    pub subscribed: bool,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub user_id: String,
    pub email: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegisterResponse {
    pub user: GuestUser,
    pub token: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct TokenRefreshRequest {
    /// A token from login, registration or an earlier refresh.
    pub refresh: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenRefreshResponse {
    pub access: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct Claims {
    /// Guest user id.
    pub sub: String,
    pub email: String,
    pub exp: usize,
}
