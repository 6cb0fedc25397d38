//! Application configuration loaded from environment variables.
//!
//! Required: `JWT_SECRET`, `MPESA_CONSUMER_KEY`, `MPESA_CONSUMER_SECRET`,
//! `MPESA_SHORTCODE`, `MPESA_PASSKEY`, `MPESA_CALLBACK_URL`, and
//! `DATABASE_URL` unless `STORE_BACKEND=memory`.
//!
//! Optional: `APP_HOST` (127.0.0.1), `APP_PORT` (3000), `STORE_BACKEND`
//! (postgres), `MPESA_BASE_URL` (Daraja sandbox), `MPESA_FLAVOR` (daraja),
//! `MPESA_TILL_NUMBER`, `MPESA_ACCOUNT_REFERENCE`,
//! `GATEWAY_CONNECT_TIMEOUT_SECS` (5), `GATEWAY_TIMEOUT_SECS` (30),
//! `ORDER_TOTAL_TOLERANCE` (0.01), `SENDGRID_API_KEY`, `SENDGRID_BASE_URL`,
//! `MAIL_FROM`, `SHOP_EMAIL`, `CORS_ALLOWED_ORIGINS` (comma separated,
//! local storefront origins by default).

use std::{env, str::FromStr, time::Duration};

use rust_decimal::Decimal;
use secrecy::SecretString;
use thiserror::Error;

const DEFAULT_MPESA_BASE_URL: &str = "https://sandbox.safaricom.co.ke";
const DEFAULT_SENDGRID_BASE_URL: &str = "https://api.sendgrid.com";
const DEFAULT_ACCOUNT_REFERENCE: &str = "MegaMall Ltd";
const DEFAULT_MAIL_FROM: &str = "orders@megamall.co.ke";
const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000,http://127.0.0.1:3000";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown store backend {other:?}")),
        }
    }
}

/// Which STK push dialect the gateway speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GatewayFlavor {
    /// Safaricom Daraja `processrequest` with shortcode password.
    #[default]
    Daraja,
    /// Aggregator style `/v1/stk/push` that answers with a `Location` header.
    Token,
}

impl FromStr for GatewayFlavor {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "daraja" => Ok(Self::Daraja),
            "token" => Ok(Self::Token),
            other => Err(format!("unknown gateway flavor {other:?}")),
        }
    }
}

/// M-Pesa STK push credentials and endpoints.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub consumer_key: SecretString,
    pub consumer_secret: SecretString,
    pub shortcode: String,
    pub passkey: SecretString,
    /// Buy-goods till. When set, pushes go out as `CustomerBuyGoodsOnline`.
    pub till_number: Option<String>,
    pub callback_url: String,
    pub account_reference: String,
    pub flavor: GatewayFlavor,
    pub connect_timeout: Duration,
    pub timeout: Duration,
}

impl GatewayConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: get_env_or_default("MPESA_BASE_URL", DEFAULT_MPESA_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            consumer_key: get_required_secret("MPESA_CONSUMER_KEY")?,
            consumer_secret: get_required_secret("MPESA_CONSUMER_SECRET")?,
            shortcode: get_required_env("MPESA_SHORTCODE")?,
            passkey: get_required_secret("MPESA_PASSKEY")?,
            till_number: get_optional_env("MPESA_TILL_NUMBER").filter(|t| !t.trim().is_empty()),
            callback_url: get_required_env("MPESA_CALLBACK_URL")?,
            account_reference: get_env_or_default(
                "MPESA_ACCOUNT_REFERENCE",
                DEFAULT_ACCOUNT_REFERENCE,
            ),
            flavor: parse_env_or("MPESA_FLAVOR", GatewayFlavor::Daraja)?,
            connect_timeout: Duration::from_secs(parse_env_or("GATEWAY_CONNECT_TIMEOUT_SECS", 5)?),
            timeout: Duration::from_secs(parse_env_or("GATEWAY_TIMEOUT_SECS", 30)?),
        })
    }
}

/// Outbound mail. Without an API key, mail is written to the log instead.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub sendgrid_api_key: Option<SecretString>,
    pub sendgrid_base_url: String,
    pub from: String,
    /// Receives courier bookings.
    pub shop_email: Option<String>,
}

impl MailConfig {
    fn from_env() -> Self {
        Self {
            sendgrid_api_key: get_optional_env("SENDGRID_API_KEY")
                .filter(|k| !k.is_empty())
                .map(SecretString::from),
            sendgrid_base_url: get_env_or_default("SENDGRID_BASE_URL", DEFAULT_SENDGRID_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            from: get_env_or_default("MAIL_FROM", DEFAULT_MAIL_FROM),
            shop_email: get_optional_env("SHOP_EMAIL"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store_backend: StoreBackend,
    pub database_url: Option<SecretString>,
    pub host: String,
    pub port: u16,
    pub jwt_secret: SecretString,
    /// Largest accepted gap between the submitted and the catalog total.
    pub total_tolerance: Decimal,
    pub gateway: GatewayConfig,
    pub mail: MailConfig,
    /// Browser origins allowed to call the API with credentials.
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let store_backend = parse_env_or("STORE_BACKEND", StoreBackend::Postgres)?;
        let database_url = match store_backend {
            StoreBackend::Postgres => Some(get_required_secret("DATABASE_URL")?),
            StoreBackend::Memory => get_optional_env("DATABASE_URL").map(SecretString::from),
        };

        Ok(Self {
            store_backend,
            database_url,
            host: get_env_or_default("APP_HOST", "127.0.0.1"),
            port: parse_env_or("APP_PORT", 3000)?,
            jwt_secret: get_required_secret("JWT_SECRET")?,
            total_tolerance: parse_env_or("ORDER_TOTAL_TOLERANCE", Decimal::new(1, 2))?,
            gateway: GatewayConfig::from_env()?,
            mail: MailConfig::from_env(),
            cors_origins: split_list(&get_env_or_default(
                "CORS_ALLOWED_ORIGINS",
                DEFAULT_CORS_ORIGINS,
            )),
        })
    }
}

fn get_required_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    get_required_env(key).map(SecretString::from)
}

fn get_optional_env(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn get_env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_env_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get_optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}
