//! M-Pesa STK push client.
//!
//! One client per process. It owns the HTTP connection pool and the access
//! token cache, so clone the `Arc` around it rather than building new ones.

use std::{str::FromStr, sync::Arc};

use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{Duration, NaiveDateTime, Utc};
use reqwest::{Url, header::LOCATION};
use rust_decimal::{Decimal, prelude::ToPrimitive};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};
use utoipa::ToSchema;

use super::{
    error::PaymentError,
    phone::{gateway_msisdn, is_valid_phone, normalize_phone},
    token::{AccessToken, TokenCache},
};
use crate::{
    config::{GatewayConfig, GatewayFlavor},
    ids::OrderId,
};

const EAT_OFFSET_HOURS: i64 = 3;
const DEFAULT_TOKEN_TTL_SECS: i64 = 3599;
const MAX_TOKEN_TTL_SECS: i64 = 86_400;
const MAX_DESCRIPTION_LEN: usize = 13;
const MAX_REFERENCE_LEN: usize = 12;

/// What the caller knows about the payment besides phone and amount.
#[derive(Debug, Clone, Default)]
pub struct PaymentMetadata {
    /// Appended to the callback URL as `?order_id=` so the callback can find
    /// its order.
    pub order_id: Option<OrderId>,
    pub account_reference: Option<String>,
    pub description: Option<String>,
}

/// Accepted STK push. The customer still has to confirm on the handset; the
/// result arrives later on the callback URL.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaymentHandle {
    pub merchant_request_id: Option<String>,
    pub checkout_request_id: Option<String>,
    /// Status URL, for gateways that answer with a `Location` header.
    pub location: Option<String>,
    #[schema(value_type = Object)]
    pub provider_response: Value,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct StkPushRequest<'a> {
    business_short_code: &'a str,
    password: String,
    timestamp: String,
    transaction_type: &'static str,
    amount: u64,
    party_a: u64,
    party_b: &'a str,
    phone_number: u64,
    #[serde(rename = "CallBackURL")]
    call_back_url: String,
    account_reference: String,
    transaction_desc: String,
}

#[derive(Debug, Serialize)]
struct TokenFlavorPushRequest<'a> {
    phone: &'a str,
    amount: String,
    reference: String,
    description: String,
    callback_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    till_number: Option<&'a str>,
}

pub struct MpesaClient {
    http: reqwest::Client,
    config: GatewayConfig,
    tokens: TokenCache,
}

impl MpesaClient {
    pub fn new(config: GatewayConfig) -> Result<Self, PaymentError> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .build()
            .map_err(PaymentError::Network)?;

        Ok(Self {
            http,
            config,
            tokens: TokenCache::default(),
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Cached bearer token, fetched from the gateway when missing or within
    /// a minute of expiry.
    pub async fn access_token(&self) -> Result<Arc<AccessToken>, PaymentError> {
        self.tokens.get_or_refresh(|| self.request_token()).await
    }

    #[instrument(skip(self))]
    async fn request_token(&self) -> Result<AccessToken, PaymentError> {
        let url = format!("{}/oauth/v1/generate", self.config.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("grant_type", "client_credentials")])
            .basic_auth(
                self.config.consumer_key.expose_secret(),
                Some(self.config.consumer_secret.expose_secret()),
            )
            .send()
            .await
            .map_err(PaymentError::from_transport)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(PaymentError::from_transport)?;

        if !status.is_success() {
            error!(status = %status, body = %body, "access token request rejected");
            return Err(PaymentError::GatewayAuth(format!(
                "token endpoint returned {status}"
            )));
        }

        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| PaymentError::GatewayAuth(format!("unreadable token response: {e}")))?;
        let value = parsed
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| PaymentError::GatewayAuth("no access_token in response".into()))?;
        let ttl = token_ttl(parsed.expires_in.as_ref());
        let expires_at = Utc::now()
            .checked_add_signed(Duration::seconds(ttl))
            .ok_or_else(|| PaymentError::GatewayAuth(format!("token lifetime {ttl}s out of range")))?;

        debug!(ttl, "fetched gateway access token");
        Ok(AccessToken { value, expires_at })
    }

    /// Sends an STK push to `phone` for `amount`.
    ///
    /// Amount and phone are validated before any network traffic, including
    /// the token request.
    #[instrument(skip(self, metadata), fields(order_id = ?metadata.order_id))]
    pub async fn initiate_payment(
        &self,
        phone: &str,
        amount: &str,
        metadata: &PaymentMetadata,
    ) -> Result<PaymentHandle, PaymentError> {
        let amount = parse_amount(amount)?;
        let phone = normalize_phone(phone);
        if !is_valid_phone(&phone) {
            return Err(PaymentError::InvalidPhone(phone));
        }
        let callback_url = self.callback_url(metadata.order_id)?;

        let token = self.access_token().await?;
        let reference = truncate(
            metadata
                .account_reference
                .as_deref()
                .unwrap_or(&self.config.account_reference),
            MAX_REFERENCE_LEN,
        );
        let description = truncate(
            metadata.description.as_deref().unwrap_or("Payment"),
            MAX_DESCRIPTION_LEN,
        );

        let request = match self.config.flavor {
            GatewayFlavor::Daraja => {
                let body = self.daraja_request(
                    &phone,
                    amount,
                    callback_url,
                    reference,
                    description,
                    eat_now(),
                )?;
                self.http
                    .post(format!(
                        "{}/mpesa/stkpush/v1/processrequest",
                        self.config.base_url
                    ))
                    .json(&body)
            }
            GatewayFlavor::Token => {
                let body = TokenFlavorPushRequest {
                    phone: gateway_msisdn(&phone),
                    amount: amount.to_string(),
                    reference,
                    description,
                    callback_url: callback_url.to_string(),
                    till_number: self.config.till_number.as_deref(),
                };
                self.http
                    .post(format!("{}/v1/stk/push", self.config.base_url))
                    .json(&body)
            }
        };

        let response = request
            .bearer_auth(&token.value)
            .send()
            .await
            .map_err(PaymentError::from_transport)?;

        let status = response.status();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .text()
            .await
            .map_err(PaymentError::from_transport)?;

        info!(status = %status, "stk push response");
        if status == reqwest::StatusCode::UNAUTHORIZED {
            warn!("gateway rejected cached token, dropping it");
            self.tokens.invalidate();
        }
        if !status.is_success() {
            error!(status = %status, body = %body, "stk push rejected");
            return Err(PaymentError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let provider_response = if body.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&body).map_err(|e| PaymentError::InvalidResponse(e.to_string()))?
        };

        Ok(PaymentHandle {
            merchant_request_id: string_field(&provider_response, "MerchantRequestID"),
            checkout_request_id: string_field(&provider_response, "CheckoutRequestID"),
            location,
            provider_response,
        })
    }

    fn callback_url(&self, order_id: Option<OrderId>) -> Result<Url, PaymentError> {
        let mut url = Url::parse(&self.config.callback_url)
            .map_err(|e| PaymentError::InvalidCallbackUrl(e.to_string()))?;
        if let Some(id) = order_id {
            url.query_pairs_mut()
                .append_pair("order_id", &id.to_string());
        }
        Ok(url)
    }

    fn daraja_request(
        &self,
        phone: &str,
        amount: Decimal,
        callback_url: Url,
        account_reference: String,
        transaction_desc: String,
        timestamp: NaiveDateTime,
    ) -> Result<StkPushRequest<'_>, PaymentError> {
        let timestamp = timestamp.format("%Y%m%d%H%M%S").to_string();
        let msisdn: u64 = gateway_msisdn(phone)
            .parse()
            .map_err(|_| PaymentError::InvalidPhone(phone.to_string()))?;
        let whole_amount = amount
            .ceil()
            .to_u64()
            .ok_or_else(|| PaymentError::InvalidAmount(amount.to_string()))?;

        let (transaction_type, party_b) = match self.config.till_number.as_deref() {
            Some(till) => ("CustomerBuyGoodsOnline", till),
            None => ("CustomerPayBillOnline", self.config.shortcode.as_str()),
        };

        Ok(StkPushRequest {
            business_short_code: &self.config.shortcode,
            password: stk_password(
                &self.config.shortcode,
                self.config.passkey.expose_secret(),
                &timestamp,
            ),
            timestamp,
            transaction_type,
            amount: whole_amount,
            party_a: msisdn,
            party_b,
            phone_number: msisdn,
            call_back_url: callback_url.to_string(),
            account_reference,
            transaction_desc,
        })
    }
}

/// Positive decimal amount, as typed by the customer.
pub fn parse_amount(raw: &str) -> Result<Decimal, PaymentError> {
    let amount = Decimal::from_str(raw.trim())
        .map_err(|_| PaymentError::InvalidAmount(raw.to_string()))?;
    if amount <= Decimal::ZERO {
        return Err(PaymentError::InvalidAmount(raw.to_string()));
    }
    Ok(amount)
}

/// `base64(shortcode + passkey + timestamp)`.
pub fn stk_password(shortcode: &str, passkey: &str, timestamp: &str) -> String {
    STANDARD.encode(format!("{shortcode}{passkey}{timestamp}"))
}

fn eat_now() -> NaiveDateTime {
    Utc::now().naive_utc() + Duration::hours(EAT_OFFSET_HOURS)
}

/// Lifetime in seconds, kept within one second and one day.
fn token_ttl(expires_in: Option<&Value>) -> i64 {
    expires_in
        .and_then(expires_in_secs)
        .unwrap_or(DEFAULT_TOKEN_TTL_SECS)
        .clamp(1, MAX_TOKEN_TTL_SECS)
}

fn expires_in_secs(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn truncate(raw: &str, max: usize) -> String {
    raw.chars().take(max).collect()
}
