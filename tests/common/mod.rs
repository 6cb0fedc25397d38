#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use megamall_api::{
    config::{AppConfig, GatewayConfig, GatewayFlavor, MailConfig, StoreBackend},
    ids::ObjectId,
    invoice::PdfInvoiceRenderer,
    middleware::auth::AuthUser,
    models::NewGuestUser,
    notify::{Notifier, NotifyError, OutboundEmail},
    payment::MpesaClient,
    state::AppState,
    store::{MemoryStore, UserRepository},
};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

pub const JWT_SECRET: &str = "test-jwt-secret";
pub const SHORTCODE: &str = "174379";
pub const PASSKEY: &str = "bfb279f9aa9bdbcf158e97dd71a467cd2e0c893059b10f78e6b72ada1ed2c919";

pub fn gateway_config(base_url: &str) -> GatewayConfig {
    GatewayConfig {
        base_url: base_url.trim_end_matches('/').to_string(),
        consumer_key: SecretString::from("consumer-key"),
        consumer_secret: SecretString::from("consumer-secret"),
        shortcode: SHORTCODE.to_string(),
        passkey: SecretString::from(PASSKEY),
        till_number: None,
        callback_url: "https://shop.example.com/api/payment/callback/".to_string(),
        account_reference: "MegaMall Ltd".to_string(),
        flavor: GatewayFlavor::Daraja,
        connect_timeout: Duration::from_secs(2),
        timeout: Duration::from_secs(5),
    }
}

pub fn test_config(gateway_url: &str) -> AppConfig {
    AppConfig {
        store_backend: StoreBackend::Memory,
        database_url: None,
        host: "127.0.0.1".to_string(),
        port: 0,
        jwt_secret: SecretString::from(JWT_SECRET),
        total_tolerance: Decimal::new(1, 2),
        gateway: gateway_config(gateway_url),
        mail: MailConfig {
            sendgrid_api_key: None,
            sendgrid_base_url: "http://127.0.0.1:9".to_string(),
            from: "orders@megamall.test".to_string(),
            shop_email: Some("shop@megamall.test".to_string()),
        },
        cors_origins: vec!["http://localhost:3000".to_string()],
    }
}

/// Keeps every email instead of sending it.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<OutboundEmail>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, email: OutboundEmail) -> Result<(), NotifyError> {
        self.sent.lock().push(email);
        Ok(())
    }
}

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub mail: Arc<RecordingNotifier>,
}

/// State over a fresh in-memory store. The gateway points at `gateway_url`,
/// usually a wiremock server.
pub fn test_app(gateway_url: &str) -> TestApp {
    let store = Arc::new(MemoryStore::default());
    let mail = Arc::new(RecordingNotifier::default());
    let gateway = MpesaClient::new(gateway_config(gateway_url)).expect("gateway client");
    let state = AppState::new(
        test_config(gateway_url),
        store.clone(),
        gateway,
        Arc::new(PdfInvoiceRenderer::default()),
        mail.clone(),
    );
    TestApp { state, store, mail }
}

pub async fn buyer(store: &MemoryStore, email: &str, phone: Option<&str>) -> AuthUser {
    let user = store
        .insert_guest_user(NewGuestUser {
            email: email.to_string(),
            password_hash: String::new(),
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            phone: phone.map(str::to_string),
            subscribed: false,
        })
        .await
        .expect("insert guest user");
    AuthUser {
        user_id: user.id,
        email: user.email,
    }
}

pub fn unknown_product() -> ObjectId {
    ObjectId::parse("ffffffffffffffffffffffff").expect("valid object id")
}

/// A Daraja stand-in that issues a token and accepts every STK push with
/// the given checkout request id.
pub async fn mock_daraja(checkout_request_id: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/oauth/v1/generate"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "access_token": "tok-1", "expires_in": "3599" })),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/mpesa/stkpush/v1/processrequest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "MerchantRequestID": "29115-34620561-1",
            "CheckoutRequestID": checkout_request_id,
            "ResponseCode": "0",
            "ResponseDescription": "Success. Request accepted for processing"
        })))
        .mount(&server)
        .await;
    server
}
