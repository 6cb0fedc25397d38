mod common;

use std::sync::Arc;

use megamall_api::{
    db::{create_pool, orm_from_pool, run_migrations},
    dto::orders::CreateOrderRequest,
    ids::ObjectId,
    invoice::PdfInvoiceRenderer,
    middleware::auth::AuthUser,
    models::{NewGuestUser, OrderStatus},
    payment::MpesaClient,
    services::{order_service, payment_service},
    state::AppState,
    store::{OrderRepository, PgStore, UserRepository},
};
use rust_decimal::Decimal;
use serde_json::json;

use common::{RecordingNotifier, gateway_config, test_config};

// Same order flow as the in-memory tests, against a real database.
#[tokio::test]
async fn order_flow_against_postgres() -> anyhow::Result<()> {
    let database_url = match std::env::var("TEST_DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("Skipping test: set TEST_DATABASE_URL to run the postgres flow.");
            return Ok(());
        }
    };

    let pool = create_pool(&database_url).await?;
    run_migrations(&pool).await?;

    let category_id = ObjectId::new().to_string();
    let product_id = ObjectId::new();
    sqlx::query("INSERT INTO categories (id, name, slug) VALUES ($1, $2, $3)")
        .bind(&category_id)
        .bind(format!("Test {category_id}"))
        .bind(format!("test-{category_id}"))
        .execute(&pool)
        .await?;
    sqlx::query(
        "INSERT INTO products (id, name, price, category_id, description) VALUES ($1, $2, $3, $4, '')",
    )
    .bind(product_id.to_string())
    .bind("Test Widget")
    .bind(Decimal::new(4_999, 2))
    .bind(&category_id)
    .execute(&pool)
    .await?;

    let store = Arc::new(PgStore::new(orm_from_pool(pool.clone())));
    let state = AppState::new(
        test_config("http://127.0.0.1:9"),
        store.clone(),
        MpesaClient::new(gateway_config("http://127.0.0.1:9"))?,
        Arc::new(PdfInvoiceRenderer::default()),
        Arc::new(RecordingNotifier::default()),
    );

    let email = format!("pg-{}@example.com", ObjectId::new());
    let user = store
        .insert_guest_user(NewGuestUser {
            email: email.clone(),
            password_hash: String::new(),
            first_name: "Pg".into(),
            last_name: "Tester".into(),
            phone: None,
            subscribed: false,
        })
        .await?;
    let actor = AuthUser {
        user_id: user.id,
        email,
    };

    let request = || -> anyhow::Result<CreateOrderRequest> {
        Ok(serde_json::from_value(json!({
            "shippingAddress": {
                "deliveryMethod": "delivery",
                "full_name": "Pg Tester",
                "address": "Kenyatta Avenue 1",
                "city": "Nairobi",
                "country": "Kenya"
            },
            "cartItems": [{ "id": product_id.to_string(), "quantity": 2 }],
            "totalPrice": "99.98"
        }))?)
    };
    let key = format!("pg-{}", ObjectId::new());

    let created = order_service::create_order(&state, &actor, request()?, Some(key.clone()))
        .await?
        .data
        .expect("created order");
    let replayed = order_service::create_order(&state, &actor, request()?, Some(key))
        .await?
        .data
        .expect("replayed order");
    assert_eq!(created.order_id, replayed.order_id);

    let snapshot = order_service::order_status(&state, &created.order_id.to_string())
        .await?
        .data
        .expect("snapshot");
    assert_eq!(snapshot.items.len(), 1);
    assert_eq!(snapshot.item_count, 2);
    assert_eq!(snapshot.order.status, OrderStatus::Pending);

    // What initiation does once the gateway accepts the push.
    assert!(
        store
            .update_order_status(
                created.order_id,
                OrderStatus::Pending,
                OrderStatus::Pending,
                Some("ws_CO_pg"),
            )
            .await?
    );

    let callback = |checkout_request_id: &str| {
        json!({
            "Body": { "stkCallback": {
                "MerchantRequestID": "m-1",
                "CheckoutRequestID": checkout_request_id,
                "ResultCode": 0,
                "ResultDesc": "ok"
            }}
        })
        .to_string()
    };
    payment_service::handle_payment_callback(
        &state,
        Some(&created.order_id.to_string()),
        callback("ws_CO_other").as_bytes(),
    )
    .await?;
    let order = store.order(created.order_id).await?.expect("order");
    assert_eq!(order.status, OrderStatus::Pending);

    payment_service::handle_payment_callback(
        &state,
        Some(&created.order_id.to_string()),
        callback("ws_CO_pg").as_bytes(),
    )
    .await?;
    let order = store.order(created.order_id).await?.expect("order");
    assert_eq!(order.status, OrderStatus::Paid);
    assert_eq!(order.payment_reference.as_deref(), Some("ws_CO_pg"));
    Ok(())
}
