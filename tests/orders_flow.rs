mod common;

use std::str::FromStr;

use megamall_api::{
    dto::{orders::CreateOrderRequest, payment::InitiatePaymentRequest},
    error::AppError,
    ids::OrderId,
    models::{DELETED_PRODUCT, OrderStatus},
    money::Money,
    services::{order_service, payment_service},
    store::OrderRepository,
};
use serde_json::{Value, json};

use common::{buyer, mock_daraja, test_app, unknown_product};

const CHECKOUT_ID: &str = "ws_CO_191220191020363925";

fn money(raw: &str) -> Money {
    Money::from_str(raw).expect("valid money")
}

fn delivery_address() -> Value {
    json!({
        "deliveryMethod": "delivery",
        "full_name": "Jane Doe",
        "address": "Moi Avenue 12",
        "city": "Nairobi",
        "postal_code": "00100",
        "country": "Kenya"
    })
}

fn order_request(items: Value, total: &str) -> CreateOrderRequest {
    serde_json::from_value(json!({
        "shippingAddress": delivery_address(),
        "cartItems": items,
        "totalPrice": total,
        "paymentMethod": "mpesa"
    }))
    .expect("valid order request")
}

fn stk_callback(code: i64) -> Vec<u8> {
    stk_callback_for(CHECKOUT_ID, code)
}

fn stk_callback_for(checkout_request_id: &str, code: i64) -> Vec<u8> {
    json!({
        "Body": {
            "stkCallback": {
                "MerchantRequestID": "29115-34620561-1",
                "CheckoutRequestID": checkout_request_id,
                "ResultCode": code,
                "ResultDesc": "done",
                "CallbackMetadata": {
                    "Item": [
                        { "Name": "Amount", "Value": 200.0 },
                        { "Name": "MpesaReceiptNumber", "Value": "NLJ7RT61SV" }
                    ]
                }
            }
        }
    })
    .to_string()
    .into_bytes()
}

// Buyer orders two lines, reads the status back, then the gateway reports success.
#[tokio::test]
async fn create_order_then_settle_through_callback() -> anyhow::Result<()> {
    let gateway = mock_daraja(CHECKOUT_ID).await;
    let app = test_app(&gateway.uri());
    let category = app.store.add_category("Electronics");
    let cable = app.store.add_product("USB Cable", money("50.00"), category.id);
    let charger = app.store.add_product("Charger", money("100.00"), category.id);
    let user = buyer(&app.store, "jane@example.com", None).await;

    let request = order_request(
        json!([
            { "id": cable.id.to_string(), "quantity": 2 },
            { "id": charger.id.to_string() }
        ]),
        "200.00",
    );
    let created = order_service::create_order(&app.state, &user, request, None)
        .await?
        .data
        .expect("created order");

    let snapshot = order_service::order_status(&app.state, &created.order_id.to_string())
        .await?
        .data
        .expect("snapshot");
    assert_eq!(snapshot.order.status, OrderStatus::Pending);
    assert_eq!(snapshot.order.guest_user, Some(user.user_id));
    assert_eq!(snapshot.items.len(), 2);
    assert_eq!(snapshot.item_count, 3);
    assert_eq!(snapshot.computed_total, money("200.00"));
    assert!(snapshot.shipping_address.is_some());

    assert_eq!(app.store.audit_actions(), vec!["order_create".to_string()]);
    {
        let sent = app.mail.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].to,
            vec!["jane@example.com".to_string(), "shop@megamall.test".to_string()]
        );
        let attachment = sent[0].attachment.as_ref().expect("invoice attached");
        assert!(attachment.bytes.starts_with(b"%PDF-"));
    }

    let handle = payment_service::initiate_order_payment(
        &app.state,
        &user,
        InitiatePaymentRequest {
            phone: Some("0712345678".into()),
            order_id: Some(created.order_id.to_string()),
            ..Default::default()
        },
    )
    .await?
    .data
    .expect("payment handle");
    assert_eq!(handle.checkout_request_id.as_deref(), Some(CHECKOUT_ID));

    // Initiation records the checkout id but leaves the status alone.
    let order = app.store.order(created.order_id).await?.expect("order");
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_reference.as_deref(), Some(CHECKOUT_ID));

    let ack = payment_service::handle_payment_callback(
        &app.state,
        Some(&created.order_id.to_string()),
        &stk_callback(0),
    )
    .await?;
    assert_eq!(ack.status, "success");

    let order = app.store.order(created.order_id).await?.expect("order");
    assert_eq!(order.status, OrderStatus::Paid);
    assert_eq!(order.payment_reference.as_deref(), Some(CHECKOUT_ID));

    // Paying again for a settled order is refused before the gateway is called.
    let err = payment_service::initiate_order_payment(
        &app.state,
        &user,
        InitiatePaymentRequest {
            phone: Some("0712345678".into()),
            order_id: Some(created.order_id.to_string()),
            ..Default::default()
        },
    )
    .await
    .expect_err("settled order");
    assert!(matches!(err, AppError::Conflict(_)));

    // A late failure report does not undo the payment.
    payment_service::handle_payment_callback(
        &app.state,
        Some(&created.order_id.to_string()),
        &stk_callback(1032),
    )
    .await?;
    let order = app.store.order(created.order_id).await?.expect("order");
    assert_eq!(order.status, OrderStatus::Paid);
    Ok(())
}

#[tokio::test]
async fn failed_callback_marks_order_failed() -> anyhow::Result<()> {
    let gateway = mock_daraja(CHECKOUT_ID).await;
    let app = test_app(&gateway.uri());
    let category = app.store.add_category("Groceries");
    let rice = app.store.add_product("Rice", money("95.50"), category.id);
    let user = buyer(&app.store, "buyer@example.com", None).await;

    let created = order_service::create_order(
        &app.state,
        &user,
        order_request(json!([{ "id": rice.id.to_string() }]), "95.50"),
        None,
    )
    .await?
    .data
    .expect("created order");
    payment_service::initiate_order_payment(
        &app.state,
        &user,
        InitiatePaymentRequest {
            phone: Some("0712345678".into()),
            order_id: Some(created.order_id.to_string()),
            ..Default::default()
        },
    )
    .await?;

    payment_service::handle_payment_callback(
        &app.state,
        Some(&created.order_id.to_string()),
        &stk_callback(1032),
    )
    .await?;

    let order = app.store.order(created.order_id).await?.expect("order");
    assert_eq!(order.status, OrderStatus::Failed);
    Ok(())
}

// Anyone can reach the callback URL, so a success report must name the push
// that was actually sent for the order.
#[tokio::test]
async fn forged_callback_does_not_mark_order_paid() -> anyhow::Result<()> {
    let gateway = mock_daraja(CHECKOUT_ID).await;
    let app = test_app(&gateway.uri());
    let category = app.store.add_category("Groceries");
    let sugar = app.store.add_product("Sugar", money("180.00"), category.id);
    let user = buyer(&app.store, "victim@example.com", Some("0712345678")).await;

    let created = order_service::create_order(
        &app.state,
        &user,
        order_request(json!([{ "id": sugar.id.to_string() }]), "180.00"),
        None,
    )
    .await?
    .data
    .expect("created order");
    let order_id = created.order_id.to_string();

    // No push has been initiated yet.
    let ack =
        payment_service::handle_payment_callback(&app.state, Some(&order_id), &stk_callback(0))
            .await?;
    assert_eq!(ack.status, "success");
    let order = app.store.order(created.order_id).await?.expect("order");
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_reference, None);

    payment_service::initiate_order_payment(
        &app.state,
        &user,
        InitiatePaymentRequest {
            order_id: Some(order_id.clone()),
            ..Default::default()
        },
    )
    .await?;

    // A push exists, but the callback names a different one.
    payment_service::handle_payment_callback(
        &app.state,
        Some(&order_id),
        &stk_callback_for("ws_CO_forged", 0),
    )
    .await?;
    let order = app.store.order(created.order_id).await?.expect("order");
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_reference.as_deref(), Some(CHECKOUT_ID));

    payment_service::handle_payment_callback(&app.state, Some(&order_id), &stk_callback(0))
        .await?;
    let order = app.store.order(created.order_id).await?.expect("order");
    assert_eq!(order.status, OrderStatus::Paid);
    Ok(())
}

#[tokio::test]
async fn total_mismatch_is_rejected_before_any_write() -> anyhow::Result<()> {
    let app = test_app("http://127.0.0.1:9");
    let category = app.store.add_category("Electronics");
    let cable = app.store.add_product("USB Cable", money("50.00"), category.id);
    let user = buyer(&app.store, "jane@example.com", None).await;

    let err = order_service::create_order(
        &app.state,
        &user,
        order_request(json!([{ "id": cable.id.to_string(), "quantity": 2 }]), "1.00"),
        None,
    )
    .await
    .expect_err("mismatched total");

    assert!(matches!(err, AppError::BadRequest(_)));
    assert_eq!(app.store.order_count(), 0);
    assert_eq!(app.store.shipping_address_count(), 0);
    Ok(())
}

#[tokio::test]
async fn total_within_tolerance_is_accepted() -> anyhow::Result<()> {
    let app = test_app("http://127.0.0.1:9");
    let category = app.store.add_category("Electronics");
    let cable = app.store.add_product("USB Cable", money("50.00"), category.id);
    let user = buyer(&app.store, "jane@example.com", None).await;

    order_service::create_order(
        &app.state,
        &user,
        order_request(json!([{ "id": cable.id.to_string() }]), "50.01"),
        None,
    )
    .await?;
    assert_eq!(app.store.order_count(), 1);
    Ok(())
}

#[tokio::test]
async fn unknown_product_writes_nothing() -> anyhow::Result<()> {
    let app = test_app("http://127.0.0.1:9");
    let user = buyer(&app.store, "jane@example.com", None).await;

    let err = order_service::create_order(
        &app.state,
        &user,
        order_request(json!([{ "id": unknown_product().to_string() }]), "10.00"),
        None,
    )
    .await
    .expect_err("unknown product");

    assert!(matches!(err, AppError::NotFound));
    assert_eq!(app.store.order_count(), 0);
    assert_eq!(app.store.shipping_address_count(), 0);
    Ok(())
}

#[tokio::test]
async fn empty_cart_and_bad_quantity_are_bad_requests() -> anyhow::Result<()> {
    let app = test_app("http://127.0.0.1:9");
    let category = app.store.add_category("Electronics");
    let cable = app.store.add_product("USB Cable", money("50.00"), category.id);
    let user = buyer(&app.store, "jane@example.com", None).await;

    let empty = order_service::create_order(
        &app.state,
        &user,
        order_request(json!([]), "0"),
        None,
    )
    .await
    .expect_err("empty cart");
    assert!(matches!(empty, AppError::BadRequest(_)));

    let zero = order_service::create_order(
        &app.state,
        &user,
        order_request(json!([{ "id": cable.id.to_string(), "quantity": 0 }]), "0"),
        None,
    )
    .await
    .expect_err("zero quantity");
    assert!(matches!(zero, AppError::BadRequest(_)));
    assert_eq!(app.store.order_count(), 0);
    Ok(())
}

#[tokio::test]
async fn malformed_or_unknown_status_ids_are_not_found() {
    let app = test_app("http://127.0.0.1:9");
    let random = OrderId::new_random().to_string();

    for raw in ["000000000000000000000000", "not-an-id", random.as_str()] {
        let err = order_service::order_status(&app.state, raw)
            .await
            .expect_err("no such order");
        assert!(matches!(err, AppError::NotFound), "id {raw:?}");
    }
}

#[tokio::test]
async fn idempotency_key_replays_the_first_order() -> anyhow::Result<()> {
    let app = test_app("http://127.0.0.1:9");
    let category = app.store.add_category("Electronics");
    let cable = app.store.add_product("USB Cable", money("50.00"), category.id);
    let user = buyer(&app.store, "jane@example.com", None).await;
    let items = json!([{ "id": cable.id.to_string() }]);

    let first = order_service::create_order(
        &app.state,
        &user,
        order_request(items.clone(), "50.00"),
        Some("checkout-7f3a".to_string()),
    )
    .await?
    .data
    .expect("first");
    let second = order_service::create_order(
        &app.state,
        &user,
        order_request(items.clone(), "50.00"),
        Some(" checkout-7f3a ".to_string()),
    )
    .await?
    .data
    .expect("second");

    assert_eq!(first.order_id, second.order_id);
    assert_eq!(app.store.order_count(), 1);
    assert_eq!(app.store.shipping_address_count(), 1);

    let other = buyer(&app.store, "other@example.com", None).await;
    let err = order_service::create_order(
        &app.state,
        &other,
        order_request(items, "50.00"),
        Some("checkout-7f3a".to_string()),
    )
    .await
    .expect_err("key owned by someone else");
    assert!(matches!(err, AppError::Conflict(_)));
    Ok(())
}

#[tokio::test]
async fn item_write_failure_is_a_partial_failure() -> anyhow::Result<()> {
    let app = test_app("http://127.0.0.1:9");
    let category = app.store.add_category("Electronics");
    let cable = app.store.add_product("USB Cable", money("50.00"), category.id);
    let user = buyer(&app.store, "jane@example.com", None).await;
    app.store.fail_order_item_writes(true);

    let err = order_service::create_order(
        &app.state,
        &user,
        order_request(json!([{ "id": cable.id.to_string() }]), "50.00"),
        None,
    )
    .await
    .expect_err("item writes fail");

    let AppError::PartialFailure { order_id, .. } = err else {
        panic!("expected partial failure, got {err:?}");
    };
    // The header stays behind, without items and without a confirmation email.
    let order = app.store.order(order_id).await?.expect("orphaned header");
    assert_eq!(order.status, OrderStatus::Pending);
    assert!(app.store.order_items(order_id).await?.is_empty());
    assert!(app.mail.sent.lock().is_empty());
    Ok(())
}

#[tokio::test]
async fn deleted_product_reads_back_with_placeholder_name() -> anyhow::Result<()> {
    let app = test_app("http://127.0.0.1:9");
    let category = app.store.add_category("Electronics");
    let cable = app.store.add_product("USB Cable", money("50.00"), category.id);
    let user = buyer(&app.store, "jane@example.com", None).await;

    let created = order_service::create_order(
        &app.state,
        &user,
        order_request(json!([{ "id": cable.id.to_string(), "quantity": 3 }]), "150.00"),
        None,
    )
    .await?
    .data
    .expect("created");
    app.store.remove_product(cable.id);
    app.store.add_product("Replacement", money("999.00"), category.id);

    let snapshot = order_service::order_status(&app.state, &created.order_id.to_string())
        .await?
        .data
        .expect("snapshot");
    assert_eq!(snapshot.items[0].product, None);
    assert_eq!(snapshot.items[0].product_name, DELETED_PRODUCT);
    // Prices are the ones captured at order time.
    assert_eq!(snapshot.computed_total, money("150.00"));

    let invoice = order_service::render_invoice(&app.state, &created.order_id.to_string()).await?;
    assert!(invoice.number.starts_with("INV-"));
    assert!(invoice.pdf.starts_with(b"%PDF-"));
    Ok(())
}

#[tokio::test]
async fn callbacks_that_cannot_be_applied_are_still_acknowledged() -> anyhow::Result<()> {
    let app = test_app("http://127.0.0.1:9");

    let no_order = payment_service::handle_payment_callback(&app.state, None, &stk_callback(0)).await?;
    assert_eq!(no_order.status, "success");

    let unknown = payment_service::handle_payment_callback(
        &app.state,
        Some(&OrderId::new_random().to_string()),
        &stk_callback(0),
    )
    .await?;
    assert_eq!(unknown.status, "success");

    let other_shape =
        payment_service::handle_payment_callback(&app.state, Some("x"), br#"{"hello":"world"}"#).await?;
    assert_eq!(other_shape.status, "success");

    let err = payment_service::handle_payment_callback(&app.state, None, b"not json")
        .await
        .expect_err("invalid json");
    assert!(matches!(err, AppError::BadRequest(_)));
    Ok(())
}
