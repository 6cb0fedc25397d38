//! Order lifecycle: creation, status reads and invoices.
//!
//! Writes happen in a fixed order (shipping address, order header, items)
//! with no surrounding transaction. A failure after the header is stored is
//! reported as a partial failure and left in place for an operator.

use tracing::{error, info, warn};

use crate::{
    audit::log_audit,
    dto::orders::{CreateOrderRequest, CreateOrderResponse},
    error::{AppError, AppResult},
    ids::{ObjectId, OrderId},
    invoice::invoice_number,
    middleware::auth::AuthUser,
    models::{Order, ShippingAddress},
    notify::{Attachment, OutboundEmail},
    order::{CartLine, OrderDraft, OrderItemView, OrderSnapshot},
    response::{ApiResponse, Meta},
    state::AppState,
    store::StoreError,
};

const MAX_IDEMPOTENCY_KEY_LEN: usize = 255;

pub async fn create_order(
    state: &AppState,
    actor: &AuthUser,
    payload: CreateOrderRequest,
    idempotency_key: Option<String>,
) -> AppResult<ApiResponse<CreateOrderResponse>> {
    let lines = payload
        .cart_items
        .into_iter()
        .map(|item| item.into_line())
        .collect::<AppResult<Vec<CartLine>>>()?;
    let shipping = payload.shipping_address.into_new()?;
    let idempotency_key = normalize_idempotency_key(idempotency_key)?;

    if let Some(key) = &idempotency_key
        && let Some(existing) = state.store.order_by_idempotency_key(key).await?
    {
        return replay(actor, existing);
    }

    let mut draft = OrderDraft::build(
        &*state.store,
        &lines,
        Some(actor.user_id),
        payload.total_price,
        payload
            .payment_method
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty()),
    )
    .await?;

    if draft.total_mismatch(state.config.total_tolerance) {
        warn!(
            submitted = %draft.submitted_total,
            computed = %draft.computed_total,
            user_id = %actor.user_id,
            "order total does not match catalog prices"
        );
        return Err(AppError::BadRequest(format!(
            "totalPrice {} does not match cart total {}",
            draft.submitted_total, draft.computed_total
        )));
    }

    let address = state
        .store
        .insert_shipping_address(shipping, Some(actor.user_id))
        .await?;
    draft.attach_shipping_address(address.id);
    draft.set_idempotency_key(idempotency_key.clone());

    match state.store.insert_order(&draft.order).await {
        Ok(()) => {}
        Err(StoreError::Conflict("idempotency_key")) => {
            // Lost a race with a request carrying the same key.
            warn!(shipping_address_id = %address.id, "duplicate idempotency key, address left unused");
            let key = idempotency_key.as_deref().unwrap_or_default();
            let existing = state
                .store
                .order_by_idempotency_key(key)
                .await?
                .ok_or(AppError::Conflict("idempotency key already used".into()))?;
            return replay(actor, existing);
        }
        Err(err) => return Err(err.into()),
    }

    let order_id = draft.order.id;
    let stored_items = match state
        .store
        .insert_order_items(order_id, &draft.items)
        .await
    {
        Ok(items) => items,
        Err(source) => {
            error!(
                %order_id,
                item_count = draft.items.len(),
                error = %source,
                "order header stored but items were not"
            );
            return Err(AppError::PartialFailure { order_id, source });
        }
    };

    info!(
        %order_id,
        user_id = %actor.user_id,
        items = draft.total_item_count(),
        total = %draft.order.total_price,
        "order created"
    );

    log_audit(
        &*state.store,
        Some(actor.user_id),
        "order_create",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order_id.to_string() })),
    )
    .await;

    let views = stored_items
        .into_iter()
        .zip(&draft.items)
        .map(|(item, draft_item)| OrderItemView::new(item, Some(draft_item.product_name.clone())))
        .collect();
    let snapshot = OrderSnapshot::assemble(draft.order, views, Some(address));
    send_invoice_email(state, &snapshot, &actor.email).await;

    Ok(ApiResponse::success(
        "Order created",
        CreateOrderResponse {
            order_id,
            message: "Order created successfully".to_string(),
        },
        Some(Meta::empty()),
    ))
}

/// Unknown and malformed ids both read as not found.
pub async fn order_status(state: &AppState, raw_id: &str) -> AppResult<ApiResponse<OrderSnapshot>> {
    let snapshot = load_snapshot(state, raw_id).await?;
    Ok(ApiResponse::success("OK", snapshot, Some(Meta::empty())))
}

/// A saved address, readable only by the guest user it belongs to.
pub async fn shipping_address(
    state: &AppState,
    actor: &AuthUser,
    raw_id: &str,
) -> AppResult<ApiResponse<ShippingAddress>> {
    let id = ObjectId::parse(raw_id.trim()).map_err(|_| AppError::NotFound)?;
    let address = state
        .store
        .shipping_address(id)
        .await?
        .ok_or(AppError::NotFound)?;
    if address.guest_user != Some(actor.user_id) {
        return Err(AppError::Forbidden);
    }
    Ok(ApiResponse::success("OK", address, Some(Meta::empty())))
}

pub struct RenderedInvoice {
    pub number: String,
    pub pdf: Vec<u8>,
}

pub async fn render_invoice(state: &AppState, raw_id: &str) -> AppResult<RenderedInvoice> {
    let snapshot = load_snapshot(state, raw_id).await?;
    let pdf = state.invoices.render(&snapshot)?;
    Ok(RenderedInvoice {
        number: invoice_number(&snapshot.order),
        pdf,
    })
}

async fn load_snapshot(state: &AppState, raw_id: &str) -> AppResult<OrderSnapshot> {
    let id = OrderId::parse(raw_id.trim()).map_err(|_| AppError::NotFound)?;
    OrderSnapshot::load(&*state.store, id)
        .await?
        .ok_or(AppError::NotFound)
}

fn replay(actor: &AuthUser, existing: Order) -> AppResult<ApiResponse<CreateOrderResponse>> {
    if existing.guest_user != Some(actor.user_id) {
        return Err(AppError::Conflict("idempotency key already used".into()));
    }
    info!(order_id = %existing.id, "idempotent replay of order creation");
    Ok(ApiResponse::success(
        "Order already exists",
        CreateOrderResponse {
            order_id: existing.id,
            message: "Order created successfully".to_string(),
        },
        Some(Meta::empty()),
    ))
}

fn normalize_idempotency_key(raw: Option<String>) -> AppResult<Option<String>> {
    let Some(key) = raw.map(|k| k.trim().to_string()).filter(|k| !k.is_empty()) else {
        return Ok(None);
    };
    if key.len() > MAX_IDEMPOTENCY_KEY_LEN {
        return Err(AppError::BadRequest("Idempotency-Key is too long".into()));
    }
    Ok(Some(key))
}

/// Renders the invoice and mails it to the buyer, copying the shop.
/// Failures are logged and never reach the caller.
async fn send_invoice_email(state: &AppState, snapshot: &OrderSnapshot, to: &str) {
    let order_id = snapshot.order.id;
    let pdf = match state.invoices.render(snapshot) {
        Ok(pdf) => pdf,
        Err(err) => {
            warn!(%order_id, error = %err, "invoice render failed, email skipped");
            return;
        }
    };

    let number = invoice_number(&snapshot.order);
    let mut recipients = vec![to.to_string()];
    if let Some(shop) = &state.config.mail.shop_email {
        recipients.push(shop.clone());
    }

    let email = OutboundEmail {
        to: recipients,
        subject: format!("Invoice #{number} - MegaMall"),
        html: format!(
            "<h2>Thank you for your order</h2><p>Invoice number: {number}</p><p>See attached invoice PDF.</p>"
        ),
        attachment: Some(Attachment {
            filename: format!("invoice_{number}.pdf"),
            content_type: "application/pdf".to_string(),
            bytes: pdf,
        }),
    };

    if let Err(err) = state.notifier.send(email).await {
        warn!(%order_id, error = %err, "invoice email failed");
    }
}
