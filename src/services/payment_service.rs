use tracing::{error, info, warn};

use crate::{
    dto::payment::{CallbackAck, InitiatePaymentRequest},
    error::{AppError, AppResult},
    ids::OrderId,
    middleware::auth::AuthUser,
    models::{Order, OrderStatus},
    payment::{PaymentHandle, PaymentMetadata, PaymentOutcome, StkResult, parse_callback},
    response::{ApiResponse, Meta},
    state::AppState,
    store::{OrderRepository, StoreError},
};

/// Sends an STK push for an order, or for a bare amount when no order is given.
///
/// The order status is left alone here; only the gateway's callback moves it.
/// The checkout request id is recorded on the order so the callback can be
/// matched against it.
pub async fn initiate_order_payment(
    state: &AppState,
    actor: &AuthUser,
    payload: InitiatePaymentRequest,
) -> AppResult<ApiResponse<PaymentHandle>> {
    let order = match payload.order_id.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => Some(owned_order(state, actor, raw).await?),
        _ => None,
    };
    if let Some(order) = order.as_ref().filter(|o| o.status.is_settled()) {
        return Err(AppError::Conflict(format!(
            "Order is already {}",
            order.status
        )));
    }

    let phone = match payload.phone.as_deref().map(str::trim) {
        Some(phone) if !phone.is_empty() => phone.to_string(),
        _ => state
            .store
            .guest_user(actor.user_id)
            .await?
            .and_then(|u| u.phone)
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| AppError::BadRequest("Phone number is required".into()))?,
    };

    let amount = payload
        .amount_text()
        .or_else(|| order.as_ref().map(|o| o.total_price.to_string()))
        .ok_or_else(|| AppError::BadRequest("Amount is required".into()))?;

    let metadata = PaymentMetadata {
        order_id: order.as_ref().map(|o| o.id),
        account_reference: None,
        description: Some("Order payment".to_string()),
    };

    let handle = state
        .gateway
        .initiate_payment(&phone, &amount, &metadata)
        .await?;

    if let (Some(order), Some(checkout_id)) = (&order, handle.checkout_request_id.as_deref()) {
        let recorded = state
            .store
            .update_order_status(order.id, order.status, order.status, Some(checkout_id))
            .await?;
        if !recorded {
            warn!(
                order_id = %order.id,
                checkout_request_id = checkout_id,
                "order status changed during initiation, reference not recorded"
            );
        }
    }

    info!(
        order_id = ?metadata.order_id,
        checkout_request_id = ?handle.checkout_request_id,
        "stk push accepted"
    );
    Ok(ApiResponse::success(
        "STK push sent",
        handle,
        Some(Meta::empty()),
    ))
}

async fn owned_order(state: &AppState, actor: &AuthUser, raw_id: &str) -> AppResult<Order> {
    let id = OrderId::parse(raw_id)
        .map_err(|_| AppError::BadRequest(format!("Invalid order id {raw_id:?}")))?;
    let order = state.store.order(id).await?.ok_or(AppError::NotFound)?;
    if order.guest_user != Some(actor.user_id) {
        return Err(AppError::Forbidden);
    }
    Ok(order)
}

/// Handles the gateway's asynchronous result.
///
/// Only a body that is not JSON is refused. Everything else is acknowledged,
/// including callbacks for unknown orders and store failures, which are logged.
pub async fn handle_payment_callback(
    state: &AppState,
    order_id: Option<&str>,
    body: &[u8],
) -> AppResult<CallbackAck> {
    let envelope = parse_callback(body).map_err(|e| AppError::BadRequest(e.to_string()))?;
    info!(payload = %envelope.raw, order_id = ?order_id, "payment callback received");

    let Some(result) = envelope.result else {
        warn!("callback without stkCallback result, nothing to apply");
        return Ok(CallbackAck::accepted());
    };
    let Some(raw_id) = order_id.map(str::trim).filter(|id| !id.is_empty()) else {
        warn!(
            checkout_request_id = ?result.checkout_request_id,
            "callback without order_id, nothing to apply"
        );
        return Ok(CallbackAck::accepted());
    };
    let Ok(id) = OrderId::parse(raw_id) else {
        warn!(order_id = raw_id, "callback with malformed order_id");
        return Ok(CallbackAck::accepted());
    };

    if let Err(err) = settle_order(&*state.store, id, &result).await {
        error!(order_id = %id, error = %err, "failed to apply payment callback");
    }
    Ok(CallbackAck::accepted())
}

/// Moves the order through `initiated` to the callback's outcome.
///
/// The callback must carry the checkout request id recorded when the push was
/// initiated; anything else is logged and left alone.
pub async fn settle_order<S>(store: &S, id: OrderId, result: &StkResult) -> Result<(), StoreError>
where
    S: OrderRepository + ?Sized,
{
    let Some(order) = store.order(id).await? else {
        warn!(order_id = %id, "callback for unknown order");
        return Ok(());
    };

    let reference = result.checkout_request_id.as_deref();
    match (reference, order.payment_reference.as_deref()) {
        (Some(received), Some(expected)) if received == expected => {}
        (received, expected) => {
            warn!(
                order_id = %id,
                received = ?received,
                expected = ?expected,
                "callback checkout request id does not match order, ignoring"
            );
            return Ok(());
        }
    }

    let target = match result.outcome() {
        PaymentOutcome::Paid => OrderStatus::Paid,
        PaymentOutcome::Failed => OrderStatus::Failed,
    };

    let mut current = order.status;
    if current == OrderStatus::Pending {
        current = if store
            .update_order_status(id, OrderStatus::Pending, OrderStatus::Initiated, reference)
            .await?
        {
            OrderStatus::Initiated
        } else {
            store.order(id).await?.map(|o| o.status).unwrap_or(current)
        };
    }

    if !current.can_transition_to(target) {
        warn!(order_id = %id, from = %current, to = %target, "ignoring callback transition");
        return Ok(());
    }

    if store
        .update_order_status(id, OrderStatus::Initiated, target, reference)
        .await?
    {
        info!(
            order_id = %id,
            status = %target,
            result_code = result.result_code,
            receipt = ?result.receipt_number,
            "order payment settled"
        );
    } else {
        warn!(order_id = %id, to = %target, "order status changed concurrently, callback ignored");
    }
    Ok(())
}
