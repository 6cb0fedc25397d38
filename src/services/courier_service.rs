use tracing::{info, warn};

use crate::{
    audit::log_audit,
    dto::courier::{CourierOrderCreated, CreateCourierOrderRequest},
    error::AppResult,
    models::CourierOrder,
    notify::OutboundEmail,
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Stores a courier booking and emails the shop. The email is best-effort.
pub async fn create_courier_order(
    state: &AppState,
    payload: CreateCourierOrderRequest,
) -> AppResult<ApiResponse<CourierOrderCreated>> {
    let new_order = payload.into_new()?;
    let order = state.store.insert_courier_order(new_order).await?;
    info!(courier_order_id = %order.id, action = order.parcel_action.as_str(), "courier order stored");

    log_audit(
        &*state.store,
        None,
        "courier_order_create",
        Some("courier_orders"),
        Some(serde_json::json!({ "courier_order_id": order.id })),
    )
    .await;

    match &state.config.mail.shop_email {
        Some(shop) => {
            let email = OutboundEmail {
                to: vec![shop.clone()],
                subject: "New Courier Order".to_string(),
                html: courier_email_html(&order),
                attachment: None,
            };
            if let Err(err) = state.notifier.send(email).await {
                warn!(error = %err, courier_order_id = %order.id, "courier notification failed");
            }
        }
        None => warn!(courier_order_id = %order.id, "SHOP_EMAIL not set, courier order not emailed"),
    }

    Ok(ApiResponse::success(
        "Courier order submitted",
        CourierOrderCreated {
            id: order.id,
            message: "Courier order submitted.".to_string(),
        },
        Some(Meta::empty()),
    ))
}

fn courier_email_html(order: &CourierOrder) -> String {
    let field = |v: &Option<String>| html_escape(v.as_deref().unwrap_or("-"));
    format!(
        "<h2>New Courier Order Submitted</h2>\
         <p><strong>Action:</strong> {}</p>\
         <p><strong>Name:</strong> {}</p>\
         <p><strong>Phone:</strong> {}</p>\
         <p><strong>From:</strong> {}</p>\
         <p><strong>To:</strong> {}</p>\
         <p><strong>Selected Item:</strong> {}</p>\
         <p><strong>Total:</strong> KES {}</p>\
         <p><strong>Payment Method:</strong> {}</p>\
         <p><strong>Notes:</strong> {}</p>\
         <p><strong>Time:</strong> {}</p>",
        order.parcel_action.as_str(),
        field(&order.contact_name),
        field(&order.contact_phone),
        field(&order.from_address),
        field(&order.to_address),
        field(&order.selected_item),
        order.total.map(|t| t.to_string()).unwrap_or_else(|| "-".into()),
        field(&order.payment_method),
        field(&order.notes),
        order.created_at.format("%Y-%m-%d %H:%M:%S"),
    )
}

pub(crate) fn html_escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
