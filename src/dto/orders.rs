use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    error::AppError,
    ids::{ObjectId, OrderId},
    models::{DeliveryMethod, NewShippingAddress},
    money::{Money, Quantity},
    order::CartLine,
};

/// Shipping address as posted by the storefront. Pickup fields arrive in
/// camelCase, delivery fields in snake_case; both spellings are accepted.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ShippingAddressInput {
    #[serde(rename = "deliveryMethod", alias = "delivery_method")]
    pub delivery_method: Option<String>,
    #[serde(rename = "selectedStoreId", alias = "selected_store_id")]
    pub selected_store_id: Option<String>,
    #[serde(rename = "collectorName", alias = "collector_name")]
    pub collector_name: Option<String>,
    #[serde(rename = "collectorPhone", alias = "collector_phone")]
    pub collector_phone: Option<String>,
    #[serde(alias = "fullName")]
    pub full_name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    #[serde(alias = "postalCode")]
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

impl ShippingAddressInput {
    pub fn into_new(self) -> Result<NewShippingAddress, AppError> {
        let delivery_method = match self.delivery_method.as_deref().map(str::trim) {
            None | Some("") => DeliveryMethod::default(),
            Some(raw) => raw
                .to_ascii_lowercase()
                .parse()
                .map_err(AppError::BadRequest)?,
        };

        let address = NewShippingAddress {
            delivery_method,
            selected_store_id: non_blank(self.selected_store_id),
            collector_name: non_blank(self.collector_name),
            collector_phone: non_blank(self.collector_phone),
            full_name: non_blank(self.full_name),
            address: non_blank(self.address),
            city: non_blank(self.city),
            postal_code: non_blank(self.postal_code),
            country: non_blank(self.country),
        };
        address.validate().map_err(AppError::BadRequest)?;
        Ok(address)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CartItemInput {
    /// Product id, 24 hex characters.
    pub id: String,
    pub quantity: Option<i64>,
}

impl CartItemInput {
    pub fn into_line(self) -> Result<CartLine, AppError> {
        let product_id = ObjectId::parse(&self.id)
            .map_err(|e| AppError::BadRequest(format!("cart item id: {e}")))?;
        let quantity = match self.quantity {
            Some(q) => Quantity::new(q).map_err(|e| AppError::BadRequest(e.to_string()))?,
            None => Quantity::default(),
        };
        Ok(CartLine {
            product_id,
            quantity,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub shipping_address: ShippingAddressInput,
    pub cart_items: Vec<CartItemInput>,
    #[schema(value_type = String, example = "200.00")]
    pub total_price: Money,
    pub payment_method: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    #[schema(value_type = String)]
    pub order_id: OrderId,
    pub message: String,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
