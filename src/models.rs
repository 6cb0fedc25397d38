use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    ids::{ObjectId, OrderId},
    money::{Money, Quantity},
};

/// Display name used when an order item's product no longer exists.
pub const DELETED_PRODUCT: &str = "Deleted Product";

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Category {
    #[schema(value_type = String)]
    pub id: ObjectId,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Product {
    #[schema(value_type = String)]
    pub id: ObjectId,
    pub name: String,
    #[schema(value_type = String, example = "100.00")]
    pub price: Money,
    pub image: Option<String>,
    #[schema(value_type = String)]
    pub category: ObjectId,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HireItem {
    #[schema(value_type = String)]
    pub id: ObjectId,
    pub name: String,
    pub image: Option<String>,
    pub details: String,
    #[schema(value_type = String)]
    pub hire_price_per_hour: Money,
    #[schema(value_type = String)]
    pub hire_price_per_day: Money,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GuestUser {
    #[schema(value_type = String)]
    pub id: ObjectId,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub subscribed: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewGuestUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub subscribed: bool,
}

/// Lowercases and trims so uniqueness is case-insensitive.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMethod {
    Pickup,
    #[default]
    Delivery,
}

impl DeliveryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMethod::Pickup => "pickup",
            DeliveryMethod::Delivery => "delivery",
        }
    }
}

impl FromStr for DeliveryMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pickup" => Ok(DeliveryMethod::Pickup),
            "delivery" => Ok(DeliveryMethod::Delivery),
            other => Err(format!("unknown delivery method {other:?}")),
        }
    }
}

/// Address fields as stored. Which optional fields are populated depends on
/// `delivery_method`; `NewShippingAddress::validate` enforces that at creation.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ShippingAddress {
    #[schema(value_type = String)]
    pub id: ObjectId,
    #[schema(value_type = Option<String>)]
    pub guest_user: Option<ObjectId>,
    #[serde(rename = "deliveryMethod")]
    pub delivery_method: DeliveryMethod,
    #[serde(rename = "selectedStoreId")]
    pub selected_store_id: Option<String>,
    #[serde(rename = "collectorName")]
    pub collector_name: Option<String>,
    #[serde(rename = "collectorPhone")]
    pub collector_phone: Option<String>,
    pub full_name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ShippingAddress {
    /// Lines for invoices and emails.
    pub fn display_lines(&self) -> Vec<String> {
        match self.delivery_method {
            DeliveryMethod::Pickup => vec![
                format!(
                    "Pickup at store {}",
                    self.selected_store_id.as_deref().unwrap_or("-")
                ),
                format!(
                    "Collector: {} ({})",
                    self.collector_name.as_deref().unwrap_or("-"),
                    self.collector_phone.as_deref().unwrap_or("-")
                ),
            ],
            DeliveryMethod::Delivery => {
                let mut lines = vec![
                    self.full_name.clone().unwrap_or_default(),
                    self.address.clone().unwrap_or_default(),
                ];
                let city_line = [self.city.as_deref(), self.postal_code.as_deref()]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>()
                    .join(" ");
                lines.push(city_line);
                if let Some(country) = &self.country {
                    lines.push(country.clone());
                }
                lines.retain(|l| !l.is_empty());
                lines
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewShippingAddress {
    pub delivery_method: DeliveryMethod,
    pub selected_store_id: Option<String>,
    pub collector_name: Option<String>,
    pub collector_phone: Option<String>,
    pub full_name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

impl NewShippingAddress {
    /// Checks the fields required by the chosen delivery method.
    pub fn validate(&self) -> Result<(), String> {
        let required: Vec<(&str, &Option<String>)> = match self.delivery_method {
            DeliveryMethod::Pickup => vec![
                ("selectedStoreId", &self.selected_store_id),
                ("collectorName", &self.collector_name),
                ("collectorPhone", &self.collector_phone),
            ],
            DeliveryMethod::Delivery => vec![
                ("full_name", &self.full_name),
                ("address", &self.address),
                ("city", &self.city),
                ("country", &self.country),
            ],
        };

        let missing: Vec<&str> = required
            .into_iter()
            .filter(|(_, value)| value.as_deref().is_none_or(|v| v.trim().is_empty()))
            .map(|(name, _)| name)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(format!(
                "{} shipping address is missing {}",
                self.delivery_method.as_str(),
                missing.join(", ")
            ))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Initiated,
    Paid,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Initiated => "initiated",
            OrderStatus::Paid => "paid",
            OrderStatus::Failed => "failed",
        }
    }

    /// pending -> initiated -> {paid, failed}; nothing moves backwards.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Initiated)
                | (OrderStatus::Initiated, OrderStatus::Paid)
                | (OrderStatus::Initiated, OrderStatus::Failed)
        )
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, OrderStatus::Paid | OrderStatus::Failed)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "initiated" => Ok(OrderStatus::Initiated),
            "paid" => Ok(OrderStatus::Paid),
            "failed" => Ok(OrderStatus::Failed),
            other => Err(format!("unknown order status {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Order {
    #[schema(value_type = String)]
    pub id: OrderId,
    #[schema(value_type = Option<String>)]
    pub guest_user: Option<ObjectId>,
    #[schema(value_type = Option<String>)]
    pub shipping_address: Option<ObjectId>,
    pub payment_method: Option<String>,
    #[schema(value_type = String, example = "200.00")]
    pub total_price: Money,
    pub status: OrderStatus,
    #[serde(skip_serializing)]
    pub idempotency_key: Option<String>,
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderItem {
    #[schema(value_type = String)]
    pub id: ObjectId,
    #[schema(value_type = String)]
    pub order: OrderId,
    #[schema(value_type = Option<String>)]
    pub product: Option<ObjectId>,
    #[schema(value_type = u32)]
    pub quantity: Quantity,
    #[schema(value_type = String)]
    pub price: Money,
}

impl OrderItem {
    pub fn line_total(&self) -> Money {
        self.price.times(self.quantity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ParcelAction {
    Send,
    Receive,
}

impl ParcelAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParcelAction::Send => "send",
            ParcelAction::Receive => "receive",
        }
    }
}

impl FromStr for ParcelAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "send" => Ok(ParcelAction::Send),
            "receive" => Ok(ParcelAction::Receive),
            other => Err(format!("unknown parcel action {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CourierOrder {
    #[schema(value_type = String)]
    pub id: ObjectId,
    pub parcel_action: ParcelAction,
    pub from_address: Option<String>,
    pub to_address: Option<String>,
    pub selected_item: Option<String>,
    pub item_price: Option<i64>,
    pub delivery_fee: Option<i64>,
    pub total: Option<i64>,
    pub payment_method: Option<String>,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub notes: Option<String>,
    pub recipient_name: Option<String>,
    pub recipient_phone: Option<String>,
    pub delivery_location: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCourierOrder {
    pub parcel_action: ParcelAction,
    pub from_address: Option<String>,
    pub to_address: Option<String>,
    pub selected_item: Option<String>,
    pub item_price: Option<i64>,
    pub delivery_fee: Option<i64>,
    pub total: Option<i64>,
    pub payment_method: Option<String>,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub notes: Option<String>,
    pub recipient_name: Option<String>,
    pub recipient_phone: Option<String>,
    pub delivery_location: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub user_id: Option<ObjectId>,
    pub action: String,
    pub resource: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_moves_forward_only() {
        use OrderStatus::*;
        assert!(Pending.can_transition_to(Initiated));
        assert!(Initiated.can_transition_to(Paid));
        assert!(Initiated.can_transition_to(Failed));

        assert!(!Pending.can_transition_to(Paid));
        assert!(!Paid.can_transition_to(Initiated));
        assert!(!Failed.can_transition_to(Paid));
        assert!(!Initiated.can_transition_to(Pending));
    }

    #[test]
    fn delivery_address_requires_recipient_fields() {
        let address = NewShippingAddress {
            full_name: Some("Jane Doe".into()),
            address: Some("Moi Avenue 1".into()),
            city: Some("Nairobi".into()),
            ..Default::default()
        };
        let err = address.validate().unwrap_err();
        assert!(err.contains("country"), "{err}");
    }

    #[test]
    fn pickup_address_ignores_delivery_fields() {
        let address = NewShippingAddress {
            delivery_method: DeliveryMethod::Pickup,
            selected_store_id: Some("cbd-01".into()),
            collector_name: Some("John".into()),
            collector_phone: Some("0712345678".into()),
            ..Default::default()
        };
        assert!(address.validate().is_ok());
    }

    #[test]
    fn email_normalization_is_case_insensitive() {
        assert_eq!(normalize_email("  Jane@Example.COM "), "jane@example.com");
    }
}
