use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{error::AppError, ids::ObjectId, models::{NewCourierOrder, ParcelAction}};

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CreateCourierOrderRequest {
    pub parcel_action: Option<String>,
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

impl CreateCourierOrderRequest {
    pub fn into_new(self) -> Result<NewCourierOrder, AppError> {
        let parcel_action: ParcelAction = self
            .parcel_action
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .ok_or_else(|| AppError::BadRequest("parcel_action is required".into()))?
            .to_ascii_lowercase()
            .parse()
            .map_err(AppError::BadRequest)?;

        for (name, value) in [
            ("item_price", self.item_price),
            ("delivery_fee", self.delivery_fee),
            ("total", self.total),
        ] {
            if value.is_some_and(|v| v < 0) {
                return Err(AppError::BadRequest(format!("{name} must not be negative")));
            }
        }

        let total = self.total.or(match (self.item_price, self.delivery_fee) {
            (None, None) => None,
            (price, fee) => Some(price.unwrap_or(0) + fee.unwrap_or(0)),
        });

        Ok(NewCourierOrder {
            parcel_action,
            from_address: self.from_address,
            to_address: self.to_address,
            selected_item: self.selected_item,
            item_price: self.item_price,
            delivery_fee: self.delivery_fee,
            total,
            payment_method: self.payment_method,
            contact_name: self.contact_name,
            contact_phone: self.contact_phone,
            notes: self.notes,
            recipient_name: self.recipient_name,
            recipient_phone: self.recipient_phone,
            delivery_location: self.delivery_location,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CourierOrderCreated {
    #[schema(value_type = String)]
    pub id: ObjectId,
    pub message: String,
}
