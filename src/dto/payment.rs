use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct InitiatePaymentRequest {
    /// Defaults to the phone on the caller's profile.
    pub phone: Option<String>,
    /// Decimal string or number. Defaults to the order total.
    #[schema(value_type = Option<String>, example = "200.00")]
    pub amount: Option<serde_json::Value>,
    #[serde(alias = "orderId")]
    pub order_id: Option<String>,
}

impl InitiatePaymentRequest {
    /// The amount as text, whether it was posted as a string or a number.
    pub fn amount_text(&self) -> Option<String> {
        match self.amount.as_ref()? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

/// Order id from the callback URL's query string.
///
/// The first `order_id` wins. A query that does not parse counts as no order
/// id, since the gateway must still get its acknowledgement.
pub fn callback_order_id(raw_query: Option<&str>) -> Option<String> {
    let raw = raw_query?;
    let url = reqwest::Url::parse(&format!("http://callback.invalid/?{raw}")).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "order_id")
        .map(|(_, value)| value.into_owned())
}

/// Acknowledgement returned to the callback sender.
///
/// Always `{"status": "success"}`, with the Daraja result keys alongside.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CallbackAck {
    #[schema(example = "success")]
    pub status: String,
    #[serde(rename = "ResultCode")]
    pub result_code: i32,
    #[serde(rename = "ResultDesc")]
    pub result_desc: String,
}

impl CallbackAck {
    pub fn accepted() -> Self {
        Self {
            status: "success".to_string(),
            result_code: 0,
            result_desc: "Accepted".to_string(),
        }
    }
}
