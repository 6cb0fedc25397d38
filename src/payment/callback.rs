use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("callback body is not valid JSON: {0}")]
pub struct CallbackError(#[from] serde_json::Error);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    Paid,
    Failed,
}

/// The parts of a Daraja `stkCallback` the order flow acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StkResult {
    pub merchant_request_id: Option<String>,
    pub checkout_request_id: Option<String>,
    pub result_code: i64,
    pub result_desc: String,
    pub receipt_number: Option<String>,
}

impl StkResult {
    pub fn outcome(&self) -> PaymentOutcome {
        if self.result_code == 0 {
            PaymentOutcome::Paid
        } else {
            PaymentOutcome::Failed
        }
    }
}

/// A callback body that parsed as JSON. `result` is `None` when it does not
/// have the `Body.stkCallback` shape; such bodies are still acknowledged.
#[derive(Debug, Clone)]
pub struct CallbackEnvelope {
    pub raw: Value,
    pub result: Option<StkResult>,
}

#[derive(Deserialize)]
struct WireEnvelope {
    #[serde(rename = "Body")]
    body: WireBody,
}

#[derive(Deserialize)]
struct WireBody {
    #[serde(rename = "stkCallback")]
    stk_callback: RawStkCallback,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawStkCallback {
    #[serde(rename = "MerchantRequestID")]
    merchant_request_id: Option<String>,
    #[serde(rename = "CheckoutRequestID")]
    checkout_request_id: Option<String>,
    result_code: i64,
    #[serde(default)]
    result_desc: String,
    callback_metadata: Option<RawMetadata>,
}

#[derive(Deserialize)]
struct RawMetadata {
    #[serde(rename = "Item", default)]
    items: Vec<RawMetadataItem>,
}

#[derive(Deserialize)]
struct RawMetadataItem {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Value", default)]
    value: Option<Value>,
}

pub fn parse_callback(body: &[u8]) -> Result<CallbackEnvelope, CallbackError> {
    let raw: Value = serde_json::from_slice(body)?;
    let result = serde_json::from_value::<WireEnvelope>(raw.clone())
        .ok()
        .map(|envelope| {
            let stk = envelope.body.stk_callback;
            let receipt_number = stk
                .callback_metadata
                .into_iter()
                .flat_map(|m| m.items)
                .find(|item| item.name == "MpesaReceiptNumber")
                .and_then(|item| item.value)
                .and_then(|v| match v {
                    Value::String(s) => Some(s),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                });

            StkResult {
                merchant_request_id: stk.merchant_request_id,
                checkout_request_id: stk.checkout_request_id,
                result_code: stk.result_code,
                result_desc: stk.result_desc,
                receipt_number,
            }
        });

    Ok(CallbackEnvelope { raw, result })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successful_callback_yields_receipt() {
        let body = br#"{"Body":{"stkCallback":{
            "MerchantRequestID":"29115-34620561-1",
            "CheckoutRequestID":"ws_CO_191220191020363925",
            "ResultCode":0,
            "ResultDesc":"The service request is processed successfully.",
            "CallbackMetadata":{"Item":[
                {"Name":"Amount","Value":1.00},
                {"Name":"MpesaReceiptNumber","Value":"NLJ7RT61SV"},
                {"Name":"PhoneNumber","Value":254708374149}
            ]}}}}"#;

        let parsed = parse_callback(body).unwrap();
        let result = parsed.result.unwrap();
        assert_eq!(result.outcome(), PaymentOutcome::Paid);
        assert_eq!(result.receipt_number.as_deref(), Some("NLJ7RT61SV"));
        assert_eq!(
            result.checkout_request_id.as_deref(),
            Some("ws_CO_191220191020363925")
        );
    }

    #[test]
    fn cancelled_push_is_a_failure() {
        let body = br#"{"Body":{"stkCallback":{"MerchantRequestID":"1","CheckoutRequestID":"ws_CO_2",
            "ResultCode":1032,"ResultDesc":"Request cancelled by user"}}}"#;
        let result = parse_callback(body).unwrap().result.unwrap();
        assert_eq!(result.outcome(), PaymentOutcome::Failed);
        assert!(result.receipt_number.is_none());
    }

    #[test]
    fn unknown_json_shape_is_accepted_without_result() {
        let parsed = parse_callback(br#"{"hello":"world"}"#).unwrap();
        assert!(parsed.result.is_none());
        assert_eq!(parsed.raw["hello"], "world");
    }

    #[test]
    fn malformed_body_is_rejected() {
        assert!(parse_callback(b"{not json").is_err());
        assert!(parse_callback(b"").is_err());
    }
}
