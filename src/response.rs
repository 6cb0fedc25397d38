//! The `{message, data, meta}` envelope every JSON endpoint answers with,
//! except the gateway callback ack.

use serde::Serialize;
use utoipa::ToSchema;

/// Listing details. Catalog lists are returned whole, so only a count is kept.
#[derive(Debug, Default, Serialize, ToSchema, Clone, PartialEq, Eq)]
pub struct Meta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

impl Meta {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn counted(total: usize) -> Self {
        Self {
            total: Some(total as u64),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub message: String,
    pub data: Option<T>,
    pub meta: Option<Meta>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T, meta: Option<Meta>) -> Self {
        Self {
            message: message.into(),
            data: Some(data),
            meta,
        }
    }
}
