use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::{
    ids::OrderId,
    invoice::InvoiceError,
    order::OrderError,
    payment::PaymentError,
    response::{ApiResponse, Meta},
    store::StoreError,
};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not Found")]
    NotFound,

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    /// Order header is stored but not all of its items are.
    #[error("Order {order_id} was only partially saved")]
    PartialFailure {
        order_id: OrderId,
        #[source]
        source: StoreError,
    },

    #[error("Storage error")]
    Store(StoreError),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorData {
    error: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Payment(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            AppError::Payment(_) => StatusCode::BAD_GATEWAY,
            AppError::PartialFailure { .. } | AppError::Store(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AppError::Store(e) => error!(error = %e, "storage failure"),
            AppError::Internal(e) => error!(error = ?e, "internal failure"),
            AppError::PartialFailure { order_id, source } => {
                error!(%order_id, error = %source, "partial order write")
            }
            _ => {}
        }

        let message = self.to_string();
        let body = ApiResponse {
            message: message.clone(),
            data: Some(ErrorData { error: message }),
            meta: Some(Meta::empty()),
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(field) => AppError::Conflict(format!("{field} already exists")),
            other => AppError::Store(other),
        }
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::EmptyCart => AppError::BadRequest(err.to_string()),
            OrderError::ProductNotFound(_) => AppError::NotFound,
            OrderError::InvalidTransition { .. } => AppError::Conflict(err.to_string()),
            OrderError::Store(e) => e.into(),
        }
    }
}

impl From<InvoiceError> for AppError {
    fn from(err: InvoiceError) -> Self {
        AppError::Internal(err.into())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_errors_split_between_client_and_gateway() {
        assert_eq!(
            AppError::from(PaymentError::InvalidAmount("-5".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(PaymentError::GatewayTimeout).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::from(PaymentError::Provider {
                status: 500,
                body: "boom".into()
            })
            .to_string(),
            "Payment gateway rejected the request with status 500"
        );
    }

    #[test]
    fn unique_violations_become_conflicts() {
        let err = AppError::from(StoreError::Conflict("email"));
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn unknown_product_is_not_found() {
        let err = AppError::from(OrderError::ProductNotFound(crate::ids::ObjectId::new()));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
