use thiserror::Error;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Amount must be a positive number, got {0:?}")]
    InvalidAmount(String),

    #[error("Phone number must be in format +2547XXXXXXXX, got {0:?}")]
    InvalidPhone(String),

    #[error("Payment gateway authentication failed: {0}")]
    GatewayAuth(String),

    #[error("Payment gateway timed out")]
    GatewayTimeout,

    #[error("Payment gateway rejected the request with status {status}")]
    Provider { status: u16, body: String },

    #[error("Payment gateway unreachable: {0}")]
    Network(reqwest::Error),

    #[error("Unexpected payment gateway response: {0}")]
    InvalidResponse(String),

    #[error("Invalid callback url: {0}")]
    InvalidCallbackUrl(String),
}

impl PaymentError {
    /// Whether a caller may retry the same request. Nothing in this crate
    /// retries automatically.
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::GatewayTimeout | PaymentError::Network(_) => true,
            PaymentError::Provider { status, .. } => *status >= 500,
            PaymentError::InvalidAmount(_)
            | PaymentError::InvalidPhone(_)
            | PaymentError::GatewayAuth(_)
            | PaymentError::InvalidResponse(_)
            | PaymentError::InvalidCallbackUrl(_) => false,
        }
    }

    /// Validation failures caught before anything was sent.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PaymentError::InvalidAmount(_) | PaymentError::InvalidPhone(_)
        )
    }

    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PaymentError::GatewayTimeout
        } else {
            PaymentError::Network(err)
        }
    }
}
