//! M-Pesa payment gateway.

pub mod callback;
pub mod client;
pub mod error;
pub mod phone;
pub mod token;

pub use callback::{CallbackEnvelope, PaymentOutcome, StkResult, parse_callback};
pub use client::{MpesaClient, PaymentHandle, PaymentMetadata};
pub use error::PaymentError;
