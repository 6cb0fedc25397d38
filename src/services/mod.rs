pub mod auth_service;
pub mod catalog_service;
pub mod courier_service;
pub mod order_service;
pub mod payment_service;
