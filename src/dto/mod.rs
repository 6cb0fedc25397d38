pub mod auth;
pub mod catalog;
pub mod courier;
pub mod orders;
pub mod payment;
