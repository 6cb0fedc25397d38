use axum::Router;

use crate::state::AppState;

pub mod auth;
pub mod courier;
pub mod doc;
pub mod health;
pub mod orders;
pub mod payment;
pub mod products;

// Paths keep the storefront's trailing slashes, so routers are merged rather
// than nested. State is provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .merge(products::router())
        .merge(auth::router())
        .merge(orders::router())
        .merge(payment::router())
        .merge(courier::router())
}
