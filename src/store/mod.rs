//! Persistence seams.
//!
//! The order flow writes one document per call (address, order header, then
//! each item) and never wraps them in a multi-statement transaction, so a
//! failure part way through leaves the earlier writes in place. Callers decide
//! how to surface that.

use async_trait::async_trait;
use thiserror::Error;

use crate::{
    ids::{ObjectId, OrderId},
    models::{
        AuditEntry, Category, CourierOrder, GuestUser, HireItem, NewCourierOrder, NewGuestUser,
        NewShippingAddress, Order, OrderItem, OrderStatus, Product, ShippingAddress,
    },
    order::DraftOrderItem,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate value for unique field `{0}`")]
    Conflict(&'static str),

    #[error("stored record is malformed: {0}")]
    Corrupt(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Orm(#[from] sea_orm::DbErr),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Read-only access to the catalog.
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    async fn product(&self, id: ObjectId) -> StoreResult<Option<Product>>;

    async fn products(&self, category_slug: Option<&str>) -> StoreResult<Vec<Product>>;

    async fn categories(&self) -> StoreResult<Vec<Category>>;

    async fn hire_items(&self) -> StoreResult<Vec<HireItem>>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn insert_shipping_address(
        &self,
        address: NewShippingAddress,
        owner: Option<ObjectId>,
    ) -> StoreResult<ShippingAddress>;

    async fn shipping_address(&self, id: ObjectId) -> StoreResult<Option<ShippingAddress>>;

    /// Fails with `StoreError::Conflict("idempotency_key")` when the key is taken.
    async fn insert_order(&self, order: &Order) -> StoreResult<()>;

    /// Items are written one by one in slice order.
    async fn insert_order_items(
        &self,
        order_id: OrderId,
        items: &[DraftOrderItem],
    ) -> StoreResult<Vec<OrderItem>>;

    async fn order(&self, id: OrderId) -> StoreResult<Option<Order>>;

    async fn order_by_idempotency_key(&self, key: &str) -> StoreResult<Option<Order>>;

    async fn order_items(&self, order_id: OrderId) -> StoreResult<Vec<OrderItem>>;

    /// Compare-and-set on status. Returns false when the stored status was not
    /// `expected` (someone else moved it first, or the order is gone).
    async fn update_order_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
        payment_reference: Option<&str>,
    ) -> StoreResult<bool>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `StoreError::Conflict("email")` for an existing email.
    async fn insert_guest_user(&self, user: NewGuestUser) -> StoreResult<GuestUser>;

    async fn guest_user(&self, id: ObjectId) -> StoreResult<Option<GuestUser>>;

    async fn guest_user_by_email(&self, email: &str) -> StoreResult<Option<GuestUser>>;
}

#[async_trait]
pub trait CourierRepository: Send + Sync {
    async fn insert_courier_order(&self, order: NewCourierOrder) -> StoreResult<CourierOrder>;
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append_audit(&self, entry: AuditEntry) -> StoreResult<()>;
}

/// Everything the HTTP layer needs from persistence.
pub trait Store:
    CatalogLookup + OrderRepository + UserRepository + CourierRepository + AuditSink
{
}

impl<T> Store for T where
    T: CatalogLookup + OrderRepository + UserRepository + CourierRepository + AuditSink
{
}
