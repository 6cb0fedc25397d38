//! Order aggregate: one order and its line items, held in memory.
//!
//! Nothing here writes anywhere. `OrderDraft::build` reads the catalog to
//! snapshot prices; the lifecycle manager in `services::order_service` decides
//! what to persist and in which order.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::{
    ids::{ObjectId, OrderId},
    models::{DELETED_PRODUCT, Order, OrderItem, OrderStatus, ShippingAddress},
    money::{Money, Quantity},
    store::{CatalogLookup, OrderRepository, StoreError},
};

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("product {0} not found")]
    ProductNotFound(ObjectId),

    #[error("cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartLine {
    pub product_id: ObjectId,
    pub quantity: Quantity,
}

/// Line item before it has a store id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftOrderItem {
    pub product: ObjectId,
    pub product_name: String,
    pub quantity: Quantity,
    pub unit_price: Money,
}

impl DraftOrderItem {
    pub fn line_total(&self) -> Money {
        self.unit_price.times(self.quantity)
    }
}

#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub order: Order,
    pub items: Vec<DraftOrderItem>,
    /// Sum of quantity x catalog price at build time.
    pub computed_total: Money,
    /// What the client said it would pay. Also stored as `order.total_price`.
    pub submitted_total: Money,
}

impl OrderDraft {
    /// Resolves every cart line against the catalog and snapshots its price.
    ///
    /// Per-item prices from the client are never consulted. The submitted total
    /// is kept as the charge amount; compare it with `computed_total` via
    /// `total_mismatch` before persisting.
    pub async fn build<C: CatalogLookup + ?Sized>(
        catalog: &C,
        lines: &[CartLine],
        guest_user: Option<ObjectId>,
        submitted_total: Money,
        payment_method: Option<String>,
    ) -> Result<Self, OrderError> {
        if lines.is_empty() {
            return Err(OrderError::EmptyCart);
        }

        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            let product = catalog
                .product(line.product_id)
                .await?
                .ok_or(OrderError::ProductNotFound(line.product_id))?;

            items.push(DraftOrderItem {
                product: product.id,
                product_name: product.name,
                quantity: line.quantity,
                unit_price: product.price,
            });
        }

        let order = Order {
            id: OrderId::new_random(),
            guest_user,
            shipping_address: None,
            payment_method,
            total_price: submitted_total,
            status: OrderStatus::Pending,
            idempotency_key: None,
            payment_reference: None,
            created_at: Utc::now(),
        };

        let mut draft = Self {
            order,
            items,
            computed_total: Money::zero(),
            submitted_total,
        };
        draft.computed_total = draft.recompute_total();
        Ok(draft)
    }

    pub fn attach_shipping_address(&mut self, id: ObjectId) {
        self.order.shipping_address = Some(id);
    }

    pub fn set_idempotency_key(&mut self, key: Option<String>) {
        self.order.idempotency_key = key;
    }

    pub fn total_item_count(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.quantity.get())).sum()
    }

    pub fn recompute_total(&self) -> Money {
        self.items.iter().map(DraftOrderItem::line_total).sum()
    }

    /// True when the submitted total is further than `tolerance` from the
    /// catalog total.
    pub fn total_mismatch(&self, tolerance: Decimal) -> bool {
        self.submitted_total.distance(self.computed_total) > tolerance
    }
}

impl Order {
    pub fn transition(&mut self, next: OrderStatus) -> Result<(), OrderError> {
        if !self.status.can_transition_to(next) {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

/// Order item as shown to readers, with the product name resolved.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderItemView {
    #[schema(value_type = String)]
    pub id: ObjectId,
    #[schema(value_type = Option<String>)]
    pub product: Option<ObjectId>,
    pub product_name: String,
    #[schema(value_type = u32)]
    pub quantity: Quantity,
    #[schema(value_type = String)]
    pub price: Money,
    #[schema(value_type = String)]
    pub line_total: Money,
}

/// Read model of a stored order: header, items and shipping address.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderSnapshot {
    pub order: Order,
    pub items: Vec<OrderItemView>,
    pub shipping_address: Option<ShippingAddress>,
    pub item_count: u64,
    /// Sum of the stored item lines; may differ from `order.total_price`.
    #[schema(value_type = String)]
    pub computed_total: Money,
}

impl OrderSnapshot {
    pub async fn load<S>(store: &S, id: OrderId) -> Result<Option<Self>, StoreError>
    where
        S: OrderRepository + CatalogLookup + ?Sized,
    {
        let Some(order) = store.order(id).await? else {
            return Ok(None);
        };

        let stored = store.order_items(id).await?;
        let mut items = Vec::with_capacity(stored.len());
        for item in stored {
            let product_name = match item.product {
                Some(product_id) => store.product(product_id).await?.map(|p| p.name),
                None => None,
            };
            items.push(OrderItemView::new(item, product_name));
        }

        let shipping_address = match order.shipping_address {
            Some(address_id) => store.shipping_address(address_id).await?,
            None => None,
        };

        Ok(Some(Self::assemble(order, items, shipping_address)))
    }

    pub fn assemble(
        order: Order,
        items: Vec<OrderItemView>,
        shipping_address: Option<ShippingAddress>,
    ) -> Self {
        let item_count = items.iter().map(|i| u64::from(i.quantity.get())).sum();
        let computed_total = items.iter().map(|i| i.line_total).sum();
        Self {
            order,
            items,
            shipping_address,
            item_count,
            computed_total,
        }
    }
}

impl OrderItemView {
    pub fn new(item: OrderItem, product_name: Option<String>) -> Self {
        Self {
            line_total: item.line_total(),
            id: item.id,
            product: item.product,
            product_name: product_name.unwrap_or_else(|| DELETED_PRODUCT.to_string()),
            quantity: item.quantity,
            price: item.price,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::Product, store::MemoryStore};

    fn money(raw: &str) -> Money {
        raw.parse().unwrap()
    }

    async fn catalog_with(prices: &[&str]) -> (MemoryStore, Vec<Product>) {
        let store = MemoryStore::default();
        let category = store.add_category("Phones");
        let products = prices
            .iter()
            .enumerate()
            .map(|(i, p)| store.add_product(&format!("Product {i}"), money(p), category.id))
            .collect();
        (store, products)
    }

    #[tokio::test]
    async fn build_snapshots_catalog_prices() {
        let (store, products) = catalog_with(&["100.00"]).await;
        let lines = [CartLine {
            product_id: products[0].id,
            quantity: Quantity::new(2).unwrap(),
        }];

        let draft = OrderDraft::build(&store, &lines, None, money("200.00"), None)
            .await
            .unwrap();

        assert_eq!(draft.items.len(), 1);
        assert_eq!(draft.items[0].unit_price, money("100.00"));
        assert_eq!(draft.items[0].quantity.get(), 2);
        assert_eq!(draft.computed_total, money("200.00"));
        assert_eq!(draft.order.status, OrderStatus::Pending);
        assert_eq!(draft.order.total_price, money("200.00"));
        assert!(!draft.total_mismatch(Decimal::new(1, 2)));
    }

    #[tokio::test]
    async fn computed_total_ignores_submitted_total() {
        let (store, products) = catalog_with(&["19.99", "5.50"]).await;
        let lines = [
            CartLine {
                product_id: products[0].id,
                quantity: Quantity::new(3).unwrap(),
            },
            CartLine {
                product_id: products[1].id,
                quantity: Quantity::new(1).unwrap(),
            },
        ];

        let draft = OrderDraft::build(&store, &lines, None, money("1.00"), None)
            .await
            .unwrap();

        assert_eq!(draft.computed_total, money("65.47"));
        assert_eq!(draft.total_item_count(), 4);
        assert_eq!(draft.recompute_total(), draft.computed_total);
        assert!(draft.total_mismatch(Decimal::new(1, 2)));
    }

    #[tokio::test]
    async fn unknown_product_fails_build() {
        let (store, _) = catalog_with(&[]).await;
        let missing = ObjectId::new();
        let lines = [CartLine {
            product_id: missing,
            quantity: Quantity::default(),
        }];

        let err = OrderDraft::build(&store, &lines, None, money("1"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::ProductNotFound(id) if id == missing));
    }

    #[tokio::test]
    async fn empty_cart_is_rejected() {
        let (store, _) = catalog_with(&[]).await;
        let err = OrderDraft::build(&store, &[], None, money("0"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::EmptyCart));
    }

    #[tokio::test]
    async fn transition_rejects_skipping_initiated() {
        let (store, products) = catalog_with(&["10"]).await;
        let lines = [CartLine {
            product_id: products[0].id,
            quantity: Quantity::default(),
        }];
        let mut order = OrderDraft::build(&store, &lines, None, money("10"), None)
            .await
            .unwrap()
            .order;

        assert!(order.transition(OrderStatus::Paid).is_err());
        order.transition(OrderStatus::Initiated).unwrap();
        order.transition(OrderStatus::Paid).unwrap();
        assert!(order.transition(OrderStatus::Failed).is_err());
        assert_eq!(order.status, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn snapshot_falls_back_for_deleted_products() {
        let (store, products) = catalog_with(&["19.99", "5.50"]).await;
        let lines = [
            CartLine {
                product_id: products[0].id,
                quantity: Quantity::new(3).unwrap(),
            },
            CartLine {
                product_id: products[1].id,
                quantity: Quantity::default(),
            },
        ];
        let draft = OrderDraft::build(&store, &lines, None, money("65.47"), None)
            .await
            .unwrap();
        store.insert_order(&draft.order).await.unwrap();
        store
            .insert_order_items(draft.order.id, &draft.items)
            .await
            .unwrap();
        store.remove_product(products[1].id);

        let snapshot = OrderSnapshot::load(&store, draft.order.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.items.len(), 2);
        assert_eq!(snapshot.item_count, 4);
        assert_eq!(snapshot.computed_total, money("65.47"));
        let names: Vec<_> = snapshot.items.iter().map(|i| i.product_name.as_str()).collect();
        assert!(names.contains(&"Product 0"));
        assert!(names.contains(&DELETED_PRODUCT));
    }

    #[tokio::test]
    async fn snapshot_of_unknown_order_is_none() {
        let store = MemoryStore::default();
        let missing = OrderSnapshot::load(&store, OrderId::new_random()).await.unwrap();
        assert!(missing.is_none());
    }
}
