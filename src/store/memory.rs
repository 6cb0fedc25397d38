use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use super::{
    AuditSink, CatalogLookup, CourierRepository, OrderRepository, StoreError, StoreResult,
    UserRepository,
};
use crate::{
    ids::{ObjectId, OrderId},
    models::{
        AuditEntry, Category, CourierOrder, GuestUser, HireItem, NewCourierOrder, NewGuestUser,
        NewShippingAddress, Order, OrderItem, OrderStatus, Product, ShippingAddress,
    },
    money::Money,
    order::DraftOrderItem,
};

/// In-process store. Backs `STORE_BACKEND=memory` and the test suites.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    fail_item_writes: AtomicBool,
}

#[derive(Default)]
struct Inner {
    categories: Vec<Category>,
    products: Vec<Product>,
    hire_items: Vec<HireItem>,
    users: Vec<GuestUser>,
    addresses: HashMap<ObjectId, ShippingAddress>,
    orders: HashMap<OrderId, Order>,
    order_items: Vec<OrderItem>,
    courier_orders: Vec<CourierOrder>,
    audit: Vec<AuditEntry>,
}

impl MemoryStore {
    pub fn add_category(&self, name: &str) -> Category {
        let category = Category {
            id: ObjectId::new(),
            name: name.to_string(),
            slug: slugify(name),
        };
        self.inner.write().categories.push(category.clone());
        category
    }

    pub fn add_product(&self, name: &str, price: Money, category: ObjectId) -> Product {
        let product = Product {
            id: ObjectId::new(),
            name: name.to_string(),
            price,
            image: None,
            category,
            description: String::new(),
        };
        self.inner.write().products.push(product.clone());
        product
    }

    pub fn add_hire_item(&self, name: &str, per_hour: Money, per_day: Money) -> HireItem {
        let item = HireItem {
            id: ObjectId::new(),
            name: name.to_string(),
            image: None,
            details: String::new(),
            hire_price_per_hour: per_hour,
            hire_price_per_day: per_day,
        };
        self.inner.write().hire_items.push(item.clone());
        item
    }

    pub fn set_product_price(&self, id: ObjectId, price: Money) {
        if let Some(p) = self.inner.write().products.iter_mut().find(|p| p.id == id) {
            p.price = price;
        }
    }

    /// Deleting a product nulls the reference on order items, as the schema does.
    pub fn remove_product(&self, id: ObjectId) {
        let mut inner = self.inner.write();
        inner.products.retain(|p| p.id != id);
        for item in inner.order_items.iter_mut().filter(|i| i.product == Some(id)) {
            item.product = None;
        }
    }

    /// Makes every following order item write fail, to exercise partial writes.
    pub fn fail_order_item_writes(&self, fail: bool) {
        self.fail_item_writes.store(fail, Ordering::SeqCst);
    }

    pub fn order_count(&self) -> usize {
        self.inner.read().orders.len()
    }

    pub fn shipping_address_count(&self) -> usize {
        self.inner.read().addresses.len()
    }

    pub fn courier_order_count(&self) -> usize {
        self.inner.read().courier_orders.len()
    }

    pub fn audit_actions(&self) -> Vec<String> {
        self.inner.read().audit.iter().map(|e| e.action.clone()).collect()
    }
}

pub(crate) fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for ch in name.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

#[async_trait]
impl CatalogLookup for MemoryStore {
    async fn product(&self, id: ObjectId) -> StoreResult<Option<Product>> {
        Ok(self.inner.read().products.iter().find(|p| p.id == id).cloned())
    }

    async fn products(&self, category_slug: Option<&str>) -> StoreResult<Vec<Product>> {
        let inner = self.inner.read();
        let category = match category_slug {
            Some(slug) => match inner.categories.iter().find(|c| c.slug == slug) {
                Some(c) => Some(c.id),
                None => return Ok(Vec::new()),
            },
            None => None,
        };

        let mut products: Vec<Product> = inner
            .products
            .iter()
            .filter(|p| category.is_none_or(|c| p.category == c))
            .cloned()
            .collect();
        products.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(products)
    }

    async fn categories(&self) -> StoreResult<Vec<Category>> {
        Ok(self.inner.read().categories.clone())
    }

    async fn hire_items(&self) -> StoreResult<Vec<HireItem>> {
        let mut items = self.inner.read().hire_items.clone();
        items.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(items)
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn insert_shipping_address(
        &self,
        address: NewShippingAddress,
        owner: Option<ObjectId>,
    ) -> StoreResult<ShippingAddress> {
        let record = ShippingAddress {
            id: ObjectId::new(),
            guest_user: owner,
            delivery_method: address.delivery_method,
            selected_store_id: address.selected_store_id,
            collector_name: address.collector_name,
            collector_phone: address.collector_phone,
            full_name: address.full_name,
            address: address.address,
            city: address.city,
            postal_code: address.postal_code,
            country: address.country,
            created_at: Utc::now(),
        };
        self.inner.write().addresses.insert(record.id, record.clone());
        Ok(record)
    }

    async fn shipping_address(&self, id: ObjectId) -> StoreResult<Option<ShippingAddress>> {
        Ok(self.inner.read().addresses.get(&id).cloned())
    }

    async fn insert_order(&self, order: &Order) -> StoreResult<()> {
        let mut inner = self.inner.write();
        if let Some(key) = &order.idempotency_key
            && inner
                .orders
                .values()
                .any(|o| o.idempotency_key.as_ref() == Some(key))
        {
            return Err(StoreError::Conflict("idempotency_key"));
        }
        inner.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn insert_order_items(
        &self,
        order_id: OrderId,
        items: &[DraftOrderItem],
    ) -> StoreResult<Vec<OrderItem>> {
        let mut written = Vec::with_capacity(items.len());
        for item in items {
            if self.fail_item_writes.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("order item write rejected".into()));
            }
            let record = OrderItem {
                id: ObjectId::new(),
                order: order_id,
                product: Some(item.product),
                quantity: item.quantity,
                price: item.unit_price,
            };
            self.inner.write().order_items.push(record.clone());
            written.push(record);
        }
        Ok(written)
    }

    async fn order(&self, id: OrderId) -> StoreResult<Option<Order>> {
        Ok(self.inner.read().orders.get(&id).cloned())
    }

    async fn order_by_idempotency_key(&self, key: &str) -> StoreResult<Option<Order>> {
        Ok(self
            .inner
            .read()
            .orders
            .values()
            .find(|o| o.idempotency_key.as_deref() == Some(key))
            .cloned())
    }

    async fn order_items(&self, order_id: OrderId) -> StoreResult<Vec<OrderItem>> {
        Ok(self
            .inner
            .read()
            .order_items
            .iter()
            .filter(|i| i.order == order_id)
            .cloned()
            .collect())
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
        payment_reference: Option<&str>,
    ) -> StoreResult<bool> {
        let mut inner = self.inner.write();
        match inner.orders.get_mut(&id) {
            Some(order) if order.status == expected => {
                order.status = next;
                if let Some(reference) = payment_reference {
                    order.payment_reference = Some(reference.to_string());
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn insert_guest_user(&self, user: NewGuestUser) -> StoreResult<GuestUser> {
        let mut inner = self.inner.write();
        if inner.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict("email"));
        }
        let record = GuestUser {
            id: ObjectId::new(),
            email: user.email,
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            phone: user.phone,
            subscribed: user.subscribed,
            is_active: true,
            created_at: Utc::now(),
        };
        inner.users.push(record.clone());
        Ok(record)
    }

    async fn guest_user(&self, id: ObjectId) -> StoreResult<Option<GuestUser>> {
        Ok(self.inner.read().users.iter().find(|u| u.id == id).cloned())
    }

    async fn guest_user_by_email(&self, email: &str) -> StoreResult<Option<GuestUser>> {
        Ok(self
            .inner
            .read()
            .users
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }
}

#[async_trait]
impl CourierRepository for MemoryStore {
    async fn insert_courier_order(&self, order: NewCourierOrder) -> StoreResult<CourierOrder> {
        let record = CourierOrder {
            id: ObjectId::new(),
            parcel_action: order.parcel_action,
            from_address: order.from_address,
            to_address: order.to_address,
            selected_item: order.selected_item,
            item_price: order.item_price,
            delivery_fee: order.delivery_fee,
            total: order.total,
            payment_method: order.payment_method,
            contact_name: order.contact_name,
            contact_phone: order.contact_phone,
            notes: order.notes,
            recipient_name: order.recipient_name,
            recipient_phone: order.recipient_phone,
            delivery_location: order.delivery_location,
            created_at: Utc::now(),
        };
        self.inner.write().courier_orders.push(record.clone());
        Ok(record)
    }
}

#[async_trait]
impl AuditSink for MemoryStore {
    async fn append_audit(&self, entry: AuditEntry) -> StoreResult<()> {
        self.inner.write().audit.push(entry);
        Ok(())
    }
}
