use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set, SqlErr, sea_query::Expr,
};

use super::{
    AuditSink, CatalogLookup, CourierRepository, OrderRepository, StoreError, StoreResult,
    UserRepository,
};
use crate::{
    entity::{
        audit_logs, categories, courier_orders, guest_users, hire_items, order_items, orders,
        products, shipping_addresses, AuditLogs, Categories, GuestUsers, HireItems, OrderItems,
        Orders, Products, ShippingAddresses,
    },
    ids::{ObjectId, OrderId},
    models::{
        AuditEntry, Category, CourierOrder, GuestUser, HireItem, NewCourierOrder, NewGuestUser,
        NewShippingAddress, Order, OrderItem, OrderStatus, Product, ShippingAddress,
    },
    money::{Money, Quantity},
    order::DraftOrderItem,
};

/// PostgreSQL-backed store built on SeaORM entities.
///
/// Each trait call issues its own statements; nothing here opens a
/// transaction spanning several calls.
#[derive(Clone)]
pub struct PgStore {
    orm: DatabaseConnection,
}

impl PgStore {
    pub fn new(orm: DatabaseConnection) -> Self {
        Self { orm }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.orm
    }
}

fn conflict_or(err: DbErr, field: &'static str) -> StoreError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => StoreError::Conflict(field),
        _ => StoreError::Orm(err),
    }
}

fn object_id(raw: &str) -> StoreResult<ObjectId> {
    ObjectId::parse(raw).map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn optional_object_id(raw: Option<&str>) -> StoreResult<Option<ObjectId>> {
    raw.map(object_id).transpose()
}

fn money(value: sea_orm::prelude::Decimal) -> StoreResult<Money> {
    Money::new(value).map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn category_from_entity(model: categories::Model) -> StoreResult<Category> {
    Ok(Category {
        id: object_id(&model.id)?,
        name: model.name,
        slug: model.slug,
    })
}

fn product_from_entity(model: products::Model) -> StoreResult<Product> {
    Ok(Product {
        id: object_id(&model.id)?,
        name: model.name,
        price: money(model.price)?,
        image: model.image,
        category: object_id(&model.category_id)?,
        description: model.description,
    })
}

fn hire_item_from_entity(model: hire_items::Model) -> StoreResult<HireItem> {
    Ok(HireItem {
        id: object_id(&model.id)?,
        name: model.name,
        image: model.image,
        details: model.details,
        hire_price_per_hour: money(model.hire_price_per_hour)?,
        hire_price_per_day: money(model.hire_price_per_day)?,
    })
}

fn guest_user_from_entity(model: guest_users::Model) -> StoreResult<GuestUser> {
    Ok(GuestUser {
        id: object_id(&model.id)?,
        email: model.email,
        password_hash: model.password_hash,
        first_name: model.first_name,
        last_name: model.last_name,
        phone: model.phone,
        subscribed: model.subscribed,
        is_active: model.is_active,
        created_at: model.created_at.with_timezone(&Utc),
    })
}

fn shipping_address_from_entity(model: shipping_addresses::Model) -> StoreResult<ShippingAddress> {
    Ok(ShippingAddress {
        id: object_id(&model.id)?,
        guest_user: optional_object_id(model.guest_user_id.as_deref())?,
        delivery_method: model.delivery_method.parse().map_err(StoreError::Corrupt)?,
        selected_store_id: model.selected_store_id,
        collector_name: model.collector_name,
        collector_phone: model.collector_phone,
        full_name: model.full_name,
        address: model.address,
        city: model.city,
        postal_code: model.postal_code,
        country: model.country,
        created_at: model.created_at.with_timezone(&Utc),
    })
}

fn order_from_entity(model: orders::Model) -> StoreResult<Order> {
    Ok(Order {
        id: OrderId::from(model.id),
        guest_user: optional_object_id(model.guest_user_id.as_deref())?,
        shipping_address: optional_object_id(model.shipping_address_id.as_deref())?,
        payment_method: model.payment_method,
        total_price: money(model.total_price)?,
        status: model.status.parse().map_err(StoreError::Corrupt)?,
        idempotency_key: model.idempotency_key,
        payment_reference: model.payment_reference,
        created_at: model.created_at.with_timezone(&Utc),
    })
}

fn order_item_from_entity(model: order_items::Model) -> StoreResult<OrderItem> {
    Ok(OrderItem {
        id: object_id(&model.id)?,
        order: OrderId::from(model.order_id),
        product: optional_object_id(model.product_id.as_deref())?,
        quantity: Quantity::new(i64::from(model.quantity))
            .map_err(|e| StoreError::Corrupt(e.to_string()))?,
        price: money(model.price)?,
    })
}

fn courier_order_from_entity(model: courier_orders::Model) -> StoreResult<CourierOrder> {
    Ok(CourierOrder {
        id: object_id(&model.id)?,
        parcel_action: model.parcel_action.parse().map_err(StoreError::Corrupt)?,
        from_address: model.from_address,
        to_address: model.to_address,
        selected_item: model.selected_item,
        item_price: model.item_price,
        delivery_fee: model.delivery_fee,
        total: model.total,
        payment_method: model.payment_method,
        contact_name: model.contact_name,
        contact_phone: model.contact_phone,
        notes: model.notes,
        recipient_name: model.recipient_name,
        recipient_phone: model.recipient_phone,
        delivery_location: model.delivery_location,
        created_at: model.created_at.with_timezone(&Utc),
    })
}

#[async_trait]
impl CatalogLookup for PgStore {
    async fn product(&self, id: ObjectId) -> StoreResult<Option<Product>> {
        Products::find_by_id(id.to_string())
            .one(&self.orm)
            .await?
            .map(product_from_entity)
            .transpose()
    }

    async fn products(&self, category_slug: Option<&str>) -> StoreResult<Vec<Product>> {
        let mut finder = Products::find().order_by_desc(products::Column::Id);
        if let Some(slug) = category_slug {
            let category = Categories::find()
                .filter(categories::Column::Slug.eq(slug))
                .one(&self.orm)
                .await?;
            let Some(category) = category else {
                return Ok(Vec::new());
            };
            finder = finder.filter(products::Column::CategoryId.eq(category.id));
        }

        finder
            .all(&self.orm)
            .await?
            .into_iter()
            .map(product_from_entity)
            .collect()
    }

    async fn categories(&self) -> StoreResult<Vec<Category>> {
        Categories::find()
            .order_by_asc(categories::Column::Name)
            .all(&self.orm)
            .await?
            .into_iter()
            .map(category_from_entity)
            .collect()
    }

    async fn hire_items(&self) -> StoreResult<Vec<HireItem>> {
        HireItems::find()
            .order_by_desc(hire_items::Column::Id)
            .all(&self.orm)
            .await?
            .into_iter()
            .map(hire_item_from_entity)
            .collect()
    }
}

#[async_trait]
impl OrderRepository for PgStore {
    async fn insert_shipping_address(
        &self,
        address: NewShippingAddress,
        owner: Option<ObjectId>,
    ) -> StoreResult<ShippingAddress> {
        let model = shipping_addresses::ActiveModel {
            id: Set(ObjectId::new().to_string()),
            guest_user_id: Set(owner.map(|id| id.to_string())),
            delivery_method: Set(address.delivery_method.as_str().to_string()),
            selected_store_id: Set(address.selected_store_id),
            collector_name: Set(address.collector_name),
            collector_phone: Set(address.collector_phone),
            full_name: Set(address.full_name),
            address: Set(address.address),
            city: Set(address.city),
            postal_code: Set(address.postal_code),
            country: Set(address.country),
            created_at: Set(Utc::now().into()),
        }
        .insert(&self.orm)
        .await?;

        shipping_address_from_entity(model)
    }

    async fn shipping_address(&self, id: ObjectId) -> StoreResult<Option<ShippingAddress>> {
        ShippingAddresses::find_by_id(id.to_string())
            .one(&self.orm)
            .await?
            .map(shipping_address_from_entity)
            .transpose()
    }

    async fn insert_order(&self, order: &Order) -> StoreResult<()> {
        orders::ActiveModel {
            id: Set(order.id.as_uuid()),
            guest_user_id: Set(order.guest_user.map(|id| id.to_string())),
            shipping_address_id: Set(order.shipping_address.map(|id| id.to_string())),
            payment_method: Set(order.payment_method.clone()),
            total_price: Set(order.total_price.amount()),
            status: Set(order.status.as_str().to_string()),
            idempotency_key: Set(order.idempotency_key.clone()),
            payment_reference: Set(order.payment_reference.clone()),
            created_at: Set(order.created_at.into()),
        }
        .insert(&self.orm)
        .await
        .map_err(|e| conflict_or(e, "idempotency_key"))?;

        Ok(())
    }

    async fn insert_order_items(
        &self,
        order_id: OrderId,
        items: &[DraftOrderItem],
    ) -> StoreResult<Vec<OrderItem>> {
        let mut written = Vec::with_capacity(items.len());
        for item in items {
            let quantity = i32::try_from(item.quantity.get())
                .map_err(|_| StoreError::Corrupt("quantity out of range".into()))?;
            let model = order_items::ActiveModel {
                id: Set(ObjectId::new().to_string()),
                order_id: Set(order_id.as_uuid()),
                product_id: Set(Some(item.product.to_string())),
                quantity: Set(quantity),
                price: Set(item.unit_price.amount()),
                created_at: Set(Utc::now().into()),
            }
            .insert(&self.orm)
            .await?;
            written.push(order_item_from_entity(model)?);
        }
        Ok(written)
    }

    async fn order(&self, id: OrderId) -> StoreResult<Option<Order>> {
        Orders::find_by_id(id.as_uuid())
            .one(&self.orm)
            .await?
            .map(order_from_entity)
            .transpose()
    }

    async fn order_by_idempotency_key(&self, key: &str) -> StoreResult<Option<Order>> {
        Orders::find()
            .filter(orders::Column::IdempotencyKey.eq(key))
            .one(&self.orm)
            .await?
            .map(order_from_entity)
            .transpose()
    }

    async fn order_items(&self, order_id: OrderId) -> StoreResult<Vec<OrderItem>> {
        OrderItems::find()
            .filter(order_items::Column::OrderId.eq(order_id.as_uuid()))
            .order_by_asc(order_items::Column::Id)
            .all(&self.orm)
            .await?
            .into_iter()
            .map(order_item_from_entity)
            .collect()
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
        payment_reference: Option<&str>,
    ) -> StoreResult<bool> {
        let mut update = Orders::update_many()
            .col_expr(orders::Column::Status, Expr::value(next.as_str()))
            .filter(orders::Column::Id.eq(id.as_uuid()))
            .filter(orders::Column::Status.eq(expected.as_str()));
        if let Some(reference) = payment_reference {
            update = update.col_expr(orders::Column::PaymentReference, Expr::value(reference));
        }

        let result = update.exec(&self.orm).await?;
        Ok(result.rows_affected == 1)
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn insert_guest_user(&self, user: NewGuestUser) -> StoreResult<GuestUser> {
        let model = guest_users::ActiveModel {
            id: Set(ObjectId::new().to_string()),
            email: Set(user.email),
            password_hash: Set(user.password_hash),
            first_name: Set(user.first_name),
            last_name: Set(user.last_name),
            phone: Set(user.phone),
            subscribed: Set(user.subscribed),
            is_active: Set(true),
            created_at: Set(Utc::now().into()),
        }
        .insert(&self.orm)
        .await
        .map_err(|e| conflict_or(e, "email"))?;

        guest_user_from_entity(model)
    }

    async fn guest_user(&self, id: ObjectId) -> StoreResult<Option<GuestUser>> {
        GuestUsers::find_by_id(id.to_string())
            .one(&self.orm)
            .await?
            .map(guest_user_from_entity)
            .transpose()
    }

    async fn guest_user_by_email(&self, email: &str) -> StoreResult<Option<GuestUser>> {
        GuestUsers::find()
            .filter(guest_users::Column::Email.eq(email))
            .one(&self.orm)
            .await?
            .map(guest_user_from_entity)
            .transpose()
    }
}

#[async_trait]
impl CourierRepository for PgStore {
    async fn insert_courier_order(&self, order: NewCourierOrder) -> StoreResult<CourierOrder> {
        let model = courier_orders::ActiveModel {
            id: Set(ObjectId::new().to_string()),
            parcel_action: Set(order.parcel_action.as_str().to_string()),
            from_address: Set(order.from_address),
            to_address: Set(order.to_address),
            selected_item: Set(order.selected_item),
            item_price: Set(order.item_price),
            delivery_fee: Set(order.delivery_fee),
            total: Set(order.total),
            payment_method: Set(order.payment_method),
            contact_name: Set(order.contact_name),
            contact_phone: Set(order.contact_phone),
            notes: Set(order.notes),
            recipient_name: Set(order.recipient_name),
            recipient_phone: Set(order.recipient_phone),
            delivery_location: Set(order.delivery_location),
            created_at: Set(Utc::now().into()),
        }
        .insert(&self.orm)
        .await?;

        courier_order_from_entity(model)
    }
}

#[async_trait]
impl AuditSink for PgStore {
    async fn append_audit(&self, entry: AuditEntry) -> StoreResult<()> {
        AuditLogs::insert(audit_logs::ActiveModel {
            id: Set(ObjectId::new().to_string()),
            user_id: Set(entry.user_id.map(|id| id.to_string())),
            action: Set(entry.action),
            resource: Set(entry.resource),
            metadata: Set(entry.metadata),
            created_at: Set(Utc::now().into()),
        })
        .exec(&self.orm)
        .await?;
        Ok(())
    }
}
