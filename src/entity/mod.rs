pub mod audit_logs;
pub mod categories;
pub mod courier_orders;
pub mod guest_users;
pub mod hire_items;
pub mod order_items;
pub mod orders;
pub mod products;
pub mod shipping_addresses;

pub use audit_logs::Entity as AuditLogs;
pub use categories::Entity as Categories;
pub use courier_orders::Entity as CourierOrders;
pub use guest_users::Entity as GuestUsers;
pub use hire_items::Entity as HireItems;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use products::Entity as Products;
pub use shipping_addresses::Entity as ShippingAddresses;
