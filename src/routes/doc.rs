use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{
            LoginRequest, LoginResponse, RegisterRequest, RegisterResponse, TokenRefreshRequest,
            TokenRefreshResponse,
        },
        catalog::{CategoryList, HireItemList, ProductList},
        courier::{CourierOrderCreated, CreateCourierOrderRequest},
        orders::{CartItemInput, CreateOrderRequest, CreateOrderResponse, ShippingAddressInput},
        payment::{CallbackAck, InitiatePaymentRequest},
    },
    models::{
        Category, DeliveryMethod, GuestUser, HireItem, Order, OrderItem, OrderStatus, ParcelAction,
        Product, ShippingAddress,
    },
    order::{OrderItemView, OrderSnapshot},
    payment::PaymentHandle,
    response::{ApiResponse, Meta},
    routes::{auth, courier, health, orders, payment, products},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::token_refresh,
        auth::profile,
        products::list_products,
        products::get_product,
        products::list_categories,
        products::list_hire_items,
        orders::create_order,
        orders::order_status,
        orders::order_invoice,
        orders::shipping_address,
        payment::initiate_payment,
        payment::payment_callback,
        courier::create_courier_order
    ),
    components(
        schemas(
            GuestUser,
            Category,
            Product,
            HireItem,
            ShippingAddress,
            DeliveryMethod,
            Order,
            OrderItem,
            OrderStatus,
            OrderItemView,
            OrderSnapshot,
            ParcelAction,
            RegisterRequest,
            RegisterResponse,
            LoginRequest,
            LoginResponse,
            TokenRefreshRequest,
            TokenRefreshResponse,
            ProductList,
            CategoryList,
            HireItemList,
            ShippingAddressInput,
            CartItemInput,
            CreateOrderRequest,
            CreateOrderResponse,
            InitiatePaymentRequest,
            PaymentHandle,
            CallbackAck,
            CreateCourierOrderRequest,
            CourierOrderCreated,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<OrderSnapshot>,
            ApiResponse<CreateOrderResponse>,
            ApiResponse<PaymentHandle>,
            ApiResponse<ShippingAddress>,
            ApiResponse<TokenRefreshResponse>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Products", description = "Catalog endpoints"),
        (name = "Auth", description = "Guest user endpoints"),
        (name = "Orders", description = "Order lifecycle endpoints"),
        (name = "Payment", description = "M-Pesa STK push endpoints"),
        (name = "Courier", description = "Courier booking endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
