use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};

use crate::{
    dto::catalog::{CategoryList, HireItemList, ProductList, ProductListQuery},
    error::AppResult,
    models::Product,
    response::ApiResponse,
    services::catalog_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products/", get(list_products))
        .route("/products/{id}/", get(get_product))
        .route("/categories/", get(list_categories))
        .route("/hire-items/", get(list_hire_items))
}

#[utoipa::path(
    get,
    path = "/api/products/",
    params(
        ("category" = Option<String>, Query, description = "Category slug, e.g. phones"),
    ),
    responses(
        (status = 200, description = "List products", body = ApiResponse<ProductList>)
    ),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let resp = catalog_service::list_products(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}/",
    params(("id" = String, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product detail", body = ApiResponse<Product>),
        (status = 404, description = "Not found")
    ),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = catalog_service::get_product(&state, &id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/categories/",
    responses(
        (status = 200, description = "List categories", body = ApiResponse<CategoryList>)
    ),
    tag = "Products"
)]
pub async fn list_categories(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<CategoryList>>> {
    let resp = catalog_service::list_categories(&state).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/hire-items/",
    responses(
        (status = 200, description = "List hire items", body = ApiResponse<HireItemList>)
    ),
    tag = "Products"
)]
pub async fn list_hire_items(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<HireItemList>>> {
    let resp = catalog_service::list_hire_items(&state).await?;
    Ok(Json(resp))
}
