use crate::{
    dto::catalog::{CategoryList, HireItemList, ProductList, ProductListQuery},
    error::{AppError, AppResult},
    ids::ObjectId,
    models::Product,
    response::{ApiResponse, Meta},
    state::AppState,
    store::CatalogLookup,
};

pub async fn list_products(
    state: &AppState,
    query: ProductListQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let category = query
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());
    let items = state.store.products(category).await?;
    let meta = Meta::counted(items.len());
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

pub async fn get_product(state: &AppState, raw_id: &str) -> AppResult<ApiResponse<Product>> {
    let id = ObjectId::parse(raw_id).map_err(|_| AppError::NotFound)?;
    let product = state.store.product(id).await?.ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Product", product, Some(Meta::empty())))
}

pub async fn list_categories(state: &AppState) -> AppResult<ApiResponse<CategoryList>> {
    let items = state.store.categories().await?;
    let meta = Meta::counted(items.len());
    Ok(ApiResponse::success("Categories", CategoryList { items }, Some(meta)))
}

pub async fn list_hire_items(state: &AppState) -> AppResult<ApiResponse<HireItemList>> {
    let items = state.store.hire_items().await?;
    let meta = Meta::counted(items.len());
    Ok(ApiResponse::success("Hire items", HireItemList { items }, Some(meta)))
}
