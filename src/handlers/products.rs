use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use super::common::{created_response, no_content_response, success_response, IdList, PaginatedResponse, PaginationParams};
use crate::errors::ServiceError;
use crate::services::products::{CreateAttribute, CreateProduct, ProductSearch, UpdateProduct};
use crate::services::{Deletable, Searchable};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct DiscountAssignment {
    pub discount: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct PriceAssignment {
    pub price: Decimal,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(search_products).post(create_product))
        .route("/products/delete-summary", post(delete_summary))
        .route("/products/delete", post(delete_products))
        .route("/products/:id", get(get_product).put(update_product))
        .route("/products/:id/attributes", put(set_attributes))
        .route("/attributes", get(list_attributes).post(create_attribute))
        .route("/attributes/:id/sale-discount", post(apply_sale_discount))
        .route("/attributes/:id/regions/:region/price", put(set_region_price))
}

async fn search_products(
    State(state): State<AppState>,
    Query(search): Query<ProductSearch>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let (page, per_page) = pagination.resolve(&state.config);
    let results = state.services.products.search(search, page, per_page).await?;
    Ok(success_response(PaginatedResponse::from(results)))
}

async fn create_product(
    State(state): State<AppState>,
    Json(payload): Json<CreateProduct>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = state.services.products.create(payload).await?;
    Ok(created_response(product))
}

async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.products.get(id).await?))
}

async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateProduct>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = state.services.products.update(id, payload).await?;
    Ok(success_response(product))
}

async fn set_attributes(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<IdList>,
) -> Result<impl IntoResponse, ServiceError> {
    state
        .services
        .products
        .set_product_attributes(id, &payload.ids)
        .await?;
    Ok(no_content_response())
}

async fn delete_summary(
    State(state): State<AppState>,
    Json(payload): Json<IdList>,
) -> Result<impl IntoResponse, ServiceError> {
    let summary = state.services.products.delete_summary(&payload.ids).await?;
    Ok(success_response(summary))
}

async fn delete_products(
    State(state): State<AppState>,
    Json(payload): Json<IdList>,
) -> Result<impl IntoResponse, ServiceError> {
    let deleted = state.services.products.delete(&payload.ids).await?;
    Ok(success_response(json!({ "deleted": deleted })))
}

async fn list_attributes(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.products.list_attributes().await?))
}

async fn create_attribute(
    State(state): State<AppState>,
    Json(payload): Json<CreateAttribute>,
) -> Result<impl IntoResponse, ServiceError> {
    let attribute = state.services.products.create_attribute(payload).await?;
    Ok(created_response(attribute))
}

async fn apply_sale_discount(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<DiscountAssignment>,
) -> Result<impl IntoResponse, ServiceError> {
    let updated = state
        .services
        .products
        .apply_sale_discount_by_attribute(id, payload.discount)
        .await?;
    Ok(success_response(json!({ "updated": updated })))
}

async fn set_region_price(
    State(state): State<AppState>,
    Path((id, region)): Path<(i32, i32)>,
    Json(payload): Json<PriceAssignment>,
) -> Result<impl IntoResponse, ServiceError> {
    let updated = state
        .services
        .products
        .set_region_price_by_attribute(id, region, payload.price)
        .await?;
    Ok(success_response(json!({ "updated": updated })))
}
