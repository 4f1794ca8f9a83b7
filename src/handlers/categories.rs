use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::common::{created_response, no_content_response, success_response, IdList};
use crate::entities::ItemStatus;
use crate::errors::ServiceError;
use crate::services::categories::{CreateCategory, UpdateCategory};
use crate::services::{Deletable, Orderable};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ParentQuery {
    pub parent: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub parent: Option<i32>,
    pub ids: Vec<i32>,
}

#[derive(Debug, Deserialize)]
pub struct BindProducts {
    pub ids: Vec<i32>,
    #[serde(default)]
    pub minor: bool,
}

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: ItemStatus,
}

#[derive(Debug, Deserialize)]
pub struct EnabledChange {
    pub region: Option<i32>,
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct RegionQuery {
    pub region: i32,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_children).post(create_category))
        .route("/categories/reorder", post(reorder_categories))
        .route("/categories/delete-summary", post(delete_summary))
        .route("/categories/delete", post(delete_categories))
        .route("/categories/:id", get(get_category).put(update_category))
        .route("/categories/:id/navbar", get(navbar))
        .route("/categories/:id/descendants", get(descendants))
        .route("/categories/:id/products", get(list_products).post(bind_products))
        .route("/categories/:id/products/unbind", post(unbind_products))
        .route("/categories/:id/products/order", put(reorder_products))
        .route("/categories/:id/items/status", put(set_item_status))
        .route("/categories/:id/items/enabled", put(set_items_enabled))
        .route("/categories/:id/visible-products", get(visible_product_count))
}

async fn list_children(
    State(state): State<AppState>,
    Query(query): Query<ParentQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let categories = state.services.categories.children(query.parent).await?;
    Ok(success_response(categories))
}

async fn create_category(
    State(state): State<AppState>,
    Json(payload): Json<CreateCategory>,
) -> Result<impl IntoResponse, ServiceError> {
    let category = state.services.categories.create(payload).await?;
    Ok(created_response(category))
}

async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.categories.get(id).await?))
}

async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateCategory>,
) -> Result<impl IntoResponse, ServiceError> {
    let category = state.services.categories.update(id, payload).await?;
    Ok(success_response(category))
}

async fn navbar(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.categories.navbar(id).await?))
}

async fn descendants(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.categories.descendants(id).await?))
}

async fn reorder_categories(
    State(state): State<AppState>,
    Json(payload): Json<ReorderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    state
        .services
        .categories
        .reorder(payload.parent, &payload.ids)
        .await?;
    Ok(no_content_response())
}

async fn delete_summary(
    State(state): State<AppState>,
    Json(payload): Json<IdList>,
) -> Result<impl IntoResponse, ServiceError> {
    let summary = state.services.categories.delete_summary(&payload.ids).await?;
    Ok(success_response(summary))
}

async fn delete_categories(
    State(state): State<AppState>,
    Json(payload): Json<IdList>,
) -> Result<impl IntoResponse, ServiceError> {
    let deleted = state.services.categories.delete(&payload.ids).await?;
    Ok(success_response(json!({ "deleted": deleted })))
}

async fn list_products(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.categories.products(id).await?))
}

async fn bind_products(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<BindProducts>,
) -> Result<impl IntoResponse, ServiceError> {
    let added = state
        .services
        .categories
        .bind_products(id, &payload.ids, payload.minor)
        .await?;
    Ok(success_response(json!({ "added": added })))
}

async fn unbind_products(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<IdList>,
) -> Result<impl IntoResponse, ServiceError> {
    let removed = state
        .services
        .categories
        .unbind_products(id, &payload.ids)
        .await?;
    Ok(success_response(json!({ "removed": removed })))
}

async fn reorder_products(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<IdList>,
) -> Result<impl IntoResponse, ServiceError> {
    state
        .services
        .categories
        .reorder_products(id, &payload.ids)
        .await?;
    Ok(no_content_response())
}

async fn set_item_status(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<StatusChange>,
) -> Result<impl IntoResponse, ServiceError> {
    let updated = state
        .services
        .categories
        .set_item_status(id, payload.status)
        .await?;
    Ok(success_response(json!({ "updated": updated })))
}

async fn set_items_enabled(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<EnabledChange>,
) -> Result<impl IntoResponse, ServiceError> {
    let updated = state
        .services
        .categories
        .set_items_enabled(id, payload.region, payload.enabled)
        .await?;
    Ok(success_response(json!({ "updated": updated })))
}

async fn visible_product_count(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Query(query): Query<RegionQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let count = state
        .services
        .categories
        .visible_product_count(id, query.region)
        .await?;
    Ok(success_response(json!({ "count": count })))
}
