use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::common::{created_response, no_content_response, success_response, IdList};
use crate::entities::ItemStatus;
use crate::errors::ServiceError;
use crate::services::items::{
    CreateItem, CreateItemGroup, CreateMinimumQuantityGroup, RegionBinding, UpdateItem,
};
use crate::services::Orderable;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: ItemStatus,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/items", post(create_item))
        .route(
            "/items/:id",
            get(get_item).put(update_item).delete(delete_item),
        )
        .route("/items/:id/regions/:region", put(set_region_binding))
        .route("/items/:id/status", put(set_status))
        .route("/products/:id/items/order", put(reorder_items))
        .route("/item-groups", post(create_group))
        .route("/item-groups/:id", delete(delete_group))
        .route("/item-groups/:id/items", post(assign_to_group))
        .route(
            "/minimum-quantity-groups",
            get(list_min_quantity_groups).post(create_min_quantity_group),
        )
        .route("/minimum-quantity-groups/:id", delete(delete_min_quantity_group))
        .route(
            "/minimum-quantity-groups/:id/items",
            post(assign_to_min_quantity_group),
        )
}

async fn create_item(
    State(state): State<AppState>,
    Json(payload): Json<CreateItem>,
) -> Result<impl IntoResponse, ServiceError> {
    let item = state.services.items.create_item(payload).await?;
    Ok(created_response(item))
}

async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.items.get_item(id).await?))
}

async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateItem>,
) -> Result<impl IntoResponse, ServiceError> {
    let item = state.services.items.update_item(id, payload).await?;
    Ok(success_response(item))
}

async fn delete_item(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.items.delete_item(id).await?;
    Ok(no_content_response())
}

async fn set_region_binding(
    State(state): State<AppState>,
    Path((id, region)): Path<(i32, i32)>,
    Json(payload): Json<RegionBinding>,
) -> Result<impl IntoResponse, ServiceError> {
    let binding = state
        .services
        .items
        .set_region_binding(id, region, payload)
        .await?;
    Ok(success_response(binding))
}

async fn set_status(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<StatusChange>,
) -> Result<impl IntoResponse, ServiceError> {
    let item = state.services.items.set_status(id, payload.status).await?;
    Ok(success_response(item))
}

async fn reorder_items(
    State(state): State<AppState>,
    Path(product_id): Path<i32>,
    Json(payload): Json<IdList>,
) -> Result<impl IntoResponse, ServiceError> {
    state
        .services
        .items
        .reorder(Some(product_id), &payload.ids)
        .await?;
    Ok(no_content_response())
}

async fn create_group(
    State(state): State<AppState>,
    Json(payload): Json<CreateItemGroup>,
) -> Result<impl IntoResponse, ServiceError> {
    let group = state.services.items.create_group(payload).await?;
    Ok(created_response(group))
}

async fn delete_group(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.items.delete_group(id).await?;
    Ok(no_content_response())
}

async fn assign_to_group(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<IdList>,
) -> Result<impl IntoResponse, ServiceError> {
    let assigned = state.services.items.assign_items(id, &payload.ids).await?;
    Ok(success_response(json!({ "assigned": assigned })))
}

async fn list_min_quantity_groups(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(
        state.services.items.list_min_quantity_groups().await?,
    ))
}

async fn create_min_quantity_group(
    State(state): State<AppState>,
    Json(payload): Json<CreateMinimumQuantityGroup>,
) -> Result<impl IntoResponse, ServiceError> {
    let group = state
        .services
        .items
        .create_min_quantity_group(payload)
        .await?;
    Ok(created_response(group))
}

async fn delete_min_quantity_group(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.items.delete_min_quantity_group(id).await?;
    Ok(no_content_response())
}

async fn assign_to_min_quantity_group(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<IdList>,
) -> Result<impl IntoResponse, ServiceError> {
    let assigned = state
        .services
        .items
        .assign_items_to_min_quantity_group(id, &payload.ids)
        .await?;
    Ok(success_response(json!({ "assigned": assigned })))
}
