use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::common::{created_response, success_response, IdList};
use crate::errors::ServiceError;
use crate::services::catalogs::{CreateCatalog, UpdateCatalog};
use crate::services::Deletable;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegionToggle {
    pub enabled: bool,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/catalogs", get(list_catalogs).post(create_catalog))
        .route("/catalogs/delete-summary", post(delete_summary))
        .route("/catalogs/delete", post(delete_catalogs))
        .route("/catalogs/:id", get(get_catalog).put(update_catalog))
        .route("/catalogs/:id/clone", post(clone_catalog))
        .route("/catalogs/:id/regions/:region", put(set_region_enabled))
}

async fn list_catalogs(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    let catalogs = state.services.catalogs.list().await?;
    Ok(success_response(catalogs))
}

async fn create_catalog(
    State(state): State<AppState>,
    Json(payload): Json<CreateCatalog>,
) -> Result<impl IntoResponse, ServiceError> {
    let catalog = state.services.catalogs.create(payload).await?;
    Ok(created_response(catalog))
}

async fn get_catalog(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.catalogs.get(id).await?))
}

async fn update_catalog(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateCatalog>,
) -> Result<impl IntoResponse, ServiceError> {
    let catalog = state.services.catalogs.update(id, payload).await?;
    Ok(success_response(catalog))
}

async fn clone_catalog(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let clone = state.services.catalogs.clone_catalog(id).await?;
    Ok(created_response(clone))
}

async fn set_region_enabled(
    State(state): State<AppState>,
    Path((id, region)): Path<(i32, i32)>,
    Json(payload): Json<RegionToggle>,
) -> Result<impl IntoResponse, ServiceError> {
    state
        .services
        .catalogs
        .set_region_enabled(id, region, payload.enabled)
        .await?;
    Ok(success_response(state.services.catalogs.get(id).await?))
}

async fn delete_summary(
    State(state): State<AppState>,
    Json(payload): Json<IdList>,
) -> Result<impl IntoResponse, ServiceError> {
    let summary = state.services.catalogs.delete_summary(&payload.ids).await?;
    Ok(success_response(summary))
}

async fn delete_catalogs(
    State(state): State<AppState>,
    Json(payload): Json<IdList>,
) -> Result<impl IntoResponse, ServiceError> {
    let deleted = state.services.catalogs.delete(&payload.ids).await?;
    Ok(success_response(json!({ "deleted": deleted })))
}
