use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::Deserialize;

use super::common::{created_response, no_content_response, success_response};
use crate::errors::ServiceError;
use crate::services::geography::{CreateCountry, CreateLocale, CreateProvState, CreateRegion};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CountryQuery {
    #[serde(default)]
    pub visible_only: bool,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/regions", get(list_regions).post(create_region))
        .route("/regions/:id", get(get_region).delete(delete_region))
        .route("/locales", get(list_locales).post(create_locale))
        .route("/countries", get(list_countries).post(create_country))
        .route("/countries/:id/provstates", get(list_provstates))
        .route("/provstates", axum::routing::post(create_provstate))
}

async fn list_regions(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.geography.list_regions().await?))
}

async fn create_region(
    State(state): State<AppState>,
    Json(payload): Json<CreateRegion>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(created_response(state.services.geography.create_region(payload).await?))
}

async fn get_region(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.geography.get_region(id).await?))
}

async fn delete_region(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.geography.delete_region(id).await?;
    Ok(no_content_response())
}

async fn list_locales(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.geography.list_locales().await?))
}

async fn create_locale(
    State(state): State<AppState>,
    Json(payload): Json<CreateLocale>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(created_response(state.services.geography.create_locale(payload).await?))
}

async fn list_countries(
    State(state): State<AppState>,
    Query(query): Query<CountryQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(
        state.services.geography.list_countries(query.visible_only).await?,
    ))
}

async fn create_country(
    State(state): State<AppState>,
    Json(payload): Json<CreateCountry>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(created_response(state.services.geography.create_country(payload).await?))
}

async fn list_provstates(
    State(state): State<AppState>,
    Path(country): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(
        state.services.geography.list_provstates(&country).await?,
    ))
}

async fn create_provstate(
    State(state): State<AppState>,
    Json(payload): Json<CreateProvState>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(created_response(
        state.services.geography.create_provstate(payload).await?,
    ))
}
