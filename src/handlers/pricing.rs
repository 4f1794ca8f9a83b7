use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, put},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use super::common::{created_response, no_content_response, success_response};
use crate::errors::ServiceError;
use crate::services::pricing::{FeatureInput, PriceRangeInput, SaleDiscountInput};
use crate::AppState;

/// Moment and region to evaluate; defaults to now, all regions
#[derive(Debug, Deserialize)]
pub struct ActiveQuery {
    pub at: Option<DateTime<Utc>>,
    pub region: Option<i32>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/sale-discounts",
            get(list_sale_discounts).post(create_sale_discount),
        )
        .route("/sale-discounts/active", get(active_sale_discounts))
        .route(
            "/sale-discounts/:id",
            put(update_sale_discount).delete(delete_sale_discount),
        )
        .route("/price-ranges", get(list_price_ranges).post(create_price_range))
        .route(
            "/price-ranges/:id",
            put(update_price_range).delete(delete_price_range),
        )
        .route("/features", get(list_features).post(create_feature))
        .route("/features/active", get(active_features))
        .route("/features/:id", put(update_feature).delete(delete_feature))
}

async fn list_sale_discounts(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.pricing.list_sale_discounts().await?))
}

async fn active_sale_discounts(
    State(state): State<AppState>,
    Query(query): Query<ActiveQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let at = query.at.unwrap_or_else(Utc::now);
    Ok(success_response(
        state
            .services
            .pricing
            .active_sale_discounts(at, query.region)
            .await?,
    ))
}

async fn create_sale_discount(
    State(state): State<AppState>,
    Json(payload): Json<SaleDiscountInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let discount = state.services.pricing.create_sale_discount(payload).await?;
    Ok(created_response(discount))
}

async fn update_sale_discount(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<SaleDiscountInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let discount = state
        .services
        .pricing
        .update_sale_discount(id, payload)
        .await?;
    Ok(success_response(discount))
}

async fn delete_sale_discount(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let detached = state.services.pricing.delete_sale_discount(id).await?;
    Ok(success_response(json!({ "detached_items": detached })))
}

async fn list_price_ranges(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.pricing.list_price_ranges().await?))
}

async fn create_price_range(
    State(state): State<AppState>,
    Json(payload): Json<PriceRangeInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let range = state.services.pricing.create_price_range(payload).await?;
    Ok(created_response(range))
}

async fn update_price_range(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<PriceRangeInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let range = state.services.pricing.update_price_range(id, payload).await?;
    Ok(success_response(range))
}

async fn delete_price_range(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.pricing.delete_price_range(id).await?;
    Ok(no_content_response())
}

async fn list_features(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.pricing.list_features().await?))
}

async fn active_features(
    State(state): State<AppState>,
    Query(query): Query<ActiveQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let at = query.at.unwrap_or_else(Utc::now);
    Ok(success_response(
        state.services.pricing.active_features(at, query.region).await?,
    ))
}

async fn create_feature(
    State(state): State<AppState>,
    Json(payload): Json<FeatureInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let feature = state.services.pricing.create_feature(payload).await?;
    Ok(created_response(feature))
}

async fn update_feature(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<FeatureInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let feature = state.services.pricing.update_feature(id, payload).await?;
    Ok(success_response(feature))
}

async fn delete_feature(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.pricing.delete_feature(id).await?;
    Ok(no_content_response())
}
