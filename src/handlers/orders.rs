use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;

use super::common::{no_content_response, success_response, PaginatedResponse, PaginationParams};
use crate::errors::ServiceError;
use crate::services::orders::OrderSearch;
use crate::services::Searchable;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CommentsUpdate {
    pub comments: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(search_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/cancel", post(cancel_order))
        .route("/orders/:id/resend-confirmation", post(resend_confirmation))
        .route("/orders/:id/comments", put(update_comments))
}

async fn search_orders(
    State(state): State<AppState>,
    Query(search): Query<OrderSearch>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let (page, per_page) = pagination.resolve(&state.config);
    let results = state.services.orders.search(search, page, per_page).await?;
    Ok(success_response(PaginatedResponse::from(results)))
}

async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.orders.get_details(id).await?))
}

async fn cancel_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state.services.orders.cancel(id).await?;
    Ok(success_response(order))
}

async fn resend_confirmation(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.orders.resend_confirmation(id).await?;
    Ok(no_content_response())
}

async fn update_comments(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<CommentsUpdate>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state
        .services
        .orders
        .update_comments(id, payload.comments)
        .await?;
    Ok(success_response(order))
}
