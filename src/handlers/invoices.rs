use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;

use super::common::{created_response, no_content_response, success_response};
use crate::errors::ServiceError;
use crate::services::invoices::{CreateInvoice, InvoiceItemRow, UpdateInvoice, UpdateInvoiceItem};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AccountQuery {
    pub account: i32,
}

#[derive(Debug, Deserialize)]
pub struct ItemRows {
    pub rows: Vec<InvoiceItemRow>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/invoices", get(list_for_account).post(create_invoice))
        .route("/invoices/:id", get(get_invoice).put(update_invoice))
        .route("/invoices/:id/items", post(add_items))
        .route("/invoices/:id/send", post(send_notification))
        .route("/invoice-items/:id", put(update_item).delete(delete_item))
}

async fn list_for_account(
    State(state): State<AppState>,
    Query(query): Query<AccountQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let invoices = state.services.invoices.list_for_account(query.account).await?;
    Ok(success_response(invoices))
}

async fn create_invoice(
    State(state): State<AppState>,
    Json(payload): Json<CreateInvoice>,
) -> Result<impl IntoResponse, ServiceError> {
    let invoice = state.services.invoices.create(payload).await?;
    Ok(created_response(invoice))
}

async fn get_invoice(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.invoices.get_details(id).await?))
}

async fn update_invoice(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateInvoice>,
) -> Result<impl IntoResponse, ServiceError> {
    let invoice = state.services.invoices.update(id, payload).await?;
    Ok(success_response(invoice))
}

async fn add_items(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<ItemRows>,
) -> Result<impl IntoResponse, ServiceError> {
    let items = state.services.invoices.add_items(id, payload.rows).await?;
    Ok(created_response(items))
}

async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateInvoiceItem>,
) -> Result<impl IntoResponse, ServiceError> {
    let item = state.services.invoices.update_item(id, payload).await?;
    Ok(success_response(item))
}

async fn delete_item(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let invoice = state.services.invoices.delete_item(id).await?;
    Ok(success_response(invoice))
}

async fn send_notification(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.invoices.send_notification(id).await?;
    Ok(no_content_response())
}
