use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;

use super::common::{created_response, no_content_response, success_response, PaginatedResponse, PaginationParams};
use crate::errors::ServiceError;
use crate::services::accounts::{
    AccountSearch, AddressInput, CreateAccount, PaymentMethodInput, UpdateAccount,
};
use crate::services::Searchable;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SuspiciousFlag {
    pub suspicious: bool,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/accounts", get(search_accounts).post(create_account))
        .route("/accounts/suspicious", get(suspicious_accounts))
        .route("/accounts/:id", get(get_account).put(update_account))
        .route("/accounts/:id/suspicious", put(set_suspicious))
        .route("/accounts/:id/addresses", post(add_address))
        .route("/accounts/:id/payment-methods", post(add_payment_method))
        .route(
            "/addresses/:id",
            put(update_address).delete(delete_address),
        )
        .route("/addresses/:id/default-billing", post(set_default_billing))
        .route("/addresses/:id/default-shipping", post(set_default_shipping))
        .route(
            "/payment-methods/:id",
            axum::routing::delete(delete_payment_method),
        )
        .route("/payment-methods/:id/default", post(set_default_payment_method))
}

async fn search_accounts(
    State(state): State<AppState>,
    Query(search): Query<AccountSearch>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let (page, per_page) = pagination.resolve(&state.config);
    let results = state.services.accounts.search(search, page, per_page).await?;
    Ok(success_response(PaginatedResponse::from(results)))
}

async fn create_account(
    State(state): State<AppState>,
    Json(payload): Json<CreateAccount>,
) -> Result<impl IntoResponse, ServiceError> {
    let account = state.services.accounts.create(payload).await?;
    Ok(created_response(account))
}

async fn suspicious_accounts(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.accounts.suspicious_accounts().await?))
}

async fn get_account(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.accounts.get_details(id).await?))
}

async fn update_account(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateAccount>,
) -> Result<impl IntoResponse, ServiceError> {
    let account = state.services.accounts.update(id, payload).await?;
    Ok(success_response(account))
}

async fn set_suspicious(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<SuspiciousFlag>,
) -> Result<impl IntoResponse, ServiceError> {
    let account = state
        .services
        .accounts
        .set_suspicious(id, payload.suspicious)
        .await?;
    Ok(success_response(account))
}

async fn add_address(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<AddressInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let address = state.services.accounts.add_address(id, payload).await?;
    Ok(created_response(address))
}

async fn update_address(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<AddressInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let address = state.services.accounts.update_address(id, payload).await?;
    Ok(success_response(address))
}

async fn delete_address(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.accounts.delete_address(id).await?;
    Ok(no_content_response())
}

async fn set_default_billing(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(
        state.services.accounts.set_default_billing(id).await?,
    ))
}

async fn set_default_shipping(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(
        state.services.accounts.set_default_shipping(id).await?,
    ))
}

async fn add_payment_method(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<PaymentMethodInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let method = state
        .services
        .accounts
        .add_payment_method(id, payload)
        .await?;
    Ok(created_response(method))
}

async fn delete_payment_method(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.accounts.delete_payment_method(id).await?;
    Ok(no_content_response())
}

async fn set_default_payment_method(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(
        state.services.accounts.set_default_payment_method(id).await?,
    ))
}
