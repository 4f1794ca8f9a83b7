//! Storefront Admin Library
//!
//! Back-office services for a storefront: catalog management, orders and
//! invoices, customer accounts, pricing, sales reports and image handling,
//! exposed as a permission-gated JSON API.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod migrator;
pub mod notifications;
pub mod openapi;
pub mod services;

use axum::{extract::State, response::Json, routing::get, Router};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::auth::consts as perm;
use crate::auth::{AuthRouterExt, AuthService};
use crate::cache::StorefrontCache;
use crate::notifications::Mailer;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub services: handlers::AppServices,
    pub auth: Arc<AuthService>,
}

impl AppState {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        cache: StorefrontCache,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let auth = Arc::new(AuthService::new(&config.jwt_secret, config.jwt_issuer.clone()));
        let services = handlers::AppServices::new(db.clone(), &config, cache, mailer);
        Self {
            db,
            config,
            services,
            auth,
        }
    }
}

// Common response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Routes under `/api/v1`. Each admin area sits behind its own permission.
pub fn api_v1_routes(auth: Arc<AuthService>) -> Router<AppState> {
    let catalog = Router::new()
        .merge(handlers::geography::routes())
        .merge(handlers::catalogs::routes())
        .merge(handlers::categories::routes())
        .merge(handlers::products::routes())
        .merge(handlers::items::routes())
        .merge(handlers::images::routes())
        .with_permission(auth.clone(), perm::CATALOG_MANAGE);

    let orders = Router::new()
        .merge(handlers::orders::routes())
        .merge(handlers::invoices::routes())
        .with_permission(auth.clone(), perm::ORDERS_MANAGE);

    let accounts = handlers::accounts::routes().with_permission(auth.clone(), perm::ACCOUNTS_MANAGE);
    let pricing = handlers::pricing::routes().with_permission(auth.clone(), perm::PRICING_MANAGE);
    let reports = handlers::reports::routes().with_permission(auth, perm::REPORTS_READ);

    Router::new()
        .merge(catalog)
        .merge(orders)
        .merge(accounts)
        .merge(pricing)
        .merge(reports)
}

/// The whole application router with state applied.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        .nest("/api/v1", api_v1_routes(state.auth.clone()))
        .merge(openapi::openapi_routes())
        .with_state(state)
}

async fn api_status(State(state): State<AppState>) -> ApiResult<Value> {
    let status_data = json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "storefront-admin",
        "environment": state.config.environment,
        "cache_backend": state.config.cache_backend,
        "timestamp": Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(status_data)))
}

async fn health_check(State(state): State<AppState>) -> ApiResult<Value> {
    let db_status = match db::check_connection(&state.db).await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    let health_data = json!({
        "status": db_status,
        "checks": {
            "database": db_status,
        },
        "timestamp": Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(health_data)))
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[test]
    fn success_response_carries_data_and_timestamp() {
        let response = ApiResponse::success("ok");
        assert!(response.success);
        assert_eq!(response.data, Some("ok"));
        DateTime::parse_from_rfc3339(&response.timestamp).expect("timestamp should parse");
    }

    #[test]
    fn error_response_has_no_data() {
        let response = ApiResponse::<()>::error("oops".into());
        assert!(!response.success);
        assert!(response.data.is_none());
        assert_eq!(response.message.as_deref(), Some("oops"));
    }
}
