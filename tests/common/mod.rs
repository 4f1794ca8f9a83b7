#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use storefront_admin::{
    auth::consts as perm,
    cache::StorefrontCache,
    config::{AppConfig, ImageSizeConfig},
    db::{self, DbConfig},
    entities::{item::ItemStatus, order, order_item},
    notifications::RecordingMailer,
    services::{
        accounts::CreateAccount,
        catalogs::CreateCatalog,
        geography::{CreateCountry, CreateLocale, CreateProvState, CreateRegion},
        items::CreateItem,
        products::CreateProduct,
    },
    AppState,
};
use tempfile::TempDir;
use tower::ServiceExt;

pub const TEST_SECRET: &str = "test_secret_key_for_testing_purposes_only_32chars";

/// Application state over a private in-memory SQLite database, with mail
/// captured in memory and images written to a temporary directory.
pub struct TestApp {
    pub state: AppState,
    pub mailer: RecordingMailer,
    pub image_dir: TempDir,
    router: Router,
}

impl TestApp {
    pub async fn new() -> Self {
        let image_dir = tempfile::tempdir().expect("temp image dir");

        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            TEST_SECRET.to_string(),
            "test".to_string(),
        );
        cfg.image_dir = image_dir.path().to_path_buf();
        cfg.image_sizes = vec![
            ImageSizeConfig::new("thumb", 40, 40, true),
            ImageSizeConfig::new("large", 120, 60, false),
        ];

        let pool = db::establish_connection_with_config(&DbConfig::single(&cfg.database_url))
            .await
            .expect("failed to open in-memory database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let mailer = RecordingMailer::new();
        let state = AppState::new(
            Arc::new(pool),
            cfg,
            StorefrontCache::in_memory(),
            Arc::new(mailer.clone()),
        );
        let router = storefront_admin::app_router(state.clone());

        Self {
            state,
            mailer,
            image_dir,
            router,
        }
    }

    /// Bearer token carrying the given permissions.
    pub fn token(&self, permissions: &[&str]) -> String {
        self.state
            .auth
            .issue_token("staff-1", permissions, chrono::Duration::hours(1))
            .expect("token")
    }

    pub fn admin_token(&self) -> String {
        self.token(&[
            perm::CATALOG_MANAGE,
            perm::ORDERS_MANAGE,
            perm::ACCOUNTS_MANAGE,
            perm::PRICING_MANAGE,
            perm::REPORTS_READ,
        ])
    }

    /// Sends one request through the full router and returns status and JSON body.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub fn db(&self) -> &sea_orm::DatabaseConnection {
        &self.state.db
    }

    // Seed helpers

    pub async fn seed_region(&self, title: &str) -> i32 {
        self.state
            .services
            .geography
            .create_region(CreateRegion {
                title: title.to_string(),
            })
            .await
            .expect("region")
            .id
    }

    pub async fn seed_locale(&self, code: &str, region: i32, currency: &str) -> String {
        self.state
            .services
            .geography
            .create_locale(CreateLocale {
                id: code.to_string(),
                region,
                currency: Some(currency.to_string()),
            })
            .await
            .expect("locale")
            .id
    }

    pub async fn seed_country(&self, code: &str, title: &str) {
        self.state
            .services
            .geography
            .create_country(CreateCountry {
                id: code.to_string(),
                title: title.to_string(),
                visible: true,
            })
            .await
            .expect("country");
    }

    pub async fn seed_provstate(&self, country: &str, title: &str, abbreviation: &str) -> i32 {
        self.state
            .services
            .geography
            .create_provstate(CreateProvState {
                country: country.to_string(),
                title: title.to_string(),
                abbreviation: abbreviation.to_string(),
            })
            .await
            .expect("provstate")
            .id
    }

    pub async fn seed_account(&self, fullname: &str, email: &str) -> i32 {
        self.state
            .services
            .accounts
            .create(CreateAccount {
                fullname: fullname.to_string(),
                email: email.to_string(),
                phone: None,
                company: None,
            })
            .await
            .expect("account")
            .id
    }

    pub async fn seed_catalog(&self, title: &str) -> i32 {
        self.state
            .services
            .catalogs
            .create(CreateCatalog {
                title: title.to_string(),
                in_season: true,
            })
            .await
            .expect("catalog")
            .id
    }

    pub async fn seed_product(&self, catalog: i32, shortname: &str) -> i32 {
        self.state
            .services
            .products
            .create(CreateProduct {
                catalog,
                title: shortname.to_uppercase(),
                shortname: shortname.to_string(),
                bodytext: None,
            })
            .await
            .expect("product")
            .id
    }

    pub async fn seed_item(&self, product: i32, sku: &str) -> i32 {
        self.state
            .services
            .items
            .create_item(CreateItem {
                product,
                sku: sku.to_string(),
                description: format!("Item {}", sku),
                status: Some(ItemStatus::Available),
                item_group: None,
                minimum_quantity_group: None,
            })
            .await
            .expect("item")
            .id
    }

    /// Inserts a placed order with one line whose extension equals `total`.
    pub async fn seed_order(
        &self,
        account: Option<i32>,
        email: &str,
        locale: &str,
        total: Decimal,
        createdate: DateTime<Utc>,
    ) -> i32 {
        let placed = order::ActiveModel {
            account: Set(account),
            email: Set(email.to_string()),
            phone: Set(None),
            locale: Set(locale.to_string()),
            billing_address: Set(None),
            shipping_address: Set(None),
            subtotal: Set(total),
            shipping_total: Set(Decimal::ZERO),
            surcharge_total: Set(Decimal::ZERO),
            promotion_total: Set(Decimal::ZERO),
            tax_total: Set(Decimal::ZERO),
            total: Set(total),
            notes: Set(None),
            comments: Set(None),
            createdate: Set(createdate),
            cancel_date: Set(None),
            ..Default::default()
        }
        .insert(self.db())
        .await
        .expect("order");

        order_item::ActiveModel {
            ordr: Set(placed.id),
            item: Set(None),
            sku: Set("SKU-1".to_string()),
            description: Set("Sample line".to_string()),
            price: Set(total),
            quantity: Set(1),
            extension: Set(total),
            ..Default::default()
        }
        .insert(self.db())
        .await
        .expect("order item");

        placed.id
    }
}
