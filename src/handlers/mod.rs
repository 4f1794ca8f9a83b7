pub mod accounts;
pub mod catalogs;
pub mod categories;
pub mod common;
pub mod geography;
pub mod images;
pub mod invoices;
pub mod items;
pub mod orders;
pub mod pricing;
pub mod products;
pub mod reports;

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::cache::StorefrontCache;
use crate::config::AppConfig;
use crate::notifications::Mailer;
use crate::services::{
    accounts::AccountService, catalogs::CatalogService, categories::CategoryService,
    geography::GeographyService, images::ImageService, invoices::InvoiceService,
    items::ItemService, orders::OrderService, pricing::PricingService, products::ProductService,
    reports::ReportService,
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub geography: Arc<GeographyService>,
    pub catalogs: Arc<CatalogService>,
    pub categories: Arc<CategoryService>,
    pub products: Arc<ProductService>,
    pub items: Arc<ItemService>,
    pub orders: Arc<OrderService>,
    pub invoices: Arc<InvoiceService>,
    pub accounts: Arc<AccountService>,
    pub pricing: Arc<PricingService>,
    pub reports: Arc<ReportService>,
    pub images: Arc<ImageService>,
}

impl AppServices {
    /// Builds every service once; handlers share them through [`AppState`].
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: &AppConfig,
        cache: StorefrontCache,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let currency = config.default_currency.clone();
        Self {
            geography: Arc::new(GeographyService::new(db.clone(), currency.clone())),
            catalogs: Arc::new(CatalogService::new(
                db.clone(),
                cache.clone(),
                config.image_dir.clone(),
            )),
            categories: Arc::new(CategoryService::new(
                db.clone(),
                cache.clone(),
                config.image_dir.clone(),
            )),
            products: Arc::new(ProductService::new(
                db.clone(),
                cache.clone(),
                config.image_dir.clone(),
            )),
            items: Arc::new(ItemService::new(db.clone(), cache.clone())),
            orders: Arc::new(OrderService::new(db.clone(), mailer.clone(), currency.clone())),
            invoices: Arc::new(InvoiceService::new(db.clone(), mailer, currency)),
            accounts: Arc::new(AccountService::new(db.clone())),
            pricing: Arc::new(PricingService::new(db.clone(), cache.clone())),
            reports: Arc::new(ReportService::new(db.clone())),
            images: Arc::new(ImageService::new(
                db,
                cache,
                config.image_dir.clone(),
                config.image_sizes.clone(),
            )),
        }
    }
}
