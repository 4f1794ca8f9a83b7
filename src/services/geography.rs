use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

use crate::entities::{catalog_region, country, item_region, locale, provstate, region};
use crate::errors::ServiceError;

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateRegion {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateLocale {
    #[validate(length(min = 2, max = 10, message = "Locale code must be 2 to 10 characters"))]
    pub id: String,
    pub region: i32,
    #[validate(length(equal = 3, message = "Currency must be an ISO 4217 code"))]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateCountry {
    #[validate(length(equal = 2, message = "Country code must be two letters"))]
    pub id: String,
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_visible() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateProvState {
    #[validate(length(equal = 2, message = "Country code must be two letters"))]
    pub country: String,
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, max = 5, message = "Abbreviation must be 1 to 5 characters"))]
    pub abbreviation: String,
}

/// Regions, locales, countries and provinces/states
#[derive(Clone)]
pub struct GeographyService {
    db: Arc<DatabaseConnection>,
    default_currency: String,
}

impl GeographyService {
    pub fn new(db: Arc<DatabaseConnection>, default_currency: impl Into<String>) -> Self {
        Self {
            db,
            default_currency: default_currency.into(),
        }
    }

    #[instrument(skip(self))]
    pub async fn create_region(&self, input: CreateRegion) -> Result<region::Model, ServiceError> {
        input.validate()?;
        let region = region::ActiveModel {
            title: Set(input.title.trim().to_string()),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;
        info!(region_id = region.id, "Region created");
        Ok(region)
    }

    pub async fn list_regions(&self) -> Result<Vec<region::Model>, ServiceError> {
        Ok(region::Entity::find()
            .order_by_asc(region::Column::Title)
            .all(&*self.db)
            .await?)
    }

    pub async fn get_region(&self, id: i32) -> Result<region::Model, ServiceError> {
        region::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Region", id))
    }

    /// Refuses while catalogs, item prices or locales still reference the region.
    #[instrument(skip(self))]
    pub async fn delete_region(&self, id: i32) -> Result<(), ServiceError> {
        let region = self.get_region(id).await?;

        let catalogs = catalog_region::Entity::find()
            .filter(catalog_region::Column::Region.eq(id))
            .count(&*self.db)
            .await?;
        let items = item_region::Entity::find()
            .filter(item_region::Column::Region.eq(id))
            .count(&*self.db)
            .await?;
        let locales = locale::Entity::find()
            .filter(locale::Column::Region.eq(id))
            .count(&*self.db)
            .await?;

        if catalogs + items + locales > 0 {
            return Err(ServiceError::DependencyConflict(format!(
                "Region '{}' is used by {} catalogs, {} item prices and {} locales",
                region.title, catalogs, items, locales
            )));
        }

        region::Entity::delete_by_id(id).exec(&*self.db).await?;
        info!(region_id = id, "Region deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn create_locale(&self, input: CreateLocale) -> Result<locale::Model, ServiceError> {
        input.validate()?;
        self.get_region(input.region).await?;
        if locale::Entity::find_by_id(input.id.clone())
            .one(&*self.db)
            .await?
            .is_some()
        {
            return Err(ServiceError::ValidationError(format!(
                "Locale {} already exists",
                input.id
            )));
        }

        let currency = input
            .currency
            .unwrap_or_else(|| self.default_currency.clone())
            .to_uppercase();
        let locale = locale::ActiveModel {
            id: Set(input.id),
            region: Set(input.region),
            currency: Set(currency),
        }
        .insert(&*self.db)
        .await?;
        info!(locale = %locale.id, "Locale created");
        Ok(locale)
    }

    pub async fn list_locales(&self) -> Result<Vec<locale::Model>, ServiceError> {
        Ok(locale::Entity::find()
            .order_by_asc(locale::Column::Id)
            .all(&*self.db)
            .await?)
    }

    /// Currency of a locale, falling back to the configured default.
    pub async fn currency_for(&self, locale_id: &str) -> Result<String, ServiceError> {
        Ok(locale::Entity::find_by_id(locale_id.to_string())
            .one(&*self.db)
            .await?
            .map(|l| l.currency)
            .unwrap_or_else(|| self.default_currency.clone()))
    }

    #[instrument(skip(self))]
    pub async fn create_country(&self, input: CreateCountry) -> Result<country::Model, ServiceError> {
        input.validate()?;
        let country = country::ActiveModel {
            id: Set(input.id.to_uppercase()),
            title: Set(input.title),
            visible: Set(input.visible),
        }
        .insert(&*self.db)
        .await?;
        Ok(country)
    }

    pub async fn list_countries(&self, visible_only: bool) -> Result<Vec<country::Model>, ServiceError> {
        let mut query = country::Entity::find();
        if visible_only {
            query = query.filter(country::Column::Visible.eq(true));
        }
        Ok(query
            .order_by_asc(country::Column::Title)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn create_provstate(
        &self,
        input: CreateProvState,
    ) -> Result<provstate::Model, ServiceError> {
        input.validate()?;
        let country_id = input.country.to_uppercase();
        country::Entity::find_by_id(country_id.clone())
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Country", &country_id))?;

        let provstate = provstate::ActiveModel {
            country: Set(country_id),
            title: Set(input.title),
            abbreviation: Set(input.abbreviation.to_uppercase()),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;
        Ok(provstate)
    }

    pub async fn list_provstates(&self, country_id: &str) -> Result<Vec<provstate::Model>, ServiceError> {
        Ok(provstate::Entity::find()
            .filter(provstate::Column::Country.eq(country_id.to_uppercase()))
            .order_by_asc(provstate::Column::Title)
            .all(&*self.db)
            .await?)
    }
}
