use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

use crate::cache::StorefrontCache;
use crate::entities::{feature, item, price_range, sale_discount};
use crate::errors::{FieldError, ServiceError};

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct SaleDiscountInput {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Short name is required"))]
    pub shortname: String,
    /// Fraction of the price taken off, e.g. `0.25`
    #[schema(value_type = String)]
    pub discount_percentage: Decimal,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub region: Option<i32>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct PriceRangeInput {
    #[schema(value_type = Option<String>)]
    pub start_price: Option<Decimal>,
    #[schema(value_type = Option<String>)]
    pub end_price: Option<Decimal>,
    #[serde(default)]
    pub original_price: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct FeatureInput {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Short name is required"))]
    pub shortname: String,
    pub link: Option<String>,
    pub description: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub region: Option<i32>,
    #[validate(length(min = 1, message = "Display slot is required"))]
    pub display_slot: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub priority: i32,
}

fn default_enabled() -> bool {
    true
}

/// An open-ended window is fine; a closed one must end after it starts.
fn check_window(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Vec<FieldError> {
    match end {
        Some(end) if end <= start => vec![FieldError::new(
            "end_date",
            "End date must be after the start date",
        )],
        _ => Vec::new(),
    }
}

fn check_sale_discount(input: &SaleDiscountInput) -> Result<(), ServiceError> {
    input.validate()?;
    let mut errors = Vec::new();
    if input.discount_percentage <= Decimal::ZERO || input.discount_percentage > Decimal::ONE {
        errors.push(FieldError::new(
            "discount_percentage",
            "Discount must be greater than 0 and at most 1",
        ));
    }
    errors.extend(check_window(input.start_date, input.end_date));
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ServiceError::FieldErrors(errors))
    }
}

fn check_price_range(input: &PriceRangeInput) -> Result<(), ServiceError> {
    let mut errors = Vec::new();
    match (input.start_price, input.end_price) {
        (None, None) => errors.push(FieldError::new(
            "start_price",
            "A price range needs a start or an end price",
        )),
        (Some(start), Some(end)) if start > end => errors.push(FieldError::new(
            "end_price",
            "End price must not be below the start price",
        )),
        _ => {}
    }
    for (field, value) in [("start_price", input.start_price), ("end_price", input.end_price)] {
        if value.map_or(false, |v| v.is_sign_negative()) {
            errors.push(FieldError::new(field, "Prices cannot be negative"));
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ServiceError::FieldErrors(errors))
    }
}

fn check_feature(input: &FeatureInput) -> Result<(), ServiceError> {
    input.validate()?;
    let errors = check_window(input.start_date, input.end_date);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ServiceError::FieldErrors(errors))
    }
}

/// Sale discounts, price ranges and featured content
#[derive(Clone)]
pub struct PricingService {
    db: Arc<DatabaseConnection>,
    cache: StorefrontCache,
}

impl PricingService {
    pub fn new(db: Arc<DatabaseConnection>, cache: StorefrontCache) -> Self {
        Self { db, cache }
    }

    async fn find_discount(&self, id: i32) -> Result<sale_discount::Model, ServiceError> {
        sale_discount::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Sale discount", id))
    }

    #[instrument(skip(self, input))]
    pub async fn create_sale_discount(&self, input: SaleDiscountInput) -> Result<sale_discount::Model, ServiceError> {
        check_sale_discount(&input)?;
        let discount = sale_discount::ActiveModel {
            title: Set(input.title.trim().to_string()),
            shortname: Set(input.shortname.trim().to_string()),
            discount_percentage: Set(input.discount_percentage),
            start_date: Set(input.start_date),
            end_date: Set(input.end_date),
            region: Set(input.region),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;
        info!(discount_id = discount.id, "Sale discount created");
        Ok(discount)
    }

    #[instrument(skip(self, input))]
    pub async fn update_sale_discount(
        &self,
        id: i32,
        input: SaleDiscountInput,
    ) -> Result<sale_discount::Model, ServiceError> {
        check_sale_discount(&input)?;
        let mut active: sale_discount::ActiveModel = self.find_discount(id).await?.into();
        active.title = Set(input.title.trim().to_string());
        active.shortname = Set(input.shortname.trim().to_string());
        active.discount_percentage = Set(input.discount_percentage);
        active.start_date = Set(input.start_date);
        active.end_date = Set(input.end_date);
        active.region = Set(input.region);
        let discount = active.update(&*self.db).await?;
        self.cache.flush_namespace("product").await;
        Ok(discount)
    }

    /// Deletes a discount after detaching it from every item that uses it.
    #[instrument(skip(self))]
    pub async fn delete_sale_discount(&self, id: i32) -> Result<u64, ServiceError> {
        self.find_discount(id).await?;
        let txn = self.db.begin().await?;
        let detached = item::Entity::update_many()
            .col_expr(item::Column::SaleDiscount, Expr::value(Option::<i32>::None))
            .filter(item::Column::SaleDiscount.eq(id))
            .exec(&txn)
            .await?
            .rows_affected;
        sale_discount::Entity::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;

        self.cache.flush_namespace("product").await;
        info!(discount_id = id, detached, "Sale discount deleted");
        Ok(detached)
    }

    pub async fn list_sale_discounts(&self) -> Result<Vec<sale_discount::Model>, ServiceError> {
        Ok(sale_discount::Entity::find()
            .order_by_desc(sale_discount::Column::StartDate)
            .order_by_asc(sale_discount::Column::Id)
            .all(&*self.db)
            .await?)
    }

    /// Discounts running at `at`, either global or bound to `region`.
    pub async fn active_sale_discounts(
        &self,
        at: DateTime<Utc>,
        region: Option<i32>,
    ) -> Result<Vec<sale_discount::Model>, ServiceError> {
        let mut region_condition = Condition::any().add(sale_discount::Column::Region.is_null());
        if let Some(region) = region {
            region_condition = region_condition.add(sale_discount::Column::Region.eq(region));
        }
        Ok(sale_discount::Entity::find()
            .filter(sale_discount::Column::StartDate.lte(at))
            .filter(
                Condition::any()
                    .add(sale_discount::Column::EndDate.is_null())
                    .add(sale_discount::Column::EndDate.gt(at)),
            )
            .filter(region_condition)
            .order_by_asc(sale_discount::Column::StartDate)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self, input))]
    pub async fn create_price_range(&self, input: PriceRangeInput) -> Result<price_range::Model, ServiceError> {
        check_price_range(&input)?;
        let range = price_range::ActiveModel {
            start_price: Set(input.start_price),
            end_price: Set(input.end_price),
            original_price: Set(input.original_price),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;
        Ok(range)
    }

    #[instrument(skip(self, input))]
    pub async fn update_price_range(&self, id: i32, input: PriceRangeInput) -> Result<price_range::Model, ServiceError> {
        check_price_range(&input)?;
        let existing = price_range::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Price range", id))?;
        let mut active: price_range::ActiveModel = existing.into();
        active.start_price = Set(input.start_price);
        active.end_price = Set(input.end_price);
        active.original_price = Set(input.original_price);
        Ok(active.update(&*self.db).await?)
    }

    pub async fn delete_price_range(&self, id: i32) -> Result<(), ServiceError> {
        let result = price_range::Entity::delete_by_id(id).exec(&*self.db).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::not_found("Price range", id));
        }
        Ok(())
    }

    /// Open-ended ranges sort as if they started at zero.
    pub async fn list_price_ranges(&self) -> Result<Vec<price_range::Model>, ServiceError> {
        let mut ranges = price_range::Entity::find().all(&*self.db).await?;
        ranges.sort_by_key(|r| (r.start_price.unwrap_or(Decimal::ZERO), r.end_price.is_none(), r.id));
        Ok(ranges)
    }

    #[instrument(skip(self, input))]
    pub async fn create_feature(&self, input: FeatureInput) -> Result<feature::Model, ServiceError> {
        check_feature(&input)?;
        let feature = feature::ActiveModel {
            title: Set(input.title.trim().to_string()),
            shortname: Set(input.shortname.trim().to_string()),
            link: Set(input.link),
            description: Set(input.description),
            start_date: Set(input.start_date),
            end_date: Set(input.end_date),
            region: Set(input.region),
            display_slot: Set(input.display_slot.trim().to_string()),
            enabled: Set(input.enabled),
            priority: Set(input.priority),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;
        info!(feature_id = feature.id, slot = %feature.display_slot, "Feature created");
        Ok(feature)
    }

    #[instrument(skip(self, input))]
    pub async fn update_feature(&self, id: i32, input: FeatureInput) -> Result<feature::Model, ServiceError> {
        check_feature(&input)?;
        let existing = feature::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Feature", id))?;
        let mut active: feature::ActiveModel = existing.into();
        active.title = Set(input.title.trim().to_string());
        active.shortname = Set(input.shortname.trim().to_string());
        active.link = Set(input.link);
        active.description = Set(input.description);
        active.start_date = Set(input.start_date);
        active.end_date = Set(input.end_date);
        active.region = Set(input.region);
        active.display_slot = Set(input.display_slot.trim().to_string());
        active.enabled = Set(input.enabled);
        active.priority = Set(input.priority);
        Ok(active.update(&*self.db).await?)
    }

    pub async fn delete_feature(&self, id: i32) -> Result<(), ServiceError> {
        let result = feature::Entity::delete_by_id(id).exec(&*self.db).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::not_found("Feature", id));
        }
        Ok(())
    }

    pub async fn list_features(&self) -> Result<Vec<feature::Model>, ServiceError> {
        Ok(feature::Entity::find()
            .order_by_asc(feature::Column::DisplaySlot)
            .order_by_asc(feature::Column::Priority)
            .order_by_asc(feature::Column::Id)
            .all(&*self.db)
            .await?)
    }

    /// Enabled features showing at `at` for `region`, lowest priority number first.
    pub async fn active_features(
        &self,
        at: DateTime<Utc>,
        region: Option<i32>,
    ) -> Result<Vec<feature::Model>, ServiceError> {
        let mut region_condition = Condition::any().add(feature::Column::Region.is_null());
        if let Some(region) = region {
            region_condition = region_condition.add(feature::Column::Region.eq(region));
        }
        Ok(feature::Entity::find()
            .filter(feature::Column::Enabled.eq(true))
            .filter(feature::Column::StartDate.lte(at))
            .filter(
                Condition::any()
                    .add(feature::Column::EndDate.is_null())
                    .add(feature::Column::EndDate.gt(at)),
            )
            .filter(region_condition)
            .order_by_asc(feature::Column::Priority)
            .order_by_asc(feature::Column::Id)
            .all(&*self.db)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn discount(pct: Decimal, days: Option<i64>) -> SaleDiscountInput {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        SaleDiscountInput {
            title: "Spring sale".into(),
            shortname: "spring".into(),
            discount_percentage: pct,
            start_date: start,
            end_date: days.map(|d| start + Duration::days(d)),
            region: None,
        }
    }

    fn fields(err: ServiceError) -> Vec<String> {
        err.field_errors()
            .unwrap_or_default()
            .iter()
            .map(|e| e.field.clone())
            .collect()
    }

    #[test]
    fn discount_percentage_bounds() {
        assert!(check_sale_discount(&discount(dec!(1), None)).is_ok());
        assert!(check_sale_discount(&discount(dec!(0.15), Some(7))).is_ok());
        for pct in [dec!(0), dec!(-0.1), dec!(1.01)] {
            let err = check_sale_discount(&discount(pct, None)).unwrap_err();
            assert_eq!(fields(err), vec!["discount_percentage"]);
        }
    }

    #[test]
    fn discount_window_must_end_after_start() {
        let err = check_sale_discount(&discount(dec!(0.5), Some(0))).unwrap_err();
        assert_eq!(fields(err), vec!["end_date"]);
    }

    #[test]
    fn price_range_rules() {
        let range = |s: Option<Decimal>, e: Option<Decimal>| PriceRangeInput {
            start_price: s,
            end_price: e,
            original_price: false,
        };
        assert!(check_price_range(&range(None, Some(dec!(25)))).is_ok());
        assert!(check_price_range(&range(Some(dec!(100)), None)).is_ok());
        assert!(check_price_range(&range(Some(dec!(10)), Some(dec!(10)))).is_ok());
        assert!(check_price_range(&range(None, None)).is_err());
        assert!(check_price_range(&range(Some(dec!(50)), Some(dec!(25)))).is_err());
        assert!(check_price_range(&range(Some(dec!(-1)), None)).is_err());
    }
}
