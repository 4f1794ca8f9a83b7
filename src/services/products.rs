use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait,
    DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

use super::images::{release_images, OrphanedImageFiles};
use super::{page_offset, DeleteEntry, DeleteSummary, Deletable, Page, Searchable};
use crate::cache::StorefrontCache;
use crate::entities::{
    attribute, catalog, category_product, item, item_group, item_region, product,
    product_attribute, region, sale_discount, AttributeType,
};
use crate::errors::ServiceError;

const CACHE_NAMESPACE: &str = "product";

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateProduct {
    pub catalog: i32,
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Shortname is required"))]
    pub shortname: String,
    pub bodytext: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate, ToSchema)]
pub struct UpdateProduct {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: Option<String>,
    #[validate(length(min = 1, message = "Shortname is required"))]
    pub shortname: Option<String>,
    pub bodytext: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct ProductSearch {
    /// Matched against title and shortname
    pub keyword: Option<String>,
    pub catalog: Option<i32>,
    pub category: Option<i32>,
    /// Products having an item whose SKU contains this text
    pub sku: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateAttribute {
    #[validate(length(min = 1, message = "Shortname is required"))]
    pub shortname: String,
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[schema(value_type = String, example = "color")]
    pub attribute_type: AttributeType,
}

/// An item together with its per-region prices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemWithPrices {
    #[serde(flatten)]
    pub item: item::Model,
    pub regions: Vec<item_region::Model>,
}

/// Product aggregate shown on the product page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductDetails {
    pub product: product::Model,
    pub categories: Vec<category_product::Model>,
    pub attributes: Vec<attribute::Model>,
    pub item_groups: Vec<item_group::Model>,
    pub items: Vec<ItemWithPrices>,
}

/// Removes products with their items, item prices, item groups, bindings and
/// any image no longer in use. The returned files go once the caller commits.
pub(crate) async fn delete_products_in<C: ConnectionTrait>(
    conn: &C,
    product_ids: &[i32],
) -> Result<OrphanedImageFiles, ServiceError> {
    if product_ids.is_empty() {
        return Ok(OrphanedImageFiles::default());
    }

    let image_ids: Vec<i32> = product::Entity::find()
        .filter(product::Column::Id.is_in(product_ids.to_vec()))
        .all(conn)
        .await?
        .into_iter()
        .filter_map(|p| p.primary_image)
        .collect();

    let item_ids: Vec<i32> = item::Entity::find()
        .filter(item::Column::Product.is_in(product_ids.to_vec()))
        .all(conn)
        .await?
        .into_iter()
        .map(|i| i.id)
        .collect();

    if !item_ids.is_empty() {
        item_region::Entity::delete_many()
            .filter(item_region::Column::Item.is_in(item_ids.clone()))
            .exec(conn)
            .await?;
        item::Entity::delete_many()
            .filter(item::Column::Id.is_in(item_ids))
            .exec(conn)
            .await?;
    }

    item_group::Entity::delete_many()
        .filter(item_group::Column::Product.is_in(product_ids.to_vec()))
        .exec(conn)
        .await?;
    category_product::Entity::delete_many()
        .filter(category_product::Column::Product.is_in(product_ids.to_vec()))
        .exec(conn)
        .await?;
    product_attribute::Entity::delete_many()
        .filter(product_attribute::Column::Product.is_in(product_ids.to_vec()))
        .exec(conn)
        .await?;
    product::Entity::delete_many()
        .filter(product::Column::Id.is_in(product_ids.to_vec()))
        .exec(conn)
        .await?;
    release_images(conn, image_ids).await
}

/// Ids of the items whose product carries `attribute_id`.
async fn items_with_attribute<C: ConnectionTrait>(
    conn: &C,
    attribute_id: i32,
) -> Result<Vec<i32>, ServiceError> {
    let product_ids: Vec<i32> = product_attribute::Entity::find()
        .filter(product_attribute::Column::Attribute.eq(attribute_id))
        .all(conn)
        .await?
        .into_iter()
        .map(|b| b.product)
        .collect();
    if product_ids.is_empty() {
        return Ok(Vec::new());
    }
    Ok(item::Entity::find()
        .filter(item::Column::Product.is_in(product_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|i| i.id)
        .collect())
}

/// Products, attributes and attribute-driven bulk edits
#[derive(Clone)]
pub struct ProductService {
    db: Arc<DatabaseConnection>,
    cache: StorefrontCache,
    image_dir: PathBuf,
}

impl ProductService {
    pub fn new(db: Arc<DatabaseConnection>, cache: StorefrontCache, image_dir: impl Into<PathBuf>) -> Self {
        Self {
            db,
            cache,
            image_dir: image_dir.into(),
        }
    }

    async fn find_product(&self, id: i32) -> Result<product::Model, ServiceError> {
        product::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Product", id))
    }

    async fn find_attribute(&self, id: i32) -> Result<attribute::Model, ServiceError> {
        attribute::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Attribute", id))
    }

    #[instrument(skip(self, input))]
    pub async fn create(&self, input: CreateProduct) -> Result<product::Model, ServiceError> {
        input.validate()?;
        catalog::Entity::find_by_id(input.catalog)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Catalog", input.catalog))?;

        let product = product::ActiveModel {
            catalog: Set(input.catalog),
            title: Set(input.title.trim().to_string()),
            shortname: Set(input.shortname.trim().to_string()),
            bodytext: Set(input.bodytext),
            primary_image: Set(None),
            createdate: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(product_id = product.id, catalog = product.catalog, "Product created");
        self.cache.flush_namespace(CACHE_NAMESPACE).await;
        Ok(product)
    }

    #[instrument(skip(self, input))]
    pub async fn update(&self, id: i32, input: UpdateProduct) -> Result<product::Model, ServiceError> {
        input.validate()?;
        let mut active: product::ActiveModel = self.find_product(id).await?.into();
        if let Some(title) = input.title {
            active.title = Set(title.trim().to_string());
        }
        if let Some(shortname) = input.shortname {
            active.shortname = Set(shortname.trim().to_string());
        }
        if input.bodytext.is_some() {
            active.bodytext = Set(input.bodytext);
        }
        let product = active.update(&*self.db).await?;
        self.cache.flush_namespace(CACHE_NAMESPACE).await;
        Ok(product)
    }

    /// Loads the product aggregate, served from cache when possible.
    #[instrument(skip(self))]
    pub async fn get(&self, id: i32) -> Result<ProductDetails, ServiceError> {
        let key = id.to_string();
        if let Some(cached) = self.cache.get_json::<ProductDetails>(CACHE_NAMESPACE, &key).await {
            return Ok(cached);
        }

        let db = &*self.db;
        let product = self.find_product(id).await?;

        let categories = category_product::Entity::find()
            .filter(category_product::Column::Product.eq(id))
            .order_by_asc(category_product::Column::Category)
            .all(db)
            .await?;

        let attribute_ids: Vec<i32> = product_attribute::Entity::find()
            .filter(product_attribute::Column::Product.eq(id))
            .all(db)
            .await?
            .into_iter()
            .map(|b| b.attribute)
            .collect();
        let attributes = if attribute_ids.is_empty() {
            Vec::new()
        } else {
            attribute::Entity::find()
                .filter(attribute::Column::Id.is_in(attribute_ids))
                .order_by_asc(attribute::Column::Displayorder)
                .order_by_asc(attribute::Column::Title)
                .all(db)
                .await?
        };

        let item_groups = item_group::Entity::find()
            .filter(item_group::Column::Product.eq(id))
            .order_by_asc(item_group::Column::Displayorder)
            .all(db)
            .await?;

        let items = item::Entity::find()
            .filter(item::Column::Product.eq(id))
            .order_by_asc(item::Column::Displayorder)
            .order_by_asc(item::Column::Id)
            .all(db)
            .await?;
        let item_ids: Vec<i32> = items.iter().map(|i| i.id).collect();
        let mut prices: HashMap<i32, Vec<item_region::Model>> = HashMap::new();
        if !item_ids.is_empty() {
            for price in item_region::Entity::find()
                .filter(item_region::Column::Item.is_in(item_ids))
                .order_by_asc(item_region::Column::Region)
                .all(db)
                .await?
            {
                prices.entry(price.item).or_default().push(price);
            }
        }

        let items = items
            .into_iter()
            .map(|item| ItemWithPrices {
                regions: prices.remove(&item.id).unwrap_or_default(),
                item,
            })
            .collect();

        let details = ProductDetails {
            product,
            categories,
            attributes,
            item_groups,
            items,
        };
        self.cache.put_json(CACHE_NAMESPACE, &key, &details).await;
        Ok(details)
    }

    #[instrument(skip(self, input))]
    pub async fn create_attribute(&self, input: CreateAttribute) -> Result<attribute::Model, ServiceError> {
        input.validate()?;
        let next_order = attribute::Entity::find()
            .select_only()
            .column_as(attribute::Column::Displayorder.max(), "max_order")
            .into_tuple::<Option<i32>>()
            .one(&*self.db)
            .await?
            .flatten()
            .map_or(0, |max| max + 1);

        let attribute = attribute::ActiveModel {
            shortname: Set(input.shortname.trim().to_string()),
            title: Set(input.title.trim().to_string()),
            attribute_type: Set(input.attribute_type),
            displayorder: Set(next_order),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;
        Ok(attribute)
    }

    pub async fn list_attributes(&self) -> Result<Vec<attribute::Model>, ServiceError> {
        Ok(attribute::Entity::find()
            .order_by_asc(attribute::Column::Displayorder)
            .order_by_asc(attribute::Column::Title)
            .all(&*self.db)
            .await?)
    }

    /// Replaces the attribute set of a product.
    #[instrument(skip(self))]
    pub async fn set_product_attributes(
        &self,
        product_id: i32,
        attribute_ids: &[i32],
    ) -> Result<(), ServiceError> {
        self.find_product(product_id).await?;
        let mut wanted = attribute_ids.to_vec();
        wanted.sort_unstable();
        wanted.dedup();

        let known = attribute::Entity::find()
            .filter(attribute::Column::Id.is_in(wanted.clone()))
            .count(&*self.db)
            .await?;
        if known as usize != wanted.len() {
            return Err(ServiceError::ValidationError(
                "Unknown attribute in selection".to_string(),
            ));
        }

        let txn = self.db.begin().await?;
        product_attribute::Entity::delete_many()
            .filter(product_attribute::Column::Product.eq(product_id))
            .exec(&txn)
            .await?;
        for attribute_id in wanted {
            product_attribute::Entity::insert(product_attribute::ActiveModel {
                product: Set(product_id),
                attribute: Set(attribute_id),
            })
            .exec_without_returning(&txn)
            .await?;
        }
        txn.commit().await?;

        self.cache.flush_namespace(CACHE_NAMESPACE).await;
        Ok(())
    }

    /// Points every item of every product with the attribute at `discount`
    /// (or clears it). Returns the number of items changed.
    #[instrument(skip(self))]
    pub async fn apply_sale_discount_by_attribute(
        &self,
        attribute_id: i32,
        discount: Option<i32>,
    ) -> Result<u64, ServiceError> {
        self.find_attribute(attribute_id).await?;
        if let Some(discount_id) = discount {
            sale_discount::Entity::find_by_id(discount_id)
                .one(&*self.db)
                .await?
                .ok_or_else(|| ServiceError::not_found("Sale discount", discount_id))?;
        }

        let item_ids = items_with_attribute(&*self.db, attribute_id).await?;
        if item_ids.is_empty() {
            return Ok(0);
        }

        let result = item::Entity::update_many()
            .col_expr(item::Column::SaleDiscount, Expr::value(discount))
            .filter(item::Column::Id.is_in(item_ids))
            .exec(&*self.db)
            .await?;

        info!(
            attribute_id,
            ?discount,
            items = result.rows_affected,
            "Sale discount applied by attribute"
        );
        self.cache.flush_namespace(CACHE_NAMESPACE).await;
        Ok(result.rows_affected)
    }

    /// Sets the region price of every item whose product has the attribute,
    /// creating disabled bindings where none exist yet.
    #[instrument(skip(self))]
    pub async fn set_region_price_by_attribute(
        &self,
        attribute_id: i32,
        region_id: i32,
        price: Decimal,
    ) -> Result<u64, ServiceError> {
        if price.is_sign_negative() {
            return Err(ServiceError::ValidationError(
                "Price cannot be negative".to_string(),
            ));
        }
        self.find_attribute(attribute_id).await?;
        region::Entity::find_by_id(region_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Region", region_id))?;

        let txn = self.db.begin().await?;
        let item_ids = items_with_attribute(&txn, attribute_id).await?;
        for &item_id in &item_ids {
            upsert_item_region(&txn, item_id, region_id, Some(price), None).await?;
        }
        txn.commit().await?;

        info!(attribute_id, region_id, items = item_ids.len(), "Region price set by attribute");
        self.cache.flush_namespace(CACHE_NAMESPACE).await;
        Ok(item_ids.len() as u64)
    }
}

/// Inserts or updates an item's region binding. New bindings default to a zero
/// price and disabled.
pub(crate) async fn upsert_item_region<C: ConnectionTrait>(
    conn: &C,
    item_id: i32,
    region_id: i32,
    price: Option<Decimal>,
    enabled: Option<bool>,
) -> Result<(), ServiceError> {
    match item_region::Entity::find_by_id((item_id, region_id)).one(conn).await? {
        Some(existing) => {
            let mut active: item_region::ActiveModel = existing.into();
            if let Some(price) = price {
                active.price = Set(price);
            }
            if let Some(enabled) = enabled {
                active.enabled = Set(enabled);
            }
            active.update(conn).await?;
        }
        None => {
            item_region::Entity::insert(item_region::ActiveModel {
                item: Set(item_id),
                region: Set(region_id),
                price: Set(price.unwrap_or(Decimal::ZERO)),
                enabled: Set(enabled.unwrap_or(false)),
            })
            .exec_without_returning(conn)
            .await?;
        }
    }
    Ok(())
}

#[async_trait]
impl Searchable for ProductService {
    type Query = ProductSearch;
    type Item = product::Model;

    async fn search(
        &self,
        query: ProductSearch,
        page: u64,
        per_page: u64,
    ) -> Result<Page<product::Model>, ServiceError> {
        let db = &*self.db;
        let mut condition = Condition::all();

        if let Some(keyword) = query.keyword.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
            condition = condition.add(
                Condition::any()
                    .add(product::Column::Title.contains(keyword))
                    .add(product::Column::Shortname.contains(keyword)),
            );
        }
        if let Some(catalog_id) = query.catalog {
            condition = condition.add(product::Column::Catalog.eq(catalog_id));
        }
        if let Some(category_id) = query.category {
            let ids: Vec<i32> = category_product::Entity::find()
                .filter(category_product::Column::Category.eq(category_id))
                .all(db)
                .await?
                .into_iter()
                .map(|b| b.product)
                .collect();
            condition = condition.add(product::Column::Id.is_in(ids));
        }
        if let Some(sku) = query.sku.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let mut ids: Vec<i32> = item::Entity::find()
                .filter(item::Column::Sku.contains(sku))
                .all(db)
                .await?
                .into_iter()
                .map(|i| i.product)
                .collect();
            ids.sort_unstable();
            ids.dedup();
            condition = condition.add(product::Column::Id.is_in(ids));
        }

        let select = product::Entity::find().filter(condition);
        let total = select.clone().count(db).await?;
        let items = select
            .order_by_asc(product::Column::Title)
            .order_by_asc(product::Column::Id)
            .offset(page_offset(page, per_page))
            .limit(per_page)
            .all(db)
            .await?;

        Ok(Page {
            items,
            total,
            page,
            per_page,
        })
    }
}

#[async_trait]
impl Deletable for ProductService {
    async fn delete_summary(&self, ids: &[i32]) -> Result<DeleteSummary, ServiceError> {
        let mut entries = Vec::with_capacity(ids.len());
        for &id in ids {
            let product = self.find_product(id).await?;
            let items = item::Entity::find()
                .filter(item::Column::Product.eq(id))
                .count(&*self.db)
                .await?;
            let categories = category_product::Entity::find()
                .filter(category_product::Column::Product.eq(id))
                .count(&*self.db)
                .await?;
            entries.push(DeleteEntry {
                id,
                message: format!(
                    "Product '{}' will be deleted with {} items and removed from {} categories",
                    product.title, items, categories
                ),
                title: product.title,
                deletable: true,
            });
        }
        Ok(DeleteSummary { entries })
    }

    #[instrument(skip(self))]
    async fn delete(&self, ids: &[i32]) -> Result<usize, ServiceError> {
        let txn = self.db.begin().await?;
        let existing: Vec<i32> = product::Entity::find()
            .filter(product::Column::Id.is_in(ids.to_vec()))
            .all(&txn)
            .await?
            .into_iter()
            .map(|p| p.id)
            .collect();
        let orphaned = delete_products_in(&txn, &existing).await?;
        txn.commit().await?;
        let images = orphaned.len();
        orphaned.remove(&self.image_dir).await;

        info!(deleted = existing.len(), images, "Products deleted");
        self.cache.flush_namespace(CACHE_NAMESPACE).await;
        Ok(existing.len())
    }
}
