use async_trait::async_trait;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

use super::images::OrphanedImageFiles;
use super::{products::delete_products_in, DeleteEntry, DeleteSummary, Deletable};
use crate::cache::StorefrontCache;
use crate::entities::{
    catalog, catalog_region, category_product, item, item_group, item_region, product,
    product_attribute, region,
};
use crate::errors::ServiceError;

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateCatalog {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[serde(default)]
    pub in_season: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate, ToSchema)]
pub struct UpdateCatalog {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: Option<String>,
    pub in_season: Option<bool>,
}

/// Catalog with the facts shown on the catalog list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSummary {
    #[serde(flatten)]
    pub catalog: catalog::Model,
    pub product_count: u64,
    pub regions: Vec<i32>,
    pub clone_partner: Option<i32>,
}

/// Catalogs, catalog clones and their region bindings
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
    cache: StorefrontCache,
    image_dir: PathBuf,
}

/// The other side of a clone pair: the clone of `id` if one exists, else the
/// catalog `id` was cloned from.
async fn clone_partner_in<C: ConnectionTrait>(
    conn: &C,
    catalog: &catalog::Model,
) -> Result<Option<i32>, ServiceError> {
    let clone = catalog::Entity::find()
        .filter(catalog::Column::CloneOf.eq(catalog.id))
        .one(conn)
        .await?;
    Ok(clone.map(|c| c.id).or(catalog.clone_of))
}

async fn find_catalog_in<C: ConnectionTrait>(conn: &C, id: i32) -> Result<catalog::Model, ServiceError> {
    catalog::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("Catalog", id))
}

async fn catalog_regions_in<C: ConnectionTrait>(conn: &C, id: i32) -> Result<Vec<i32>, ServiceError> {
    Ok(catalog_region::Entity::find()
        .filter(catalog_region::Column::Catalog.eq(id))
        .order_by_asc(catalog_region::Column::Region)
        .all(conn)
        .await?
        .into_iter()
        .map(|b| b.region)
        .collect())
}

async fn product_count_in<C: ConnectionTrait>(conn: &C, id: i32) -> Result<u64, ServiceError> {
    Ok(product::Entity::find()
        .filter(product::Column::Catalog.eq(id))
        .count(conn)
        .await?)
}

/// A catalog may be deleted when it is empty, or when it is switched off
/// everywhere and its clone partner carries on in its place.
fn delete_guard(product_count: u64, region_count: usize, partner: Option<i32>) -> Result<(), String> {
    if product_count == 0 || (region_count == 0 && partner.is_some()) {
        return Ok(());
    }
    if region_count > 0 {
        Err(format!(
            "has {} products and is enabled in {} regions",
            product_count, region_count
        ))
    } else {
        Err(format!(
            "has {} products and no clone to replace it",
            product_count
        ))
    }
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>, cache: StorefrontCache, image_dir: impl Into<PathBuf>) -> Self {
        Self {
            db,
            cache,
            image_dir: image_dir.into(),
        }
    }

    #[instrument(skip(self, input))]
    pub async fn create(&self, input: CreateCatalog) -> Result<catalog::Model, ServiceError> {
        input.validate()?;
        let catalog = catalog::ActiveModel {
            title: Set(input.title.trim().to_string()),
            clone_of: Set(None),
            in_season: Set(input.in_season),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;
        info!(catalog_id = catalog.id, "Catalog created");
        Ok(catalog)
    }

    #[instrument(skip(self, input))]
    pub async fn update(&self, id: i32, input: UpdateCatalog) -> Result<catalog::Model, ServiceError> {
        input.validate()?;
        let existing = find_catalog_in(&*self.db, id).await?;
        let mut active: catalog::ActiveModel = existing.into();
        if let Some(title) = input.title {
            active.title = Set(title.trim().to_string());
        }
        if let Some(in_season) = input.in_season {
            active.in_season = Set(in_season);
        }
        let updated = active.update(&*self.db).await?;
        self.cache.flush_namespace("product").await;
        Ok(updated)
    }

    pub async fn get(&self, id: i32) -> Result<CatalogSummary, ServiceError> {
        let catalog = find_catalog_in(&*self.db, id).await?;
        self.summarize(catalog).await
    }

    pub async fn list(&self) -> Result<Vec<CatalogSummary>, ServiceError> {
        let catalogs = catalog::Entity::find()
            .order_by_asc(catalog::Column::Title)
            .all(&*self.db)
            .await?;

        let mut bindings: HashMap<i32, Vec<i32>> = HashMap::new();
        for binding in catalog_region::Entity::find()
            .order_by_asc(catalog_region::Column::Region)
            .all(&*self.db)
            .await?
        {
            bindings.entry(binding.catalog).or_default().push(binding.region);
        }

        let counts: HashMap<i32, i64> = product::Entity::find()
            .select_only()
            .column(product::Column::Catalog)
            .column_as(product::Column::Id.count(), "product_count")
            .group_by(product::Column::Catalog)
            .into_tuple::<(i32, i64)>()
            .all(&*self.db)
            .await?
            .into_iter()
            .collect();

        let clones: HashMap<i32, i32> = catalogs
            .iter()
            .filter_map(|c| c.clone_of.map(|orig| (orig, c.id)))
            .collect();

        Ok(catalogs
            .into_iter()
            .map(|catalog| CatalogSummary {
                product_count: counts.get(&catalog.id).copied().unwrap_or(0) as u64,
                regions: bindings.remove(&catalog.id).unwrap_or_default(),
                clone_partner: clones.get(&catalog.id).copied().or(catalog.clone_of),
                catalog,
            })
            .collect())
    }

    async fn summarize(&self, catalog: catalog::Model) -> Result<CatalogSummary, ServiceError> {
        let db = &*self.db;
        Ok(CatalogSummary {
            product_count: product_count_in(db, catalog.id).await?,
            regions: catalog_regions_in(db, catalog.id).await?,
            clone_partner: clone_partner_in(db, &catalog).await?,
            catalog,
        })
    }

    pub async fn clone_partner(&self, id: i32) -> Result<Option<i32>, ServiceError> {
        let catalog = find_catalog_in(&*self.db, id).await?;
        clone_partner_in(&*self.db, &catalog).await
    }

    /// Deep-copies a catalog with its products, bindings, item groups, items and
    /// item prices. The copy starts disabled in every region.
    #[instrument(skip(self))]
    pub async fn clone_catalog(&self, id: i32) -> Result<catalog::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let source = find_catalog_in(&txn, id).await?;
        if let Some(partner) = clone_partner_in(&txn, &source).await? {
            return Err(ServiceError::InvalidOperation(format!(
                "Catalog {} already has a clone partner ({})",
                id, partner
            )));
        }

        let copy = catalog::ActiveModel {
            title: Set(format!("{} (clone)", source.title)),
            clone_of: Set(Some(source.id)),
            in_season: Set(source.in_season),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let products = product::Entity::find()
            .filter(product::Column::Catalog.eq(source.id))
            .order_by_asc(product::Column::Id)
            .all(&txn)
            .await?;

        let mut item_count = 0usize;
        for original in &products {
            let new_product = product::ActiveModel {
                catalog: Set(copy.id),
                title: Set(original.title.clone()),
                shortname: Set(original.shortname.clone()),
                bodytext: Set(original.bodytext.clone()),
                primary_image: Set(original.primary_image),
                createdate: Set(original.createdate),
                ..Default::default()
            }
            .insert(&txn)
            .await?;

            for binding in category_product::Entity::find()
                .filter(category_product::Column::Product.eq(original.id))
                .all(&txn)
                .await?
            {
                category_product::Entity::insert(category_product::ActiveModel {
                    category: Set(binding.category),
                    product: Set(new_product.id),
                    displayorder: Set(binding.displayorder),
                    minor: Set(binding.minor),
                })
                .exec_without_returning(&txn)
                .await?;
            }

            for binding in product_attribute::Entity::find()
                .filter(product_attribute::Column::Product.eq(original.id))
                .all(&txn)
                .await?
            {
                product_attribute::Entity::insert(product_attribute::ActiveModel {
                    product: Set(new_product.id),
                    attribute: Set(binding.attribute),
                })
                .exec_without_returning(&txn)
                .await?;
            }

            let mut group_map: HashMap<i32, i32> = HashMap::new();
            for group in item_group::Entity::find()
                .filter(item_group::Column::Product.eq(original.id))
                .all(&txn)
                .await?
            {
                let new_group = item_group::ActiveModel {
                    product: Set(new_product.id),
                    title: Set(group.title.clone()),
                    displayorder: Set(group.displayorder),
                    ..Default::default()
                }
                .insert(&txn)
                .await?;
                group_map.insert(group.id, new_group.id);
            }

            for original_item in item::Entity::find()
                .filter(item::Column::Product.eq(original.id))
                .all(&txn)
                .await?
            {
                let new_item = item::ActiveModel {
                    product: Set(new_product.id),
                    sku: Set(original_item.sku.clone()),
                    description: Set(original_item.description.clone()),
                    status: Set(original_item.status),
                    displayorder: Set(original_item.displayorder),
                    item_group: Set(original_item
                        .item_group
                        .and_then(|g| group_map.get(&g).copied())),
                    sale_discount: Set(original_item.sale_discount),
                    minimum_quantity_group: Set(original_item.minimum_quantity_group),
                    ..Default::default()
                }
                .insert(&txn)
                .await?;
                item_count += 1;

                for price in item_region::Entity::find()
                    .filter(item_region::Column::Item.eq(original_item.id))
                    .all(&txn)
                    .await?
                {
                    item_region::Entity::insert(item_region::ActiveModel {
                        item: Set(new_item.id),
                        region: Set(price.region),
                        price: Set(price.price),
                        enabled: Set(price.enabled),
                    })
                    .exec_without_returning(&txn)
                    .await?;
                }
            }
        }

        txn.commit().await?;
        metrics::counter!("storefront_catalog.cloned", 1);
        info!(
            source = id,
            clone = copy.id,
            products = products.len(),
            items = item_count,
            "Catalog cloned"
        );
        self.cache.flush_namespace("product").await;
        Ok(copy)
    }

    /// Enabling a catalog in a region switches its clone partner off in every region.
    #[instrument(skip(self))]
    pub async fn set_region_enabled(
        &self,
        id: i32,
        region_id: i32,
        enabled: bool,
    ) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        let catalog = find_catalog_in(&txn, id).await?;
        region::Entity::find_by_id(region_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Region", region_id))?;

        let existing = catalog_region::Entity::find_by_id((id, region_id))
            .one(&txn)
            .await?;

        if enabled {
            if existing.is_none() {
                catalog_region::Entity::insert(catalog_region::ActiveModel {
                    catalog: Set(id),
                    region: Set(region_id),
                })
                .exec_without_returning(&txn)
                .await?;
            }
            if let Some(partner) = clone_partner_in(&txn, &catalog).await? {
                let removed = catalog_region::Entity::delete_many()
                    .filter(catalog_region::Column::Catalog.eq(partner))
                    .exec(&txn)
                    .await?;
                if removed.rows_affected > 0 {
                    info!(
                        catalog_id = id,
                        partner,
                        removed = removed.rows_affected,
                        "Clone partner disabled in all regions"
                    );
                }
            }
        } else if existing.is_some() {
            catalog_region::Entity::delete_by_id((id, region_id))
                .exec(&txn)
                .await?;
        }

        txn.commit().await?;
        info!(catalog_id = id, region_id, enabled, "Catalog region updated");
        self.cache.flush_namespace("product").await;
        Ok(())
    }
}

#[async_trait]
impl Deletable for CatalogService {
    async fn delete_summary(&self, ids: &[i32]) -> Result<DeleteSummary, ServiceError> {
        let db = &*self.db;
        let mut entries = Vec::with_capacity(ids.len());
        for &id in ids {
            let catalog = find_catalog_in(db, id).await?;
            let products = product_count_in(db, id).await?;
            let regions = catalog_regions_in(db, id).await?;
            let partner = clone_partner_in(db, &catalog).await?;

            let (deletable, message) = match delete_guard(products, regions.len(), partner) {
                Ok(()) if products == 0 => (true, format!("Catalog '{}' is empty", catalog.title)),
                Ok(()) => (
                    true,
                    format!(
                        "Catalog '{}' and its {} products will be deleted",
                        catalog.title, products
                    ),
                ),
                Err(reason) => (
                    false,
                    format!("Catalog '{}' cannot be deleted: it {}", catalog.title, reason),
                ),
            };

            entries.push(DeleteEntry {
                id,
                title: catalog.title,
                deletable,
                message,
            });
        }
        Ok(DeleteSummary { entries })
    }

    /// Catalogs failing the guard are skipped; `delete_summary` explains why.
    #[instrument(skip(self))]
    async fn delete(&self, ids: &[i32]) -> Result<usize, ServiceError> {
        let txn = self.db.begin().await?;
        let mut deleted = 0usize;
        let mut orphaned = OrphanedImageFiles::default();

        for &id in ids {
            let Some(catalog) = catalog::Entity::find_by_id(id).one(&txn).await? else {
                continue;
            };
            let products = product_count_in(&txn, id).await?;
            let regions = catalog_regions_in(&txn, id).await?;
            let partner = clone_partner_in(&txn, &catalog).await?;

            if let Err(reason) = delete_guard(products, regions.len(), partner) {
                warn!(catalog_id = id, "Catalog not deleted: it {}", reason);
                continue;
            }

            let product_ids: Vec<i32> = product::Entity::find()
                .filter(product::Column::Catalog.eq(id))
                .all(&txn)
                .await?
                .into_iter()
                .map(|p| p.id)
                .collect();
            orphaned.extend(delete_products_in(&txn, &product_ids).await?);

            catalog_region::Entity::delete_many()
                .filter(catalog_region::Column::Catalog.eq(id))
                .exec(&txn)
                .await?;

            // A surviving clone becomes a stand-alone catalog
            catalog::Entity::update_many()
                .col_expr(catalog::Column::CloneOf, Expr::value(Option::<i32>::None))
                .filter(catalog::Column::CloneOf.eq(id))
                .exec(&txn)
                .await?;

            catalog::Entity::delete_by_id(id).exec(&txn).await?;
            deleted += 1;
        }

        txn.commit().await?;
        orphaned.remove(&self.image_dir).await;
        if deleted > 0 {
            info!(deleted, "Catalogs deleted");
            self.cache.flush_namespace("product").await;
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::delete_guard;

    #[test]
    fn empty_catalog_is_always_deletable() {
        assert!(delete_guard(0, 3, None).is_ok());
    }

    #[test]
    fn disabled_catalog_with_clone_is_deletable() {
        assert!(delete_guard(12, 0, Some(4)).is_ok());
    }

    #[test]
    fn enabled_catalog_with_products_is_refused() {
        assert!(delete_guard(12, 1, Some(4)).is_err());
        assert!(delete_guard(12, 0, None).is_err());
    }
}
