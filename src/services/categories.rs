use async_trait::async_trait;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

use super::images::{release_images, OrphanedImageFiles};
use super::{check_permutation, DeleteEntry, DeleteSummary, Deletable, Orderable};
use crate::cache::StorefrontCache;
use crate::entities::{
    catalog_region, category, category_product, item, item_region, product, ItemStatus,
};
use crate::errors::ServiceError;

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateCategory {
    pub parent: Option<i32>,
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Shortname is required"))]
    pub shortname: String,
    pub description: Option<String>,
    #[serde(default)]
    pub always_visible: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate, ToSchema)]
pub struct UpdateCategory {
    /// Outer `None` keeps the parent, `Some(None)` makes the category a root
    #[serde(default, deserialize_with = "deserialize_parent")]
    #[schema(value_type = Option<i32>)]
    pub parent: Option<Option<i32>>,
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: Option<String>,
    #[validate(length(min = 1, message = "Shortname is required"))]
    pub shortname: Option<String>,
    pub description: Option<String>,
    pub always_visible: Option<bool>,
}

fn deserialize_parent<'de, D>(deserializer: D) -> Result<Option<Option<i32>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<i32>::deserialize(deserializer).map(Some)
}

/// One step of the breadcrumb from the root to a category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CategoryNavEntry {
    pub id: i32,
    pub title: String,
    pub shortname: String,
}

/// Parent to children map of the whole category table.
async fn children_map<C: ConnectionTrait>(conn: &C) -> Result<HashMap<i32, Vec<i32>>, ServiceError> {
    let rows: Vec<(i32, Option<i32>)> = category::Entity::find()
        .select_only()
        .column(category::Column::Id)
        .column(category::Column::Parent)
        .order_by_asc(category::Column::Displayorder)
        .order_by_asc(category::Column::Id)
        .into_tuple()
        .all(conn)
        .await?;

    let mut children: HashMap<i32, Vec<i32>> = HashMap::new();
    for (id, parent) in rows {
        if let Some(parent) = parent {
            children.entry(parent).or_default().push(id);
        }
    }
    Ok(children)
}

/// Breadth-first walk below `root`, excluding `root`. Ids already seen are
/// skipped, so a corrupted tree cannot loop.
pub fn walk_descendants(children: &HashMap<i32, Vec<i32>>, root: i32) -> Vec<i32> {
    let mut seen: HashSet<i32> = HashSet::from([root]);
    let mut order = Vec::new();
    let mut queue = VecDeque::from([root]);

    while let Some(current) = queue.pop_front() {
        for &child in children.get(&current).map(Vec::as_slice).unwrap_or_default() {
            if seen.insert(child) {
                order.push(child);
                queue.push_back(child);
            }
        }
    }
    order
}

async fn descendants_in<C: ConnectionTrait>(conn: &C, id: i32) -> Result<Vec<i32>, ServiceError> {
    let children = children_map(conn).await?;
    Ok(walk_descendants(&children, id))
}

/// Distinct product ids bound anywhere in the given categories.
async fn bound_products_in<C: ConnectionTrait>(
    conn: &C,
    categories: &[i32],
) -> Result<Vec<i32>, ServiceError> {
    let mut ids: Vec<i32> = category_product::Entity::find()
        .filter(category_product::Column::Category.is_in(categories.to_vec()))
        .all(conn)
        .await?
        .into_iter()
        .map(|b| b.product)
        .collect();
    ids.sort_unstable();
    ids.dedup();
    Ok(ids)
}

fn with_root(id: i32, descendants: &[i32]) -> Vec<i32> {
    let mut subtree = Vec::with_capacity(descendants.len() + 1);
    subtree.push(id);
    subtree.extend_from_slice(descendants);
    subtree
}

/// The category tree and its product bindings
#[derive(Clone)]
pub struct CategoryService {
    db: Arc<DatabaseConnection>,
    cache: StorefrontCache,
    image_dir: PathBuf,
}

impl CategoryService {
    pub fn new(db: Arc<DatabaseConnection>, cache: StorefrontCache, image_dir: impl Into<PathBuf>) -> Self {
        Self {
            db,
            cache,
            image_dir: image_dir.into(),
        }
    }

    pub async fn get(&self, id: i32) -> Result<category::Model, ServiceError> {
        category::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Category", id))
    }

    async fn next_displayorder(&self, parent: Option<i32>) -> Result<i32, ServiceError> {
        let siblings = self.children(parent).await?;
        Ok(siblings
            .iter()
            .map(|c| c.displayorder + 1)
            .max()
            .unwrap_or(0))
    }

    #[instrument(skip(self, input))]
    pub async fn create(&self, input: CreateCategory) -> Result<category::Model, ServiceError> {
        input.validate()?;
        if let Some(parent) = input.parent {
            self.get(parent).await?;
        }

        let displayorder = self.next_displayorder(input.parent).await?;
        let category = category::ActiveModel {
            parent: Set(input.parent),
            title: Set(input.title.trim().to_string()),
            shortname: Set(input.shortname.trim().to_string()),
            description: Set(input.description),
            displayorder: Set(displayorder),
            always_visible: Set(input.always_visible),
            image: Set(None),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(category_id = category.id, parent = ?category.parent, "Category created");
        self.cache.flush_namespace("product").await;
        Ok(category)
    }

    /// Moving a category under itself or one of its descendants is rejected.
    #[instrument(skip(self, input))]
    pub async fn update(&self, id: i32, input: UpdateCategory) -> Result<category::Model, ServiceError> {
        input.validate()?;
        let existing = self.get(id).await?;

        if let Some(Some(new_parent)) = input.parent {
            if new_parent == id {
                return Err(ServiceError::InvalidOperation(
                    "A category cannot be its own parent".to_string(),
                ));
            }
            self.get(new_parent).await?;
            if self.descendants(id).await?.contains(&new_parent) {
                return Err(ServiceError::InvalidOperation(format!(
                    "Category {} is below {} and cannot become its parent",
                    new_parent, id
                )));
            }
        }

        let mut active: category::ActiveModel = existing.clone().into();
        if let Some(parent) = input.parent {
            if parent != existing.parent {
                active.displayorder = Set(self.next_displayorder(parent).await?);
            }
            active.parent = Set(parent);
        }
        if let Some(title) = input.title {
            active.title = Set(title.trim().to_string());
        }
        if let Some(shortname) = input.shortname {
            active.shortname = Set(shortname.trim().to_string());
        }
        if input.description.is_some() {
            active.description = Set(input.description);
        }
        if let Some(always_visible) = input.always_visible {
            active.always_visible = Set(always_visible);
        }

        let category = active.update(&*self.db).await?;
        self.cache.flush_namespace("product").await;
        Ok(category)
    }

    /// Direct children, by display order then title. `None` lists the roots.
    pub async fn children(&self, parent: Option<i32>) -> Result<Vec<category::Model>, ServiceError> {
        let query = match parent {
            Some(parent) => category::Entity::find().filter(category::Column::Parent.eq(parent)),
            None => category::Entity::find().filter(category::Column::Parent.is_null()),
        };
        Ok(query
            .order_by_asc(category::Column::Displayorder)
            .order_by_asc(category::Column::Title)
            .all(&*self.db)
            .await?)
    }

    /// Breadcrumb from the root down to `id`.
    pub async fn navbar(&self, id: i32) -> Result<Vec<CategoryNavEntry>, ServiceError> {
        let mut path = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(id);

        while let Some(current) = next {
            if !seen.insert(current) {
                warn!(category_id = id, "Category parent chain loops at {}", current);
                break;
            }
            let category = self.get(current).await?;
            next = category.parent;
            path.push(CategoryNavEntry {
                id: category.id,
                title: category.title,
                shortname: category.shortname,
            });
        }

        path.reverse();
        Ok(path)
    }

    /// All categories below `id`, breadth-first.
    pub async fn descendants(&self, id: i32) -> Result<Vec<i32>, ServiceError> {
        self.get(id).await?;
        descendants_in(&*self.db, id).await
    }

    /// Binds products to a category; already-bound products keep their place
    /// and take the new `minor` flag.
    #[instrument(skip(self))]
    pub async fn bind_products(
        &self,
        category_id: i32,
        product_ids: &[i32],
        minor: bool,
    ) -> Result<usize, ServiceError> {
        self.get(category_id).await?;
        let known = product::Entity::find()
            .filter(product::Column::Id.is_in(product_ids.to_vec()))
            .all(&*self.db)
            .await?;
        if known.len() != product_ids.iter().collect::<HashSet<_>>().len() {
            return Err(ServiceError::ValidationError(
                "Unknown product in selection".to_string(),
            ));
        }

        let txn = self.db.begin().await?;
        let existing: HashMap<i32, category_product::Model> = category_product::Entity::find()
            .filter(category_product::Column::Category.eq(category_id))
            .all(&txn)
            .await?
            .into_iter()
            .map(|b| (b.product, b))
            .collect();
        let mut next_order = existing
            .values()
            .map(|b| b.displayorder + 1)
            .max()
            .unwrap_or(0);

        let mut added = 0;
        let mut handled = HashSet::new();
        for &product_id in product_ids {
            if !handled.insert(product_id) {
                continue;
            }
            match existing.get(&product_id) {
                Some(binding) if binding.minor != minor => {
                    let mut active: category_product::ActiveModel = binding.clone().into();
                    active.minor = Set(minor);
                    active.update(&txn).await?;
                }
                Some(_) => {}
                None => {
                    category_product::Entity::insert(category_product::ActiveModel {
                        category: Set(category_id),
                        product: Set(product_id),
                        displayorder: Set(next_order),
                        minor: Set(minor),
                    })
                    .exec_without_returning(&txn)
                    .await?;
                    next_order += 1;
                    added += 1;
                }
            }
        }
        txn.commit().await?;

        info!(category_id, added, "Products bound to category");
        self.cache.flush_namespace("product").await;
        Ok(added)
    }

    #[instrument(skip(self))]
    pub async fn unbind_products(&self, category_id: i32, product_ids: &[i32]) -> Result<u64, ServiceError> {
        let result = category_product::Entity::delete_many()
            .filter(category_product::Column::Category.eq(category_id))
            .filter(category_product::Column::Product.is_in(product_ids.to_vec()))
            .exec(&*self.db)
            .await?;
        self.cache.flush_namespace("product").await;
        Ok(result.rows_affected)
    }

    pub async fn products(&self, category_id: i32) -> Result<Vec<category_product::Model>, ServiceError> {
        Ok(category_product::Entity::find()
            .filter(category_product::Column::Category.eq(category_id))
            .order_by_asc(category_product::Column::Displayorder)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn reorder_products(&self, category_id: i32, ordered_ids: &[i32]) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;
        let current: Vec<i32> = category_product::Entity::find()
            .filter(category_product::Column::Category.eq(category_id))
            .all(&txn)
            .await?
            .into_iter()
            .map(|b| b.product)
            .collect();
        check_permutation(&current, ordered_ids)?;

        for (position, product_id) in ordered_ids.iter().enumerate() {
            category_product::Entity::update_many()
                .col_expr(category_product::Column::Displayorder, Expr::value(position as i32))
                .filter(category_product::Column::Category.eq(category_id))
                .filter(category_product::Column::Product.eq(*product_id))
                .exec(&txn)
                .await?;
        }
        txn.commit().await?;
        self.cache.flush_namespace("product").await;
        Ok(())
    }

    async fn subtree_item_ids<C: ConnectionTrait>(conn: &C, category_id: i32) -> Result<Vec<i32>, ServiceError> {
        let subtree = with_root(category_id, &descendants_in(conn, category_id).await?);
        let products = bound_products_in(conn, &subtree).await?;
        if products.is_empty() {
            return Ok(Vec::new());
        }
        Ok(item::Entity::find()
            .filter(item::Column::Product.is_in(products))
            .all(conn)
            .await?
            .into_iter()
            .map(|i| i.id)
            .collect())
    }

    /// Sets the status of every item of every product in the subtree.
    #[instrument(skip(self))]
    pub async fn set_item_status(&self, category_id: i32, status: ItemStatus) -> Result<u64, ServiceError> {
        self.get(category_id).await?;
        let item_ids = Self::subtree_item_ids(&*self.db, category_id).await?;
        if item_ids.is_empty() {
            return Ok(0);
        }
        let result = item::Entity::update_many()
            .col_expr(item::Column::Status, Expr::value(status))
            .filter(item::Column::Id.is_in(item_ids))
            .exec(&*self.db)
            .await?;

        info!(category_id, ?status, items = result.rows_affected, "Item status set for category");
        self.cache.flush_namespace("product").await;
        Ok(result.rows_affected)
    }

    /// Enables or disables the subtree's items in one region, or in all regions.
    #[instrument(skip(self))]
    pub async fn set_items_enabled(
        &self,
        category_id: i32,
        region: Option<i32>,
        enabled: bool,
    ) -> Result<u64, ServiceError> {
        self.get(category_id).await?;
        let item_ids = Self::subtree_item_ids(&*self.db, category_id).await?;
        if item_ids.is_empty() {
            return Ok(0);
        }

        let mut update = item_region::Entity::update_many()
            .col_expr(item_region::Column::Enabled, Expr::value(enabled))
            .filter(item_region::Column::Item.is_in(item_ids));
        if let Some(region) = region {
            update = update.filter(item_region::Column::Region.eq(region));
        }
        let result = update.exec(&*self.db).await?;

        info!(category_id, ?region, enabled, rows = result.rows_affected, "Item availability set for category");
        self.cache.flush_namespace("product").await;
        Ok(result.rows_affected)
    }

    /// Products in the subtree that a shopper in `region` can buy: at least one
    /// enabled item there, and a catalog enabled there.
    pub async fn visible_product_count(&self, category_id: i32, region: i32) -> Result<usize, ServiceError> {
        let db = &*self.db;
        let subtree = with_root(category_id, &self.descendants(category_id).await?);
        let products = bound_products_in(db, &subtree).await?;
        if products.is_empty() {
            return Ok(0);
        }

        let enabled_catalogs: HashSet<i32> = catalog_region::Entity::find()
            .filter(catalog_region::Column::Region.eq(region))
            .all(db)
            .await?
            .into_iter()
            .map(|b| b.catalog)
            .collect();

        let product_catalogs: HashMap<i32, i32> = product::Entity::find()
            .filter(product::Column::Id.is_in(products.clone()))
            .all(db)
            .await?
            .into_iter()
            .map(|p| (p.id, p.catalog))
            .collect();

        let items: HashMap<i32, i32> = item::Entity::find()
            .filter(item::Column::Product.is_in(products))
            .all(db)
            .await?
            .into_iter()
            .map(|i| (i.id, i.product))
            .collect();
        if items.is_empty() {
            return Ok(0);
        }

        let visible: HashSet<i32> = item_region::Entity::find()
            .filter(item_region::Column::Region.eq(region))
            .filter(item_region::Column::Enabled.eq(true))
            .filter(item_region::Column::Item.is_in(items.keys().copied().collect::<Vec<_>>()))
            .all(db)
            .await?
            .into_iter()
            .filter_map(|binding| items.get(&binding.item).copied())
            .filter(|product_id| {
                product_catalogs
                    .get(product_id)
                    .map_or(false, |catalog| enabled_catalogs.contains(catalog))
            })
            .collect();

        Ok(visible.len())
    }
}

#[async_trait]
impl Orderable for CategoryService {
    async fn reorder(&self, parent: Option<i32>, ordered_ids: &[i32]) -> Result<(), ServiceError> {
        let current: Vec<i32> = self.children(parent).await?.into_iter().map(|c| c.id).collect();
        check_permutation(&current, ordered_ids)?;

        let txn = self.db.begin().await?;
        for (position, id) in ordered_ids.iter().enumerate() {
            category::Entity::update_many()
                .col_expr(category::Column::Displayorder, Expr::value(position as i32))
                .filter(category::Column::Id.eq(*id))
                .exec(&txn)
                .await?;
        }
        txn.commit().await?;
        self.cache.flush_namespace("product").await;
        Ok(())
    }
}

#[async_trait]
impl Deletable for CategoryService {
    async fn delete_summary(&self, ids: &[i32]) -> Result<DeleteSummary, ServiceError> {
        let db = &*self.db;
        let children = children_map(db).await?;
        let mut entries = Vec::with_capacity(ids.len());

        for &id in ids {
            let category = self.get(id).await?;
            let descendants = walk_descendants(&children, id);
            let products = bound_products_in(db, &with_root(id, &descendants)).await?;

            entries.push(DeleteEntry {
                id,
                message: format!(
                    "Category '{}' has {} sub-categories and {} products. \
                     The sub-categories will be deleted and the products unbound.",
                    category.title,
                    descendants.len(),
                    products.len()
                ),
                title: category.title,
                deletable: true,
            });
        }
        Ok(DeleteSummary { entries })
    }

    /// Deletes each category with its whole subtree, deepest first. Products are
    /// unbound, never deleted. Category images go with their categories.
    #[instrument(skip(self))]
    async fn delete(&self, ids: &[i32]) -> Result<usize, ServiceError> {
        let txn = self.db.begin().await?;
        let mut deleted = 0usize;
        let mut orphaned = OrphanedImageFiles::default();

        for &id in ids {
            if category::Entity::find_by_id(id).one(&txn).await?.is_none() {
                continue;
            }
            let subtree = with_root(id, &descendants_in(&txn, id).await?);

            let unbound = category_product::Entity::delete_many()
                .filter(category_product::Column::Category.is_in(subtree.clone()))
                .exec(&txn)
                .await?;

            let image_ids: Vec<i32> = category::Entity::find()
                .filter(category::Column::Id.is_in(subtree.clone()))
                .all(&txn)
                .await?
                .into_iter()
                .filter_map(|c| c.image)
                .collect();

            for &category_id in subtree.iter().rev() {
                category::Entity::delete_by_id(category_id).exec(&txn).await?;
                deleted += 1;
            }
            orphaned.extend(release_images(&txn, image_ids).await?);
            info!(
                category_id = id,
                removed = subtree.len(),
                unbound = unbound.rows_affected,
                "Category subtree deleted"
            );
        }

        txn.commit().await?;
        orphaned.remove(&self.image_dir).await;
        self.cache.flush_namespace("product").await;
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walk_is_breadth_first() {
        let children = HashMap::from([(1, vec![2, 3]), (2, vec![4]), (3, vec![5])]);
        assert_eq!(walk_descendants(&children, 1), vec![2, 3, 4, 5]);
    }

    #[test]
    fn walk_survives_cycles() {
        let children = HashMap::from([(1, vec![2]), (2, vec![1, 3]), (3, vec![2])]);
        assert_eq!(walk_descendants(&children, 1), vec![2, 3]);
    }

    #[test]
    fn leaf_has_no_descendants() {
        let children = HashMap::from([(1, vec![2])]);
        assert!(walk_descendants(&children, 2).is_empty());
    }
}
