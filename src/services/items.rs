use async_trait::async_trait;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

use super::{check_permutation, products::upsert_item_region, Orderable};
use crate::cache::StorefrontCache;
use crate::entities::{
    item, item_group, item_region, minimum_quantity_group, product, region, sale_discount,
    ItemStatus,
};
use crate::errors::ServiceError;

const CACHE_NAMESPACE: &str = "product";

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateItem {
    pub product: i32,
    #[validate(length(min = 1, message = "SKU is required"))]
    pub sku: String,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    #[schema(value_type = Option<String>, example = "available")]
    pub status: Option<ItemStatus>,
    pub item_group: Option<i32>,
    pub minimum_quantity_group: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate, ToSchema)]
pub struct UpdateItem {
    #[validate(length(min = 1, message = "SKU is required"))]
    pub sku: Option<String>,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: Option<String>,
    #[schema(value_type = Option<String>)]
    pub status: Option<ItemStatus>,
    /// `Some(None)` detaches the sale discount
    #[serde(default, with = "double_option")]
    #[schema(value_type = Option<i32>)]
    pub sale_discount: Option<Option<i32>>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct RegionBinding {
    #[schema(value_type = String, example = "19.99")]
    pub price: Decimal,
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateItemGroup {
    pub product: i32,
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateMinimumQuantityGroup {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Shortname is required"))]
    pub shortname: String,
    #[validate(range(min = 1, message = "Minimum quantity must be at least 1"))]
    pub minimum_quantity: i32,
    pub description: Option<String>,
}

/// Distinguishes an absent field from an explicit `null`.
mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S, T>(value: &Option<Option<T>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

async fn next_item_order<C: ConnectionTrait>(conn: &C, product_id: i32) -> Result<i32, ServiceError> {
    Ok(item::Entity::find()
        .select_only()
        .column_as(item::Column::Displayorder.max(), "max_order")
        .filter(item::Column::Product.eq(product_id))
        .into_tuple::<Option<i32>>()
        .one(conn)
        .await?
        .flatten()
        .map_or(0, |max| max + 1))
}

/// Items, item groups and minimum quantity groups
#[derive(Clone)]
pub struct ItemService {
    db: Arc<DatabaseConnection>,
    cache: StorefrontCache,
}

impl ItemService {
    pub fn new(db: Arc<DatabaseConnection>, cache: StorefrontCache) -> Self {
        Self { db, cache }
    }

    pub async fn get_item(&self, id: i32) -> Result<item::Model, ServiceError> {
        item::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Item", id))
    }

    async fn find_group(&self, id: i32) -> Result<item_group::Model, ServiceError> {
        item_group::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Item group", id))
    }

    #[instrument(skip(self, input))]
    pub async fn create_item(&self, input: CreateItem) -> Result<item::Model, ServiceError> {
        input.validate()?;
        product::Entity::find_by_id(input.product)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Product", input.product))?;

        if let Some(group_id) = input.item_group {
            let group = self.find_group(group_id).await?;
            if group.product != input.product {
                return Err(ServiceError::ValidationError(format!(
                    "Item group {} belongs to another product",
                    group_id
                )));
            }
        }
        if let Some(mq_id) = input.minimum_quantity_group {
            minimum_quantity_group::Entity::find_by_id(mq_id)
                .one(&*self.db)
                .await?
                .ok_or_else(|| ServiceError::not_found("Minimum quantity group", mq_id))?;
        }

        let displayorder = next_item_order(&*self.db, input.product).await?;
        let item = item::ActiveModel {
            product: Set(input.product),
            sku: Set(input.sku.trim().to_string()),
            description: Set(input.description.trim().to_string()),
            status: Set(input.status.unwrap_or(ItemStatus::Available)),
            displayorder: Set(displayorder),
            item_group: Set(input.item_group),
            sale_discount: Set(None),
            minimum_quantity_group: Set(input.minimum_quantity_group),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(item_id = item.id, product = item.product, sku = %item.sku, "Item created");
        self.cache.flush_namespace(CACHE_NAMESPACE).await;
        Ok(item)
    }

    #[instrument(skip(self, input))]
    pub async fn update_item(&self, id: i32, input: UpdateItem) -> Result<item::Model, ServiceError> {
        input.validate()?;
        let mut active: item::ActiveModel = self.get_item(id).await?.into();
        if let Some(sku) = input.sku {
            active.sku = Set(sku.trim().to_string());
        }
        if let Some(description) = input.description {
            active.description = Set(description.trim().to_string());
        }
        if let Some(status) = input.status {
            active.status = Set(status);
        }
        if let Some(discount) = input.sale_discount {
            if let Some(discount_id) = discount {
                sale_discount::Entity::find_by_id(discount_id)
                    .one(&*self.db)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("Sale discount", discount_id))?;
            }
            active.sale_discount = Set(discount);
        }
        let item = active.update(&*self.db).await?;
        self.cache.flush_namespace(CACHE_NAMESPACE).await;
        Ok(item)
    }

    /// Sets price and availability of an item in one region.
    #[instrument(skip(self, binding))]
    pub async fn set_region_binding(
        &self,
        item_id: i32,
        region_id: i32,
        binding: RegionBinding,
    ) -> Result<item_region::Model, ServiceError> {
        if binding.price.is_sign_negative() {
            return Err(ServiceError::ValidationError(
                "Price cannot be negative".to_string(),
            ));
        }
        self.get_item(item_id).await?;
        region::Entity::find_by_id(region_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Region", region_id))?;

        upsert_item_region(
            &*self.db,
            item_id,
            region_id,
            Some(binding.price),
            Some(binding.enabled),
        )
        .await?;
        self.cache.flush_namespace(CACHE_NAMESPACE).await;

        item_region::Entity::find_by_id((item_id, region_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::InternalError("item region binding vanished".to_string()))
    }

    #[instrument(skip(self))]
    pub async fn set_status(&self, item_id: i32, status: ItemStatus) -> Result<item::Model, ServiceError> {
        let mut active: item::ActiveModel = self.get_item(item_id).await?.into();
        active.status = Set(status);
        let item = active.update(&*self.db).await?;
        self.cache.flush_namespace(CACHE_NAMESPACE).await;
        Ok(item)
    }

    #[instrument(skip(self))]
    pub async fn delete_item(&self, item_id: i32) -> Result<(), ServiceError> {
        self.get_item(item_id).await?;
        let txn = self.db.begin().await?;
        item_region::Entity::delete_many()
            .filter(item_region::Column::Item.eq(item_id))
            .exec(&txn)
            .await?;
        item::Entity::delete_by_id(item_id).exec(&txn).await?;
        txn.commit().await?;

        info!(item_id, "Item deleted");
        self.cache.flush_namespace(CACHE_NAMESPACE).await;
        Ok(())
    }

    #[instrument(skip(self, input))]
    pub async fn create_group(&self, input: CreateItemGroup) -> Result<item_group::Model, ServiceError> {
        input.validate()?;
        product::Entity::find_by_id(input.product)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Product", input.product))?;

        let next_order = item_group::Entity::find()
            .filter(item_group::Column::Product.eq(input.product))
            .all(&*self.db)
            .await?
            .iter()
            .map(|g| g.displayorder + 1)
            .max()
            .unwrap_or(0);

        let group = item_group::ActiveModel {
            product: Set(input.product),
            title: Set(input.title.trim().to_string()),
            displayorder: Set(next_order),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;
        self.cache.flush_namespace(CACHE_NAMESPACE).await;
        Ok(group)
    }

    /// Moves items into a group. Every item must belong to the group's product.
    #[instrument(skip(self))]
    pub async fn assign_items(&self, group_id: i32, item_ids: &[i32]) -> Result<u64, ServiceError> {
        let group = self.find_group(group_id).await?;
        let items = item::Entity::find()
            .filter(item::Column::Id.is_in(item_ids.to_vec()))
            .all(&*self.db)
            .await?;
        if items.len() != item_ids.len() || items.iter().any(|i| i.product != group.product) {
            return Err(ServiceError::ValidationError(format!(
                "Only items of product {} can join this group",
                group.product
            )));
        }

        let result = item::Entity::update_many()
            .col_expr(item::Column::ItemGroup, Expr::value(Some(group_id)))
            .filter(item::Column::Id.is_in(item_ids.to_vec()))
            .exec(&*self.db)
            .await?;
        self.cache.flush_namespace(CACHE_NAMESPACE).await;
        Ok(result.rows_affected)
    }

    /// Deletes a group; its items stay and are detached.
    #[instrument(skip(self))]
    pub async fn delete_group(&self, group_id: i32) -> Result<(), ServiceError> {
        self.find_group(group_id).await?;
        let txn = self.db.begin().await?;
        let detached = item::Entity::update_many()
            .col_expr(item::Column::ItemGroup, Expr::value(Option::<i32>::None))
            .filter(item::Column::ItemGroup.eq(group_id))
            .exec(&txn)
            .await?;
        item_group::Entity::delete_by_id(group_id).exec(&txn).await?;
        txn.commit().await?;

        info!(group_id, detached = detached.rows_affected, "Item group deleted");
        self.cache.flush_namespace(CACHE_NAMESPACE).await;
        Ok(())
    }

    #[instrument(skip(self, input))]
    pub async fn create_min_quantity_group(
        &self,
        input: CreateMinimumQuantityGroup,
    ) -> Result<minimum_quantity_group::Model, ServiceError> {
        input.validate()?;
        let group = minimum_quantity_group::ActiveModel {
            title: Set(input.title.trim().to_string()),
            shortname: Set(input.shortname.trim().to_string()),
            minimum_quantity: Set(input.minimum_quantity),
            description: Set(input.description),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;
        Ok(group)
    }

    pub async fn list_min_quantity_groups(
        &self,
    ) -> Result<Vec<minimum_quantity_group::Model>, ServiceError> {
        Ok(minimum_quantity_group::Entity::find()
            .order_by_asc(minimum_quantity_group::Column::Title)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn assign_items_to_min_quantity_group(
        &self,
        group_id: i32,
        item_ids: &[i32],
    ) -> Result<u64, ServiceError> {
        minimum_quantity_group::Entity::find_by_id(group_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Minimum quantity group", group_id))?;

        let result = item::Entity::update_many()
            .col_expr(item::Column::MinimumQuantityGroup, Expr::value(Some(group_id)))
            .filter(item::Column::Id.is_in(item_ids.to_vec()))
            .exec(&*self.db)
            .await?;
        self.cache.flush_namespace(CACHE_NAMESPACE).await;
        Ok(result.rows_affected)
    }

    #[instrument(skip(self))]
    pub async fn delete_min_quantity_group(&self, group_id: i32) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;
        minimum_quantity_group::Entity::find_by_id(group_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Minimum quantity group", group_id))?;
        item::Entity::update_many()
            .col_expr(item::Column::MinimumQuantityGroup, Expr::value(Option::<i32>::None))
            .filter(item::Column::MinimumQuantityGroup.eq(group_id))
            .exec(&txn)
            .await?;
        minimum_quantity_group::Entity::delete_by_id(group_id)
            .exec(&txn)
            .await?;
        txn.commit().await?;
        self.cache.flush_namespace(CACHE_NAMESPACE).await;
        Ok(())
    }
}

/// Reorders the items of one product; `parent` is the product id.
#[async_trait]
impl Orderable for ItemService {
    async fn reorder(&self, parent: Option<i32>, ordered_ids: &[i32]) -> Result<(), ServiceError> {
        let product_id = parent.ok_or_else(|| {
            ServiceError::ValidationError("Items are ordered within a product".to_string())
        })?;

        let txn = self.db.begin().await?;
        let current: Vec<i32> = item::Entity::find()
            .filter(item::Column::Product.eq(product_id))
            .all(&txn)
            .await?
            .into_iter()
            .map(|i| i.id)
            .collect();
        check_permutation(&current, ordered_ids)?;

        for (position, id) in ordered_ids.iter().enumerate() {
            item::Entity::update_many()
                .col_expr(item::Column::Displayorder, Expr::value(position as i32))
                .filter(item::Column::Id.eq(*id))
                .exec(&txn)
                .await?;
        }
        txn.commit().await?;
        self.cache.flush_namespace(CACHE_NAMESPACE).await;
        Ok(())
    }
}
