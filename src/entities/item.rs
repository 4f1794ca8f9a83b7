use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Item entity: one sellable SKU of a product
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub product: i32,
    pub sku: String,
    pub description: String,
    pub status: ItemStatus,
    pub displayorder: i32,
    #[sea_orm(nullable)]
    pub item_group: Option<i32>,
    #[sea_orm(nullable)]
    pub sale_discount: Option<i32>,
    #[sea_orm(nullable)]
    pub minimum_quantity_group: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::Product",
        to = "super::product::Column::Id"
    )]
    Product,
    #[sea_orm(
        belongs_to = "super::item_group::Entity",
        from = "Column::ItemGroup",
        to = "super::item_group::Column::Id"
    )]
    ItemGroup,
    #[sea_orm(
        belongs_to = "super::sale_discount::Entity",
        from = "Column::SaleDiscount",
        to = "super::sale_discount::Column::Id"
    )]
    SaleDiscount,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Item availability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    #[sea_orm(string_value = "available")]
    Available,
    #[sea_orm(string_value = "out_of_stock")]
    OutOfStock,
    #[sea_orm(string_value = "backordered")]
    Backordered,
}
