use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Per-region price and availability of an item
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "item_regions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub item: i32,
    #[sea_orm(primary_key, auto_increment = false)]
    pub region: i32,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub price: Decimal,
    pub enabled: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::item::Entity",
        from = "Column::Item",
        to = "super::item::Column::Id"
    )]
    Item,
    #[sea_orm(
        belongs_to = "super::region::Entity",
        from = "Column::Region",
        to = "super::region::Column::Id"
    )]
    Region,
}

impl ActiveModelBehavior for ActiveModel {}
