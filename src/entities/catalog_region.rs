use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A catalog is enabled in a region when this binding exists.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "catalog_regions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub catalog: i32,
    #[sea_orm(primary_key, auto_increment = false)]
    pub region: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::catalog::Entity",
        from = "Column::Catalog",
        to = "super::catalog::Column::Id"
    )]
    Catalog,
    #[sea_orm(
        belongs_to = "super::region::Entity",
        from = "Column::Region",
        to = "super::region::Column::Id"
    )]
    Region,
}

impl ActiveModelBehavior for ActiveModel {}
