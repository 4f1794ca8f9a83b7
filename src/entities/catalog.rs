use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Catalog entity
///
/// A catalog may be the clone of another catalog (`clone_of`). The two sides of a
/// clone pair are never enabled in a region at the same time.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "catalogs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    #[sea_orm(nullable)]
    pub clone_of: Option<i32>,
    pub in_season: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(belongs_to = "Entity", from = "Column::CloneOf", to = "Column::Id")]
    Original,
}

impl ActiveModelBehavior for ActiveModel {}
