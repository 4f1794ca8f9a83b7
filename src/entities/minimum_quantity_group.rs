use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Items in the group must be ordered in at least `minimum_quantity` units combined.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "minimum_quantity_groups")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    pub shortname: String,
    pub minimum_quantity: i32,
    #[sea_orm(nullable)]
    pub description: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
