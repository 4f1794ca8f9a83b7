use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product entity. Sellable variants of a product are its items.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub catalog: i32,
    pub title: String,
    pub shortname: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub bodytext: Option<String>,
    #[sea_orm(nullable)]
    pub primary_image: Option<i32>,
    pub createdate: DateTime<Utc>,
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
        belongs_to = "super::image::Entity",
        from = "Column::PrimaryImage",
        to = "super::image::Column::Id"
    )]
    PrimaryImage,
}

impl Related<super::catalog::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Catalog.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
