use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "categories")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(nullable)]
    pub parent: Option<i32>,
    pub title: String,
    pub shortname: String,
    #[sea_orm(nullable)]
    pub description: Option<String>,
    pub displayorder: i32,
    pub always_visible: bool,
    #[sea_orm(nullable)]
    pub image: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(belongs_to = "Entity", from = "Column::Parent", to = "Column::Id")]
    Parent,
    #[sea_orm(
        belongs_to = "super::image::Entity",
        from = "Column::Image",
        to = "super::image::Column::Id"
    )]
    Image,
}

impl Related<super::image::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Image.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
